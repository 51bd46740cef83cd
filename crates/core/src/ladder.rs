//! Multiplier ladders and threshold evaluation.

use crate::TrackedToken;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Highest rung an open ladder will ever report.
pub const MAX_OPEN_RUNG: u32 = 1_000;

/// Ascending multiplier thresholds eligible for alerting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ladder {
    /// A fixed set of rungs, kept sorted and deduplicated.
    Fixed(Vec<u32>),
    /// Every integer multiple from `start` upward, capped at [`MAX_OPEN_RUNG`].
    Open { start: u32 },
}

impl Default for Ladder {
    fn default() -> Self {
        Ladder::Fixed(vec![2, 3, 4])
    }
}

impl Ladder {
    /// Build a fixed ladder. Rungs below 2 are dropped since a ratio of 1x
    /// is not a gain.
    pub fn fixed(rungs: impl IntoIterator<Item = u32>) -> Self {
        let rungs: BTreeSet<u32> = rungs.into_iter().filter(|&r| r >= 2).collect();
        Ladder::Fixed(rungs.into_iter().collect())
    }

    pub fn open(start: u32) -> Self {
        Ladder::Open {
            start: start.max(2),
        }
    }

    /// Rungs at or below `ratio`, ascending.
    pub fn rungs_up_to(&self, ratio: f64) -> Vec<u32> {
        if !ratio.is_finite() || ratio < 1.0 {
            return Vec::new();
        }
        match self {
            Ladder::Fixed(rungs) => rungs
                .iter()
                .copied()
                .filter(|&r| ratio >= r as f64)
                .collect(),
            Ladder::Open { start } => {
                let top = ratio.floor().min(MAX_OPEN_RUNG as f64) as u32;
                (*start..=top).collect()
            }
        }
    }
}

impl std::str::FromStr for Ladder {
    type Err = String;

    /// Parse `"2,3,4"` into a fixed ladder or `"open"` / `"open:5"` into an
    /// open one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("open") {
            let start = match rest.strip_prefix(':') {
                Some(n) => n
                    .trim()
                    .parse::<u32>()
                    .map_err(|e| format!("invalid open ladder start '{}': {}", n, e))?,
                None if rest.is_empty() => 2,
                None => return Err(format!("invalid ladder: {}", s)),
            };
            return Ok(Ladder::open(start));
        }

        let rungs = s
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| {
                r.trim_end_matches(['x', 'X'])
                    .parse::<u32>()
                    .map_err(|e| format!("invalid ladder rung '{}': {}", r, e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ladder = Ladder::fixed(rungs);
        match &ladder {
            Ladder::Fixed(r) if r.is_empty() => Err(format!("ladder has no rungs >= 2: {}", s)),
            _ => Ok(ladder),
        }
    }
}

/// Determine which rungs `tracked` crossed for the first time at
/// `current_value`, and record them as fired.
///
/// Every rung up to the current ratio is examined, so a jump from 1x to 5x
/// reports 2, 3, 4 and 5 in one call. A rung already in
/// `fired_thresholds` is never reported again.
pub fn evaluate(tracked: &mut TrackedToken, current_value: f64, ladder: &Ladder) -> BTreeSet<u32> {
    let mut crossed = BTreeSet::new();
    if !tracked.has_valid_baseline() || !current_value.is_finite() {
        return crossed;
    }

    tracked.observe(current_value);

    let ratio = current_value / tracked.baseline_value;
    for rung in ladder.rungs_up_to(ratio) {
        if tracked.fired_thresholds.insert(rung) {
            crossed.insert(rung);
        }
    }
    crossed
}
