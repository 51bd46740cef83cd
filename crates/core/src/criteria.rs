//! Eligibility criteria for newly observed tokens.

use crate::TokenRecord;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Thresholds a new token must satisfy before it is tracked.
///
/// A bound set to `None` is not checked. A bound that is set requires the
/// corresponding field to be present on the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EligibilityCriteria {
    /// Minimum 1h volume in USD.
    pub min_volume: Option<f64>,
    /// Maximum 1h volume in USD.
    pub max_volume: Option<f64>,
    /// Liquidity must be strictly above this.
    pub min_liquidity: Option<f64>,
    /// Pair age must be at or below this.
    pub max_age: Option<Duration>,
    /// Minimum market cap in USD.
    pub min_market_cap: Option<f64>,
    /// Maximum market cap in USD.
    pub max_market_cap: Option<f64>,
    /// Flags that must all be present and true.
    pub required_flags: Vec<CompactString>,
}

impl EligibilityCriteria {
    /// Decide whether a record qualifies for tracking.
    pub fn accept(&self, record: &TokenRecord) -> bool {
        accept(record, self)
    }

    pub fn with_volume(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_volume = min;
        self.max_volume = max;
        self
    }

    pub fn with_min_liquidity(mut self, min: f64) -> Self {
        self.min_liquidity = Some(min);
        self
    }

    pub fn with_max_age(mut self, max: Duration) -> Self {
        self.max_age = Some(max);
        self
    }

    pub fn with_market_cap(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_market_cap = min;
        self.max_market_cap = max;
        self
    }

    pub fn require_flag(mut self, flag: &str) -> Self {
        self.required_flags.push(CompactString::new(flag));
        self
    }
}

/// Read a numeric field for a bound check. Non-finite values count as missing.
fn number(field: Option<f64>) -> Option<f64> {
    field.filter(|v| v.is_finite())
}

/// Check `value` against an inclusive range where either side may be open.
/// Returns true when no bound is set, regardless of `value`.
fn within(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(v) = number(value) else {
        return false;
    };
    min.map_or(true, |m| v >= m) && max.map_or(true, |m| v <= m)
}

/// Pure eligibility check. Fails closed: any missing or malformed field that
/// a configured bound depends on rejects the record.
pub fn accept(record: &TokenRecord, criteria: &EligibilityCriteria) -> bool {
    if record.id.is_empty() {
        return false;
    }

    if !within(record.volume, criteria.min_volume, criteria.max_volume) {
        return false;
    }

    if let Some(min) = criteria.min_liquidity {
        match number(record.liquidity) {
            Some(liquidity) if liquidity > min => {}
            _ => return false,
        }
    }

    if let Some(max_age) = criteria.max_age {
        match record.age {
            Some(age) if age <= max_age => {}
            _ => return false,
        }
    }

    if !within(
        record.market_cap,
        criteria.min_market_cap,
        criteria.max_market_cap,
    ) {
        return false;
    }

    criteria
        .required_flags
        .iter()
        .all(|flag| record.flag(flag) == Some(true))
}
