//! Token records as observed from a source, and tokens under tracking.

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Which numeric field of a record is used as the tracked value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueMetric {
    /// USD price of one token.
    #[default]
    Price,
    /// Market cap (or fully diluted valuation when market cap is absent).
    MarketCap,
}

impl std::str::FromStr for ValueMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "price" => Ok(ValueMetric::Price),
            "market_cap" | "marketcap" | "mcap" => Ok(ValueMetric::MarketCap),
            other => Err(format!("unknown value metric: {}", other)),
        }
    }
}

/// A token as reported by a source in one poll.
///
/// Numeric fields are `None` when the provider omitted them or sent a value
/// that could not be read as a number. Consumers must treat `None` as a
/// failed check, never as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Mint address or other stable identifier.
    pub id: CompactString,
    pub name: CompactString,
    pub symbol: CompactString,
    /// USD price.
    pub price_usd: Option<f64>,
    /// Market cap in USD.
    pub market_cap: Option<f64>,
    /// Trading volume over the last hour in USD.
    pub volume: Option<f64>,
    /// Pool liquidity in USD.
    pub liquidity: Option<f64>,
    /// Time since the pair was created.
    pub age: Option<Duration>,
    /// Safety flags such as `mint_revoked` or `liquidity_locked`.
    pub flags: BTreeMap<CompactString, bool>,
    /// Chart link for the message.
    pub url: Option<String>,
}

impl TokenRecord {
    /// Create a record with only identity fields set.
    pub fn new(id: &str, name: &str, symbol: &str) -> Self {
        Self {
            id: CompactString::new(id),
            name: CompactString::new(name),
            symbol: CompactString::new(symbol),
            ..Default::default()
        }
    }

    /// Read the tracked value for the given metric.
    pub fn value(&self, metric: ValueMetric) -> Option<f64> {
        match metric {
            ValueMetric::Price => self.price_usd,
            ValueMetric::MarketCap => self.market_cap,
        }
    }

    /// Read a flag. Missing flags are reported as `None`.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flags.get(name).copied()
    }

    pub fn with_flag(mut self, name: &str, value: bool) -> Self {
        self.flags.insert(CompactString::new(name), value);
        self
    }
}

/// A token accepted by the eligibility filter and now being watched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedToken {
    pub id: CompactString,
    /// Value at first acceptance. Never changes.
    pub baseline_value: f64,
    /// Highest value observed since acceptance.
    pub peak_value: f64,
    /// Multipliers already alerted. Only grows.
    pub fired_thresholds: BTreeSet<u32>,
    pub display_name: CompactString,
    pub symbol: CompactString,
    pub inserted_at: DateTime<Utc>,
}

impl TrackedToken {
    pub fn new(id: &str, baseline_value: f64, display_name: &str, symbol: &str) -> Self {
        Self::new_at(id, baseline_value, display_name, symbol, Utc::now())
    }

    pub fn new_at(
        id: &str,
        baseline_value: f64,
        display_name: &str,
        symbol: &str,
        inserted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CompactString::new(id),
            baseline_value,
            peak_value: baseline_value,
            fired_thresholds: BTreeSet::new(),
            display_name: CompactString::new(display_name),
            symbol: CompactString::new(symbol),
            inserted_at,
        }
    }

    /// Whether multiplier ratios can be computed for this token.
    #[inline]
    pub fn has_valid_baseline(&self) -> bool {
        self.baseline_value.is_finite() && self.baseline_value > 0.0
    }

    /// Peak value relative to baseline, or `None` when the baseline is unusable.
    pub fn peak_multiple(&self) -> Option<f64> {
        if !self.has_valid_baseline() {
            return None;
        }
        Some(self.peak_value / self.baseline_value)
    }

    /// Record an observed value, raising the peak if it is higher.
    pub fn observe(&mut self, value: f64) {
        if value.is_finite() && value > self.peak_value {
            self.peak_value = value;
        }
    }
}
