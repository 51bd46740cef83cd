//! Application configuration.
//!
//! Credentials and tuning knobs come from the environment (optionally via a
//! `.env` file). An unset or empty variable takes its default; a variable
//! that is set but cannot be parsed is an error.

use chrono::Weekday;
use clap::ValueEnum;
use compact_str::CompactString;
use gemwatch_alerts::{parse_recipient, MessageTemplate};
use gemwatch_core::{EligibilityCriteria, EvictionPolicy, Ladder, ValueMetric};
use gemwatch_engine::{SummaryWindow, TrackerConfig};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors. Always fatal at startup.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Where new tokens are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SourceKind {
    /// Helius `getAssetsByGroup`, enriched via Dexscreener.
    #[default]
    Helius,
    /// Dexscreener latest token profiles.
    Dexscreener,
}

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub telegram_token: String,
    /// Channel id (`-100...`) or `@username`.
    pub channel_id: String,
    /// Present whenever the Helius source is selected.
    pub helius_api_key: Option<String>,
    pub criteria: EligibilityCriteria,
    pub ladder: Ladder,
    pub metric: ValueMetric,
    pub eviction: EvictionPolicy,
    pub summary_window: SummaryWindow,
    pub summary_min_multiple: f64,
    pub template: MessageTemplate,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("channel_id", &self.channel_id)
            .field("criteria", &self.criteria)
            .field("ladder", &self.ladder)
            .field("metric", &self.metric)
            .field("eviction", &self.eviction)
            .field("summary_window", &self.summary_window)
            .field("summary_min_multiple", &self.summary_min_multiple)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env(source: SourceKind) -> Result<Self, ConfigError> {
        Self::from_lookup(source, |key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variable names.
    pub fn from_lookup<F>(source: SourceKind, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let telegram_token = env.required("TELEGRAM_TOKEN")?;
        let channel_id = env.required("CHANNEL_ID")?;
        if let Err(e) = parse_recipient(&channel_id) {
            return Err(env.invalid("CHANNEL_ID", &e.to_string()));
        }
        let helius_api_key = match source {
            SourceKind::Helius => Some(env.required("HELIUS_API_KEY")?),
            SourceKind::Dexscreener => env.get("HELIUS_API_KEY"),
        };

        let criteria = EligibilityCriteria {
            min_volume: env.finite("MIN_VOLUME")?,
            max_volume: env.finite("MAX_VOLUME")?,
            min_liquidity: env.finite("MIN_LIQUIDITY")?,
            max_age: env.duration("MAX_AGE_MINUTES", 60)?,
            min_market_cap: env.finite("MIN_MARKET_CAP")?,
            max_market_cap: env.finite("MAX_MARKET_CAP")?,
            required_flags: env
                .get("REQUIRED_FLAGS")
                .map(|flags| split_list(&flags, ',').map(CompactString::from).collect())
                .unwrap_or_default(),
        };

        let mut eviction = EvictionPolicy::unbounded();
        if let Some(max) = env.parse::<usize>("MAX_TRACKED")? {
            if max == 0 {
                return Err(env.invalid("MAX_TRACKED", "must be at least 1"));
            }
            eviction = eviction.with_max_entries(max);
        }
        if let Some(max_age) = env.duration("MAX_TRACKED_AGE_HOURS", 3600)? {
            eviction = eviction.with_max_age(max_age);
        }

        let mut summary_window = SummaryWindow::default();
        if let Some(weekday) = env.parse::<Weekday>("SUMMARY_WEEKDAY")? {
            summary_window.weekday = weekday;
        }
        if let Some(hour) = env.parse::<u32>("SUMMARY_HOUR_UTC")? {
            if hour > 23 {
                return Err(env.invalid("SUMMARY_HOUR_UTC", "hour must be 0-23"));
            }
            summary_window.hour_utc = hour;
        }

        let mut template = MessageTemplate::default();
        if let Some(name) = env.get("BOT_NAME") {
            template.bot_name = name;
        }
        if let Some(footer) = env.get("MESSAGE_FOOTER") {
            template.footer = split_list(&footer, '|').map(str::to_string).collect();
        }

        Ok(Self {
            telegram_token,
            channel_id,
            helius_api_key,
            criteria,
            ladder: env.parse("LADDER")?.unwrap_or_default(),
            metric: env.parse("VALUE_METRIC")?.unwrap_or_default(),
            eviction,
            summary_window,
            summary_min_multiple: env.finite("SUMMARY_MIN_MULTIPLE")?.unwrap_or(2.0),
            template,
        })
    }

    /// Settings for the tracker pipeline.
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            channel: self.channel_id.clone(),
            criteria: self.criteria.clone(),
            ladder: self.ladder.clone(),
            metric: self.metric,
            template: self.template.clone(),
            summary_min_multiple: self.summary_min_multiple,
        }
    }
}

fn split_list(value: &str, sep: char) -> impl Iterator<Item = &str> {
    value.split(sep).map(str::trim).filter(|s| !s.is_empty())
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed value, `None` when unset or blank.
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parse<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|e| ConfigError::Invalid {
                key,
                value: raw,
                reason: e.to_string(),
            }),
        }
    }

    fn finite(&self, key: &'static str) -> Result<Option<f64>, ConfigError> {
        match self.parse::<f64>(key)? {
            Some(v) if !v.is_finite() => Err(self.invalid(key, "must be a finite number")),
            other => Ok(other),
        }
    }

    /// A count of `unit_secs`-second units as a duration.
    fn duration(&self, key: &'static str, unit_secs: u64) -> Result<Option<Duration>, ConfigError> {
        match self.parse::<u64>(key)? {
            None => Ok(None),
            Some(count) => count
                .checked_mul(unit_secs)
                .map(|secs| Some(Duration::from_secs(secs)))
                .ok_or_else(|| self.invalid(key, "too large")),
        }
    }

    fn invalid(&self, key: &'static str, reason: &str) -> ConfigError {
        ConfigError::Invalid {
            key,
            value: self.get(key).unwrap_or_default(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn load(source: SourceKind, vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(source, |key| vars.get(key).cloned())
    }

    const BASE: [(&str, &str); 3] = [
        ("TELEGRAM_TOKEN", "123:abc"),
        ("CHANNEL_ID", "@zeusgems"),
        ("HELIUS_API_KEY", "helius-key"),
    ];

    fn with(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        let mut vars = BASE.to_vec();
        vars.extend_from_slice(extra);
        vars
    }

    #[test]
    fn test_defaults() {
        let config = load(SourceKind::Helius, &BASE).unwrap();

        assert_eq!(config.channel_id, "@zeusgems");
        assert_eq!(config.helius_api_key.as_deref(), Some("helius-key"));
        assert_eq!(config.criteria, EligibilityCriteria::default());
        assert_eq!(config.ladder, Ladder::fixed([2, 3, 4]));
        assert_eq!(config.metric, ValueMetric::Price);
        assert_eq!(config.eviction, EvictionPolicy::unbounded());
        assert_eq!(config.summary_window, SummaryWindow::default());
        assert_eq!(config.summary_min_multiple, 2.0);
        assert_eq!(config.template, MessageTemplate::default());
    }

    #[test]
    fn test_missing_credentials() {
        assert_eq!(
            load(SourceKind::Helius, &[("CHANNEL_ID", "@x")]).unwrap_err(),
            ConfigError::Missing("TELEGRAM_TOKEN")
        );
        assert_eq!(
            load(SourceKind::Helius, &[("TELEGRAM_TOKEN", "t"), ("CHANNEL_ID", "  ")]).unwrap_err(),
            ConfigError::Missing("CHANNEL_ID")
        );
        assert_eq!(
            load(SourceKind::Helius, &[("TELEGRAM_TOKEN", "t"), ("CHANNEL_ID", "@x")]).unwrap_err(),
            ConfigError::Missing("HELIUS_API_KEY")
        );
    }

    #[test]
    fn test_dexscreener_needs_no_helius_key() {
        let config = load(
            SourceKind::Dexscreener,
            &[("TELEGRAM_TOKEN", "t"), ("CHANNEL_ID", "-1001")],
        )
        .unwrap();
        assert_eq!(config.helius_api_key, None);
    }

    #[test]
    fn test_thresholds() {
        let config = load(
            SourceKind::Helius,
            &with(&[
                ("MIN_VOLUME", "10000"),
                ("MAX_VOLUME", "1e7"),
                ("MIN_LIQUIDITY", "5000"),
                ("MAX_AGE_MINUTES", "30"),
                ("MIN_MARKET_CAP", "50000"),
                ("REQUIRED_FLAGS", "mint_revoked, freeze_revoked,,"),
            ]),
        )
        .unwrap();

        let expected = EligibilityCriteria::default()
            .with_volume(Some(10_000.0), Some(10_000_000.0))
            .with_min_liquidity(5_000.0)
            .with_max_age(Duration::from_secs(1800))
            .with_market_cap(Some(50_000.0), None)
            .require_flag("mint_revoked")
            .require_flag("freeze_revoked");
        assert_eq!(config.criteria, expected);
    }

    #[test]
    fn test_tracking_options() {
        let config = load(
            SourceKind::Helius,
            &with(&[
                ("LADDER", "open"),
                ("VALUE_METRIC", "market_cap"),
                ("MAX_TRACKED", "500"),
                ("MAX_TRACKED_AGE_HOURS", "168"),
                ("SUMMARY_WEEKDAY", "fri"),
                ("SUMMARY_HOUR_UTC", "18"),
                ("SUMMARY_MIN_MULTIPLE", "3"),
                ("BOT_NAME", "Apollo Gems"),
                ("MESSAGE_FOOTER", "Trade: https://t.me/a | Chart: https://t.me/b"),
            ]),
        )
        .unwrap();

        assert_eq!(config.ladder, Ladder::open(2));
        assert_eq!(config.metric, ValueMetric::MarketCap);
        assert_eq!(
            config.eviction,
            EvictionPolicy::unbounded()
                .with_max_entries(500)
                .with_max_age(Duration::from_secs(168 * 3600))
        );
        assert_eq!(
            config.summary_window,
            SummaryWindow {
                weekday: Weekday::Fri,
                hour_utc: 18
            }
        );
        assert_eq!(config.summary_min_multiple, 3.0);
        assert_eq!(config.template.bot_name, "Apollo Gems");
        assert_eq!(
            config.template.footer,
            vec!["Trade: https://t.me/a", "Chart: https://t.me/b"]
        );

        let tracker = config.tracker_config();
        assert_eq!(tracker.channel, "@zeusgems");
        assert_eq!(tracker.metric, ValueMetric::MarketCap);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        for (key, value) in [
            ("MIN_VOLUME", "lots"),
            ("MIN_LIQUIDITY", "NaN"),
            ("MAX_AGE_MINUTES", "-5"),
            ("LADDER", "1"),
            ("VALUE_METRIC", "volume"),
            ("MAX_TRACKED", "0"),
            ("SUMMARY_WEEKDAY", "someday"),
            ("SUMMARY_HOUR_UTC", "24"),
            ("MAX_AGE_MINUTES", "18446744073709551615"),
            ("MAX_TRACKED_AGE_HOURS", "18446744073709551615"),
            ("CHANNEL_ID", "zeusgems"),
        ] {
            match load(SourceKind::Helius, &with(&[(key, value)])) {
                Err(ConfigError::Invalid { key: k, .. }) => assert_eq!(k, key),
                other => panic!("{}={} should be invalid, got {:?}", key, value, other),
            }
        }
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = load(SourceKind::Helius, &BASE).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("123:abc"));
        assert!(!debug.contains("helius-key"));
        assert!(debug.contains("@zeusgems"));
    }
}
