//! Discovery, threshold sweep and summary over one shared tracker store.

use crate::window::WeeklyGate;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use gemwatch_alerts::{
    format_multiplier_alert, format_new_token_message, format_weekly_summary, MessageTemplate,
    Notifier, SendOptions,
};
use gemwatch_core::{rank, EligibilityCriteria, Ladder, TrackerStore, ValueMetric};
use gemwatch_feeds::{TokenSource, ValueSource};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Settings for one tracker pipeline.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Destination channel for every message.
    pub channel: String,
    pub criteria: EligibilityCriteria,
    pub ladder: Ladder,
    pub metric: ValueMetric,
    pub template: MessageTemplate,
    /// Tokens whose peak reached this multiple are listed in the summary.
    pub summary_min_multiple: f64,
}

impl TrackerConfig {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            criteria: EligibilityCriteria::default(),
            ladder: Ladder::default(),
            metric: ValueMetric::default(),
            template: MessageTemplate::default(),
            summary_min_multiple: 2.0,
        }
    }
}

/// Outcome of one discovery sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryReport {
    /// Records returned by the source.
    pub fetched: usize,
    /// Records that failed the eligibility filter.
    pub rejected: usize,
    /// Ids newly inserted, in processing order.
    pub inserted: Vec<CompactString>,
    /// New-token posts that could not be delivered.
    pub failed_sends: usize,
}

/// Outcome of one threshold sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// Tokens whose value was fetched successfully.
    pub checked: usize,
    /// Tokens skipped because the value lookup failed.
    pub failed: usize,
    /// Tokens dropped by the eviction policy before the sweep.
    pub evicted: usize,
    /// `(token, multiplier)` pairs crossed this sweep, in alert order.
    pub alerts: Vec<(CompactString, u32)>,
    /// Alerts that could not be delivered.
    pub failed_sends: usize,
}

/// The token alert tracker: source, filter, store, evaluator and notifier.
pub struct Tracker {
    store: TrackerStore,
    source: Arc<dyn TokenSource>,
    values: Arc<dyn ValueSource>,
    notifier: Arc<dyn Notifier>,
    config: TrackerConfig,
}

impl Tracker {
    pub fn new(
        store: TrackerStore,
        source: Arc<dyn TokenSource>,
        values: Arc<dyn ValueSource>,
        notifier: Arc<dyn Notifier>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            store,
            source,
            values,
            notifier,
            config,
        }
    }

    pub fn store(&self) -> &TrackerStore {
        &self.store
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Poll the source once, track every new eligible token and announce it.
    ///
    /// Records are handled in source order. A post that fails to send is
    /// logged; the token stays tracked.
    pub async fn discovery_sweep(&self) -> DiscoveryReport {
        let store = &self.store;
        let known = |id: &str| store.contains(id);
        let records = self.source.fetch_tokens(&known).await;

        let mut report = DiscoveryReport {
            fetched: records.len(),
            ..Default::default()
        };

        for record in &records {
            if !self.config.criteria.accept(record) {
                debug!(token = %record.id, "Token rejected by eligibility filter");
                report.rejected += 1;
                continue;
            }

            let baseline = record.value(self.config.metric).unwrap_or(0.0);
            if !self
                .store
                .try_insert(&record.id, baseline, &record.name, &record.symbol)
            {
                continue;
            }
            report.inserted.push(record.id.clone());

            info!(
                token = %record.id,
                symbol = %record.symbol,
                baseline = baseline,
                "New token tracked"
            );

            let message = format_new_token_message(record, &self.config.template);
            if let Err(e) = self
                .notifier
                .send(&self.config.channel, &message, SendOptions::html())
                .await
            {
                log_send_failure(&record.id, "new token post", &e);
                report.failed_sends += 1;
            }
        }

        info!(
            source = self.source.name(),
            fetched = report.fetched,
            rejected = report.rejected,
            inserted = report.inserted.len(),
            "Discovery sweep complete"
        );
        report
    }

    /// Re-check every tracked token and alert newly crossed multipliers.
    ///
    /// A failed value lookup skips that token until the next sweep without
    /// touching its state.
    pub async fn threshold_sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let evicted = self.store.evict_expired(Utc::now());
        if !evicted.is_empty() {
            info!(count = evicted.len(), "Evicted expired tokens");
        }
        report.evicted = evicted.len();

        for id in self.store.ids() {
            let Some(token) = self.store.get(&id) else {
                continue;
            };
            if !token.has_valid_baseline() {
                continue;
            }

            let current = match self.values.current_value(&id, self.config.metric).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        token = %id,
                        error = %e,
                        transient = e.is_transient(),
                        "Value lookup failed, retrying next sweep"
                    );
                    report.failed += 1;
                    continue;
                }
            };
            report.checked += 1;

            let crossed = self.store.evaluate(&id, current, &self.config.ladder);
            for multiplier in crossed {
                info!(
                    token = %id,
                    multiplier = multiplier,
                    current = current,
                    baseline = token.baseline_value,
                    "Multiplier crossed"
                );
                report.alerts.push((id.clone(), multiplier));

                let message =
                    format_multiplier_alert(&token.display_name, &token.symbol, multiplier);
                if let Err(e) = self
                    .notifier
                    .send(&self.config.channel, &message, SendOptions::html())
                    .await
                {
                    log_send_failure(&id, "multiplier alert", &e);
                    report.failed_sends += 1;
                }
            }
        }

        debug!(
            checked = report.checked,
            failed = report.failed,
            alerts = report.alerts.len(),
            "Threshold sweep complete"
        );
        report
    }

    /// Post the performance summary. Returns true if a message was sent.
    pub async fn emit_summary(&self) -> bool {
        let entries = rank(&self.store.all(), self.config.summary_min_multiple);
        let Some(message) = format_weekly_summary(&entries, &self.config.template) else {
            info!("No tokens qualified for the summary");
            return false;
        };

        match self
            .notifier
            .send(&self.config.channel, &message, SendOptions::html())
            .await
        {
            Ok(()) => {
                info!(entries = entries.len(), "Summary sent");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to send summary");
                false
            }
        }
    }

    /// Emit the summary if `now` opens the weekly gate.
    pub async fn summary_tick(&self, gate: &WeeklyGate, now: DateTime<Utc>) -> bool {
        if !gate.try_open(now) {
            return false;
        }
        info!(week = %now.format("%G-W%V"), "Summary window open");
        self.emit_summary().await
    }
}

fn log_send_failure(id: &str, what: &str, e: &gemwatch_alerts::AlertError) {
    warn!(token = id, error = %e, "Failed to send {}", what);
}
