//! Collaborator traits the tracking pipeline polls.

use crate::FeedError;
use async_trait::async_trait;
use gemwatch_core::{TokenRecord, ValueMetric};

/// Predicate telling a source which ids are already tracked, so it can skip
/// enrichment calls for them.
pub type KnownToken<'a> = &'a (dyn Fn(&str) -> bool + Send + Sync);

/// Produces newly observed token records on demand.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Poll the provider once.
    ///
    /// Failures are logged and yield an empty list. Records are returned in
    /// provider order; ids for which `known` returns true are left out.
    async fn fetch_tokens(&self, known: KnownToken<'_>) -> Vec<TokenRecord>;
}

/// Looks up the live value of an already tracked token.
#[async_trait]
pub trait ValueSource: Send + Sync {
    async fn current_value(&self, id: &str, metric: ValueMetric) -> Result<f64, FeedError>;
}
