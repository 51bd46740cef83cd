//! Dexscreener REST client.
//!
//! Used both to enrich token ids with pair data and to re-read the live
//! value of tracked tokens. Also acts as a standalone discovery source via
//! the latest token profiles endpoint.

use crate::source::{KnownToken, TokenSource, ValueSource};
use crate::FeedError;
use async_trait::async_trait;
use compact_str::CompactString;
use gemwatch_core::{TokenRecord, ValueMetric};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEXSCREENER_BASE_URL: &str = "https://api.dexscreener.com";

#[derive(Debug, Clone, Deserialize)]
pub struct BaseToken {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Volume {
    pub m5: Option<f64>,
    pub h1: Option<f64>,
    pub h6: Option<f64>,
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Liquidity {
    pub usd: Option<f64>,
    pub base: Option<f64>,
    pub quote: Option<f64>,
}

/// One trading pair as returned by the search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DexPair {
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(rename = "dexId")]
    pub dex_id: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "pairAddress")]
    pub pair_address: Option<String>,
    #[serde(rename = "baseToken")]
    pub base_token: BaseToken,
    #[serde(rename = "priceUsd")]
    pub price_usd: Option<String>,
    pub volume: Option<Volume>,
    pub liquidity: Option<Liquidity>,
    pub fdv: Option<f64>,
    #[serde(rename = "marketCap")]
    pub market_cap: Option<f64>,
    /// Pair creation time in milliseconds since the epoch.
    #[serde(rename = "pairCreatedAt")]
    pub pair_created_at: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub pairs: Option<Vec<DexPair>>,
}

/// Entry of the latest token profiles feed.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenProfile {
    pub url: Option<String>,
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(rename = "tokenAddress")]
    pub token_address: String,
}

impl DexPair {
    /// USD price, if present and a valid number.
    pub fn price(&self) -> Option<f64> {
        self.price_usd
            .as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    /// Market cap, falling back to fully diluted valuation.
    pub fn market_cap(&self) -> Option<f64> {
        self.market_cap.or(self.fdv).filter(|v| v.is_finite())
    }

    /// Convert into a token record. `now_ms` is used to derive the pair age.
    pub fn to_record(&self, now_ms: i64) -> TokenRecord {
        let age = self
            .pair_created_at
            .and_then(|created| u64::try_from(now_ms - created).ok())
            .map(Duration::from_millis);

        TokenRecord {
            id: CompactString::new(&self.base_token.address),
            name: CompactString::new(self.base_token.name.as_deref().unwrap_or_default()),
            symbol: CompactString::new(self.base_token.symbol.as_deref().unwrap_or_default()),
            price_usd: self.price(),
            market_cap: self.market_cap(),
            volume: self.volume.as_ref().and_then(|v| v.h1),
            liquidity: self.liquidity.as_ref().and_then(|l| l.usd),
            age,
            flags: Default::default(),
            url: self.url.clone(),
        }
    }
}

/// Pick the pair for `mint` from a search response.
///
/// Search matches on any field, so pairs whose base token is a different
/// mint are skipped. The first remaining pair wins.
pub fn select_pair(response: SearchResponse, mint: &str) -> Option<DexPair> {
    response
        .pairs?
        .into_iter()
        .find(|p| p.base_token.address == mint)
}

/// Configuration for the Dexscreener client.
#[derive(Debug, Clone)]
pub struct DexscreenerConfig {
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Chain used to filter the token profiles feed.
    pub chain_id: String,
}

impl Default for DexscreenerConfig {
    fn default() -> Self {
        Self {
            base_url: DEXSCREENER_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            chain_id: "solana".to_string(),
        }
    }
}

/// Dexscreener API client.
pub struct DexscreenerClient {
    client: reqwest::Client,
    config: DexscreenerConfig,
}

impl DexscreenerClient {
    pub fn new(config: DexscreenerConfig) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &DexscreenerConfig {
        &self.config
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, FeedError> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(FeedError::from_status(response.status().as_u16()));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Find the main pair for a token mint.
    pub async fn pair_for(&self, mint: &str) -> Result<DexPair, FeedError> {
        let url = format!("{}/latest/dex/search", self.config.base_url);
        let request = self.client.get(&url).query(&[("q", mint)]);
        let response: SearchResponse = self.get_json(request).await?;
        select_pair(response, mint).ok_or_else(|| FeedError::NotFound(mint.to_string()))
    }

    /// Fetch pair data for a mint and convert it into a record.
    pub async fn enrich(&self, mint: &str) -> Result<TokenRecord, FeedError> {
        let pair = self.pair_for(mint).await?;
        Ok(pair.to_record(chrono::Utc::now().timestamp_millis()))
    }

    /// Fetch the latest token profiles, filtered to the configured chain.
    pub async fn latest_profiles(&self) -> Result<Vec<TokenProfile>, FeedError> {
        let url = format!("{}/token-profiles/latest/v1", self.config.base_url);
        let profiles: Vec<TokenProfile> = self.get_json(self.client.get(&url)).await?;
        Ok(profiles
            .into_iter()
            .filter(|p| p.chain_id == self.config.chain_id)
            .collect())
    }

    /// Enrich each id in order, skipping known ones and ones without data.
    pub async fn enrich_all(&self, ids: &[String], known: KnownToken<'_>) -> Vec<TokenRecord> {
        let mut records = Vec::new();
        for id in ids.iter().map(String::as_str) {
            if known(id) {
                continue;
            }
            match self.enrich(id).await {
                Ok(record) => records.push(record),
                Err(FeedError::NotFound(_)) => {
                    debug!(token = id, "Dexscreener: no pair yet");
                }
                Err(e) => {
                    warn!(token = id, error = %e, "Dexscreener: failed to enrich token");
                }
            }
        }
        records
    }
}

#[async_trait]
impl ValueSource for DexscreenerClient {
    async fn current_value(&self, id: &str, metric: ValueMetric) -> Result<f64, FeedError> {
        let pair = self.pair_for(id).await?;
        let value = match metric {
            ValueMetric::Price => pair.price(),
            ValueMetric::MarketCap => pair.market_cap(),
        };
        value
            .filter(|v| *v > 0.0)
            .ok_or_else(|| FeedError::MissingValue(id.to_string()))
    }
}

#[async_trait]
impl TokenSource for DexscreenerClient {
    fn name(&self) -> &'static str {
        "dexscreener"
    }

    async fn fetch_tokens(&self, known: KnownToken<'_>) -> Vec<TokenRecord> {
        let profiles = match self.latest_profiles().await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "Dexscreener: failed to fetch token profiles");
                return Vec::new();
            }
        };

        let ids: Vec<String> = profiles.iter().map(|p| p.token_address.clone()).collect();
        let records = self.enrich_all(&ids, known).await;
        info!(
            profiles = profiles.len(),
            records = records.len(),
            "Dexscreener: fetched latest tokens"
        );
        records
    }
}
