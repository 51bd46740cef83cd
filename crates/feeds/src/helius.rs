//! Helius DAS token discovery.
//!
//! Polls `getAssetsByGroup` over JSON-RPC and enriches each new asset with
//! Dexscreener pair data. Authority fields of the asset become record flags.

use crate::dexscreener::DexscreenerClient;
use crate::source::{KnownToken, TokenSource};
use crate::FeedError;
use async_trait::async_trait;
use compact_str::CompactString;
use gemwatch_core::TokenRecord;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const HELIUS_RPC_URL: &str = "https://mainnet.helius-rpc.com";

/// Flag set when the asset has no mint authority.
pub const FLAG_MINT_REVOKED: &str = "mint_revoked";
/// Flag set when the asset has no freeze authority.
pub const FLAG_FREEZE_REVOKED: &str = "freeze_revoked";
/// Flag set when the asset metadata is immutable.
pub const FLAG_IMMUTABLE: &str = "immutable";

#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfo {
    pub mint_authority: Option<String>,
    pub freeze_authority: Option<String>,
    pub supply: Option<u64>,
    pub decimals: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub id: String,
    pub mutable: Option<bool>,
    pub token_info: Option<TokenInfo>,
}

impl Asset {
    /// Safety flags derived from the asset. A flag is only present when the
    /// asset carries the field it is derived from.
    pub fn flags(&self) -> BTreeMap<CompactString, bool> {
        let mut flags = BTreeMap::new();
        if let Some(info) = &self.token_info {
            flags.insert(
                CompactString::new(FLAG_MINT_REVOKED),
                info.mint_authority.as_deref().map_or(true, str::is_empty),
            );
            flags.insert(
                CompactString::new(FLAG_FREEZE_REVOKED),
                info.freeze_authority.as_deref().map_or(true, str::is_empty),
            );
        }
        if let Some(mutable) = self.mutable {
            flags.insert(CompactString::new(FLAG_IMMUTABLE), !mutable);
        }
        flags
    }
}

#[derive(Debug, Deserialize)]
struct AssetPage {
    items: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<AssetPage>,
    error: Option<RpcError>,
}

/// Extract the asset list from a JSON-RPC response body.
pub fn parse_assets(body: &str) -> Result<Vec<Asset>, FeedError> {
    let response: RpcResponse = serde_json::from_str(body)?;
    if let Some(err) = response.error {
        return Err(FeedError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    response
        .result
        .map(|page| page.items)
        .ok_or_else(|| FeedError::ParseError("response has no result.items".to_string()))
}

/// Configuration for the Helius source.
#[derive(Clone)]
pub struct HeliusConfig {
    pub api_key: String,
    pub rpc_url: String,
    pub group_key: String,
    pub group_value: String,
    /// Assets requested per poll.
    pub limit: u32,
    pub timeout: Duration,
}

impl std::fmt::Debug for HeliusConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeliusConfig")
            .field("rpc_url", &self.rpc_url)
            .field("group_key", &self.group_key)
            .field("group_value", &self.group_value)
            .field("limit", &self.limit)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HeliusConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            rpc_url: HELIUS_RPC_URL.to_string(),
            group_key: "collection".to_string(),
            group_value: "tokens".to_string(),
            limit: 30,
            timeout: Duration::from_secs(10),
        }
    }

    /// JSON-RPC request body for one poll.
    pub fn request_body(&self) -> serde_json::Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getAssetsByGroup",
            "params": {
                "groupKey": self.group_key,
                "groupValue": self.group_value,
                "page": 1,
                "limit": self.limit,
            }
        })
    }
}

/// Token source backed by Helius, enriched through Dexscreener.
pub struct HeliusSource {
    client: reqwest::Client,
    config: HeliusConfig,
    dexscreener: Arc<DexscreenerClient>,
}

impl HeliusSource {
    pub fn new(config: HeliusConfig, dexscreener: Arc<DexscreenerClient>) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            dexscreener,
        })
    }

    /// Fetch one page of assets.
    pub async fn fetch_assets(&self) -> Result<Vec<Asset>, FeedError> {
        let response = self
            .client
            .post(&self.config.rpc_url)
            .query(&[("api-key", self.config.api_key.as_str())])
            .json(&self.config.request_body())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FeedError::from_status(response.status().as_u16()));
        }

        let body = response.text().await?;
        parse_assets(&body)
    }
}

#[async_trait]
impl TokenSource for HeliusSource {
    fn name(&self) -> &'static str {
        "helius"
    }

    async fn fetch_tokens(&self, known: KnownToken<'_>) -> Vec<TokenRecord> {
        let assets = match self.fetch_assets().await {
            Ok(assets) => assets,
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "Helius: failed to fetch assets");
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for asset in &assets {
            if known(&asset.id) {
                continue;
            }
            match self.dexscreener.enrich(&asset.id).await {
                Ok(mut record) => {
                    record.flags.extend(asset.flags());
                    records.push(record);
                }
                Err(FeedError::NotFound(_)) => {
                    debug!(token = %asset.id, "Helius: no Dexscreener pair yet");
                }
                Err(e) => {
                    warn!(token = %asset.id, error = %e, "Helius: failed to enrich asset");
                }
            }
        }

        info!(
            assets = assets.len(),
            records = records.len(),
            "Helius: fetched tokens"
        );
        records
    }
}
