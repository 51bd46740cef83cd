//! Token discovery and live value lookups over HTTP.
//!
//! ## Architecture
//!
//! - `source` - `TokenSource` / `ValueSource` traits the engine polls
//! - `dexscreener` - pair lookups, live values, latest token profiles
//! - `helius` - DAS `getAssetsByGroup` discovery, enriched via Dexscreener

pub mod dexscreener;
pub mod error;
pub mod helius;
pub mod source;

pub use dexscreener::{DexPair, DexscreenerClient, DexscreenerConfig, DEXSCREENER_BASE_URL};
pub use error::*;
pub use helius::{Asset, HeliusConfig, HeliusSource, HELIUS_RPC_URL};
pub use source::*;
