//! Core types for token tracking and multiplier alerting.
//!
//! Everything in this crate is free of I/O:
//! - `criteria` - eligibility filter for newly observed tokens
//! - `ladder` - multiplier ladders and threshold evaluation
//! - `store` - concurrent in-memory tracker store with eviction
//! - `summary` - peak-multiple ranking for the periodic summary

pub mod criteria;
pub mod ladder;
pub mod store;
pub mod summary;
pub mod token;

pub use criteria::*;
pub use ladder::*;
pub use store::*;
pub use summary::*;
pub use token::*;
