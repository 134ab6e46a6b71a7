//! Core Osmosis chain types and facilitator configuration.
//!
//! - [`Coin`] - Cosmos SDK coin with string-encoded amount
//! - [`TokenDenom`] - Denomination with decimals for amount parsing
//! - [`FacilitatorConfig`] - Where and how to reach the facilitator

pub mod types;
pub use types::*;

pub mod config;
pub use config::*;
