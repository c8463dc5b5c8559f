//! Core library for the launch-arb project.
//!
//! Detects and executes price discrepancies between a bonding-curve launch
//! venue and a concentrated-liquidity pool for the same token, trading from
//! deterministically derived, independently funded sub-wallets.

pub mod amm;
pub mod arbitrage;
pub mod chain;
pub mod config;
pub mod curve;
pub mod errors;
pub mod funding;
pub mod metadata;
pub mod models;
pub mod pipeline;
pub mod router;
pub mod utils;
pub mod wallet;
