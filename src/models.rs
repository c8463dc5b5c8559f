//! Shared data structures used throughout the application.

use ethers::types::{Address, H256, U256};
use std::time::SystemTime;
use uuid::Uuid;

/// Direction of the arbitrage round trip.
///
/// The launch curve is "venue A", the concentrated-liquidity pool is
/// "venue B". A positive spread (curve pricier) means we buy on the pool
/// and sell into the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeDirection {
    BuyAmmSellCurve,
    BuyCurveSellAmm,
}

/// One detected price discrepancy, sized and ready for a single execution
/// attempt. Recomputed every cycle; never reused after an attempt.
#[derive(Debug, Clone, Copy)]
pub struct ArbOpportunity {
    /// Quote-per-base price on the bonding-curve venue.
    pub price_curve: f64,
    /// Quote-per-base price on the AMM pool.
    pub price_amm: f64,
    /// (curve - amm) / amm in basis points, rounded.
    pub spread_bps: i32,
    pub direction: TradeDirection,
    /// Quote-asset amount committed to the buy leg, in wei-scale units.
    pub trade_amount: f64,
    /// Estimated round-trip profit in quote units, net of both venues' fees
    /// and price impact. An estimate only; on-chain minimum-output checks are
    /// the correctness backstop.
    pub expected_profit: f64,
}

/// Terminal status of one execution attempt.
///
/// `TimedOut` is deliberately distinct from `Reverted`: a timed-out
/// transaction may still land later, a reverted one is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Success,
    Reverted,
    TimedOut,
    SimFailed,
}

/// Outcome of one pipeline attempt. Written once, never mutated.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub attempt_id: Uuid,
    pub tx_hash: Option<H256>,
    pub status: ExecStatus,
    pub gas_used: Option<U256>,
    /// Profit floor in quote wei implied by the enforced minimum output
    /// (actual fill can only be better). `None` unless `Success`.
    pub realized_profit: Option<U256>,
    /// Revert reason or simulation error, when one was surfaced.
    pub error: Option<String>,
}

/// A derived trading sub-wallet. The private key is re-derived on demand and
/// never stored here.
#[derive(Debug, Clone)]
pub struct SubWallet {
    pub index: u32,
    pub address: Address,
    pub funded_amount: U256,
    pub last_trade_at: Option<SystemTime>,
}

/// Summary of one `ensure_funded` campaign run.
#[derive(Debug, Clone, Default)]
pub struct FundingReport {
    pub topped_up: usize,
    pub skipped: usize,
    pub transfers: Vec<H256>,
}
