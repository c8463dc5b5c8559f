//! Live plan construction.
//!
//! The planner is the only place where detector output meets venue state:
//! it re-reads both venues, sizes the opportunity, and turns it into a
//! circular [`SwapPlan`] (quote -> token on the buy venue, token -> quote on
//! the sell venue) that the router executes atomically.

use crate::amm::{price_impact, virtual_reserves, PoolReader, SwapSide};
use crate::arbitrage::find_opportunity;
use crate::curve::CurveReader;
use crate::errors::{AppError, Result};
use crate::models::{ArbOpportunity, TradeDirection};
use crate::pipeline::PlanSource;
use crate::router::{PathKey, SwapPlan};
use async_trait::async_trait;
use ethers::types::Address;
use futures::future::try_join;

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Launch token; the quote side of both venues is the native asset.
    pub token: Address,
    pub amm_tick_spacing: i32,
    pub amm_hooks: Address,
    pub curve_tick_spacing: i32,
    /// The curve venue's hook contract (usually the launch contract itself).
    pub curve_hooks: Address,
    /// Haircut applied to the estimated output when setting the on-chain
    /// minimum, in basis points.
    pub slippage_bps: u32,
    pub min_profit_bps: i32,
}

pub struct Planner {
    pool: PoolReader,
    curve: CurveReader,
    cfg: PlannerConfig,
}

impl Planner {
    pub fn new(pool: PoolReader, curve: CurveReader, cfg: PlannerConfig) -> Self {
        Self { pool, curve, cfg }
    }

    /// One detection pass over fresh snapshots of both venues. The reads
    /// share no mutable state and run concurrently.
    pub async fn scan(&self) -> Result<Option<ArbOpportunity>> {
        let (pool_state, curve_state) =
            try_join(self.pool.snapshot(), self.curve.snapshot()).await?;
        let amm = virtual_reserves(&pool_state)?;
        let curve = curve_state.reserves()?;
        Ok(find_opportunity(
            &curve,
            curve_state.fee_ppm,
            &amm,
            pool_state.lp_fee_ppm,
            self.cfg.min_profit_bps,
        ))
    }
}

#[async_trait]
impl PlanSource for Planner {
    async fn build_plan(
        &self,
        direction: TradeDirection,
        amount_quote: f64,
        recipient: Address,
    ) -> Result<SwapPlan> {
        if !amount_quote.is_finite() || amount_quote < 1.0 {
            return Err(AppError::Other(format!(
                "trade amount too small to plan: {amount_quote}"
            )));
        }

        // Fresh state for every plan; split retries must never price off
        // the snapshot that produced the failure.
        let (pool_state, curve_state) =
            try_join(self.pool.snapshot(), self.curve.snapshot()).await?;
        let amm = virtual_reserves(&pool_state)?;
        let curve = curve_state.reserves()?;

        let native = Address::zero();
        let amm_hop = PathKey {
            intermediate: self.cfg.token,
            fee_ppm: pool_state.lp_fee_ppm,
            tick_spacing: self.cfg.amm_tick_spacing,
            hooks: self.cfg.amm_hooks,
        };
        let curve_hop = PathKey {
            intermediate: self.cfg.token,
            fee_ppm: curve_state.fee_ppm,
            tick_spacing: self.cfg.curve_tick_spacing,
            hooks: self.cfg.curve_hooks,
        };
        let back_out = |mut hop: PathKey| {
            hop.intermediate = native;
            hop
        };

        let (buy, buy_fee, sell, sell_fee, path) = match direction {
            TradeDirection::BuyAmmSellCurve => (
                &amm,
                pool_state.lp_fee_ppm,
                &curve,
                curve_state.fee_ppm,
                vec![amm_hop, back_out(curve_hop)],
            ),
            TradeDirection::BuyCurveSellAmm => (
                &curve,
                curve_state.fee_ppm,
                &amm,
                pool_state.lp_fee_ppm,
                vec![curve_hop, back_out(amm_hop)],
            ),
        };

        let buy_leg = price_impact(buy, amount_quote, SwapSide::QuoteIn, buy_fee)?;
        let sell_leg = price_impact(sell, buy_leg.amount_out, SwapSide::BaseIn, sell_fee)?;

        let amount_in = amount_quote as u128;
        let min_amount_out = min_out_with_floor(amount_in, sell_leg.amount_out, self.cfg.slippage_bps);

        Ok(SwapPlan {
            token_in: native,
            token_out: native,
            amount_in,
            min_amount_out,
            path,
            recipient,
        })
    }
}

/// Minimum output: the slippage-adjusted estimate, floored at principal
/// plus one wei so an executed trade can never realize a loss.
fn min_out_with_floor(amount_in: u128, expected_out: f64, slippage_bps: u32) -> u128 {
    let haircut = expected_out * (1.0 - slippage_bps as f64 / 10_000.0);
    let adjusted = if haircut.is_finite() && haircut > 0.0 {
        haircut as u128
    } else {
        0
    };
    adjusted.max(amount_in.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_out_keeps_the_principal_floor() {
        // Estimate below principal: the floor wins.
        assert_eq!(min_out_with_floor(1_000, 900.0, 50), 1_001);
        // Estimate well above principal: the haircut wins.
        assert_eq!(min_out_with_floor(1_000, 2_000.0, 50), 1_990);
    }

    #[test]
    fn min_out_survives_garbage_estimates() {
        assert_eq!(min_out_with_floor(1_000, f64::NAN, 50), 1_001);
        assert_eq!(min_out_with_floor(1_000, -5.0, 50), 1_001);
    }
}
