//! Pricing math over pool snapshots.
//!
//! All of this is single-tick, constant-product approximation in f64, the
//! same trade-off the rest of the bot is built around: cheap client-side
//! estimates, with correctness enforced by on-chain minimum-output checks.

use crate::amm::state::{PoolState, VirtualReserves};
use crate::errors::{AppError, Result};

/// Which token enters the pool in a swap leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapSide {
    /// Base in, quote out; price (quote per base) moves down.
    BaseIn,
    /// Quote in, base out; price moves up.
    QuoteIn,
}

/// Estimated outcome of an exact-in swap leg.
#[derive(Debug, Clone, Copy)]
pub struct ImpactQuote {
    pub amount_out: f64,
    /// Realized quote-per-base price of the leg.
    pub effective_price: f64,
    /// Deviation of the effective price from spot, in basis points.
    pub impact_bps: f64,
}

/// Convert a Q96 fixed-point value to f64.
///
/// Goes through the decimal string so the full 160-bit value survives; the
/// mantissa truncation that follows is well below our tolerance.
pub fn q96_to_f64(q96: &ethers::types::U256) -> f64 {
    let int_val = q96.to_string().parse::<f64>().unwrap_or(0.0);
    int_val / 2.0_f64.powi(96)
}

/// Pool price in quote per base: `(sqrtPriceX96 / 2^96)^2`.
pub fn price_quote_per_base(sqrt_price_x96: &ethers::types::U256) -> f64 {
    let sqrt_price = q96_to_f64(sqrt_price_x96);
    sqrt_price * sqrt_price
}

/// Inverse pool price, base per quote.
pub fn price_base_per_quote(sqrt_price_x96: &ethers::types::U256) -> f64 {
    let p = price_quote_per_base(sqrt_price_x96);
    if p <= 0.0 { 0.0 } else { 1.0 / p }
}

/// Virtual reserves at the current tick: `base = L / sqrt(P)`,
/// `quote = L * sqrt(P)`, so that `base * quote == L^2`.
pub fn virtual_reserves(state: &PoolState) -> Result<VirtualReserves> {
    if !state.is_initialized() {
        return Err(AppError::UninitializedPool {
            pool: format!("tick={} liquidity={}", state.tick, state.liquidity),
        });
    }
    let sqrt_price = q96_to_f64(&state.sqrt_price_x96);
    if sqrt_price <= 0.0 || !sqrt_price.is_finite() {
        return Err(AppError::UninitializedPool {
            pool: format!("tick={} sqrt_price={sqrt_price}", state.tick),
        });
    }
    let liquidity = state.liquidity as f64;
    Ok(VirtualReserves {
        base: liquidity / sqrt_price,
        quote: liquidity * sqrt_price,
    })
}

/// Exact-in output for a trade against the local constant-product curve,
/// with the LP fee applied multiplicatively to the output.
///
/// `new_other = base * quote / (self + dx)`; the difference is the gross
/// output. Ignores tick-range boundaries entirely, so it over-estimates
/// output for trades that would cross one.
pub fn price_impact(
    reserves: &VirtualReserves,
    amount_in: f64,
    side: SwapSide,
    fee_ppm: u32,
) -> Result<ImpactQuote> {
    if reserves.base <= 0.0 || reserves.quote <= 0.0 {
        return Err(AppError::UninitializedPool {
            pool: format!("base={} quote={}", reserves.base, reserves.quote),
        });
    }
    if !amount_in.is_finite() || amount_in <= 0.0 {
        return Err(AppError::Other(format!(
            "non-positive trade size: {amount_in}"
        )));
    }

    let k = reserves.base * reserves.quote;
    let spot = reserves.quote / reserves.base;
    let fee_keep = 1.0 - fee_ppm as f64 / 1e6;

    let (amount_out, effective_price, impact_bps) = match side {
        SwapSide::BaseIn => {
            let new_quote = k / (reserves.base + amount_in);
            let out = (reserves.quote - new_quote) * fee_keep;
            let eff = out / amount_in;
            (out, eff, (1.0 - eff / spot) * 10_000.0)
        }
        SwapSide::QuoteIn => {
            let new_base = k / (reserves.quote + amount_in);
            let out = (reserves.base - new_base) * fee_keep;
            let eff = if out > 0.0 { amount_in / out } else { 0.0 };
            (out, eff, (eff / spot - 1.0) * 10_000.0)
        }
    };

    Ok(ImpactQuote {
        amount_out,
        effective_price,
        impact_bps,
    })
}
