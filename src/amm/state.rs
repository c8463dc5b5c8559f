use ethers::types::U256;

/// Minimal immutable snapshot of a concentrated-liquidity pool, as read from
/// the StateView contract. Refetched before every decision; price moves every
/// block, so nothing here is ever cached across cycles.
#[derive(Clone, Debug)]
pub struct PoolState {
    /// Current sqrt(quote/base) in Q96 (`slot0.sqrtPriceX96`).
    pub sqrt_price_x96: U256,
    /// Current tick index (`slot0.tick`).
    pub tick: i32,
    /// Current in-range liquidity L, raw uint128 value.
    pub liquidity: u128,
    /// LP fee in hundredths of a bip (ppm), per the pool manager convention.
    pub lp_fee_ppm: u32,
}

impl PoolState {
    pub fn new(sqrt_price_x96: U256, tick: i32, liquidity: u128, lp_fee_ppm: u32) -> Self {
        Self {
            sqrt_price_x96,
            tick,
            liquidity,
            lp_fee_ppm,
        }
    }

    /// A pool with no price or no in-range liquidity cannot be traded and
    /// must be skipped for the cycle.
    pub fn is_initialized(&self) -> bool {
        !self.sqrt_price_x96.is_zero() && self.liquidity > 0
    }
}

/// Reserves implied by liquidity and price at the current tick only.
///
/// This approximates constant-product behavior for trades that stay inside
/// the active tick range; it ignores range boundaries and diverges for
/// larger trades. Output derived from it is an estimate, backstopped by the
/// on-chain minimum-output check.
#[derive(Clone, Copy, Debug)]
pub struct VirtualReserves {
    /// Base-token reserve, raw units.
    pub base: f64,
    /// Quote-token reserve, raw units.
    pub quote: f64,
}

impl VirtualReserves {
    /// Instantaneous quote-per-base price at these reserves.
    pub fn spot_price(&self) -> f64 {
        if self.base <= 0.0 {
            return 0.0;
        }
        self.quote / self.base
    }
}
