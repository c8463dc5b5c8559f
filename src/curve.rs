//! Bonding-curve launch venue integration.
//!
//! The launch venue prices a token as a function of supply sold, exposed on
//! chain as a pair of virtual reserves. Reading those into the same
//! [`VirtualReserves`] shape the pool math uses lets one impact model price
//! both venues.

use crate::amm::VirtualReserves;
use crate::errors::{AppError, Result};
use ethers::{
    contract::abigen,
    providers::{Http, Provider},
    types::Address,
};
use std::sync::Arc;

abigen!(
    LaunchCurve,
    r#"[
        function getCurveState(address token) view returns (uint128 virtualBase, uint128 virtualQuote, uint24 feePpm, bool graduated)
    ]"#,
);

/// Snapshot of the launch curve for one token. Ephemeral, like `PoolState`.
#[derive(Clone, Debug)]
pub struct CurveState {
    pub virtual_base: u128,
    pub virtual_quote: u128,
    pub fee_ppm: u32,
    /// A graduated curve has migrated its liquidity out and no longer
    /// quotes; treat like an uninitialized pool.
    pub graduated: bool,
}

impl CurveState {
    pub fn is_tradeable(&self) -> bool {
        !self.graduated && self.virtual_base > 0 && self.virtual_quote > 0
    }

    pub fn reserves(&self) -> Result<VirtualReserves> {
        if !self.is_tradeable() {
            return Err(AppError::UninitializedPool {
                pool: format!(
                    "curve base={} quote={} graduated={}",
                    self.virtual_base, self.virtual_quote, self.graduated
                ),
            });
        }
        Ok(VirtualReserves {
            base: self.virtual_base as f64,
            quote: self.virtual_quote as f64,
        })
    }

    /// Spot quote-per-base price on the curve.
    pub fn spot_price(&self) -> Result<f64> {
        Ok(self.reserves()?.spot_price())
    }
}

/// Handle for reading one token's launch curve.
#[derive(Clone)]
pub struct CurveReader {
    contract: LaunchCurve<Provider<Http>>,
    token: Address,
}

impl CurveReader {
    pub async fn new(provider: Provider<Http>, curve: Address, token: Address) -> Result<Self> {
        let contract = LaunchCurve::new(curve, Arc::new(provider));
        let reader = Self { contract, token };
        reader.snapshot().await?; // sanity-check
        Ok(reader)
    }

    pub async fn snapshot(&self) -> Result<CurveState> {
        let (virtual_base, virtual_quote, fee_ppm, graduated) =
            self.contract.get_curve_state(self.token).call().await?;
        Ok(CurveState {
            virtual_base,
            virtual_quote,
            fee_ppm,
            graduated,
        })
    }

    pub fn token(&self) -> Address {
        self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graduated_curve_refuses_to_quote() {
        let state = CurveState {
            virtual_base: 1_000,
            virtual_quote: 2_000,
            fee_ppm: 10_000,
            graduated: true,
        };
        assert!(state.reserves().is_err());
    }

    #[test]
    fn spot_price_is_quote_over_base() {
        let state = CurveState {
            virtual_base: 4_000_000,
            virtual_quote: 1_000_000,
            fee_ppm: 10_000,
            graduated: false,
        };
        assert!((state.spot_price().unwrap() - 0.25).abs() < 1e-12);
    }
}
