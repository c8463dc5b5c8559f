//! Concentrated-liquidity pool integration: state reads and pricing math.

use crate::errors::Result;
use ethers::{
    contract::abigen,
    providers::{Http, Provider},
    types::{Address, H256},
};
use std::sync::Arc;

pub mod math;
pub mod state;

pub use math::{price_impact, price_quote_per_base, virtual_reserves, ImpactQuote, SwapSide};
pub use state::{PoolState, VirtualReserves};

abigen!(
    StateView,
    r#"[
        function getSlot0(bytes32 poolId) view returns (uint160 sqrtPriceX96, int24 tick, uint24 protocolFee, uint24 lpFee)
        function getLiquidity(bytes32 poolId) view returns (uint128 liquidity)
    ]"#,
);

/// Handle for reading one pool's state through the StateView contract.
#[derive(Clone)]
pub struct PoolReader {
    view: StateView<Provider<Http>>,
    pool_id: [u8; 32],
}

impl PoolReader {
    pub async fn new(provider: Provider<Http>, state_view: Address, pool_id: H256) -> Result<Self> {
        let view = StateView::new(state_view, Arc::new(provider));
        let reader = Self {
            view,
            pool_id: pool_id.0,
        };
        reader.snapshot().await?; // sanity-check
        Ok(reader)
    }

    /// Fetch a fresh `PoolState` snapshot. Called once per decision; the
    /// result must not be reused across cycles.
    pub async fn snapshot(&self) -> Result<PoolState> {
        let (sqrt_price_x96, tick, _protocol_fee, lp_fee) =
            self.view.get_slot_0(self.pool_id).call().await?;
        let liquidity = self.view.get_liquidity(self.pool_id).call().await?;
        Ok(PoolState::new(sqrt_price_x96, tick as i32, liquidity, lp_fee))
    }

    pub fn pool_id(&self) -> H256 {
        H256::from(self.pool_id)
    }
}
