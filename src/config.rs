//! Configuration loader and application settings.

use ethers::types::{Address, H256, U256};

/// Consolidated application configuration. Required values abort startup
/// with a clear message before any network call is made.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// RPC endpoint for the Ethereum-compatible node.
    pub rpc_url: String,
    /// Master signing key, 32 bytes. Derives sub-wallets and funds them;
    /// never signs trades itself.
    pub master_key: [u8; 32],
    /// Opaque campaign identifier mixed into sub-wallet derivation.
    pub campaign_id: String,
    /// Number of sub-wallets to derive and fund.
    pub wallet_count: u32,
    /// StateView contract exposing `getSlot0` / `getLiquidity`.
    pub state_view: Address,
    /// Swap router executing the action stream.
    pub router: Address,
    /// Bonding-curve launch venue contract.
    pub curve: Address,
    /// V4-style pool id of the concentrated-liquidity pool.
    pub pool_id: H256,
    /// Launch token under arbitrage (quote side is the native asset).
    pub token: Address,
    /// Tick spacing of the AMM pool (part of its routing key).
    pub amm_tick_spacing: i32,
    /// Hook contract of the AMM pool, zero when unhooked.
    pub amm_hooks: Address,
    /// Tick spacing of the curve venue's pool key.
    pub curve_tick_spacing: i32,
    /// Haircut on estimated output when setting the on-chain minimum, bps.
    pub slippage_bps: u32,
    /// Minimum net profit threshold in basis points.
    pub min_profit_bps: i32,
    /// Detection loop interval in seconds.
    pub poll_interval_secs: u64,
    /// Per-wallet native-asset funding target in wei.
    pub fund_target_wei: U256,
    /// Receipt-wait timeout in seconds.
    pub confirm_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables, failing fast on
    /// anything required.
    pub fn load() -> Self {
        let rpc_url = std::env::var("RPC_URL")
            .expect("Set RPC_URL env var to your Ethereum node HTTP endpoint");
        let master_key = parse_master_key(
            &std::env::var("MASTER_KEY").expect("Set MASTER_KEY env var (32-byte hex, no trades are signed with it directly)"),
        );
        let campaign_id =
            std::env::var("CAMPAIGN_ID").expect("Set CAMPAIGN_ID env var to label this campaign");
        let state_view: Address = std::env::var("STATE_VIEW_ADDRESS")
            .expect("Set STATE_VIEW_ADDRESS env var")
            .parse()
            .expect("STATE_VIEW_ADDRESS must be a valid address");
        let router: Address = std::env::var("ROUTER_ADDRESS")
            .expect("Set ROUTER_ADDRESS env var")
            .parse()
            .expect("ROUTER_ADDRESS must be a valid address");
        let curve: Address = std::env::var("CURVE_ADDRESS")
            .expect("Set CURVE_ADDRESS env var")
            .parse()
            .expect("CURVE_ADDRESS must be a valid address");
        let pool_id: H256 = std::env::var("POOL_ID")
            .expect("Set POOL_ID env var to the 32-byte pool id")
            .parse()
            .expect("POOL_ID must be 32-byte hex");
        let token: Address = std::env::var("TOKEN_ADDRESS")
            .expect("Set TOKEN_ADDRESS env var")
            .parse()
            .expect("TOKEN_ADDRESS must be a valid address");

        let amm_tick_spacing: i32 = std::env::var("AMM_TICK_SPACING")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .unwrap_or(60);
        let amm_hooks: Address = std::env::var("AMM_HOOKS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_else(Address::zero);
        let curve_tick_spacing: i32 = std::env::var("CURVE_TICK_SPACING")
            .unwrap_or_else(|_| "200".into())
            .parse()
            .unwrap_or(200);
        let slippage_bps: u32 = std::env::var("SLIPPAGE_BPS")
            .unwrap_or_else(|_| "50".into())
            .parse()
            .unwrap_or(50);
        let wallet_count =
            parse_wallet_count(&std::env::var("WALLET_COUNT").unwrap_or_else(|_| "4".into()));
        let min_profit_bps: i32 = std::env::var("MIN_PROFIT_BPS")
            .unwrap_or_else(|_| "50".into())
            .parse()
            .unwrap_or(50);
        let poll_interval_secs: u64 = std::env::var("POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .unwrap_or(3);
        let fund_target_eth: f64 = std::env::var("FUND_TARGET_ETH")
            .unwrap_or_else(|_| "0.05".into())
            .parse()
            .unwrap_or(0.05);
        let confirm_timeout_secs: u64 = std::env::var("CONFIRM_TIMEOUT_SECS")
            .unwrap_or_else(|_| "90".into())
            .parse()
            .unwrap_or(90);

        Self {
            rpc_url,
            master_key,
            campaign_id,
            wallet_count,
            state_view,
            router,
            curve,
            pool_id,
            token,
            amm_tick_spacing,
            amm_hooks,
            curve_tick_spacing,
            slippage_bps,
            min_profit_bps,
            poll_interval_secs,
            fund_target_wei: eth_to_wei(fund_target_eth),
            confirm_timeout_secs,
        }
    }
}

/// Gas configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct GasConfig {
    pub gas_units: u64,
    pub gas_multiplier: f64,
}

/// Load gas configuration from environment variables.
pub fn load_gas_config() -> GasConfig {
    let gas_units: u64 = std::env::var("GAS_UNITS")
        .unwrap_or_else(|_| "350000".into())
        .parse()
        .unwrap_or(350_000);

    let gas_multiplier: f64 = std::env::var("GAS_MULTIPLIER")
        .unwrap_or_else(|_| "1.2".into())
        .parse()
        .unwrap_or(1.2);

    GasConfig {
        gas_units,
        gas_multiplier,
    }
}

/// An empty roster would make the dispatch loop divide by zero on the first
/// opportunity, long after startup. Reject it here instead.
fn parse_wallet_count(raw: &str) -> u32 {
    let count: u32 = raw.parse().unwrap_or(4);
    assert!(count >= 1, "WALLET_COUNT must be at least 1");
    count
}

fn parse_master_key(hex_key: &str) -> [u8; 32] {
    let stripped = hex_key.trim_start_matches("0x");
    let bytes = hex::decode(stripped).expect("MASTER_KEY must be valid hex");
    let mut key = [0u8; 32];
    assert_eq!(bytes.len(), 32, "MASTER_KEY must be exactly 32 bytes");
    key.copy_from_slice(&bytes);
    key
}

/// Convert a human ETH amount to wei, saturating on nonsense input.
pub fn eth_to_wei(amount: f64) -> U256 {
    if !amount.is_finite() || amount <= 0.0 {
        return U256::zero();
    }
    let wei = amount * 1e18;
    U256::from(wei as u128)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eth_to_wei_converts_whole_and_fractional() {
        assert_eq!(eth_to_wei(1.0), U256::exp10(18));
        assert_eq!(eth_to_wei(0.05), U256::from(50_000_000_000_000_000u128));
    }

    #[test]
    fn eth_to_wei_rejects_garbage() {
        assert_eq!(eth_to_wei(-1.0), U256::zero());
        assert_eq!(eth_to_wei(f64::NAN), U256::zero());
    }

    #[test]
    fn wallet_count_parses_with_default() {
        assert_eq!(parse_wallet_count("3"), 3);
        assert_eq!(parse_wallet_count("junk"), 4);
    }

    #[test]
    #[should_panic(expected = "WALLET_COUNT must be at least 1")]
    fn zero_wallet_count_aborts_startup() {
        parse_wallet_count("0");
    }

    #[test]
    fn master_key_roundtrip() {
        let hexed = format!("0x{}", "ab".repeat(32));
        let key = parse_master_key(&hexed);
        assert_eq!(key, [0xabu8; 32]);
    }
}
