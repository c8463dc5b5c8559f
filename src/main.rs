use anyhow::Result;
use launch_arb::{
    arbitrage::{Planner, PlannerConfig},
    amm::PoolReader,
    chain::{ChainClient, HttpChain},
    config::{load_gas_config, AppConfig},
    curve::CurveReader,
    errors::AppError,
    funding::{FundingConfig, FundingCoordinator},
    models::ExecStatus,
    pipeline::{ExecutionPipeline, PipelineConfig},
    utils, wallet,
};
use ethers::signers::{LocalWallet, Signer};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    let cfg = AppConfig::load();
    let gas_cfg = load_gas_config();
    tracing::info!(
        campaign = %cfg.campaign_id,
        wallets = cfg.wallet_count,
        min_profit_bps = cfg.min_profit_bps,
        "[INIT] launch-arb starting"
    );

    let http = HttpChain::new(&cfg.rpc_url)?;
    let chain: Arc<dyn ChainClient> = Arc::new(http.clone());

    // Funding campaign: derive the roster, then top everything up before a
    // single trade is attempted. The treasury key never signs trades.
    let treasury = LocalWallet::from_bytes(&cfg.master_key)?;
    let mut wallets = wallet::derive_campaign(&cfg.master_key, &cfg.campaign_id, cfg.wallet_count)?;
    let funding = FundingCoordinator::new(
        chain.clone(),
        treasury,
        FundingConfig {
            confirm_timeout: Duration::from_secs(cfg.confirm_timeout_secs),
            ..FundingConfig::default()
        },
    );
    let report = funding.ensure_funded(&mut wallets, cfg.fund_target_wei).await?;
    tracing::info!(
        topped_up = report.topped_up,
        skipped = report.skipped,
        "[INIT] funding complete"
    );
    let wallets = Arc::new(Mutex::new(wallets));

    // Venue readers -------------------------------------------------------
    let pool = PoolReader::new(http.provider(), cfg.state_view, cfg.pool_id).await?;
    let curve = CurveReader::new(http.provider(), cfg.curve, cfg.token).await?;
    tracing::info!(pool_id = ?cfg.pool_id, token = ?cfg.token, "[INIT] venue readers ready");

    let planner = Arc::new(Planner::new(
        pool,
        curve,
        PlannerConfig {
            token: cfg.token,
            amm_tick_spacing: cfg.amm_tick_spacing,
            amm_hooks: cfg.amm_hooks,
            curve_tick_spacing: cfg.curve_tick_spacing,
            curve_hooks: cfg.curve,
            slippage_bps: cfg.slippage_bps,
            min_profit_bps: cfg.min_profit_bps,
        },
    ));
    let pipeline = Arc::new(ExecutionPipeline::new(
        chain.clone(),
        planner.clone(),
        PipelineConfig {
            router: cfg.router,
            confirm_timeout: Duration::from_secs(cfg.confirm_timeout_secs),
            gas_units: gas_cfg.gas_units,
            gas_multiplier: gas_cfg.gas_multiplier,
            ..PipelineConfig::default()
        },
    ));

    // Background gas watcher (gwei estimate for heartbeat context).
    let (gas_tx, gas_rx) = watch::channel::<f64>(0.0);
    let _gas_handle = utils::spawn_gas_price_watcher(chain.clone(), gas_tx, 10);

    // Detection loop: every pass re-reads both venues, nothing is cached
    // across cycles.
    let mut ticker = tokio::time::interval(Duration::from_secs(cfg.poll_interval_secs));
    let mut ticks: u64 = 0;
    let mut next_wallet: u32 = 0;
    loop {
        ticker.tick().await;
        ticks += 1;

        let opportunity = match planner.scan().await {
            Ok(found) => found,
            Err(AppError::UninitializedPool { pool }) => {
                tracing::warn!(%pool, "[SCAN] venue not tradeable this cycle");
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "[SCAN] venue read failed");
                continue;
            }
        };

        let Some(opp) = opportunity else {
            if ticks % 5 == 0 {
                let gas_gwei = *gas_rx.borrow();
                tracing::info!(gas_gwei, "[HEARTBEAT] no opps above threshold");
            }
            continue;
        };

        tracing::info!(
            spread_bps = opp.spread_bps,
            direction = ?opp.direction,
            trade_amount = opp.trade_amount,
            expected_profit = opp.expected_profit,
            "[OPP] opportunity found"
        );

        let index = next_wallet % cfg.wallet_count;
        next_wallet = next_wallet.wrapping_add(1);
        let signer = wallet::derive(&cfg.master_key, &cfg.campaign_id, index)?;

        // Distinct sub-wallets trade in parallel; the pipeline's per-wallet
        // lock keeps each nonce sequence single-owner.
        let pipeline = pipeline.clone();
        let wallets = wallets.clone();
        tokio::spawn(async move {
            match pipeline.execute(&opp, &signer).await {
                Ok(result) => {
                    match result.status {
                        ExecStatus::Success => {
                            if let Ok(mut roster) = wallets.lock() {
                                if let Some(entry) =
                                    roster.iter_mut().find(|w| w.index == index)
                                {
                                    entry.last_trade_at = Some(SystemTime::now());
                                }
                            }
                            tracing::info!(
                                wallet = index,
                                tx_hash = ?result.tx_hash,
                                gas_used = ?result.gas_used,
                                profit_floor = ?result.realized_profit,
                                "[EXEC] success"
                            );
                        }
                        ExecStatus::TimedOut => tracing::warn!(
                            wallet = index,
                            tx_hash = ?result.tx_hash,
                            "[EXEC] timed out; left for reconciliation"
                        ),
                        ExecStatus::Reverted => tracing::warn!(
                            wallet = index,
                            tx_hash = ?result.tx_hash,
                            "[EXEC] reverted after splits, abandoned"
                        ),
                        ExecStatus::SimFailed => tracing::warn!(
                            wallet = index,
                            error = ?result.error,
                            "[EXEC] simulation failed, never broadcast"
                        ),
                    }
                }
                Err(e) => tracing::warn!(wallet = index, error = %e, "[EXEC] attempt aborted"),
            }
        });
    }
}
