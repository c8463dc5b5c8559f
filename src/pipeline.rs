//! Simulate-before-broadcast execution pipeline.
//!
//! State machine per attempt:
//! `Built -> Simulated -> {SimFailed} -> Broadcast -> Confirming ->
//! {Success | Reverted | TimedOut}`.
//!
//! Nothing is ever broadcast without a passing simulation of the exact
//! calldata and value. A reverted or sim-failed attempt is retried with the
//! trade size halved and a plan rebuilt from fresh venue state, at most
//! `max_split_depth` times; a moving market is not chased beyond that.
//! `TimedOut` is terminal but ambiguous: the transaction may still land, so
//! it is reported distinctly and left for external reconciliation.

use crate::chain::ChainClient;
use crate::errors::Result;
use crate::models::{ArbOpportunity, ExecStatus, ExecutionResult, TradeDirection};
use crate::router::{encode_swap, SwapPlan};
use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest, U256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Builds a fresh [`SwapPlan`] from live venue state. Re-invoked on every
/// attempt so a split retry never reuses stale prices.
#[async_trait]
pub trait PlanSource: Send + Sync {
    async fn build_plan(
        &self,
        direction: TradeDirection,
        amount_quote: f64,
        recipient: Address,
    ) -> Result<SwapPlan>;
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub router: Address,
    /// Maximum number of size-halving retries after a revert or sim failure.
    pub max_split_depth: u8,
    pub confirm_timeout: Duration,
    pub receipt_poll_interval: Duration,
    pub gas_units: u64,
    pub gas_multiplier: f64,
    /// Router deadline, seconds from attempt start.
    pub deadline_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            router: Address::zero(),
            max_split_depth: 2,
            confirm_timeout: Duration::from_secs(90),
            receipt_poll_interval: Duration::from_secs(2),
            gas_units: 350_000,
            gas_multiplier: 1.2,
            deadline_secs: 60,
        }
    }
}

/// Per-address mutexes. A wallet's nonce sequence is owned exclusively for
/// the whole simulate-to-confirm span; distinct wallets run in parallel.
#[derive(Default)]
pub struct WalletLocks {
    inner: StdMutex<HashMap<Address, Arc<Mutex<()>>>>,
}

impl WalletLocks {
    pub fn for_address(&self, address: Address) -> Arc<Mutex<()>> {
        self.inner
            .lock()
            .expect("wallet lock map poisoned")
            .entry(address)
            .or_default()
            .clone()
    }
}

pub struct ExecutionPipeline {
    chain: Arc<dyn ChainClient>,
    plans: Arc<dyn PlanSource>,
    cfg: PipelineConfig,
    locks: WalletLocks,
    /// Highest nonce broadcast per wallet. The node's count can lag while a
    /// timed-out transaction sits in the mempool; never reissue below this.
    issued_nonces: StdMutex<HashMap<Address, U256>>,
}

enum Confirmation {
    Success { gas_used: Option<U256> },
    Reverted { gas_used: Option<U256> },
    StillPending,
}

impl ExecutionPipeline {
    pub fn new(chain: Arc<dyn ChainClient>, plans: Arc<dyn PlanSource>, cfg: PipelineConfig) -> Self {
        Self {
            chain,
            plans,
            cfg,
            locks: WalletLocks::default(),
            issued_nonces: StdMutex::default(),
        }
    }

    /// Run one opportunity to a terminal state with the given sub-wallet.
    pub async fn execute(
        &self,
        opportunity: &ArbOpportunity,
        signer: &LocalWallet,
    ) -> Result<ExecutionResult> {
        let lock = self.locks.for_address(signer.address());
        let _nonce_guard = lock.lock().await;

        let mut amount = opportunity.trade_amount;
        let mut last_sim_error = None;

        for depth in 0..=self.cfg.max_split_depth {
            let attempt_id = Uuid::new_v4();
            let plan = self
                .plans
                .build_plan(opportunity.direction, amount, signer.address())
                .await?;
            let deadline = unix_now() + self.cfg.deadline_secs;
            // An encoding rejection here is a local invariant violation and
            // aborts the attempt without touching the RPC.
            let call = encode_swap(&plan, U256::from(deadline))?;

            let nonce = self.next_nonce(signer.address()).await?;
            let tx = self.build_tx(signer.address(), &call, nonce).await?;

            // Simulated
            if let Err(e) = self.chain.call(&tx).await {
                warn!(
                    %attempt_id,
                    depth,
                    amount,
                    error = %e,
                    "[PIPE] simulation failed, no broadcast"
                );
                last_sim_error = Some(e.to_string());
                if depth < self.cfg.max_split_depth {
                    amount /= 2.0;
                    continue;
                }
                return Ok(ExecutionResult {
                    attempt_id,
                    tx_hash: None,
                    status: ExecStatus::SimFailed,
                    gas_used: None,
                    realized_profit: None,
                    error: last_sim_error,
                });
            }

            // Broadcast. A fresh signature per attempt: the same signed
            // bytes are never re-submitted.
            let chain_id = tx.chain_id().map(|id| id.as_u64()).unwrap_or_default();
            let signer = signer.clone().with_chain_id(chain_id);
            let signature = signer.sign_transaction_sync(&tx)?;
            let raw = tx.rlp_signed(&signature);
            let tx_hash = self.chain.send_raw_transaction(raw).await?;
            self.record_nonce(signer.address(), nonce);
            info!(%attempt_id, ?tx_hash, depth, amount, "[PIPE] broadcast");

            // Confirming
            match self.await_receipt(tx_hash).await? {
                Confirmation::Success { gas_used } => {
                    return Ok(ExecutionResult {
                        attempt_id,
                        tx_hash: Some(tx_hash),
                        status: ExecStatus::Success,
                        gas_used,
                        realized_profit: profit_floor(&plan),
                        error: None,
                    });
                }
                Confirmation::Reverted { gas_used } => {
                    warn!(%attempt_id, ?tx_hash, depth, "[PIPE] reverted on-chain");
                    if depth < self.cfg.max_split_depth {
                        amount /= 2.0;
                        continue;
                    }
                    return Ok(ExecutionResult {
                        attempt_id,
                        tx_hash: Some(tx_hash),
                        status: ExecStatus::Reverted,
                        gas_used,
                        realized_profit: None,
                        error: None,
                    });
                }
                Confirmation::StillPending => {
                    warn!(
                        %attempt_id,
                        ?tx_hash,
                        "[PIPE] confirmation timed out; outcome ambiguous, not retrying"
                    );
                    return Ok(ExecutionResult {
                        attempt_id,
                        tx_hash: Some(tx_hash),
                        status: ExecStatus::TimedOut,
                        gas_used: None,
                        realized_profit: None,
                        error: None,
                    });
                }
            }
        }
        unreachable!("split loop always returns a terminal result")
    }

    /// The node's count, bumped past any nonce this pipeline already
    /// broadcast for the wallet.
    async fn next_nonce(&self, from: Address) -> Result<U256> {
        let chain_count = self.chain.transaction_count(from).await?;
        let issued = self
            .issued_nonces
            .lock()
            .expect("nonce map poisoned")
            .get(&from)
            .copied();
        Ok(match issued {
            Some(last) => chain_count.max(last + 1),
            None => chain_count,
        })
    }

    fn record_nonce(&self, from: Address, nonce: U256) {
        self.issued_nonces
            .lock()
            .expect("nonce map poisoned")
            .insert(from, nonce);
    }

    async fn build_tx(
        &self,
        from: Address,
        call: &crate::router::RouterCall,
        nonce: U256,
    ) -> Result<TypedTransaction> {
        let chain_id = self.chain.chain_id().await?;
        let gas_price = scale_gas(self.chain.gas_price().await?, self.cfg.gas_multiplier);
        let request = TransactionRequest::new()
            .from(from)
            .to(self.cfg.router)
            .gas(self.cfg.gas_units)
            .gas_price(gas_price)
            .value(call.value)
            .data(call.calldata.clone())
            .nonce(nonce)
            .chain_id(chain_id);
        Ok(request.into())
    }

    async fn await_receipt(&self, tx_hash: ethers::types::H256) -> Result<Confirmation> {
        let deadline = Instant::now() + self.cfg.confirm_timeout;
        loop {
            if let Some(receipt) = self.chain.transaction_receipt(tx_hash).await? {
                let ok = receipt.status.map(|s| s.as_u64() == 1).unwrap_or(false);
                return Ok(if ok {
                    Confirmation::Success {
                        gas_used: receipt.gas_used,
                    }
                } else {
                    Confirmation::Reverted {
                        gas_used: receipt.gas_used,
                    }
                });
            }
            if Instant::now() >= deadline {
                return Ok(Confirmation::StillPending);
            }
            tokio::time::sleep(self.cfg.receipt_poll_interval).await;
        }
    }
}

/// For a circular plan the enforced minimum output is a hard profit floor;
/// the actual fill can only be better.
fn profit_floor(plan: &SwapPlan) -> Option<U256> {
    if plan.token_in != plan.token_out {
        return None;
    }
    plan.min_amount_out
        .checked_sub(plan.amount_in)
        .map(U256::from)
}

fn scale_gas(gas_price: U256, multiplier: f64) -> U256 {
    let hundredths = (multiplier.max(1.0) * 100.0) as u64;
    gas_price * U256::from(hundredths) / U256::from(100u64)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use crate::router::PathKey;
    use std::sync::Mutex as SyncMutex;

    fn test_signer() -> LocalWallet {
        crate::wallet::derive(&[9u8; 32], "pipeline-test", 0).unwrap()
    }

    fn opportunity(amount: f64) -> ArbOpportunity {
        ArbOpportunity {
            price_curve: 1.1,
            price_amm: 1.0,
            spread_bps: 1000,
            direction: TradeDirection::BuyAmmSellCurve,
            trade_amount: amount,
            expected_profit: amount * 0.01,
        }
    }

    /// Records requested amounts and hands back a fixed circular plan.
    struct FixedPlans {
        token: Address,
        requested: SyncMutex<Vec<f64>>,
    }

    impl FixedPlans {
        fn new() -> Self {
            Self {
                token: Address::from([0x51u8; 20]),
                requested: SyncMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PlanSource for FixedPlans {
        async fn build_plan(
            &self,
            _direction: TradeDirection,
            amount_quote: f64,
            recipient: Address,
        ) -> Result<SwapPlan> {
            self.requested.lock().unwrap().push(amount_quote);
            let amount_in = amount_quote as u128;
            Ok(SwapPlan {
                token_in: Address::zero(),
                token_out: Address::zero(),
                amount_in,
                min_amount_out: amount_in + 50,
                path: vec![
                    PathKey {
                        intermediate: self.token,
                        fee_ppm: 3000,
                        tick_spacing: 60,
                        hooks: Address::zero(),
                    },
                    PathKey {
                        intermediate: Address::zero(),
                        fee_ppm: 10_000,
                        tick_spacing: 200,
                        hooks: Address::zero(),
                    },
                ],
                recipient,
            })
        }
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            router: Address::from([0xabu8; 20]),
            confirm_timeout: Duration::from_millis(20),
            receipt_poll_interval: Duration::from_millis(5),
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn failed_simulation_gates_broadcast() {
        let chain = Arc::new(MockChain::default());
        *chain.revert_on_call.lock().unwrap() = Some("TooLittleReceived".into());
        let pipeline =
            ExecutionPipeline::new(chain.clone(), Arc::new(FixedPlans::new()), fast_config());

        let result = pipeline
            .execute(&opportunity(10_000.0), &test_signer())
            .await
            .unwrap();

        assert_eq!(result.status, ExecStatus::SimFailed);
        assert!(result.tx_hash.is_none());
        assert_eq!(chain.broadcast_count(), 0, "no broadcast may ever happen");
        assert!(result.error.unwrap().contains("TooLittleReceived"));
    }

    #[tokio::test]
    async fn success_reports_profit_floor() {
        let chain = Arc::new(MockChain::succeeding());
        let plans = Arc::new(FixedPlans::new());
        let pipeline = ExecutionPipeline::new(chain.clone(), plans.clone(), fast_config());

        let result = pipeline
            .execute(&opportunity(10_000.0), &test_signer())
            .await
            .unwrap();

        assert_eq!(result.status, ExecStatus::Success);
        assert_eq!(chain.broadcast_count(), 1);
        assert_eq!(result.realized_profit, Some(U256::from(50u64)));
        assert_eq!(*plans.requested.lock().unwrap(), vec![10_000.0]);
    }

    #[tokio::test]
    async fn revert_halves_and_retries_with_fresh_plan() {
        let chain = Arc::new(MockChain::default());
        chain.receipt_statuses.lock().unwrap().extend([0, 1]);
        let plans = Arc::new(FixedPlans::new());
        let pipeline = ExecutionPipeline::new(chain.clone(), plans.clone(), fast_config());

        let result = pipeline
            .execute(&opportunity(10_000.0), &test_signer())
            .await
            .unwrap();

        assert_eq!(result.status, ExecStatus::Success);
        assert_eq!(chain.broadcast_count(), 2);
        assert_eq!(
            *plans.requested.lock().unwrap(),
            vec![10_000.0, 5_000.0],
            "retry rebuilds the plan at half size"
        );
    }

    #[tokio::test]
    async fn split_depth_is_bounded() {
        let chain = Arc::new(MockChain::default());
        // Every attempt reverts; the pipeline must stop at the depth bound.
        chain.receipt_statuses.lock().unwrap().extend([0, 0, 0, 0, 0]);
        let plans = Arc::new(FixedPlans::new());
        let pipeline = ExecutionPipeline::new(chain.clone(), plans.clone(), fast_config());

        let result = pipeline
            .execute(&opportunity(16_000.0), &test_signer())
            .await
            .unwrap();

        assert_eq!(result.status, ExecStatus::Reverted);
        assert_eq!(chain.broadcast_count(), 3, "initial try plus two splits");
        assert_eq!(
            *plans.requested.lock().unwrap(),
            vec![16_000.0, 8_000.0, 4_000.0]
        );
    }

    #[tokio::test]
    async fn nonce_advances_past_a_timed_out_attempt() {
        let chain = Arc::new(MockChain::default());
        // The node keeps reporting the same count, as a lagging latest-block
        // view would while a transaction sits in the mempool.
        *chain.stale_nonce.lock().unwrap() = Some(U256::from(7));
        let signer = test_signer();
        let pipeline =
            ExecutionPipeline::new(chain.clone(), Arc::new(FixedPlans::new()), fast_config());

        let first = pipeline.execute(&opportunity(10_000.0), &signer).await.unwrap();
        assert_eq!(first.status, ExecStatus::TimedOut);

        chain.receipt_statuses.lock().unwrap().push(1);
        let second = pipeline.execute(&opportunity(10_000.0), &signer).await.unwrap();
        assert_eq!(second.status, ExecStatus::Success);

        let raws = chain.raw_txs.lock().unwrap().clone();
        let nonces: Vec<u64> = raws
            .iter()
            .map(|raw| {
                let (tx, _sig) =
                    TypedTransaction::decode_signed(&ethers::utils::rlp::Rlp::new(raw)).unwrap();
                tx.nonce().unwrap().as_u64()
            })
            .collect();
        assert_eq!(nonces, vec![7, 8], "second trade must not reuse the pending nonce");
    }

    #[tokio::test]
    async fn missing_receipt_times_out_distinctly() {
        let chain = Arc::new(MockChain::default()); // empty receipt queue
        let pipeline =
            ExecutionPipeline::new(chain.clone(), Arc::new(FixedPlans::new()), fast_config());

        let result = pipeline
            .execute(&opportunity(10_000.0), &test_signer())
            .await
            .unwrap();

        assert_eq!(result.status, ExecStatus::TimedOut);
        assert!(result.tx_hash.is_some(), "hash kept for reconciliation");
        assert_eq!(chain.broadcast_count(), 1, "a timed-out tx is not resent");
    }
}
