//! Campaign funding.
//!
//! Top up sub-wallets from the treasury before trading starts. The whole
//! batch is checked against the treasury balance first; a campaign is never
//! partially funded and then left to fail quietly. Re-running a campaign is
//! safe: wallets already at target are skipped.

use crate::chain::ChainClient;
use crate::errors::{AppError, Result};
use crate::models::{FundingReport, SubWallet};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{TransactionRequest, U256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const TRANSFER_GAS: u64 = 21_000;

#[derive(Debug, Clone)]
pub struct FundingConfig {
    pub confirm_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            confirm_timeout: Duration::from_secs(90),
            receipt_poll_interval: Duration::from_secs(2),
        }
    }
}

pub struct FundingCoordinator {
    chain: Arc<dyn ChainClient>,
    treasury: LocalWallet,
    cfg: FundingConfig,
}

impl FundingCoordinator {
    pub fn new(chain: Arc<dyn ChainClient>, treasury: LocalWallet, cfg: FundingConfig) -> Self {
        Self {
            chain,
            treasury,
            cfg,
        }
    }

    /// Bring every wallet up to `target` wei of native balance.
    ///
    /// Transfers run sequentially, each awaited to a receipt before the next,
    /// so the treasury nonce sequence stays trivial.
    pub async fn ensure_funded(
        &self,
        wallets: &mut [SubWallet],
        target: U256,
    ) -> Result<FundingReport> {
        let mut report = FundingReport::default();
        let mut shortfalls = Vec::new();

        for (slot, wallet) in wallets.iter_mut().enumerate() {
            let balance = self.chain.balance(wallet.address).await?;
            wallet.funded_amount = balance;
            if balance >= target {
                report.skipped += 1;
            } else {
                shortfalls.push((slot, target - balance));
            }
        }
        if shortfalls.is_empty() {
            info!(skipped = report.skipped, "[FUND] all wallets at target");
            return Ok(report);
        }

        // Whole-batch affordability check before the first transfer.
        let gas_price = self.chain.gas_price().await?;
        let gas_headroom =
            U256::from(TRANSFER_GAS) * gas_price * U256::from(shortfalls.len() as u64);
        let required: U256 = shortfalls
            .iter()
            .fold(gas_headroom, |acc, (_, amount)| acc + *amount);
        let available = self.chain.balance(self.treasury.address()).await?;
        if available < required {
            return Err(AppError::FundingShortfall {
                required_wei: required,
                available_wei: available,
            });
        }

        let chain_id = self.chain.chain_id().await?;
        let signer = self.treasury.clone().with_chain_id(chain_id);

        for (slot, amount) in shortfalls {
            let wallet_address = wallets[slot].address;
            let nonce = self.chain.transaction_count(signer.address()).await?;
            let request = TransactionRequest::pay(wallet_address, amount)
                .from(signer.address())
                .gas(TRANSFER_GAS)
                .gas_price(gas_price)
                .nonce(nonce)
                .chain_id(chain_id);
            let tx: TypedTransaction = request.into();
            let signature = signer.sign_transaction_sync(&tx)?;
            let tx_hash = self.chain.send_raw_transaction(tx.rlp_signed(&signature)).await?;
            info!(wallet = ?wallet_address, %amount, ?tx_hash, "[FUND] transfer sent");

            self.await_transfer(tx_hash).await?;
            wallets[slot].funded_amount = target;
            report.topped_up += 1;
            report.transfers.push(tx_hash);
        }

        info!(
            topped_up = report.topped_up,
            skipped = report.skipped,
            "[FUND] campaign funded"
        );
        Ok(report)
    }

    async fn await_transfer(&self, tx_hash: ethers::types::H256) -> Result<()> {
        let deadline = Instant::now() + self.cfg.confirm_timeout;
        loop {
            if let Some(receipt) = self.chain.transaction_receipt(tx_hash).await? {
                let ok = receipt.status.map(|s| s.as_u64() == 1).unwrap_or(false);
                if ok {
                    return Ok(());
                }
                warn!(?tx_hash, "[FUND] transfer reverted");
                return Err(AppError::Other(format!("funding transfer {tx_hash:?} reverted")));
            }
            if Instant::now() >= deadline {
                return Err(AppError::ConfirmationTimeout { tx_hash });
            }
            tokio::time::sleep(self.cfg.receipt_poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use crate::wallet;

    const MASTER: [u8; 32] = [3u8; 32];

    fn coordinator(chain: Arc<MockChain>) -> FundingCoordinator {
        let treasury = wallet::derive(&MASTER, "treasury", 0).unwrap();
        let cfg = FundingConfig {
            confirm_timeout: Duration::from_millis(20),
            receipt_poll_interval: Duration::from_millis(5),
        };
        FundingCoordinator::new(chain, treasury, cfg)
    }

    fn campaign(count: u32) -> Vec<SubWallet> {
        wallet::derive_campaign(&MASTER, "fund-test", count).unwrap()
    }

    fn rich_treasury(chain: &MockChain) {
        let treasury = wallet::derive(&MASTER, "treasury", 0).unwrap();
        chain.set_balance(treasury.address(), U256::exp10(19)); // 10 ETH
    }

    #[tokio::test]
    async fn funds_empty_wallets_and_is_idempotent() {
        let chain = Arc::new(MockChain::default());
        rich_treasury(&chain);
        chain.receipt_statuses.lock().unwrap().extend([1, 1, 1]);
        let coordinator = coordinator(chain.clone());
        let mut wallets = campaign(3);
        let target = U256::exp10(17); // 0.1 ETH

        let first = coordinator.ensure_funded(&mut wallets, target).await.unwrap();
        assert_eq!(first.topped_up, 3);
        assert_eq!(first.skipped, 0);
        assert_eq!(chain.broadcast_count(), 3);

        // Transfers landed; live balances now sit at target.
        for wallet in &wallets {
            chain.set_balance(wallet.address, target);
        }
        let second = coordinator.ensure_funded(&mut wallets, target).await.unwrap();
        assert_eq!(second.topped_up, 0, "second run must issue zero transfers");
        assert_eq!(second.skipped, 3);
        assert_eq!(chain.broadcast_count(), 3);
    }

    #[tokio::test]
    async fn tops_up_only_the_underfunded_wallet() {
        let chain = Arc::new(MockChain::default());
        rich_treasury(&chain);
        chain.receipt_statuses.lock().unwrap().push(1);
        let coordinator = coordinator(chain.clone());
        let mut wallets = campaign(3);
        let target = U256::exp10(17);
        chain.set_balance(wallets[0].address, target);
        chain.set_balance(wallets[2].address, target * 2);

        let report = coordinator.ensure_funded(&mut wallets, target).await.unwrap();
        assert_eq!(report.topped_up, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(chain.broadcast_count(), 1);
        assert_eq!(wallets[1].funded_amount, target);
    }

    #[tokio::test]
    async fn treasury_shortfall_aborts_before_any_transfer() {
        let chain = Arc::new(MockChain::default());
        // Treasury can cover one wallet but not the batch.
        let treasury = wallet::derive(&MASTER, "treasury", 0).unwrap();
        chain.set_balance(treasury.address(), U256::exp10(17));
        let coordinator = coordinator(chain.clone());
        let mut wallets = campaign(4);

        let err = coordinator
            .ensure_funded(&mut wallets, U256::exp10(17))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FundingShortfall { .. }));
        assert_eq!(chain.broadcast_count(), 0, "nothing may be sent on shortfall");
    }
}
