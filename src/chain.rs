//! JSON-RPC boundary.
//!
//! Every component that touches the chain goes through [`ChainClient`]
//! instead of holding its own provider, so tests can swap in a mock and
//! count exactly which calls were made.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Read-only `eth_call` with the exact calldata and value that would be
    /// broadcast.
    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes>;

    /// Submit a signed raw transaction, returning its hash.
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256>;

    /// `eth_getTransactionReceipt`; `None` while still pending.
    async fn transaction_receipt(&self, tx_hash: H256) -> Result<Option<TransactionReceipt>>;

    async fn balance(&self, address: Address) -> Result<U256>;

    /// Transaction count including pending, where the node supports it.
    async fn transaction_count(&self, address: Address) -> Result<U256>;

    async fn gas_price(&self) -> Result<U256>;

    async fn chain_id(&self) -> Result<u64>;
}

/// Production client backed by an HTTP provider.
#[derive(Clone)]
pub struct HttpChain {
    provider: Provider<Http>,
}

impl HttpChain {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| AppError::Config(format!("invalid RPC url: {e}")))?;
        Ok(Self { provider })
    }

    pub fn provider(&self) -> Provider<Http> {
        self.provider.clone()
    }
}

#[async_trait]
impl ChainClient for HttpChain {
    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes> {
        Ok(self.provider.call(tx, None).await?)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256> {
        let pending = self.provider.send_raw_transaction(raw).await?;
        Ok(pending.tx_hash())
    }

    async fn transaction_receipt(&self, tx_hash: H256) -> Result<Option<TransactionReceipt>> {
        Ok(self.provider.get_transaction_receipt(tx_hash).await?)
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        Ok(self.provider.get_balance(address, None).await?)
    }

    async fn transaction_count(&self, address: Address) -> Result<U256> {
        Ok(self
            .provider
            .get_transaction_count(address, Some(ethers::types::BlockNumber::Pending.into()))
            .await?)
    }

    async fn gas_price(&self) -> Result<U256> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chainid().await?.as_u64())
    }
}
