use ethers::providers::{Http, Provider};
use ethers::types::{H256, U256};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ethers::providers::ProviderError),

    #[error("Contract error: {0}")]
    Contract(#[from] ethers::contract::ContractError<Provider<Http>>),

    #[error("ABI error: {0}")]
    Abi(#[from] ethers::abi::Error),

    #[error("Wallet error: {0}")]
    Wallet(#[from] ethers::signers::WalletError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Pool {pool} is uninitialized (zero price or liquidity)")]
    UninitializedPool { pool: String },

    #[error("Swap encoding rejected: {0}")]
    Encoding(String),

    #[error("Treasury shortfall: need {required_wei} wei, have {available_wei} wei")]
    FundingShortfall {
        required_wei: U256,
        available_wei: U256,
    },

    #[error("Transfer {tx_hash:?} unconfirmed after timeout")]
    ConfirmationTimeout { tx_hash: H256 },

    #[error("Other: {0}")]
    Other(String),
}
