use thiserror::Error;

use crate::{AccountId, Amount};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SavingsError {
    #[error("can't save zero value")]
    ZeroAmount,

    #[error("Insufficient balance: account={account}, available={available}, requested={requested}")]
    InsufficientBalance {
        account: AccountId,
        available: Amount,
        requested: Amount,
    },

    #[error("Invalid recipient: cannot send to the null address")]
    InvalidRecipient,

    #[error("Invalid caller: the null address cannot act on the ledger")]
    InvalidCaller,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("Transfer to {recipient} failed: {reason}")]
    TransferFailed { recipient: AccountId, reason: String },

    #[error("Call depth exceeded: limit={0}")]
    CallDepthExceeded(usize),

    #[error("Invalid account id: {0}")]
    InvalidAccountId(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<serde_json::Error> for SavingsError {
    fn from(err: serde_json::Error) -> Self {
        SavingsError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for SavingsError {
    fn from(err: std::io::Error) -> Self {
        SavingsError::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SavingsError>;
