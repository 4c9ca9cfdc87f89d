//! Error types for btc-swap operations
//!
//! Every error is scoped to a single send operation or query. Local failures
//! abort the pipeline immediately; transient network failures are absorbed by
//! [`crate::retry::RetryPolicy`] until the caller cancels.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BtcSwapError {
    #[error("insufficient balance in {address} required:{required} current:{available}")]
    InsufficientBalance {
        address: String,
        required: u64,
        available: u64,
    },

    #[error(
        "failed to fund the transaction from {address}: mismatched script public keys \
         (required:{required} selected:{selected})"
    )]
    MismatchedScript {
        address: String,
        required: u64,
        selected: u64,
    },

    #[error("pre-condition check failed")]
    PreconditionFailed,

    #[error("post-condition check failed")]
    PostconditionFailed,

    #[error("Signing error on input {input}: {reason}")]
    Signing { input: usize, reason: String },

    #[error("Verification error on input {input}: {reason}")]
    Verification { input: usize, reason: String },

    #[error("Malformed script: {0}")]
    MalformedScript(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("error while submitting Bitcoin transaction: {0}")]
    SubmissionRejected(String),

    #[error("timed out")]
    TimedOut,

    #[error("unsupported network {0}")]
    UnsupportedNetwork(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("no spending transactions for {0}")]
    NoSpendingTransactions(String),
}

impl BtcSwapError {
    /// Whether the failure is worth retrying under backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::SubmissionRejected(_))
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn insufficient_balance(address: impl Into<String>, required: u64, available: u64) -> Self {
        Self::InsufficientBalance {
            address: address.into(),
            required,
            available,
        }
    }
}

impl From<reqwest::Error> for BtcSwapError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
