//! btc-swap: UTXO-funded Bitcoin transactions and hash-lock contract spends
//!
//! This crate builds, funds, signs, locally verifies and broadcasts legacy
//! Bitcoin transactions for one account key, including the payments into and
//! out of the hash-lock contracts used by atomic swaps.
//!
//! # Architecture
//!
//! - **Chain client**: explorer queries and broadcast behind [`ChainClient`]
//! - **Contract**: hash-lock redeem script and its P2SH address
//! - **Transaction pipeline**: funding, signing, verification, broadcast
//! - **Account**: key, address policy and the send operation
//!
//! # Example
//!
//! ```ignore
//! use btc_swap::{hash_secret, Account, BlockchainInfoClient, HashLockContract, SendRequest, SwapConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = SwapConfig::from_env();
//! let client = BlockchainInfoClient::from_config(&config)?;
//! let account = Account::with_config(client, secret_key, &config);
//!
//! // Lock 50,000 sats in a contract that the counterparty claims with the secret
//! let contract = HashLockContract::new(hash_secret(&secret), their_pkh, config.network.network)?;
//! let script = contract.script_pubkey();
//! let request = SendRequest::new(1000).with_precondition(move |draft| {
//!     draft.add_output(50_000, script);
//!     true
//! });
//! let txid = account.send_transaction(request, &CancellationToken::new()).await?;
//! ```

pub mod account;
pub mod chain;
pub mod config;
pub mod contract;
pub mod error;
pub mod network;
pub mod retry;
pub mod tx;

// Re-exports for convenience
pub use account::{Account, Precondition, SendRequest, TRANSFER_FEE};
pub use chain::{AddressSummary, BlockchainInfoClient, ChainClient, UnspentOutput};
pub use config::SwapConfig;
pub use contract::{hash_secret, HashLockContract, SECRET_LEN};
pub use error::BtcSwapError;
pub use network::NetworkParams;
pub use retry::{PollPolicy, RetryPolicy};
pub use tx::{
    FundedDraft, FundingState, Postcondition, ScriptExtension, SendStage, SignedDraft,
    SpendSource, TransactionDraft, VerifiedDraft,
};

// Common result type
pub type Result<T> = std::result::Result<T, BtcSwapError>;
