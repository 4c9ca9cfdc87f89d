//! Chain data provider interface
//!
//! - Unspent output listing
//! - Address summaries (received/sent totals, history)
//! - Raw transaction broadcast
//!
//! Implementations make a single attempt per call and report failures as
//! [`BtcSwapError::Network`] or [`BtcSwapError::SubmissionRejected`]; retrying
//! is the caller's job (see [`crate::retry::RetryPolicy`]).

pub mod blockchain_info;

use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::{Address, ScriptBuf, Txid};

use crate::error::BtcSwapError;
use crate::network::NetworkParams;

pub use blockchain_info::BlockchainInfoClient;

/// Page size used when summing an address balance
pub const BALANCE_UTXO_LIMIT: u32 = 1000;

/// An unspent output as observed on chain
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnspentOutput {
    pub txid: Txid,
    pub vout: u32,
    pub script_pubkey: ScriptBuf,
    pub amount_sats: u64,
}

/// Input of a transaction in an address history
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryInput {
    /// Address that owned the spent output, if the provider knows it
    pub prev_out_address: Option<String>,
    /// Unlocking script (hex)
    pub script_sig_hex: String,
}

/// Transaction in an address history
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryTransaction {
    pub txid: String,
    pub inputs: Vec<HistoryInput>,
}

/// Received/sent totals and history of an address
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressSummary {
    pub address: String,
    pub total_received: u64,
    pub total_sent: u64,
    pub transactions: Vec<HistoryTransaction>,
}

impl AddressSummary {
    /// The address has received at least `value` satoshis in total
    pub fn funded(&self, value: u64) -> bool {
        self.total_received >= value
    }

    /// Some output of the address has been spent
    pub fn spent(&self) -> bool {
        self.total_sent > 0
    }

    /// Unlocking script of the first input spending from this address
    pub fn spending_script_sig(&self) -> Option<&str> {
        self.transactions
            .iter()
            .flat_map(|tx| tx.inputs.iter())
            .find(|input| input.prev_out_address.as_deref() == Some(self.address.as_str()))
            .map(|input| input.script_sig_hex.as_str())
    }
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Parameters of the network this client talks to.
    fn network_params(&self) -> &NetworkParams;

    /// Unspent outputs of `address` in provider order.
    async fn list_unspent(
        &self,
        address: &Address,
        limit: u32,
        min_confirmations: u32,
    ) -> Result<Vec<UnspentOutput>, BtcSwapError>;

    async fn address_summary(&self, address: &Address) -> Result<AddressSummary, BtcSwapError>;

    /// Submit a serialized transaction.
    async fn broadcast(&self, raw_tx: &[u8]) -> Result<(), BtcSwapError>;

    /// Sum of the unspent outputs of `address`.
    async fn balance(&self, address: &Address, confirmations: u32) -> Result<u64, BtcSwapError> {
        let utxos = self
            .list_unspent(address, BALANCE_UTXO_LIMIT, confirmations)
            .await?;
        Ok(utxos.iter().map(|u| u.amount_sats).sum())
    }
}

/// Lets several accounts share one client
#[async_trait]
impl<T: ChainClient + ?Sized> ChainClient for Arc<T> {
    fn network_params(&self) -> &NetworkParams {
        (**self).network_params()
    }

    async fn list_unspent(
        &self,
        address: &Address,
        limit: u32,
        min_confirmations: u32,
    ) -> Result<Vec<UnspentOutput>, BtcSwapError> {
        (**self).list_unspent(address, limit, min_confirmations).await
    }

    async fn address_summary(&self, address: &Address) -> Result<AddressSummary, BtcSwapError> {
        (**self).address_summary(address).await
    }

    async fn broadcast(&self, raw_tx: &[u8]) -> Result<(), BtcSwapError> {
        (**self).broadcast(raw_tx).await
    }

    async fn balance(&self, address: &Address, confirmations: u32) -> Result<u64, BtcSwapError> {
        (**self).balance(address, confirmations).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> AddressSummary {
        AddressSummary {
            address: "2N8hwP1WmJrFF5QWABn38y63uYLhnJYJYTF".to_string(),
            total_received: 50_000,
            total_sent: 0,
            transactions: vec![],
        }
    }

    #[test]
    fn test_funded_and_spent() {
        let mut s = summary();
        assert!(s.funded(50_000));
        assert!(!s.funded(50_001));
        assert!(!s.spent());
        s.total_sent = 50_000;
        assert!(s.spent());
    }

    #[test]
    fn test_spending_script_sig() {
        let mut s = summary();
        s.transactions = vec![
            HistoryTransaction {
                txid: "aa".into(),
                inputs: vec![HistoryInput {
                    prev_out_address: Some("mzBc4XEFSdzCDcTxAgf6EZXgsZWpztRhef".into()),
                    script_sig_hex: "00".into(),
                }],
            },
            HistoryTransaction {
                txid: "bb".into(),
                inputs: vec![
                    HistoryInput::default(),
                    HistoryInput {
                        prev_out_address: Some(s.address.clone()),
                        script_sig_hex: "51".into(),
                    },
                ],
            },
        ];
        assert_eq!(s.spending_script_sig(), Some("51"));
    }
}
