use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::{Address, ScriptBuf, Txid};
use serde::Deserialize;

use super::{AddressSummary, ChainClient, HistoryInput, HistoryTransaction, UnspentOutput};
use crate::config::SwapConfig;
use crate::error::BtcSwapError;
use crate::network::NetworkParams;

/// Body returned by blockchain.info for an address without unspent outputs
const NO_FREE_OUTPUTS: &str = "No free outputs to spend";
/// Marker present in the body of an accepted `/pushtx`
const SUBMITTED_MARKER: &str = "Transaction Submitted";
/// Page size used when the caller passes a zero limit
const DEFAULT_PAGE: u32 = 250;

#[derive(Debug, Deserialize)]
struct RawUnspent {
    #[serde(default)]
    unspent_outputs: Vec<RawUnspentOutput>,
}

#[derive(Debug, Deserialize)]
struct RawUnspentOutput {
    tx_hash: String,
    tx_output_n: u32,
    script: String,
    value: u64,
}

#[derive(Debug, Deserialize)]
struct RawAddress {
    address: String,
    #[serde(default)]
    total_received: u64,
    #[serde(default)]
    total_sent: u64,
    #[serde(default)]
    txs: Vec<RawTransaction>,
}

#[derive(Debug, Deserialize)]
struct RawTransaction {
    #[serde(default)]
    hash: String,
    #[serde(default)]
    inputs: Vec<RawInput>,
}

#[derive(Debug, Deserialize)]
struct RawInput {
    prev_out: Option<RawPrevOut>,
    #[serde(default)]
    script: String,
}

#[derive(Debug, Deserialize)]
struct RawPrevOut {
    addr: Option<String>,
}

impl RawUnspentOutput {
    fn into_unspent(self) -> Result<UnspentOutput, BtcSwapError> {
        // blockchain.info reports `tx_hash` in internal byte order
        let hash_bytes = hex::decode(&self.tx_hash)
            .map_err(|e| BtcSwapError::network(format!("Invalid tx_hash {}: {}", self.tx_hash, e)))?;
        let txid = Txid::from_slice(&hash_bytes)
            .map_err(|e| BtcSwapError::network(format!("Invalid tx_hash {}: {}", self.tx_hash, e)))?;
        let script = hex::decode(&self.script)
            .map_err(|e| BtcSwapError::network(format!("Invalid script {}: {}", self.script, e)))?;

        Ok(UnspentOutput {
            txid,
            vout: self.tx_output_n,
            script_pubkey: ScriptBuf::from_bytes(script),
            amount_sats: self.value,
        })
    }
}

impl From<RawAddress> for AddressSummary {
    fn from(raw: RawAddress) -> Self {
        let transactions = raw
            .txs
            .into_iter()
            .map(|tx| HistoryTransaction {
                txid: tx.hash,
                inputs: tx
                    .inputs
                    .into_iter()
                    .map(|input| HistoryInput {
                        prev_out_address: input.prev_out.and_then(|p| p.addr),
                        script_sig_hex: input.script,
                    })
                    .collect(),
            })
            .collect();

        Self {
            address: raw.address,
            total_received: raw.total_received,
            total_sent: raw.total_sent,
            transactions,
        }
    }
}

/// [`ChainClient`] backed by the blockchain.info explorer API
pub struct BlockchainInfoClient {
    base_url: String,
    params: NetworkParams,
    http: reqwest::Client,
}

impl BlockchainInfoClient {
    /// Client for a named network using its public blockchain.info endpoint
    pub fn new(network: &str) -> Result<Self, BtcSwapError> {
        let params = NetworkParams::from_name(network)?;
        let base_url = params
            .api_url
            .ok_or_else(|| BtcSwapError::UnsupportedNetwork(params.name.to_string()))?
            .to_string();
        Ok(Self::with_url(base_url, params))
    }

    /// Client for an explicit endpoint (self-hosted or test server)
    pub fn with_url(base_url: impl Into<String>, params: NetworkParams) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            params,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &SwapConfig) -> Result<Self, BtcSwapError> {
        let url = config
            .api_url
            .clone()
            .ok_or_else(|| BtcSwapError::UnsupportedNetwork(config.network.name.to_string()))?;
        Ok(Self::with_url(url, config.network.clone()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_text(&self, url: &str) -> Result<(reqwest::StatusCode, String), BtcSwapError> {
        log::debug!("GET {}", url);
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl ChainClient for BlockchainInfoClient {
    fn network_params(&self) -> &NetworkParams {
        &self.params
    }

    async fn list_unspent(
        &self,
        address: &Address,
        limit: u32,
        min_confirmations: u32,
    ) -> Result<Vec<UnspentOutput>, BtcSwapError> {
        let limit = if limit == 0 { DEFAULT_PAGE } else { limit };
        let url = format!(
            "{}/unspent?active={}&confirmations={}&limit={}",
            self.base_url, address, min_confirmations, limit
        );

        let (status, body) = self.get_text(&url).await?;
        if body.trim() == NO_FREE_OUTPUTS {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(BtcSwapError::network(format!(
                "Unspent lookup for {} failed ({}): {}",
                address, status, body
            )));
        }

        let raw: RawUnspent = serde_json::from_str(&body)
            .map_err(|e| BtcSwapError::network(format!("Invalid unspent response: {}", e)))?;
        raw.unspent_outputs
            .into_iter()
            .map(RawUnspentOutput::into_unspent)
            .collect()
    }

    async fn address_summary(&self, address: &Address) -> Result<AddressSummary, BtcSwapError> {
        let url = format!("{}/rawaddr/{}", self.base_url, address);

        let (status, body) = self.get_text(&url).await?;
        if !status.is_success() {
            return Err(BtcSwapError::network(format!(
                "Address lookup for {} failed ({}): {}",
                address, status, body
            )));
        }

        let raw: RawAddress = serde_json::from_str(&body)
            .map_err(|e| BtcSwapError::network(format!("Invalid address response: {}", e)))?;
        Ok(raw.into())
    }

    async fn broadcast(&self, raw_tx: &[u8]) -> Result<(), BtcSwapError> {
        let url = format!("{}/pushtx", self.base_url);
        let tx_hex = hex::encode(raw_tx);

        log::debug!("Broadcasting transaction to: {}", url);

        let response = self
            .http
            .post(&url)
            .form(&[("tx", tx_hex.as_str())])
            .send()
            .await?;
        let body = response.text().await?;

        if !body.contains(SUBMITTED_MARKER) {
            return Err(BtcSwapError::SubmissionRejected(body));
        }
        Ok(())
    }
}
