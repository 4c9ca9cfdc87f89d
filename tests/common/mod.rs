#![allow(dead_code)]

/// Common test utilities for btc-swap integration tests
///
/// This module provides shared test infrastructure including:
/// - An in-memory chain that applies broadcast transactions to its UTXO set
/// - Failure injection for listings and broadcasts
/// - Account helpers with fast retry/poll timing
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::consensus::encode::deserialize;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::SecretKey;
use bitcoin::{Address, OutPoint, ScriptBuf, Transaction, Txid};
use btc_swap::chain::{HistoryInput, HistoryTransaction};
use btc_swap::{
    Account, AddressSummary, BtcSwapError, ChainClient, NetworkParams, PollPolicy, RetryPolicy,
    SwapConfig, UnspentOutput,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic test key; distinct seeds give distinct accounts
pub fn secret_key(seed: u8) -> SecretKey {
    SecretKey::from_slice(&[seed; 32]).expect("valid secret key")
}

pub fn fresh_secret() -> [u8; 32] {
    rand::random()
}

/// Config with millisecond backoff and a short polling budget
pub fn fast_config(network: NetworkParams) -> SwapConfig {
    SwapConfig {
        retry: RetryPolicy::new(Duration::from_millis(1), 1.6),
        poll: PollPolicy {
            interval: Duration::from_millis(5),
            attempts: 3,
        },
        ..SwapConfig::for_network(network)
    }
}

pub fn account(chain: &Arc<MockChain>, seed: u8) -> Account<Arc<MockChain>> {
    let config = fast_config(chain.network_params().clone());
    Account::with_config(chain.clone(), secret_key(seed), &config)
}

#[derive(Default)]
struct ChainState {
    /// (owner address, output) in listing order
    utxos: Vec<(String, UnspentOutput)>,
    received: HashMap<String, u64>,
    sent: HashMap<String, u64>,
    history: HashMap<String, Vec<HistoryTransaction>>,
    accepted: Vec<Transaction>,
    next_txid: u64,
}

/// In-memory chain data provider
pub struct MockChain {
    params: NetworkParams,
    state: Mutex<ChainState>,
    /// Broadcasts to reject with a network error before accepting
    failing_broadcasts: AtomicUsize,
    /// Listings to reject with a network error before answering
    failing_listings: AtomicUsize,
    /// Accept broadcasts without applying them to the UTXO set
    hold_broadcasts: AtomicBool,
    calls: AtomicUsize,
    broadcast_attempts: AtomicUsize,
}

impl MockChain {
    pub fn new(params: NetworkParams) -> Arc<Self> {
        Arc::new(Self {
            params,
            state: Mutex::new(ChainState::default()),
            failing_broadcasts: AtomicUsize::new(0),
            failing_listings: AtomicUsize::new(0),
            hold_broadcasts: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            broadcast_attempts: AtomicUsize::new(0),
        })
    }

    pub fn testnet() -> Arc<Self> {
        Self::new(NetworkParams::testnet())
    }

    /// Credit `address` with an output paying to its own locking script
    pub fn fund(&self, address: &Address, amount_sats: u64) -> OutPoint {
        self.fund_with_script(address, address.script_pubkey(), amount_sats)
    }

    /// Credit `address` with an output locked by an arbitrary script
    pub fn fund_with_script(
        &self,
        address: &Address,
        script_pubkey: ScriptBuf,
        amount_sats: u64,
    ) -> OutPoint {
        let mut state = self.state.lock().unwrap();
        state.next_txid += 1;
        let mut bytes = [0xabu8; 32];
        bytes[..8].copy_from_slice(&state.next_txid.to_le_bytes());
        let txid = Txid::from_byte_array(bytes);

        let owner = address.to_string();
        state.utxos.push((
            owner.clone(),
            UnspentOutput {
                txid,
                vout: 0,
                script_pubkey,
                amount_sats,
            },
        ));
        *state.received.entry(owner).or_default() += amount_sats;
        OutPoint::new(txid, 0)
    }

    pub fn fail_broadcasts(&self, count: usize) {
        self.failing_broadcasts.store(count, Ordering::SeqCst);
    }

    pub fn fail_listings(&self, count: usize) {
        self.failing_listings.store(count, Ordering::SeqCst);
    }

    pub fn hold_broadcasts(&self) {
        self.hold_broadcasts.store(true, Ordering::SeqCst);
    }

    /// Number of trait calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn broadcast_attempts(&self) -> usize {
        self.broadcast_attempts.load(Ordering::SeqCst)
    }

    /// Distinct transactions accepted so far
    pub fn accepted(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().accepted.clone()
    }

    pub fn unspent_of(&self, address: &Address) -> Vec<UnspentOutput> {
        let owner = address.to_string();
        self.state
            .lock()
            .unwrap()
            .utxos
            .iter()
            .filter(|(a, _)| *a == owner)
            .map(|(_, u)| u.clone())
            .collect()
    }

    fn apply(&self, state: &mut ChainState, tx: &Transaction) {
        let txid = tx.compute_txid();

        for input in &tx.input {
            let position = state.utxos.iter().position(|(_, u)| {
                u.txid == input.previous_output.txid && u.vout == input.previous_output.vout
            });
            let Some(position) = position else { continue };
            let (owner, spent) = state.utxos.remove(position);

            *state.sent.entry(owner.clone()).or_default() += spent.amount_sats;
            state
                .history
                .entry(owner.clone())
                .or_default()
                .push(HistoryTransaction {
                    txid: txid.to_string(),
                    inputs: vec![HistoryInput {
                        prev_out_address: Some(owner),
                        script_sig_hex: hex::encode(input.script_sig.as_bytes()),
                    }],
                });
        }

        for (vout, output) in tx.output.iter().enumerate() {
            let Ok(address) = Address::from_script(&output.script_pubkey, self.params.network)
            else {
                continue;
            };
            let owner = address.to_string();
            state.utxos.push((
                owner.clone(),
                UnspentOutput {
                    txid,
                    vout: vout as u32,
                    script_pubkey: output.script_pubkey.clone(),
                    amount_sats: output.value.to_sat(),
                },
            ));
            *state.received.entry(owner).or_default() += output.value.to_sat();
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn network_params(&self) -> &NetworkParams {
        &self.params
    }

    async fn list_unspent(
        &self,
        address: &Address,
        limit: u32,
        _min_confirmations: u32,
    ) -> Result<Vec<UnspentOutput>, BtcSwapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failing_listings
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(BtcSwapError::network("listing unavailable"));
        }

        let mut utxos = self.unspent_of(address);
        utxos.truncate(limit as usize);
        Ok(utxos)
    }

    async fn address_summary(&self, address: &Address) -> Result<AddressSummary, BtcSwapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let owner = address.to_string();
        let state = self.state.lock().unwrap();
        Ok(AddressSummary {
            address: owner.clone(),
            total_received: state.received.get(&owner).copied().unwrap_or_default(),
            total_sent: state.sent.get(&owner).copied().unwrap_or_default(),
            transactions: state.history.get(&owner).cloned().unwrap_or_default(),
        })
    }

    async fn broadcast(&self, raw_tx: &[u8]) -> Result<(), BtcSwapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.broadcast_attempts.fetch_add(1, Ordering::SeqCst);
        if self
            .failing_broadcasts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(BtcSwapError::network("connection reset by peer"));
        }

        let tx: Transaction = deserialize(raw_tx)
            .map_err(|e| BtcSwapError::SubmissionRejected(format!("undecodable: {}", e)))?;

        let mut state = self.state.lock().unwrap();
        // re-broadcast of a known transaction is a no-op
        if state.accepted.iter().any(|known| known == &tx) {
            return Ok(());
        }
        state.accepted.push(tx.clone());
        if !self.hold_broadcasts.load(Ordering::SeqCst) {
            self.apply(&mut state, &tx);
        }
        Ok(())
    }
}
