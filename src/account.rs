//! Account: one private key, one default address, and the send pipeline
//!
//! `send_transaction` runs precondition, funding, signing, local
//! verification and broadcast in that order for a single draft. The chain
//! queries (`script_funded`, `script_spent`, ...) are the building blocks for
//! postconditions and for watching the other side of a swap.

use std::str::FromStr;

use bitcoin::secp256k1::{All, Secp256k1, SecretKey};
use bitcoin::{Address, PubkeyHash, PublicKey, ScriptBuf, Txid};
use tokio_util::sync::CancellationToken;

use crate::chain::{AddressSummary, ChainClient};
use crate::config::SwapConfig;
use crate::contract::HashLockContract;
use crate::error::BtcSwapError;
use crate::network::NetworkParams;
use crate::retry::{sleep_or_cancel, PollPolicy, RetryPolicy};
use crate::tx::{
    BroadcastController, CoinSelector, LocalVerifier, Postcondition, ScriptExtension, SendStage,
    SignatureAssembler, SpendSource, TransactionDraft,
};

/// Flat fee of a plain [`Account::transfer`], in satoshis
pub const TRANSFER_FEE: u64 = 1000;

/// Predicate over the unsigned draft, run once before any network call.
/// May add outputs; returning false aborts the send.
pub type Precondition<'a> = Box<dyn FnOnce(&mut TransactionDraft) -> bool + Send + 'a>;

/// Parameters of one [`Account::send_transaction`] call.
///
/// `'a` borrows the request's parts; `'p` is what the postcondition's
/// future may borrow, so a postcondition can hold on to the account.
pub struct SendRequest<'a, 'p> {
    /// Contract to spend from; `None` spends the account's own address
    pub contract: Option<&'a HashLockContract>,
    pub fee: u64,
    pub precondition: Option<Precondition<'a>>,
    pub extension: Option<&'a ScriptExtension>,
    pub postcondition: Option<&'a Postcondition<'p>>,
}

impl<'a, 'p> SendRequest<'a, 'p> {
    pub fn new(fee: u64) -> Self {
        Self {
            contract: None,
            fee,
            precondition: None,
            extension: None,
            postcondition: None,
        }
    }

    pub fn spending_contract(mut self, contract: &'a HashLockContract) -> Self {
        self.contract = Some(contract);
        self
    }

    pub fn with_precondition(
        mut self,
        precondition: impl FnOnce(&mut TransactionDraft) -> bool + Send + 'a,
    ) -> Self {
        self.precondition = Some(Box::new(precondition));
        self
    }

    pub fn with_extension(mut self, extension: &'a ScriptExtension) -> Self {
        self.extension = Some(extension);
        self
    }

    pub fn with_postcondition(mut self, postcondition: &'a Postcondition<'p>) -> Self {
        self.postcondition = Some(postcondition);
        self
    }
}

pub struct Account<C: ChainClient> {
    client: C,
    secret_key: SecretKey,
    secp: Secp256k1<All>,
    retry: RetryPolicy,
    poll: PollPolicy,
    utxo_limit: u32,
}

impl<C: ChainClient> Account<C> {
    /// Account with default retry/poll timing
    pub fn new(client: C, secret_key: SecretKey) -> Self {
        Self::with_config(client, secret_key, &SwapConfig::default())
    }

    /// Account taking retry, poll and listing settings from `config`.
    ///
    /// Network parameters always come from the client.
    pub fn with_config(client: C, secret_key: SecretKey, config: &SwapConfig) -> Self {
        if client.network_params().network != config.network.network {
            log::warn!(
                "Config is for {} but the chain client talks to {}, using the client's network",
                config.network.name,
                client.network_params().name
            );
        }
        Self {
            client,
            secret_key,
            secp: Secp256k1::new(),
            retry: config.retry.clone(),
            poll: config.poll.clone(),
            utxo_limit: config.utxo_limit,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn network_params(&self) -> &NetworkParams {
        self.client.network_params()
    }

    /// Public key encoded per the network's key policy
    pub fn public_key(&self) -> PublicKey {
        let inner = self.secret_key.public_key(&self.secp);
        PublicKey {
            compressed: self.network_params().compressed_keys,
            inner,
        }
    }

    /// 33 bytes on networks using compressed keys, 65 otherwise
    pub fn serialized_public_key(&self) -> Vec<u8> {
        self.public_key().to_bytes()
    }

    pub fn public_key_hash(&self) -> PubkeyHash {
        self.public_key().pubkey_hash()
    }

    /// Default P2PKH address
    pub fn address(&self) -> Address {
        Address::p2pkh(self.public_key_hash(), self.network_params().network)
    }

    /// Parse `address` and check that it belongs to this account's network
    pub fn parse_address(&self, address: &str) -> Result<Address, BtcSwapError> {
        Address::from_str(address)
            .map_err(|e| BtcSwapError::InvalidAddress(format!("{}: {}", address, e)))?
            .require_network(self.network_params().network)
            .map_err(|e| BtcSwapError::InvalidAddress(format!("{}: {}", address, e)))
    }

    pub async fn balance(
        &self,
        address: &Address,
        confirmations: u32,
        cancel: &CancellationToken,
    ) -> Result<u64, BtcSwapError> {
        self.retry
            .run(cancel, "Balance lookup", || self.client.balance(address, confirmations))
            .await
    }

    async fn summary(
        &self,
        address: &Address,
        cancel: &CancellationToken,
    ) -> Result<AddressSummary, BtcSwapError> {
        self.retry
            .run(cancel, "Address lookup", || self.client.address_summary(address))
            .await
    }

    /// Whether `address` has received at least `value`, with the total received
    pub async fn script_funded(
        &self,
        address: &Address,
        value: u64,
        cancel: &CancellationToken,
    ) -> Result<(bool, u64), BtcSwapError> {
        let summary = self.summary(address, cancel).await?;
        Ok((summary.funded(value), summary.total_received))
    }

    pub async fn script_spent(
        &self,
        address: &Address,
        cancel: &CancellationToken,
    ) -> Result<bool, BtcSwapError> {
        Ok(self.summary(address, cancel).await?.spent())
    }

    /// Whether `address` received at least `value` and has been spent from
    pub async fn script_redeemed(
        &self,
        address: &Address,
        value: u64,
        cancel: &CancellationToken,
    ) -> Result<(bool, u64), BtcSwapError> {
        let summary = self.summary(address, cancel).await?;
        Ok((
            summary.funded(value) && summary.spent(),
            summary.total_received,
        ))
    }

    /// Wait until `address` has been spent from, then return the unlocking
    /// script that spent it.
    pub async fn script_from_spent_p2sh(
        &self,
        address: &Address,
        cancel: &CancellationToken,
    ) -> Result<ScriptBuf, BtcSwapError> {
        let summary = loop {
            let summary = self.summary(address, cancel).await?;
            if summary.spent() {
                break summary;
            }
            log::debug!("{} not spent yet, checking again in {:?}", address, self.poll.interval);
            if !sleep_or_cancel(cancel, self.poll.interval).await {
                return Err(BtcSwapError::TimedOut);
            }
        };

        let script_hex = summary
            .spending_script_sig()
            .ok_or_else(|| BtcSwapError::NoSpendingTransactions(address.to_string()))?;
        let bytes = hex::decode(script_hex)
            .map_err(|e| BtcSwapError::MalformedScript(format!("{}: {}", script_hex, e)))?;
        Ok(ScriptBuf::from_bytes(bytes))
    }

    /// Pay `value` to `to` from the account's own address
    pub async fn transfer(
        &self,
        to: &str,
        value: u64,
        cancel: &CancellationToken,
    ) -> Result<Txid, BtcSwapError> {
        let recipient = self.parse_address(to)?.script_pubkey();
        let request = SendRequest::new(TRANSFER_FEE).with_precondition(move |draft| {
            draft.add_output(value, recipient);
            true
        });
        let txid = self.send_transaction(request, cancel).await?;
        log::info!("{}", self.format_transaction_view("Transfer sent", &txid));
        Ok(txid)
    }

    /// Build, fund, sign, verify and broadcast one transaction.
    pub async fn send_transaction(
        &self,
        request: SendRequest<'_, '_>,
        cancel: &CancellationToken,
    ) -> Result<Txid, BtcSwapError> {
        let SendRequest {
            contract,
            fee,
            precondition,
            extension,
            postcondition,
        } = request;

        let mut stage = SendStage::Init;
        let result: Result<Txid, BtcSwapError> = async {
            let mut draft = TransactionDraft::new();

            stage = SendStage::PreconditionCheck;
            log::debug!("Send stage: {}", stage);
            if let Some(precondition) = precondition {
                if !precondition(&mut draft) {
                    return Err(BtcSwapError::PreconditionFailed);
                }
            }

            let source = match contract {
                Some(contract) => SpendSource::Contract(contract),
                None => SpendSource::Plain(self.address()),
            };

            stage = SendStage::Funding;
            log::debug!("Send stage: {}", stage);
            let funded = CoinSelector::new(&self.client, &self.retry, cancel, self.utxo_limit)
                .fund(draft, &source, fee)
                .await?;

            stage = SendStage::Signing;
            log::debug!("Send stage: {}", stage);
            let public_key = self.serialized_public_key();
            let signed = SignatureAssembler::new(&self.secp, &self.secret_key, &public_key)
                .sign(funded, &source, extension)?;

            stage = SendStage::Verifying;
            log::debug!("Send stage: {}", stage);
            let verified = LocalVerifier::new().verify(signed)?;

            stage = SendStage::Broadcasting;
            log::debug!("Send stage: {}", stage);
            BroadcastController::new(&self.client, &self.retry, &self.poll)
                .submit(&verified, postcondition, cancel)
                .await
        }
        .await;

        match &result {
            Ok(txid) => log::debug!("Send stage: {} ({})", SendStage::Done, txid),
            Err(e) => log::warn!("Send failed during {}: {}", stage, e),
        }
        result
    }

    pub fn format_transaction_view(&self, msg: &str, txid: &Txid) -> String {
        self.network_params()
            .format_transaction_view(msg, &txid.to_string())
    }
}
