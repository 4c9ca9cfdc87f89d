//! Local script execution
//!
//! Runs every input of a signed transaction through libbitcoinconsensus
//! against the funded locking script, so a broken unlocking script (wrong
//! key, wrong secret) is caught before anything reaches the network.

use bitcoin::consensus::encode::serialize;
use bitcoin::Amount;

use super::{SignedDraft, VerifiedDraft};
use crate::error::BtcSwapError;

/// Standard script verification flags
pub const VERIFY_FLAGS: u32 = bitcoinconsensus::VERIFY_P2SH
    | bitcoinconsensus::VERIFY_DERSIG
    | bitcoinconsensus::VERIFY_NULLDUMMY
    | bitcoinconsensus::VERIFY_CHECKLOCKTIMEVERIFY
    | bitcoinconsensus::VERIFY_CHECKSEQUENCEVERIFY
    | bitcoinconsensus::VERIFY_WITNESS;

#[derive(Clone, Copy, Debug)]
pub struct LocalVerifier {
    flags: u32,
}

impl Default for LocalVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalVerifier {
    pub fn new() -> Self {
        Self {
            flags: VERIFY_FLAGS,
        }
    }

    pub fn with_flags(flags: u32) -> Self {
        Self { flags }
    }

    /// Execute each input's unlocking script against the funded locking
    /// script and the value recorded for that input.
    pub fn verify(&self, signed: SignedDraft) -> Result<VerifiedDraft, BtcSwapError> {
        let inputs = signed.tx.input.len();
        if signed.funding.spent_values.len() != inputs {
            return Err(BtcSwapError::Verification {
                input: signed.funding.spent_values.len().min(inputs),
                reason: format!(
                    "{} spent values recorded for {} inputs",
                    signed.funding.spent_values.len(),
                    inputs
                ),
            });
        }

        let tx_bytes = serialize(&signed.tx);
        for (input_index, value) in signed.funding.spent_values.iter().enumerate() {
            signed
                .funding
                .script_pubkey
                .verify_with_flags(input_index, Amount::from_sat(*value), &tx_bytes, self.flags)
                .map_err(|e| BtcSwapError::Verification {
                    input: input_index,
                    reason: e.to_string(),
                })?;
        }

        log::debug!("All {} inputs of {} verified", inputs, signed.txid());

        Ok(VerifiedDraft {
            tx: signed.tx,
            funding: signed.funding,
        })
    }
}
