//! Unlocking script assembly for legacy (pre-segwit) inputs

use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::secp256k1::{All, Message, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::Script;

use super::{FundedDraft, SignedDraft, SpendSource};
use crate::error::BtcSwapError;

/// Caller hook that pushes extra data (e.g. a swap secret) after the public
/// key and before the redeem script.
pub type ScriptExtension = dyn Fn(Builder) -> Builder + Send + Sync;

/// Signs every input of a funded draft with one key
pub struct SignatureAssembler<'a> {
    secp: &'a Secp256k1<All>,
    secret_key: &'a SecretKey,
    serialized_public_key: &'a [u8],
}

impl<'a> SignatureAssembler<'a> {
    /// `serialized_public_key` is pushed as-is, so its encoding (compressed
    /// or not) must match what the locking script hashes.
    pub fn new(
        secp: &'a Secp256k1<All>,
        secret_key: &'a SecretKey,
        serialized_public_key: &'a [u8],
    ) -> Self {
        Self {
            secp,
            secret_key,
            serialized_public_key,
        }
    }

    /// Fill each input's unlocking script with
    /// `<sig> <pubkey> [extension] [redeem_script]`.
    ///
    /// Plain spends sign against the funded locking script, contract spends
    /// against the redeem script.
    pub fn sign(
        &self,
        funded: FundedDraft,
        source: &SpendSource<'_>,
        extension: Option<&ScriptExtension>,
    ) -> Result<SignedDraft, BtcSwapError> {
        let script_code: &Script = source
            .redeem_script()
            .unwrap_or(&funded.funding.script_pubkey);
        let redeem_push = source
            .redeem_script()
            .map(|redeem| push_bytes(redeem.to_bytes()))
            .transpose()?;

        let mut signed_tx = funded.tx.clone();
        let sighash_cache = SighashCache::new(&funded.tx);

        for input_index in 0..funded.tx.input.len() {
            let sighash = sighash_cache
                .legacy_signature_hash(input_index, script_code, EcdsaSighashType::All.to_u32())
                .map_err(|e| BtcSwapError::Signing {
                    input: input_index,
                    reason: e.to_string(),
                })?;

            let message = Message::from_digest(sighash.to_byte_array());
            let signature = self.secp.sign_ecdsa(&message, self.secret_key);

            let mut sig_with_hashtype = signature.serialize_der().to_vec();
            sig_with_hashtype.push(EcdsaSighashType::All.to_u32() as u8);

            let mut builder = Builder::new()
                .push_slice(push_bytes(sig_with_hashtype)?)
                .push_slice(push_bytes(self.serialized_public_key.to_vec())?);
            if let Some(extend) = extension {
                builder = extend(builder);
            }
            if let Some(redeem) = &redeem_push {
                builder = builder.push_slice(redeem);
            }

            signed_tx.input[input_index].script_sig = builder.into_script();
        }

        log::debug!("Signed {} inputs of {}", signed_tx.input.len(), signed_tx.compute_txid());

        Ok(SignedDraft {
            tx: signed_tx,
            funding: funded.funding,
        })
    }
}

fn push_bytes(bytes: Vec<u8>) -> Result<PushBytesBuf, BtcSwapError> {
    PushBytesBuf::try_from(bytes).map_err(|e| BtcSwapError::MalformedScript(e.to_string()))
}
