//! Hash-lock contract
//!
//! The redeem script requires the spender to reveal a 32 byte secret whose
//! SHA-256 matches the committed hash AND to sign with the key hashing to the
//! recipient's public key hash:
//!
//! ```text
//! OP_SIZE <32> OP_EQUALVERIFY OP_SHA256 <secret_hash> OP_EQUALVERIFY
//! OP_DUP OP_HASH160 <recipient_pkh> OP_EQUALVERIFY OP_CHECKSIG
//! ```
//!
//! There is no timeout/refund branch. The contract is paid through its P2SH
//! address and spent with `<sig> <pubkey> <secret> <redeem_script>`.

use bitcoin::hashes::Hash;
use bitcoin::opcodes::all::{
    OP_CHECKSIG, OP_DUP, OP_EQUALVERIFY, OP_HASH160, OP_SHA256, OP_SIZE,
};
use bitcoin::script::{Builder, Instruction};
use bitcoin::{Address, Network, PubkeyHash, Script, ScriptBuf};
use sha2::{Digest, Sha256};

use crate::error::BtcSwapError;

/// Length of the secret and of its hash
pub const SECRET_LEN: usize = 32;

/// SHA-256 of a swap secret
pub fn hash_secret(secret: &[u8; SECRET_LEN]) -> [u8; SECRET_LEN] {
    Sha256::digest(secret).into()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashLockContract {
    secret_hash: [u8; SECRET_LEN],
    recipient: PubkeyHash,
    redeem_script: ScriptBuf,
    address: Address,
}

impl HashLockContract {
    /// Build the contract for `secret_hash` payable to `recipient`
    pub fn new(
        secret_hash: [u8; SECRET_LEN],
        recipient: PubkeyHash,
        network: Network,
    ) -> Result<Self, BtcSwapError> {
        let redeem_script = build_redeem_script(&secret_hash, &recipient);
        let address = Address::p2sh(&redeem_script, network)
            .map_err(|e| BtcSwapError::MalformedScript(e.to_string()))?;

        Ok(Self {
            secret_hash,
            recipient,
            redeem_script,
            address,
        })
    }

    /// Build the contract for a P2PKH recipient address
    pub fn for_recipient(
        secret_hash: [u8; SECRET_LEN],
        recipient: &Address,
        network: Network,
    ) -> Result<Self, BtcSwapError> {
        let pubkey_hash = recipient.pubkey_hash().ok_or_else(|| {
            BtcSwapError::InvalidAddress(format!("{} is not a P2PKH address", recipient))
        })?;
        Self::new(secret_hash, pubkey_hash, network)
    }

    pub fn secret_hash(&self) -> &[u8; SECRET_LEN] {
        &self.secret_hash
    }

    pub fn recipient(&self) -> &PubkeyHash {
        &self.recipient
    }

    pub fn redeem_script(&self) -> &Script {
        &self.redeem_script
    }

    /// P2SH address of the redeem script
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Locking script paying to the contract
    pub fn script_pubkey(&self) -> ScriptBuf {
        self.address.script_pubkey()
    }

    /// Recover the secret from the unlocking script of a contract spend
    pub fn extract_secret(&self, script_sig: &Script) -> Option<[u8; SECRET_LEN]> {
        script_sig
            .instructions()
            .filter_map(Result::ok)
            .filter_map(|instruction| match instruction {
                Instruction::PushBytes(bytes) => <[u8; SECRET_LEN]>::try_from(bytes.as_bytes()).ok(),
                Instruction::Op(_) => None,
            })
            .find(|candidate| hash_secret(candidate) == self.secret_hash)
    }
}

fn build_redeem_script(secret_hash: &[u8; SECRET_LEN], recipient: &PubkeyHash) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_SIZE)
        .push_int(SECRET_LEN as i64)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_SHA256)
        .push_slice(secret_hash)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(recipient.to_byte_array())
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}
