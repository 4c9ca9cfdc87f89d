//! Transaction pipeline
//!
//! - `fund` - coin selection from a single locking script
//! - `sign` - per-input unlocking script assembly
//! - `verify` - local script execution before broadcast
//! - `broadcast` - submission and postcondition polling
//!
//! Each stage consumes the output of the previous one (`TransactionDraft` ->
//! `FundedDraft` -> `SignedDraft` -> `VerifiedDraft`), so a draft can't be
//! signed before it is funded or broadcast before it is verified.

pub mod broadcast;
pub mod fund;
pub mod sign;
pub mod verify;

use std::fmt;

use bitcoin::consensus::encode::serialize;
use bitcoin::{absolute, transaction, Address, Amount, Script, ScriptBuf, Transaction, TxOut, Txid};

use crate::contract::HashLockContract;

pub use broadcast::{BroadcastController, Postcondition};
pub use fund::CoinSelector;
pub use sign::{ScriptExtension, SignatureAssembler};
pub use verify::LocalVerifier;

/// What a send operation spends from
#[derive(Clone, Debug)]
pub enum SpendSource<'a> {
    /// Outputs locked to a plain address (the account's own)
    Plain(Address),
    /// Outputs locked to a hash-lock contract's P2SH address
    Contract(&'a HashLockContract),
}

impl SpendSource<'_> {
    /// Address whose unspent outputs fund the transaction
    pub fn address(&self) -> &Address {
        match self {
            Self::Plain(address) => address,
            Self::Contract(contract) => contract.address(),
        }
    }

    pub fn redeem_script(&self) -> Option<&Script> {
        match self {
            Self::Plain(_) => None,
            Self::Contract(contract) => Some(contract.redeem_script()),
        }
    }
}

/// Unsigned transaction being assembled before funding
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionDraft {
    tx: Transaction,
}

impl Default for TransactionDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionDraft {
    pub fn new() -> Self {
        Self {
            tx: Transaction {
                version: transaction::Version::TWO,
                lock_time: absolute::LockTime::ZERO,
                input: vec![],
                output: vec![],
            },
        }
    }

    pub fn add_output(&mut self, value_sats: u64, script_pubkey: ScriptBuf) {
        self.tx.output.push(TxOut {
            value: Amount::from_sat(value_sats),
            script_pubkey,
        });
    }

    pub fn outputs(&self) -> &[TxOut] {
        &self.tx.output
    }

    pub fn tx(&self) -> &Transaction {
        &self.tx
    }
}

/// Bookkeeping of a completed funding pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundingState {
    /// Locking script shared by every selected input
    pub script_pubkey: ScriptBuf,
    /// Value of each spent output, in input order
    pub spent_values: Vec<u64>,
}

impl FundingState {
    pub fn input_value(&self) -> u64 {
        self.spent_values.iter().sum()
    }
}

macro_rules! draft_stage {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            pub(crate) tx: Transaction,
            pub(crate) funding: FundingState,
        }

        impl $name {
            pub fn tx(&self) -> &Transaction {
                &self.tx
            }

            pub fn funding(&self) -> &FundingState {
                &self.funding
            }

            /// Consensus wire encoding
            pub fn to_bytes(&self) -> Vec<u8> {
                serialize(&self.tx)
            }

            pub fn txid(&self) -> Txid {
                self.tx.compute_txid()
            }

            pub fn output_value(&self) -> u64 {
                self.tx.output.iter().map(|o| o.value.to_sat()).sum()
            }
        }
    };
}

draft_stage!(
    /// Transaction whose inputs exactly cover its outputs and fee
    FundedDraft
);
draft_stage!(
    /// Transaction with every unlocking script filled
    SignedDraft
);
draft_stage!(
    /// Signed transaction whose inputs all passed local script execution
    VerifiedDraft
);

/// Stages of a send operation, in order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendStage {
    Init,
    PreconditionCheck,
    Funding,
    Signing,
    Verifying,
    Broadcasting,
    PostconditionPolling,
    Done,
}

impl fmt::Display for SendStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::PreconditionCheck => "precondition check",
            Self::Funding => "funding",
            Self::Signing => "signing",
            Self::Verifying => "verifying",
            Self::Broadcasting => "broadcasting",
            Self::PostconditionPolling => "postcondition polling",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}
