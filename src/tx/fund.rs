//! Coin selection

use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, TxIn, TxOut, Witness};
use tokio_util::sync::CancellationToken;

use super::{FundedDraft, FundingState, SpendSource, TransactionDraft};
use crate::chain::{ChainClient, UnspentOutput};
use crate::error::BtcSwapError;
use crate::retry::RetryPolicy;

/// Outcome of scanning a listing for inputs that share one locking script
#[derive(Debug, PartialEq)]
pub(crate) struct Selection<'u> {
    pub script_pubkey: ScriptBuf,
    pub inputs: Vec<&'u UnspentOutput>,
    pub selected: u64,
}

/// Walk `utxos` in listing order and take outputs until `required` is met.
///
/// The first output fixes the locking script; later outputs with a different
/// script are skipped. Returns `None` for an empty listing.
pub(crate) fn select_inputs(utxos: &[UnspentOutput], required: u64) -> Option<Selection<'_>> {
    let script_pubkey = utxos.first()?.script_pubkey.clone();
    let mut inputs = Vec::new();
    let mut selected = 0u64;

    for utxo in utxos {
        if selected >= required {
            break;
        }
        if utxo.script_pubkey != script_pubkey {
            log::debug!(
                "Skipping {}:{} ({} sats), locking script differs from the first output",
                utxo.txid,
                utxo.vout,
                utxo.amount_sats
            );
            continue;
        }
        selected = selected.saturating_add(utxo.amount_sats);
        inputs.push(utxo);
    }

    Some(Selection {
        script_pubkey,
        inputs,
        selected,
    })
}

/// Funds a draft from the unspent outputs of a single address
pub struct CoinSelector<'a, C: ChainClient + ?Sized> {
    client: &'a C,
    retry: &'a RetryPolicy,
    cancel: &'a CancellationToken,
    utxo_limit: u32,
}

impl<'a, C: ChainClient + ?Sized> CoinSelector<'a, C> {
    pub fn new(
        client: &'a C,
        retry: &'a RetryPolicy,
        cancel: &'a CancellationToken,
        utxo_limit: u32,
    ) -> Self {
        Self {
            client,
            retry,
            cancel,
            utxo_limit,
        }
    }

    /// Add inputs covering the draft's outputs plus `fee`, and a change
    /// output back to the source for any surplus.
    ///
    /// Only the first `utxo_limit` unspent outputs are considered, for the
    /// balance check as well as for selection. Unconfirmed outputs are
    /// eligible.
    pub async fn fund(
        &self,
        draft: TransactionDraft,
        source: &SpendSource<'_>,
        fee: u64,
    ) -> Result<FundedDraft, BtcSwapError> {
        let address = source.address();
        let required = draft
            .outputs()
            .iter()
            .try_fold(fee, |acc, out| acc.checked_add(out.value.to_sat()))
            .ok_or_else(|| BtcSwapError::InvalidInput("output total overflows".to_string()))?;
        if required == 0 {
            return Err(BtcSwapError::InvalidInput(
                "transaction has no outputs and no fee to fund".to_string(),
            ));
        }

        // the balance pre-check covers the same page that selection walks
        let utxos = self
            .retry
            .run(self.cancel, "Unspent output listing", || {
                self.client.list_unspent(address, self.utxo_limit, 0)
            })
            .await?;
        let balance = utxos
            .iter()
            .fold(0u64, |acc, utxo| acc.saturating_add(utxo.amount_sats));
        if balance < required {
            return Err(BtcSwapError::insufficient_balance(
                address.to_string(),
                required,
                balance,
            ));
        }

        log::debug!(
            "Funding {} sats from {} ({} unspent outputs, balance {})",
            required,
            address,
            utxos.len(),
            balance
        );

        let selection = select_inputs(&utxos, required).ok_or_else(|| {
            BtcSwapError::insufficient_balance(address.to_string(), required, 0)
        })?;
        if selection.selected < required {
            return Err(BtcSwapError::MismatchedScript {
                address: address.to_string(),
                required,
                selected: selection.selected,
            });
        }

        let mut tx = draft.tx;
        let mut spent_values = Vec::with_capacity(selection.inputs.len());
        for utxo in &selection.inputs {
            tx.input.push(TxIn {
                previous_output: OutPoint::new(utxo.txid, utxo.vout),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            });
            spent_values.push(utxo.amount_sats);
        }

        let change = selection.selected - required;
        if change > 0 {
            tx.output.push(TxOut {
                value: Amount::from_sat(change),
                script_pubkey: address.script_pubkey(),
            });
        }

        log::info!(
            "Funded transaction with {} inputs ({} sats), change {} sats",
            tx.input.len(),
            selection.selected,
            change
        );

        Ok(FundedDraft {
            tx,
            funding: FundingState {
                script_pubkey: selection.script_pubkey,
                spent_values,
            },
        })
    }
}
