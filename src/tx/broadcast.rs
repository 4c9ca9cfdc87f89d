//! Broadcast with postcondition polling
//!
//! A broadcast is accepted once the provider takes it; with a postcondition
//! the controller keeps polling and re-broadcasting until the postcondition
//! reports the effect is visible or the caller cancels.

use bitcoin::{Transaction, Txid};
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::{SendStage, VerifiedDraft};
use crate::chain::ChainClient;
use crate::error::BtcSwapError;
use crate::retry::{sleep_or_cancel, PollPolicy, RetryPolicy};

/// Async check that a broadcast transaction has taken effect (e.g. the
/// recipient address shows the payment)
pub type Postcondition<'a> = dyn Fn(&Transaction) -> BoxFuture<'a, bool> + Send + Sync + 'a;

pub struct BroadcastController<'a, C: ChainClient + ?Sized> {
    client: &'a C,
    retry: &'a RetryPolicy,
    poll: &'a PollPolicy,
}

impl<'a, C: ChainClient + ?Sized> BroadcastController<'a, C> {
    pub fn new(client: &'a C, retry: &'a RetryPolicy, poll: &'a PollPolicy) -> Self {
        Self {
            client,
            retry,
            poll,
        }
    }

    /// Submit `verified` until the provider accepts it.
    ///
    /// Without a postcondition the first acceptance completes the send. With
    /// one, the postcondition is polled up to `poll.attempts` times, then the
    /// transaction is re-broadcast and polling starts over.
    ///
    /// Cancellation while submitting yields [`BtcSwapError::TimedOut`], while
    /// polling [`BtcSwapError::PostconditionFailed`].
    pub async fn submit(
        &self,
        verified: &VerifiedDraft,
        postcondition: Option<&Postcondition<'_>>,
        cancel: &CancellationToken,
    ) -> Result<Txid, BtcSwapError> {
        let raw_tx = verified.to_bytes();
        let txid = verified.txid();
        let attempts = self.poll.attempts.max(1);

        loop {
            self.retry
                .run(cancel, "Broadcast", || self.client.broadcast(&raw_tx))
                .await?;
            log::info!("Transaction {} accepted by the network", txid);

            let Some(postcondition) = postcondition else {
                return Ok(txid);
            };

            log::debug!("{}: {}", SendStage::PostconditionPolling, txid);
            for attempt in 1..=attempts {
                if cancel.is_cancelled() {
                    return Err(BtcSwapError::PostconditionFailed);
                }
                if postcondition(verified.tx()).await {
                    log::info!("Postcondition for {} satisfied after {} polls", txid, attempt);
                    return Ok(txid);
                }
                log::debug!("Postcondition for {} not met ({}/{})", txid, attempt, attempts);
                if !sleep_or_cancel(cancel, self.poll.interval).await {
                    return Err(BtcSwapError::PostconditionFailed);
                }
            }

            log::warn!(
                "Postcondition for {} not met after {} polls, broadcasting again",
                txid,
                attempts
            );
        }
    }
}
