//! Peer transfer execution.

use super::{
    errors::{TransferError, TransferResult},
    models::TransferRecord,
};
use crate::ledger::{Ledger, UserId};
use crate::notify::Notifier;
use crate::store::{StoreWriter, WriteOp};
use chrono::Utc;
use std::sync::Arc;

/// Peer-to-peer coin transfers.
pub struct TransferService {
    ledger: Arc<Ledger>,
    writer: StoreWriter,
    notifier: Arc<dyn Notifier>,
}

impl TransferService {
    pub fn new(ledger: Arc<Ledger>, writer: StoreWriter, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            ledger,
            writer,
            notifier,
        }
    }

    /// Resolve a recipient typed as `@handle`, a bare handle, or a numeric id.
    pub fn resolve_recipient(&self, input: &str) -> Option<UserId> {
        let input = input.trim();
        if let Ok(uid) = input.parse::<UserId>() {
            return Some(uid);
        }
        self.ledger.resolve_handle(input)
    }

    /// Move coins from one account to another and record the transfer.
    ///
    /// Both legs happen atomically; the recipient must already be known to
    /// the platform so coins cannot land in an unreachable account. The
    /// recipient notification is best-effort.
    ///
    /// # Errors
    ///
    /// * `TransferError::InvalidAmount` - amount not strictly positive
    /// * `TransferError::SelfTransfer` - sender and recipient identical
    /// * `TransferError::UnknownRecipient` - recipient never seen
    /// * `TransferError::Ledger` - insufficient funds
    pub async fn transfer(
        &self,
        from: UserId,
        to: UserId,
        amount: i64,
    ) -> TransferResult<TransferRecord> {
        if amount <= 0 {
            return Err(TransferError::InvalidAmount(amount));
        }
        if from == to {
            return Err(TransferError::SelfTransfer);
        }
        if !self.ledger.is_known(to) {
            return Err(TransferError::UnknownRecipient(to));
        }

        let (_, recipient_balance) = self.ledger.transfer(from, to, amount)?;

        let record = TransferRecord {
            from_user: from,
            to_user: to,
            amount,
            timestamp: Utc::now(),
        };
        self.writer.enqueue(WriteOp::AppendTransfer(record.clone()));
        log::info!("transfer: {from} sent {amount} coins to {to}");

        let text = format!(
            "You received {amount} coins from user {from}. Balance: {recipient_balance} coins."
        );
        if let Err(e) = self.notifier.notify_user(to, &text).await {
            log::warn!("transfer notification to {to} failed: {e}");
        }
        Ok(record)
    }
}
