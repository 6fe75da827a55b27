//! Two-step withdrawal request intake.

use super::{
    errors::{TransferError, TransferResult},
    models::WithdrawalRequest,
};
use crate::ledger::{Ledger, LedgerError, UserId};
use crate::notify::Notifier;
use crate::rate::RateCache;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Collects withdrawal requests through a per-user form.
///
/// Step one validates the amount against the current balance; step two takes
/// free-form settlement details and delivers the finished request to the
/// operator channel. The form itself never debits anything, so a stale or
/// abandoned form costs nothing.
pub struct WithdrawalIntake {
    forms: Mutex<HashMap<UserId, i64>>,
    ledger: Arc<Ledger>,
    rate: Arc<RateCache>,
    notifier: Arc<dyn Notifier>,
}

impl WithdrawalIntake {
    pub fn new(ledger: Arc<Ledger>, rate: Arc<RateCache>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            forms: Mutex::new(HashMap::new()),
            ledger,
            rate,
            notifier,
        }
    }

    /// First step: validate and stage the amount.
    ///
    /// Returns the approximate external-currency equivalent to echo back to
    /// the user. Re-submitting replaces any staged amount.
    ///
    /// # Errors
    ///
    /// * `TransferError::InvalidAmount` - amount not strictly positive
    /// * `TransferError::Ledger` - amount above the current balance
    pub async fn submit_amount(&self, user_id: UserId, amount: i64) -> TransferResult<f64> {
        if amount <= 0 {
            return Err(TransferError::InvalidAmount(amount));
        }
        let balance = self.ledger.balance_of(user_id);
        if amount > balance {
            return Err(TransferError::Ledger(LedgerError::InsufficientFunds {
                available: balance,
                required: amount,
            }));
        }
        self.locked().insert(user_id, amount);
        Ok(self.external_equiv(amount).await)
    }

    /// Second step: attach details and deliver the request to the operator.
    ///
    /// # Errors
    ///
    /// * `TransferError::NoPendingWithdrawal` - no staged amount for this user
    pub async fn submit_details(
        &self,
        user_id: UserId,
        details: &str,
    ) -> TransferResult<WithdrawalRequest> {
        let amount = self
            .locked()
            .remove(&user_id)
            .ok_or(TransferError::NoPendingWithdrawal)?;

        let request = WithdrawalRequest {
            user_id,
            amount,
            external_equiv: self.external_equiv(amount).await,
            details: details.to_string(),
        };
        log::info!(
            "withdrawal request: user {user_id}, {amount} coins (~{:.4} TON)",
            request.external_equiv
        );

        let text = format!(
            "Withdrawal request\nuser: {user_id}\namount: {amount} coins (~{equiv:.4} TON)\n\
             details: {details}\nDebit the balance manually after sending.",
            equiv = request.external_equiv,
        );
        if let Err(e) = self.notifier.notify_operator(&text).await {
            log::warn!("withdrawal request delivery failed: {e}");
        }
        Ok(request)
    }

    /// Abandon a form in progress, if any.
    pub fn cancel(&self, user_id: UserId) {
        self.locked().remove(&user_id);
    }

    async fn external_equiv(&self, amount: i64) -> f64 {
        let rate = self.rate.rate().await;
        if rate > 0.0 { amount as f64 / rate } else { 0.0 }
    }

    fn locked(&self) -> MutexGuard<'_, HashMap<UserId, i64>> {
        self.forms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::rate::RateProvider;
    use crate::store::{MemoryStore, StoreWriter};
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedRate(f64);

    #[async_trait]
    impl RateProvider for FixedRate {
        async fn fetch(&self) -> anyhow::Result<f64> {
            Ok(self.0)
        }
    }

    fn intake() -> (WithdrawalIntake, Arc<Ledger>, Arc<RecordingNotifier>) {
        let writer = StoreWriter::spawn(Arc::new(MemoryStore::new()), 256);
        let ledger = Arc::new(Ledger::new(writer));
        let notifier = Arc::new(RecordingNotifier::new());
        let rate = Arc::new(RateCache::new(
            Box::new(FixedRate(100.0)),
            Duration::from_secs(60),
            100.0,
        ));
        let intake = WithdrawalIntake::new(
            Arc::clone(&ledger),
            rate,
            notifier.clone() as Arc<dyn Notifier>,
        );
        (intake, ledger, notifier)
    }

    #[tokio::test]
    async fn full_form_reaches_the_operator_without_moving_coins() {
        let (intake, ledger, notifier) = intake();
        ledger.credit(1, 500);

        let equiv = intake.submit_amount(1, 200).await.unwrap();
        assert!((equiv - 2.0).abs() < f64::EPSILON);

        let request = intake.submit_details(1, "wallet UQ..abc, evenings").await.unwrap();
        assert_eq!(request.amount, 200);
        assert_eq!(request.details, "wallet UQ..abc, evenings");

        // balance untouched, operator notified, form consumed
        assert_eq!(ledger.balance_of(1), 500);
        assert_eq!(notifier.operator_messages().len(), 1);
        assert_eq!(
            intake.submit_details(1, "again").await.unwrap_err(),
            TransferError::NoPendingWithdrawal
        );
    }

    #[tokio::test]
    async fn amount_step_validates_against_the_balance() {
        let (intake, ledger, _) = intake();
        ledger.credit(1, 50);

        assert_eq!(
            intake.submit_amount(1, 0).await.unwrap_err(),
            TransferError::InvalidAmount(0)
        );
        assert_eq!(
            intake.submit_amount(1, 60).await.unwrap_err(),
            TransferError::Ledger(LedgerError::InsufficientFunds {
                available: 50,
                required: 60,
            })
        );
        assert!(intake.submit_amount(1, 50).await.is_ok());
    }

    #[tokio::test]
    async fn cancel_clears_the_form() {
        let (intake, ledger, _) = intake();
        ledger.credit(1, 100);
        intake.submit_amount(1, 30).await.unwrap();
        intake.cancel(1);

        assert_eq!(
            intake.submit_details(1, "details").await.unwrap_err(),
            TransferError::NoPendingWithdrawal
        );
    }

    #[tokio::test]
    async fn resubmitted_amount_replaces_the_staged_one() {
        let (intake, ledger, _) = intake();
        ledger.credit(1, 100);
        intake.submit_amount(1, 30).await.unwrap();
        intake.submit_amount(1, 80).await.unwrap();

        let request = intake.submit_details(1, "d").await.unwrap();
        assert_eq!(request.amount, 80);
    }
}
