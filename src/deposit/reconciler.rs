//! Deposit reconciliation against the ledger.

use super::{
    feed::DepositFeed,
    models::{DepositCandidate, DepositRecord, parse_user_tag},
};
use crate::ledger::Ledger;
use crate::notify::Notifier;
use crate::rate::RateCache;
use crate::store::{StoreWriter, WriteOp};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Matches feed transactions to users and credits the ledger once each.
///
/// The processed set is the idempotence guard: it is seeded from the durable
/// deposit records at startup and every examined transaction id enters it,
/// whether it credited or was dismissed. Only credits are recorded durably,
/// so a dismissed transaction is re-examined after a restart and dismissed
/// again, which is harmless.
pub struct DepositReconciler {
    feed: Box<dyn DepositFeed>,
    ledger: Arc<Ledger>,
    rate: Arc<RateCache>,
    writer: StoreWriter,
    notifier: Arc<dyn Notifier>,
    processed: Mutex<HashSet<String>>,
}

impl DepositReconciler {
    pub fn new(
        feed: Box<dyn DepositFeed>,
        ledger: Arc<Ledger>,
        rate: Arc<RateCache>,
        writer: StoreWriter,
        notifier: Arc<dyn Notifier>,
        processed: HashSet<String>,
    ) -> Self {
        Self {
            feed,
            ledger,
            rate,
            writer,
            notifier,
            processed: Mutex::new(processed),
        }
    }

    /// Fetch the feed once and credit every new matchable transaction.
    ///
    /// Returns the number of deposits credited. A feed failure skips the
    /// cycle entirely; the next poll sees the same transactions again.
    pub async fn poll_once(&self) -> usize {
        let candidates = match self.feed.fetch().await {
            Ok(candidates) => candidates,
            Err(e) => {
                log::warn!("deposit feed fetch failed: {e}");
                return 0;
            }
        };

        let mut credited = 0;
        for candidate in candidates {
            if self.locked().contains(&candidate.tx_id) {
                continue;
            }
            if self.settle(&candidate).await {
                credited += 1;
            }
        }
        credited
    }

    /// Examine one new transaction; returns whether it credited.
    async fn settle(&self, candidate: &DepositCandidate) -> bool {
        let Some(user_id) = parse_user_tag(&candidate.memo) else {
            log::debug!("deposit {} has no user tag, dismissed", candidate.tx_id);
            self.mark(&candidate.tx_id);
            return false;
        };

        let rate = self.rate.rate().await;
        let external_amount = candidate.external_amount();
        let coins = (external_amount * rate) as i64;
        if coins <= 0 {
            log::debug!("deposit {} converts to zero coins, dismissed", candidate.tx_id);
            self.mark(&candidate.tx_id);
            return false;
        }

        let balance = self.ledger.credit(user_id, coins);
        self.mark(&candidate.tx_id);

        let record = DepositRecord {
            tx_id: candidate.tx_id.clone(),
            user_id,
            external_amount,
            credited_coins: coins,
            note: candidate.memo.clone(),
            seen_at: Utc::now(),
        };
        self.writer.enqueue(WriteOp::InsertDeposit(record));
        log::info!(
            "deposit {}: {external_amount:.4} at rate {rate:.2} credited {coins} coins to {user_id}",
            candidate.tx_id
        );

        let user_text = format!(
            "Deposit received: {external_amount:.4} TON at 1 TON = {rate:.2} coins. \
             Credited: {coins} coins. Balance: {balance} coins."
        );
        if let Err(e) = self.notifier.notify_user(user_id, &user_text).await {
            log::warn!("deposit notification to {user_id} failed: {e}");
        }
        let operator_text = format!(
            "New deposit: user {user_id}, {external_amount:.4} TON, {coins} coins (memo: {memo})",
            memo = candidate.memo
        );
        if let Err(e) = self.notifier.notify_operator(&operator_text).await {
            log::warn!("deposit operator notification failed: {e}");
        }
        true
    }

    /// Run the feed poll on an interval forever.
    pub fn spawn_poller(self: Arc<Self>, interval_secs: u64) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            loop {
                ticker.tick().await;
                self.poll_once().await;
            }
        });
    }

    fn mark(&self, tx_id: &str) {
        self.locked().insert(tx_id.to_string());
    }

    fn locked(&self) -> MutexGuard<'_, HashSet<String>> {
        self.processed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::rate::RateProvider;
    use crate::store::{MemoryStore, StoreWriter};
    use async_trait::async_trait;

    struct FixedRate(f64);

    #[async_trait]
    impl RateProvider for FixedRate {
        async fn fetch(&self) -> anyhow::Result<f64> {
            Ok(self.0)
        }
    }

    struct StaticFeed(Vec<DepositCandidate>);

    #[async_trait]
    impl DepositFeed for StaticFeed {
        async fn fetch(&self) -> anyhow::Result<Vec<DepositCandidate>> {
            Ok(self.0.clone())
        }
    }

    struct FailingFeed;

    #[async_trait]
    impl DepositFeed for FailingFeed {
        async fn fetch(&self) -> anyhow::Result<Vec<DepositCandidate>> {
            anyhow::bail!("connection refused")
        }
    }

    fn candidate(tx_id: &str, memo: &str, value_nano: i64) -> DepositCandidate {
        DepositCandidate {
            tx_id: tx_id.to_string(),
            memo: memo.to_string(),
            value_nano,
        }
    }

    fn reconciler_with(
        feed: Box<dyn DepositFeed>,
        processed: HashSet<String>,
    ) -> (
        Arc<DepositReconciler>,
        Arc<Ledger>,
        Arc<MemoryStore>,
        Arc<RecordingNotifier>,
    ) {
        let store = Arc::new(MemoryStore::new());
        let writer = StoreWriter::spawn(store.clone(), 256);
        let ledger = Arc::new(Ledger::new(writer.clone()));
        let notifier = Arc::new(RecordingNotifier::new());
        let rate = Arc::new(RateCache::new(
            Box::new(FixedRate(100.0)),
            Duration::from_secs(60),
            100.0,
        ));
        let reconciler = Arc::new(DepositReconciler::new(
            feed,
            Arc::clone(&ledger),
            rate,
            writer,
            notifier.clone() as Arc<dyn Notifier>,
            processed,
        ));
        (reconciler, ledger, store, notifier)
    }

    #[tokio::test]
    async fn credit_happens_once_per_transaction() {
        let feed = StaticFeed(vec![candidate("tx1", "ID12345", 1_500_000_000)]);
        let (reconciler, ledger, store, notifier) =
            reconciler_with(Box::new(feed), HashSet::new());

        assert_eq!(reconciler.poll_once().await, 1);
        // 1.5 TON at 100.0 floors to 150 coins
        assert_eq!(ledger.balance_of(12345), 150);

        // replaying the same feed credits nothing
        assert_eq!(reconciler.poll_once().await, 0);
        assert_eq!(reconciler.poll_once().await, 0);
        assert_eq!(ledger.balance_of(12345), 150);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.deposits().len(), 1);
        assert_eq!(notifier.messages_for(12345).len(), 1);
        assert_eq!(notifier.operator_messages().len(), 1);
    }

    #[tokio::test]
    async fn untagged_and_worthless_transactions_are_dismissed() {
        let feed = StaticFeed(vec![
            candidate("no-tag", "thanks!", 1_000_000_000),
            candidate("dust", "ID12345", 1_000_000),
            candidate("zero", "ID12345", 0),
        ]);
        let (reconciler, ledger, store, _) = reconciler_with(Box::new(feed), HashSet::new());

        assert_eq!(reconciler.poll_once().await, 0);
        assert_eq!(reconciler.poll_once().await, 0);
        assert_eq!(ledger.balance_of(12345), 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.deposits().is_empty());
    }

    #[tokio::test]
    async fn seeded_ids_survive_as_processed() {
        let feed = StaticFeed(vec![candidate("old", "ID12345", 2_000_000_000)]);
        let processed: HashSet<String> = ["old".to_string()].into_iter().collect();
        let (reconciler, ledger, _, _) = reconciler_with(Box::new(feed), processed);

        assert_eq!(reconciler.poll_once().await, 0);
        assert_eq!(ledger.balance_of(12345), 0);
    }

    #[tokio::test]
    async fn feed_failure_skips_the_cycle() {
        let (reconciler, ledger, _, _) = reconciler_with(Box::new(FailingFeed), HashSet::new());
        assert_eq!(reconciler.poll_once().await, 0);
        assert_eq!(ledger.balance_of(12345), 0);
    }
}
