//! Bounded background write queue for durability writes.
//!
//! Money-moving paths must never block on the database, so mutations hand a
//! snapshot to this queue and move on. Failures (queue full, backend error)
//! are counted and logged; they are never retried inline and never surface
//! to the user-facing call.

use super::{Store, StoreResult};
use crate::deposit::DepositRecord;
use crate::dice::DiceGame;
use crate::ledger::{Account, UserId};
use crate::raffle::{RaffleRound, RoundId};
use crate::transfer::TransferRecord;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// One queued durability write.
#[derive(Debug, Clone)]
pub enum WriteOp {
    UpsertAccount(Account),
    UpsertGame(DiceGame),
    UpsertRaffleRound(RaffleRound),
    AppendRaffleBet {
        round_id: RoundId,
        user_id: UserId,
        amount: i64,
    },
    InsertDeposit(DepositRecord),
    AppendTransfer(TransferRecord),
}

/// Handle to the background write queue.
///
/// Cheap to clone; all clones share one drain task and one failure counter.
#[derive(Clone)]
pub struct StoreWriter {
    sender: mpsc::Sender<WriteOp>,
    failures: Arc<AtomicU64>,
}

impl StoreWriter {
    /// Spawn the drain task and return a handle to the queue.
    pub fn spawn(store: Arc<dyn Store>, capacity: usize) -> Self {
        let (sender, mut inbox) = mpsc::channel::<WriteOp>(capacity);
        let failures = Arc::new(AtomicU64::new(0));

        let task_failures = Arc::clone(&failures);
        tokio::spawn(async move {
            while let Some(op) = inbox.recv().await {
                if let Err(e) = apply(store.as_ref(), &op).await {
                    task_failures.fetch_add(1, Ordering::Relaxed);
                    log::error!("durability write failed: {e}");
                }
            }
            log::debug!("store writer drained and shut down");
        });

        Self { sender, failures }
    }

    /// Enqueue a write without blocking.
    ///
    /// A full or closed queue drops the write, bumps the failure counter and
    /// logs; callers are never told, by contract.
    pub fn enqueue(&self, op: WriteOp) {
        if let Err(e) = self.sender.try_send(op) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            log::error!("durability write dropped: {e}");
        }
    }

    /// Number of writes that were dropped or failed since startup.
    ///
    /// Non-zero means the durable copy is behind the in-memory ledger;
    /// operators decide whether to replay or accept the drift.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

async fn apply(store: &dyn Store, op: &WriteOp) -> StoreResult<()> {
    match op {
        WriteOp::UpsertAccount(account) => store.upsert_account(account).await,
        WriteOp::UpsertGame(game) => store.upsert_game(game).await,
        WriteOp::UpsertRaffleRound(round) => store.upsert_raffle_round(round).await,
        WriteOp::AppendRaffleBet {
            round_id,
            user_id,
            amount,
        } => store.append_raffle_bet(*round_id, *user_id, *amount).await,
        WriteOp::InsertDeposit(deposit) => store.insert_deposit(deposit).await.map(|_| ()),
        WriteOp::AppendTransfer(transfer) => store.append_transfer(transfer).await,
    }
}
