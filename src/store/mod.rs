//! Durability layer: the `Store` trait, its backends, and the background
//! write queue.
//!
//! The engine is the in-memory authority for all state; the store only has
//! to survive restarts. Hot-path mutations therefore never await the store
//! directly — they enqueue [`WriteOp`]s on the [`StoreWriter`], which drains
//! them in the background and counts (rather than hides) failures.

pub mod errors;
pub mod memory;
pub mod postgres;
pub mod writer;

pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use writer::{StoreWriter, WriteOp};

use crate::deposit::DepositRecord;
use crate::dice::DiceGame;
use crate::ledger::{Account, UserId};
use crate::raffle::{RaffleRound, RoundId};
use crate::transfer::TransferRecord;
use async_trait::async_trait;
use std::collections::HashSet;

/// Durable storage operations.
///
/// Upserts are keyed by entity id and safe to replay; deposit inserts are
/// insert-or-ignore keyed by transaction id.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or update an account row.
    async fn upsert_account(&self, account: &Account) -> StoreResult<()>;

    /// Insert or update a dice game by its id.
    async fn upsert_game(&self, game: &DiceGame) -> StoreResult<()>;

    /// Insert or update a raffle round row (stakes are appended separately).
    async fn upsert_raffle_round(&self, round: &RaffleRound) -> StoreResult<()>;

    /// Append one raffle bet to the round's bet log.
    async fn append_raffle_bet(
        &self,
        round_id: RoundId,
        user_id: UserId,
        amount: i64,
    ) -> StoreResult<()>;

    /// Record a deposit keyed by transaction id.
    ///
    /// Returns `false` when a record with the same transaction id already
    /// exists (the insert is ignored).
    async fn insert_deposit(&self, deposit: &DepositRecord) -> StoreResult<bool>;

    /// Append a peer transfer to the audit log.
    async fn append_transfer(&self, transfer: &TransferRecord) -> StoreResult<()>;

    /// All accounts, for startup preload.
    async fn load_accounts(&self) -> StoreResult<Vec<Account>>;

    /// Finished games involving the user, newest first.
    async fn finished_games_for_user(&self, user_id: UserId) -> StoreResult<Vec<DiceGame>>;

    /// All finished games (order unspecified), for the profit rating.
    async fn all_finished_games(&self) -> StoreResult<Vec<DiceGame>>;

    /// Transaction ids of already-recorded deposits, for dedupe seeding.
    async fn processed_deposit_ids(&self) -> StoreResult<HashSet<String>>;
}
