//! In-memory store backend for tests and embedding.

use super::{Store, StoreResult};
use crate::deposit::DepositRecord;
use crate::dice::DiceGame;
use crate::ledger::{Account, UserId};
use crate::raffle::{RaffleRound, RoundId};
use crate::transfer::TransferRecord;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<UserId, Account>,
    games: HashMap<i64, DiceGame>,
    raffle_rounds: HashMap<RoundId, RaffleRound>,
    raffle_bets: Vec<(RoundId, UserId, i64)>,
    deposits: HashMap<String, DepositRecord>,
    transfers: Vec<TransferRecord>,
}

/// `Store` backend holding everything in process memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transfer audit log, oldest first (test inspection).
    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.locked().transfers.clone()
    }

    /// Recorded deposits keyed by transaction id (test inspection).
    pub fn deposits(&self) -> Vec<DepositRecord> {
        self.locked().deposits.values().cloned().collect()
    }

    /// Raffle bet log, oldest first (test inspection).
    pub fn raffle_bets(&self) -> Vec<(RoundId, UserId, i64)> {
        self.locked().raffle_bets.clone()
    }

    fn locked(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_account(&self, account: &Account) -> StoreResult<()> {
        self.locked().accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn upsert_game(&self, game: &DiceGame) -> StoreResult<()> {
        self.locked().games.insert(game.id, game.clone());
        Ok(())
    }

    async fn upsert_raffle_round(&self, round: &RaffleRound) -> StoreResult<()> {
        self.locked().raffle_rounds.insert(round.id, round.clone());
        Ok(())
    }

    async fn append_raffle_bet(
        &self,
        round_id: RoundId,
        user_id: UserId,
        amount: i64,
    ) -> StoreResult<()> {
        self.locked().raffle_bets.push((round_id, user_id, amount));
        Ok(())
    }

    async fn insert_deposit(&self, deposit: &DepositRecord) -> StoreResult<bool> {
        let mut state = self.locked();
        if state.deposits.contains_key(&deposit.tx_id) {
            return Ok(false);
        }
        state.deposits.insert(deposit.tx_id.clone(), deposit.clone());
        Ok(true)
    }

    async fn append_transfer(&self, transfer: &TransferRecord) -> StoreResult<()> {
        self.locked().transfers.push(transfer.clone());
        Ok(())
    }

    async fn load_accounts(&self) -> StoreResult<Vec<Account>> {
        Ok(self.locked().accounts.values().cloned().collect())
    }

    async fn finished_games_for_user(&self, user_id: UserId) -> StoreResult<Vec<DiceGame>> {
        let mut games: Vec<DiceGame> = self
            .locked()
            .games
            .values()
            .filter(|g| {
                g.is_finished() && (g.creator_id == user_id || g.opponent_id == Some(user_id))
            })
            .cloned()
            .collect();
        games.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        Ok(games)
    }

    async fn all_finished_games(&self) -> StoreResult<Vec<DiceGame>> {
        Ok(self
            .locked()
            .games
            .values()
            .filter(|g| g.is_finished())
            .cloned()
            .collect())
    }

    async fn processed_deposit_ids(&self) -> StoreResult<HashSet<String>> {
        Ok(self.locked().deposits.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn deposit_insert_is_idempotent_by_tx_id() {
        let store = MemoryStore::new();
        let deposit = DepositRecord {
            tx_id: "abc".to_string(),
            user_id: 1,
            external_amount: 1.0,
            credited_coins: 100,
            note: "ID12345".to_string(),
            seen_at: Utc::now(),
        };
        assert!(store.insert_deposit(&deposit).await.unwrap());
        assert!(!store.insert_deposit(&deposit).await.unwrap());
        assert_eq!(store.deposits().len(), 1);
    }
}
