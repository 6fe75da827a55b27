//! Ledger implementation: atomic in-memory balance mutations with queued
//! durability writes.

use super::{
    errors::{LedgerError, LedgerResult},
    models::{Account, UserId},
};
use crate::store::{StoreWriter, WriteOp};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct LedgerState {
    accounts: HashMap<UserId, Account>,
}

/// The balance authority.
///
/// All methods are synchronous and complete without suspending: the critical
/// section is the map update alone, and the durable write is enqueued on the
/// [`StoreWriter`] without blocking. Check-and-debit is a single operation
/// ([`Ledger::try_debit`]), so concurrent spenders cannot both pass a balance
/// check before either debit lands.
pub struct Ledger {
    state: Mutex<LedgerState>,
    writer: StoreWriter,
}

impl Ledger {
    /// Create an empty ledger backed by the given write queue.
    pub fn new(writer: StoreWriter) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                accounts: HashMap::new(),
            }),
            writer,
        }
    }

    /// Load previously persisted accounts, replacing any in-memory state.
    ///
    /// Called once at startup before any traffic; does not re-persist.
    pub fn preload(&self, accounts: Vec<Account>) {
        let mut state = self.locked();
        state.accounts = accounts.into_iter().map(|a| (a.id, a)).collect();
    }

    /// Get a user's balance, creating a zero-balance account on first access.
    pub fn balance_of(&self, uid: UserId) -> i64 {
        let mut state = self.locked();
        state
            .accounts
            .entry(uid)
            .or_insert_with(|| Account::new(uid))
            .balance
    }

    /// Atomically check and debit `amount` coins.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - `amount` is not positive
    /// * `LedgerError::InsufficientFunds` - balance below `amount`; the
    ///   account is left untouched
    pub fn try_debit(&self, uid: UserId, amount: i64) -> LedgerResult<i64> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let mut state = self.locked();
        let account = state
            .accounts
            .entry(uid)
            .or_insert_with(|| Account::new(uid));
        if account.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                available: account.balance,
                required: amount,
            });
        }
        account.balance -= amount;
        let snapshot = account.clone();
        self.persist(snapshot.clone());
        Ok(snapshot.balance)
    }

    /// Credit `amount` coins, returning the new balance.
    pub fn credit(&self, uid: UserId, amount: i64) -> i64 {
        self.apply_delta(uid, amount)
    }

    /// Apply a signed delta (admin use; may drive the balance negative).
    pub fn adjust(&self, uid: UserId, delta: i64) -> i64 {
        self.apply_delta(uid, delta)
    }

    /// Overwrite a balance outright (admin use).
    pub fn set_balance(&self, uid: UserId, value: i64) {
        let mut state = self.locked();
        let account = state
            .accounts
            .entry(uid)
            .or_insert_with(|| Account::new(uid));
        account.balance = value;
        let snapshot = account.clone();
        self.persist(snapshot);
    }

    /// Atomically move `amount` coins from one account to another.
    ///
    /// Both legs happen under a single lock acquisition, so no interleaved
    /// reader can observe the debit without the credit.
    pub fn transfer(&self, from: UserId, to: UserId, amount: i64) -> LedgerResult<(i64, i64)> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let mut state = self.locked();
        let sender = state
            .accounts
            .entry(from)
            .or_insert_with(|| Account::new(from));
        if sender.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                available: sender.balance,
                required: amount,
            });
        }
        sender.balance -= amount;
        let sender_snapshot = sender.clone();
        let recipient = state.accounts.entry(to).or_insert_with(|| Account::new(to));
        recipient.balance += amount;
        let recipient_snapshot = recipient.clone();
        let balances = (sender_snapshot.balance, recipient_snapshot.balance);
        self.persist(sender_snapshot);
        self.persist(recipient_snapshot);
        Ok(balances)
    }

    /// Remember a user's display handle for lookups and transfers.
    pub fn register_handle(&self, uid: UserId, handle: &str) {
        let mut state = self.locked();
        let account = state
            .accounts
            .entry(uid)
            .or_insert_with(|| Account::new(uid));
        if account.display_handle.as_deref() == Some(handle) {
            return;
        }
        account.display_handle = Some(handle.to_string());
        let snapshot = account.clone();
        self.persist(snapshot);
    }

    /// Resolve a display handle (with or without a leading `@`) to a user id.
    pub fn resolve_handle(&self, handle: &str) -> Option<UserId> {
        let wanted = handle.trim().trim_start_matches('@').to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        let state = self.locked();
        state
            .accounts
            .values()
            .find(|a| {
                a.display_handle
                    .as_deref()
                    .is_some_and(|h| h.to_lowercase() == wanted)
            })
            .map(|a| a.id)
    }

    /// Whether the user has ever been seen by the system.
    pub fn is_known(&self, uid: UserId) -> bool {
        self.locked().accounts.contains_key(&uid)
    }

    fn apply_delta(&self, uid: UserId, delta: i64) -> i64 {
        let mut state = self.locked();
        let account = state
            .accounts
            .entry(uid)
            .or_insert_with(|| Account::new(uid));
        account.balance += delta;
        let snapshot = account.clone();
        self.persist(snapshot.clone());
        snapshot.balance
    }

    // Callers enqueue while still holding the state lock so that snapshots
    // reach the write queue in mutation order (upserts are last-writer-wins).
    fn persist(&self, account: Account) {
        self.writer.enqueue(WriteOp::UpsertAccount(account));
    }

    fn locked(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
