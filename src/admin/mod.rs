//! Administrative balance commands and the profit report.

use crate::config::Config;
use crate::ledger::{Ledger, UserId};
use crate::rate::RateCache;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Admin command errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdminError {
    /// Caller is not on the admin list
    #[error("user {0} is not an administrator")]
    Unauthorized(UserId),

    /// Amount must be strictly positive
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),
}

/// Result type for admin operations
pub type AdminResult<T> = Result<T, AdminError>;

/// House position snapshot, for the principal only.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfitReport {
    pub coins: i64,
    /// Approximate external-currency equivalent at the current rate.
    pub external_equiv: f64,
}

/// Balance adjustment commands, gated on the admin list.
///
/// Adjustments go straight to the ledger and are persisted like any other
/// mutation; there is no separate audit trail beyond the account upsert,
/// matching how the operator actually settles withdrawals by hand.
pub struct AdminService {
    admins: HashSet<UserId>,
    principal: UserId,
    ledger: Arc<Ledger>,
    rate: Arc<RateCache>,
}

impl AdminService {
    pub fn new(config: &Config, ledger: Arc<Ledger>, rate: Arc<RateCache>) -> Self {
        Self {
            admins: config.admins.clone(),
            principal: config.house_account,
            ledger,
            rate,
        }
    }

    fn authorize(&self, caller: UserId) -> AdminResult<()> {
        if caller == self.principal || self.admins.contains(&caller) {
            Ok(())
        } else {
            Err(AdminError::Unauthorized(caller))
        }
    }

    /// Credit a user's balance. Returns the new balance.
    pub fn add_balance(&self, caller: UserId, target: UserId, amount: i64) -> AdminResult<i64> {
        self.authorize(caller)?;
        if amount <= 0 {
            return Err(AdminError::InvalidAmount(amount));
        }
        let balance = self.ledger.credit(target, amount);
        log::info!("admin {caller} added {amount} coins to {target}");
        Ok(balance)
    }

    /// Debit a user's balance; may drive it negative. Returns the new balance.
    pub fn remove_balance(&self, caller: UserId, target: UserId, amount: i64) -> AdminResult<i64> {
        self.authorize(caller)?;
        if amount <= 0 {
            return Err(AdminError::InvalidAmount(amount));
        }
        let balance = self.ledger.adjust(target, -amount);
        log::info!("admin {caller} removed {amount} coins from {target}");
        Ok(balance)
    }

    /// Overwrite a user's balance outright.
    pub fn set_balance(&self, caller: UserId, target: UserId, value: i64) -> AdminResult<()> {
        self.authorize(caller)?;
        self.ledger.set_balance(target, value);
        log::info!("admin {caller} set balance of {target} to {value}");
        Ok(())
    }

    /// House position in coins and external currency. Principal only.
    pub async fn profit_report(&self, caller: UserId) -> AdminResult<ProfitReport> {
        if caller != self.principal {
            return Err(AdminError::Unauthorized(caller));
        }
        let coins = self.ledger.balance_of(self.principal);
        let rate = self.rate.rate().await;
        let external_equiv = if rate > 0.0 { coins as f64 / rate } else { 0.0 };
        Ok(ProfitReport {
            coins,
            external_equiv,
        })
    }
}
