//! Transfer and withdrawal data models.

use crate::ledger::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit record of one completed peer transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub from_user: UserId,
    pub to_user: UserId,
    pub amount: i64,
    pub timestamp: DateTime<Utc>,
}

/// A completed withdrawal form, ready for manual settlement.
///
/// No coins have moved; the operator debits the balance after sending the
/// external currency.
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalRequest {
    pub user_id: UserId,
    pub amount: i64,
    /// Approximate external-currency equivalent at the rate seen during intake.
    pub external_equiv: f64,
    pub details: String,
}
