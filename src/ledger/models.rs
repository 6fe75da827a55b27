//! Ledger data models.

use serde::{Deserialize, Serialize};

/// User ID type (chat platform user identifier)
pub type UserId = i64;

/// A coin account.
///
/// Created lazily on first reference and never deleted. The balance is kept
/// non-negative by every mutation path rather than by storage constraints;
/// the one exception is an explicit signed admin adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    pub balance: i64,
    pub display_handle: Option<String>,
}

impl Account {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            balance: 0,
            display_handle: None,
        }
    }
}
