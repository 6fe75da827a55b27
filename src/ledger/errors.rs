//! Ledger error types.

use thiserror::Error;

/// Ledger errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Insufficient balance for a debit
    #[error("insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: i64, required: i64 },

    /// Amount must be positive
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
