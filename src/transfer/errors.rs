//! Transfer and withdrawal error types.

use crate::ledger::{LedgerError, UserId};
use thiserror::Error;

/// Transfer and withdrawal errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransferError {
    /// Amount must be strictly positive
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// Sender and recipient are the same account
    #[error("cannot transfer to yourself")]
    SelfTransfer,

    /// Recipient has never interacted with the platform
    #[error("unknown recipient {0}")]
    UnknownRecipient(UserId),

    /// No withdrawal form at the expected step
    #[error("no withdrawal form in progress")]
    NoPendingWithdrawal,

    /// Balance problem on the sender side
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Result type for transfer operations
pub type TransferResult<T> = Result<T, TransferError>;
