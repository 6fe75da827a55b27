//! Raffle error types.

use crate::ledger::LedgerError;
use thiserror::Error;

/// Raffle errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RaffleError {
    /// Bet below the raffle minimum
    #[error("bet too low: minimum is {min} coins")]
    BetTooLow { min: i64 },

    /// Balance problem while staking
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Result type for raffle operations
pub type RaffleResult<T> = Result<T, RaffleError>;
