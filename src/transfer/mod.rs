//! Peer transfers and withdrawal requests.
//!
//! Transfers move coins between two known accounts atomically and leave an
//! audit record. Withdrawals never move coins: the two-step intake form
//! collects an amount and free-form details, then hands the request to the
//! operator channel for manual settlement.

pub mod errors;
pub mod manager;
pub mod models;
pub mod withdraw;

pub use errors::{TransferError, TransferResult};
pub use manager::TransferService;
pub use models::{TransferRecord, WithdrawalRequest};
pub use withdraw::WithdrawalIntake;
