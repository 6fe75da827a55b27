//! Coin ledger: the single balance authority.
//!
//! Every component that moves coins composes from the operations here; no
//! other module touches a balance field directly. Mutations are applied
//! under one short lock and scheduled for durable write through the store
//! write queue, so callers never block on persistence.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{LedgerError, LedgerResult};
pub use manager::Ledger;
pub use models::{Account, UserId};
