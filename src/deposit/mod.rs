//! External deposit reconciliation.
//!
//! A background poller pulls recent inbound transactions from the chain API,
//! matches each one to a user through the `ID<digits>` tag in its memo,
//! converts the external amount to coins at the cached rate, and credits the
//! ledger exactly once per transaction id. Unmatched or worthless
//! transactions are remembered as processed so they are never re-examined.

pub mod feed;
pub mod models;
pub mod reconciler;

pub use feed::{DepositFeed, TonFeed};
pub use models::{DepositCandidate, DepositRecord, parse_user_tag};
pub use reconciler::DepositReconciler;
