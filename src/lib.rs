//! # Coin Arena
//!
//! A wagering engine for chat-driven games on an internal coin ledger.
//!
//! The crate owns everything that moves money: per-user balances, the dice
//! duel lifecycle, the pooled weighted raffle, deposit reconciliation against
//! an external transaction feed, and peer-to-peer transfers. The chat
//! transport itself (message rendering, command parsing, buttons) lives
//! outside the crate and talks to these services through their public APIs
//! and the [`notify::Notifier`] trait.
//!
//! ## Architecture
//!
//! - [`ledger`]: in-memory balance authority; every coin mutation passes
//!   through it and is persisted asynchronously via the store write queue.
//! - [`dice`]: head-to-head dice duels (create, join, resolve, timeout sweep).
//! - [`raffle`]: one process-wide pooled round with a weighted draw on a
//!   countdown timer.
//! - [`deposit`]: polls an external transaction feed and credits deposits
//!   exactly once per transaction id.
//! - [`transfer`]: peer transfers and the two-step withdrawal request form.
//! - [`rate`]: TTL-cached external currency rate, degrading to stale or
//!   fallback values on provider failure.
//! - [`store`]: durability trait plus Postgres and in-memory backends, and
//!   the bounded background write queue.
//! - [`engine`]: composition root wiring the services together and spawning
//!   the background workers.
//!
//! ## Consistency model
//!
//! Balance-and-state mutations for a single game or round transition are
//! applied under one short lock without suspending, so no task can observe a
//! half-applied transition. Durability writes are queued and drained in the
//! background; a crash between an in-memory mutation and its durable write
//! loses that delta. That gap is deliberate (availability over durability)
//! and is surfaced through [`store::StoreWriter::failures`] rather than
//! hidden.

pub mod admin;
pub mod config;
pub mod deposit;
pub mod dice;
pub mod engine;
pub mod ledger;
pub mod notify;
pub mod raffle;
pub mod rate;
pub mod stats;
pub mod store;
pub mod transfer;

pub use config::Config;
pub use engine::Engine;
pub use ledger::{Account, Ledger, LedgerError, UserId};
pub use notify::Notifier;
