//! Outbound notification boundary.
//!
//! The engine tells users and the operator channel about game results,
//! deposits and withdrawal requests through this trait; the chat transport
//! implements it outside the crate. Delivery is always best-effort — callers
//! log failures and move on, they never let a notification error touch
//! ledger or game state.

use crate::ledger::UserId;
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

/// Outbound message delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a message to one user.
    async fn notify_user(&self, user_id: UserId, text: &str) -> anyhow::Result<()>;

    /// Send a message to the operator channel.
    async fn notify_operator(&self, text: &str) -> anyhow::Result<()>;
}

/// Notifier that discards everything.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify_user(&self, _user_id: UserId, _text: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn notify_operator(&self, _text: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Notifier that records messages in memory; `None` target means operator.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(Option<UserId>, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Option<UserId>, String)> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn messages_for(&self, user_id: UserId) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(target, _)| *target == Some(user_id))
            .map(|(_, text)| text)
            .collect()
    }

    pub fn operator_messages(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(target, _)| target.is_none())
            .map(|(_, text)| text)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_user(&self, user_id: UserId, text: &str) -> anyhow::Result<()> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((Some(user_id), text.to_string()));
        Ok(())
    }

    async fn notify_operator(&self, text: &str) -> anyhow::Result<()> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((None, text.to_string()));
        Ok(())
    }
}
