//! Dice duel data models.

use crate::ledger::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Game ID type
pub type GameId = i64;

/// Resolution state of a duel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    CreatorWon,
    OpponentWon,
    Draw,
}

impl Outcome {
    /// Storage label.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Pending => "pending",
            Outcome::CreatorWon => "creator",
            Outcome::OpponentWon => "opponent",
            Outcome::Draw => "draw",
        }
    }

    /// Parse a storage label, defaulting unknown values to `Pending`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "creator" => Outcome::CreatorWon,
            "opponent" => Outcome::OpponentWon,
            "draw" => Outcome::Draw,
            _ => Outcome::Pending,
        }
    }
}

/// One dice duel.
///
/// The creator's stake is debited at creation and held by the game, not the
/// ledger; the bank is `2 * bet` once matched and is fully redistributed on
/// resolution — no coins are created or destroyed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiceGame {
    pub id: GameId,
    pub creator_id: UserId,
    pub opponent_id: Option<UserId>,
    pub bet: i64,
    pub creator_roll: Option<u8>,
    pub opponent_roll: Option<u8>,
    pub outcome: Outcome,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl DiceGame {
    pub fn new(id: GameId, creator_id: UserId, bet: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            creator_id,
            opponent_id: None,
            bet,
            creator_roll: None,
            opponent_roll: None,
            outcome: Outcome::Pending,
            created_at,
            finished_at: None,
        }
    }

    /// Still waiting for an opponent.
    pub fn is_open(&self) -> bool {
        self.opponent_id.is_none() && self.outcome == Outcome::Pending
    }

    pub fn is_finished(&self) -> bool {
        self.outcome != Outcome::Pending
    }

    /// Total stake at risk once matched.
    pub fn bank(&self) -> i64 {
        self.bet * 2
    }
}

/// Listing entry for a joinable game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenGame {
    pub id: GameId,
    pub creator_id: UserId,
    pub bet: i64,
}
