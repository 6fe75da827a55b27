//! Postgres store backend.

use super::{Store, StoreResult};
use crate::deposit::DepositRecord;
use crate::dice::{DiceGame, Outcome};
use crate::ledger::{Account, UserId};
use crate::raffle::{RaffleRound, RoundId};
use crate::transfer::TransferRecord;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashSet;

/// `Store` backend on a Postgres pool.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and make sure the schema exists.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url).await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id BIGINT PRIMARY KEY,
                balance BIGINT NOT NULL DEFAULT 0,
                display_handle TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS games (
                id BIGINT PRIMARY KEY,
                creator_id BIGINT NOT NULL,
                opponent_id BIGINT,
                bet BIGINT NOT NULL,
                creator_roll INTEGER,
                opponent_roll INTEGER,
                outcome TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                finished_at TIMESTAMP
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS raffle_rounds (
                id BIGINT PRIMARY KEY,
                created_at TIMESTAMP NOT NULL,
                finished_at TIMESTAMP,
                winner_id BIGINT,
                total_bank BIGINT NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS raffle_bets (
                id BIGSERIAL PRIMARY KEY,
                round_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                amount BIGINT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS deposits (
                tx_id TEXT PRIMARY KEY,
                user_id BIGINT NOT NULL,
                external_amount DOUBLE PRECISION NOT NULL,
                credited_coins BIGINT NOT NULL,
                note TEXT NOT NULL,
                seen_at TIMESTAMP NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS transfers (
                id BIGSERIAL PRIMARY KEY,
                from_user BIGINT NOT NULL,
                to_user BIGINT NOT NULL,
                amount BIGINT NOT NULL,
                occurred_at TIMESTAMP NOT NULL
            )
            "#,
        ];
        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn game_from_row(row: &sqlx::postgres::PgRow) -> DiceGame {
    DiceGame {
        id: row.get("id"),
        creator_id: row.get("creator_id"),
        opponent_id: row.get("opponent_id"),
        bet: row.get("bet"),
        creator_roll: row.get::<Option<i32>, _>("creator_roll").map(|r| r as u8),
        opponent_roll: row.get::<Option<i32>, _>("opponent_roll").map(|r| r as u8),
        outcome: Outcome::from_label(row.get::<String, _>("outcome").as_str()),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        finished_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("finished_at")
            .map(|dt| dt.and_utc()),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_account(&self, account: &Account) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, balance, display_handle)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                balance = EXCLUDED.balance,
                display_handle = COALESCE(EXCLUDED.display_handle, accounts.display_handle)
            "#,
        )
        .bind(account.id)
        .bind(account.balance)
        .bind(&account.display_handle)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_game(&self, game: &DiceGame) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO games (
                id, creator_id, opponent_id, bet,
                creator_roll, opponent_roll, outcome,
                created_at, finished_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                opponent_id = EXCLUDED.opponent_id,
                creator_roll = EXCLUDED.creator_roll,
                opponent_roll = EXCLUDED.opponent_roll,
                outcome = EXCLUDED.outcome,
                finished_at = EXCLUDED.finished_at
            "#,
        )
        .bind(game.id)
        .bind(game.creator_id)
        .bind(game.opponent_id)
        .bind(game.bet)
        .bind(game.creator_roll.map(|r| r as i32))
        .bind(game.opponent_roll.map(|r| r as i32))
        .bind(game.outcome.label())
        .bind(game.created_at.naive_utc())
        .bind(game.finished_at.map(|dt| dt.naive_utc()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_raffle_round(&self, round: &RaffleRound) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO raffle_rounds (id, created_at, finished_at, winner_id, total_bank)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                finished_at = EXCLUDED.finished_at,
                winner_id = EXCLUDED.winner_id,
                total_bank = EXCLUDED.total_bank
            "#,
        )
        .bind(round.id)
        .bind(round.created_at.naive_utc())
        .bind(round.finished_at.map(|dt| dt.naive_utc()))
        .bind(round.winner_id)
        .bind(round.total_bank)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_raffle_bet(
        &self,
        round_id: RoundId,
        user_id: UserId,
        amount: i64,
    ) -> StoreResult<()> {
        sqlx::query("INSERT INTO raffle_bets (round_id, user_id, amount) VALUES ($1, $2, $3)")
            .bind(round_id)
            .bind(user_id)
            .bind(amount)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_deposit(&self, deposit: &DepositRecord) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO deposits (tx_id, user_id, external_amount, credited_coins, note, seen_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tx_id) DO NOTHING
            "#,
        )
        .bind(&deposit.tx_id)
        .bind(deposit.user_id)
        .bind(deposit.external_amount)
        .bind(deposit.credited_coins)
        .bind(&deposit.note)
        .bind(deposit.seen_at.naive_utc())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_transfer(&self, transfer: &TransferRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO transfers (from_user, to_user, amount, occurred_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(transfer.from_user)
        .bind(transfer.to_user)
        .bind(transfer.amount)
        .bind(transfer.timestamp.naive_utc())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_accounts(&self) -> StoreResult<Vec<Account>> {
        let rows = sqlx::query("SELECT id, balance, display_handle FROM accounts")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| Account {
                id: row.get("id"),
                balance: row.get("balance"),
                display_handle: row.get("display_handle"),
            })
            .collect())
    }

    async fn finished_games_for_user(&self, user_id: UserId) -> StoreResult<Vec<DiceGame>> {
        let rows = sqlx::query(
            r#"
            SELECT id, creator_id, opponent_id, bet, creator_roll, opponent_roll,
                   outcome, created_at, finished_at
            FROM games
            WHERE outcome <> 'pending'
              AND (creator_id = $1 OR opponent_id = $1)
            ORDER BY finished_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(game_from_row).collect())
    }

    async fn all_finished_games(&self) -> StoreResult<Vec<DiceGame>> {
        let rows = sqlx::query(
            r#"
            SELECT id, creator_id, opponent_id, bet, creator_roll, opponent_roll,
                   outcome, created_at, finished_at
            FROM games
            WHERE outcome <> 'pending'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(game_from_row).collect())
    }

    async fn processed_deposit_ids(&self) -> StoreResult<HashSet<String>> {
        let rows = sqlx::query("SELECT tx_id FROM deposits")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| row.get("tx_id")).collect())
    }
}
