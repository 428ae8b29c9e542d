//! Database Connection Pool using sqlx

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::database::accounts::PgAccountStore;
use crate::error::LedgerResult;

pub struct DatabasePool {
    pool: PgPool,
    accounts: PgAccountStore,
}

impl DatabasePool {
    pub async fn new(
        connection_string: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> LedgerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(connection_string)
            .await?;

        info!("Connected to PostgreSQL");

        let accounts = PgAccountStore::new(pool.clone());

        Ok(Self { pool, accounts })
    }

    pub async fn init_schema(&self) -> LedgerResult<()> {
        info!("Initializing database schema...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                wallet_address        TEXT PRIMARY KEY,
                points                BIGINT NOT NULL DEFAULT 0 CHECK (points >= 0),
                referral_code         TEXT NOT NULL UNIQUE,
                referral_code_applied BOOLEAN NOT NULL DEFAULT FALSE,
                tasks_completed       JSONB NOT NULL DEFAULT '{}'::jsonb,
                mining_activated      BOOLEAN NOT NULL DEFAULT FALSE,
                mining_session_start  TIMESTAMPTZ,
                ip_address            TEXT,
                created_at            TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                revision              BIGINT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS referred_users (
                id              BIGSERIAL PRIMARY KEY,
                referrer_wallet TEXT NOT NULL REFERENCES users (wallet_address),
                referee_wallet  TEXT NOT NULL UNIQUE REFERENCES users (wallet_address),
                join_date       TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS referred_users_referrer_idx ON referred_users (referrer_wallet)",
        )
        .execute(&self.pool)
        .await?;

        info!("Database schema initialized");
        Ok(())
    }

    pub fn accounts(&self) -> &PgAccountStore {
        &self.accounts
    }
}
