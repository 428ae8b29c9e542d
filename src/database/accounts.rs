//! Account Repository - PostgreSQL operations for accounts using sqlx

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::{AccountStore, InsertOutcome};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{Account, ReferralEdge, TasksCompleted};

const ACCOUNT_COLUMNS: &str = "wallet_address, points, referral_code, referral_code_applied, \
     tasks_completed, mining_activated, mining_session_start, ip_address, created_at, revision";

#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn points_to_db(points: u64) -> LedgerResult<i64> {
    i64::try_from(points).map_err(|_| LedgerError::validation("Points value out of range"))
}

fn row_to_account(row: &PgRow) -> LedgerResult<Account> {
    let points: i64 = row.try_get("points")?;
    let tasks: Json<TasksCompleted> = row.try_get("tasks_completed")?;

    Ok(Account {
        wallet_id: row.try_get("wallet_address")?,
        points: u64::try_from(points)
            .map_err(|_| LedgerError::storage("Negative points stored in users table"))?,
        referral_code: row.try_get("referral_code")?,
        referral_code_applied: row.try_get("referral_code_applied")?,
        tasks_completed: tasks.0,
        mining_activated: row.try_get("mining_activated")?,
        mining_session_start: row.try_get("mining_session_start")?,
        origin_address: row.try_get("ip_address")?,
        created_at: row.try_get("created_at")?,
        revision: row.try_get("revision")?,
    })
}

impl AccountStore for PgAccountStore {
    async fn get(&self, wallet_id: &str) -> LedgerResult<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE wallet_address = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(wallet_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn find_by_referral_code(&self, code: &str) -> LedgerResult<Option<Account>> {
        // Served by the UNIQUE index on referral_code
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE referral_code = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn insert_if_absent(&self, account: Account) -> LedgerResult<InsertOutcome> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users
            ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT DO NOTHING
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS, ACCOUNT_COLUMNS
        ))
        .bind(&account.wallet_id)
        .bind(points_to_db(account.points)?)
        .bind(&account.referral_code)
        .bind(account.referral_code_applied)
        .bind(Json(account.tasks_completed))
        .bind(account.mining_activated)
        .bind(account.mining_session_start)
        .bind(&account.origin_address)
        .bind(account.created_at)
        .bind(account.revision)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            debug!(wallet = %account.wallet_id, "Account inserted");
            return Ok(InsertOutcome::Inserted(row_to_account(&row)?));
        }

        // Either the wallet or the referral code already exists
        match self.get(&account.wallet_id).await? {
            Some(existing) => Ok(InsertOutcome::Existing(existing)),
            None => Ok(InsertOutcome::CodeTaken),
        }
    }

    async fn compare_and_set(
        &self,
        expected_revision: i64,
        account: &Account,
    ) -> LedgerResult<Option<Account>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users
            SET points = $3,
                referral_code_applied = $4,
                tasks_completed = $5,
                mining_activated = $6,
                mining_session_start = $7,
                ip_address = $8,
                revision = revision + 1
            WHERE wallet_address = $1 AND revision = $2
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(&account.wallet_id)
        .bind(expected_revision)
        .bind(points_to_db(account.points)?)
        .bind(account.referral_code_applied)
        .bind(Json(account.tasks_completed))
        .bind(account.mining_activated)
        .bind(account.mining_session_start)
        .bind(&account.origin_address)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn apply_referral(
        &self,
        referee_wallet_id: &str,
        referrer_wallet_id: &str,
        referee_bonus: u64,
        referrer_bonus: u64,
        joined_at: DateTime<Utc>,
    ) -> LedgerResult<Account> {
        if referee_wallet_id == referrer_wallet_id {
            return Err(LedgerError::validation("Cannot use your own referral code"));
        }

        let mut tx = self.pool.begin().await?;

        // Lock both rows in a fixed order so crossing referrals cannot deadlock
        let locked = sqlx::query(
            r#"
            SELECT wallet_address, referral_code_applied
            FROM users
            WHERE wallet_address = ANY($1)
            ORDER BY wallet_address
            FOR UPDATE
            "#,
        )
        .bind(vec![referee_wallet_id.to_string(), referrer_wallet_id.to_string()])
        .fetch_all(&mut *tx)
        .await?;

        let mut referee_applied = None;
        let mut referrer_found = false;
        for row in &locked {
            let wallet: String = row.try_get("wallet_address")?;
            if wallet == referee_wallet_id {
                referee_applied = Some(row.try_get::<bool, _>("referral_code_applied")?);
            } else if wallet == referrer_wallet_id {
                referrer_found = true;
            }
        }

        match referee_applied {
            None => return Err(LedgerError::not_found("User not found")),
            Some(true) => {
                return Err(LedgerError::conflict("Referral code has already been applied"));
            }
            Some(false) => {}
        }
        if !referrer_found {
            return Err(LedgerError::not_found("Invalid referral code"));
        }

        sqlx::query(
            r#"
            UPDATE users
            SET points = points + $2, revision = revision + 1
            WHERE wallet_address = $1
            "#,
        )
        .bind(referrer_wallet_id)
        .bind(points_to_db(referrer_bonus)?)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO referred_users (referrer_wallet, referee_wallet, join_date)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(referrer_wallet_id)
        .bind(referee_wallet_id)
        .bind(joined_at)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE users
            SET points = points + $2, referral_code_applied = TRUE, revision = revision + 1
            WHERE wallet_address = $1
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(referee_wallet_id)
        .bind(points_to_db(referee_bonus)?)
        .fetch_one(&mut *tx)
        .await?;
        let referee = row_to_account(&row)?;

        tx.commit().await.map_err(|e| {
            warn!(referee = %referee_wallet_id, error = %e, "Referral commit failed");
            LedgerError::from(e)
        })?;

        Ok(referee)
    }

    async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users ORDER BY created_at ASC, wallet_address ASC",
            ACCOUNT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_account).collect()
    }

    async fn referrals_of(&self, referrer_wallet_id: &str) -> LedgerResult<Vec<ReferralEdge>> {
        let rows = sqlx::query(
            r#"
            SELECT referrer_wallet, referee_wallet, join_date
            FROM referred_users
            WHERE referrer_wallet = $1
            ORDER BY join_date ASC
            "#,
        )
        .bind(referrer_wallet_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> LedgerResult<ReferralEdge> {
                Ok(ReferralEdge {
                    referrer_wallet_id: row.try_get("referrer_wallet")?,
                    referee_wallet_id: row.try_get("referee_wallet")?,
                    joined_at: row.try_get("join_date")?,
                })
            })
            .collect()
    }

    async fn referral_counts(&self) -> LedgerResult<HashMap<String, u64>> {
        let rows = sqlx::query(
            r#"
            SELECT referrer_wallet, COUNT(*) AS referral_count
            FROM referred_users
            GROUP BY referrer_wallet
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in &rows {
            let wallet: String = row.try_get("referrer_wallet")?;
            let count: i64 = row.try_get("referral_count")?;
            counts.insert(wallet, count.max(0) as u64);
        }
        Ok(counts)
    }
}
