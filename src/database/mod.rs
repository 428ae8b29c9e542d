//! Account persistence
//!
//! The ledger only talks to an [`AccountStore`]. Two backends ship:
//! an in-memory store (dev mode and tests) and PostgreSQL via sqlx.

pub mod accounts;
pub mod memory;
pub mod pool;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;

use crate::error::LedgerResult;
use crate::ledger::{Account, ReferralEdge};

pub use accounts::PgAccountStore;
pub use memory::MemoryStore;
pub use pool::DatabasePool;

/// Result of a create-if-absent insert
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The record was stored as given
    Inserted(Account),
    /// Another record already holds this wallet id; returned unchanged
    Existing(Account),
    /// The referral code belongs to a different wallet
    CodeTaken,
}

/// Persistence collaborator for accounts and referral edges.
///
/// Writes to a single account go through [`AccountStore::compare_and_set`]
/// against the record's `revision`. The referral unit is a dedicated
/// operation so backends can wrap all four effects in one transaction.
pub trait AccountStore: Send + Sync + 'static {
    fn get(&self, wallet_id: &str) -> impl Future<Output = LedgerResult<Option<Account>>> + Send;

    /// Indexed lookup of a normalized (uppercase) referral code
    fn find_by_referral_code(
        &self,
        code: &str,
    ) -> impl Future<Output = LedgerResult<Option<Account>>> + Send;

    fn insert_if_absent(
        &self,
        account: Account,
    ) -> impl Future<Output = LedgerResult<InsertOutcome>> + Send;

    /// Replace the record if its stored revision still equals
    /// `expected_revision`. Returns the stored record (with its new
    /// revision) on success, `None` if the revision moved or the wallet is gone.
    fn compare_and_set(
        &self,
        expected_revision: i64,
        account: &Account,
    ) -> impl Future<Output = LedgerResult<Option<Account>>> + Send;

    /// Credit both parties, record the edge and mark the referee as
    /// referred, all or nothing. Fails with `Conflict` if the referee has
    /// already applied a code and `NotFound` if either wallet is missing.
    fn apply_referral(
        &self,
        referee_wallet_id: &str,
        referrer_wallet_id: &str,
        referee_bonus: u64,
        referrer_bonus: u64,
        joined_at: DateTime<Utc>,
    ) -> impl Future<Output = LedgerResult<Account>> + Send;

    /// All accounts in creation order
    fn list_accounts(&self) -> impl Future<Output = LedgerResult<Vec<Account>>> + Send;

    fn referrals_of(
        &self,
        referrer_wallet_id: &str,
    ) -> impl Future<Output = LedgerResult<Vec<ReferralEdge>>> + Send;

    /// Referral edge count per referrer; referrers with none are absent
    fn referral_counts(&self) -> impl Future<Output = LedgerResult<HashMap<String, u64>>> + Send;
}
