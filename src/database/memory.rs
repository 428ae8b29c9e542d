//! In-memory account store
//!
//! Used when PostgreSQL is disabled (dev mode) and by the test suites.
//! One lock guards accounts, the referral-code index and the edge list,
//! so every operation, the referral unit included, is atomic.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{AccountStore, InsertOutcome};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{Account, ReferralEdge};

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    /// Wallet ids in creation order
    order: Vec<String>,
    /// referral_code -> wallet_id
    code_index: HashMap<String, String>,
    edges: Vec<ReferralEdge>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.accounts.len()
    }
}

impl AccountStore for MemoryStore {
    async fn get(&self, wallet_id: &str) -> LedgerResult<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(wallet_id).cloned())
    }

    async fn find_by_referral_code(&self, code: &str) -> LedgerResult<Option<Account>> {
        let state = self.state.read().await;
        Ok(state
            .code_index
            .get(code)
            .and_then(|wallet| state.accounts.get(wallet))
            .cloned())
    }

    async fn insert_if_absent(&self, account: Account) -> LedgerResult<InsertOutcome> {
        let mut state = self.state.write().await;

        if let Some(existing) = state.accounts.get(&account.wallet_id) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }

        if state.code_index.contains_key(&account.referral_code) {
            return Ok(InsertOutcome::CodeTaken);
        }

        state
            .code_index
            .insert(account.referral_code.clone(), account.wallet_id.clone());
        state.order.push(account.wallet_id.clone());
        state
            .accounts
            .insert(account.wallet_id.clone(), account.clone());

        debug!(wallet = %account.wallet_id, "Account inserted (memory)");
        Ok(InsertOutcome::Inserted(account))
    }

    async fn compare_and_set(
        &self,
        expected_revision: i64,
        account: &Account,
    ) -> LedgerResult<Option<Account>> {
        let mut state = self.state.write().await;

        let Some(stored) = state.accounts.get_mut(&account.wallet_id) else {
            return Ok(None);
        };

        if stored.revision != expected_revision {
            return Ok(None);
        }

        // Identity fields never change after creation
        let mut updated = account.clone();
        updated.referral_code = stored.referral_code.clone();
        updated.created_at = stored.created_at;
        updated.revision = expected_revision + 1;

        *stored = updated.clone();
        Ok(Some(updated))
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

        let mut state = self.state.write().await;

        // Check everything before touching anything
        match state.accounts.get(referee_wallet_id) {
            None => return Err(LedgerError::not_found("User not found")),
            Some(referee) if referee.referral_code_applied => {
                return Err(LedgerError::conflict("Referral code has already been applied"));
            }
            Some(_) => {}
        }
        if !state.accounts.contains_key(referrer_wallet_id) {
            return Err(LedgerError::not_found("Invalid referral code"));
        }

        if let Some(referrer) = state.accounts.get_mut(referrer_wallet_id) {
            referrer.points = referrer.points.saturating_add(referrer_bonus);
            referrer.revision += 1;
        }

        state.edges.push(ReferralEdge {
            referrer_wallet_id: referrer_wallet_id.to_string(),
            referee_wallet_id: referee_wallet_id.to_string(),
            joined_at,
        });

        let referee = state
            .accounts
            .get_mut(referee_wallet_id)
            .ok_or_else(|| LedgerError::not_found("User not found"))?;
        referee.points = referee.points.saturating_add(referee_bonus);
        referee.referral_code_applied = true;
        referee.revision += 1;

        Ok(referee.clone())
    }

    async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        let state = self.state.read().await;
        Ok(state
            .order
            .iter()
            .filter_map(|wallet| state.accounts.get(wallet))
            .cloned()
            .collect())
    }

    async fn referrals_of(&self, referrer_wallet_id: &str) -> LedgerResult<Vec<ReferralEdge>> {
        let state = self.state.read().await;
        Ok(state
            .edges
            .iter()
            .filter(|e| e.referrer_wallet_id == referrer_wallet_id)
            .cloned()
            .collect())
    }

    async fn referral_counts(&self) -> LedgerResult<HashMap<String, u64>> {
        let state = self.state.read().await;
        let mut counts = HashMap::new();
        for edge in &state.edges {
            *counts.entry(edge.referrer_wallet_id.clone()).or_insert(0u64) += 1;
        }
        Ok(counts)
    }
}
