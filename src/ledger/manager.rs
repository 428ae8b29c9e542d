//! Account Ledger - single entry point for every account mutation
//!
//! Single-account writes are read-modify-write loops over the store's
//! revision-checked `compare_and_set`; a lost race re-reads and re-applies
//! the mutation against the fresh record. The referral unit is delegated to
//! the store's atomic `apply_referral`. Every store call is bounded by the
//! configured storage timeout.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::database::{AccountStore, InsertOutcome};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::account::{
    normalize_referral_code, referral_code_candidates, validate_wallet_id, Account,
    ReferralSummary, TaskId,
};
use crate::mining::MiningEngine;

pub const DEFAULT_JOIN_BONUS: u64 = 500;
pub const DEFAULT_REFERRAL_BONUS: u64 = 1000;
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Attempts per compare-and-set loop before reporting contention
const MAX_CAS_ATTEMPTS: usize = 8;

/// Numbered fallbacks tried once every wallet prefix is taken as a code
const MAX_CODE_SUFFIX: u32 = 16;

/// Fixed bonuses credited by a successful referral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferralBonuses {
    /// Credited to the wallet applying the code
    pub join_bonus: u64,
    /// Credited to the owner of the code
    pub referral_bonus: u64,
}

impl Default for ReferralBonuses {
    fn default() -> Self {
        Self {
            join_bonus: DEFAULT_JOIN_BONUS,
            referral_bonus: DEFAULT_REFERRAL_BONUS,
        }
    }
}

/// Outcome of a get-or-create call
#[derive(Debug, Clone)]
pub struct Registration {
    pub account: Account,
    /// False when the wallet already existed (including a lost creation race)
    pub created: bool,
}

pub struct AccountLedger<S: AccountStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    mining: MiningEngine,
    bonuses: ReferralBonuses,
    storage_timeout: Duration,
}

impl<S: AccountStore> Clone for AccountLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            mining: self.mining,
            bonuses: self.bonuses,
            storage_timeout: self.storage_timeout,
        }
    }
}

impl<S: AccountStore> AccountLedger<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            mining: MiningEngine::default(),
            bonuses: ReferralBonuses::default(),
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }

    pub fn with_mining(mut self, mining: MiningEngine) -> Self {
        self.mining = mining;
        self
    }

    pub fn with_bonuses(mut self, bonuses: ReferralBonuses) -> Self {
        self.bonuses = bonuses;
        self
    }

    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }

    pub fn mining(&self) -> &MiningEngine {
        &self.mining
    }

    pub fn bonuses(&self) -> &ReferralBonuses {
        &self.bonuses
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Run a store operation under the storage timeout
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> LedgerResult<T>
    where
        F: Future<Output = LedgerResult<T>>,
    {
        match tokio::time::timeout(self.storage_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    op = op,
                    timeout_ms = %self.storage_timeout.as_millis(),
                    "Storage operation timed out"
                );
                Err(LedgerError::storage(format!("{} timed out", op)))
            }
        }
    }

    async fn load(&self, wallet_id: &str) -> LedgerResult<Account> {
        self.bounded("get", self.store.get(wallet_id))
            .await?
            .ok_or_else(|| LedgerError::not_found("User not found"))
    }

    /// Read-modify-write against the stored revision. `apply` returns
    /// whether it changed anything; unchanged records are returned as read.
    async fn mutate<F>(&self, wallet_id: &str, op: &'static str, apply: F) -> LedgerResult<Account>
    where
        F: Fn(&mut Account, DateTime<Utc>) -> LedgerResult<bool> + Send + Sync,
    {
        let wallet_id = validate_wallet_id(wallet_id)?;

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.load(wallet_id).await?;
            let mut next = current.clone();

            if !apply(&mut next, self.clock.now())? {
                return Ok(current);
            }

            let stored = self
                .bounded("compare_and_set", self.store.compare_and_set(current.revision, &next))
                .await?;

            match stored {
                Some(account) => return Ok(account),
                None => {
                    debug!(wallet = %wallet_id, op = op, attempt, "Revision moved, retrying");
                }
            }
        }

        warn!(wallet = %wallet_id, op = op, "Gave up after repeated write contention");
        Err(LedgerError::storage(format!("{} hit write contention, retry", op)))
    }

    /// Return the wallet's account, creating it on first contact
    pub async fn get_or_create(
        &self,
        wallet_id: &str,
        origin_address: Option<&str>,
    ) -> LedgerResult<Account> {
        self.register(wallet_id, origin_address)
            .await
            .map(|registration| registration.account)
    }

    /// Like [`Self::get_or_create`], also reporting whether this call created it.
    /// Concurrent first contact resolves to the winner's record.
    pub async fn register(
        &self,
        wallet_id: &str,
        origin_address: Option<&str>,
    ) -> LedgerResult<Registration> {
        let wallet_id = validate_wallet_id(wallet_id)?;

        if let Some(account) = self.bounded("get", self.store.get(wallet_id)).await? {
            return Ok(Registration {
                account,
                created: false,
            });
        }

        let origin = origin_address
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string);

        let upper = wallet_id.to_ascii_uppercase();
        let candidates = referral_code_candidates(wallet_id)
            .chain((1..=MAX_CODE_SUFFIX).map(|n| format!("{}{}", upper, n)));

        for code in candidates {
            let account = Account::new(
                wallet_id.to_string(),
                code,
                origin.clone(),
                self.clock.now(),
            );

            match self
                .bounded("insert_if_absent", self.store.insert_if_absent(account))
                .await?
            {
                InsertOutcome::Inserted(account) => {
                    info!(
                        wallet = %account.wallet_id,
                        referral_code = %account.referral_code,
                        "Account created"
                    );
                    return Ok(Registration {
                        account,
                        created: true,
                    });
                }
                InsertOutcome::Existing(account) => {
                    debug!(wallet = %wallet_id, "Lost creation race, returning existing account");
                    return Ok(Registration {
                        account,
                        created: false,
                    });
                }
                InsertOutcome::CodeTaken => continue,
            }
        }

        Err(LedgerError::conflict(
            "Could not allocate a unique referral code",
        ))
    }

    /// Read without creating
    pub async fn get_account(&self, wallet_id: &str) -> LedgerResult<Account> {
        let wallet_id = validate_wallet_id(wallet_id)?;
        self.load(wallet_id).await
    }

    /// Mark a task done; completing it again is a no-op
    pub async fn complete_task(&self, wallet_id: &str, task: &str) -> LedgerResult<Account> {
        let task: TaskId = task.parse()?;

        let account = self
            .mutate(wallet_id, "complete_task", move |account, _now| {
                if account.tasks_completed.is_done(task) {
                    return Ok(false);
                }
                account.tasks_completed.mark(task);
                Ok(true)
            })
            .await?;

        debug!(wallet = %account.wallet_id, task = %task, "Task completed");
        Ok(account)
    }

    /// Apply another wallet's referral code. Exactly once per account:
    /// both bonuses, the edge and the applied flag land together or not at all.
    pub async fn apply_referral(&self, wallet_id: &str, code: &str) -> LedgerResult<Account> {
        let wallet_id = validate_wallet_id(wallet_id)?;
        let code = normalize_referral_code(code);
        if code.is_empty() {
            return Err(LedgerError::validation("Referral code is required"));
        }

        let account = self.load(wallet_id).await?;

        if account.referral_code_applied {
            return Err(LedgerError::conflict("Referral code has already been applied"));
        }

        if account.owns_code(&code) {
            return Err(LedgerError::validation("Cannot use your own referral code"));
        }

        let referrer = self
            .bounded("find_by_referral_code", self.store.find_by_referral_code(&code))
            .await?
            .ok_or_else(|| LedgerError::not_found("Invalid referral code"))?;

        let referee = self
            .bounded(
                "apply_referral",
                self.store.apply_referral(
                    wallet_id,
                    &referrer.wallet_id,
                    self.bonuses.join_bonus,
                    self.bonuses.referral_bonus,
                    self.clock.now(),
                ),
            )
            .await?;

        info!(
            referee = %referee.wallet_id,
            referrer = %referrer.wallet_id,
            join_bonus = self.bonuses.join_bonus,
            referral_bonus = self.bonuses.referral_bonus,
            "Referral applied"
        );

        Ok(referee)
    }

    /// Close the referral step without a code; no bonus, no edge
    pub async fn skip_referral(&self, wallet_id: &str) -> LedgerResult<Account> {
        self.mutate(wallet_id, "skip_referral", |account, _now| {
            if account.referral_code_applied {
                return Ok(false);
            }
            account.referral_code_applied = true;
            Ok(true)
        })
        .await
    }

    /// Admin override: overwrite the balance, bypassing every accrual rule.
    /// Callers must have passed the admin check before reaching this.
    pub async fn set_points(&self, wallet_id: &str, value: i64) -> LedgerResult<Account> {
        if value < 0 {
            return Err(LedgerError::validation("Points must be a non-negative integer."));
        }
        let value = value as u64;

        let account = self
            .mutate(wallet_id, "set_points", move |account, _now| {
                if account.points == value {
                    return Ok(false);
                }
                account.points = value;
                Ok(true)
            })
            .await?;

        info!(wallet = %account.wallet_id, points = value, "Points overridden by admin");
        Ok(account)
    }

    /// Open a mining session; never restarts one that is already open
    pub async fn activate_mining(&self, wallet_id: &str) -> LedgerResult<Account> {
        let account = self
            .mutate(wallet_id, "activate_mining", |account, now| {
                if account.mining_activated && account.mining_session_start.is_some() {
                    return Ok(false);
                }
                account.mining_activated = true;
                account.mining_session_start = Some(now);
                Ok(true)
            })
            .await?;

        debug!(wallet = %account.wallet_id, "Mining active");
        Ok(account)
    }

    /// Credit a finished session and immediately start the next one
    pub async fn claim_mining(&self, wallet_id: &str) -> LedgerResult<Account> {
        let mining = self.mining;

        let account = self
            .mutate(wallet_id, "claim_mining", move |account, now| {
                let reward = mining.claimable_reward(account, now)?;
                account.points = account.points.saturating_add(reward);
                account.mining_session_start = Some(now);
                Ok(true)
            })
            .await?;

        info!(
            wallet = %account.wallet_id,
            reward = mining.reward(),
            points = account.points,
            "Mining reward claimed"
        );
        Ok(account)
    }

    pub async fn referrals(&self, wallet_id: &str) -> LedgerResult<ReferralSummary> {
        let account = self.get_account(wallet_id).await?;
        let edges = self
            .bounded("referrals_of", self.store.referrals_of(&account.wallet_id))
            .await?;
        Ok(ReferralSummary::from(edges))
    }

    pub async fn accounts(&self) -> LedgerResult<Vec<Account>> {
        self.bounded("list_accounts", self.store.list_accounts()).await
    }

    pub async fn referral_counts(&self) -> LedgerResult<HashMap<String, u64>> {
        self.bounded("referral_counts", self.store.referral_counts()).await
    }
}
