//! Account record and its value types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, LedgerResult};

/// Length of the wallet prefix used as a referral code
pub const REFERRAL_CODE_LEN: usize = 8;

/// Upper bound on wallet id length (base58 and hex addresses are far shorter)
pub const MAX_WALLET_ID_LEN: usize = 128;

/// Closed set of onboarding social tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskId {
    X,
    Telegram,
    Discord,
}

impl TaskId {
    pub const ALL: [TaskId; 3] = [TaskId::X, TaskId::Telegram, TaskId::Discord];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskId::X => "x",
            TaskId::Telegram => "telegram",
            TaskId::Discord => "discord",
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(TaskId::X),
            "telegram" => Ok(TaskId::Telegram),
            "discord" => Ok(TaskId::Discord),
            other => Err(LedgerError::validation(format!("Unknown task: {}", other))),
        }
    }
}

/// Completion flags, one per task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TasksCompleted {
    #[serde(default)]
    pub x: bool,
    #[serde(default)]
    pub telegram: bool,
    #[serde(default)]
    pub discord: bool,
}

impl TasksCompleted {
    pub fn is_done(&self, task: TaskId) -> bool {
        match task {
            TaskId::X => self.x,
            TaskId::Telegram => self.telegram,
            TaskId::Discord => self.discord,
        }
    }

    pub fn mark(&mut self, task: TaskId) {
        match task {
            TaskId::X => self.x = true,
            TaskId::Telegram => self.telegram = true,
            TaskId::Discord => self.discord = true,
        }
    }

    pub fn all_done(&self) -> bool {
        TaskId::ALL.iter().all(|t| self.is_done(*t))
    }
}

/// Where a user is in the onboarding flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnboardingStep {
    Tasks,
    Referral,
    Activate,
    Dashboard,
}

/// Per-wallet ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub wallet_id: String,
    pub points: u64,
    pub referral_code: String,
    pub referral_code_applied: bool,
    pub tasks_completed: TasksCompleted,
    pub mining_activated: bool,
    pub mining_session_start: Option<DateTime<Utc>>,
    /// Network origin captured at creation; only read by the anomaly reporter
    #[serde(skip_serializing, default)]
    pub origin_address: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Storage concurrency token, bumped on every write
    #[serde(skip)]
    pub revision: i64,
}

impl Account {
    pub fn new(
        wallet_id: String,
        referral_code: String,
        origin_address: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            wallet_id,
            points: 0,
            referral_code,
            referral_code_applied: false,
            tasks_completed: TasksCompleted::default(),
            mining_activated: false,
            mining_session_start: None,
            origin_address,
            created_at,
            revision: 0,
        }
    }

    pub fn onboarding_step(&self) -> OnboardingStep {
        if !self.tasks_completed.all_done() {
            OnboardingStep::Tasks
        } else if !self.referral_code_applied {
            OnboardingStep::Referral
        } else if !self.mining_activated {
            OnboardingStep::Activate
        } else {
            OnboardingStep::Dashboard
        }
    }

    /// True if `code` is this account's own referral code (case-insensitive)
    pub fn owns_code(&self, code: &str) -> bool {
        self.referral_code.eq_ignore_ascii_case(code.trim())
    }
}

/// Immutable record of one successful referral
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralEdge {
    pub referrer_wallet_id: String,
    pub referee_wallet_id: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferredUser {
    pub wallet: String,
    pub join_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralSummary {
    pub count: usize,
    pub referred_users: Vec<ReferredUser>,
}

impl From<Vec<ReferralEdge>> for ReferralSummary {
    fn from(edges: Vec<ReferralEdge>) -> Self {
        let referred_users: Vec<ReferredUser> = edges
            .into_iter()
            .map(|e| ReferredUser {
                wallet: e.referee_wallet_id,
                join_date: e.joined_at,
            })
            .collect();

        Self {
            count: referred_users.len(),
            referred_users,
        }
    }
}

/// Check a wallet id and return it trimmed
pub fn validate_wallet_id(wallet_id: &str) -> LedgerResult<&str> {
    let wallet_id = wallet_id.trim();

    if wallet_id.is_empty() {
        return Err(LedgerError::validation("Wallet address is required"));
    }

    if wallet_id.len() > MAX_WALLET_ID_LEN {
        return Err(LedgerError::validation(format!(
            "Wallet address is too long (maximum {} characters)",
            MAX_WALLET_ID_LEN
        )));
    }

    if !wallet_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(LedgerError::validation(
            "Wallet address contains invalid characters",
        ));
    }

    Ok(wallet_id)
}

/// Canonical form used for referral code storage and lookup
pub fn normalize_referral_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Referral codes to try for a wallet, in order: the 8-char uppercase prefix,
/// then progressively longer prefixes up to the whole wallet id.
///
/// Expects an id that already passed [`validate_wallet_id`] (ASCII only).
pub fn referral_code_candidates(wallet_id: &str) -> impl Iterator<Item = String> + '_ {
    let first = REFERRAL_CODE_LEN.min(wallet_id.len());
    (first..=wallet_id.len()).map(move |len| wallet_id[..len].to_ascii_uppercase())
}

/// Parse an admin-supplied points value; rejects negatives and fractions
pub fn parse_points(value: &serde_json::Value) -> LedgerResult<i64> {
    let invalid = || LedgerError::validation("Points must be a non-negative integer.");

    let points = match value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i
            } else if let Some(u) = n.as_u64() {
                i64::try_from(u).map_err(|_| invalid())?
            } else {
                let f = n.as_f64().ok_or_else(invalid)?;
                if f.fract() != 0.0 || !f.is_finite() || f > i64::MAX as f64 {
                    return Err(invalid());
                }
                f as i64
            }
        }
        serde_json::Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    if points < 0 {
        return Err(invalid());
    }

    Ok(points)
}
