//! Mining Session Engine
//!
//! Pure, time-derived accrual for mining sessions. Nothing here holds a
//! timer: every value is recomputed from `mining_session_start` and the
//! caller's `now`, so a restarted service or a freshly opened client sees
//! the same numbers.
//!
//! ## Session cycle
//!
//! ```text
//! INACTIVE ──activate──► ACTIVE ──(elapsed >= duration)──► CLAIMABLE
//!                          ▲                                   │
//!                          └───────────── claim ───────────────┘
//! ```
//!
//! Early claims are rejected: a claim pays the full reward and is only
//! accepted once the session is CLAIMABLE.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Account;

pub const DEFAULT_SESSION_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_MINING_REWARD: u64 = 1000;

/// Longest session chrono can represent (its durations are i64 milliseconds)
pub const MAX_SESSION_SECS: u64 = i64::MAX as u64 / 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiningState {
    /// Mining never activated
    Inactive,
    /// Session open, still accruing
    Active,
    /// Session elapsed, full reward claimable
    Claimable,
}

/// Session length and reward, both configuration values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningEngine {
    session_duration: Duration,
    reward: u64,
}

impl MiningEngine {
    /// Session length is clamped to `[1, MAX_SESSION_SECS]` seconds
    pub fn new(session_secs: u64, reward: u64) -> Self {
        let session_duration = i64::try_from(session_secs.clamp(1, MAX_SESSION_SECS))
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);

        Self {
            session_duration,
            reward,
        }
    }

    pub fn session_duration(&self) -> Duration {
        self.session_duration
    }

    pub fn reward(&self) -> u64 {
        self.reward
    }

    /// Time since the open session started; zero if none is open or the
    /// start lies in the future (clock skew)
    fn elapsed(&self, account: &Account, now: DateTime<Utc>) -> Option<Duration> {
        if !account.mining_activated {
            return None;
        }
        let start = account.mining_session_start?;
        Some((now - start).max(Duration::zero()))
    }

    pub fn state(&self, account: &Account, now: DateTime<Utc>) -> MiningState {
        match self.elapsed(account, now) {
            None => MiningState::Inactive,
            Some(elapsed) if elapsed >= self.session_duration => MiningState::Claimable,
            Some(_) => MiningState::Active,
        }
    }

    /// Points accrued by the open session, linear in elapsed time and
    /// clamped to `[0, reward]`. Zero while inactive.
    pub fn accrued_points(&self, account: &Account, now: DateTime<Utc>) -> f64 {
        let Some(elapsed) = self.elapsed(account, now) else {
            return 0.0;
        };

        if elapsed >= self.session_duration {
            return self.reward as f64;
        }

        let fraction = elapsed.num_milliseconds() as f64
            / self.session_duration.num_milliseconds() as f64;
        (fraction * self.reward as f64).clamp(0.0, self.reward as f64)
    }

    /// `max(0, session_duration - elapsed)`; zero while inactive
    pub fn time_remaining(&self, account: &Account, now: DateTime<Utc>) -> Duration {
        match self.elapsed(account, now) {
            None => Duration::zero(),
            Some(elapsed) => (self.session_duration - elapsed).max(Duration::zero()),
        }
    }

    /// Reward payable by a claim at `now`; rejects inactive or unfinished sessions
    pub fn claimable_reward(&self, account: &Account, now: DateTime<Utc>) -> LedgerResult<u64> {
        match self.state(account, now) {
            MiningState::Claimable => Ok(self.reward),
            MiningState::Inactive => Err(LedgerError::conflict("Mining has not been activated")),
            MiningState::Active => Err(LedgerError::conflict(format!(
                "Mining session is not complete ({}s remaining)",
                self.time_remaining(account, now).num_seconds()
            ))),
        }
    }

    pub fn status(&self, account: &Account, now: DateTime<Utc>) -> MiningStatus {
        MiningStatus {
            state: self.state(account, now),
            accrued_points: self.accrued_points(account, now),
            seconds_remaining: self.time_remaining(account, now).num_seconds(),
            session_start: account.mining_session_start,
            session_secs: self.session_duration.num_seconds(),
            reward: self.reward,
        }
    }
}

impl Default for MiningEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_SECS, DEFAULT_MINING_REWARD)
    }
}

/// Render-ready view of a session at one instant
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningStatus {
    pub state: MiningState,
    pub accrued_points: f64,
    pub seconds_remaining: i64,
    pub session_start: Option<DateTime<Utc>>,
    pub session_secs: i64,
    pub reward: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mining_account(start: DateTime<Utc>) -> Account {
        let mut account = Account::new("wallet0001".into(), "WALLET00".into(), None, start);
        account.mining_activated = true;
        account.mining_session_start = Some(start);
        account
    }

    #[test]
    fn test_inactive_accrues_nothing() {
        let engine = MiningEngine::default();
        let now = Utc::now();
        let account = Account::new("wallet0001".into(), "WALLET00".into(), None, now);

        assert_eq!(engine.state(&account, now), MiningState::Inactive);
        assert_eq!(engine.accrued_points(&account, now), 0.0);
        assert_eq!(engine.time_remaining(&account, now), Duration::zero());
        assert!(matches!(
            engine.claimable_reward(&account, now),
            Err(LedgerError::Conflict(_))
        ));
    }

    #[test]
    fn test_linear_accrual() {
        let engine = MiningEngine::new(86_400, 1000);
        let t0 = Utc::now();
        let account = mining_account(t0);

        assert_eq!(engine.accrued_points(&account, t0), 0.0);
        assert_eq!(engine.time_remaining(&account, t0), Duration::hours(24));

        let half = t0 + Duration::hours(12);
        assert!((engine.accrued_points(&account, half) - 500.0).abs() < 1e-9);
        assert_eq!(engine.state(&account, half), MiningState::Active);
        assert_eq!(engine.time_remaining(&account, half), Duration::hours(12));
    }

    #[test]
    fn test_full_reward_at_duration_and_clamped_after() {
        let engine = MiningEngine::new(86_400, 1000);
        let t0 = Utc::now();
        let account = mining_account(t0);

        let end = t0 + Duration::hours(24);
        assert_eq!(engine.accrued_points(&account, end), 1000.0);
        assert_eq!(engine.state(&account, end), MiningState::Claimable);
        assert_eq!(engine.time_remaining(&account, end), Duration::zero());
        assert_eq!(engine.claimable_reward(&account, end).unwrap(), 1000);

        let much_later = t0 + Duration::days(30);
        assert_eq!(engine.accrued_points(&account, much_later), 1000.0);
    }

    #[test]
    fn test_accrual_monotonic() {
        let engine = MiningEngine::new(3600, 77);
        let t0 = Utc::now();
        let account = mining_account(t0);

        let mut last = 0.0;
        for minute in 0..=90 {
            let accrued = engine.accrued_points(&account, t0 + Duration::minutes(minute));
            assert!(accrued >= last);
            assert!(accrued <= 77.0);
            last = accrued;
        }
    }

    #[test]
    fn test_future_start_treated_as_zero_elapsed() {
        let engine = MiningEngine::default();
        let t0 = Utc::now();
        let account = mining_account(t0 + Duration::minutes(5));

        assert_eq!(engine.accrued_points(&account, t0), 0.0);
        assert_eq!(engine.time_remaining(&account, t0), engine.session_duration());
    }

    #[test]
    fn test_early_claim_rejected() {
        let engine = MiningEngine::default();
        let t0 = Utc::now();
        let account = mining_account(t0);

        let result = engine.claimable_reward(&account, t0 + Duration::hours(23));
        assert!(matches!(result, Err(LedgerError::Conflict(_))));
    }

    #[test]
    fn test_oversized_session_length_is_clamped() {
        let t0 = Utc::now();
        let account = mining_account(t0);

        for secs in [MAX_SESSION_SECS, MAX_SESSION_SECS + 1, u64::MAX] {
            let engine = MiningEngine::new(secs, 1000);
            assert!(engine.session_duration() > Duration::zero());
            assert_eq!(engine.state(&account, t0), MiningState::Active);
            assert_eq!(engine.accrued_points(&account, t0), 0.0);
            assert!(matches!(
                engine.claimable_reward(&account, t0 + Duration::days(365)),
                Err(LedgerError::Conflict(_))
            ));
        }

        assert_eq!(MiningEngine::new(0, 1000).session_duration(), Duration::seconds(1));
    }
}
