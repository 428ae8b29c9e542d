//! Account Ledger
//!
//! Owns every account's point balance and onboarding state. All mutation
//! goes through [`AccountLedger`]; no other component writes to the store.
//!
//! ## Point sources
//!
//! - Referral: join bonus to the referee, referral bonus to the referrer (once per referee)
//! - Mining: fixed reward per completed session (see [`crate::mining`])
//! - Admin override: `set_points`, gated by the admin check upstream
//!
//! Tasks only flip completion flags; they carry no points of their own.

mod account;
mod manager;

pub use account::{
    normalize_referral_code, parse_points, referral_code_candidates, validate_wallet_id, Account,
    OnboardingStep, ReferralEdge, ReferralSummary, ReferredUser, TaskId, TasksCompleted,
    MAX_WALLET_ID_LEN, REFERRAL_CODE_LEN,
};
pub use manager::{
    AccountLedger, ReferralBonuses, Registration, DEFAULT_JOIN_BONUS, DEFAULT_REFERRAL_BONUS,
    DEFAULT_STORAGE_TIMEOUT,
};
