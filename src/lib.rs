//! Exnus Points
//!
//! Points ledger behind the Exnus airdrop campaign: wallets earn points
//! for social tasks, referrals and 24-hour mining sessions, and admins
//! take proportional airdrop snapshots with multi-account flags.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server entrypoint
//! ├── config.rs      - Configuration management
//! ├── error.rs       - Ledger error kinds
//! ├── clock.rs       - Injectable time source
//! ├── auth.rs        - Admin authorization
//! ├── mining.rs      - Mining session engine
//! ├── ledger/        - Account ledger
//! │   ├── account.rs - Account record, tasks, referral codes
//! │   └── manager.rs - Ledger operations over a store
//! ├── database/      - Persistence
//! │   ├── memory.rs   - In-memory store (dev and tests)
//! │   ├── accounts.rs - PostgreSQL store
//! │   └── pool.rs     - Connection pool and schema
//! ├── report/        - Allocation & anomaly reporter
//! │   ├── snapshot.rs - Allocation, multi-account flag, ranking
//! │   └── export.rs   - CSV export
//! └── api/           - HTTP API endpoints
//!     ├── users.rs      - Onboarding, mining, leaderboard
//!     ├── admin.rs      - Admin snapshot, overrides, export
//!     └── middleware.rs - Rate limiting, headers, logging
//! ```

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod ledger;
pub mod mining;
pub mod report;

pub use api::{create_router, ApiError, ApiState};
pub use auth::{AdminAuthorizer, AdminCredentials, StaticAdminAuthorizer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PointsConfig;
pub use database::{AccountStore, DatabasePool, InsertOutcome, MemoryStore, PgAccountStore};
pub use error::{LedgerError, LedgerResult};
pub use ledger::{
    Account, AccountLedger, OnboardingStep, ReferralBonuses, ReferralEdge, ReferralSummary,
    Registration, TaskId, TasksCompleted,
};
pub use mining::{MiningEngine, MiningState, MiningStatus};
pub use report::{build_snapshot, EnrichedAccount, LeaderboardEntry, SnapshotSummary};
