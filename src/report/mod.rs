//! Allocation & Anomaly Reporter
//!
//! Batch, read-only transforms over a full account snapshot: proportional
//! airdrop allocation, shared-origin multi-account flags, ranking, and the
//! admin CSV export. Input is whatever list the caller read; no isolation
//! beyond that list is implied.

mod export;
mod snapshot;

pub use export::{to_csv, CSV_HEADER};
pub use snapshot::{
    attach_referral_counts, build_snapshot, filter_by_wallet, leaderboard, summarize,
    EnrichedAccount, LeaderboardEntry, SnapshotSummary, DEFAULT_AIRDROP_POOL,
};
