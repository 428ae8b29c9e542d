//! Snapshot enrichment: allocation share, multi-account flag, rank

use serde::Serialize;
use std::collections::HashMap;

use crate::ledger::Account;

/// Tokens split across all accounts in proportion to points
pub const DEFAULT_AIRDROP_POOL: f64 = 100_000_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedAccount {
    /// 1-based position by points, ties in input order
    pub rank: usize,
    pub wallet: String,
    pub points: u64,
    pub referral_count: u64,
    pub allocation: f64,
    pub suspected_multi_account: bool,
    pub origin_address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub total_users: usize,
    pub total_points: u128,
    pub airdrop_pool: f64,
    pub flagged_accounts: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub wallet: String,
    pub points: u64,
    pub referral_count: u64,
}

fn origin_key(origin: &Option<String>) -> Option<&str> {
    origin.as_deref().map(str::trim).filter(|o| !o.is_empty())
}

/// Rank a point-in-time list of accounts, compute each one's share of
/// `airdrop_pool`, and flag accounts whose origin is shared with another.
///
/// Pure and read-only. Zero total points gives every account a zero share.
pub fn build_snapshot(accounts: &[Account], airdrop_pool: f64) -> Vec<EnrichedAccount> {
    let total_points: u128 = accounts.iter().map(|a| a.points as u128).sum();

    let mut origin_counts: HashMap<&str, usize> = HashMap::new();
    for account in accounts {
        if let Some(origin) = origin_key(&account.origin_address) {
            *origin_counts.entry(origin).or_insert(0) += 1;
        }
    }

    let mut enriched: Vec<EnrichedAccount> = accounts
        .iter()
        .map(|account| {
            let allocation = if total_points > 0 {
                (account.points as f64 / total_points as f64) * airdrop_pool
            } else {
                0.0
            };

            let suspected_multi_account = origin_key(&account.origin_address)
                .and_then(|origin| origin_counts.get(origin))
                .is_some_and(|count| *count > 1);

            EnrichedAccount {
                rank: 0,
                wallet: account.wallet_id.clone(),
                points: account.points,
                referral_count: 0,
                allocation,
                suspected_multi_account,
                origin_address: account.origin_address.clone(),
            }
        })
        .collect();

    // Stable sort keeps input order among equal balances
    enriched.sort_by(|a, b| b.points.cmp(&a.points));
    for (index, entry) in enriched.iter_mut().enumerate() {
        entry.rank = index + 1;
    }

    enriched
}

pub fn attach_referral_counts(snapshot: &mut [EnrichedAccount], counts: &HashMap<String, u64>) {
    for entry in snapshot.iter_mut() {
        entry.referral_count = counts.get(&entry.wallet).copied().unwrap_or(0);
    }
}

/// Case-insensitive wallet substring filter; ranks are kept from the full snapshot
pub fn filter_by_wallet(snapshot: Vec<EnrichedAccount>, query: &str) -> Vec<EnrichedAccount> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return snapshot;
    }
    snapshot
        .into_iter()
        .filter(|entry| entry.wallet.to_lowercase().contains(&query))
        .collect()
}

pub fn summarize(snapshot: &[EnrichedAccount], airdrop_pool: f64) -> SnapshotSummary {
    SnapshotSummary {
        total_users: snapshot.len(),
        total_points: snapshot.iter().map(|e| e.points as u128).sum(),
        airdrop_pool,
        flagged_accounts: snapshot.iter().filter(|e| e.suspected_multi_account).count(),
    }
}

pub fn leaderboard(snapshot: &[EnrichedAccount], limit: Option<usize>) -> Vec<LeaderboardEntry> {
    snapshot
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|entry| LeaderboardEntry {
            rank: entry.rank,
            wallet: entry.wallet.clone(),
            points: entry.points,
            referral_count: entry.referral_count,
        })
        .collect()
}
