//! CSV rendering of an enriched snapshot for the admin export

use super::snapshot::EnrichedAccount;

pub const CSV_HEADER: &str =
    "Rank,Wallet,Points,Referrals,Airdrop_Allocation,Potential_Multi_Account";

/// Quote a field only when it needs it
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn to_csv(snapshot: &[EnrichedAccount]) -> String {
    let mut lines = Vec::with_capacity(snapshot.len() + 1);
    lines.push(CSV_HEADER.to_string());

    for entry in snapshot {
        lines.push(format!(
            "{},{},{},{},{:.4},{}",
            entry.rank,
            csv_field(&entry.wallet),
            entry.points,
            entry.referral_count,
            entry.allocation,
            if entry.suspected_multi_account { "TRUE" } else { "FALSE" }
        ));
    }

    lines.join("\n")
}
