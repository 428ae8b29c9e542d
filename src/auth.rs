//! Admin authorization collaborator
//!
//! Answers whether a caller is an admin. A caller qualifies for the
//! snapshot views with an allow-listed wallet (case-insensitive) or the
//! admin password. `set_points` requires the password.

use tracing::warn;

/// Credentials presented by a caller
#[derive(Debug, Clone, Default)]
pub struct AdminCredentials {
    pub wallet: Option<String>,
    pub password: Option<String>,
}

pub trait AdminAuthorizer: Send + Sync {
    /// False when neither a wallet allow-list nor a password is set
    fn is_configured(&self) -> bool;

    fn check_password(&self, password: &str) -> bool;

    fn is_admin_wallet(&self, wallet: &str) -> bool;

    fn has_password(&self) -> bool;

    fn is_admin(&self, credentials: &AdminCredentials) -> bool {
        let by_wallet = credentials
            .wallet
            .as_deref()
            .is_some_and(|w| self.is_admin_wallet(w));
        let by_password = credentials
            .password
            .as_deref()
            .is_some_and(|p| self.check_password(p));
        by_wallet || by_password
    }

    /// Balance overrides ignore the wallet header
    fn can_override_points(&self, credentials: &AdminCredentials) -> bool {
        credentials
            .password
            .as_deref()
            .is_some_and(|p| self.check_password(p))
    }
}

/// Allow-list and password fixed at startup
#[derive(Debug, Clone, Default)]
pub struct StaticAdminAuthorizer {
    wallets: Vec<String>,
    password: Option<String>,
}

impl StaticAdminAuthorizer {
    pub fn new(wallets: &[String], password: Option<String>) -> Self {
        let wallets = wallets
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        let password = password.filter(|p| !p.is_empty());

        Self { wallets, password }
    }
}

/// Compare without short-circuiting on the first differing byte
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl AdminAuthorizer for StaticAdminAuthorizer {
    fn is_configured(&self) -> bool {
        !self.wallets.is_empty() || self.password.is_some()
    }

    fn check_password(&self, password: &str) -> bool {
        match &self.password {
            Some(expected) => constant_time_eq(expected.as_bytes(), password.as_bytes()),
            None => {
                warn!("Admin password check attempted but no password is configured");
                false
            }
        }
    }

    fn is_admin_wallet(&self, wallet: &str) -> bool {
        let wallet = wallet.trim().to_lowercase();
        !wallet.is_empty() && self.wallets.iter().any(|w| *w == wallet)
    }

    fn has_password(&self) -> bool {
        self.password.is_some()
    }
}
