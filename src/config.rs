use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::ledger::{ReferralBonuses, DEFAULT_JOIN_BONUS, DEFAULT_REFERRAL_BONUS};
use crate::mining::{MiningEngine, DEFAULT_MINING_REWARD, DEFAULT_SESSION_SECS, MAX_SESSION_SECS};
use crate::report::DEFAULT_AIRDROP_POOL;

/// Configuration for the points service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Request limits
    pub security: SecurityConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Point amounts and pools
    pub rewards: RewardsConfig,
    /// Admin allow-list and password
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Rate limit per minute per IP
    pub rate_limit_per_minute: u32,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Enable PostgreSQL (if false, uses in-memory store)
    pub postgres_enabled: bool,
    /// PostgreSQL connection string
    pub postgres_url: String,
    /// Pool size
    pub max_connections: u32,
    /// Upper bound for any single storage operation
    pub storage_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Mask client IPs and secrets in logs
    pub sanitize_logs: bool,
    /// Enable request/response logging
    pub log_requests: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardsConfig {
    /// Credited to a wallet that applies a referral code
    pub join_bonus: u64,
    /// Credited to the owner of the applied code
    pub referral_bonus: u64,
    /// Paid per completed mining session
    pub mining_reward: u64,
    /// Mining session length in seconds
    pub mining_session_secs: u64,
    /// Tokens split proportionally across all points
    pub airdrop_pool: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Allow-listed admin wallets
    pub wallets: Vec<String>,
    /// Admin dashboard password
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_enabled: false,
            postgres_url: "postgresql://localhost:5432/exnus_points".to_string(),
            max_connections: 10,
            storage_timeout_ms: 5_000,
        }
    }
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            join_bonus: DEFAULT_JOIN_BONUS,
            referral_bonus: DEFAULT_REFERRAL_BONUS,
            mining_reward: DEFAULT_MINING_REWARD,
            mining_session_secs: DEFAULT_SESSION_SECS,
            airdrop_pool: DEFAULT_AIRDROP_POOL,
        }
    }
}

impl RewardsConfig {
    pub fn mining_engine(&self) -> MiningEngine {
        MiningEngine::new(self.mining_session_secs, self.mining_reward)
    }

    pub fn referral_bonuses(&self) -> ReferralBonuses {
        ReferralBonuses {
            join_bonus: self.join_bonus,
            referral_bonus: self.referral_bonus,
        }
    }
}

impl DatabaseConfig {
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            security: SecurityConfig {
                rate_limit_per_minute: 120,
                max_request_size: 64 * 1024, // 64KB
            },
            database: DatabaseConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                sanitize_logs: true,
                log_requests: false,
            },
            rewards: RewardsConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// Parse an optional environment variable into `target`
fn override_from_env<T>(target: &mut T, var: &str) -> Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Ok(raw) = env::var(var) {
        *target = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {} value", var))?;
    }
    Ok(())
}

impl PointsConfig {
    /// Load configuration from environment variables and validate it
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Server configuration
        if let Ok(host) = env::var("EXNUS_HOST") {
            config.server.host = host;
        }
        override_from_env(&mut config.server.port, "EXNUS_PORT")?;

        // Request limits
        override_from_env(
            &mut config.security.rate_limit_per_minute,
            "EXNUS_RATE_LIMIT_PER_MINUTE",
        )?;
        override_from_env(&mut config.security.max_request_size, "EXNUS_MAX_REQUEST_SIZE")?;

        // Database configuration
        override_from_env(&mut config.database.postgres_enabled, "EXNUS_POSTGRES_ENABLED")?;
        if let Ok(url) = env::var("EXNUS_POSTGRES_URL") {
            config.database.postgres_url = url;
        }
        override_from_env(
            &mut config.database.max_connections,
            "EXNUS_POSTGRES_MAX_CONNECTIONS",
        )?;
        override_from_env(
            &mut config.database.storage_timeout_ms,
            "EXNUS_STORAGE_TIMEOUT_MS",
        )?;

        // Logging configuration
        if let Ok(level) = env::var("EXNUS_LOG_LEVEL") {
            config.logging.level = level;
        }
        override_from_env(&mut config.logging.sanitize_logs, "EXNUS_SANITIZE_LOGS")?;
        override_from_env(&mut config.logging.log_requests, "EXNUS_LOG_REQUESTS")?;

        // Rewards
        override_from_env(&mut config.rewards.join_bonus, "EXNUS_JOIN_BONUS")?;
        override_from_env(&mut config.rewards.referral_bonus, "EXNUS_REFERRAL_BONUS")?;
        override_from_env(&mut config.rewards.mining_reward, "EXNUS_MINING_REWARD")?;
        override_from_env(
            &mut config.rewards.mining_session_secs,
            "EXNUS_MINING_SESSION_SECS",
        )?;
        override_from_env(&mut config.rewards.airdrop_pool, "EXNUS_AIRDROP_POOL")?;

        // Admin
        if let Ok(wallets) = env::var("ADMIN_WALLETS") {
            config.admin.wallets = parse_wallet_list(&wallets);
        }
        config.admin.password = env::var("ADMIN_PASSWORD").ok().filter(|p| !p.is_empty());

        if config.admin.wallets.is_empty() && config.admin.password.is_none() {
            warn!("Neither ADMIN_WALLETS nor ADMIN_PASSWORD is set; admin endpoints will refuse all callers");
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for consistency
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }

        if self.security.rate_limit_per_minute == 0 {
            return Err(anyhow::anyhow!("Rate limit must be non-zero"));
        }

        if self.database.postgres_enabled && self.database.postgres_url.is_empty() {
            return Err(anyhow::anyhow!(
                "PostgreSQL is enabled but EXNUS_POSTGRES_URL is empty"
            ));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("Database pool size must be non-zero"));
        }

        if self.database.storage_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Storage timeout must be non-zero"));
        }

        if self.rewards.mining_session_secs == 0 {
            return Err(anyhow::anyhow!("Mining session length must be non-zero"));
        }

        if self.rewards.mining_session_secs > MAX_SESSION_SECS {
            return Err(anyhow::anyhow!(
                "Mining session length out of range (maximum {} seconds)",
                MAX_SESSION_SECS
            ));
        }

        if !self.rewards.airdrop_pool.is_finite() || self.rewards.airdrop_pool < 0.0 {
            return Err(anyhow::anyhow!(
                "Airdrop pool must be a finite, non-negative number: {}",
                self.rewards.airdrop_pool
            ));
        }

        if let Some(password) = &self.admin.password {
            if password.len() < 8 {
                return Err(anyhow::anyhow!(
                    "Admin password is too short (minimum 8 characters)"
                ));
            }
        }

        Ok(())
    }
}

/// Split a comma-separated wallet list, dropping blanks
pub fn parse_wallet_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Sanitize sensitive data for logging
pub fn sanitize_for_logging(data: &str) -> String {
    let sensitive_patterns = ["password", "secret", "key", "token", "postgres"];

    let data_lower = data.to_lowercase();
    for pattern in &sensitive_patterns {
        if data_lower.contains(pattern) {
            let keep = if data.chars().count() > 20 { 6 } else { 2 };
            return format!("{}***{}", head_chars(data, keep), tail_chars(data, keep));
        }
    }

    data.to_string()
}

/// First `n` characters of `data`, cut on a char boundary
fn head_chars(data: &str, n: usize) -> &str {
    match data.char_indices().nth(n) {
        Some((idx, _)) => &data[..idx],
        None => data,
    }
}

/// Last `n` characters of `data`, cut on a char boundary
fn tail_chars(data: &str, n: usize) -> &str {
    match n.checked_sub(1).and_then(|skip| data.char_indices().rev().nth(skip)) {
        Some((idx, _)) => &data[idx..],
        None if n == 0 => "",
        None => data,
    }
}
