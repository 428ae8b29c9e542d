//! Ledger error kinds
//!
//! Every ledger and store operation surfaces one of four kinds. The HTTP
//! layer maps them to status codes; nothing below it swallows them.

/// Domain error type - no HTTP concerns
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Malformed input: empty wallet id, unknown task, bad points value, self-referral
    #[error("{0}")]
    Validation(String),

    /// Unknown wallet id or referral code
    #[error("{0}")]
    NotFound(String),

    /// State precondition failed (referral already applied, session not claimable)
    #[error("{0}")]
    Conflict(String),

    /// Backing store failure or timeout; safe to retry
    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Short machine-readable kind, logged with every rejected request
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Storage(_) => "storage",
        }
    }

    /// Retryable failures carry a `Retry-After` header over HTTP
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
