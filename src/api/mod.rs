//! HTTP API endpoints for the points ledger
//!
//! Provides REST APIs for:
//! - Wallet onboarding (tasks, referral, mining)
//! - Public leaderboard
//! - Admin snapshot, point overrides and CSV export
//! - Security middleware (rate limiting, body size, headers, logging)

pub mod admin;
pub mod middleware;
pub mod users;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::auth::AdminAuthorizer;
use crate::database::AccountStore;
use crate::error::LedgerError;
use crate::ledger::AccountLedger;

pub use middleware::{
    body_size_middleware, logging_middleware, rate_limit_middleware, security_headers_middleware,
    ClientOrigin, RateLimiter, SecurityMiddlewareConfig, SecurityState,
};

/// Shared state for every route
pub struct ApiState<S: AccountStore> {
    pub ledger: AccountLedger<S>,
    pub authorizer: Arc<dyn AdminAuthorizer>,
    pub airdrop_pool: f64,
}

impl<S: AccountStore> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            authorizer: self.authorizer.clone(),
            airdrop_pool: self.airdrop_pool,
        }
    }
}

/// Error surface of the HTTP layer
#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    /// Caller failed the admin check
    Forbidden,
    /// No admin wallet or password configured on this server
    AdminUnconfigured,
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        ApiError::Ledger(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Ledger(LedgerError::validation(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Ledger(LedgerError::validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Ledger(LedgerError::validation(rejection.body_text()))
    }
}

/// Seconds a client should wait before retrying a retryable failure
const RETRY_AFTER_SECS: &str = "1";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retryable = matches!(&self, ApiError::Ledger(e) if e.is_retryable());
        if let ApiError::Ledger(e) = &self {
            match e {
                // Store details stay in the logs
                LedgerError::Storage(msg) => {
                    error!(kind = e.kind(), error = %msg, "Storage failure while serving request")
                }
                _ => debug!(kind = e.kind(), error = %e, "Request rejected"),
            }
        }

        let (status, message) = match self {
            ApiError::Ledger(LedgerError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Ledger(LedgerError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg),
            ApiError::Ledger(LedgerError::Conflict(msg)) => (StatusCode::CONFLICT, msg),
            ApiError::Ledger(LedgerError::Storage(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable, please retry".to_string(),
            ),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Unauthorized".to_string()),
            ApiError::AdminUnconfigured => {
                warn!("Admin request received but no admin credentials are configured");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Admin access is not configured on the server".to_string(),
                )
            }
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if retryable {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Build the route tree. Security layers are added by the caller.
pub fn create_router<S: AccountStore>(state: ApiState<S>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", users::routes::<S>().merge(admin::routes::<S>()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let cases = vec![
            (ApiError::from(LedgerError::validation("bad")), StatusCode::BAD_REQUEST),
            (ApiError::from(LedgerError::not_found("gone")), StatusCode::NOT_FOUND),
            (ApiError::from(LedgerError::conflict("twice")), StatusCode::CONFLICT),
            (ApiError::Forbidden, StatusCode::FORBIDDEN),
            (ApiError::AdminUnconfigured, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let (status, _) = render(err).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn test_storage_error_hides_details() {
        let (status, body) = render(LedgerError::storage("pg: connection refused").into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let message = body["error"].as_str().unwrap();
        assert!(!message.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_retry_after_only_on_retryable_errors() {
        let response = ApiError::from(LedgerError::storage("timed out")).into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], RETRY_AFTER_SECS);

        let response = ApiError::from(LedgerError::conflict("twice")).into_response();
        assert!(response.headers().get(header::RETRY_AFTER).is_none());

        let response = ApiError::Forbidden.into_response();
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[tokio::test]
    async fn test_validation_message_is_passed_through() {
        let (_, body) = render(LedgerError::validation("Unknown task: reddit").into()).await;
        assert_eq!(body["error"], "Unknown task: reddit");
    }
}
