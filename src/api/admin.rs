//! Admin endpoints
//!
//! Every route here except `/admin/auth` consults the [`AdminAuthorizer`]
//! before touching the ledger. Callers identify with the `x-admin-wallet`
//! and/or `x-admin-password` headers.
//!
//! Wallet addresses are public, so `x-admin-wallet` is only trustworthy
//! when an authenticating proxy sets it and strips it from client
//! requests. It grants the read-only views. Overwriting a balance always
//! requires the admin password.
//!
//! [`AdminAuthorizer`]: crate::auth::AdminAuthorizer

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ApiError, ApiResult, ApiState};
use crate::auth::AdminCredentials;
use crate::database::AccountStore;
use crate::error::LedgerError;
use crate::ledger::parse_points;
use crate::report::{self, EnrichedAccount, SnapshotSummary};

pub const ADMIN_WALLET_HEADER: &str = "x-admin-wallet";
pub const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

#[derive(Debug, Deserialize)]
pub struct AdminAuthRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AdminAuthResponse {
    pub authorized: bool,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub summary: SnapshotSummary,
    pub users: Vec<EnrichedAccount>,
}

#[derive(Debug, Deserialize)]
pub struct SetPointsRequest {
    /// Integer or integer string; anything else is rejected
    #[serde(default)]
    pub points: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPointsResponse {
    pub wallet: String,
    pub points: u64,
}

pub fn routes<S: AccountStore>() -> Router<ApiState<S>> {
    Router::new()
        .route("/admin/auth", post(authenticate::<S>))
        .route("/admin/users", get(list_users::<S>))
        .route("/admin/users/{wallet}", put(set_points::<S>))
        .route("/admin/export", get(export_csv::<S>))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn credentials_from_headers(headers: &HeaderMap) -> AdminCredentials {
    AdminCredentials {
        wallet: header_value(headers, ADMIN_WALLET_HEADER),
        password: header_value(headers, ADMIN_PASSWORD_HEADER),
    }
}

/// Gate for admin-only routes
fn require_admin<S: AccountStore>(state: &ApiState<S>, headers: &HeaderMap) -> ApiResult<()> {
    if !state.authorizer.is_configured() {
        return Err(ApiError::AdminUnconfigured);
    }

    let credentials = credentials_from_headers(headers);
    if state.authorizer.is_admin(&credentials) {
        Ok(())
    } else {
        warn!(
            wallet = credentials.wallet.as_deref().unwrap_or("-"),
            "Rejected admin request"
        );
        Err(ApiError::Forbidden)
    }
}

/// Gate for balance overrides: the password alone qualifies
fn require_admin_password<S: AccountStore>(
    state: &ApiState<S>,
    headers: &HeaderMap,
) -> ApiResult<()> {
    if !state.authorizer.has_password() {
        return Err(ApiError::AdminUnconfigured);
    }

    let credentials = credentials_from_headers(headers);
    if state.authorizer.can_override_points(&credentials) {
        Ok(())
    } else {
        warn!(
            wallet = credentials.wallet.as_deref().unwrap_or("-"),
            "Rejected point override without admin password"
        );
        Err(ApiError::Forbidden)
    }
}

/// Full enriched snapshot, ranked, with referral counts attached
async fn load_snapshot<S: AccountStore>(state: &ApiState<S>) -> ApiResult<Vec<EnrichedAccount>> {
    let accounts = state.ledger.accounts().await?;
    let counts = state.ledger.referral_counts().await?;

    let mut snapshot = report::build_snapshot(&accounts, state.airdrop_pool);
    report::attach_referral_counts(&mut snapshot, &counts);
    Ok(snapshot)
}

/// POST /api/admin/auth - password check for the dashboard login
async fn authenticate<S: AccountStore>(
    State(state): State<ApiState<S>>,
    payload: Result<Json<AdminAuthRequest>, JsonRejection>,
) -> ApiResult<Json<AdminAuthResponse>> {
    let Json(req) = payload?;
    if req.password.is_empty() {
        return Err(LedgerError::validation("Password is required").into());
    }
    if !state.authorizer.is_configured() {
        return Err(ApiError::AdminUnconfigured);
    }

    let authorized = state.authorizer.check_password(&req.password);
    if !authorized {
        warn!("Failed admin password attempt");
    }

    Ok(Json(AdminAuthResponse { authorized }))
}

/// GET /api/admin/users?search=
async fn list_users<S: AccountStore>(
    State(state): State<ApiState<S>>,
    headers: HeaderMap,
    query: Result<Query<SnapshotQuery>, QueryRejection>,
) -> ApiResult<Json<SnapshotResponse>> {
    require_admin(&state, &headers)?;
    let Query(query) = query?;

    let snapshot = load_snapshot(&state).await?;
    let summary = report::summarize(&snapshot, state.airdrop_pool);
    let users = match query.search.as_deref() {
        Some(search) => report::filter_by_wallet(snapshot, search),
        None => snapshot,
    };

    Ok(Json(SnapshotResponse { summary, users }))
}

/// PUT /api/admin/users/{wallet}
async fn set_points<S: AccountStore>(
    State(state): State<ApiState<S>>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<SetPointsRequest>, JsonRejection>,
) -> ApiResult<Json<SetPointsResponse>> {
    require_admin_password(&state, &headers)?;
    let Path(wallet) = path?;
    let Json(req) = payload?;

    let value = parse_points(&req.points)?;
    let account = state.ledger.set_points(&wallet, value).await?;

    Ok(Json(SetPointsResponse {
        wallet: account.wallet_id,
        points: account.points,
    }))
}

/// GET /api/admin/export - CSV download of the full snapshot
async fn export_csv<S: AccountStore>(
    State(state): State<ApiState<S>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    require_admin(&state, &headers)?;

    let snapshot = load_snapshot(&state).await?;
    let csv = report::to_csv(&snapshot);
    info!(rows = snapshot.len(), "Snapshot exported");

    let filename = format!(
        "attachment; filename=\"exnus-snapshot-{}.csv\"",
        state.ledger.now().format("%Y-%m-%d")
    );
    let disposition = HeaderValue::from_str(&filename)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}
