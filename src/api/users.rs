//! Wallet-facing endpoints: onboarding, mining and the public leaderboard

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiResult, ApiState, ClientOrigin};
use crate::database::AccountStore;
use crate::ledger::{Account, OnboardingStep, ReferralSummary};
use crate::mining::{MiningEngine, MiningStatus};
use crate::report::{self, LeaderboardEntry};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub wallet: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReferralRequest {
    #[serde(default)]
    pub referral_code: String,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

/// Account plus everything derived from it at read time
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(flatten)]
    pub account: Account,
    pub onboarding_step: OnboardingStep,
    pub mining: MiningStatus,
    pub referrals: ReferralSummary,
}

impl UserView {
    fn render(
        account: Account,
        referrals: ReferralSummary,
        mining: &MiningEngine,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            onboarding_step: account.onboarding_step(),
            mining: mining.status(&account, now),
            referrals,
            account,
        }
    }
}

async fn view<S: AccountStore>(state: &ApiState<S>, account: Account) -> ApiResult<Json<UserView>> {
    let referrals = state.ledger.referrals(&account.wallet_id).await?;
    Ok(Json(UserView::render(
        account,
        referrals,
        state.ledger.mining(),
        state.ledger.now(),
    )))
}

pub fn routes<S: AccountStore>() -> Router<ApiState<S>> {
    Router::new()
        .route("/users", post(register::<S>))
        .route("/users/{wallet}", get(get_user::<S>))
        .route("/users/{wallet}/tasks/{task}", post(complete_task::<S>))
        .route("/users/{wallet}/apply-referral", post(apply_referral::<S>))
        .route("/users/{wallet}/skip-referral", post(skip_referral::<S>))
        .route("/users/{wallet}/mining/activate", post(activate_mining::<S>))
        .route("/users/{wallet}/mining/claim", post(claim_mining::<S>))
        .route("/users/{wallet}/referrals", get(referrals::<S>))
        .route("/leaderboard", get(leaderboard::<S>))
}

/// POST /api/users - first contact creates the account
async fn register<S: AccountStore>(
    State(state): State<ApiState<S>>,
    ClientOrigin(origin): ClientOrigin,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    let Json(req) = payload?;
    let registration = state
        .ledger
        .register(&req.wallet, origin.as_deref())
        .await?;

    let status = if registration.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, view(&state, registration.account).await?))
}

async fn get_user<S: AccountStore>(
    State(state): State<ApiState<S>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<UserView>> {
    let Path(wallet) = path?;
    let account = state.ledger.get_account(&wallet).await?;
    view(&state, account).await
}

async fn complete_task<S: AccountStore>(
    State(state): State<ApiState<S>>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> ApiResult<Json<UserView>> {
    let Path((wallet, task)) = path?;
    let account = state.ledger.complete_task(&wallet, &task).await?;
    view(&state, account).await
}

async fn apply_referral<S: AccountStore>(
    State(state): State<ApiState<S>>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<ApplyReferralRequest>, JsonRejection>,
) -> ApiResult<Json<UserView>> {
    let Path(wallet) = path?;
    let Json(req) = payload?;
    let account = state
        .ledger
        .apply_referral(&wallet, &req.referral_code)
        .await?;
    view(&state, account).await
}

async fn skip_referral<S: AccountStore>(
    State(state): State<ApiState<S>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<UserView>> {
    let Path(wallet) = path?;
    let account = state.ledger.skip_referral(&wallet).await?;
    view(&state, account).await
}

async fn activate_mining<S: AccountStore>(
    State(state): State<ApiState<S>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<UserView>> {
    let Path(wallet) = path?;
    let account = state.ledger.activate_mining(&wallet).await?;
    view(&state, account).await
}

async fn claim_mining<S: AccountStore>(
    State(state): State<ApiState<S>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<UserView>> {
    let Path(wallet) = path?;
    let account = state.ledger.claim_mining(&wallet).await?;
    view(&state, account).await
}

async fn referrals<S: AccountStore>(
    State(state): State<ApiState<S>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<ReferralSummary>> {
    let Path(wallet) = path?;
    Ok(Json(state.ledger.referrals(&wallet).await?))
}

/// GET /api/leaderboard - everyone, highest balance first
async fn leaderboard<S: AccountStore>(
    State(state): State<ApiState<S>>,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let Query(query) = query?;
    let accounts = state.ledger.accounts().await?;
    let counts = state.ledger.referral_counts().await?;

    let mut snapshot = report::build_snapshot(&accounts, state.airdrop_pool);
    report::attach_referral_counts(&mut snapshot, &counts);

    Ok(Json(report::leaderboard(&snapshot, query.limit)))
}
