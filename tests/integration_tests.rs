//! Integration tests for the points ledger
//!
//! These tests drive the ledger end to end over the in-memory store with a
//! manually advanced clock: the referral flow, mining sessions, concurrent
//! writers, airdrop snapshots and the HTTP API.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, TimeZone, Utc};
use exnus_points::{
    build_snapshot, create_router, AccountLedger, ApiState, Clock, LedgerError, ManualClock,
    MemoryStore, MiningState, StaticAdminAuthorizer,
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

// ============================================================================
// Test Helpers
// ============================================================================

const W1: &str = "AlphaWallet001";
const W2: &str = "BravoWallet002";

fn test_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ))
}

/// Ledger over a fresh in-memory store, sharing `clock` with the caller
fn create_test_ledger(clock: Arc<ManualClock>) -> AccountLedger<MemoryStore> {
    AccountLedger::new(Arc::new(MemoryStore::new()), clock)
}

fn create_test_app(clock: Arc<ManualClock>) -> axum::Router {
    create_router(ApiState {
        ledger: create_test_ledger(clock),
        authorizer: Arc::new(StaticAdminAuthorizer::new(
            &["AdminWallet999".to_string()],
            Some("correct-horse-battery".to_string()),
        )),
        airdrop_pool: 1_000.0,
    })
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

// ============================================================================
// Referral Flow
// ============================================================================

mod referral_flow {
    use super::*;

    #[tokio::test]
    async fn test_referral_credits_both_parties_once() {
        let ledger = create_test_ledger(test_clock());

        let w1 = ledger.get_or_create(W1, None).await.unwrap();
        ledger.get_or_create(W2, None).await.unwrap();

        let w2 = ledger.apply_referral(W2, &w1.referral_code).await.unwrap();
        assert_eq!(w2.points, 500);
        assert!(w2.referral_code_applied);

        let w1 = ledger.get_account(W1).await.unwrap();
        assert_eq!(w1.points, 1000);

        let summary = ledger.referrals(W1).await.unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.referred_users[0].wallet, W2);

        // Second attempt changes nothing
        let err = ledger
            .apply_referral(W2, &w1.referral_code)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert_eq!(ledger.get_account(W1).await.unwrap().points, 1000);
        assert_eq!(ledger.get_account(W2).await.unwrap().points, 500);
    }

    #[tokio::test]
    async fn test_code_lookup_is_case_insensitive() {
        let ledger = create_test_ledger(test_clock());
        let w1 = ledger.get_or_create(W1, None).await.unwrap();
        ledger.get_or_create(W2, None).await.unwrap();

        let lower = format!("  {}  ", w1.referral_code.to_lowercase());
        let w2 = ledger.apply_referral(W2, &lower).await.unwrap();
        assert_eq!(w2.points, 500);
    }

    #[tokio::test]
    async fn test_rejected_referrals_leave_balances_untouched() {
        let ledger = create_test_ledger(test_clock());
        let w1 = ledger.get_or_create(W1, None).await.unwrap();
        ledger.get_or_create(W2, None).await.unwrap();

        let own = ledger
            .apply_referral(W1, &w1.referral_code)
            .await
            .unwrap_err();
        assert!(matches!(own, LedgerError::Validation(_)));

        let unknown = ledger.apply_referral(W2, "NOPE0000").await.unwrap_err();
        assert!(matches!(unknown, LedgerError::NotFound(_)));

        let missing = ledger
            .apply_referral("GhostWallet", &w1.referral_code)
            .await
            .unwrap_err();
        assert!(matches!(missing, LedgerError::NotFound(_)));

        assert_eq!(ledger.get_account(W1).await.unwrap().points, 0);
        assert_eq!(ledger.get_account(W2).await.unwrap().points, 0);
        assert_eq!(ledger.referrals(W1).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_skip_referral_blocks_later_codes() {
        let ledger = create_test_ledger(test_clock());
        let w1 = ledger.get_or_create(W1, None).await.unwrap();
        ledger.get_or_create(W2, None).await.unwrap();

        let w2 = ledger.skip_referral(W2).await.unwrap();
        assert!(w2.referral_code_applied);
        assert_eq!(w2.points, 0);

        let err = ledger
            .apply_referral(W2, &w1.referral_code)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }
}

// ============================================================================
// Mining Sessions
// ============================================================================

mod mining_sessions {
    use super::*;

    #[tokio::test]
    async fn test_half_session_accrues_half_reward() {
        let clock = test_clock();
        let ledger = create_test_ledger(clock.clone());
        ledger.get_or_create(W1, None).await.unwrap();
        ledger.activate_mining(W1).await.unwrap();

        clock.advance(Duration::hours(12));
        let account = ledger.get_account(W1).await.unwrap();
        let accrued = ledger.mining().accrued_points(&account, clock.now());
        assert!((accrued - 500.0).abs() < 1e-6);
        assert_eq!(
            ledger.mining().state(&account, clock.now()),
            MiningState::Active
        );

        let err = ledger.claim_mining(W1).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert_eq!(ledger.get_account(W1).await.unwrap().points, 0);
    }

    #[tokio::test]
    async fn test_claim_pays_reward_and_restarts_session() {
        let clock = test_clock();
        let ledger = create_test_ledger(clock.clone());
        ledger.get_or_create(W1, None).await.unwrap();
        ledger.activate_mining(W1).await.unwrap();

        clock.advance(Duration::hours(30));
        let account = ledger.get_account(W1).await.unwrap();
        assert_eq!(
            ledger.mining().accrued_points(&account, clock.now()),
            1000.0
        );
        assert_eq!(
            ledger.mining().state(&account, clock.now()),
            MiningState::Claimable
        );

        let claimed = ledger.claim_mining(W1).await.unwrap();
        assert_eq!(claimed.points, 1000);
        assert_eq!(claimed.mining_session_start, Some(clock.now()));
        assert_eq!(
            ledger.mining().time_remaining(&claimed, clock.now()),
            Duration::hours(24)
        );

        // The fresh session is not claimable yet
        let err = ledger.claim_mining(W1).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_claim_without_session_is_conflict() {
        let ledger = create_test_ledger(test_clock());
        ledger.get_or_create(W1, None).await.unwrap();

        let err = ledger.claim_mining(W1).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_reactivation_keeps_running_session() {
        let clock = test_clock();
        let ledger = create_test_ledger(clock.clone());
        ledger.get_or_create(W1, None).await.unwrap();
        let first = ledger.activate_mining(W1).await.unwrap();

        clock.advance(Duration::hours(3));
        let second = ledger.activate_mining(W1).await.unwrap();
        assert_eq!(first.mining_session_start, second.mining_session_start);
    }
}

// ============================================================================
// Concurrent Writers
// ============================================================================

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_apply_referral_lands_once() {
        let ledger = create_test_ledger(test_clock());
        let w1 = ledger.get_or_create(W1, None).await.unwrap();
        ledger.get_or_create(W2, None).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = ledger.clone();
                let code = w1.referral_code.clone();
                tokio::spawn(async move { ledger.apply_referral(W2, &code).await })
            })
            .collect();

        let results = futures::future::join_all(handles).await;
        let successes = results
            .into_iter()
            .map(|r| r.unwrap())
            .filter(|r| r.is_ok())
            .count();

        assert_eq!(successes, 1);
        assert_eq!(ledger.get_account(W1).await.unwrap().points, 1000);
        assert_eq!(ledger.get_account(W2).await.unwrap().points, 500);
        assert_eq!(ledger.referrals(W1).await.unwrap().count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_referees_credit_referrer_without_lost_updates() {
        let ledger = create_test_ledger(test_clock());
        let w1 = ledger.get_or_create(W1, None).await.unwrap();

        let referees: Vec<String> = (0..20).map(|i| format!("Referee{:04}", i)).collect();
        for wallet in &referees {
            ledger.get_or_create(wallet, None).await.unwrap();
        }

        let handles: Vec<_> = referees
            .iter()
            .cloned()
            .map(|wallet| {
                let ledger = ledger.clone();
                let code = w1.referral_code.clone();
                tokio::spawn(async move { ledger.apply_referral(&wallet, &code).await })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            assert!(result.unwrap().is_ok());
        }

        assert_eq!(ledger.get_account(W1).await.unwrap().points, 20 * 1000);
        assert_eq!(ledger.referrals(W1).await.unwrap().count, 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_contact_creates_one_account() {
        let ledger = create_test_ledger(test_clock());

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.register(W1, Some("10.0.0.1")).await })
            })
            .collect();

        let registrations: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        assert_eq!(registrations.iter().filter(|r| r.created).count(), 1);
        let code = &registrations[0].account.referral_code;
        assert!(registrations.iter().all(|r| &r.account.referral_code == code));
        assert_eq!(ledger.store().len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_mixed_writes_on_one_account_are_all_kept() {
        let clock = test_clock();
        let ledger = create_test_ledger(clock.clone());
        let w1 = ledger.get_or_create(W1, None).await.unwrap();
        ledger.get_or_create(W2, None).await.unwrap();

        let tasks = ["x", "telegram", "discord"].map(|task| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.complete_task(W2, task).await.map(|_| ()) })
        });
        let activate = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.activate_mining(W2).await.map(|_| ()) })
        };
        let referral = {
            let ledger = ledger.clone();
            let code = w1.referral_code.clone();
            tokio::spawn(async move { ledger.apply_referral(W2, &code).await.map(|_| ()) })
        };

        for handle in tasks.into_iter().chain([activate, referral]) {
            handle.await.unwrap().unwrap();
        }

        let w2 = ledger.get_account(W2).await.unwrap();
        assert!(w2.tasks_completed.all_done());
        assert!(w2.mining_activated);
        assert!(w2.referral_code_applied);
        assert_eq!(w2.points, 500);
    }
}

// ============================================================================
// Airdrop Snapshot
// ============================================================================

mod snapshot {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_over_ledger_accounts() {
        let ledger = create_test_ledger(test_clock());
        ledger.get_or_create(W1, Some("198.51.100.1")).await.unwrap();
        ledger.get_or_create(W2, Some("198.51.100.1")).await.unwrap();
        ledger.get_or_create("CharlieWallet3", Some("203.0.113.9")).await.unwrap();

        ledger.set_points(W1, 3000).await.unwrap();
        ledger.set_points(W2, 1000).await.unwrap();

        let accounts = ledger.accounts().await.unwrap();
        let snapshot = build_snapshot(&accounts, 100_000_000.0);

        assert_eq!(snapshot[0].wallet, W1);
        assert_eq!(snapshot[0].rank, 1);
        assert!((snapshot[0].allocation - 75_000_000.0).abs() < 1e-3);
        assert!((snapshot[1].allocation - 25_000_000.0).abs() < 1e-3);
        assert_eq!(snapshot[2].allocation, 0.0);

        assert!(snapshot[0].suspected_multi_account);
        assert!(snapshot[1].suspected_multi_account);
        assert!(!snapshot[2].suspected_multi_account);
    }

    #[tokio::test]
    async fn test_set_points_rejects_negative() {
        let ledger = create_test_ledger(test_clock());
        ledger.get_or_create(W1, None).await.unwrap();
        ledger.set_points(W1, 42).await.unwrap();

        let err = ledger.set_points(W1, -1).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(ledger.get_account(W1).await.unwrap().points, 42);
    }
}

// ============================================================================
// HTTP API
// ============================================================================

mod http_api {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let app = create_test_app(test_clock());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_register_then_fetch() {
        let app = create_test_app(test_clock());

        let (status, body) = send(
            &app,
            json_request("POST", "/api/users", serde_json::json!({ "wallet": W1 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["walletId"], W1);
        assert_eq!(body["points"], 0);
        assert_eq!(body["onboardingStep"], "tasks");
        assert_eq!(body["mining"]["state"], "inactive");
        assert!(body.get("originAddress").is_none());

        let (status, _) = send(
            &app,
            json_request("POST", "/api/users", serde_json::json!({ "wallet": W1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            Request::builder()
                .uri(format!("/api/users/{}", W1))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["walletId"], W1);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let app = create_test_app(test_clock());

        let (status, body) = send(
            &app,
            Request::builder()
                .uri("/api/users/NobodyHere")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());

        send(
            &app,
            json_request("POST", "/api/users", serde_json::json!({ "wallet": W1 })),
        )
        .await;

        let (status, _) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/users/{}/tasks/reddit", W1),
                serde_json::Value::Null,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/users/{}/mining/claim", W1),
                serde_json::Value::Null,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_malformed_requests_get_json_400() {
        let app = create_test_app(test_clock());

        let (status, body) = send(
            &app,
            json_request("POST", "/api/users", serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Wallet address is required");

        send(
            &app,
            json_request("POST", "/api/users", serde_json::json!({ "wallet": W1 })),
        )
        .await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/users/{}/apply-referral", W1),
                serde_json::json!({}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Referral code is required");

        let (status, body) = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/api/users")
                .header("content-type", "application/json")
                .body(Body::from("{\"wallet\": "))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/api/users")
                .body(Body::from(serde_json::json!({ "wallet": W2 }).to_string()))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = send(
            &app,
            json_request("POST", "/api/users", serde_json::json!({ "wallet": 42 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = send(
            &app,
            Request::builder()
                .uri("/api/leaderboard?limit=lots")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_onboarding_over_http() {
        let app = create_test_app(test_clock());

        let (_, w1) = send(
            &app,
            json_request("POST", "/api/users", serde_json::json!({ "wallet": W1 })),
        )
        .await;
        send(
            &app,
            json_request("POST", "/api/users", serde_json::json!({ "wallet": W2 })),
        )
        .await;

        for task in ["x", "telegram", "discord"] {
            let (status, _) = send(
                &app,
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/users/{}/tasks/{}", W2, task))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/users/{}/apply-referral", W2),
                serde_json::json!({ "referralCode": w1["referralCode"] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["points"], 500);
        assert_eq!(body["onboardingStep"], "activate");

        let (status, body) = send(
            &app,
            Request::builder()
                .uri(format!("/api/users/{}/referrals", W1))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["referredUsers"][0]["wallet"], W2);

        let (_, board) = send(
            &app,
            Request::builder()
                .uri("/api/leaderboard?limit=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(board.as_array().unwrap().len(), 1);
        assert_eq!(board[0]["wallet"], W1);
        assert_eq!(board[0]["points"], 1000);
        assert_eq!(board[0]["referralCount"], 1);
    }

    #[tokio::test]
    async fn test_admin_set_points_requires_admin() {
        let app = create_test_app(test_clock());
        send(
            &app,
            json_request("POST", "/api/users", serde_json::json!({ "wallet": W1 })),
        )
        .await;

        let uri = format!("/api/admin/users/{}", W1);

        let (status, _) = send(
            &app,
            json_request("PUT", &uri, serde_json::json!({ "points": 9000 })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let mut denied = json_request("PUT", &uri, serde_json::json!({ "points": 9000 }));
        denied
            .headers_mut()
            .insert("x-admin-password", "wrong-password".parse().unwrap());
        let (status, _) = send(&app, denied).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // An allow-listed wallet header reads the snapshot but cannot overwrite balances
        let mut wallet_only = json_request("PUT", &uri, serde_json::json!({ "points": 9000 }));
        wallet_only
            .headers_mut()
            .insert("x-admin-wallet", "adminwallet999".parse().unwrap());
        let (status, _) = send(&app, wallet_only).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            Request::builder()
                .uri("/api/admin/users")
                .header("x-admin-wallet", "adminwallet999")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let mut allowed = json_request("PUT", &uri, serde_json::json!({ "points": "9000" }));
        allowed
            .headers_mut()
            .insert("x-admin-password", "correct-horse-battery".parse().unwrap());
        let (status, body) = send(&app, allowed).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["points"], 9000);

        for bad in [serde_json::json!(-5), serde_json::json!("abc"), serde_json::json!(1.5)] {
            let mut request = json_request("PUT", &uri, serde_json::json!({ "points": bad }));
            request
                .headers_mut()
                .insert("x-admin-password", "correct-horse-battery".parse().unwrap());
            let (status, _) = send(&app, request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }

        let (_, user) = send(
            &app,
            Request::builder()
                .uri(format!("/api/users/{}", W1))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(user["points"], 9000);
    }

    #[tokio::test]
    async fn test_admin_auth_endpoint() {
        let app = create_test_app(test_clock());

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/admin/auth",
                serde_json::json!({ "password": "correct-horse-battery" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["authorized"], true);

        let (_, body) = send(
            &app,
            json_request(
                "POST",
                "/api/admin/auth",
                serde_json::json!({ "password": "nope" }),
            ),
        )
        .await;
        assert_eq!(body["authorized"], false);

        let (status, _) = send(
            &app,
            json_request("POST", "/api/admin/auth", serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_snapshot_flags_shared_origin() {
        let app = create_test_app(test_clock());

        for wallet in [W1, W2, "CharlieWallet3"] {
            let mut request =
                json_request("POST", "/api/users", serde_json::json!({ "wallet": wallet }));
            let origin = if wallet == "CharlieWallet3" {
                "203.0.113.50"
            } else {
                "198.51.100.7"
            };
            request
                .headers_mut()
                .insert("x-forwarded-for", origin.parse().unwrap());
            send(&app, request).await;
        }

        let admin_get = |uri: &str| {
            Request::builder()
                .uri(uri)
                .header("x-admin-password", "correct-horse-battery")
                .body(Body::empty())
                .unwrap()
        };

        let (status, body) = send(&app, admin_get("/api/admin/users")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"]["totalUsers"], 3);
        assert_eq!(body["summary"]["flaggedAccounts"], 2);

        let (_, body) = send(&app, admin_get("/api/admin/users?search=charlie")).await;
        let users = body["users"].as_array().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["suspectedMultiAccount"], false);

        let response = app
            .clone()
            .oneshot(admin_get("/api/admin/export"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/csv"));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let csv = String::from_utf8(bytes.to_vec()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Rank,Wallet,Points,Referrals,Airdrop_Allocation,Potential_Multi_Account")
        );
        assert_eq!(lines.count(), 3);
    }

    #[tokio::test]
    async fn test_admin_routes_unconfigured() {
        let app = create_router(ApiState {
            ledger: create_test_ledger(test_clock()),
            authorizer: Arc::new(StaticAdminAuthorizer::new(&[], None)),
            airdrop_pool: 1.0,
        });

        let (status, _) = send(
            &app,
            Request::builder()
                .uri("/api/admin/users")
                .header("x-admin-password", "anything")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
