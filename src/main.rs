use anyhow::{Context, Result};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

use exnus_points::{
    api::{
        body_size_middleware, logging_middleware, rate_limit_middleware,
        security_headers_middleware, SecurityMiddlewareConfig, SecurityState,
    },
    config::{sanitize_for_logging, PointsConfig},
    create_router, AccountLedger, AccountStore, ApiState, DatabasePool, MemoryStore,
    StaticAdminAuthorizer, SystemClock,
};

const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; a bad value stops startup
    let config = PointsConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        eprintln!("Please check EXNUS_* and ADMIN_* environment variables.");
        e
    })?;

    init_secure_logging(&config)?;

    info!("Starting Exnus points server");
    info!(
        join_bonus = config.rewards.join_bonus,
        referral_bonus = config.rewards.referral_bonus,
        mining_reward = config.rewards.mining_reward,
        mining_session_secs = config.rewards.mining_session_secs,
        airdrop_pool = config.rewards.airdrop_pool,
        "Reward settings loaded"
    );
    info!(
        admin_wallets = config.admin.wallets.len(),
        admin_password = config.admin.password.is_some(),
        "Admin access configured"
    );
    if config.admin.password.is_none() && !config.admin.wallets.is_empty() {
        warn!("ADMIN_PASSWORD not set - admin point overrides are disabled");
    }

    if config.database.postgres_enabled {
        let url = &config.database.postgres_url;
        if config.logging.sanitize_logs {
            info!("Connecting to PostgreSQL at {}", sanitize_for_logging(url));
        }

        let db = DatabasePool::new(
            url,
            config.database.max_connections,
            config.database.storage_timeout(),
        )
        .await
        .context("Failed to connect to PostgreSQL")?;
        db.init_schema()
            .await
            .context("Failed to initialize database schema")?;

        serve(&config, db.accounts().clone()).await
    } else {
        warn!("PostgreSQL disabled - using in-memory store, data is lost on restart");
        serve(&config, MemoryStore::new()).await
    }
}

/// Wire the ledger over `store` and run the HTTP server until it stops
async fn serve<S: AccountStore>(config: &PointsConfig, store: S) -> Result<()> {
    let ledger = AccountLedger::new(Arc::new(store), Arc::new(SystemClock))
        .with_mining(config.rewards.mining_engine())
        .with_bonuses(config.rewards.referral_bonuses())
        .with_storage_timeout(config.database.storage_timeout());

    let authorizer = Arc::new(StaticAdminAuthorizer::new(
        &config.admin.wallets,
        config.admin.password.clone(),
    ));

    let state = ApiState {
        ledger,
        authorizer,
        airdrop_pool: config.rewards.airdrop_pool,
    };

    let security_state = SecurityState::new(SecurityMiddlewareConfig {
        rate_limit_per_minute: config.security.rate_limit_per_minute,
        max_request_size: config.security.max_request_size,
        log_requests: config.logging.log_requests,
        sanitize_logs: config.logging.sanitize_logs,
    });
    let _cleanup = security_state.spawn_cleanup(RATE_LIMIT_CLEANUP_INTERVAL);

    // Layer order: the last added runs first
    let app: Router = create_router(state)
        .layer(middleware::from_fn_with_state(
            security_state.clone(),
            body_size_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            security_state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            security_state.clone(),
            logging_middleware,
        ))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", bind_addr, e))?;

    info!("Exnus points server listening on {}", bind_addr);
    info!(
        "Security middleware: Rate limit={}/min, Max body={}KB",
        config.security.rate_limit_per_minute,
        config.security.max_request_size / 1024
    );

    // Connect info feeds client IPs to the rate limiter and account origins
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Initialize logging at the configured level
fn init_secure_logging(config: &PointsConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(if config.logging.log_requests {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    if config.logging.sanitize_logs {
        info!("Secure logging initialized with data sanitization enabled");
    }

    Ok(())
}
