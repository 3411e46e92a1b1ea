//! f4f server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    http::{HeaderValue, Method, header},
    middleware,
};
use f4f_api::{
    SessionStore,
    middleware::{AppState, auth_middleware},
    router as api_router,
};
use f4f_common::Config;
use f4f_core::{FollowSyncService, HttpIdentityProvider, HttpRemoteGraph, UserService};
use f4f_db::repositories::{FollowEdgeRepository, UserRepository};
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "f4f=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting f4f server...");

    let config = Arc::new(Config::load().context("Failed to load configuration")?);

    let db = Arc::new(f4f_db::init(&config).await?);
    info!("Connected to database");

    info!("Running database migrations...");
    f4f_db::migrate(&db).await?;
    info!("Migrations completed");

    // Provider adapters
    let remote = Arc::new(HttpRemoteGraph::new(&config.provider.api_base_url)?);
    let identity = Arc::new(HttpIdentityProvider::new(
        config.provider.clone(),
        config.server.callback_url(),
    )?);

    let sessions = SessionStore::with_ttl(Duration::from_secs(config.session.ttl_secs));
    {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600));
            loop {
                interval.tick().await;
                sessions.cleanup().await;
            }
        });
    }

    let user_repo = UserRepository::new(Arc::clone(&db));
    let edge_repo = FollowEdgeRepository::new(Arc::clone(&db));

    let state = AppState {
        user_service: UserService::new(user_repo.clone()),
        follow_sync_service: FollowSyncService::new(user_repo, edge_repo, remote),
        identity,
        sessions,
        config: Arc::clone(&config),
    };

    // Cookies only flow cross-origin with an explicit origin.
    let frontend_origin = HeaderValue::from_str(config.server.frontend_url.trim_end_matches('/'))
        .context("Invalid frontend URL")?;
    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let app = api_router()
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
