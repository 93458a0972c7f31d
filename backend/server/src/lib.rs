//! HTTP backend of a campus poll platform where users wager points on poll outcomes.
//!
//! The wagering rules live in the `settlement` crate. This crate only identifies the caller,
//! checks roles and maps results to HTTP.
//!
//!
//!
//! # General Infrastructure
//! - User goes to VPS public endpoint running the reverse proxy
//! - Proxy authenticates the user and forwards the verified email in `X-User-Email`
//! - Backend container talks to Redis using its internal name
//! - Only one backend container writes to Redis, poll/user locks are process-local
//!
//!
//!
//! # Routes
//!
//! | method | path | who |
//! |---|---|---|
//! | GET | `/polls` | anyone |
//! | GET | `/polls/active` | anyone |
//! | GET | `/polls/{id}` | anyone |
//! | GET | `/polls/{id}/results` | anyone |
//! | POST | `/polls` | admin |
//! | PATCH | `/polls/{id}` | creator |
//! | DELETE | `/polls/{id}` | creator or admin |
//! | POST | `/polls/{id}/vote` | any known user |
//! | POST | `/polls/{id}/resolve` | admin |
//! | GET | `/users/me` | any known user |
//!
//! Missing or unknown callers get 401, role failures 403.
//!
//!
//!
//! # Notes
//!
//! ## Redis only
//! Polls are small documents and every wager touches exactly one poll and one user, so a hash
//! per collection plus `MULTI` pipelines is enough. No search engine, no SQL.
//!
//! ## Seeding
//! Users are not created over HTTP. Start the binary with `--seed users.json` to create them,
//! existing balances are left alone.
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run locally against a Redis container.
//! ```sh
//! docker run -p 6379:6379 redis
//! REDIS_URL=redis://localhost:6379 RUST_LOG=info cargo run -- --seed users.json
//! ```
use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Router,
    http::{HeaderName, Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod routes;
pub mod state;
pub mod utils;

use config::Config;
use routes::{
    active_polls_handler, create_poll_handler, delete_poll_handler, list_polls_handler,
    me_handler, poll_handler, resolve_handler, results_handler, update_poll_handler,
    vote_handler,
};
use state::State;
use utils::USER_EMAIL_HEADER;

pub fn router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(USER_EMAIL_HEADER)])
        .max_age(Duration::from_secs(state.config.cors_max_age_secs));

    Router::new()
        .route("/polls", get(list_polls_handler).post(create_poll_handler))
        .route("/polls/active", get(active_polls_handler))
        .route(
            "/polls/{id}",
            get(poll_handler)
                .patch(update_poll_handler)
                .delete(delete_poll_handler),
        )
        .route("/polls/{id}/results", get(results_handler))
        .route("/polls/{id}/vote", post(vote_handler))
        .route("/polls/{id}/resolve", post(resolve_handler))
        .route("/users/me", get(me_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(seed: Option<PathBuf>) -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = State::new(config, seed.as_deref()).await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let app = router(state);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
