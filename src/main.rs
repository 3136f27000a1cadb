//! Token board backend entrypoint wiring REST, SSE, and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use config::AppConfig;
#[cfg(feature = "mongo-store")]
use dao::token_store::mongodb::{MongoConfig, MongoTokenStore};
#[cfg(feature = "rest-store")]
use dao::token_store::rest::{RestConfig, RestTokenStore};
use dao::{storage::StorageError, token_store::TokenStore};
use services::{session_service, sse_events, storage_supervisor};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    tokio::spawn(storage_supervisor::run(app_state.clone(), connect_store));
    tokio::spawn(session_service::run_inactivity_watchdog(app_state.clone()));
    tokio::spawn(sse_events::run_degraded_notifier(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Connect to whichever token backend the environment selects.
///
/// The REST backend wins when `TOKEN_API_URL` is set; otherwise MongoDB is
/// used when `MONGO_URI` is set. The storage supervisor retries this whole
/// function on failure, so a backend that is down at boot is picked up later.
async fn connect_store() -> Result<Arc<dyn TokenStore>, StorageError> {
    #[cfg(feature = "rest-store")]
    if env::var("TOKEN_API_URL").is_ok() {
        let config = RestConfig::from_env()?;
        let store = RestTokenStore::connect(config).await?;
        return Ok(Arc::new(store));
    }

    #[cfg(feature = "mongo-store")]
    if env::var("MONGO_URI").is_ok() {
        let config = MongoConfig::from_env().await?;
        let store = MongoTokenStore::connect(config).await?;
        return Ok(Arc::new(store));
    }

    Err(StorageError::unavailable(
        "no storage backend configured".into(),
        std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "set TOKEN_API_URL or MONGO_URI",
        ),
    ))
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
