//! Seeder API - web archive source curation
//!
//! Curators propose web sources, staff vote on them, accepted sources go
//! through contract negotiation with the publisher and, once a contract is
//! valid, are harvested on their own schedule.
//!
//! Without a database configured the server runs on an in-memory store.

mod auth;
mod config;
mod constants;
mod dashboard;
mod error;
mod models;
mod negotiation;
mod routes;
mod services;
mod state;
mod store;
mod workflow;

use crate::config::Settings;
use crate::routes::create_router;
use crate::state::AppState;
use crate::store::{MemoryStore, PgStore, Store};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("🚀 Starting Seeder API...");

    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    let store: Arc<dyn Store> = match &settings.database {
        Some(database) => {
            let store = PgStore::connect(database).await?;
            store.init_schema().await?;
            info!("✅ Connected to PostgreSQL at {}:{}", database.host, database.port);
            Arc::new(store)
        }
        None => {
            warn!("⚠️  No DATABASE_URL or DB_HOST set, records live in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let state = Arc::new(AppState::new(store, &settings)?);
    let app = create_router(state, &settings);

    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   ─── Authentication ───");
    info!("   POST /api/auth/login                    - Login with email/password");
    info!("   POST /api/auth/register                 - Register new curator account");
    info!("   POST /api/auth/refresh                  - Refresh access token");
    info!("   GET  /api/auth/me                       - Get current user");
    info!("");
    info!("   ─── Sources ───");
    info!("   POST /api/sources                       - Propose a source");
    info!("   GET  /api/sources                       - List sources");
    info!("   GET  /api/sources/{{id}}                  - Source with seeds, rounds and contracts");
    info!("   POST /api/sources/{{id}}/seeds            - Add a seed");
    info!("");
    info!("   ─── Voting ───");
    info!("   POST /api/voting-rounds/{{id}}/votes      - Cast a vote");
    info!("   POST /api/voting-rounds/{{id}}/resolve    - Resolve a round");
    info!("   POST /api/sources/{{id}}/voting-rounds    - Reopen voting");
    info!("");
    info!("   ─── Contracts ───");
    info!("   POST /api/sources/{{id}}/contracts        - Start a negotiation");
    info!("   PUT  /api/contracts/{{id}}                - Edit a contract");
    info!("   GET  /api/contracts/{{id}}/drafts         - Proposed negotiation e-mails");
    info!("   PUT  /api/contracts/{{id}}/emails         - Save the e-mail schedule");
    info!("");
    info!("   ─── Harvests ───");
    info!("   POST /api/harvests                      - Plan a harvest");
    info!("   GET  /api/harvests/{{id}}                 - Harvest with the URLs it crawls");
    info!("");
    info!("   GET  /api/dashboard                     - Dashboard cards");
    info!("");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,seeder_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
