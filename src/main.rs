//! huddle-gateway server entry point.
//!
//! Starts the Axum HTTP server with WebSocket and REST endpoints and
//! spawns the meeting event bridge.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use huddle_gateway::app_state::AppState;
use huddle_gateway::auth::TokenVerifier;
use huddle_gateway::bridge::EventBridge;
use huddle_gateway::config::GatewayConfig;
use huddle_gateway::domain::ConnectionRegistry;
use huddle_gateway::history::ChatHistory;
use huddle_gateway::persistence::MessageStore;
use huddle_gateway::persistence::postgres::PostgresStore;
use huddle_gateway::api;
use huddle_gateway::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting huddle-gateway");

    // Connect to PostgreSQL
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Build the real-time core
    let registry = Arc::new(ConnectionRegistry::new(config.pending_invite_cap));
    let store: Arc<dyn MessageStore> = Arc::new(PostgresStore::new(pool.clone()));
    let history = Arc::new(ChatHistory::new(store, config.history));
    let auth = Arc::new(TokenVerifier::new(&config.jwt_secret));

    // Spawn the meeting event bridge
    let bridge = EventBridge::new(pool, Arc::clone(&registry), &config);
    tokio::spawn(bridge.run());

    // Build application state
    let app_state = AppState {
        registry,
        history,
        auth,
        join_history_limit: config.join_history_limit,
        join_history_per_sender: config.join_history_per_sender,
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
