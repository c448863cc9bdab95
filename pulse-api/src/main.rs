//! Pulse streaming gateway server
//!
//! WebSocket gateway that streams financial signal updates (trend reports,
//! sentiment swings, breaking news) to subscribed clients, plus a small
//! HTTP surface for ingestion, administration and health.

mod routes;

use axum::{
    http::{header, Method},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;

use pulse_services::{
    event_channel, ConnectionRegistry, Dispatcher, EventPublisher, GatewayConfig,
    KeywordAnalyzer, Scheduler, TrendEngine,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Depth of the producer event queue feeding the hub consumer
const EVENT_HUB_CAPACITY: usize = 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub engine: Arc<TrendEngine>,
    pub dispatcher: Arc<Dispatcher>,
    pub publisher: EventPublisher,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pulse_api=debug")),
        )
        .init();

    info!("Starting Pulse streaming gateway");

    let config = GatewayConfig::from_env();
    info!(
        "Gateway config: {} max connections, {}s idle window, {} tokens per bucket",
        config.max_connections,
        config.idle_window.as_secs(),
        config.rate_limit.max_tokens
    );

    let registry = Arc::new(ConnectionRegistry::new(config.clone()));

    // Event hub: producers publish analysis events, the consumer loop maps
    // them to stream messages and hands them to the dispatcher
    let (publisher, hub) = event_channel(EVENT_HUB_CAPACITY);

    let engine = Arc::new(TrendEngine::new(
        Arc::new(KeywordAnalyzer),
        publisher.clone(),
        config.analytics,
    ));
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry)));

    let hub_engine = Arc::clone(&engine);
    let hub_dispatcher = Arc::clone(&dispatcher);
    let hub_handle = tokio::spawn(async move {
        hub.run(hub_engine, hub_dispatcher).await;
    });

    let mut scheduler = Scheduler::start(Arc::clone(&registry), Arc::clone(&engine));

    let state = AppState {
        registry,
        engine,
        dispatcher,
        publisher,
    };

    // Configure CORS for frontend clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = Router::new()
        .nest("/api", routes::api_routes())
        .merge(routes::ws_routes())
        .layer(cors)
        .with_state(state);

    let port = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down: stopping maintenance tasks and event hub");
    scheduler.shutdown();
    hub_handle.abort();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
