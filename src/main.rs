//! Proverbs agent - a stateful tool-calling agent served over AG-UI
//!
//! The model edits a shared list of proverbs through tools; every state
//! change streams back to the client as a `STATE_SNAPSHOT` event.

mod ag_ui;
mod api;
mod config;
mod llm;
mod session;
mod state;
mod system_prompt;
mod tools;
mod turn;

use api::{create_router, AppState};
use config::{AgentConfig, LogFormat};
use std::sync::Arc;
use std::time::Duration;
use tools::ToolRegistry;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use turn::TurnDispatcher;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Credentials may live in a .env file
    let dotenv = dotenvy::dotenv();

    init_tracing(LogFormat::from_env());

    if let Ok(path) = dotenv {
        tracing::info!(path = %path.display(), "Loaded environment file");
    }

    let config = AgentConfig::from_env()?;
    tracing::info!(
        model = %config.model,
        profile = ?config.profile,
        max_rounds = config.max_rounds,
        turn_timeout_secs = config.turn_timeout.as_secs(),
        session_idle_secs = config.session_idle_ttl.as_secs(),
        "Configuration loaded"
    );

    let llm = llm::build_service(&config.llm_config())?;
    let registry = Arc::new(ToolRegistry::for_profile(config.profile)?);
    tracing::info!(tools = ?registry.names(), "Tool registry initialized");

    let dispatcher = Arc::new(TurnDispatcher::new(
        llm,
        registry,
        config.profile,
        config.max_rounds,
        config.max_tokens,
    ));
    let state = AppState::new(dispatcher, config.turn_timeout, config.session_idle_ttl);
    state.sessions.spawn_sweeper(SESSION_SWEEP_INTERVAL);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state.clone()).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Proverbs agent listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
            // Ends in-flight turns so their event streams close
            state.shutdown().await;
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "proverbs_agent=info,tower_http=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
