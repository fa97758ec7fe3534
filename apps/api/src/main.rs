mod coaching;
mod config;
mod errors;
mod events;
mod interview;
mod llm_client;
mod models;
mod routes;
mod session;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::coaching::search::{NoopSearchProvider, SearchProvider, TavilySearchProvider};
use crate::config::Config;
use crate::events::{EventBus, EventFilter, EventType};
use crate::llm_client::{AnthropicBackend, LlmGateway};
use crate::routes::build_router;
use crate::session::manager::SessionManager;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rehearsal API v{}", env!("CARGO_PKG_VERSION"));

    let settings = &config.settings;

    // Event bus, with every event mirrored into the log
    let events = Arc::new(EventBus::new(settings.event_history_capacity));
    events.subscribe(EventFilter::All, |event| {
        if event.event_type == EventType::Error {
            warn!(source = %event.source, data = %event.data, "{}", event.event_type);
        } else {
            debug!(source = %event.source, data = %event.data, "{}", event.event_type);
        }
        Ok(())
    });

    // Initialize LLM gateway
    let backend = AnthropicBackend::new(config.anthropic_api_key.clone(), settings.llm_timeout)?;
    let gateway = Arc::new(LlmGateway::new(
        Arc::new(backend),
        Arc::clone(&events),
        settings,
    ));
    info!(
        "LLM gateway initialized (model: {}, attempts: {})",
        llm_client::MODEL,
        settings.llm_max_attempts
    );

    // Resource search is optional
    let search: Arc<dyn SearchProvider> = match &config.tavily_api_key {
        Some(key) => {
            info!("Resource search enabled (Tavily)");
            Arc::new(TavilySearchProvider::new(key.clone(), settings.search_timeout)?)
        }
        None => {
            info!("TAVILY_API_KEY not set; resource recommendations disabled");
            Arc::new(NoopSearchProvider)
        }
    };

    let sessions = Arc::new(SessionManager::new(
        gateway,
        search,
        Arc::clone(&events),
        settings,
    ));

    // Build app state
    let state = AppState { sessions, events };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
