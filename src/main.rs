//! Slabfolio
//!
//! Tracks collections of professionally graded trading cards. Card
//! attributes are scraped from the grading company's public card pages and
//! served over a REST API and a CLI.

mod cli;
mod collection;
mod config;
mod retry;
mod routes;
mod scraper;
mod types;

use axum::{
    routing::{delete, get, post},
    Router,
};
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::collection::CardRepository;
use crate::config::AppConfig;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => run_server(Some(host), Some(port)).await,
        Commands::Lookup {
            cert_number,
            format,
            no_cache,
        } => cli::run_lookup(cert_number, format, no_cache).await,
        Commands::Add {
            username,
            cert_number,
            no_cache,
        } => cli::run_add(username, cert_number, no_cache).await,
        Commands::List {
            username,
            tag,
            sort_by,
            format,
        } => cli::run_list(username, tag, sort_by, format),
    }
}

/// Run the API server.
async fn run_server(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slabfolio=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let mut config = AppConfig::load()?;

    // Override with CLI args
    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("Database path: {}", config.storage.db_path);
    tracing::info!("Fetch mode: {:?}", config.fetcher.mode);

    let repo = CardRepository::new(Path::new(&config.storage.db_path))?;
    let cache = cli::page_cache(&config, false);
    let limiter = cli::rate_limiter(&config);

    // Create application state
    let state = Arc::new(AppState {
        repo: Mutex::new(repo),
        config: config.clone(),
        cache,
        limiter,
    });

    // Build router
    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/cards/:cert_number", get(routes::lookup_card))
        .route("/users", get(routes::list_users))
        .route("/collection/:username", get(routes::get_collection))
        .route("/collection/:username/cards", post(routes::add_card))
        .route(
            "/collection/:username/cards/:cert_number",
            delete(routes::remove_card),
        )
        .route(
            "/collection/:username/cards/:cert_number/tags",
            post(routes::add_tag),
        )
        .route(
            "/collection/:username/cards/:cert_number/tags/:tag",
            delete(routes::remove_tag),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
