//! Climate shock API server.
//!
//! Serves regional climate shocks computed from the CMIP archive in
//! object storage: catalog maintenance, country-mask artifacts, cached
//! reference maps and the shock endpoint itself.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use clap::Parser;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use shock_api::config::ApiConfig;
use shock_api::handlers;
use shock_api::state::AppState;

/// Climate shock API server
#[derive(Parser, Debug)]
#[command(name = "shock-api")]
#[command(about = "Regional climate shock API over a CMIP NetCDF archive")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8080", env = "SHOCK_LISTEN_ADDR")]
    listen: String,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Number of worker threads
    #[arg(long, env = "SHOCK_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder
        .build()
        .expect("Failed to create Tokio runtime");

    runtime.block_on(async move {
        run_server(args).await;
    });
}

async fn run_server(args: Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    info!("Starting shock API server");

    let config = ApiConfig::from_env();
    let state = match AppState::new(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!("Failed to initialize application state: {}", e);
            std::process::exit(1);
        }
    };

    let app = Router::new()
        // Catalog
        .route("/catalog/reindex", post(handlers::catalog::reindex_handler))
        .route("/catalog", get(handlers::catalog::list_handler))
        // Country mask
        .route("/mask/ensure", post(handlers::mask::ensure_handler))
        .route("/mask/check", get(handlers::mask::check_handler))
        // Reference maps
        .route(
            "/threshold/build",
            post(handlers::threshold::build_handler),
        )
        .route(
            "/threshold/summary",
            get(handlers::threshold::summary_handler),
        )
        // Shocks
        .route("/shock", get(handlers::shock::shock_handler))
        // Probes
        .route("/health", get(handlers::health::health_handler))
        .route("/ready", get(handlers::health::ready_handler))
        // Middleware
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = args.listen.parse().expect("Invalid listen address");
    info!("Shock API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app).await.expect("Server failed");
}
