use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use travel_graph_store::config::Config;
use travel_graph_store::engine::Engine;
use travel_graph_store::handlers::dispatch;
use travel_graph_store::heartbeat::{self, QueryCounter};
use travel_graph_store::loader;
use travel_graph_store::logging;
use travel_graph_store::request_id::request_id_middleware;
use travel_graph_store::state::AppState;
use travel_graph_store::time_util::{self, AgeCutoffTable};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();

    let config = Config::parse();

    let now = time_util::determine_now(config.options_path().as_deref());
    tracing::info!(now = %now, "resolved reference time for age computations");
    let ages = Arc::new(AgeCutoffTable::new(now));

    tracing::info!(zip = %config.zip.display(), "loading bootstrap archive");
    let engine = Arc::new(Engine::new());
    loader::load_archive(&engine, &config.zip).with_context(|| format!("loading archive {}", config.zip.display()))?;
    tracing::info!(
        users = engine.users.len(),
        locations = engine.locations.len(),
        visits = engine.visits.len(),
        "bootstrap load complete"
    );

    let queries = QueryCounter::new();
    heartbeat::spawn(Arc::clone(&queries));

    let state = AppState::new(engine, ages, queries);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .fallback(dispatch)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(addr = %addr, "server starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received, draining connections");
}
