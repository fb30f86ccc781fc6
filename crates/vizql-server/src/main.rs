//! VizQL chart data server
//!
//! HTTP service that accepts declarative chart requests, compiles them to
//! SQL, executes against DuckDB and returns raw rows or fully rendered
//! inline SVG charts.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

mod agent;
mod config;
mod fetch;
mod logging;
mod routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = config::Config::load_or_default("config.yaml")?;
    config.apply_logging_env();
    logging::init();

    let pool = vizql_duck::Pool::open(
        config.database.path.clone().map(Into::into),
        config.database.pool_size,
        Duration::from_millis(config.database.acquire_timeout_ms),
    )?;
    info!(
        database = config.database.path.as_deref().unwrap_or(":memory:"),
        pool_size = config.database.pool_size,
        "database pool ready"
    );

    let state = Arc::new(routes::AppState::new(
        pool,
        vizql_render::RendererRegistry::with_builtins(),
    ));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting VizQL server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, routes::router(state)).await?;

    Ok(())
}
