//! runshed server entrypoint

use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use runshed::{ApiAppState, Config, JobRegistry, ProcessLauncher, api_routes, spawn_sweeper};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("Starting runshed job service");
    info!(program = ?config.program, "Configured automation program");

    let launcher = Arc::new(ProcessLauncher::new(
        config.program.clone(),
        config.working_dir.clone(),
    ));
    let registry = Arc::new(JobRegistry::new(
        launcher,
        config.job_timeout_ms.map(Duration::from_millis),
    ));

    spawn_sweeper(
        registry.clone(),
        Duration::from_secs(config.sweep_interval_seconds),
        config.retention_seconds,
    );

    let app = api_routes(ApiAppState::new(registry))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("Listening on http://0.0.0.0:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
