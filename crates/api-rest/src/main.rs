//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own, without the expired-session sweeper.
//!
//! ## Intended use
//! Useful for development and debugging against the OpenAPI/Swagger UI. The workspace's main
//! `clinic-run` binary runs the REST server together with the sweeper.

use api_rest::{serve, AppState};
use clinic_core::constants::DEFAULT_REST_ADDR;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the clinic REST API server.
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `CLINIC_SEED_FILE`: YAML account/doctor seed (optional)
/// - `CLINIC_*`: working hours, slot width and session settings, see `CoreConfig`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration or seed file is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("clinic_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CLINIC_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    tracing::info!("-- Starting clinic REST API on {}", addr);

    let state = AppState::from_env()?;
    serve(&addr, state).await
}
