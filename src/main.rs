use api_rest::AppState;
use clinic_core::constants::DEFAULT_REST_ADDR;
use clinic_core::sessions::sweep_expired_sessions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the clinic service
///
/// Runs the REST server and the expired-session sweeper concurrently. The sweeper hard-deletes
/// tokens whose expiry is older than the retention grace; validation never depends on it.
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CLINIC_SEED_FILE`: YAML account/doctor seed (optional)
/// - `CLINIC_SWEEP_INTERVAL`: sweeper period (default: "10m")
/// - `CLINIC_WORK_START`, `CLINIC_WORK_END`, `CLINIC_SLOT_MINUTES`, `CLINIC_SESSION_TTL`,
///   `CLINIC_SESSION_RETENTION`, `CLINIC_VERIFIER_TIMEOUT`, `CLINIC_UPSTREAM_BACKOFF`,
///   `CLINIC_UTC_OFFSET`
///
/// # Returns
/// * `Ok(())` - If the server runs and shuts down cleanly
/// * `Err(anyhow::Error)` - If startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_run=info".parse()?)
                .add_directive("clinic_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr =
        std::env::var("CLINIC_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    let state = AppState::from_env()?;
    let sweep_every = state.cfg.sessions().sweep_interval;

    tracing::info!("++ Starting clinic REST on {}", rest_addr);
    tracing::info!("++ Sweeping expired sessions every {:?}", sweep_every);

    let sweeper = tokio::spawn(sweep_expired_sessions(state.broker.clone(), sweep_every));
    let result = api_rest::serve(&rest_addr, state).await;
    sweeper.abort();

    result
}
