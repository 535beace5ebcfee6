//! # API REST
//!
//! REST API for clinic sessions and appointment booking.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, bearer headers, status codes, CORS)
//!
//! Uses `api-shared` for wire types and `clinic-core` for everything with an invariant.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod handlers;

use api_shared::{
    ActiveRolesRes, CreateReservationReq, CreateSessionReq, CreateSessionRes, ErrorRes,
    HealthRes, ReservationRes, SlotView, SlotsRes, UpdateReservationReq, ValidateSessionRes,
};
use axum::routing::{delete, get, post};
use axum::Router;
use chrono::NaiveDateTime;
use clinic_core::{
    ClinicDirectory, Clock, CoreConfig, DirectoryVerifier, InMemoryReservationStore,
    InMemoryTokenStore, SessionBroker, SlotScheduler, SystemClock,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use error::ApiError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub broker: Arc<SessionBroker>,
    pub scheduler: Arc<SlotScheduler>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire the core services over in-memory stores and the given directory.
    pub fn in_memory(cfg: CoreConfig, directory: Arc<ClinicDirectory>, clock: Arc<dyn Clock>) -> Self {
        let broker = SessionBroker::new(
            &cfg,
            Arc::new(InMemoryTokenStore::new()),
            Arc::new(DirectoryVerifier::new(directory.clone())),
            clock.clone(),
        );
        let scheduler = SlotScheduler::new(
            *cfg.slot_policy(),
            Arc::new(InMemoryReservationStore::new()),
            directory,
        );
        Self {
            cfg: Arc::new(cfg),
            broker: Arc::new(broker),
            scheduler: Arc::new(scheduler),
            clock,
        }
    }

    /// Build state from `CLINIC_*` environment variables and the optional seed file.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration value is invalid or the seed file cannot be loaded.
    pub fn from_env() -> anyhow::Result<Self> {
        let cfg = CoreConfig::from_env_values(|key| std::env::var(key).ok())?;
        let seed = std::env::var("CLINIC_SEED_FILE")
            .ok()
            .filter(|path| !path.trim().is_empty());
        let directory = match seed {
            Some(path) => ClinicDirectory::load(Path::new(path.trim()))?,
            None => {
                tracing::warn!("CLINIC_SEED_FILE not set; starting with an empty directory");
                ClinicDirectory::default()
            }
        };
        Ok(Self::in_memory(cfg, Arc::new(directory), Arc::new(SystemClock)))
    }

    /// Current clinic-local time.
    pub fn local_now(&self) -> NaiveDateTime {
        self.clock
            .now()
            .with_timezone(&self.cfg.utc_offset())
            .naive_local()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::create_session,
        handlers::validate_session,
        handlers::revoke_session,
        handlers::active_roles,
        handlers::revoke_user_sessions,
        handlers::doctor_slots,
        handlers::create_reservation,
        handlers::list_reservations,
        handlers::get_reservation,
        handlers::update_reservation,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        CreateSessionReq,
        CreateSessionRes,
        ValidateSessionRes,
        ActiveRolesRes,
        SlotView,
        SlotsRes,
        CreateReservationReq,
        ReservationRes,
        UpdateReservationReq,
    ))
)]
pub struct ApiDoc;

/// The full REST application, Swagger UI included.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/:token",
            get(handlers::validate_session).delete(handlers::revoke_session),
        )
        .route("/users/:user_id/roles", get(handlers::active_roles))
        .route("/users/:user_id/sessions", delete(handlers::revoke_user_sessions))
        .route("/doctors/:doctor_id/slots", get(handlers::doctor_slots))
        .route(
            "/doctors/:doctor_id/reservations",
            post(handlers::create_reservation).get(handlers::list_reservations),
        )
        .route(
            "/reservations/:reservation_id",
            get(handlers::get_reservation).patch(handlers::update_reservation),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve the router until the process stops.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails while running.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("-- Clinic REST API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
