//! HTTP handlers.
//!
//! Handlers translate between wire types and the core services and do the per-request
//! authorisation checks. Every failure leaves through [`ApiError`].

use crate::error::ApiError;
use crate::AppState;
use api_shared::{
    bearer_token, ActiveRolesRes, CreateReservationReq, CreateSessionReq, CreateSessionRes,
    ErrorRes, HealthRes, HealthService, ReservationRes, SlotView, SlotsRes,
    UpdateReservationReq, ValidateSessionRes,
};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Json;
use chrono::{NaiveDate, NaiveDateTime, SecondsFormat};
use clinic_core::constants::{DATE_FORMAT, SLOT_START_FORMATS};
use clinic_core::{
    CoreError, CredentialProof, DayAvailability, IdentityClaim, RecordId, Reservation,
    ReservationRequest, ReservationStatus, Role,
};
use serde::Deserialize;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint, used for monitoring and load balancer checks.
#[axum::debug_handler]
pub async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionReq,
    responses(
        (status = 201, description = "Session token issued", body = CreateSessionRes),
        (status = 400, description = "Malformed request", body = ErrorRes),
        (status = 401, description = "InvalidCredential or RoleNotPermitted", body = ErrorRes),
        (status = 503, description = "Credential verifier unavailable", body = ErrorRes)
    )
)]
/// Issue a session token for one role.
///
/// Any earlier token of the same user for the same role stops validating. Tokens held for
/// other roles are not affected.
#[axum::debug_handler]
pub async fn create_session(
    State(state): State<AppState>,
    body: Result<Json<CreateSessionReq>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateSessionRes>)> {
    let Json(req) = body.map_err(|e| ApiError::malformed(e.body_text()))?;
    let role: Role = req.role.parse()?;

    let proof = CredentialProof::password(req.password);
    let token = state.broker.issue(&req.email, &proof, role).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionRes {
            token: token.token_id.to_string(),
            role: token.role.to_string(),
            user_id: token.user_id.to_string(),
            user_name: token.display_name.to_string(),
            user_email: token.email.to_string(),
            expires_at: token.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/sessions/{token}",
    params(("token" = String, Path, description = "Session token")),
    responses(
        (status = 200, description = "Validation result; `valid` is false for unknown, expired or revoked tokens", body = ValidateSessionRes),
        (status = 503, description = "Token store unavailable", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn validate_session(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<ValidateSessionRes>> {
    match state.broker.validate(&token) {
        Ok(claim) => Ok(Json(ValidateSessionRes {
            valid: true,
            role: Some(claim.role.to_string()),
            user_id: Some(claim.user_id.to_string()),
            email: Some(claim.email.to_string()),
            name: Some(claim.display_name.to_string()),
        })),
        Err(CoreError::TokenInvalid) => Ok(Json(ValidateSessionRes::invalid())),
        Err(err) => Err(err.into()),
    }
}

#[utoipa::path(
    delete,
    path = "/sessions/{token}",
    params(("token" = String, Path, description = "Session token")),
    responses(
        (status = 204, description = "Token revoked, or already unusable"),
        (status = 503, description = "Token store unavailable", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn revoke_session(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<StatusCode> {
    state.broker.revoke(&token)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/roles",
    params(("user_id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Roles with a live token", body = ActiveRolesRes),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorRes),
        (status = 403, description = "Bearer token belongs to another user", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn active_roles(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<ActiveRolesRes>> {
    let claim = authorise(&state, &headers)?;
    let user_id = parse_id("userID", &user_id)?;
    require_same_user(&claim, &user_id)?;

    let roles = state.broker.active_roles(&user_id)?;
    Ok(Json(ActiveRolesRes {
        user_id: user_id.to_string(),
        roles: roles.iter().map(Role::to_string).collect(),
    }))
}

#[utoipa::path(
    delete,
    path = "/users/{user_id}/sessions",
    params(("user_id" = String, Path, description = "User id")),
    responses(
        (status = 204, description = "All of the user's tokens revoked"),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorRes),
        (status = 403, description = "Bearer token belongs to another user", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn revoke_user_sessions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let claim = authorise(&state, &headers)?;
    let user_id = parse_id("userID", &user_id)?;
    require_same_user(&claim, &user_id)?;

    state.broker.revoke_all(&user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/doctors/{doctor_id}/slots",
    params(
        ("doctor_id" = String, Path, description = "Doctor id"),
        ("date" = String, Query, description = "Day as YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Slot availability for the day", body = SlotsRes),
        (status = 400, description = "Malformed date, or doctor not accepting bookings", body = ErrorRes),
        (status = 404, description = "Unknown doctor", body = ErrorRes)
    )
)]
/// Availability of each slot of a doctor's day.
///
/// The answer is advisory; a slot shown as available can still be lost to a concurrent
/// booking.
#[axum::debug_handler]
pub async fn doctor_slots(
    State(state): State<AppState>,
    Path(doctor_id): Path<String>,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> ApiResult<Json<SlotsRes>> {
    let Query(query) = query.map_err(|e| ApiError::malformed(e.body_text()))?;
    let doctor_id = parse_id("doctorID", &doctor_id)?;
    let date = parse_date(query.date.as_deref())?;

    let day = state
        .scheduler
        .compute_availability(doctor_id, date, state.local_now())?;
    Ok(Json(slots_res(&day)))
}

#[utoipa::path(
    post,
    path = "/doctors/{doctor_id}/reservations",
    params(("doctor_id" = String, Path, description = "Doctor id")),
    request_body = CreateReservationReq,
    responses(
        (status = 201, description = "Reservation created", body = ReservationRes),
        (status = 400, description = "Past, off-grid or out-of-window slot, or bad input", body = ErrorRes),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorRes),
        (status = 403, description = "Patient booking for someone else", body = ErrorRes),
        (status = 404, description = "Unknown doctor", body = ErrorRes),
        (status = 409, description = "SlotConflict", body = ErrorRes)
    )
)]
/// Book a slot.
///
/// A PATIENT token may only book for its own user id; a DOCTOR token may book for any
/// patient.
#[axum::debug_handler]
pub async fn create_reservation(
    State(state): State<AppState>,
    Path(doctor_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<CreateReservationReq>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ReservationRes>)> {
    let claim = authorise(&state, &headers)?;
    let Json(req) = body.map_err(|e| ApiError::malformed(e.body_text()))?;
    let doctor_id = parse_id("doctorID", &doctor_id)?;
    let patient_id = parse_id("patientID", &req.patient_id)?;
    if claim.role == Role::Patient && claim.user_id != patient_id {
        return Err(ApiError(CoreError::Forbidden(
            "a patient session may only book for its own patientID".into(),
        )));
    }
    let slot_start = parse_slot_start(&req.slot_start)?;

    let reservation = state.scheduler.reserve(
        ReservationRequest {
            doctor_id,
            patient_id,
            slot_start,
            duration_minutes: req.duration_minutes,
        },
        state.local_now(),
    )?;
    Ok((
        StatusCode::CREATED,
        Json(reservation_res(&state, &reservation)),
    ))
}

#[utoipa::path(
    get,
    path = "/doctors/{doctor_id}/reservations",
    params(
        ("doctor_id" = String, Path, description = "Doctor id"),
        ("date" = String, Query, description = "Day as YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Reservations of the day in start order, any status", body = [ReservationRes]),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorRes),
        (status = 403, description = "Only the doctor may list their reservations", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn list_reservations(
    State(state): State<AppState>,
    Path(doctor_id): Path<String>,
    headers: HeaderMap,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<ReservationRes>>> {
    let claim = authorise(&state, &headers)?;
    let Query(query) = query.map_err(|e| ApiError::malformed(e.body_text()))?;
    let doctor_id = parse_id("doctorID", &doctor_id)?;
    if claim.role != Role::Doctor || claim.user_id != doctor_id {
        return Err(ApiError(CoreError::Forbidden(
            "only the doctor's own DOCTOR session may list their reservations".into(),
        )));
    }
    let date = parse_date(query.date.as_deref())?;

    let reservations = state.scheduler.list_for_doctor(&doctor_id, date)?;
    Ok(Json(
        reservations
            .iter()
            .map(|r| reservation_res(&state, r))
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/reservations/{reservation_id}",
    params(("reservation_id" = String, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Reservation", body = ReservationRes),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorRes),
        (status = 403, description = "Neither the patient nor the doctor of this reservation", body = ErrorRes),
        (status = 404, description = "Unknown reservation", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn get_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<ReservationRes>> {
    let claim = authorise(&state, &headers)?;
    let reservation_id = parse_id("reservationID", &reservation_id)?;

    let reservation = state.scheduler.get(&reservation_id)?;
    require_party(&claim, &reservation)?;
    Ok(Json(reservation_res(&state, &reservation)))
}

#[utoipa::path(
    patch,
    path = "/reservations/{reservation_id}",
    params(("reservation_id" = String, Path, description = "Reservation id")),
    request_body = UpdateReservationReq,
    responses(
        (status = 200, description = "Reservation after the transition", body = ReservationRes),
        (status = 400, description = "Unknown status", body = ErrorRes),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorRes),
        (status = 403, description = "Neither the patient nor the doctor of this reservation", body = ErrorRes),
        (status = 404, description = "Unknown reservation", body = ErrorRes),
        (status = 409, description = "InvalidTransition", body = ErrorRes)
    )
)]
/// Move a reservation through its lifecycle. Setting the current status again is a no-op.
#[axum::debug_handler]
pub async fn update_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<UpdateReservationReq>, JsonRejection>,
) -> ApiResult<Json<ReservationRes>> {
    let claim = authorise(&state, &headers)?;
    let Json(req) = body.map_err(|e| ApiError::malformed(e.body_text()))?;
    let reservation_id = parse_id("reservationID", &reservation_id)?;
    let next: ReservationStatus = req.status.parse()?;

    let current = state.scheduler.get(&reservation_id)?;
    require_party(&claim, &current)?;

    let updated = state.scheduler.transition(&reservation_id, next)?;
    Ok(Json(reservation_res(&state, &updated)))
}

fn authorise(state: &AppState, headers: &HeaderMap) -> ApiResult<IdentityClaim> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let token = bearer_token(header)?;
    Ok(state.broker.validate(token)?)
}

fn require_same_user(claim: &IdentityClaim, user_id: &RecordId) -> ApiResult<()> {
    if claim.user_id != *user_id {
        return Err(ApiError(CoreError::Forbidden(
            "bearer token belongs to another user".into(),
        )));
    }
    Ok(())
}

fn require_party(claim: &IdentityClaim, reservation: &Reservation) -> ApiResult<()> {
    let party = match claim.role {
        Role::Patient => reservation.patient_id == claim.user_id,
        Role::Doctor => reservation.doctor_id == claim.user_id,
    };
    if !party {
        return Err(ApiError(CoreError::Forbidden(format!(
            "{} session is not a party to reservation {}",
            claim.role, reservation.id
        ))));
    }
    Ok(())
}

fn parse_id(field: &str, raw: &str) -> ApiResult<RecordId> {
    RecordId::parse(raw).map_err(|_| {
        ApiError::malformed(format!(
            "{field} must be a 32-character lowercase hex id, got '{raw}'"
        ))
    })
}

fn parse_date(raw: Option<&str>) -> ApiResult<NaiveDate> {
    let raw = raw.ok_or_else(|| ApiError::malformed("date query parameter is required"))?;
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| ApiError::malformed(format!("date must be YYYY-MM-DD, got '{raw}'")))
}

fn parse_slot_start(raw: &str) -> ApiResult<NaiveDateTime> {
    SLOT_START_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw.trim(), format).ok())
        .ok_or_else(|| {
            ApiError::malformed(format!(
                "slotStart must be YYYY-MM-DDTHH:MM[:SS], got '{raw}'"
            ))
        })
}

fn slots_res(day: &DayAvailability) -> SlotsRes {
    SlotsRes {
        date: day.date.format(DATE_FORMAT).to_string(),
        doctor_id: day.doctor_id.to_string(),
        slots: day
            .slots
            .iter()
            .map(|s| SlotView {
                time: s.slot.label(),
                available: s.available,
                reason: s.reason.map(|r| r.as_str().to_string()),
            })
            .collect(),
        available_count: day.available_count(),
        total_slots: day.total_slots(),
    }
}

fn reservation_res(state: &AppState, reservation: &Reservation) -> ReservationRes {
    let default_minutes = state.scheduler.policy().granularity_minutes();
    ReservationRes {
        reservation_id: reservation.id.to_string(),
        doctor_id: reservation.doctor_id.to_string(),
        patient_id: reservation.patient_id.to_string(),
        slot_start: reservation
            .scheduled_start
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string(),
        duration_minutes: reservation.effective_minutes(default_minutes),
        status: reservation.status.to_string(),
    }
}
