use crate::identity::Role;
use crate::scheduling::ReservationStatus;
use chrono::NaiveDateTime;
use clinic_ids::RecordId;
use serde::Serialize;

/// Machine-readable error category.
///
/// Every [`CoreError`] maps to exactly one kind. The kind is what callers branch on: the UI
/// re-prompts for `InvalidCredential`, asks the user to sign in again for `TokenInvalid`, and
/// re-fetches availability for `SlotConflict`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InvalidCredential,
    RoleNotPermitted,
    TokenInvalid,
    UpstreamUnavailable,
    SlotConflict,
    MalformedRequest,
    InvalidTransition,
    NotFound,
    Forbidden,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidCredential => "InvalidCredential",
            ErrorKind::RoleNotPermitted => "RoleNotPermitted",
            ErrorKind::TokenInvalid => "TokenInvalid",
            ErrorKind::UpstreamUnavailable => "UpstreamUnavailable",
            ErrorKind::SlotConflict => "SlotConflict",
            ErrorKind::MalformedRequest => "MalformedRequest",
            ErrorKind::InvalidTransition => "InvalidTransition",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a storage backend.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid credential")]
    InvalidCredential,
    #[error("role {role} is not permitted for this account")]
    RoleNotPermitted { role: Role },
    #[error("session token is unknown, expired or revoked")]
    TokenInvalid,
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("slot starting {start} overlaps an existing reservation")]
    SlotConflict { start: NaiveDateTime },

    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid input: {0}")]
    Text(#[from] clinic_types::TextError),
    #[error("invalid input: {0}")]
    Id(#[from] clinic_ids::IdError),
    #[error("unknown doctor {0}")]
    UnknownDoctor(RecordId),
    #[error("doctor {0} is not accepting bookings")]
    DoctorNotAccepting(RecordId),
    #[error("slot starting {start} is in the past")]
    SlotInPast { start: NaiveDateTime },
    #[error("slot {start}..{end} is outside working hours")]
    SlotOutsideWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("slot starting {start} is not aligned to the {granularity}-minute grid")]
    SlotMisaligned {
        start: NaiveDateTime,
        granularity: u32,
    },

    #[error("unknown reservation {0}")]
    UnknownReservation(RecordId),
    #[error("cannot move reservation from {from} to {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("failed to read seed file: {0}")]
    SeedRead(std::io::Error),
    #[error("failed to parse seed file: {0}")]
    SeedParse(serde_yaml::Error),
}

impl CoreError {
    /// The machine-readable category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidCredential => ErrorKind::InvalidCredential,
            CoreError::RoleNotPermitted { .. } => ErrorKind::RoleNotPermitted,
            CoreError::TokenInvalid => ErrorKind::TokenInvalid,
            CoreError::UpstreamUnavailable(_) | CoreError::Store(_) => {
                ErrorKind::UpstreamUnavailable
            }
            CoreError::SlotConflict { .. } => ErrorKind::SlotConflict,
            CoreError::InvalidInput(_)
            | CoreError::Text(_)
            | CoreError::Id(_)
            | CoreError::UnknownDoctor(_)
            | CoreError::DoctorNotAccepting(_)
            | CoreError::SlotInPast { .. }
            | CoreError::SlotOutsideWindow { .. }
            | CoreError::SlotMisaligned { .. } => ErrorKind::MalformedRequest,
            CoreError::UnknownReservation(_) => ErrorKind::NotFound,
            CoreError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            CoreError::Forbidden(_) => ErrorKind::Forbidden,
            CoreError::SeedRead(_) | CoreError::SeedParse(_) => ErrorKind::Internal,
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_surface_as_upstream_unavailable() {
        let err = CoreError::from(StoreError::Unavailable("connection refused".into()));
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    }

    #[test]
    fn booking_validation_errors_are_malformed_requests() {
        let doctor = RecordId::new();
        assert_eq!(
            CoreError::UnknownDoctor(doctor).kind(),
            ErrorKind::MalformedRequest
        );
        assert_eq!(
            CoreError::DoctorNotAccepting(doctor).kind(),
            ErrorKind::MalformedRequest
        );
    }

    #[test]
    fn credential_and_role_failures_stay_distinct() {
        assert_ne!(
            CoreError::InvalidCredential.kind(),
            CoreError::RoleNotPermitted { role: Role::Doctor }.kind()
        );
        assert_eq!(ErrorKind::RoleNotPermitted.as_str(), "RoleNotPermitted");
    }
}
