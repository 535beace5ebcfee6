use api_shared::{AuthHeaderError, ErrorRes};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use clinic_core::{CoreError, ErrorKind};

/// A [`CoreError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl ApiError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self(CoreError::InvalidInput(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CoreError::UnknownDoctor(_) => StatusCode::NOT_FOUND,
            other => match other.kind() {
                ErrorKind::InvalidCredential
                | ErrorKind::RoleNotPermitted
                | ErrorKind::TokenInvalid => StatusCode::UNAUTHORIZED,
                ErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::SlotConflict | ErrorKind::InvalidTransition => StatusCode::CONFLICT,
                ErrorKind::MalformedRequest => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl From<AuthHeaderError> for ApiError {
    fn from(_: AuthHeaderError) -> Self {
        Self(CoreError::TokenInvalid)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self.0);
        }
        let body = ErrorRes {
            error: self.0.kind().as_str().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_core::{RecordId, Role};

    #[test]
    fn auth_failures_are_401_with_distinct_kinds() {
        for (err, kind) in [
            (CoreError::InvalidCredential, "InvalidCredential"),
            (
                CoreError::RoleNotPermitted { role: Role::Doctor },
                "RoleNotPermitted",
            ),
            (CoreError::TokenInvalid, "TokenInvalid"),
        ] {
            let api = ApiError(err);
            assert_eq!(api.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(api.0.kind().as_str(), kind);
        }
    }

    #[test]
    fn unknown_doctor_is_404_but_not_accepting_is_400() {
        let id = RecordId::new();
        assert_eq!(
            ApiError(CoreError::UnknownDoctor(id)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(CoreError::DoctorNotAccepting(id)).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn upstream_failures_are_503() {
        let api = ApiError(CoreError::UpstreamUnavailable("timeout".into()));
        assert_eq!(api.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
