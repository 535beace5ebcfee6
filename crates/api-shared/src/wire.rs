//! JSON request and response bodies.
//!
//! Field names follow the clinic front end: camelCase, with `ID` capitalised (`userID`,
//! `doctorID`). Ids are 32-character lowercase hex; timestamps are RFC 3339.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Error body returned with every non-2xx status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    /// Machine-readable kind, e.g. `InvalidCredential` or `SlotConflict`.
    pub error: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreateSessionReq {
    pub email: String,
    pub password: String,
    /// `PATIENT` or `DOCTOR`.
    pub role: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRes {
    pub token: String,
    pub role: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub expires_at: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidateSessionRes {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "userID", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ValidateSessionRes {
    pub fn invalid() -> Self {
        Self::default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRolesRes {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub roles: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SlotView {
    /// `HH:MM`, clinic-local.
    pub time: String,
    pub available: bool,
    /// `past` or `booked` when unavailable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlotsRes {
    pub date: String,
    #[serde(rename = "doctorID")]
    pub doctor_id: String,
    pub slots: Vec<SlotView>,
    pub available_count: usize,
    pub total_slots: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationReq {
    #[serde(rename = "patientID")]
    pub patient_id: String,
    /// `YYYY-MM-DDTHH:MM` or `YYYY-MM-DDTHH:MM:SS`, clinic-local.
    pub slot_start: String,
    /// Defaults to one slot when omitted.
    #[serde(default)]
    pub duration_minutes: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UpdateReservationReq {
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRes {
    #[serde(rename = "reservationID")]
    pub reservation_id: String,
    #[serde(rename = "doctorID")]
    pub doctor_id: String,
    #[serde(rename = "patientID")]
    pub patient_id: String,
    pub slot_start: String,
    pub duration_minutes: u32,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invalid_session_serialises_to_just_valid_false() {
        let body = serde_json::to_value(ValidateSessionRes::invalid()).unwrap();
        assert_eq!(body, json!({ "valid": false }));
    }

    #[test]
    fn id_fields_use_capitalised_id() {
        let body = serde_json::to_value(CreateSessionRes {
            token: "t".into(),
            role: "PATIENT".into(),
            user_id: "u".into(),
            user_name: "Alex".into(),
            user_email: "a@x.com".into(),
            expires_at: "2024-10-16T08:00:00Z".into(),
        })
        .unwrap();
        assert_eq!(body["userID"], "u");
        assert_eq!(body["userName"], "Alex");
        assert_eq!(body["expiresAt"], "2024-10-16T08:00:00Z");
    }

    #[test]
    fn reservation_request_duration_is_optional() {
        let req: CreateReservationReq = serde_json::from_value(json!({
            "patientID": "p",
            "slotStart": "2024-10-15T10:00",
        }))
        .unwrap();
        assert_eq!(req.duration_minutes, None);
    }
}
