use crate::error::CoreError;
use crate::scheduling::slots::overlaps;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use clinic_ids::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a reservation.
///
/// ```text
/// SCHEDULED -> CONFIRMED -> IN_PROGRESS -> COMPLETED
///     \            \             \
///      +------------+-------------+--> CANCELLED
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Scheduled => "SCHEDULED",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::InProgress => "IN_PROGRESS",
            ReservationStatus::Completed => "COMPLETED",
            ReservationStatus::Cancelled => "CANCELLED",
        }
    }

    /// Whether a reservation in this state blocks its interval.
    pub fn occupies_time(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Scheduled
                | ReservationStatus::Confirmed
                | ReservationStatus::InProgress
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Completed | ReservationStatus::Cancelled
        )
    }

    /// Whether moving from `self` to `next` is a legal step. Staying put is not a step.
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Scheduled, Confirmed)
                | (Confirmed, InProgress)
                | (InProgress, Completed)
                | (Scheduled | Confirmed | InProgress, Cancelled)
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SCHEDULED" => Ok(ReservationStatus::Scheduled),
            "CONFIRMED" => Ok(ReservationStatus::Confirmed),
            "IN_PROGRESS" => Ok(ReservationStatus::InProgress),
            "COMPLETED" => Ok(ReservationStatus::Completed),
            "CANCELLED" => Ok(ReservationStatus::Cancelled),
            other => Err(CoreError::InvalidInput(format!(
                "unknown reservation status '{other}'"
            ))),
        }
    }
}

/// A persisted appointment. Never deleted; cancellation is a status change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
    pub id: RecordId,
    pub doctor_id: RecordId,
    pub patient_id: RecordId,
    /// Clinic-local start.
    pub scheduled_start: NaiveDateTime,
    /// `None` means one slot of the configured granularity.
    pub duration_minutes: Option<u32>,
    pub status: ReservationStatus,
}

impl Reservation {
    pub fn date(&self) -> NaiveDate {
        self.scheduled_start.date()
    }

    pub fn effective_minutes(&self, default_minutes: u32) -> u32 {
        self.duration_minutes.unwrap_or(default_minutes)
    }

    /// Exclusive end of the reserved interval, clamped to the last representable instant.
    pub fn end(&self, default_minutes: u32) -> NaiveDateTime {
        self.scheduled_start
            .checked_add_signed(Duration::minutes(i64::from(
                self.effective_minutes(default_minutes),
            )))
            .unwrap_or(NaiveDateTime::MAX)
    }

    /// Whether this reservation holds time that overlaps `[start, end)`.
    pub fn blocks(&self, start: NaiveDateTime, end: NaiveDateTime, default_minutes: u32) -> bool {
        self.status.occupies_time()
            && overlaps(self.scheduled_start, self.end(default_minutes), start, end)
    }
}
