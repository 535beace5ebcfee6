//! Availability and atomic reservation.
//!
//! Availability is computed on read from the day's slot grid and its occupying reservations.
//! It is advisory: between a read and a booking another caller may win the slot. Only
//! [`SlotScheduler::reserve`] is strictly correct, because its overlap check and insert run as
//! one store transaction scoped to `(doctor, date)`.

use crate::directory::{DoctorDirectory, DoctorProfile};
use crate::error::{CoreError, CoreResult};
use crate::scheduling::reservation::{Reservation, ReservationStatus};
use crate::scheduling::slots::{generate_day_slots, AppointmentSlot, SlotPolicy};
use crate::scheduling::store::{InsertOutcome, ReservationStore, TransitionOutcome};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use clinic_ids::RecordId;
use serde::Serialize;
use std::sync::Arc;

/// Why a slot cannot be booked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnavailableReason {
    Past,
    Booked,
}

impl UnavailableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnavailableReason::Past => "past",
            UnavailableReason::Booked => "booked",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotAvailability {
    pub slot: AppointmentSlot,
    pub available: bool,
    pub reason: Option<UnavailableReason>,
}

/// Availability of every slot of one doctor's day.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DayAvailability {
    pub doctor_id: RecordId,
    pub date: NaiveDate,
    pub slots: Vec<SlotAvailability>,
}

impl DayAvailability {
    pub fn available_count(&self) -> usize {
        self.slots.iter().filter(|s| s.available).count()
    }

    pub fn total_slots(&self) -> usize {
        self.slots.len()
    }
}

/// A booking request. `duration_minutes` is signed so that non-positive input can be rejected
/// with a clear error instead of failing to deserialise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservationRequest {
    pub doctor_id: RecordId,
    pub patient_id: RecordId,
    pub slot_start: NaiveDateTime,
    pub duration_minutes: Option<i64>,
}

pub struct SlotScheduler {
    policy: SlotPolicy,
    store: Arc<dyn ReservationStore>,
    doctors: Arc<dyn DoctorDirectory>,
}

impl SlotScheduler {
    pub fn new(
        policy: SlotPolicy,
        store: Arc<dyn ReservationStore>,
        doctors: Arc<dyn DoctorDirectory>,
    ) -> Self {
        Self {
            policy,
            store,
            doctors,
        }
    }

    pub fn policy(&self) -> &SlotPolicy {
        &self.policy
    }

    pub fn generate_day_slots(&self, doctor_id: RecordId, date: NaiveDate) -> Vec<AppointmentSlot> {
        generate_day_slots(doctor_id, date, &self.policy)
    }

    /// Availability of each slot of `date` as seen at clinic-local `now`.
    ///
    /// A slot that overlaps an occupying reservation is `booked`; otherwise it is `past` when
    /// it starts at or before `now`.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownDoctor`] or [`CoreError::DoctorNotAccepting`] for a doctor that
    /// cannot be booked, or a store error.
    pub fn compute_availability(
        &self,
        doctor_id: RecordId,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> CoreResult<DayAvailability> {
        self.bookable_doctor(&doctor_id)?;

        let default_minutes = self.policy.granularity_minutes();
        let occupying: Vec<Reservation> = self
            .store
            .list_for_doctor_on(&doctor_id, date)?
            .into_iter()
            .filter(|r| r.status.occupies_time())
            .collect();

        let slots = self
            .generate_day_slots(doctor_id, date)
            .into_iter()
            .map(|slot| {
                let start = slot.start();
                let end = slot.end();
                let reason = if occupying
                    .iter()
                    .any(|r| r.blocks(start, end, default_minutes))
                {
                    Some(UnavailableReason::Booked)
                } else if start <= now {
                    Some(UnavailableReason::Past)
                } else {
                    None
                };
                SlotAvailability {
                    slot,
                    available: reason.is_none(),
                    reason,
                }
            })
            .collect();

        Ok(DayAvailability {
            doctor_id,
            date,
            slots,
        })
    }

    /// Book an interval for a patient.
    ///
    /// # Errors
    ///
    /// - [`CoreError::SlotConflict`] if an occupying reservation overlaps the interval. The
    ///   caller should re-read availability; the scheduler does not retry.
    /// - A validation error (unknown doctor, not accepting, bad duration, off-grid,
    ///   out-of-window or past start) before the store is touched.
    pub fn reserve(&self, request: ReservationRequest, now: NaiveDateTime) -> CoreResult<Reservation> {
        self.bookable_doctor(&request.doctor_id)?;

        let duration_minutes = match request.duration_minutes {
            None => None,
            Some(minutes) if minutes <= 0 => {
                return Err(CoreError::InvalidInput(format!(
                    "durationMinutes must be positive, got {minutes}"
                )))
            }
            Some(minutes) => Some(u32::try_from(minutes).map_err(|_| {
                CoreError::InvalidInput(format!("durationMinutes {minutes} is too large"))
            })?),
        };
        let default_minutes = self.policy.granularity_minutes();
        let start = request.slot_start;
        let end = start
            .checked_add_signed(Duration::minutes(i64::from(
                duration_minutes.unwrap_or(default_minutes),
            )))
            .ok_or_else(|| {
                CoreError::InvalidInput(format!("slot starting {start} ends past the calendar"))
            })?;

        if !self.policy.is_on_grid(start) {
            return Err(CoreError::SlotMisaligned {
                start,
                granularity: default_minutes,
            });
        }
        let (window_start, window_end) = self.policy.window_on(start.date());
        if start < window_start || end > window_end {
            return Err(CoreError::SlotOutsideWindow { start, end });
        }
        if start <= now {
            return Err(CoreError::SlotInPast { start });
        }

        let reservation = Reservation {
            id: RecordId::new(),
            doctor_id: request.doctor_id,
            patient_id: request.patient_id,
            scheduled_start: start,
            duration_minutes,
            status: ReservationStatus::Scheduled,
        };

        match self.store.insert_if_no_overlap(reservation, default_minutes)? {
            InsertOutcome::Inserted(reservation) => {
                tracing::info!(
                    reservation_id = %reservation.id,
                    doctor_id = %reservation.doctor_id,
                    start = %reservation.scheduled_start,
                    "reservation created"
                );
                Ok(reservation)
            }
            InsertOutcome::Conflict(blocking) => {
                tracing::warn!(
                    doctor_id = %request.doctor_id,
                    start = %start,
                    blocking = %blocking.id,
                    "slot conflict"
                );
                Err(CoreError::SlotConflict { start })
            }
        }
    }

    /// Move a reservation to `next`. Requesting the current status is a no-op success.
    pub fn transition(
        &self,
        reservation_id: &RecordId,
        next: ReservationStatus,
    ) -> CoreResult<Reservation> {
        match self.store.transition(reservation_id, next)? {
            TransitionOutcome::Applied(reservation) => {
                tracing::info!(
                    reservation_id = %reservation.id,
                    status = %reservation.status,
                    "reservation status changed"
                );
                Ok(reservation)
            }
            TransitionOutcome::Unchanged(reservation) => Ok(reservation),
            TransitionOutcome::Rejected { current } => Err(CoreError::InvalidTransition {
                from: current,
                to: next,
            }),
            TransitionOutcome::NotFound => Err(CoreError::UnknownReservation(*reservation_id)),
        }
    }

    pub fn get(&self, reservation_id: &RecordId) -> CoreResult<Reservation> {
        self.store
            .get(reservation_id)?
            .ok_or(CoreError::UnknownReservation(*reservation_id))
    }

    /// Every reservation of the doctor on `date`, whatever its status.
    pub fn list_for_doctor(&self, doctor_id: &RecordId, date: NaiveDate) -> CoreResult<Vec<Reservation>> {
        Ok(self.store.list_for_doctor_on(doctor_id, date)?)
    }

    fn bookable_doctor(&self, doctor_id: &RecordId) -> CoreResult<DoctorProfile> {
        let doctor = self
            .doctors
            .find_doctor(doctor_id)
            .ok_or(CoreError::UnknownDoctor(*doctor_id))?;
        if !doctor.accepting_bookings {
            return Err(CoreError::DoctorNotAccepting(*doctor_id));
        }
        Ok(doctor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{Account, ClinicDirectory};
    use crate::error::ErrorKind;
    use crate::identity::Role;
    use crate::scheduling::store::InMemoryReservationStore;
    use clinic_types::{EmailAddress, NonEmptyText};
    use std::sync::Barrier;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 15).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        date().and_hms_opt(h, m, 0).unwrap()
    }

    struct Fixture {
        scheduler: SlotScheduler,
        doctor: RecordId,
        closed_doctor: RecordId,
        patient: RecordId,
    }

    fn fixture() -> Fixture {
        let doctor = Account::new(
            EmailAddress::parse("doc@clinic.org").unwrap(),
            NonEmptyText::new("Dr Open").unwrap(),
            [Role::Doctor],
            "pw",
        );
        let mut closed = Account::new(
            EmailAddress::parse("closed@clinic.org").unwrap(),
            NonEmptyText::new("Dr Closed").unwrap(),
            [Role::Doctor],
            "pw",
        );
        closed.accepting_bookings = false;
        let patient = Account::new(
            EmailAddress::parse("pat@clinic.org").unwrap(),
            NonEmptyText::new("Pat").unwrap(),
            [Role::Patient],
            "pw",
        );
        let ids = (doctor.id, closed.id, patient.id);
        let directory = ClinicDirectory::new([doctor, closed, patient]).unwrap();
        let scheduler = SlotScheduler::new(
            SlotPolicy::default(),
            Arc::new(InMemoryReservationStore::new()),
            Arc::new(directory),
        );
        Fixture {
            scheduler,
            doctor: ids.0,
            closed_doctor: ids.1,
            patient: ids.2,
        }
    }

    fn request(f: &Fixture, start: NaiveDateTime) -> ReservationRequest {
        ReservationRequest {
            doctor_id: f.doctor,
            patient_id: f.patient,
            slot_start: start,
            duration_minutes: None,
        }
    }

    fn reason_at(day: &DayAvailability, label: &str) -> Option<UnavailableReason> {
        day.slots
            .iter()
            .find(|s| s.slot.label() == label)
            .map(|s| s.reason)
            .unwrap_or_else(|| panic!("no slot {label}"))
    }

    #[test]
    fn confirmed_reservation_scenario() {
        let f = fixture();
        let booked = f
            .scheduler
            .reserve(
                ReservationRequest {
                    duration_minutes: Some(30),
                    ..request(&f, at(10, 0))
                },
                at(7, 0),
            )
            .unwrap();
        f.scheduler
            .transition(&booked.id, ReservationStatus::Confirmed)
            .unwrap();

        let early = f
            .scheduler
            .compute_availability(f.doctor, date(), at(8, 0))
            .unwrap();
        assert_eq!(early.total_slots(), 16);
        assert_eq!(early.available_count(), 15);
        assert_eq!(reason_at(&early, "09:00"), None);
        assert_eq!(reason_at(&early, "09:30"), None);
        assert_eq!(reason_at(&early, "10:00"), Some(UnavailableReason::Booked));
        assert!(early
            .slots
            .iter()
            .all(|s| s.reason != Some(UnavailableReason::Past)));

        let later = f
            .scheduler
            .compute_availability(f.doctor, date(), at(9, 45))
            .unwrap();
        assert_eq!(reason_at(&later, "09:00"), Some(UnavailableReason::Past));
        assert_eq!(reason_at(&later, "09:30"), Some(UnavailableReason::Past));
        assert_eq!(reason_at(&later, "10:00"), Some(UnavailableReason::Booked));
        assert_eq!(reason_at(&later, "10:30"), None);
        assert_eq!(later.available_count(), 13);
    }

    #[test]
    fn booked_wins_over_past() {
        let f = fixture();
        f.scheduler.reserve(request(&f, at(9, 0)), at(8, 0)).unwrap();

        let day = f
            .scheduler
            .compute_availability(f.doctor, date(), at(12, 0))
            .unwrap();
        assert_eq!(reason_at(&day, "09:00"), Some(UnavailableReason::Booked));
        assert_eq!(reason_at(&day, "09:30"), Some(UnavailableReason::Past));
    }

    #[test]
    fn long_reservation_books_every_slot_it_touches() {
        let f = fixture();
        f.scheduler
            .reserve(
                ReservationRequest {
                    duration_minutes: Some(45),
                    ..request(&f, at(13, 0))
                },
                at(8, 0),
            )
            .unwrap();

        let day = f
            .scheduler
            .compute_availability(f.doctor, date(), at(8, 0))
            .unwrap();
        assert_eq!(reason_at(&day, "13:00"), Some(UnavailableReason::Booked));
        assert_eq!(reason_at(&day, "13:30"), Some(UnavailableReason::Booked));
        assert_eq!(reason_at(&day, "14:00"), None);
    }

    #[test]
    fn racing_reservations_have_exactly_one_winner() {
        let f = fixture();
        let contenders = 16;
        let barrier = &Barrier::new(contenders);
        let f = &f;

        let results: Vec<CoreResult<Reservation>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..contenders)
                .map(|_| {
                    scope.spawn(move || {
                        barrier.wait();
                        f.scheduler.reserve(request(f, at(11, 0)), at(8, 0))
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("thread panicked"))
                .collect()
        });

        let winners = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.kind() == ErrorKind::SlotConflict))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(conflicts, contenders - 1);
        assert_eq!(f.scheduler.list_for_doctor(&f.doctor, date()).unwrap().len(), 1);
    }

    #[test]
    fn racing_overlapping_intervals_have_exactly_one_winner() {
        let f = fixture();
        let shapes = [(at(10, 0), 60), (at(10, 30), 30), (at(10, 0), 30)];
        let contenders = 12;
        let barrier = &Barrier::new(contenders);
        let f = &f;

        let results: Vec<CoreResult<Reservation>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..contenders)
                .map(|i| {
                    let (start, minutes) = shapes[i % shapes.len()];
                    scope.spawn(move || {
                        barrier.wait();
                        f.scheduler.reserve(
                            ReservationRequest {
                                duration_minutes: Some(minutes),
                                ..request(f, start)
                            },
                            at(8, 0),
                        )
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("thread panicked"))
                .collect()
        });

        let winners = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.kind() == ErrorKind::SlotConflict))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(conflicts, contenders - 1);

        let booked = f.scheduler.list_for_doctor(&f.doctor, date()).unwrap();
        assert_eq!(booked.len(), 1);
        let day = f
            .scheduler
            .compute_availability(f.doctor, date(), at(8, 0))
            .unwrap();
        assert_eq!(reason_at(&day, "10:30").is_some(), booked[0].end(30) > at(10, 30));
    }

    #[test]
    fn interval_ending_past_the_calendar_is_malformed() {
        let f = fixture();
        let last_day = NaiveDate::MAX;
        let now = last_day.and_hms_opt(8, 0, 0).unwrap();

        let err = f
            .scheduler
            .reserve(
                ReservationRequest {
                    duration_minutes: Some(1440),
                    ..request(&f, last_day.and_hms_opt(9, 0, 0).unwrap())
                },
                now,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedRequest);

        let day = f.scheduler.compute_availability(f.doctor, last_day, now).unwrap();
        assert_eq!(day.available_count(), 16);
        assert!(f
            .scheduler
            .reserve(request(&f, last_day.and_hms_opt(16, 30, 0).unwrap()), now)
            .is_ok());
    }

    #[test]
    fn cancelling_frees_the_slot_and_is_idempotent() {
        let f = fixture();
        let first = f.scheduler.reserve(request(&f, at(10, 0)), at(8, 0)).unwrap();
        let err = f
            .scheduler
            .reserve(request(&f, at(10, 0)), at(8, 0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SlotConflict);

        let cancelled = f
            .scheduler
            .transition(&first.id, ReservationStatus::Cancelled)
            .unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
        f.scheduler
            .transition(&first.id, ReservationStatus::Cancelled)
            .unwrap();

        let day = f
            .scheduler
            .compute_availability(f.doctor, date(), at(8, 0))
            .unwrap();
        assert_eq!(reason_at(&day, "10:00"), None);
        assert!(f.scheduler.reserve(request(&f, at(10, 0)), at(8, 0)).is_ok());
        assert_eq!(
            f.scheduler.get(&first.id).unwrap().status,
            ReservationStatus::Cancelled
        );
    }

    #[test]
    fn terminal_reservations_reject_further_transitions() {
        let f = fixture();
        let r = f.scheduler.reserve(request(&f, at(15, 0)), at(8, 0)).unwrap();
        f.scheduler
            .transition(&r.id, ReservationStatus::Cancelled)
            .unwrap();

        let err = f
            .scheduler
            .transition(&r.id, ReservationStatus::Confirmed)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        let err = f
            .scheduler
            .transition(&RecordId::new(), ReservationStatus::Confirmed)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn invalid_requests_are_rejected_before_the_store() {
        let f = fixture();
        let cases = [
            ReservationRequest {
                duration_minutes: Some(0),
                ..request(&f, at(10, 0))
            },
            ReservationRequest {
                duration_minutes: Some(-30),
                ..request(&f, at(10, 0))
            },
            request(&f, at(10, 15)),
            request(&f, at(8, 30)),
            request(&f, at(17, 0)),
            ReservationRequest {
                duration_minutes: Some(60),
                ..request(&f, at(16, 30))
            },
            request(&f, at(9, 0)),
        ];
        for case in cases {
            let err = f.scheduler.reserve(case.clone(), at(9, 0)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedRequest, "{case:?}: {err}");
        }
        assert!(f.scheduler.list_for_doctor(&f.doctor, date()).unwrap().is_empty());
    }

    #[test]
    fn unknown_and_closed_doctors_cannot_be_booked() {
        let f = fixture();
        let unknown = f
            .scheduler
            .compute_availability(RecordId::new(), date(), at(8, 0))
            .unwrap_err();
        assert!(matches!(unknown, CoreError::UnknownDoctor(_)));

        let patient_as_doctor = f
            .scheduler
            .compute_availability(f.patient, date(), at(8, 0))
            .unwrap_err();
        assert!(matches!(patient_as_doctor, CoreError::UnknownDoctor(_)));

        let closed = f
            .scheduler
            .reserve(
                ReservationRequest {
                    doctor_id: f.closed_doctor,
                    ..request(&f, at(10, 0))
                },
                at(8, 0),
            )
            .unwrap_err();
        assert!(matches!(closed, CoreError::DoctorNotAccepting(_)));
    }
}
