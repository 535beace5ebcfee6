//! Reservation storage.
//!
//! Reservations are grouped per `(doctor, date)`. That pair is the unit of serialisation: the
//! overlap check and the insert happen under the group's lock, and so do status transitions,
//! so a cancellation and a booking for the same day can never interleave.

use crate::error::StoreResult;
use crate::scheduling::reservation::{Reservation, ReservationStatus};
use chrono::NaiveDate;
use clinic_ids::RecordId;
use dashmap::DashMap;

/// Result of an insert-if-no-overlap attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Reservation),
    /// Lost to an existing reservation that blocks the interval.
    Conflict(Reservation),
}

/// Result of a status transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied(Reservation),
    /// Already in the requested state.
    Unchanged(Reservation),
    Rejected { current: ReservationStatus },
    NotFound,
}

pub trait ReservationStore: Send + Sync {
    /// Insert `reservation` unless an occupying reservation of the same doctor overlaps it.
    ///
    /// `default_minutes` is the width assumed for reservations stored without a duration.
    fn insert_if_no_overlap(
        &self,
        reservation: Reservation,
        default_minutes: u32,
    ) -> StoreResult<InsertOutcome>;

    /// Every reservation of `doctor_id` starting on `date`, in start order, any status.
    fn list_for_doctor_on(
        &self,
        doctor_id: &RecordId,
        date: NaiveDate,
    ) -> StoreResult<Vec<Reservation>>;

    fn get(&self, reservation_id: &RecordId) -> StoreResult<Option<Reservation>>;

    fn transition(
        &self,
        reservation_id: &RecordId,
        next: ReservationStatus,
    ) -> StoreResult<TransitionOutcome>;
}

#[derive(Debug, Default)]
pub struct InMemoryReservationStore {
    days: DashMap<(RecordId, NaiveDate), Vec<Reservation>>,
    locations: DashMap<RecordId, (RecordId, NaiveDate)>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReservationStore for InMemoryReservationStore {
    fn insert_if_no_overlap(
        &self,
        reservation: Reservation,
        default_minutes: u32,
    ) -> StoreResult<InsertOutcome> {
        let key = (reservation.doctor_id, reservation.date());
        let start = reservation.scheduled_start;
        let end = reservation.end(default_minutes);

        let mut day = self.days.entry(key).or_default();
        if let Some(blocking) = day
            .iter()
            .find(|existing| existing.blocks(start, end, default_minutes))
        {
            return Ok(InsertOutcome::Conflict(blocking.clone()));
        }

        let at = day.partition_point(|existing| existing.scheduled_start <= start);
        day.insert(at, reservation.clone());
        self.locations.insert(reservation.id, key);
        Ok(InsertOutcome::Inserted(reservation))
    }

    fn list_for_doctor_on(
        &self,
        doctor_id: &RecordId,
        date: NaiveDate,
    ) -> StoreResult<Vec<Reservation>> {
        Ok(self
            .days
            .get(&(*doctor_id, date))
            .map(|day| day.value().clone())
            .unwrap_or_default())
    }

    fn get(&self, reservation_id: &RecordId) -> StoreResult<Option<Reservation>> {
        let Some(key) = self.locations.get(reservation_id).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self
            .days
            .get(&key)
            .and_then(|day| day.iter().find(|r| r.id == *reservation_id).cloned()))
    }

    fn transition(
        &self,
        reservation_id: &RecordId,
        next: ReservationStatus,
    ) -> StoreResult<TransitionOutcome> {
        let Some(key) = self.locations.get(reservation_id).map(|entry| *entry.value()) else {
            return Ok(TransitionOutcome::NotFound);
        };
        let Some(mut day) = self.days.get_mut(&key) else {
            return Ok(TransitionOutcome::NotFound);
        };
        let Some(reservation) = day.iter_mut().find(|r| r.id == *reservation_id) else {
            return Ok(TransitionOutcome::NotFound);
        };

        let current = reservation.status;
        if current == next {
            return Ok(TransitionOutcome::Unchanged(reservation.clone()));
        }
        if !current.can_transition_to(next) {
            return Ok(TransitionOutcome::Rejected { current });
        }
        reservation.status = next;
        Ok(TransitionOutcome::Applied(reservation.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 10, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn booking(doctor_id: RecordId, start: NaiveDateTime, minutes: Option<u32>) -> Reservation {
        Reservation {
            id: RecordId::new(),
            doctor_id,
            patient_id: RecordId::new(),
            scheduled_start: start,
            duration_minutes: minutes,
            status: ReservationStatus::Scheduled,
        }
    }

    #[test]
    fn overlapping_insert_conflicts_and_adjacent_insert_succeeds() {
        let store = InMemoryReservationStore::new();
        let doctor = RecordId::new();
        let first = booking(doctor, at(10, 0), Some(60));

        assert!(matches!(
            store.insert_if_no_overlap(first.clone(), 30).unwrap(),
            InsertOutcome::Inserted(_)
        ));
        assert_eq!(
            store
                .insert_if_no_overlap(booking(doctor, at(10, 30), None), 30)
                .unwrap(),
            InsertOutcome::Conflict(first)
        );
        assert!(matches!(
            store
                .insert_if_no_overlap(booking(doctor, at(11, 0), None), 30)
                .unwrap(),
            InsertOutcome::Inserted(_)
        ));
    }

    #[test]
    fn different_doctors_do_not_conflict() {
        let store = InMemoryReservationStore::new();
        for _ in 0..3 {
            let outcome = store
                .insert_if_no_overlap(booking(RecordId::new(), at(10, 0), None), 30)
                .unwrap();
            assert!(matches!(outcome, InsertOutcome::Inserted(_)));
        }
    }

    #[test]
    fn listing_is_in_start_order() {
        let store = InMemoryReservationStore::new();
        let doctor = RecordId::new();
        for (h, m) in [(14, 0), (9, 0), (11, 30)] {
            store
                .insert_if_no_overlap(booking(doctor, at(h, m), None), 30)
                .unwrap();
        }
        let starts: Vec<_> = store
            .list_for_doctor_on(&doctor, at(0, 0).date())
            .unwrap()
            .into_iter()
            .map(|r| r.scheduled_start)
            .collect();
        assert_eq!(starts, vec![at(9, 0), at(11, 30), at(14, 0)]);
    }

    #[test]
    fn cancelled_reservations_stop_blocking() {
        let store = InMemoryReservationStore::new();
        let doctor = RecordId::new();
        let first = booking(doctor, at(10, 0), None);
        store.insert_if_no_overlap(first.clone(), 30).unwrap();

        let outcome = store
            .transition(&first.id, ReservationStatus::Cancelled)
            .unwrap();
        assert!(matches!(outcome, TransitionOutcome::Applied(r) if r.status == ReservationStatus::Cancelled));

        let again = store
            .insert_if_no_overlap(booking(doctor, at(10, 0), None), 30)
            .unwrap();
        assert!(matches!(again, InsertOutcome::Inserted(_)));
        assert_eq!(store.list_for_doctor_on(&doctor, first.date()).unwrap().len(), 2);
    }

    #[test]
    fn transition_outcomes() {
        let store = InMemoryReservationStore::new();
        let reservation = booking(RecordId::new(), at(9, 0), None);
        store.insert_if_no_overlap(reservation.clone(), 30).unwrap();

        assert!(matches!(
            store.transition(&reservation.id, ReservationStatus::Scheduled).unwrap(),
            TransitionOutcome::Unchanged(_)
        ));
        assert_eq!(
            store.transition(&reservation.id, ReservationStatus::Completed).unwrap(),
            TransitionOutcome::Rejected {
                current: ReservationStatus::Scheduled
            }
        );
        assert_eq!(
            store.transition(&RecordId::new(), ReservationStatus::Cancelled).unwrap(),
            TransitionOutcome::NotFound
        );
        assert_eq!(
            store.get(&reservation.id).unwrap().unwrap().status,
            ReservationStatus::Scheduled
        );
    }
}
