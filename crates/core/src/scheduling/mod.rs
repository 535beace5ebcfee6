//! Appointment slots and reservations.
//!
//! Slots are derived from the working window and never stored. Reservations are the only
//! persisted scheduling state; for a given doctor no two occupying reservations overlap.

pub mod reservation;
pub mod scheduler;
pub mod slots;
pub mod store;

pub use reservation::{Reservation, ReservationStatus};
pub use scheduler::{
    DayAvailability, ReservationRequest, SlotAvailability, SlotScheduler, UnavailableReason,
};
pub use slots::{generate_day_slots, overlaps, AppointmentSlot, SlotPolicy};
pub use store::{InMemoryReservationStore, InsertOutcome, ReservationStore, TransitionOutcome};
