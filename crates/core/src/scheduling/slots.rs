//! Day slot generation.
//!
//! Slots are never stored. For a given working window and granularity the slots of a date are
//! a pure function of those three values, so two calls always agree and nothing needs to be
//! invalidated when the window changes.

use crate::constants::{DEFAULT_SLOT_MINUTES, DEFAULT_WORK_END, DEFAULT_WORK_START, SLOT_TIME_FORMAT};
use crate::error::{CoreError, CoreResult};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use clinic_ids::RecordId;

/// Working window and slot width applied to every doctor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotPolicy {
    work_start: NaiveTime,
    work_end: NaiveTime,
    granularity_minutes: u32,
}

impl SlotPolicy {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if the window is empty or inverted, or if the
    /// granularity is zero.
    pub fn new(
        work_start: NaiveTime,
        work_end: NaiveTime,
        granularity_minutes: u32,
    ) -> CoreResult<Self> {
        if work_start >= work_end {
            return Err(CoreError::InvalidInput(format!(
                "working window start {} must be before end {}",
                work_start.format(SLOT_TIME_FORMAT),
                work_end.format(SLOT_TIME_FORMAT)
            )));
        }
        if granularity_minutes == 0 {
            return Err(CoreError::InvalidInput(
                "slot granularity must be at least one minute".into(),
            ));
        }
        Ok(Self {
            work_start,
            work_end,
            granularity_minutes,
        })
    }

    pub fn work_start(&self) -> NaiveTime {
        self.work_start
    }

    pub fn work_end(&self) -> NaiveTime {
        self.work_end
    }

    pub fn granularity_minutes(&self) -> u32 {
        self.granularity_minutes
    }

    /// Number of slots in a day: `ceil((end - start) / granularity)`.
    pub fn slots_per_day(&self) -> usize {
        let window = (self.work_end - self.work_start).num_minutes();
        let width = i64::from(self.granularity_minutes);
        usize::try_from((window + width - 1) / width).unwrap_or(0)
    }

    /// Start and end of the working window on `date`.
    pub fn window_on(&self, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        (date.and_time(self.work_start), date.and_time(self.work_end))
    }

    /// Whether `start` falls on the slot grid anchored at the window start.
    pub fn is_on_grid(&self, start: NaiveDateTime) -> bool {
        let offset = start - start.date().and_time(self.work_start);
        offset.num_seconds() >= 0
            && offset.num_seconds() % (i64::from(self.granularity_minutes) * 60) == 0
    }
}

impl Default for SlotPolicy {
    fn default() -> Self {
        // The defaults are compile-time constants that are known to parse.
        let start = NaiveTime::parse_from_str(DEFAULT_WORK_START, SLOT_TIME_FORMAT)
            .unwrap_or(NaiveTime::MIN);
        let end = NaiveTime::parse_from_str(DEFAULT_WORK_END, SLOT_TIME_FORMAT)
            .unwrap_or(NaiveTime::MIN);
        Self {
            work_start: start,
            work_end: end,
            granularity_minutes: DEFAULT_SLOT_MINUTES,
        }
    }
}

/// One fixed-width interval of a doctor's day.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppointmentSlot {
    pub doctor_id: RecordId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
}

impl AppointmentSlot {
    pub fn start(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    /// Exclusive end of the slot interval, clamped to the last representable instant.
    pub fn end(&self) -> NaiveDateTime {
        self.start()
            .checked_add_signed(Duration::minutes(i64::from(self.duration_minutes)))
            .unwrap_or(NaiveDateTime::MAX)
    }

    /// `HH:MM` label used on the wire.
    pub fn label(&self) -> String {
        self.start_time.format(SLOT_TIME_FORMAT).to_string()
    }
}

/// Generates the ordered slots of `date` for `doctor_id`.
///
/// Produces `ceil((work_end - work_start) / granularity)` slots starting at the window start.
/// When the window is not a multiple of the granularity the last slot runs past `work_end`.
pub fn generate_day_slots(
    doctor_id: RecordId,
    date: NaiveDate,
    policy: &SlotPolicy,
) -> Vec<AppointmentSlot> {
    let (window_start, _) = policy.window_on(date);
    (0..policy.slots_per_day())
        .map(|index| {
            let start =
                window_start + Duration::minutes(i64::from(policy.granularity_minutes) * index as i64);
            AppointmentSlot {
                doctor_id,
                date,
                start_time: start.time(),
                duration_minutes: policy.granularity_minutes,
            }
        })
        .collect()
}

/// Half-open interval overlap: `[a_start, a_end)` and `[b_start, b_end)` overlap iff
/// `a_start < b_end && b_start < a_end`.
pub fn overlaps(
    a_start: NaiveDateTime,
    a_end: NaiveDateTime,
    b_start: NaiveDateTime,
    b_end: NaiveDateTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 15).unwrap()
    }

    #[test]
    fn default_policy_yields_sixteen_half_hour_slots() {
        let doctor = RecordId::new();
        let slots = generate_day_slots(doctor, date(), &SlotPolicy::default());

        assert_eq!(slots.len(), 16);
        assert_eq!(slots[0].label(), "09:00");
        assert_eq!(slots[1].label(), "09:30");
        assert_eq!(slots[15].label(), "16:30");
        assert!(slots.iter().all(|s| s.duration_minutes == 30));
    }

    #[test]
    fn generation_is_deterministic() {
        let doctor = RecordId::new();
        let policy = SlotPolicy::default();
        assert_eq!(
            generate_day_slots(doctor, date(), &policy),
            generate_day_slots(doctor, date(), &policy)
        );
    }

    #[test]
    fn uneven_window_rounds_slot_count_up() {
        let policy = SlotPolicy::new(hm(9, 0), hm(10, 10), 30).unwrap();
        let slots = generate_day_slots(RecordId::new(), date(), &policy);

        assert_eq!(slots.len(), 3);
        assert_eq!(slots[2].label(), "10:00");
        assert_eq!(slots[2].end(), date().and_time(hm(10, 30)));
    }

    #[test]
    fn policy_rejects_inverted_window_and_zero_granularity() {
        assert!(SlotPolicy::new(hm(17, 0), hm(9, 0), 30).is_err());
        assert!(SlotPolicy::new(hm(9, 0), hm(9, 0), 30).is_err());
        assert!(SlotPolicy::new(hm(9, 0), hm(17, 0), 0).is_err());
    }

    #[test]
    fn grid_alignment_is_anchored_at_window_start() {
        let policy = SlotPolicy::new(hm(9, 15), hm(12, 0), 30).unwrap();
        assert!(policy.is_on_grid(date().and_time(hm(9, 45))));
        assert!(!policy.is_on_grid(date().and_time(hm(10, 0))));
        assert!(!policy.is_on_grid(date().and_time(hm(8, 45))));
    }

    #[test]
    fn slot_end_clamps_at_the_last_instant() {
        let slot = AppointmentSlot {
            doctor_id: RecordId::new(),
            date: NaiveDate::MAX,
            start_time: hm(23, 45),
            duration_minutes: 30,
        };
        assert_eq!(slot.end(), NaiveDateTime::MAX);
    }

    #[test]
    fn overlap_is_half_open() {
        let d = date();
        let at = |h, m| d.and_time(hm(h, m));
        assert!(overlaps(at(10, 0), at(10, 30), at(10, 15), at(10, 45)));
        assert!(!overlaps(at(10, 0), at(10, 30), at(10, 30), at(11, 0)));
        assert!(!overlaps(at(10, 30), at(11, 0), at(10, 0), at(10, 30)));
        assert!(overlaps(at(9, 0), at(12, 0), at(10, 0), at(10, 30)));
    }
}
