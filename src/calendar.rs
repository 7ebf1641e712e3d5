use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::error::ValidationError;
use crate::limits::*;
use crate::model::{Booking, Window};

/// Rental weeks start on Saturday.
pub const WEEK_START: Weekday = Weekday::Sat;

/// Accepted input format for booking dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const DATE_FORMAT_HUMAN: &str = "YYYY-MM-DD";

/// Parse a booking date, naming `field` in the error.
pub fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, ValidationError> {
    let date = NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| {
        ValidationError::MalformedDate {
            field,
            value: raw.to_string(),
            expected: DATE_FORMAT_HUMAN,
        }
    })?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        return Err(ValidationError::DateOutOfRange {
            field,
            value: date,
            min: MIN_YEAR,
            max: MAX_YEAR,
        });
    }
    Ok(date)
}

/// Days from `date` forward to the next week-start day (0 if already on it).
fn days_until_week_start(date: NaiveDate) -> u64 {
    let target = WEEK_START.num_days_from_monday();
    let current = date.weekday().num_days_from_monday();
    u64::from((7 + target - current) % 7)
}

/// The week-start day on or after `date`. Idempotent; never moves more than
/// six days forward.
///
/// Total over every date `parse_date` accepts. Saturates at the last
/// representable week-start day for dates chrono cannot advance.
pub fn adjust_to_week_start(date: NaiveDate) -> NaiveDate {
    match date.checked_add_days(Days::new(days_until_week_start(date))) {
        Some(d) => d,
        None => last_week_start(),
    }
}

fn last_week_start() -> NaiveDate {
    let max = NaiveDate::MAX;
    let back = (7 + max.weekday().num_days_from_monday() - WEEK_START.num_days_from_monday()) % 7;
    max - Days::new(u64::from(back))
}

/// One-week window anchored at the week-start day on or after `date`.
pub fn canonical_window(date: NaiveDate) -> Window {
    let start = adjust_to_week_start(date);
    match Window::weeks(start, 1) {
        Some(w) => w,
        // Only reachable at the very end of chrono's calendar.
        None => Window {
            start: start - Days::new(7),
            end: start,
        },
    }
}

/// Validate a booking's raw fields and derive its canonical window.
pub fn window_for_booking(booking: &Booking) -> Result<Window, ValidationError> {
    if let Some(defect) = &booking.defect {
        return Err(defect.clone());
    }
    let booked_on = parse_date("booking_date", &booking.booked_on)?;
    let arrival = parse_date("arrival_date", &booking.arrival)?;
    if booked_on > arrival {
        return Err(ValidationError::BookedAfterArrival { booked_on, arrival });
    }
    if booking.unit_count == 0 || booking.unit_count > MAX_UNITS_PER_BOOKING {
        return Err(ValidationError::UnitCount {
            value: booking.unit_count,
            max: MAX_UNITS_PER_BOOKING,
        });
    }
    if let Some(name) = &booking.customer_name
        && name.len() > MAX_NAME_LEN
    {
        return Err(ValidationError::NameTooLong {
            len: name.len(),
            max: MAX_NAME_LEN,
        });
    }
    Ok(canonical_window(arrival))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookingRecord, SizeTier};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn booking(booked: &str, arrival: &str, units: u32) -> Booking {
        Booking::from(BookingRecord {
            booking_id: 1,
            customer_id: 1,
            customer_name: None,
            booking_date: booked.into(),
            arrival_date: arrival.into(),
            campground_id: 1,
            campsite_size: SizeTier::Small,
            num_campsites: units,
        })
    }

    #[test]
    fn saturday_is_unchanged() {
        // 2024-09-07 is a Saturday
        assert_eq!(adjust_to_week_start(d(2024, 9, 7)), d(2024, 9, 7));
    }

    #[test]
    fn weekdays_advance_to_next_saturday() {
        assert_eq!(adjust_to_week_start(d(2024, 9, 8)), d(2024, 9, 14)); // Sunday
        assert_eq!(adjust_to_week_start(d(2024, 9, 4)), d(2024, 9, 7)); // Wednesday
        assert_eq!(adjust_to_week_start(d(2024, 9, 13)), d(2024, 9, 14)); // Friday
    }

    #[test]
    fn adjust_is_idempotent_forward_and_within_six_days() {
        let mut date = d(2023, 12, 20);
        for _ in 0..800 {
            let adjusted = adjust_to_week_start(date);
            assert_eq!(adjusted.weekday(), WEEK_START);
            assert_eq!(adjust_to_week_start(adjusted), adjusted);
            let ahead = (adjusted - date).num_days();
            assert!((0..=6).contains(&ahead), "{date} moved {ahead} days");
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn adjust_is_total_at_calendar_edges() {
        assert_eq!(adjust_to_week_start(NaiveDate::MIN).weekday(), WEEK_START);
        let last = adjust_to_week_start(NaiveDate::MAX);
        assert_eq!(last.weekday(), WEEK_START);
        assert_eq!(adjust_to_week_start(last), last);
    }

    #[test]
    fn canonical_window_is_one_week() {
        let w = canonical_window(d(2024, 9, 4));
        assert_eq!(w.start, d(2024, 9, 7));
        assert_eq!(w.end, d(2024, 9, 14));
    }

    #[test]
    fn bookings_three_days_apart_share_a_window() {
        assert_eq!(canonical_window(d(2024, 9, 1)), canonical_window(d(2024, 9, 4)));
    }

    #[test]
    fn malformed_date_names_value_and_format() {
        let err = parse_date("arrival_date", "07/09/2024").unwrap_err();
        match err {
            ValidationError::MalformedDate { field, value, expected } => {
                assert_eq!(field, "arrival_date");
                assert_eq!(value, "07/09/2024");
                assert_eq!(expected, "YYYY-MM-DD");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn impossible_calendar_date_rejected() {
        assert!(parse_date("arrival_date", "2024-02-30").is_err());
    }

    #[test]
    fn window_for_booking_validates_all_fields() {
        assert!(window_for_booking(&booking("2024-09-01", "2024-09-04", 1)).is_ok());
        assert!(matches!(
            window_for_booking(&booking("2024-09-10", "2024-09-04", 1)),
            Err(ValidationError::BookedAfterArrival { .. })
        ));
        assert!(matches!(
            window_for_booking(&booking("2024-09-01", "2024-09-04", 0)),
            Err(ValidationError::UnitCount { value: 0, .. })
        ));
        assert!(matches!(
            window_for_booking(&booking("2024-09-01", "not a date", 1)),
            Err(ValidationError::MalformedDate { field: "arrival_date", .. })
        ));
    }

    #[test]
    fn same_day_booking_is_valid() {
        let w = window_for_booking(&booking("2024-09-07", "2024-09-07", 1)).unwrap();
        assert_eq!(w.start, d(2024, 9, 7));
    }
}
