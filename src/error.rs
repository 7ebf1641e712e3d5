use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::BookingId;

/// Malformed booking input. Local to one booking; never aborts a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} {value:?}: expected {expected}")]
    MalformedDate {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{field} {value} outside supported years {min}..={max}")]
    DateOutOfRange {
        field: &'static str,
        value: NaiveDate,
        min: i32,
        max: i32,
    },
    #[error("booking date {booked_on} is after arrival date {arrival}")]
    BookedAfterArrival {
        booked_on: NaiveDate,
        arrival: NaiveDate,
    },
    #[error("num_campsites {value} outside 1..={max}")]
    UnitCount { value: u32, max: u32 },
    #[error("customer_name is {len} bytes, limit {max}")]
    NameTooLong { len: usize, max: usize },
    #[error("unknown campsite_size {value:?}: expected Small, Medium or Large")]
    UnknownTier { value: String },
    #[error("malformed booking row: {reason}")]
    MalformedRow { reason: String },
}

/// A downstream store rejected or failed a write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("{store}: {message}")]
    Io { store: &'static str, message: String },
    #[error("{store}: timed out after {after:?}")]
    Timeout { store: &'static str, after: Duration },
    #[error("{store}: booking {booking_id} rejected: {reason}")]
    Rejected {
        store: &'static str,
        booking_id: BookingId,
        reason: String,
    },
}

impl WriteError {
    pub fn io(store: &'static str, err: impl std::fmt::Display) -> Self {
        WriteError::Io {
            store,
            message: err.to_string(),
        }
    }

    pub fn store(&self) -> &'static str {
        match self {
            WriteError::Io { store, .. }
            | WriteError::Timeout { store, .. }
            | WriteError::Rejected { store, .. } => store,
        }
    }
}

/// Confirmation artifact generation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("confirmation i/o: {0}")]
    Io(String),
    #[error("confirmation timed out after {0:?}")]
    Timeout(Duration),
    #[error("booking {0} has no allocated site to confirm")]
    Unallocated(BookingId),
}

/// A daily summary that must not be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummaryError {
    #[error("total_sales must not be negative, got {0}")]
    NegativeSales(Decimal),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_names_value_and_format() {
        let err = ValidationError::MalformedDate {
            field: "arrival_date",
            value: "2024-13-45".into(),
            expected: "YYYY-MM-DD",
        };
        let msg = err.to_string();
        assert!(msg.contains("arrival_date"));
        assert!(msg.contains("2024-13-45"));
        assert!(msg.contains("YYYY-MM-DD"));
    }

    #[test]
    fn write_error_reports_store() {
        let err = WriteError::io("documents", "disk full");
        assert_eq!(err.store(), "documents");
        assert_eq!(err.to_string(), "documents: disk full");
    }
}
