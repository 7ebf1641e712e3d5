use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::error::ValidationError;
use crate::limits::MAX_BATCH_SIZE;
use crate::model::{Booking, BookingRecord, SizeTier};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} is not a JSON array of bookings: {source}")]
    Format {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{count} bookings exceeds the batch limit of {max}")]
    TooLarge { count: usize, max: usize },
}

/// Parse an export. One bad row never sinks the batch: a row that does not
/// deserialize but has a readable `booking_id` becomes a booking that fails
/// validation in the pipeline. Rows without one are logged and dropped.
pub fn parse_bookings(path: &Path, bytes: &[u8]) -> Result<Vec<Booking>, SourceError> {
    let rows: Vec<Value> =
        serde_json::from_slice(bytes).map_err(|source| SourceError::Format {
            path: path.to_path_buf(),
            source,
        })?;
    if rows.len() > MAX_BATCH_SIZE {
        return Err(SourceError::TooLarge {
            count: rows.len(),
            max: MAX_BATCH_SIZE,
        });
    }

    let mut bookings = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        match BookingRecord::deserialize(&row) {
            Ok(record) => bookings.push(Booking::from(record)),
            Err(e) => match row.get("booking_id").and_then(Value::as_u64) {
                Some(booking_id) => {
                    let defect = row_defect(&row, &e);
                    warn!("{}: row {i} (booking {booking_id}): {defect}", path.display());
                    bookings.push(Booking::malformed(booking_id, defect));
                }
                None => error!("{}: row {i} has no usable booking_id, skipped: {e}", path.display()),
            },
        }
    }
    Ok(bookings)
}

fn row_defect(row: &Value, err: &serde_json::Error) -> ValidationError {
    if let Some(raw) = row.get("campsite_size").and_then(Value::as_str)
        && raw.parse::<SizeTier>().is_err()
    {
        return ValidationError::UnknownTier {
            value: raw.to_string(),
        };
    }
    ValidationError::MalformedRow {
        reason: err.to_string(),
    }
}

pub async fn load_bookings(path: &Path) -> Result<Vec<Booking>, SourceError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let bookings = parse_bookings(path, &bytes)?;
    info!("loaded {} bookings from {}", bookings.len(), path.display());
    Ok(bookings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::window_for_booking;

    fn parse(json: &str) -> Result<Vec<Booking>, SourceError> {
        parse_bookings(Path::new("bookings.json"), json.as_bytes())
    }

    #[test]
    fn bad_rows_with_an_id_are_kept_for_validation() {
        let bookings = parse(
            r#"[
                {"booking_id":1,"customer_id":10,"customer_name":"Ada","booking_date":"2024-09-01",
                 "arrival_date":"2024-09-04","campground_id":1121132,"campsite_size":"Large","num_campsites":1},
                {"booking_id":"two"},
                {"booking_id":3,"customer_id":30,"booking_date":"2024-09-01",
                 "arrival_date":"not-a-date","campground_id":1121132,"campsite_size":"Small","num_campsites":2},
                {"booking_id":5,"customer_id":50,"booking_date":"2024-09-01",
                 "arrival_date":"2024-09-04","campground_id":1121132,"campsite_size":"Huge","num_campsites":1},
                {"booking_id":6,"booking_date":"2024-09-01",
                 "arrival_date":"2024-09-04","campground_id":1121132,"campsite_size":"Small","num_campsites":1}
            ]"#,
        )
        .unwrap();
        let ids: Vec<_> = bookings.iter().map(|b| b.booking_id).collect();
        assert_eq!(ids, vec![1, 3, 5, 6]);
        assert_eq!(bookings[0].requested_tier, SizeTier::Large);
        assert_eq!(bookings[0].defect, None);
        // Bad dates survive loading; the pipeline rejects them per booking.
        assert_eq!(bookings[1].arrival, "not-a-date");

        assert_eq!(
            window_for_booking(&bookings[2]),
            Err(ValidationError::UnknownTier { value: "Huge".into() })
        );
        assert!(matches!(
            window_for_booking(&bookings[3]),
            Err(ValidationError::MalformedRow { .. })
        ));
    }

    #[test]
    fn non_array_is_a_format_error() {
        assert!(matches!(parse(r#"{"booking_id":1}"#), Err(SourceError::Format { .. })));
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let path = std::env::temp_dir().join(format!("campsync_missing_{}.json", ulid::Ulid::new()));
        assert!(matches!(load_bookings(&path).await, Err(SourceError::Read { .. })));
    }
}
