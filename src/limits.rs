/// Earliest calendar year accepted for booking dates.
pub const MIN_YEAR: i32 = 1;

/// Latest calendar year accepted for booking dates. Keeps every window
/// (arrival + 6 days + `MAX_WEEKS_PER_WINDOW` weeks) inside chrono's range.
pub const MAX_YEAR: i32 = 9999;

/// Upper bound on campsites a single booking may request.
pub const MAX_UNITS_PER_BOOKING: u32 = 64;

/// Upper bound on consecutive weeks in one window.
pub const MAX_WEEKS_PER_WINDOW: u32 = 52;

/// Upper bound on bookings accepted in a single run.
pub const MAX_BATCH_SIZE: usize = 100_000;

/// Upper bound on units a seed may produce.
pub const MAX_UNITS: usize = 10_000;

/// Upper bound on customer-name length carried into documents.
pub const MAX_NAME_LEN: usize = 256;

/// Upper bound on one encoded journal event. A longer length prefix is
/// treated as a corrupt tail.
pub const MAX_EVENT_BYTES: usize = 4096;
