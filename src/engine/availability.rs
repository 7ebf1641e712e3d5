use crate::model::*;

// ── Availability check ────────────────────────────────────────────

/// First existing reservation on `unit` that overlaps any 7-day slice of
/// `window`. Overlap is the open-interval test
/// `existing.start < slice.end && slice.start < existing.end`.
pub fn first_conflict<'a>(unit: &'a Unit, window: &Window) -> Option<&'a Reservation> {
    window
        .slices()
        .find_map(|slice| unit.overlapping(&slice).next())
}

/// True when no reservation on `unit` overlaps any slice of `window`.
pub fn is_available(unit: &Unit, window: &Window) -> bool {
    first_conflict(unit, window).is_none()
}
