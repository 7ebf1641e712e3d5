use std::collections::HashSet;

use crate::model::BookingId;

/// Per-invocation record of bookings already allocated and already written
/// to the document store. Callers own it, so two runs in one process can
/// share a ledger or start fresh.
#[derive(Debug, Default, Clone)]
pub struct RunLedger {
    allocated: HashSet<BookingId>,
    stored: HashSet<BookingId>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_allocated(&self, booking_id: BookingId) -> bool {
        self.allocated.contains(&booking_id)
    }

    /// Returns false if the booking was already marked.
    pub fn mark_allocated(&mut self, booking_id: BookingId) -> bool {
        self.allocated.insert(booking_id)
    }

    pub fn is_stored(&self, booking_id: BookingId) -> bool {
        self.stored.contains(&booking_id)
    }

    pub fn mark_stored(&mut self, booking_id: BookingId) -> bool {
        self.stored.insert(booking_id)
    }

    pub fn allocated_count(&self) -> usize {
        self.allocated.len()
    }

    pub fn stored_count(&self) -> usize {
        self.stored.len()
    }
}
