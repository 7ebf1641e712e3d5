use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::{DashMap, DashSet};
use tokio::sync::Mutex;

use crate::error::{RenderError, WriteError};
use crate::model::*;
use crate::report::DailySummary;

use super::*;

/// In-memory system of record. Bookings listed with `fail_for` get a `WriteError`.
#[derive(Default)]
pub struct MemorySystemOfRecord {
    allocations: DashMap<BookingId, CampgroundId>,
    summaries: DashMap<(CampgroundId, NaiveDate), DailySummary>,
    failing: DashSet<BookingId>,
    calls: AtomicUsize,
}

impl MemorySystemOfRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, booking_id: BookingId) {
        self.failing.insert(booking_id);
    }

    pub fn campground_of(&self, booking_id: BookingId) -> Option<CampgroundId> {
        self.allocations.get(&booking_id).map(|e| *e.value())
    }

    pub fn allocation_count(&self) -> usize {
        self.allocations.len()
    }

    pub fn summary(&self, campground_id: CampgroundId, date: NaiveDate) -> Option<DailySummary> {
        self.summaries.get(&(campground_id, date)).map(|e| e.value().clone())
    }

    /// Total `record_allocation` calls, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SystemOfRecord for MemorySystemOfRecord {
    async fn record_allocation(
        &self,
        booking_id: BookingId,
        campground_id: CampgroundId,
    ) -> Result<Ack, WriteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&booking_id) {
            return Err(WriteError::io("system of record", "connection reset"));
        }
        self.allocations.insert(booking_id, campground_id);
        Ok(Ack)
    }

    async fn record_summary(&self, summary: &DailySummary) -> Result<Ack, WriteError> {
        self.summaries
            .insert((summary.campground_id, summary.summary_date), summary.clone());
        Ok(Ack)
    }
}

/// In-memory document store with insert counting, per-booking failures and
/// an optional artificial latency.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: DashMap<BookingId, BookingDocument>,
    failing: DashSet<BookingId>,
    inserts: AtomicUsize,
    latency: Option<Duration>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn fail_for(&self, booking_id: BookingId) {
        self.failing.insert(booking_id);
    }

    pub fn recover(&self, booking_id: BookingId) {
        self.failing.remove(&booking_id);
    }

    pub fn get(&self, booking_id: BookingId) -> Option<BookingDocument> {
        self.documents.get(&booking_id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Successful `insert` calls.
    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn exists(&self, booking_id: BookingId) -> Result<bool, WriteError> {
        Ok(self.documents.contains_key(&booking_id))
    }

    async fn insert(&self, document: &BookingDocument) -> Result<Ack, WriteError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.contains(&document.booking_id) {
            return Err(WriteError::io("document store", "service unavailable"));
        }
        if self.documents.contains_key(&document.booking_id) {
            return Err(WriteError::Rejected {
                store: "document store",
                booking_id: document.booking_id,
                reason: "already exists".into(),
            });
        }
        self.documents.insert(document.booking_id, document.clone());
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(Ack)
    }

    async fn find(&self, lookup: &Lookup) -> Result<Vec<BookingDocument>, WriteError> {
        let mut found: Vec<_> = self
            .documents
            .iter()
            .filter(|e| lookup.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|d| d.booking_id);
        Ok(found)
    }
}

/// Renders confirmations into memory.
#[derive(Default)]
pub struct MemoryArtifacts {
    rendered: DashMap<BookingId, String>,
    failing: DashSet<BookingId>,
}

impl MemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, booking_id: BookingId) {
        self.failing.insert(booking_id);
    }

    pub fn get(&self, booking_id: BookingId) -> Option<String> {
        self.rendered.get(&booking_id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.rendered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty()
    }
}

#[async_trait]
impl ArtifactGenerator for MemoryArtifacts {
    async fn render(&self, booking: &Booking, window: &Window) -> Result<ArtifactHandle, RenderError> {
        if self.failing.contains(&booking.booking_id) {
            return Err(RenderError::Io("font cache missing".into()));
        }
        let text = confirmation_text(booking, window)?;
        self.rendered.insert(booking.booking_id, text);
        Ok(ArtifactHandle(format!("memory://confirmations/{}", booking.booking_id)))
    }
}

/// Occupancy kept in memory across runs that share this value.
#[derive(Default)]
pub struct MemoryOccupancy {
    events: Mutex<Vec<Event>>,
}

impl MemoryOccupancy {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl OccupancyStore for MemoryOccupancy {
    async fn load(&self) -> Result<Vec<Event>, WriteError> {
        Ok(self.events.lock().await.clone())
    }

    async fn record(&self, event: &Event) -> Result<Ack, WriteError> {
        self.events.lock().await.push(event.clone());
        Ok(Ack)
    }
}
