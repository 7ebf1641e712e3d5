pub mod fs;
pub mod memory;

use std::fmt::Write as _;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, WriteError};
use crate::model::*;
use crate::report::DailySummary;

/// Positive acknowledgement from a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

/// Where a rendered confirmation ended up (a path or URI).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactHandle(pub String);

impl std::fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authoritative store of booking ownership. Calls are update-by-key, so
/// repeating one with the same arguments is harmless.
#[async_trait]
pub trait SystemOfRecord: Send + Sync {
    async fn record_allocation(
        &self,
        booking_id: BookingId,
        campground_id: CampgroundId,
    ) -> Result<Ack, WriteError>;

    /// Upsert the day's sales summary, keyed by campground and date.
    async fn record_summary(&self, summary: &DailySummary) -> Result<Ack, WriteError>;
}

/// Durable, queryable booking documents. `insert` never overwrites: callers
/// check `exists` first.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn exists(&self, booking_id: BookingId) -> Result<bool, WriteError>;
    async fn insert(&self, document: &BookingDocument) -> Result<Ack, WriteError>;
    async fn find(&self, lookup: &Lookup) -> Result<Vec<BookingDocument>, WriteError>;
}

/// Produces the customer-facing confirmation. Output depends only on the
/// booking's field values.
#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    async fn render(&self, booking: &Booking, window: &Window) -> Result<ArtifactHandle, RenderError>;
}

/// Where reserved occupancy lives between runs.
#[async_trait]
pub trait OccupancyStore: Send + Sync {
    async fn load(&self) -> Result<Vec<Event>, WriteError>;
    async fn record(&self, event: &Event) -> Result<Ack, WriteError>;
}

/// Occupancy forgotten at process exit: every run starts from a fresh seed.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ephemeral;

#[async_trait]
impl OccupancyStore for Ephemeral {
    async fn load(&self) -> Result<Vec<Event>, WriteError> {
        Ok(Vec::new())
    }

    async fn record(&self, _event: &Event) -> Result<Ack, WriteError> {
        Ok(Ack)
    }
}

/// Booking as stored in the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingDocument {
    pub booking_id: BookingId,
    pub customer_id: u64,
    #[serde(default)]
    pub customer_name: Option<String>,
    pub booking_date: String,
    pub arrival_date: String,
    #[serde(default)]
    pub window: Option<Window>,
    pub campground_id: CampgroundId,
    pub campsite_size: SizeTier,
    #[serde(default)]
    pub allocated_site: Option<SiteNumber>,
    #[serde(default)]
    pub allocated_size: Option<SizeTier>,
    pub num_campsites: u32,
    pub total_cost: Decimal,
    pub status: BookingStatus,
    #[serde(default)]
    pub confirmation: Option<ArtifactHandle>,
}

impl BookingDocument {
    pub fn from_booking(
        booking: &Booking,
        window: Option<Window>,
        campground_id: CampgroundId,
        confirmation: Option<ArtifactHandle>,
    ) -> Self {
        Self {
            booking_id: booking.booking_id,
            customer_id: booking.customer_id,
            customer_name: booking.customer_name.clone(),
            booking_date: booking.booked_on.clone(),
            arrival_date: booking.arrival.clone(),
            window,
            campground_id,
            campsite_size: booking.requested_tier,
            allocated_site: booking.allocated_site,
            allocated_size: booking.allocated_tier,
            num_campsites: booking.unit_count,
            total_cost: booking.total_cost,
            status: booking.status,
            confirmation,
        }
    }
}

impl From<BookingDocument> for Booking {
    fn from(doc: BookingDocument) -> Self {
        Self {
            booking_id: doc.booking_id,
            customer_id: doc.customer_id,
            customer_name: doc.customer_name,
            booked_on: doc.booking_date,
            arrival: doc.arrival_date,
            campground_id: doc.campground_id,
            requested_tier: doc.campsite_size,
            unit_count: doc.num_campsites,
            allocated_site: doc.allocated_site,
            allocated_tier: doc.allocated_size,
            total_cost: doc.total_cost,
            status: doc.status,
            defect: None,
        }
    }
}

/// Document search: all-digit identifiers are booking ids, anything else
/// is a case-insensitive customer-name substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    BookingId(BookingId),
    CustomerName(String),
}

impl Lookup {
    pub fn parse(identifier: &str) -> Option<Self> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return None;
        }
        if identifier.bytes().all(|b| b.is_ascii_digit())
            && let Ok(id) = identifier.parse()
        {
            return Some(Lookup::BookingId(id));
        }
        Some(Lookup::CustomerName(identifier.to_lowercase()))
    }

    pub fn matches(&self, document: &BookingDocument) -> bool {
        match self {
            Lookup::BookingId(id) => document.booking_id == *id,
            Lookup::CustomerName(needle) => document
                .customer_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(needle.as_str())),
        }
    }
}

/// Plain-text confirmation body. Deterministic in the booking's fields.
pub fn confirmation_text(booking: &Booking, window: &Window) -> Result<String, RenderError> {
    let site = booking
        .allocated_site
        .ok_or(RenderError::Unallocated(booking.booking_id))?;
    let customer = booking
        .customer_name
        .clone()
        .unwrap_or_else(|| format!("Customer {}", booking.customer_id));

    let mut out = String::new();
    let _ = writeln!(out, "Booking Confirmation - {customer}");
    let _ = writeln!(out);
    let _ = writeln!(out, "Booking ID: {}", booking.booking_id);
    let _ = writeln!(out, "Customer: {customer}");
    let _ = writeln!(out, "Arrival Date: {}", booking.arrival);
    let _ = writeln!(out, "Stay: {window}");
    let _ = writeln!(out, "Campsite Size: {}", booking.requested_tier);
    let _ = writeln!(out, "Campsite: {site}");
    let _ = writeln!(out, "Total Sites Booked: {}", booking.unit_count);
    let _ = writeln!(out, "Total Cost: ${:.2}", booking.total_cost);
    Ok(out)
}
