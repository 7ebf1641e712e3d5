use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::limits::MAX_WEEKS_PER_WINDOW;

/// Externally assigned booking identity.
pub type BookingId = u64;

/// Campsite identity, stable for the process lifetime.
pub type SiteNumber = u32;

/// Campground (tenant) identity.
pub type CampgroundId = u64;

/// Days in one rental week.
pub const WEEK_DAYS: u64 = 7;

/// Half-open date interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Span {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A rental window made of whole weeks starting on the week-start day.
///
/// Only `calendar` builds windows from raw dates; the start is assumed to be
/// already anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    /// `weeks` consecutive weeks from `start`, clamped to
    /// `1..=MAX_WEEKS_PER_WINDOW`. `None` past the end of the calendar.
    pub fn weeks(start: NaiveDate, weeks: u32) -> Option<Self> {
        let weeks = weeks.clamp(1, MAX_WEEKS_PER_WINDOW);
        let end = start.checked_add_days(Days::new(WEEK_DAYS * u64::from(weeks)))?;
        Some(Self { start, end })
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    /// Successive 7-day slices from `start`. A trailing partial week is
    /// clamped to `end`.
    pub fn slices(&self) -> impl Iterator<Item = Span> + '_ {
        let mut cursor = Some(self.start);
        std::iter::from_fn(move || {
            let start = cursor.filter(|s| *s < self.end)?;
            let end = start
                .checked_add_days(Days::new(WEEK_DAYS))
                .map_or(self.end, |e| e.min(self.end));
            cursor = Some(end);
            Some(Span::new(start, end))
        })
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Campsite size tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SizeTier {
    Small,
    Medium,
    Large,
}

impl SizeTier {
    pub const ALL: [SizeTier; 3] = [SizeTier::Small, SizeTier::Medium, SizeTier::Large];

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeTier::Small => "Small",
            SizeTier::Medium => "Medium",
            SizeTier::Large => "Large",
        }
    }
}

impl fmt::Display for SizeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(SizeTier::Small),
            "medium" => Ok(SizeTier::Medium),
            "large" => Ok(SizeTier::Large),
            other => Err(format!("unknown size tier {other:?} (expected Small, Medium or Large)")),
        }
    }
}

/// One occupied interval on a unit, tagged with the booking that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub booking_id: BookingId,
    pub span: Span,
}

/// A rentable campsite.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub site: SiteNumber,
    pub tier: SizeTier,
    /// Nightly rate, fixed per tier.
    pub rate: Decimal,
    /// Reservations sorted by `span.start`, pairwise non-overlapping.
    pub occupancy: Vec<Reservation>,
}

impl Unit {
    pub fn new(site: SiteNumber, tier: SizeTier, rate: Decimal) -> Self {
        Self {
            site,
            tier,
            rate,
            occupancy: Vec::new(),
        }
    }

    /// Insert a reservation maintaining sort order by span.start.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .occupancy
            .binary_search_by_key(&reservation.span.start, |r| r.span.start)
            .unwrap_or_else(|e| e);
        self.occupancy.insert(pos, reservation);
    }

    /// Return only reservations whose span overlaps the query.
    /// Uses binary search to skip reservations starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .occupancy
            .partition_point(|r| r.span.start < query.end);
        self.occupancy[..right_bound]
            .iter()
            .filter(move |r| r.span.end > query.start)
    }

    /// True when no two reservations overlap.
    pub fn occupancy_is_disjoint(&self) -> bool {
        self.occupancy
            .windows(2)
            .all(|pair| pair[0].span.end <= pair[1].span.start)
    }
}

/// Why a booking ended without confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Failure {
    /// Malformed booking input.
    Validation,
    /// No unit free for the window.
    NoCapacity,
    /// Allocated in memory, but a downstream store or the artifact failed.
    WriteError,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Failure::Validation => "Failed:Validation",
            Failure::NoCapacity => "Failed:NoCapacity",
            Failure::WriteError => "Failed:WriteError",
        })
    }
}

/// Booking lifecycle. Moves strictly forward:
/// `Pending -> Allocated -> Confirmed`, `Pending -> Failed(Validation | NoCapacity)`,
/// `Allocated -> Failed(WriteError)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    #[default]
    Pending,
    Allocated,
    Confirmed,
    Failed(Failure),
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Failed(_))
    }

    pub fn can_advance_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Allocated)
                | (Pending, Failed(Failure::Validation))
                | (Pending, Failed(Failure::NoCapacity))
                | (Allocated, Confirmed)
                | (Allocated, Failed(Failure::WriteError))
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Pending => f.write_str("Pending"),
            BookingStatus::Allocated => f.write_str("Allocated"),
            BookingStatus::Confirmed => f.write_str("Confirmed"),
            BookingStatus::Failed(kind) => kind.fmt(f),
        }
    }
}

/// Raw booking row as exported by the registry of record. Dates stay as
/// strings until the calendar validates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub booking_id: BookingId,
    pub customer_id: u64,
    #[serde(default)]
    pub customer_name: Option<String>,
    pub booking_date: String,
    pub arrival_date: String,
    pub campground_id: CampgroundId,
    pub campsite_size: SizeTier,
    pub num_campsites: u32,
}

/// A booking moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: BookingId,
    pub customer_id: u64,
    pub customer_name: Option<String>,
    pub booked_on: String,
    pub arrival: String,
    pub campground_id: CampgroundId,
    pub requested_tier: SizeTier,
    pub unit_count: u32,
    pub allocated_site: Option<SiteNumber>,
    pub allocated_tier: Option<SizeTier>,
    pub total_cost: Decimal,
    pub status: BookingStatus,
    /// Set when the source row could not be read; the booking then fails
    /// validation before allocation.
    #[serde(skip)]
    pub defect: Option<ValidationError>,
}

impl Booking {
    /// A row with a readable id but unreadable fields. Everything but the
    /// id is a placeholder.
    pub fn malformed(booking_id: BookingId, defect: ValidationError) -> Self {
        Self {
            booking_id,
            customer_id: 0,
            customer_name: None,
            booked_on: String::new(),
            arrival: String::new(),
            campground_id: 0,
            requested_tier: SizeTier::Small,
            unit_count: 0,
            allocated_site: None,
            allocated_tier: None,
            total_cost: Decimal::ZERO,
            status: BookingStatus::Pending,
            defect: Some(defect),
        }
    }

    /// Move to `next` if the lifecycle allows it. Returns false (and leaves
    /// the booking untouched) otherwise.
    pub fn advance(&mut self, next: BookingStatus) -> bool {
        if self.status.can_advance_to(next) {
            self.status = next;
            true
        } else {
            tracing::debug!(
                "booking {} refused transition {} -> {}",
                self.booking_id,
                self.status,
                next
            );
            false
        }
    }

    /// Record the allocated unit and its cost; moves `Pending -> Allocated`.
    pub fn assign(&mut self, unit: &Unit, total_cost: Decimal) -> bool {
        if !self.advance(BookingStatus::Allocated) {
            return false;
        }
        self.allocated_site = Some(unit.site);
        self.allocated_tier = Some(unit.tier);
        self.total_cost = total_cost;
        true
    }
}

impl From<BookingRecord> for Booking {
    fn from(r: BookingRecord) -> Self {
        Self {
            booking_id: r.booking_id,
            customer_id: r.customer_id,
            customer_name: r.customer_name,
            booked_on: r.booking_date,
            arrival: r.arrival_date,
            campground_id: r.campground_id,
            requested_tier: r.campsite_size,
            unit_count: r.num_campsites,
            allocated_site: None,
            allocated_tier: None,
            total_cost: Decimal::ZERO,
            status: BookingStatus::Pending,
            defect: None,
        }
    }
}

/// Occupancy journal record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Reserved {
        booking_id: BookingId,
        site: SiteNumber,
        span: Span,
    },
    /// The booking moved to another window and gave this one up.
    Released {
        booking_id: BookingId,
        site: SiteNumber,
        span: Span,
    },
}
