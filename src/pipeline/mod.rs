mod ledger;

pub use ledger::RunLedger;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{StreamExt, stream};
use tracing::{error, info, warn};

use crate::calendar::window_for_booking;
use crate::engine::{self, AllocationPolicy, PricingPolicy};
use crate::error::{RenderError, ValidationError, WriteError};
use crate::inventory::{Inventory, UnitIdx};
use crate::model::*;
use crate::observability::{self, outcome_label};
use crate::ports::*;

/// What went wrong for one booking. A booking may collect several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    Validation(ValidationError),
    Write(WriteError),
    Render(RenderError),
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Problem::Validation(e) => e.fmt(f),
            Problem::Write(e) => e.fmt(f),
            Problem::Render(e) => e.fmt(f),
        }
    }
}

/// Terminal result for one input booking.
#[derive(Debug, Clone)]
pub struct BookingOutcome {
    pub booking: Booking,
    pub window: Option<Window>,
    pub unit: Option<UnitIdx>,
    /// Duplicate of a booking already handled this run; left `Pending` and
    /// excluded from totals.
    pub skipped: bool,
    /// The unit came from restored occupancy rather than a fresh `allocate`.
    pub restored: bool,
    /// The document store already held this booking; no insert was made.
    pub already_stored: bool,
    /// The document store holds this booking after the run.
    pub stored: bool,
    pub artifact: Option<ArtifactHandle>,
    pub problems: Vec<Problem>,
}

impl BookingOutcome {
    pub fn new(booking: Booking) -> Self {
        Self {
            booking,
            window: None,
            unit: None,
            skipped: false,
            restored: false,
            already_stored: false,
            stored: false,
            artifact: None,
            problems: Vec::new(),
        }
    }

    pub fn status(&self) -> BookingStatus {
        self.booking.status
    }
}

/// Per-run report, one outcome per input booking in input order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<BookingOutcome>,
}

impl RunReport {
    /// Outcomes that reached a terminal state (duplicates excluded).
    pub fn processed(&self) -> impl Iterator<Item = &BookingOutcome> {
        self.outcomes.iter().filter(|o| !o.skipped)
    }

    pub fn confirmed(&self) -> impl Iterator<Item = &BookingOutcome> {
        self.processed()
            .filter(|o| o.status() == BookingStatus::Confirmed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &BookingOutcome> {
        self.processed()
            .filter(|o| matches!(o.status(), BookingStatus::Failed(_)))
    }

    pub fn get(&self, booking_id: BookingId) -> Option<&BookingOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.booking.booking_id == booking_id && !o.skipped)
    }
}

/// The downstream stores a run writes through.
#[derive(Clone)]
pub struct Collaborators {
    pub system_of_record: Arc<dyn SystemOfRecord>,
    pub documents: Arc<dyn DocumentStore>,
    pub artifacts: Arc<dyn ArtifactGenerator>,
    pub occupancy: Arc<dyn OccupancyStore>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub campground_id: CampgroundId,
    pub allocation: AllocationPolicy,
    pub pricing: PricingPolicy,
    /// Bookings whose downstream writes may be in flight at once.
    pub write_concurrency: usize,
    /// Bound on each collaborator call.
    pub write_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            campground_id: 1121132,
            allocation: AllocationPolicy::default(),
            pricing: PricingPolicy::default(),
            write_concurrency: 1,
            write_timeout: Duration::from_secs(10),
        }
    }
}

pub struct SyncPipeline {
    collaborators: Collaborators,
    options: PipelineOptions,
}

impl SyncPipeline {
    pub fn new(collaborators: Collaborators, options: PipelineOptions) -> Self {
        Self {
            collaborators,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Drive every booking to exactly one terminal state (or a duplicate
    /// skip). Never fails as a whole: per-booking errors land in the report.
    pub async fn run(
        &self,
        bookings: Vec<Booking>,
        inventory: &mut Inventory,
        ledger: &mut RunLedger,
    ) -> RunReport {
        let started = Instant::now();
        info!(
            "sync run: {} bookings, {} units, allocation={}, pricing={}",
            bookings.len(),
            inventory.len(),
            self.options.allocation,
            self.options.pricing
        );

        // Allocation is order-dependent: strictly one booking at a time.
        let mut allocated = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let outcome = self.allocate_one(booking, inventory, ledger).await;
            allocated.push(outcome);
        }

        let stored: &RunLedger = ledger;
        let outcomes: Vec<BookingOutcome> = stream::iter(allocated)
            .map(|outcome| {
                let known = stored.is_stored(outcome.booking.booking_id);
                self.write_through(outcome, known)
            })
            .buffered(self.options.write_concurrency.max(1))
            .collect()
            .await;

        for outcome in &outcomes {
            if outcome.stored {
                ledger.mark_stored(outcome.booking.booking_id);
            }
            if !outcome.skipped {
                metrics::counter!(observability::BOOKINGS_TOTAL, "outcome" => outcome_label(&outcome.status()))
                    .increment(1);
            }
        }

        let report = RunReport { outcomes };
        metrics::histogram!(observability::RUN_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        info!(
            "sync run finished in {:?}: {} confirmed, {} failed, {} skipped",
            started.elapsed(),
            report.confirmed().count(),
            report.failed().count(),
            report.outcomes.iter().filter(|o| o.skipped).count()
        );
        report
    }

    /// Duplicate check, validation, allocation and pricing. Leaves
    /// successful bookings in `Allocated`.
    async fn allocate_one(
        &self,
        booking: Booking,
        inventory: &mut Inventory,
        ledger: &mut RunLedger,
    ) -> BookingOutcome {
        let mut outcome = BookingOutcome::new(booking);
        let booking_id = outcome.booking.booking_id;

        if ledger.is_allocated(booking_id) {
            info!("booking {booking_id} already handled this run, skipping duplicate");
            metrics::counter!(observability::DUPLICATES_TOTAL).increment(1);
            outcome.skipped = true;
            return outcome;
        }

        let window = match window_for_booking(&outcome.booking) {
            Ok(w) => w,
            Err(e) => {
                error!("booking {booking_id}: {e}");
                outcome.booking.advance(BookingStatus::Failed(Failure::Validation));
                outcome.problems.push(Problem::Validation(e));
                return outcome;
            }
        };
        outcome.window = Some(window);

        let started = Instant::now();
        let (idx, restored) = match inventory.reservation_for(booking_id) {
            Some((idx, span)) if span.start == window.start => (idx, true),
            found => {
                if found.is_some() {
                    self.release_stale(booking_id, &window, inventory, &mut outcome).await;
                }
                match engine::allocate(
                    inventory,
                    &window,
                    self.options.allocation,
                    outcome.booking.requested_tier,
                    booking_id,
                ) {
                    Some(idx) => (idx, false),
                    None => {
                        warn!("booking {booking_id}: no unit free for {window}");
                        outcome.booking.advance(BookingStatus::Failed(Failure::NoCapacity));
                        return outcome;
                    }
                }
            }
        };
        metrics::histogram!(observability::ALLOCATION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        let Some(unit) = inventory.get(idx) else {
            // UnitIdx values only come from this inventory.
            outcome.booking.advance(BookingStatus::Failed(Failure::NoCapacity));
            return outcome;
        };
        let cost = self
            .options
            .pricing
            .total_cost(inventory, unit, &outcome.booking, &window);
        let site = unit.site;
        outcome.booking.assign(unit, cost);
        outcome.unit = Some(idx);
        outcome.restored = restored;
        ledger.mark_allocated(booking_id);

        if restored {
            info!("booking {booking_id} keeps restored site {site} for {window}");
        } else {
            info!("booking {booking_id} allocated site {site} for {window} at {cost}");
            for span in window.slices() {
                let event = Event::Reserved { booking_id, site, span };
                let recorded = self
                    .bounded("occupancy journal", self.collaborators.occupancy.record(&event))
                    .await;
                if let Err(e) = recorded {
                    error!("booking {booking_id}: {e}");
                    metrics::counter!(observability::WRITE_FAILURES_TOTAL, "store" => e.store()).increment(1);
                    outcome.problems.push(Problem::Write(e));
                    break;
                }
            }
        }

        outcome
    }

    /// Give up reservations a booking holds for a window it no longer asks
    /// for, journaling each release.
    async fn release_stale(
        &self,
        booking_id: BookingId,
        window: &Window,
        inventory: &mut Inventory,
        outcome: &mut BookingOutcome,
    ) {
        for (site, span) in inventory.release(booking_id) {
            warn!("booking {booking_id} now asks for {window}; releasing site {site} for {span}");
            let event = Event::Released { booking_id, site, span };
            let recorded = self
                .bounded("occupancy journal", self.collaborators.occupancy.record(&event))
                .await;
            if let Err(e) = recorded {
                error!("booking {booking_id}: {e}");
                metrics::counter!(observability::WRITE_FAILURES_TOTAL, "store" => e.store()).increment(1);
                outcome.problems.push(Problem::Write(e));
                break;
            }
        }
    }

    /// Downstream writes for an allocated booking, then the terminal
    /// transition. Anything else passes through untouched.
    async fn write_through(&self, mut outcome: BookingOutcome, known: bool) -> BookingOutcome {
        if outcome.status() != BookingStatus::Allocated {
            return outcome;
        }
        let Some(window) = outcome.window else {
            return outcome;
        };
        let booking_id = outcome.booking.booking_id;

        let (recorded, rendered) = tokio::join!(
            self.bounded(
                "system of record",
                self.collaborators
                    .system_of_record
                    .record_allocation(booking_id, self.options.campground_id),
            ),
            self.render(&outcome.booking, &window),
        );
        if let Err(e) = recorded {
            outcome.problems.push(Problem::Write(e));
        }
        match rendered {
            Ok(handle) => outcome.artifact = Some(handle),
            Err(e) => outcome.problems.push(Problem::Render(e)),
        }

        // Documents are never rewritten; only a fully confirmed booking is stored.
        if known {
            outcome.already_stored = true;
            outcome.stored = true;
        } else if outcome.problems.is_empty() {
            match self.store_document(&outcome, window).await {
                Ok(already) => {
                    outcome.already_stored = already;
                    outcome.stored = true;
                }
                Err(e) => outcome.problems.push(Problem::Write(e)),
            }
        } else {
            warn!("booking {booking_id}: document insert deferred until its other writes succeed");
        }

        if outcome.problems.is_empty() {
            outcome.booking.advance(BookingStatus::Confirmed);
        } else {
            for problem in &outcome.problems {
                error!("booking {booking_id}: {problem}");
                let store = match problem {
                    Problem::Write(e) => e.store(),
                    Problem::Render(_) => "confirmation",
                    Problem::Validation(_) => "validation",
                };
                metrics::counter!(observability::WRITE_FAILURES_TOTAL, "store" => store).increment(1);
            }
            outcome.booking.advance(BookingStatus::Failed(Failure::WriteError));
        }
        outcome
    }

    /// Existence-checked insert. `Ok(true)` means the document was already
    /// there and nothing was written.
    async fn store_document(&self, outcome: &BookingOutcome, window: Window) -> Result<bool, WriteError> {
        let booking_id = outcome.booking.booking_id;
        let documents = &self.collaborators.documents;

        if self.bounded("document store", documents.exists(booking_id)).await? {
            warn!("booking {booking_id} already in document store, skipping insert");
            metrics::counter!(observability::DOCUMENT_SKIPS_TOTAL).increment(1);
            return Ok(true);
        }

        let mut snapshot = outcome.booking.clone();
        snapshot.status = BookingStatus::Confirmed;
        let document = BookingDocument::from_booking(
            &snapshot,
            Some(window),
            self.options.campground_id,
            outcome.artifact.clone(),
        );
        self.bounded("document store", documents.insert(&document)).await?;
        Ok(false)
    }

    async fn render(&self, booking: &Booking, window: &Window) -> Result<ArtifactHandle, RenderError> {
        let after = self.options.write_timeout;
        match tokio::time::timeout(after, self.collaborators.artifacts.render(booking, window)).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::Timeout(after)),
        }
    }

    async fn bounded<T>(
        &self,
        store: &'static str,
        call: impl Future<Output = Result<T, WriteError>>,
    ) -> Result<T, WriteError> {
        let after = self.options.write_timeout;
        match tokio::time::timeout(after, call).await {
            Ok(result) => result,
            Err(_) => Err(WriteError::Timeout { store, after }),
        }
    }
}
