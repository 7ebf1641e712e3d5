use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SummaryError;
use crate::inventory::Inventory;
use crate::model::*;
use crate::pipeline::RunReport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitUtilization {
    pub site: SiteNumber,
    pub tier: SizeTier,
    pub rate: Decimal,
    /// Confirmed bookings placed on this unit during the run.
    pub bookings: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped_duplicates: usize,
    pub failures: BTreeMap<Failure, usize>,
    /// One row per inventory unit, registry order.
    pub utilization: Vec<UnitUtilization>,
    pub total_sales: Decimal,
}

/// `successful + failed == total`; utilization sums to `successful`.
pub fn summarize(report: &RunReport, inventory: &Inventory) -> RunSummary {
    let mut failures = BTreeMap::new();
    let mut per_site: HashMap<SiteNumber, usize> = HashMap::new();
    let mut total = 0;
    let mut successful = 0;
    let mut total_sales = Decimal::ZERO;

    for outcome in report.processed() {
        total += 1;
        match outcome.status() {
            BookingStatus::Confirmed => {
                successful += 1;
                total_sales += outcome.booking.total_cost;
                if let Some(site) = outcome.booking.allocated_site {
                    *per_site.entry(site).or_default() += 1;
                }
            }
            BookingStatus::Failed(kind) => *failures.entry(kind).or_default() += 1,
            // Not reachable after a run; counted as failed so the totals add up.
            BookingStatus::Pending | BookingStatus::Allocated => {
                *failures.entry(Failure::WriteError).or_default() += 1
            }
        }
    }

    let utilization = inventory
        .units()
        .iter()
        .map(|u| UnitUtilization {
            site: u.site,
            tier: u.tier,
            rate: u.rate,
            bookings: per_site.get(&u.site).copied().unwrap_or(0),
        })
        .collect();

    RunSummary {
        total,
        successful,
        failed: total - successful,
        skipped_duplicates: report.outcomes.iter().filter(|o| o.skipped).count(),
        failures,
        utilization,
        total_sales,
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bookings: {} confirmed, {} failed",
            self.total, self.successful, self.failed
        )?;
        for (kind, count) in &self.failures {
            write!(f, ", {kind}={count}")?;
        }
        if self.skipped_duplicates > 0 {
            write!(f, ", {} duplicates skipped", self.skipped_duplicates)?;
        }
        write!(f, "; sales {:.2}", self.total_sales)
    }
}

/// One day's confirmed sales for a campground, upserted into the system of record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub campground_id: CampgroundId,
    pub summary_date: NaiveDate,
    pub total_sales: Decimal,
    pub total_bookings: u64,
}

impl DailySummary {
    pub fn validate(&self) -> Result<(), SummaryError> {
        if self.total_sales.is_sign_negative() && !self.total_sales.is_zero() {
            return Err(SummaryError::NegativeSales(self.total_sales));
        }
        Ok(())
    }
}

/// Confirmed bookings of `report` only.
pub fn daily_summary(report: &RunReport, campground_id: CampgroundId, date: NaiveDate) -> DailySummary {
    let (total_bookings, total_sales) = report
        .confirmed()
        .fold((0u64, Decimal::ZERO), |(n, sales), o| (n + 1, sales + o.booking.total_cost));
    DailySummary {
        campground_id,
        summary_date: date,
        total_sales,
        total_bookings,
    }
}
