mod availability;

pub use availability::{first_conflict, is_available};

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::inventory::{Inventory, UnitIdx};
use crate::model::*;

/// Which units a booking may land on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AllocationPolicy {
    /// First unit in registry order with a free window. The requested tier
    /// is ignored.
    #[default]
    FirstFit,
    /// First-fit over units of the requested tier only.
    TierMatched,
}

impl AllocationPolicy {
    pub fn admits(&self, unit: &Unit, requested: SizeTier) -> bool {
        match self {
            AllocationPolicy::FirstFit => true,
            AllocationPolicy::TierMatched => unit.tier == requested,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationPolicy::FirstFit => "first-fit",
            AllocationPolicy::TierMatched => "tier-matched",
        }
    }
}

impl fmt::Display for AllocationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllocationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "first-fit" => Ok(AllocationPolicy::FirstFit),
            "tier-matched" => Ok(AllocationPolicy::TierMatched),
            other => Err(format!("unknown allocation policy {other:?}")),
        }
    }
}

/// Which rate prices a booking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PricingPolicy {
    /// Rate of the unit the booking landed on.
    #[default]
    AllocatedUnit,
    /// Seeded rate of the tier the customer asked for. Falls back to the
    /// allocated unit's rate when that tier was never seeded.
    RequestedTier,
}

impl PricingPolicy {
    pub fn nightly_rate(&self, inventory: &Inventory, unit: &Unit, requested: SizeTier) -> Decimal {
        match self {
            PricingPolicy::AllocatedUnit => unit.rate,
            PricingPolicy::RequestedTier => inventory.rate_for(requested).unwrap_or(unit.rate),
        }
    }

    /// `rate × nights × unit_count`; a one-week window is `rate × 7 × unit_count`.
    pub fn total_cost(
        &self,
        inventory: &Inventory,
        unit: &Unit,
        booking: &Booking,
        window: &Window,
    ) -> Decimal {
        let rate = self.nightly_rate(inventory, unit, booking.requested_tier);
        rate * Decimal::from(window.span().days()) * Decimal::from(booking.unit_count)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PricingPolicy::AllocatedUnit => "allocated-unit",
            PricingPolicy::RequestedTier => "requested-tier",
        }
    }
}

impl fmt::Display for PricingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PricingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "allocated-unit" => Ok(PricingPolicy::AllocatedUnit),
            "requested-tier" => Ok(PricingPolicy::RequestedTier),
            other => Err(format!("unknown pricing policy {other:?}")),
        }
    }
}

/// Append one reservation per 7-day slice of `window`.
///
/// Call only right after `is_available` returned true for the same window;
/// reserving twice without a re-check breaks the no-overlap invariant.
pub fn reserve(unit: &mut Unit, window: &Window, booking_id: BookingId) {
    debug_assert!(is_available(unit, window), "reserve on occupied window");
    for span in window.slices() {
        unit.insert_reservation(Reservation { booking_id, span });
    }
}

/// Reserve the first admitted unit (registry order) free for `window`.
/// `None` is a normal outcome: nothing qualifies.
pub fn allocate(
    inventory: &mut Inventory,
    window: &Window,
    policy: AllocationPolicy,
    requested: SizeTier,
    booking_id: BookingId,
) -> Option<UnitIdx> {
    let (idx, unit) = inventory
        .iter_mut()
        .find(|(_, u)| policy.admits(u, requested) && is_available(u, window))?;
    reserve(unit, window, booking_id);
    Some(idx)
}
