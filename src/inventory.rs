use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::limits::MAX_UNITS;
use crate::model::*;

/// One line of the inventory seed: `count` units of `tier` at `rate` per night.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSeed {
    pub tier: SizeTier,
    pub rate: Decimal,
    pub count: u32,
}

/// Ten sites per tier, Small first.
pub fn default_seed() -> Vec<TierSeed> {
    vec![
        TierSeed { tier: SizeTier::Small, rate: Decimal::from(50), count: 10 },
        TierSeed { tier: SizeTier::Medium, rate: Decimal::from(60), count: 10 },
        TierSeed { tier: SizeTier::Large, rate: Decimal::from(70), count: 10 },
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeedError {
    #[error("seed entry {0:?} is not tier:rate:count")]
    Malformed(String),
    #[error("seed entry {entry:?}: {reason}")]
    Invalid { entry: String, reason: String },
    #[error("tier {0} listed twice")]
    DuplicateTier(SizeTier),
    #[error("seed has {count} units, limit {max}")]
    TooManyUnits { count: u64, max: u64 },
    #[error("seed is empty")]
    Empty,
}

/// Parse `Small:50:10,Medium:60:10,...`. Rates must be positive; each tier
/// may appear once.
pub fn parse_seed(raw: &str) -> Result<Vec<TierSeed>, SeedError> {
    let mut seed: Vec<TierSeed> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
        let [tier, rate, count] = parts[..] else {
            return Err(SeedError::Malformed(entry.to_string()));
        };
        let invalid = |reason: String| SeedError::Invalid {
            entry: entry.to_string(),
            reason,
        };
        let tier: SizeTier = tier.parse().map_err(invalid)?;
        let rate: Decimal = rate
            .parse()
            .map_err(|e| invalid(format!("rate: {e}")))?;
        if rate <= Decimal::ZERO {
            return Err(invalid(format!("rate {rate} must be positive")));
        }
        let count: u32 = count
            .parse()
            .map_err(|e| invalid(format!("count: {e}")))?;
        if seed.iter().any(|s| s.tier == tier) {
            return Err(SeedError::DuplicateTier(tier));
        }
        seed.push(TierSeed { tier, rate, count });
    }
    if seed.is_empty() {
        return Err(SeedError::Empty);
    }
    let total: u64 = seed.iter().map(|s| u64::from(s.count)).sum();
    if total > MAX_UNITS as u64 {
        return Err(SeedError::TooManyUnits {
            count: total,
            max: MAX_UNITS as u64,
        });
    }
    Ok(seed)
}

/// Stable index of a unit in the inventory arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitIdx(pub usize);

/// Arena of units in registry order (ascending site number).
#[derive(Debug, Clone, PartialEq)]
pub struct Inventory {
    units: Vec<Unit>,
    rates: BTreeMap<SizeTier, Decimal>,
}

impl Inventory {
    /// Build fresh, unoccupied units from the seed. Site numbers start at 1
    /// and follow seed order. A tier listed twice keeps its first rate.
    pub fn initialize(seed: &[TierSeed]) -> Self {
        let mut units = Vec::new();
        let mut rates = BTreeMap::new();
        let mut site: SiteNumber = 1;
        for line in seed {
            let rate = *rates.entry(line.tier).or_insert(line.rate);
            for _ in 0..line.count {
                units.push(Unit::new(site, line.tier, rate));
                site += 1;
            }
        }
        Self { units, rates }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn get(&self, idx: UnitIdx) -> Option<&Unit> {
        self.units.get(idx.0)
    }

    pub fn get_mut(&mut self, idx: UnitIdx) -> Option<&mut Unit> {
        self.units.get_mut(idx.0)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (UnitIdx, &mut Unit)> {
        self.units.iter_mut().enumerate().map(|(i, u)| (UnitIdx(i), u))
    }

    pub fn find_site(&self, site: SiteNumber) -> Option<UnitIdx> {
        self.units
            .binary_search_by_key(&site, |u| u.site)
            .ok()
            .map(UnitIdx)
    }

    /// Nightly rate for a tier, as seeded.
    pub fn rate_for(&self, tier: SizeTier) -> Option<Decimal> {
        self.rates.get(&tier).copied()
    }

    /// Unit currently holding a reservation for `booking_id`, if any.
    pub fn reservation_for(&self, booking_id: BookingId) -> Option<(UnitIdx, Span)> {
        self.units.iter().enumerate().find_map(|(i, u)| {
            u.occupancy
                .iter()
                .find(|r| r.booking_id == booking_id)
                .map(|r| (UnitIdx(i), r.span))
        })
    }

    /// Drop every reservation `booking_id` holds, returning what was freed.
    pub fn release(&mut self, booking_id: BookingId) -> Vec<(SiteNumber, Span)> {
        let mut freed = Vec::new();
        for unit in &mut self.units {
            let site = unit.site;
            unit.occupancy.retain(|r| {
                if r.booking_id == booking_id {
                    freed.push((site, r.span));
                    false
                } else {
                    true
                }
            });
        }
        freed
    }

    /// Re-apply journaled reservations and releases in order. Reservations
    /// for unknown sites or that would overlap existing occupancy are
    /// skipped. Returns how many reservations were applied.
    pub fn restore(&mut self, events: &[Event]) -> usize {
        let mut applied = 0;
        for event in events {
            match event {
                Event::Reserved { booking_id, site, span } => {
                    let Some(idx) = self.find_site(*site) else {
                        warn!("journal names unknown site {site} for booking {booking_id}, skipping");
                        continue;
                    };
                    let unit = &mut self.units[idx.0];
                    if unit.overlapping(span).next().is_some() {
                        warn!("journal reservation {span} on site {site} overlaps occupancy, skipping");
                        continue;
                    }
                    unit.insert_reservation(Reservation {
                        booking_id: *booking_id,
                        span: *span,
                    });
                    applied += 1;
                }
                Event::Released { booking_id, site, span } => {
                    if let Some(idx) = self.find_site(*site) {
                        self.units[idx.0]
                            .occupancy
                            .retain(|r| !(r.booking_id == *booking_id && r.span == *span));
                    }
                }
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn span(start: (i32, u32, u32), days: i64) -> Span {
        let s = NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap();
        Span::new(s, s + chrono::Duration::days(days))
    }

    #[test]
    fn default_seed_builds_thirty_sites_by_thirds() {
        let inv = Inventory::initialize(&default_seed());
        assert_eq!(inv.len(), 30);
        let units = inv.units();
        assert!(units[..10].iter().all(|u| u.tier == SizeTier::Small && u.rate == Decimal::from(50)));
        assert!(units[10..20].iter().all(|u| u.tier == SizeTier::Medium && u.rate == Decimal::from(60)));
        assert!(units[20..].iter().all(|u| u.tier == SizeTier::Large && u.rate == Decimal::from(70)));
    }

    #[test]
    fn sites_ascend_from_one() {
        let inv = Inventory::initialize(&default_seed());
        let sites: Vec<_> = inv.units().iter().map(|u| u.site).collect();
        assert_eq!(sites, (1..=30).collect::<Vec<_>>());
        assert!(inv.units().iter().all(|u| u.occupancy.is_empty()));
    }

    #[test]
    fn initialize_is_deterministic_and_fresh() {
        let seed = default_seed();
        let mut a = Inventory::initialize(&seed);
        let b = Inventory::initialize(&seed);
        a.get_mut(UnitIdx(0)).unwrap().insert_reservation(Reservation {
            booking_id: 1,
            span: span((2024, 9, 7), 7),
        });
        assert!(b.get(UnitIdx(0)).unwrap().occupancy.is_empty());
        assert_eq!(Inventory::initialize(&seed), b);
    }

    #[test]
    fn duplicate_tier_keeps_first_rate() {
        let seed = vec![
            TierSeed { tier: SizeTier::Small, rate: Decimal::from(50), count: 1 },
            TierSeed { tier: SizeTier::Small, rate: Decimal::from(99), count: 1 },
        ];
        let inv = Inventory::initialize(&seed);
        assert!(inv.units().iter().all(|u| u.rate == Decimal::from(50)));
        assert_eq!(inv.rate_for(SizeTier::Small), Some(Decimal::from(50)));
        assert_eq!(inv.rate_for(SizeTier::Large), None);
    }

    #[test]
    fn parse_seed_matches_default() {
        let seed = parse_seed("Small:50:10, Medium:60:10, Large:70:10").unwrap();
        assert_eq!(seed, default_seed());
    }

    #[test]
    fn parse_seed_rejects_bad_entries() {
        assert!(matches!(parse_seed("Small:50"), Err(SeedError::Malformed(_))));
        assert!(matches!(parse_seed("Huge:50:1"), Err(SeedError::Invalid { .. })));
        assert!(matches!(parse_seed("Small:0:1"), Err(SeedError::Invalid { .. })));
        assert!(matches!(parse_seed("Small:abc:1"), Err(SeedError::Invalid { .. })));
        assert_eq!(
            parse_seed("Small:50:1,small:55:1"),
            Err(SeedError::DuplicateTier(SizeTier::Small))
        );
        assert_eq!(parse_seed(" , "), Err(SeedError::Empty));
        assert!(matches!(parse_seed("Small:50:4000000000"), Err(SeedError::TooManyUnits { .. })));
    }

    #[test]
    fn find_site_by_number() {
        let inv = Inventory::initialize(&default_seed());
        assert_eq!(inv.find_site(1), Some(UnitIdx(0)));
        assert_eq!(inv.find_site(30), Some(UnitIdx(29)));
        assert_eq!(inv.find_site(31), None);
    }

    #[test]
    fn restore_applies_and_skips() {
        let mut inv = Inventory::initialize(&default_seed());
        let events = vec![
            Event::Reserved { booking_id: 1, site: 3, span: span((2024, 9, 7), 7) },
            Event::Reserved { booking_id: 2, site: 99, span: span((2024, 9, 7), 7) },
            Event::Reserved { booking_id: 3, site: 3, span: span((2024, 9, 10), 7) },
        ];
        assert_eq!(inv.restore(&events), 1);
        assert_eq!(inv.reservation_for(1), Some((UnitIdx(2), span((2024, 9, 7), 7))));
        assert_eq!(inv.reservation_for(3), None);
        assert!(inv.units().iter().all(|u| u.occupancy_is_disjoint()));
    }

    #[test]
    fn release_frees_and_replays() {
        let mut inv = Inventory::initialize(&default_seed());
        let events = vec![
            Event::Reserved { booking_id: 1, site: 2, span: span((2024, 9, 7), 7) },
            Event::Reserved { booking_id: 1, site: 2, span: span((2024, 9, 14), 7) },
            Event::Reserved { booking_id: 2, site: 3, span: span((2024, 9, 7), 7) },
        ];
        inv.restore(&events);

        let mut freed = inv.release(1);
        freed.sort_by_key(|(_, s)| s.start);
        assert_eq!(freed, vec![(2, span((2024, 9, 7), 7)), (2, span((2024, 9, 14), 7))]);
        assert_eq!(inv.reservation_for(1), None);
        assert!(inv.reservation_for(2).is_some());
        assert!(inv.release(1).is_empty());

        let mut replayed = Inventory::initialize(&default_seed());
        let mut journal = events.clone();
        journal.push(Event::Released { booking_id: 1, site: 2, span: span((2024, 9, 7), 7) });
        replayed.restore(&journal);
        assert_eq!(replayed.reservation_for(1), Some((UnitIdx(1), span((2024, 9, 14), 7))));
    }
}
