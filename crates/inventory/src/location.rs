use serde::{Deserialize, Serialize};

use pickbay_core::{ConflictKind, DomainError, LocationId};

/// A physical bin in the warehouse, as supplied by the location directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub code: String,
    /// System bins are bookkeeping-only and never auto-selected for picks.
    pub is_system: bool,
    /// Shortage pools (RET-01 style) absorb overpick decrements.
    pub is_shortage_pool: bool,
    /// The store's default picking bin.
    pub is_default: bool,
}

impl Location {
    pub fn new(id: LocationId, code: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            is_system: false,
            is_shortage_pool: false,
            is_default: false,
        }
    }

    /// Whether this bin may be auto-selected when no location was scanned.
    pub fn is_pickable(&self) -> bool {
        !self.is_system && !self.is_shortage_pool
    }
}

/// A candidate bin paired with its current on-hand for the scanned SKU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationStock {
    pub location: Location,
    pub on_hand: i64,
}

/// Select a location for a movement of `qty` units when none was given.
///
/// Priority: the default bin if it covers the quantity, then the first
/// pickable bin (by code order) with sufficient stock. When nothing covers
/// the quantity the scan needs an explicit location, unless forced, in
/// which case the default bin takes the movement and the stock gate decides
/// what happens next.
pub fn resolve_location(
    candidates: &[LocationStock],
    qty: i64,
    force: bool,
) -> Result<Location, DomainError> {
    let default_bin = candidates
        .iter()
        .find(|c| c.location.is_default && c.location.is_pickable());

    if let Some(bin) = default_bin {
        if bin.on_hand >= qty {
            return Ok(bin.location.clone());
        }
    }

    let mut stocked: Vec<&LocationStock> = candidates
        .iter()
        .filter(|c| c.location.is_pickable() && c.on_hand >= qty)
        .collect();
    stocked.sort_by(|a, b| a.location.code.cmp(&b.location.code));

    if let Some(bin) = stocked.first() {
        return Ok(bin.location.clone());
    }

    if force {
        if let Some(bin) = default_bin {
            return Ok(bin.location.clone());
        }
    }

    Err(DomainError::conflict(ConflictKind::NeedForceLocation))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(code: &str, on_hand: i64, is_default: bool) -> LocationStock {
        let mut location = Location::new(LocationId::new(), code);
        location.is_default = is_default;
        LocationStock { location, on_hand }
    }

    #[test]
    fn default_bin_wins_when_it_covers_the_quantity() {
        let candidates = vec![
            candidate("A-01", 50, false),
            candidate("A-02", 10, true),
        ];
        let loc = resolve_location(&candidates, 5, false).unwrap();
        assert_eq!(loc.code, "A-02");
    }

    #[test]
    fn falls_back_to_first_stocked_bin_by_code_order() {
        let candidates = vec![
            candidate("B-09", 20, false),
            candidate("A-02", 2, true),
            candidate("A-05", 20, false),
        ];
        let loc = resolve_location(&candidates, 10, false).unwrap();
        assert_eq!(loc.code, "A-05");
    }

    #[test]
    fn shortage_pool_and_system_bins_are_never_auto_selected() {
        let mut pool = candidate("RET-01", 100, false);
        pool.location.is_shortage_pool = true;
        let mut system = candidate("SYS-00", 100, false);
        system.location.is_system = true;

        let err = resolve_location(&[pool, system], 1, false).unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::NeedForceLocation));
    }

    #[test]
    fn no_coverage_requires_force() {
        let candidates = vec![candidate("A-01", 3, true), candidate("A-02", 2, false)];

        let err = resolve_location(&candidates, 5, false).unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::NeedForceLocation));

        // Forced: default bin takes the movement even without cover.
        let loc = resolve_location(&candidates, 5, true).unwrap();
        assert_eq!(loc.code, "A-01");
    }

    #[test]
    fn force_without_a_default_bin_still_conflicts() {
        let candidates = vec![candidate("A-01", 0, false)];
        let err = resolve_location(&candidates, 5, true).unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::NeedForceLocation));
    }
}
