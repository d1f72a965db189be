use serde::{Deserialize, Serialize};

use pickbay_core::{ConflictKind, DomainError, LocationId, SkuId};

/// Key of one on-hand balance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub location_id: LocationId,
    pub sku_code: SkuId,
}

impl StockKey {
    pub fn new(location_id: LocationId, sku_code: SkuId) -> Self {
        Self {
            location_id,
            sku_code,
        }
    }
}

/// On-hand balance for one (location, SKU) pair.
///
/// Invariant: `on_hand` equals the sum of all non-undone ledger deltas for
/// the key. A balance goes negative only through the shortage pool or a
/// forced undo; all mutation flows through the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub key: StockKey,
    pub on_hand: i64,
    /// Bumped on every mutation; commits carry the expected value.
    pub version: u64,
}

impl InventoryRecord {
    /// A fresh record for a key that has seen no movement yet.
    pub fn empty(key: StockKey) -> Self {
        Self {
            key,
            on_hand: 0,
            version: 0,
        }
    }
}

/// Where a decrement should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockRoute {
    /// The resolved location covers the quantity.
    Requested,
    /// Insufficient stock, overpick allowed: the full quantity is taken from
    /// the shortage pool instead. The pool is exempt from the stock check
    /// (recording shortage is what it is for), so its balance may go negative.
    ShortagePool,
}

/// Stock gate for a decrementing movement of `qty` units.
pub fn stock_gate(on_hand: i64, qty: i64, allow_overpick: bool) -> Result<StockRoute, DomainError> {
    if on_hand >= qty {
        return Ok(StockRoute::Requested);
    }
    if allow_overpick {
        return Ok(StockRoute::ShortagePool);
    }
    Err(DomainError::conflict(ConflictKind::InsufficientStock))
}
