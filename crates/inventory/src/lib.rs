//! Inventory domain module.
//!
//! Locations, per-(location, SKU) on-hand records, and the pure decision
//! logic for resolving a movement's location and routing around shortage.

pub mod location;
pub mod record;

pub use location::{resolve_location, Location, LocationStock};
pub use record::{stock_gate, InventoryRecord, StockKey, StockRoute};
