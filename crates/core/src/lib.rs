//! `pickbay-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod sku;

pub use error::{ConflictKind, DomainError, DomainResult};
pub use id::{JobId, JobItemId, LocationId, OperatorId, StoreId, TxId};
pub use sku::SkuId;
