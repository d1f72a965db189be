//! Domain error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// A scan/undo conflict the caller is expected to resolve and retry.
///
/// Callers branch on the variant (and its payload), never on message text.
/// Serialized with a `kind` tag so the HTTP layer can emit it verbatim in
/// 409 bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    /// The scanned value matched no line of the job.
    #[error("scanned item is not part of the job")]
    ItemNotInJob,

    /// No location could be resolved for the movement.
    #[error("no pick location could be resolved")]
    NeedForceLocation,

    /// The scan would exceed planned + approved quantity.
    ///
    /// `need` is the additional approval required for the scan to commit
    /// (zero when an existing approval covers it but has not been consumed).
    #[error("scan exceeds approved quantity (need {need} more)")]
    QuantityConflict { need: i64 },

    /// The resolved location lacks stock and overpick is not allowed.
    #[error("insufficient stock at the resolved location")]
    InsufficientStock,

    /// Reversing the transaction would drive on-hand below zero.
    #[error("undo would drive on-hand stock negative")]
    NegativeStockOnUndo,
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. non-positive quantity, missing id).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A resolvable conflict, discriminated by kind.
    #[error("conflict: {0}")]
    Conflict(ConflictKind),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(kind: ConflictKind) -> Self {
        Self::Conflict(kind)
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// The conflict kind, when this error is a conflict.
    pub fn conflict_kind(&self) -> Option<ConflictKind> {
        match self {
            Self::Conflict(kind) => Some(*kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_kind_serializes_with_tag_and_payload() {
        let kind = ConflictKind::QuantityConflict { need: 2 };
        let json = serde_json::to_value(kind).unwrap();
        assert_eq!(json["kind"], "QUANTITY_CONFLICT");
        assert_eq!(json["need"], 2);

        let json = serde_json::to_value(ConflictKind::InsufficientStock).unwrap();
        assert_eq!(json["kind"], "INSUFFICIENT_STOCK");
    }
}
