//! SKU identity.
//!
//! Stock is keyed by the normalized SKU code itself rather than a surrogate
//! id: the product master lives outside this service, and the code is the
//! only identity a barcode scan carries.

use serde::{Deserialize, Serialize};

/// Normalized SKU code (trimmed, uppercased).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkuId(String);

impl SkuId {
    /// Normalize a raw code into a SKU identity.
    ///
    /// Returns `None` when the input is empty after trimming.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SkuId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        let sku = SkuId::parse("  ab-100 ").unwrap();
        assert_eq!(sku.as_str(), "AB-100");
    }

    #[test]
    fn parse_rejects_blank_input() {
        assert!(SkuId::parse("   ").is_none());
        assert!(SkuId::parse("").is_none());
    }
}
