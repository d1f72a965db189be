//! Scan-to-line matching.

use crate::job::JobItem;

/// Resolve a raw scan value to a planned line of the job.
///
/// The value is normalized (trim + uppercase) and matched in strict priority
/// order: exact SKU code first, then exact maker code. No fuzzy or partial
/// matching; a near-miss must fail rather than pick the wrong line. When
/// several lines carry the same code, the first in item order wins.
pub fn match_scan<'a>(items: &'a [JobItem], raw: &str) -> Option<&'a JobItem> {
    let normalized = raw.trim().to_uppercase();
    if normalized.is_empty() {
        return None;
    }

    if let Some(by_sku) = items.iter().find(|i| i.sku_code.as_str() == normalized) {
        return Some(by_sku);
    }

    items.iter().find(|i| {
        i.maker_code
            .as_deref()
            .is_some_and(|code| code.trim().to_uppercase() == normalized)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pickbay_core::{JobId, JobItemId, SkuId};

    fn item(sku: &str, maker: Option<&str>) -> JobItem {
        JobItem::planned(
            JobItemId::new(),
            JobId::new(),
            SkuId::parse(sku).unwrap(),
            maker.map(str::to_string),
            sku.to_string(),
            10,
        )
    }

    #[test]
    fn matches_exact_sku_code_after_normalization() {
        let items = vec![item("AB-100", None), item("CD-200", None)];
        let found = match_scan(&items, "  cd-200 ").unwrap();
        assert_eq!(found.sku_code.as_str(), "CD-200");
    }

    #[test]
    fn sku_code_wins_over_maker_code() {
        // One line's maker code collides with another line's SKU code.
        let items = vec![item("AB-100", Some("CD-200")), item("CD-200", None)];
        let found = match_scan(&items, "CD-200").unwrap();
        assert_eq!(found.sku_code.as_str(), "CD-200");
        assert_eq!(found.id, items[1].id);
    }

    #[test]
    fn falls_back_to_maker_code() {
        let items = vec![item("AB-100", Some("MK-77")), item("CD-200", None)];
        let found = match_scan(&items, "mk-77").unwrap();
        assert_eq!(found.sku_code.as_str(), "AB-100");
    }

    #[test]
    fn no_partial_matching() {
        let items = vec![item("AB-100", None)];
        assert!(match_scan(&items, "AB-10").is_none());
        assert!(match_scan(&items, "AB-1000").is_none());
    }

    #[test]
    fn duplicate_lines_resolve_to_the_first_in_item_order() {
        let items = vec![item("AB-100", None), item("AB-100", None)];
        let found = match_scan(&items, "AB-100").unwrap();
        assert_eq!(found.id, items[0].id);
    }

    #[test]
    fn blank_scan_matches_nothing() {
        let items = vec![item("AB-100", None)];
        assert!(match_scan(&items, "   ").is_none());
    }
}
