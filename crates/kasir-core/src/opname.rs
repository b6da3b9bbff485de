//! # Stock Opname Rules
//!
//! A stock opname (stock-take) records physical counts against the system
//! stock at the moment each line is captured.
//!
//! ```text
//! line.variance = physical_stock − system_stock
//!
//! approve(selected?):
//!     lines = all, or only the selected ids (each must belong to the opname)
//!     for each line with variance ≠ 0:
//!         stock := physical_stock                 (authoritative overwrite)
//!         movement.quantity := physical − current (the delta actually applied)
//! ```
//!
//! When nothing touched the record between count and approval, `current`
//! equals `system_stock` and the movement quantity equals the variance.

use std::collections::HashSet;

use crate::error::{CoreResult, ValidationError};
use crate::types::StockOpnameItem;
use crate::validation::validate_stock_level;

pub fn variance(physical_stock: i64, system_stock: i64) -> CoreResult<i64> {
    validate_stock_level("physical_stock", physical_stock)?;
    Ok(physical_stock - system_stock)
}

/// Lines an approval acts on.
///
/// `None` selects every line. Unknown ids are rejected rather than ignored.
pub fn select_for_approval<'a>(
    items: &'a [StockOpnameItem],
    selected: Option<&[String]>,
) -> CoreResult<Vec<&'a StockOpnameItem>> {
    let Some(selected) = selected else {
        return Ok(items.iter().collect());
    };

    let known: HashSet<&str> = items.iter().map(|i| i.id.as_str()).collect();
    if let Some(unknown) = selected.iter().find(|id| !known.contains(id.as_str())) {
        return Err(ValidationError::invalid(
            "approvals",
            format!("item {unknown} does not belong to this stock opname"),
        )
        .into());
    }

    let wanted: HashSet<&str> = selected.iter().map(String::as_str).collect();
    Ok(items.iter().filter(|i| wanted.contains(i.id.as_str())).collect())
}

/// Movement quantity for overwriting `current` with `physical_stock`.
pub fn approval_delta(item: &StockOpnameItem, current: i64) -> i64 {
    item.physical_stock - current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, system: i64, physical: i64) -> StockOpnameItem {
        StockOpnameItem {
            id: id.into(),
            stock_opname_id: "op-1".into(),
            product_id: format!("p-{id}"),
            system_stock: system,
            physical_stock: physical,
            variance: physical - system,
            notes: None,
        }
    }

    #[test]
    fn test_variance() {
        assert_eq!(variance(7, 10).unwrap(), -3);
        assert_eq!(variance(12, 10).unwrap(), 2);
        assert!(variance(-1, 10).is_err());
    }

    #[test]
    fn test_select_all_or_subset() {
        let items = vec![line("a", 10, 7), line("b", 5, 6), line("c", 1, 1)];
        assert_eq!(select_for_approval(&items, None).unwrap().len(), 3);

        let chosen = vec!["b".to_string()];
        let picked = select_for_approval(&items, Some(&chosen)).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "b");
    }

    #[test]
    fn test_unknown_selection_rejected() {
        let items = vec![line("a", 10, 7)];
        let chosen = vec!["zzz".to_string()];
        assert!(select_for_approval(&items, Some(&chosen)).is_err());
    }

    #[test]
    fn test_approval_delta_tracks_current_level() {
        let item = line("a", 10, 7);
        assert_eq!(approval_delta(&item, 10), -3);
        assert_eq!(approval_delta(&item, 8), -1);
    }
}
