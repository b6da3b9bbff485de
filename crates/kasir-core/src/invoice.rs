//! # Document Numbers
//!
//! Human-readable identifiers generated by the engine.
//!
//! | Document          | Format                     | Sequence scope          |
//! |-------------------|----------------------------|-------------------------|
//! | Invoice           | `TOK-20260314-0007`        | shop code + day         |
//! | Reversal invoice  | `VOID-TOK-20260314-0007`   | (derived, one per void) |
//! | Purchase order    | `PO-00000042`              | global                  |
//!
//! Sequence values come from the database's counter table; this module only
//! formats them and names the counter scopes. The day in an invoice is the
//! shop's local calendar day, see [`business_date`].

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Code used when a shop name has no letters or digits.
const FALLBACK_SHOP_CODE: &str = "SHP";

/// First three letters/digits of the shop name, uppercased.
///
/// ```rust
/// use kasir_core::invoice::shop_code;
///
/// assert_eq!(shop_code("Toko Makmur"), "TOK");
/// assert_eq!(shop_code("  a.b-c shop"), "ABC");
/// assert_eq!(shop_code("***"), "SHP");
/// ```
pub fn shop_code(shop_name: &str) -> String {
    let code: String = shop_name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .take(3)
        .collect();

    if code.is_empty() {
        FALLBACK_SHOP_CODE.to_string()
    } else {
        code
    }
}

/// Calendar day of `at` at the shops' UTC offset.
pub fn business_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// Counter scope for invoice numbers.
///
/// Keyed by code rather than shop id: two shops whose names share a prefix
/// share one sequence, which keeps invoice numbers globally unique.
pub fn invoice_scope(shop_code: &str, date: NaiveDate) -> String {
    format!("invoice:{}-{}", shop_code, date.format("%Y%m%d"))
}

pub fn invoice_number(shop_code: &str, date: NaiveDate, sequence: i64) -> String {
    format!("{}-{}-{:04}", shop_code, date.format("%Y%m%d"), sequence)
}

/// Invoice number of the reversal transaction created by a void.
pub fn reversal_invoice_number(original: &str) -> String {
    format!("VOID-{original}")
}

pub const PURCHASE_ORDER_SCOPE: &str = "purchase_order";

pub fn po_number(sequence: i64) -> String {
    format!("PO-{:08}", sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_number_format() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        assert_eq!(invoice_number("TOK", date, 7), "TOK-20260314-0007");
        assert_eq!(invoice_number("TOK", date, 12345), "TOK-20260314-12345");
        assert_eq!(invoice_scope("TOK", date), "invoice:TOK-20260314");
    }

    #[test]
    fn test_business_date_follows_offset() {
        use chrono::TimeZone;

        let late_evening = Utc.with_ymd_and_hms(2026, 3, 14, 20, 30, 0).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        let jakarta = FixedOffset::east_opt(7 * 3600).unwrap();
        let honolulu = FixedOffset::west_opt(10 * 3600).unwrap();

        assert_eq!(business_date(late_evening, utc), NaiveDate::from_ymd_opt(2026, 3, 14).unwrap());
        assert_eq!(business_date(late_evening, jakarta), NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());

        let early_morning = Utc.with_ymd_and_hms(2026, 3, 14, 3, 0, 0).unwrap();
        assert_eq!(business_date(early_morning, honolulu), NaiveDate::from_ymd_opt(2026, 3, 13).unwrap());
    }

    #[test]
    fn test_shop_code_handles_short_and_unicode_names() {
        assert_eq!(shop_code("Ab"), "AB");
        assert_eq!(shop_code("warung ä"), "WAR");
        assert_eq!(shop_code(""), "SHP");
    }

    #[test]
    fn test_reversal_and_po_numbers() {
        assert_eq!(reversal_invoice_number("TOK-20260314-0007"), "VOID-TOK-20260314-0007");
        assert_eq!(po_number(42), "PO-00000042");
    }
}
