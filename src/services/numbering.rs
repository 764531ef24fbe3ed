//! Human-readable document numbers: `QR-MM-YYYY-XXXX` for quote requests
//! (unique per organization) and `ORD-YYYY-XXXX` for orders. The sequence is
//! derived from the organization's row count; the unique constraint turns a
//! concurrent collision into a Conflict the caller retries with the next
//! sequence value.

use chrono::{Datelike, NaiveDate};

pub fn format_quote_number(date: NaiveDate, sequence: i64) -> String {
    format!("QR-{:02}-{}-{:04}", date.month(), date.year(), sequence)
}

pub fn format_order_number(date: NaiveDate, sequence: i64) -> String {
    format!("ORD-{}-{:04}", date.year(), sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn quote_number_format() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(format_quote_number(date, 1), "QR-03-2026-0001");
        assert_eq!(format_quote_number(date, 1042), "QR-03-2026-1042");
    }

    #[test]
    fn order_number_format() {
        let date = NaiveDate::from_ymd_opt(2026, 11, 30).unwrap();
        assert_eq!(format_order_number(date, 7), "ORD-2026-0007");
    }

    #[test]
    fn sequence_width_grows_past_four_digits() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(format_quote_number(date, 12345), "QR-01-2026-12345");
    }
}
