//! Output formatting and input parsing shared by the CLI commands

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Format a byte count in human-readable form
///
/// Examples:
/// - 500 -> "500 B"
/// - 1536 -> "1.5 KB"
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Two decimals, half away from zero.
pub fn format_money(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

/// Drop trailing zeros: "2" for whole days, "0.5" for half a day.
pub fn format_days(days: Decimal) -> String {
    days.normalize().to_string()
}

pub fn format_date(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M").to_string()
}

/// Parse a rental boundary.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM` (UTC) or a bare `YYYY-MM-DD`
/// (midnight UTC).
pub fn parse_when(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    bail!(
        "Invalid date '{}' (expected YYYY-MM-DD, 'YYYY-MM-DD HH:MM' or RFC 3339)",
        input
    )
}

pub fn parse_amount(input: &str) -> Result<Decimal> {
    match input.trim().parse::<Decimal>() {
        Ok(amount) if amount.is_sign_negative() => bail!("Amount '{}' is negative", input),
        Ok(amount) => Ok(amount),
        Err(_) => bail!("Invalid amount '{}'", input),
    }
}

/// Print a table with headers and rows
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    println!("{table}");
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(Decimal::from(150)), "150.00");
        assert_eq!(format_money(Decimal::new(33335, 3)), "33.34");
        assert_eq!(format_money(Decimal::new(5, 1)), "0.50");
    }

    #[test]
    fn test_format_days() {
        assert_eq!(format_days(Decimal::from(2)), "2");
        assert_eq!(format_days(Decimal::new(50, 2)), "0.5");
    }

    #[test]
    fn test_parse_when_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap();
        assert_eq!(parse_when("2024-06-01T09:30:00Z").unwrap(), expected);
        assert_eq!(parse_when("2024-06-01T11:30:00+02:00").unwrap(), expected);
        assert_eq!(parse_when("2024-06-01 09:30").unwrap(), expected);
        assert_eq!(
            parse_when(" 2024-06-01 ").unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_when_rejects_garbage() {
        assert!(parse_when("tomorrow").is_err());
        assert!(parse_when("2024-13-01").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("12.50").unwrap(), Decimal::new(1250, 2));
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("abc").is_err());
    }
}
