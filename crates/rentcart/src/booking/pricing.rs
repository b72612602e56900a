//! Rental duration and line pricing.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::selection::{ItemKey, SelectionItem};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Billable days between `start` and `end`, order-insensitive.
///
/// Under one day the fraction is kept (hourly rental, two decimals). From
/// one day on, any started day is billed in full.
pub fn rental_duration(start: DateTime<Utc>, end: DateTime<Utc>) -> Decimal {
    let millis = (end - start).num_milliseconds().abs();
    let days = Decimal::from(millis) / Decimal::from(MILLIS_PER_DAY);
    if days < Decimal::ONE {
        round_cents(days)
    } else {
        days.ceil()
    }
}

/// `daily_rate * quantity * duration`, rounded to cents.
pub fn line_total(daily_rate: Decimal, quantity: u32, duration: Decimal) -> Decimal {
    round_cents(daily_rate * Decimal::from(quantity) * duration)
}

/// One priced selection entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteLine {
    #[serde(skip)]
    pub key: ItemKey,
    pub equipment_id: String,
    pub name: String,
    pub quantity: u32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_days: Decimal,
    pub daily_rate: Decimal,
    pub total_amount: Decimal,
}

impl QuoteLine {
    /// Price `item` over its own period, falling back to the request's.
    pub fn for_item(item: &SelectionItem, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let start_date = item.start_date.unwrap_or(start);
        let end_date = item.end_date.unwrap_or(end);
        let duration_days = rental_duration(start_date, end_date);
        Self {
            key: item.key(),
            equipment_id: item.equipment_id.to_string(),
            name: item.name.clone(),
            quantity: item.quantity,
            start_date,
            end_date,
            duration_days,
            daily_rate: item.daily_rate,
            total_amount: line_total(item.daily_rate, item.quantity, duration_days),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub lines: Vec<QuoteLine>,
    pub total_amount: Decimal,
}

impl Quote {
    pub fn new(lines: Vec<QuoteLine>) -> Self {
        let total_amount = lines.iter().map(|l| l.total_amount).sum();
        Self {
            lines,
            total_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_same_day_is_fractional() {
        assert_eq!(rental_duration(at(1, 10, 0), at(1, 22, 0)), Decimal::new(5, 1));
        assert_eq!(rental_duration(at(1, 10, 0), at(1, 14, 0)), Decimal::new(17, 2));
    }

    #[test]
    fn test_whole_days() {
        assert_eq!(rental_duration(at(1, 10, 0), at(3, 10, 0)), Decimal::from(2));
        assert_eq!(rental_duration(at(1, 10, 0), at(2, 10, 0)), Decimal::from(1));
    }

    #[test]
    fn test_started_day_rounds_up() {
        assert_eq!(rental_duration(at(1, 10, 0), at(2, 10, 1)), Decimal::from(2));
    }

    #[test]
    fn test_reversed_range_uses_absolute_difference() {
        assert_eq!(rental_duration(at(3, 10, 0), at(1, 10, 0)), Decimal::from(2));
    }

    #[test]
    fn test_line_total_rounds_half_away_from_zero() {
        // 33.335 * 1 * 1 -> 33.34
        assert_eq!(
            line_total(Decimal::new(33335, 3), 1, Decimal::ONE),
            Decimal::new(3334, 2)
        );
        assert_eq!(
            line_total(Decimal::from(150), 2, Decimal::new(5, 1)),
            Decimal::from(150)
        );
    }
}
