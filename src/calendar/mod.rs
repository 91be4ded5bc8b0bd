//! Trading calendar
//!
//! Decides which calendar dates are expected to carry a daily close.
//! Everything here is pure and keyed on [`NaiveDate`], so the day of week
//! never depends on a time zone.

pub mod holidays;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::BTreeSet;

pub use holidays::{good_friday, holiday_name, holidays_in_year};

/// Saturday or Sunday
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Rule-based U.S. equity market holiday (observed date)
pub fn is_market_holiday(date: NaiveDate) -> bool {
    holiday_name(date).is_some()
}

/// Neither a weekend nor a market holiday
pub fn is_business_day(date: NaiveDate) -> bool {
    !is_weekend(date) && !is_market_holiday(date)
}

/// Why a date is not a trading day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Closure {
    Weekend,
    Holiday(&'static str),
    /// Ad-hoc closure recorded by the user
    Unscheduled,
}

/// Market calendar policy
///
/// The default policy matches the free functions above. Good Friday and
/// ad-hoc closures (e.g. national days of mourning) are opt-in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketCalendar {
    include_good_friday: bool,
    closures: BTreeSet<NaiveDate>,
}

impl MarketCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat Good Friday as a market holiday
    pub fn with_good_friday(mut self, include: bool) -> Self {
        self.include_good_friday = include;
        self
    }

    /// Add ad-hoc closure dates
    pub fn with_closures<I>(mut self, dates: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        self.closures.extend(dates);
        self
    }

    pub fn includes_good_friday(&self) -> bool {
        self.include_good_friday
    }

    pub fn closures(&self) -> &BTreeSet<NaiveDate> {
        &self.closures
    }

    /// Reason the market is closed on `date`, or `None` on a business day
    pub fn closure(&self, date: NaiveDate) -> Option<Closure> {
        if is_weekend(date) {
            return Some(Closure::Weekend);
        }
        if let Some(name) = holiday_name(date) {
            return Some(Closure::Holiday(name));
        }
        if self.include_good_friday && good_friday(date.year()) == Some(date) {
            return Some(Closure::Holiday(holidays::GOOD_FRIDAY));
        }
        if self.closures.contains(&date) {
            return Some(Closure::Unscheduled);
        }
        None
    }

    pub fn is_weekend(&self, date: NaiveDate) -> bool {
        is_weekend(date)
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        matches!(
            self.closure(date),
            Some(Closure::Holiday(_)) | Some(Closure::Unscheduled)
        )
    }

    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        self.closure(date).is_none()
    }

    /// Weekday closures of `year` under this policy, in date order
    pub fn closures_in_year(&self, year: i32) -> Vec<(NaiveDate, Closure)> {
        let mut days: Vec<(NaiveDate, Closure)> = holidays_in_year(year)
            .into_iter()
            .map(|(date, name)| (date, Closure::Holiday(name)))
            .collect();

        if self.include_good_friday {
            if let Some(date) = good_friday(year) {
                days.push((date, Closure::Holiday(holidays::GOOD_FRIDAY)));
            }
        }

        days.extend(
            self.closures
                .iter()
                .filter(|d| d.year() == year && !is_weekend(**d) && holiday_name(**d).is_none())
                .map(|d| (*d, Closure::Unscheduled)),
        );

        days.sort_by_key(|(date, _)| *date);
        days
    }

    /// Number of business days in `[start, end]` inclusive (0 if inverted)
    pub fn business_days_between(&self, start: NaiveDate, end: NaiveDate) -> usize {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.is_business_day(*d))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_business_day_composition() {
        let start = date(2020, 1, 1);
        for offset in 0..(366 * 6) {
            let d = start + chrono::Duration::days(offset);
            assert_eq!(
                is_business_day(d),
                !is_weekend(d) && !is_market_holiday(d),
                "mismatch on {d}"
            );
            assert_eq!(MarketCalendar::default().is_business_day(d), is_business_day(d));
        }
    }

    #[test]
    fn test_weekend_detection() {
        assert!(is_weekend(date(2024, 3, 2)));
        assert!(is_weekend(date(2024, 3, 3)));
        assert!(!is_weekend(date(2024, 3, 4)));
    }

    #[test]
    fn test_holiday_examples() {
        // New Year's Day 2024 is a Monday
        assert!(is_market_holiday(date(2024, 1, 1)));
        assert!(!is_business_day(date(2024, 1, 1)));

        // Independence Day 2024 is a Thursday
        assert!(is_market_holiday(date(2024, 7, 4)));

        // 2026: observed Friday, the Saturday itself is a weekend
        assert!(is_market_holiday(date(2026, 7, 3)));
        assert!(is_weekend(date(2026, 7, 4)));
        assert!(!is_market_holiday(date(2026, 7, 4)));
    }

    #[test]
    fn test_calendar_policy() {
        let gf = date(2024, 3, 29);
        assert!(MarketCalendar::default().is_business_day(gf));

        let calendar = MarketCalendar::new().with_good_friday(true);
        assert_eq!(calendar.closure(gf), Some(Closure::Holiday("Good Friday")));
        assert!(calendar.is_holiday(gf));

        let mourning = date(2025, 1, 9);
        let calendar = MarketCalendar::new().with_closures([mourning]);
        assert_eq!(calendar.closure(mourning), Some(Closure::Unscheduled));
        assert!(!calendar.is_business_day(mourning));
        assert!(is_business_day(mourning));
    }

    #[test]
    fn test_business_days_in_2024() {
        let calendar = MarketCalendar::default();
        // 262 weekdays minus 9 rule-based holidays (Good Friday excluded)
        assert_eq!(
            calendar.business_days_between(date(2024, 1, 1), date(2024, 12, 31)),
            253
        );
        assert_eq!(
            calendar.business_days_between(date(2024, 1, 31), date(2024, 1, 1)),
            0
        );
    }

    #[test]
    fn test_closures_in_year() {
        let calendar = MarketCalendar::new()
            .with_good_friday(true)
            .with_closures([date(2025, 1, 9), date(2025, 1, 11), date(2024, 12, 30)]);

        let days = calendar.closures_in_year(2025);
        // 9 rules, Good Friday, one weekday closure (the Saturday is ignored)
        assert_eq!(days.len(), 11);
        assert_eq!(days[0], (date(2025, 1, 1), Closure::Holiday("New Year's Day")));
        assert_eq!(days[1], (date(2025, 1, 9), Closure::Unscheduled));
        assert!(days.contains(&(date(2025, 4, 18), Closure::Holiday("Good Friday"))));
    }
}
