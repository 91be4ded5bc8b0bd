//! U.S. equity market holiday rules
//!
//! Fixed-date holidays shift to an observed weekday when they land on a
//! weekend; floating holidays are the nth (or last) weekday of a month.
//! Good Friday is not part of the default rule set, see
//! [`good_friday`] and `MarketCalendar::with_good_friday`.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Weekend shifting applied to a fixed-date holiday
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Observance {
    /// Sunday moves to Monday, Saturday is not observed
    SundayToMonday,
    /// Saturday moves to Friday, Sunday moves to Monday
    NearestWeekday,
}

const NEW_YEARS_DAY: &str = "New Year's Day";
const MLK_DAY: &str = "Martin Luther King Jr. Day";
const PRESIDENTS_DAY: &str = "Presidents' Day";
const MEMORIAL_DAY: &str = "Memorial Day";
const JUNETEENTH: &str = "Juneteenth";
const INDEPENDENCE_DAY: &str = "Independence Day";
const LABOR_DAY: &str = "Labor Day";
const THANKSGIVING: &str = "Thanksgiving Day";
const CHRISTMAS: &str = "Christmas Day";
pub const GOOD_FRIDAY: &str = "Good Friday";

/// All rule-based market holidays of a year, in calendar order
///
/// Dates are the days the market is closed (observed dates), so a holiday
/// whose nominal date falls on an unobserved Saturday is omitted.
pub fn holidays_in_year(year: i32) -> Vec<(NaiveDate, &'static str)> {
    let mut days = Vec::with_capacity(9);

    let fixed = [
        (1, 1, NEW_YEARS_DAY, Observance::SundayToMonday),
        (6, 19, JUNETEENTH, Observance::SundayToMonday),
        (7, 4, INDEPENDENCE_DAY, Observance::NearestWeekday),
        (12, 25, CHRISTMAS, Observance::NearestWeekday),
    ];
    for (month, day, name, rule) in fixed {
        if let Some(date) = observed(year, month, day, rule) {
            days.push((date, name));
        }
    }

    let floating = [
        (nth_weekday(year, 1, Weekday::Mon, 3), MLK_DAY),
        (nth_weekday(year, 2, Weekday::Mon, 3), PRESIDENTS_DAY),
        (last_weekday(year, 5, Weekday::Mon), MEMORIAL_DAY),
        (nth_weekday(year, 9, Weekday::Mon, 1), LABOR_DAY),
        (nth_weekday(year, 11, Weekday::Thu, 4), THANKSGIVING),
    ];
    for (date, name) in floating {
        if let Some(date) = date {
            days.push((date, name));
        }
    }

    days.sort_by_key(|(date, _)| *date);
    days
}

/// Name of the rule-based holiday observed on `date`, if any
pub fn holiday_name(date: NaiveDate) -> Option<&'static str> {
    holidays_in_year(date.year())
        .into_iter()
        .find(|(day, _)| *day == date)
        .map(|(_, name)| name)
}

/// Good Friday of `year` (two days before Gregorian Easter Sunday)
pub fn good_friday(year: i32) -> Option<NaiveDate> {
    easter_sunday(year).map(|easter| easter - Duration::days(2))
}

/// Gregorian Easter Sunday (anonymous Gregorian algorithm)
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;

    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

fn observed(year: i32, month: u32, day: u32, rule: Observance) -> Option<NaiveDate> {
    let nominal = NaiveDate::from_ymd_opt(year, month, day)?;
    match (nominal.weekday(), rule) {
        (Weekday::Sun, _) => Some(nominal + Duration::days(1)),
        (Weekday::Sat, Observance::NearestWeekday) => Some(nominal - Duration::days(1)),
        (Weekday::Sat, Observance::SundayToMonday) => None,
        _ => Some(nominal),
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = first_of_next.pred_opt()?;
    let back = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    Some(last - Duration::days(back as i64))
}
