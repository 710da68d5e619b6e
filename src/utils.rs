use crate::schema::Frequency;
use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y", "%d.%m.%Y"];

pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

pub fn next_month_start(date: NaiveDate) -> NaiveDate {
    let start = first_day_of_month(date);
    start.checked_add_months(Months::new(1)).unwrap_or(start)
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday() as u64;
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

/// Label of the bucket `date` falls into.
pub fn period_start(date: NaiveDate, freq: Frequency) -> NaiveDate {
    match freq {
        Frequency::Day => date,
        Frequency::Week => week_start(date),
        Frequency::Month => first_day_of_month(date),
    }
}

pub fn next_period(start: NaiveDate, freq: Frequency) -> NaiveDate {
    match freq {
        Frequency::Day => start.succ_opt().unwrap_or(start),
        Frequency::Week => start.checked_add_days(Days::new(7)).unwrap_or(start),
        Frequency::Month => next_month_start(start),
    }
}

/// The `count` bucket labels that follow `start`, not including `start`.
pub fn periods_after(start: NaiveDate, count: usize, freq: Frequency) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = period_start(start, freq);
    for _ in 0..count {
        let next = next_period(current, freq);
        if next == current {
            break;
        }
        dates.push(next);
        current = next;
    }
    dates
}

/// Every bucket label from the bucket of `start` through the bucket of `end`.
pub fn get_periods_in_range(start: NaiveDate, end: NaiveDate, freq: Frequency) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let last = period_start(end, freq);

    let mut current = period_start(start, freq);
    while current <= last {
        dates.push(current);
        let next = next_period(current, freq);
        if next == current {
            break;
        }
        current = next;
    }

    dates
}

/// Parses a free-text date cell. Day-first for slash dates, matching the
/// Brazilian billing exports this crate is fed.
pub fn parse_date_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

pub fn format_date_br(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Days since 1970-01-01, the absolute clock used by the seasonal terms.
pub fn days_since_epoch(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (date - epoch).num_days() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_period_start() {
        assert_eq!(period_start(d(2023, 3, 17), Frequency::Month), d(2023, 3, 1));
        // 2023-03-17 is a Friday
        assert_eq!(period_start(d(2023, 3, 17), Frequency::Week), d(2023, 3, 13));
        assert_eq!(period_start(d(2023, 3, 17), Frequency::Day), d(2023, 3, 17));
    }

    #[test]
    fn test_next_period_rolls_over_year() {
        assert_eq!(next_period(d(2023, 12, 1), Frequency::Month), d(2024, 1, 1));
        assert_eq!(next_period(d(2023, 12, 25), Frequency::Week), d(2024, 1, 1));
        assert_eq!(next_period(d(2023, 12, 31), Frequency::Day), d(2024, 1, 1));
    }

    #[test]
    fn test_periods_in_range_is_inclusive() {
        let months = get_periods_in_range(d(2023, 1, 31), d(2023, 4, 2), Frequency::Month);
        assert_eq!(
            months,
            vec![d(2023, 1, 1), d(2023, 2, 1), d(2023, 3, 1), d(2023, 4, 1)]
        );
    }

    #[test]
    fn test_periods_after() {
        let months = periods_after(d(2023, 11, 1), 3, Frequency::Month);
        assert_eq!(months, vec![d(2023, 12, 1), d(2024, 1, 1), d(2024, 2, 1)]);
    }

    #[test]
    fn test_parse_date_text_formats() {
        let expected = d(2023, 2, 5).and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(parse_date_text("2023-02-05"), Some(expected));
        assert_eq!(parse_date_text("05/02/2023"), Some(expected));
        assert_eq!(parse_date_text(" 2023/02/05 "), Some(expected));
        assert_eq!(
            parse_date_text("2023-02-05 13:30:00"),
            d(2023, 2, 5).and_hms_opt(13, 30, 0)
        );
        assert_eq!(parse_date_text("not a date"), None);
        assert_eq!(parse_date_text(""), None);
    }
}
