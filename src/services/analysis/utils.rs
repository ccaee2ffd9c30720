use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::models::Cell;

// Month-first variants are tried before day-first ones.
const DATETIME_FORMATS: [&str; 12] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

const OFFSET_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const DATE_FORMATS: [&str; 12] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
];

/// Tolerant timestamp parser: returns `None` instead of failing, and
/// normalizes every accepted value to UTC. Naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS.iter() {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in DATETIME_FORMATS.iter() {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for format in DATE_FORMATS.iter() {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Cell-level variant of [`parse_timestamp`].
pub fn parse_cell_timestamp(cell: &Cell) -> Option<DateTime<Utc>> {
    match cell {
        Cell::DateTime(dt) => Some(*dt),
        Cell::Text(s) => parse_timestamp(s),
        _ => None,
    }
}

pub fn iso_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Upper-cases the first letter after any non-letter and lower-cases the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(ch);
            prev_is_letter = false;
        }
    }
    out
}

/// Column name as shown in chart titles.
pub fn humanize(column_name: &str) -> String {
    title_case(&column_name.replace('_', " "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_common_layouts() {
        for raw in [
            "2024-03-05",
            "2024/03/05",
            "03/05/2024",
            "2024-03-05 10:20:30",
            "2024-03-05T10:20:30.125",
            "2024-03-05T10:20:30Z",
            "Mar 05 2024",
            "March 5, 2024",
        ] {
            let dt = parse_timestamp(raw).unwrap_or_else(|| panic!("failed on {raw}"));
            assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 5), "{raw}");
        }
    }

    #[test]
    fn normalizes_offsets_to_utc() {
        let dt = parse_timestamp("2024-03-05T23:30:00-02:00").unwrap();
        assert_eq!((dt.day(), dt.hour(), dt.minute()), (6, 1, 30));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("widget"), None);
        assert_eq!(parse_timestamp("2024-13-45"), None);
        assert_eq!(parse_timestamp("42"), None);
    }

    #[test]
    fn iso_timestamps_use_numeric_offset() {
        let dt = parse_timestamp("2024-01-02").unwrap();
        assert_eq!(iso_timestamp(&dt), "2024-01-02T00:00:00+00:00");
    }

    #[test]
    fn humanizes_column_names() {
        assert_eq!(humanize("product_category"), "Product Category");
        assert_eq!(humanize("revenue_USD"), "Revenue Usd");
        assert_eq!(humanize("units2sold"), "Units2Sold");
    }
}
