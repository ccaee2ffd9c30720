use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::types::ColumnType;
use super::utils::parse_cell_timestamp;
use crate::models::{Cell, Column, StorageKind};

pub const DATE_PARSE_THRESHOLD: f64 = 0.85;
pub const CATEGORY_MAX_UNIQUE: usize = 50;
pub const CATEGORY_MAX_UNIQUE_RATIO: f64 = 0.2;

pub type DateSeries = Vec<Option<DateTime<Utc>>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub column_type: ColumnType,
    /// Parsed timestamps, kept so the profiler doesn't parse the column twice.
    pub dates: Option<DateSeries>,
}

/// Returns the column as timestamps when it is date-like: either stored as
/// datetimes, or a text column where enough values parse.
pub fn parse_date_series(column: &Column) -> Option<DateSeries> {
    match column.kind {
        StorageKind::DateTime => Some(column.cells.iter().map(parse_cell_timestamp).collect()),
        StorageKind::Text => {
            let parsed: DateSeries = column.cells.iter().map(parse_cell_timestamp).collect();
            let ok = parsed.iter().filter(|d| d.is_some()).count();
            let ratio = if parsed.is_empty() {
                0.0
            } else {
                ok as f64 / parsed.len() as f64
            };
            (ratio >= DATE_PARSE_THRESHOLD).then_some(parsed)
        }
        _ => None,
    }
}

pub fn infer_column_type(column: &Column) -> Inference {
    if let Some(dates) = parse_date_series(column) {
        return Inference {
            column_type: ColumnType::Date,
            dates: Some(dates),
        };
    }

    let column_type = match column.kind {
        StorageKind::Boolean => ColumnType::Category,
        kind if kind.is_numeric() => ColumnType::Number,
        _ => classify_by_uniqueness(column),
    };

    Inference {
        column_type,
        dates: None,
    }
}

fn classify_by_uniqueness(column: &Column) -> ColumnType {
    let (present, uniq) = column.cells.iter().filter_map(Cell::key).fold(
        (0usize, HashSet::new()),
        |(n, mut seen), key| {
            seen.insert(key);
            (n + 1, seen)
        },
    );

    if present == 0 {
        return ColumnType::Text;
    }

    let uniq = uniq.len();
    let uniq_ratio = uniq as f64 / present as f64;
    if uniq <= CATEGORY_MAX_UNIQUE || uniq_ratio <= CATEGORY_MAX_UNIQUE_RATIO {
        ColumnType::Category
    } else {
        ColumnType::Text
    }
}
