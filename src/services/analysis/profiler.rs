use chrono::Utc;
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::HashMap;

use super::inference::{infer_column_type, parse_date_series, DateSeries};
use super::types::*;
use super::utils::iso_timestamp;
use crate::models::{Column, Table};

pub fn profile(table: &Table) -> DatasetProfile {
    let start = std::time::Instant::now();
    let rows = table.row_count();
    let columns = table.column_count();

    let columns_profile: Vec<ColumnProfile> =
        table.columns().par_iter().map(profile_column).collect();

    let missing_total: usize = table.columns().iter().map(Column::missing_count).sum();
    let denom = if rows > 0 && columns > 0 {
        (rows * columns) as f64
    } else {
        1.0
    };

    tracing::info!(
        "Profiled {} rows x {} columns in {:?}",
        rows,
        columns,
        start.elapsed()
    );

    DatasetProfile {
        rows,
        columns,
        missing_ratio: missing_total as f64 / denom,
        generated_at: Utc::now(),
        columns_profile,
    }
}

pub fn profile_column(column: &Column) -> ColumnProfile {
    let inference = infer_column_type(column);
    let missing_ratio = if column.is_empty() {
        0.0
    } else {
        column.missing_count() as f64 / column.len() as f64
    };

    let stats = match inference.column_type {
        ColumnType::Number => number_stats(column),
        ColumnType::Date => {
            let dates = inference.dates.or_else(|| parse_date_series(column));
            date_stats(dates.as_ref())
        }
        ColumnType::Category => ColumnStats::Category {
            top_values: top_values(column, TOP_VALUES),
        },
        ColumnType::Text => ColumnStats::Text {
            sample_values: column
                .non_missing()
                .filter_map(|c| c.render())
                .take(SAMPLE_SIZE)
                .collect::<SmallVec<[String; SAMPLE_SIZE]>>(),
        },
    };

    tracing::debug!(
        "Column '{}' inferred as {:?} (missing {:.3})",
        column.name,
        inference.column_type,
        missing_ratio
    );

    ColumnProfile {
        name: column.name.clone(),
        column_type: inference.column_type,
        missing_ratio,
        unique_count: column.distinct_count(),
        stats,
    }
}

fn number_stats(column: &Column) -> ColumnStats {
    let (count, sum, min, max) = column.to_numeric().into_iter().flatten().fold(
        (0usize, 0.0f64, f64::INFINITY, f64::NEG_INFINITY),
        |(n, sum, min, max), v| (n + 1, sum + v, min.min(v), max.max(v)),
    );

    if count == 0 {
        return ColumnStats::Number {
            min: None,
            max: None,
            mean: None,
        };
    }

    ColumnStats::Number {
        min: Some(min),
        max: Some(max),
        mean: Some(sum / count as f64),
    }
}

fn date_stats(dates: Option<&DateSeries>) -> ColumnStats {
    let present = || dates.into_iter().flatten().flatten();
    ColumnStats::Date {
        date_start: present().min().map(iso_timestamp),
        date_end: present().max().map(iso_timestamp),
    }
}

/// Frequency counts over the stringified values, most frequent first.
/// Equal counts keep first-seen order.
pub fn top_values(column: &Column, limit: usize) -> Vec<ValueCount> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for value in column.to_strings().into_iter().flatten() {
        match counts.get_mut(&value) {
            Some(count) => *count += 1,
            None => {
                counts.insert(value.clone(), 1);
                order.push(value);
            }
        }
    }

    let mut ranked: Vec<ValueCount> = order
        .into_iter()
        .map(|value| {
            let count = counts[&value];
            ValueCount { value, count }
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;

    fn table(columns: Vec<Column>) -> Table {
        Table::new(columns).unwrap()
    }

    #[test]
    fn one_profile_per_column_in_order() {
        let t = table(vec![
            Column::new("b", vec![Cell::Int(1), Cell::Int(2)]),
            Column::new("a", vec![Cell::text("x"), Cell::text("y")]),
            Column::new("c", vec![Cell::Missing, Cell::Missing]),
        ]);
        let p = profile(&t);
        assert_eq!(p.columns, 3);
        assert_eq!(p.columns_profile.len(), p.columns);
        let names: Vec<&str> = p.columns_profile.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["b", "a", "c"]);
    }

    #[test]
    fn missing_ratio_extremes_are_exact() {
        let full = profile_column(&Column::new("f", vec![Cell::Int(1), Cell::Int(2)]));
        assert_eq!(full.missing_ratio, 0.0);
        let empty = profile_column(&Column::new("e", vec![Cell::Missing; 3]));
        assert_eq!(empty.missing_ratio, 1.0);
        assert_eq!(empty.unique_count, 0);
    }

    #[test]
    fn zero_rows_yield_zero_ratios() {
        let t = table(vec![Column::new("a", vec![]), Column::new("b", vec![])]);
        let p = profile(&t);
        assert_eq!(p.rows, 0);
        assert_eq!(p.missing_ratio, 0.0);
        assert!(p.columns_profile.iter().all(|c| c.missing_ratio == 0.0));
    }

    #[test]
    fn global_missing_ratio_spans_all_cells() {
        let t = table(vec![
            Column::new("a", vec![Cell::Int(1), Cell::Missing]),
            Column::new("b", vec![Cell::Missing, Cell::Missing]),
        ]);
        assert_eq!(profile(&t).missing_ratio, 0.75);
    }

    #[test]
    fn number_stats_skip_missing() {
        let col = Column::new(
            "n",
            vec![Cell::Int(4), Cell::Missing, Cell::Float(1.0), Cell::Int(7)],
        );
        assert_eq!(
            profile_column(&col).stats,
            ColumnStats::Number {
                min: Some(1.0),
                max: Some(7.0),
                mean: Some(4.0)
            }
        );
    }

    #[test]
    fn number_stats_are_null_without_values() {
        let col = Column::with_kind(
            "n",
            crate::models::StorageKind::Float,
            vec![Cell::Missing, Cell::Missing],
        );
        let p = profile_column(&col);
        assert_eq!(p.column_type, ColumnType::Number);
        assert_eq!(
            p.stats,
            ColumnStats::Number {
                min: None,
                max: None,
                mean: None
            }
        );
    }

    #[test]
    fn date_range_is_iso_formatted() {
        let col = Column::new(
            "d",
            vec![
                Cell::text("2024-02-10"),
                Cell::text("2024-01-05"),
                Cell::text("2024-03-01 08:00:00"),
            ],
        );
        assert_eq!(
            profile_column(&col).stats,
            ColumnStats::Date {
                date_start: Some("2024-01-05T00:00:00+00:00".to_string()),
                date_end: Some("2024-03-01T08:00:00+00:00".to_string()),
            }
        );
    }

    #[test]
    fn top_values_rank_by_count_then_first_seen() {
        let col = Column::new(
            "c",
            ["b", "a", "a", "c", "b", "d"]
                .iter()
                .map(|v| Cell::text(*v))
                .collect(),
        );
        let top = top_values(&col, 3);
        let pairs: Vec<(&str, usize)> = top.iter().map(|v| (v.value.as_str(), v.count)).collect();
        assert_eq!(pairs, [("b", 2), ("a", 2), ("c", 1)]);
    }

    #[test]
    fn top_values_cap_at_ten() {
        let cells: Vec<Cell> = (0..30).map(|i| Cell::Text(format!("v{}", i % 15))).collect();
        let p = profile_column(&Column::new("c", cells));
        match p.stats {
            ColumnStats::Category { top_values } => assert_eq!(top_values.len(), TOP_VALUES),
            other => panic!("unexpected stats {other:?}"),
        }
    }

    #[test]
    fn text_samples_take_first_five_present() {
        let mut cells = vec![Cell::Missing];
        cells.extend((0..100).map(|i| Cell::Text(format!("row {i}"))));
        let p = profile_column(&Column::new("t", cells));
        match p.stats {
            ColumnStats::Text { sample_values } => {
                assert_eq!(
                    sample_values.as_slice(),
                    ["row 0", "row 1", "row 2", "row 3", "row 4"]
                );
            }
            other => panic!("unexpected stats {other:?}"),
        }
    }

    #[test]
    fn profile_serializes_flat_type_fields() {
        let p = profile_column(&Column::new("n", vec![Cell::Int(2)]));
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["type"], "number");
        assert_eq!(json["min"], 2.0);
        assert!(json.get("stats").is_none());
    }
}
