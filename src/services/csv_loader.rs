use bytes::Bytes;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use polars::prelude::{AnyValue, CsvReader, DataFrame, DataType, NullValues, SerReader, Series, TimeUnit};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Cursor;

use crate::error::AppError;
use crate::models::{Cell, Column, StorageKind, Table};

/// Tokens read as missing, on top of empty fields.
const NA_TOKENS: [&str; 12] = [
    "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "null", "NULL", "None", "#N/A", "<NA>", "",
];

#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

pub fn load_table_from_bytes(file_data: Bytes) -> Result<Table, AppError> {
    let start = std::time::Instant::now();
    let df = read_dataframe(file_data)?;

    if df.width() == 0 {
        return Err(AppError::InvalidInput("CSV has no columns".to_string()));
    }
    tracing::info!(
        "Decoded CSV: {} rows x {} columns in {:?}",
        df.height(),
        df.width(),
        start.elapsed()
    );

    let columns = df.get_columns().iter().map(column_from_series).collect();
    Ok(Table::new(columns)?)
}

fn read_dataframe(file_data: Bytes) -> Result<DataFrame, AppError> {
    if file_data.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::InvalidInput(
            "Failed to read CSV: No columns to parse from file".to_string(),
        ));
    }
    let null_values = NullValues::AllColumns(NA_TOKENS.iter().map(|s| s.to_string()).collect());

    CsvReader::new(Cursor::new(file_data))
        .has_header(true)
        // Full scan: a late float or string widens the dtype.
        .infer_schema(None)
        .with_null_values(Some(null_values))
        .finish()
        .map_err(|e| {
            tracing::warn!("Failed to read CSV: {}", e);
            AppError::InvalidInput(format!("Failed to read CSV: {}", e))
        })
}

fn storage_kind(dtype: &DataType) -> StorageKind {
    match dtype {
        DataType::Boolean => StorageKind::Boolean,
        DataType::Date | DataType::Datetime(_, _) => StorageKind::DateTime,
        dt if dt.is_integer() => StorageKind::Integer,
        dt if dt.is_float() => StorageKind::Float,
        _ => StorageKind::Text,
    }
}

fn column_from_series(series: &Series) -> Column {
    let cells = (0..series.len())
        .map(|idx| match series.get(idx) {
            Ok(value) => cell_from_any(value),
            Err(e) => {
                tracing::warn!("Error reading {}[{}]: {}", series.name(), idx, e);
                Cell::Missing
            }
        })
        .collect();

    Column::with_kind(series.name(), storage_kind(series.dtype()), cells)
}

fn cell_from_any(value: AnyValue) -> Cell {
    match value {
        AnyValue::Null => Cell::Missing,
        AnyValue::Boolean(b) => Cell::Bool(b),
        AnyValue::Int32(v) => Cell::Int(v as i64),
        AnyValue::Int64(v) => Cell::Int(v),
        AnyValue::UInt32(v) => Cell::Int(v as i64),
        AnyValue::UInt64(v) => Cell::Int(v as i64),
        AnyValue::Float32(v) => Cell::from_f64(v as f64),
        AnyValue::Float64(v) => Cell::from_f64(v),
        AnyValue::String(s) => Cell::Text(s.to_string()),
        AnyValue::Date(days) => date_from_days(days).map_or(Cell::Missing, Cell::DateTime),
        AnyValue::Datetime(v, unit, _) => {
            datetime_from_epoch(v, unit).map_or(Cell::Missing, Cell::DateTime)
        }
        other => Cell::Text(other.to_string()),
    }
}

fn date_from_days(days: i32) -> Option<DateTime<Utc>> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    let date = epoch.checked_add_signed(Duration::days(days as i64))?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

fn datetime_from_epoch(value: i64, unit: TimeUnit) -> Option<DateTime<Utc>> {
    let nanos = match unit {
        TimeUnit::Nanoseconds => value,
        TimeUnit::Microseconds => value.checked_mul(1_000)?,
        TimeUnit::Milliseconds => value.checked_mul(1_000_000)?,
    };
    Some(Utc.timestamp_nanos(nanos))
}

/// First `limit` rows, keyed by column name, with missing cells as `null`.
pub fn preview(table: &Table, limit: usize) -> Preview {
    let columns: Vec<String> = table.columns().iter().map(|c| c.name.clone()).collect();
    let rows = (0..table.row_count().min(limit))
        .map(|row| {
            table
                .columns()
                .iter()
                .map(|c| (c.name.clone(), c.cells[row].to_json()))
                .collect()
        })
        .collect();

    Preview { columns, rows }
}
