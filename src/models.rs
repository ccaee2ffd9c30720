use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// A single decoded cell. Upstream decoders map their own missing markers
/// (empty fields, NA tokens, NaN) onto `Cell::Missing`.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    DateTime(DateTime<Utc>),
}

/// Hashable identity of a non-missing cell, used for distinct counts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    Number(u64),
    Bool(bool),
    Text(String),
    DateTime(i64),
}

impl Cell {
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            Cell::Missing
        } else {
            Cell::Float(value)
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Tolerant numeric coercion; anything unparsable becomes `None`.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Cell::Int(v) => *v as f64,
            Cell::Float(v) => *v,
            Cell::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Cell::Text(s) => s.trim().parse::<f64>().ok()?,
            Cell::Missing | Cell::DateTime(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    /// String form of a non-missing cell.
    pub fn render(&self) -> Option<String> {
        match self {
            Cell::Missing => None,
            Cell::Int(v) => Some(v.to_string()),
            Cell::Float(v) => Some(format_float(*v)),
            Cell::Bool(true) => Some("True".to_string()),
            Cell::Bool(false) => Some("False".to_string()),
            Cell::Text(s) => Some(s.clone()),
            Cell::DateTime(dt) => Some(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
        }
    }

    pub fn key(&self) -> Option<CellKey> {
        match self {
            Cell::Missing => None,
            // Ints and floats share a key space so 1 and 1.0 count once
            Cell::Int(v) => Some(CellKey::Number(normalize_bits(*v as f64))),
            Cell::Float(v) => Some(CellKey::Number(normalize_bits(*v))),
            Cell::Bool(b) => Some(CellKey::Bool(*b)),
            Cell::Text(s) => Some(CellKey::Text(s.clone())),
            Cell::DateTime(dt) => Some(CellKey::DateTime(dt.timestamp_micros())),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Cell::Missing => Value::Null,
            Cell::Int(v) => Value::from(*v),
            Cell::Float(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::DateTime(dt) => Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
        }
    }
}

fn normalize_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

/// Integral floats keep a trailing `.0` so `3.0` and `3` stay distinguishable
/// once stringified.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Declared storage type of a column, as a decoder would report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Integer,
    Float,
    Boolean,
    DateTime,
    Text,
}

impl StorageKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, StorageKind::Integer | StorageKind::Float)
    }

    /// Mirrors what a dataframe library would settle on for these cells.
    pub fn infer(cells: &[Cell]) -> Self {
        let mut ints = 0usize;
        let mut floats = 0usize;
        let mut bools = 0usize;
        let mut dates = 0usize;
        let mut present = 0usize;

        for cell in cells {
            match cell {
                Cell::Missing => continue,
                Cell::Int(_) => ints += 1,
                Cell::Float(_) => floats += 1,
                Cell::Bool(_) => bools += 1,
                Cell::DateTime(_) => dates += 1,
                Cell::Text(_) => {}
            }
            present += 1;
        }

        match () {
            _ if present == 0 => StorageKind::Text,
            _ if ints == present => StorageKind::Integer,
            _ if ints + floats == present => StorageKind::Float,
            _ if bools == present => StorageKind::Boolean,
            _ if dates == present => StorageKind::DateTime,
            _ => StorageKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: StorageKind,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        let kind = StorageKind::infer(&cells);
        Self::with_kind(name, kind, cells)
    }

    pub fn with_kind(name: impl Into<String>, kind: StorageKind, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            kind,
            cells,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_missing()).count()
    }

    pub fn non_missing(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|c| !c.is_missing())
    }

    pub fn distinct_count(&self) -> usize {
        self.cells
            .iter()
            .filter_map(Cell::key)
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn to_numeric(&self) -> Vec<Option<f64>> {
        self.cells.iter().map(Cell::as_f64).collect()
    }

    pub fn to_strings(&self) -> Vec<Option<String>> {
        self.cells.iter().map(Cell::render).collect()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("table has no columns")]
    NoColumns,
    #[error("column '{name}' has {found} rows, expected {expected}")]
    RaggedColumns {
        name: String,
        expected: usize,
        found: usize,
    },
}

/// An immutable, fully decoded table. Columns are positionally aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let expected = columns.first().ok_or(TableError::NoColumns)?.len();
        if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
            return Err(TableError::RaggedColumns {
                name: bad.name.clone(),
                expected,
                found: bad.len(),
            });
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_kind_follows_cells() {
        assert_eq!(
            StorageKind::infer(&[Cell::Int(1), Cell::Missing, Cell::Int(2)]),
            StorageKind::Integer
        );
        assert_eq!(
            StorageKind::infer(&[Cell::Int(1), Cell::Float(2.5)]),
            StorageKind::Float
        );
        assert_eq!(
            StorageKind::infer(&[Cell::Bool(true), Cell::Bool(false)]),
            StorageKind::Boolean
        );
        assert_eq!(
            StorageKind::infer(&[Cell::Int(1), Cell::text("a")]),
            StorageKind::Text
        );
        assert_eq!(StorageKind::infer(&[Cell::Missing]), StorageKind::Text);
    }

    #[test]
    fn numeric_coercion_is_tolerant() {
        assert_eq!(Cell::text(" 4.5 ").as_f64(), Some(4.5));
        assert_eq!(Cell::text("abc").as_f64(), None);
        assert_eq!(Cell::Bool(true).as_f64(), Some(1.0));
        assert_eq!(Cell::Float(f64::INFINITY).as_f64(), None);
        assert!(Cell::from_f64(f64::NAN).is_missing());
    }

    #[test]
    fn rendering_matches_dataframe_stringification() {
        assert_eq!(Cell::Float(3.0).render().as_deref(), Some("3.0"));
        assert_eq!(Cell::Float(2.25).render().as_deref(), Some("2.25"));
        assert_eq!(Cell::Bool(false).render().as_deref(), Some("False"));
        assert_eq!(Cell::Missing.render(), None);
    }

    #[test]
    fn distinct_count_ignores_missing() {
        let col = Column::new(
            "x",
            vec![Cell::Int(1), Cell::Float(1.0), Cell::Missing, Cell::Int(2)],
        );
        assert_eq!(col.distinct_count(), 2);
    }

    #[test]
    fn table_rejects_bad_shapes() {
        assert_eq!(Table::new(vec![]), Err(TableError::NoColumns));
        let err = Table::new(vec![
            Column::new("a", vec![Cell::Int(1)]),
            Column::new("b", vec![]),
        ])
        .unwrap_err();
        assert!(matches!(err, TableError::RaggedColumns { found: 0, .. }));
    }
}
