use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use smallvec::SmallVec;

pub const TOP_VALUES: usize = 10;
pub const SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Number,
    Date,
    Category,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Type-specific statistics, flattened into the column profile on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnStats {
    Number {
        min: Option<f64>,
        max: Option<f64>,
        mean: Option<f64>,
    },
    Date {
        date_start: Option<String>,
        date_end: Option<String>,
    },
    Category {
        top_values: Vec<ValueCount>,
    },
    Text {
        sample_values: SmallVec<[String; SAMPLE_SIZE]>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub missing_ratio: f64,
    pub unique_count: usize,
    #[serde(flatten)]
    pub stats: ColumnStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetProfile {
    pub rows: usize,
    pub columns: usize,
    pub missing_ratio: f64,
    pub generated_at: DateTime<Utc>,
    pub columns_profile: Vec<ColumnProfile>,
}

impl DatasetProfile {
    pub fn names_of(&self, column_type: ColumnType) -> Vec<&str> {
        self.columns_profile
            .iter()
            .filter(|c| c.column_type == column_type)
            .map(|c| c.name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Scatter,
    Hist,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    #[serde(rename = "yKey")]
    pub y_key: String,
    pub label: String,
}

pub type Record = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub title: String,
    #[serde(rename = "xKey")]
    pub x_key: String,
    pub series: Vec<ChartSeries>,
    pub data: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl ChartDescriptor {
    /// Every record must carry exactly the x key plus each series' y key.
    pub fn keys_consistent(&self) -> bool {
        let mut expected: Vec<&str> = std::iter::once(self.x_key.as_str())
            .chain(self.series.iter().map(|s| s.y_key.as_str()))
            .collect();
        expected.sort_unstable();
        expected.dedup();

        self.data.iter().all(|record| {
            let mut keys: Vec<&str> = record.keys().map(String::as_str).collect();
            keys.sort_unstable();
            keys == expected
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub label: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub kpis: Vec<Kpi>,
    pub charts: Vec<ChartDescriptor>,
    pub generated_at: DateTime<Utc>,
}
