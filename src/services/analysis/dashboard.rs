use chrono::Utc;
use serde_json::{json, Value};

use super::charts::select_charts;
use super::types::{Dashboard, DatasetProfile, Kpi};
use crate::models::Table;

fn kpi(label: &str, value: Value) -> Kpi {
    Kpi {
        label: label.to_string(),
        value,
        suffix: None,
    }
}

pub fn build_kpis(profile: &DatasetProfile) -> Vec<Kpi> {
    let missing_pct = (profile.missing_ratio * 100.0 * 100.0).round() / 100.0;
    vec![
        kpi("Rows", json!(profile.rows)),
        kpi("Columns", json!(profile.columns)),
        Kpi {
            suffix: Some("%".to_string()),
            ..kpi("Missing Ratio", json!(missing_pct))
        },
        kpi("Generated", json!(profile.generated_at)),
    ]
}

pub fn dashboard(table: &Table, profile: &DatasetProfile) -> Dashboard {
    let start = std::time::Instant::now();
    let kpis = build_kpis(profile);
    let charts = select_charts(table, profile);

    tracing::info!(
        "Dashboard built with {} charts in {:?}",
        charts.len(),
        start.elapsed()
    );

    Dashboard {
        kpis,
        charts,
        generated_at: Utc::now(),
    }
}
