use dashboard_services::models::{Cell, Column, Table};
use dashboard_services::services::analysis::{
    dashboard, profile, ChartKind, ColumnType, DatasetProfile,
};
use serde_json::Value;

fn sales_table(rows: usize) -> Table {
    let categories = ["toys", "books", "garden", "tools"];
    Table::new(vec![
        Column::new(
            "date",
            (0..rows)
                .map(|i| Cell::Text(format!("2024-03-{:02}", i % 28 + 1)))
                .collect(),
        ),
        Column::new(
            "product_category",
            (0..rows)
                .map(|i| Cell::text(categories[i % categories.len()]))
                .collect(),
        ),
        Column::new(
            "revenue",
            (0..rows).map(|i| Cell::Float(10.0 + (i % 17) as f64)).collect(),
        ),
    ])
    .unwrap()
}

fn strip_timestamps(mut value: Value) -> Value {
    if let Some(obj) = value.as_object_mut() {
        obj.remove("generated_at");
    }
    if let Some(kpis) = value.get_mut("kpis").and_then(Value::as_array_mut) {
        kpis.retain(|k| k["label"] != "Generated");
    }
    value
}

#[test]
fn sales_shape_produces_line_bar_and_histogram() {
    let table = sales_table(120);
    let p = profile(&table);

    let types: Vec<ColumnType> = p.columns_profile.iter().map(|c| c.column_type).collect();
    assert_eq!(
        types,
        [ColumnType::Date, ColumnType::Category, ColumnType::Number]
    );

    let d = dashboard(&table, &p);
    let kinds: Vec<ChartKind> = d.charts.iter().map(|c| c.kind).collect();
    assert_eq!(kinds, [ChartKind::Line, ChartKind::Bar, ChartKind::Hist]);
    assert!(d.charts.iter().all(|c| c.keys_consistent()));

    assert_eq!(d.charts[0].title, "Revenue over time");
    assert_eq!(d.charts[0].series[0].y_key, "revenue");
    assert_eq!(d.charts[1].title, "Top Product Category by Revenue");
    assert_eq!(d.charts[1].data.len(), 4);
    assert_eq!(d.charts[2].title, "Distribution of Revenue");
}

#[test]
fn histogram_counts_match_numeric_values() {
    let mut revenue: Vec<Cell> = (0..90).map(|i| Cell::Float(i as f64 * 2.0)).collect();
    revenue.extend([Cell::Missing, Cell::text("n/a"), Cell::Missing]);
    let table = Table::new(vec![Column::with_kind(
        "revenue",
        dashboard_services::models::StorageKind::Float,
        revenue,
    )])
    .unwrap();

    let d = dashboard(&table, &profile(&table));
    let hist = d.charts.iter().find(|c| c.kind == ChartKind::Hist).unwrap();
    assert_eq!(hist.data.len(), 20);
    let total: u64 = hist.data.iter().map(|r| r["count"].as_u64().unwrap()).sum();
    assert_eq!(total, 90);
    assert_eq!(hist.data[0]["bucket"], "0.00–8.90");
}

#[test]
fn scatter_title_names_the_strongest_pair() {
    let n = 100;
    let a: Vec<Cell> = (0..n).map(|i| Cell::Float(i as f64)).collect();
    let b: Vec<Cell> = (0..n)
        .map(|i| Cell::Float(((i * 37) % 11) as f64 + i as f64 * 0.05))
        .collect();
    let c: Vec<Cell> = (0..n)
        .map(|i| Cell::Float(i as f64 * 3.0 + ((i * 13) % 7) as f64))
        .collect();
    let table = Table::new(vec![
        Column::new("a", a),
        Column::new("b", b),
        Column::new("c", c),
    ])
    .unwrap();

    let d = dashboard(&table, &profile(&table));
    let scatter = d
        .charts
        .iter()
        .find(|c| c.kind == ChartKind::Scatter)
        .unwrap();
    assert_eq!(scatter.title, "Relationship: A vs C");
    assert_eq!(scatter.data.len(), n);
    assert_eq!(scatter.meta.as_ref().unwrap()["xLabel"], "a");
}

#[test]
fn reruns_are_identical_apart_from_timestamps() {
    let table = sales_table(60);

    let run = |t: &Table| {
        let p: DatasetProfile = profile(t);
        let d = dashboard(t, &p);
        (
            strip_timestamps(serde_json::to_value(&p).unwrap()),
            strip_timestamps(serde_json::to_value(&d).unwrap()),
        )
    };

    assert_eq!(run(&table), run(&table));
}

#[test]
fn text_only_tables_get_kpis_but_no_charts() {
    let table = Table::new(vec![Column::new(
        "comment",
        (0..80).map(|i| Cell::Text(format!("note {i}"))).collect(),
    )])
    .unwrap();
    let p = profile(&table);
    assert_eq!(p.columns_profile[0].column_type, ColumnType::Text);

    let d = dashboard(&table, &p);
    assert!(d.charts.is_empty());
    assert_eq!(d.kpis.len(), 4);
}

#[test]
fn profile_wire_format_uses_expected_keys() {
    let table = sales_table(30);
    let json = serde_json::to_value(profile(&table)).unwrap();
    for key in ["rows", "columns", "missing_ratio", "generated_at", "columns_profile"] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    let date = &json["columns_profile"][0];
    assert_eq!(date["type"], "date");
    assert_eq!(date["date_start"], "2024-03-01T00:00:00+00:00");
    let category = &json["columns_profile"][1];
    assert_eq!(category["top_values"][0]["count"], 8);
}
