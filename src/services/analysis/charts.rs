use polars::prelude::{DataFrame, NamedFrom, PolarsResult, Series};
use rayon::prelude::*;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use super::inference::parse_date_series;
use super::metric::pick_primary_metric;
use super::types::*;
use super::utils::humanize;
use crate::models::{Column, Table};

pub const MAX_CATEGORIES: usize = 10;
pub const MAX_CORRELATION_COLUMNS: usize = 10;
pub const MIN_JOINT_OBSERVATIONS: usize = 25;
pub const SCATTER_SAMPLE_SIZE: usize = 800;
pub const SCATTER_SEED: u64 = 42;
pub const HISTOGRAM_BINS: usize = 20;

const PREFERRED_CATEGORY: &str = "product_category";

/// Produces up to four charts in fixed order: time series, category
/// breakdown, best-correlated scatter, metric distribution. Each one is
/// skipped independently; none is produced without a primary metric.
pub fn select_charts(table: &Table, profile: &DatasetProfile) -> Vec<ChartDescriptor> {
    let numeric = profile.names_of(ColumnType::Number);
    let Some(metric) = pick_primary_metric(&numeric).and_then(|name| table.column(name)) else {
        tracing::debug!("No numeric columns, skipping metric charts");
        return Vec::new();
    };
    tracing::debug!("Primary metric: {}", metric.name);

    let mut charts = Vec::with_capacity(4);
    charts.extend(time_series_chart(table, profile, metric));
    charts.extend(category_chart(table, profile, metric));
    charts.extend(scatter_chart(table, &numeric));
    charts.push(histogram_chart(metric));
    charts
}

fn record(pairs: [(&str, Value); 2]) -> Record {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn meta(pairs: &[(&str, &str)]) -> Option<Map<String, Value>> {
    Some(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect(),
    )
}

fn time_series_chart(
    table: &Table,
    profile: &DatasetProfile,
    metric: &Column,
) -> Option<ChartDescriptor> {
    let date_name = profile.names_of(ColumnType::Date).into_iter().next()?;
    let dates = parse_date_series(table.column(date_name)?)?;

    // Calendar-date keys sort chronologically as strings
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for (date, value) in dates.iter().zip(metric.to_numeric()) {
        if let (Some(date), Some(value)) = (date, value) {
            *totals.entry(date.date_naive().to_string()).or_insert(0.0) += value;
        }
    }

    let data = totals
        .into_iter()
        .map(|(day, total)| record([("_date", json!(day)), (metric.name.as_str(), json!(total))]))
        .collect();

    Some(ChartDescriptor {
        id: "line_date_metric".to_string(),
        kind: ChartKind::Line,
        title: format!("{} over time", humanize(&metric.name)),
        x_key: "_date".to_string(),
        series: vec![ChartSeries {
            y_key: metric.name.clone(),
            label: metric.name.clone(),
        }],
        data,
        meta: None,
    })
}

fn choose_category<'a>(profile: &'a DatasetProfile) -> Option<&'a str> {
    let categories = || {
        profile
            .columns_profile
            .iter()
            .filter(|c| c.column_type == ColumnType::Category)
    };
    categories()
        .find(|c| c.name == PREFERRED_CATEGORY)
        .or_else(|| categories().next())
        .map(|c| c.name.as_str())
}

fn category_chart(
    table: &Table,
    profile: &DatasetProfile,
    metric: &Column,
) -> Option<ChartDescriptor> {
    let category = table.column(choose_category(profile)?)?;

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for (label, value) in category.to_strings().into_iter().zip(metric.to_numeric()) {
        if let (Some(label), Some(value)) = (label, value) {
            *totals.entry(label).or_insert(0.0) += value;
        }
    }

    let mut ranked: Vec<(String, f64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(MAX_CATEGORIES);

    let data = ranked
        .into_iter()
        .map(|(label, total)| record([("category", json!(label)), ("value", json!(total))]))
        .collect();

    Some(ChartDescriptor {
        id: "bar_category_metric".to_string(),
        kind: ChartKind::Bar,
        title: format!(
            "Top {} by {}",
            humanize(&category.name),
            humanize(&metric.name)
        ),
        x_key: "category".to_string(),
        series: vec![ChartSeries {
            y_key: "value".to_string(),
            label: metric.name.clone(),
        }],
        data,
        meta: meta(&[("category", category.name.as_str()), ("metric", metric.name.as_str())]),
    })
}

fn joint_observations(xs: &[Option<f64>], ys: &[Option<f64>]) -> Vec<(f64, f64)> {
    xs.iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect()
}

/// Pearson correlation; `None` when either side has no variance.
pub fn pearson(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let (sxx, syy, sxy) = points.iter().fold((0.0, 0.0, 0.0), |(sxx, syy, sxy), (x, y)| {
        let dx = x - mean_x;
        let dy = y - mean_y;
        (sxx + dx * dx, syy + dy * dy, sxy + dx * dy)
    });

    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    let r = sxy / (sxx * syy).sqrt();
    r.is_finite().then_some(r)
}

/// Finds the numeric pair with the strongest absolute correlation among the
/// first few numeric columns. Pairs with too few joint observations are
/// skipped; the first pair in (i, j) order wins ties.
pub fn best_correlated_pair<'a>(table: &'a Table, numeric: &[&str]) -> Option<(&'a Column, &'a Column)> {
    let columns: Vec<&Column> = numeric
        .iter()
        .take(MAX_CORRELATION_COLUMNS)
        .filter_map(|name| table.column(name))
        .collect();
    if columns.len() < 2 {
        return None;
    }

    let values: Vec<Vec<Option<f64>>> = columns.iter().map(|c| c.to_numeric()).collect();
    let pairs: Vec<(usize, usize)> = (0..columns.len())
        .flat_map(|i| (i + 1..columns.len()).map(move |j| (i, j)))
        .collect();

    let scores: Vec<Option<f64>> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let points = joint_observations(&values[i], &values[j]);
            if points.len() < MIN_JOINT_OBSERVATIONS {
                return None;
            }
            Some(pearson(&points).map_or(0.0, f64::abs))
        })
        .collect();

    let mut best = (0, 1);
    let mut best_score = -1.0;
    for (&pair, score) in pairs.iter().zip(scores) {
        if let Some(score) = score {
            if score > best_score {
                best_score = score;
                best = pair;
            }
        }
    }

    tracing::debug!(
        "Best correlated pair: {} vs {} (score {:.3})",
        columns[best.0].name,
        columns[best.1].name,
        best_score
    );
    Some((columns[best.0], columns[best.1]))
}

fn sample_points(points: &[(f64, f64)]) -> PolarsResult<Vec<(f64, f64)>> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = points.iter().copied().unzip();
    let frame = DataFrame::new(vec![Series::new("x", xs), Series::new("y", ys)])?;
    let sampled = frame.sample_n_literal(SCATTER_SAMPLE_SIZE, false, false, Some(SCATTER_SEED))?;

    let xs = sampled.column("x")?.f64()?;
    let ys = sampled.column("y")?.f64()?;
    Ok(xs
        .into_iter()
        .zip(ys.into_iter())
        .filter_map(|(x, y)| Some((x?, y?)))
        .collect())
}

fn scatter_chart(table: &Table, numeric: &[&str]) -> Option<ChartDescriptor> {
    let (a, b) = best_correlated_pair(table, numeric)?;

    let mut points = joint_observations(&a.to_numeric(), &b.to_numeric());
    if points.len() > SCATTER_SAMPLE_SIZE {
        match sample_points(&points) {
            Ok(sampled) => points = sampled,
            Err(e) => {
                tracing::warn!("Scatter sampling failed, keeping leading rows: {}", e);
                points.truncate(SCATTER_SAMPLE_SIZE);
            }
        }
    }

    let data = points
        .into_iter()
        .map(|(x, y)| record([("x", json!(x)), ("y", json!(y))]))
        .collect();

    Some(ChartDescriptor {
        id: "scatter_numeric_numeric".to_string(),
        kind: ChartKind::Scatter,
        title: format!("Relationship: {} vs {}", humanize(&a.name), humanize(&b.name)),
        x_key: "x".to_string(),
        series: vec![ChartSeries {
            y_key: "y".to_string(),
            label: b.name.clone(),
        }],
        data,
        meta: meta(&[("xLabel", a.name.as_str()), ("yLabel", b.name.as_str())]),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub low: f64,
    pub high: f64,
    pub count: usize,
}

impl Bucket {
    pub fn label(&self) -> String {
        format!("{:.2}–{:.2}", self.low, self.high)
    }
}

/// Equal-width histogram over `[min, max]`. The last bucket is closed on the
/// right, and a constant input is spread over `[v - 0.5, v + 0.5]`.
pub fn histogram(values: &[f64], bins: usize) -> Vec<Bucket> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let (mut lo, mut hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins)
        .map(|i| if i == bins { hi } else { lo + width * i as f64 })
        .collect();

    let mut counts = vec![0usize; bins];
    for &v in values {
        let mut idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        // Float error can land a value one bucket off its edges
        if idx > 0 && v < edges[idx] {
            idx -= 1;
        } else if idx < bins - 1 && v >= edges[idx + 1] {
            idx += 1;
        }
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| Bucket {
            low: edges[i],
            high: edges[i + 1],
            count,
        })
        .collect()
}

fn histogram_chart(metric: &Column) -> ChartDescriptor {
    let values: Vec<f64> = metric.to_numeric().into_iter().flatten().collect();

    let data = histogram(&values, HISTOGRAM_BINS)
        .iter()
        .map(|bucket| record([("bucket", json!(bucket.label())), ("count", json!(bucket.count))]))
        .collect();

    ChartDescriptor {
        id: "hist_metric".to_string(),
        kind: ChartKind::Hist,
        title: format!("Distribution of {}", humanize(&metric.name)),
        x_key: "bucket".to_string(),
        series: vec![ChartSeries {
            y_key: "count".to_string(),
            label: "Count".to_string(),
        }],
        data,
        meta: meta(&[("metric", metric.name.as_str())]),
    }
}
