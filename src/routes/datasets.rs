use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppError,
    services::{
        analysis,
        csv_loader::{self, Preview},
        dataset_store::{DatasetMeta, DatasetRecord},
    },
    AppState,
};

const MAX_FILENAME_LEN: usize = 120;
const FALLBACK_FILENAME: &str = "dataset.csv";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/datasets", get(list_datasets))
        .route("/api/datasets/upload", post(upload_dataset))
        .route("/api/datasets/:id/preview", get(preview_dataset))
        .route("/api/datasets/:id/profile", get(get_profile))
        .route("/api/datasets/:id/dashboard", get(get_dashboard))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    id: String,
    meta: DatasetMeta,
}

/// Keeps alphanumerics and `-_. `, then swaps spaces for underscores.
pub fn safe_filename(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '))
        .collect();
    let out = kept.trim().replace(' ', "_");
    if out.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        out.chars().take(MAX_FILENAME_LEN).collect()
    }
}

async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

fn analyze_upload(id: String, name: String, file_data: Bytes) -> Result<DatasetRecord, AppError> {
    let table = csv_loader::load_table_from_bytes(file_data.clone())?;
    let profile = analysis::profile(&table);
    let dashboard = analysis::dashboard(&table, &profile);

    Ok(DatasetRecord {
        meta: DatasetMeta {
            id,
            name,
            rows: table.row_count(),
            columns: table.column_count(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        },
        original_csv: file_data.to_vec(),
        profile_json: serde_json::to_string(&profile)?,
        dashboard_json: serde_json::to_string(&dashboard)?,
    })
}

async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let start = std::time::Instant::now();

    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidInput("Missing filename".to_string()))?;
        upload = Some((filename, field.bytes().await?));
        break;
    }
    let (raw_name, file_data) =
        upload.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;

    let name = safe_filename(&raw_name);
    if !name.to_lowercase().ends_with(".csv") {
        return Err(AppError::InvalidInput(
            "Only CSV files are supported".to_string(),
        ));
    }
    if file_data.len() > state.config.max_upload_bytes() {
        return Err(AppError::FileTooLarge(state.config.max_upload_mb));
    }

    let id = Uuid::new_v4().to_string();
    tracing::info!(
        "Processing upload {} ({}, {}KB)",
        id,
        name,
        file_data.len() / 1024
    );

    let record = blocking(move || analyze_upload(id, name, file_data)).await?;
    let meta = record.meta.clone();
    let store = state.store.clone();
    blocking(move || store.upsert(&record)).await?;

    tracing::info!("Upload {} completed in {:?}", meta.id, start.elapsed());
    Ok(Json(UploadResponse {
        id: meta.id.clone(),
        meta,
    }))
}

async fn list_datasets(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let store = state.store.clone();
    let datasets = blocking(move || store.list()).await?;
    Ok(Json(json!({ "datasets": datasets })))
}

async fn preview_dataset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Preview>, AppError> {
    let store = state.store.clone();
    let limit = state.config.preview_rows;

    let preview = blocking(move || {
        let csv = store
            .original_csv(&id)?
            .ok_or_else(|| AppError::NotFound("Dataset not found".to_string()))?;
        let table = csv_loader::load_table_from_bytes(Bytes::from(csv))?;
        Ok(csv_loader::preview(&table, limit))
    })
    .await?;

    Ok(Json(preview))
}

fn json_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let store = state.store.clone();
    let body = blocking(move || store.profile_json(&id))
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
    Ok(json_response(body))
}

async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let store = state.store.clone();
    let body = blocking(move || store.dashboard_json(&id))
        .await?
        .ok_or_else(|| AppError::NotFound("Dashboard not found".to_string()))?;
    Ok(json_response(body))
}
