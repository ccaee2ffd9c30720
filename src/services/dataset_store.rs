use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetMeta {
    pub id: String,
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    pub created_at: String,
}

/// Everything persisted for one upload.
#[derive(Debug, Clone)]
pub struct DatasetRecord {
    pub meta: DatasetMeta,
    pub original_csv: Vec<u8>,
    pub profile_json: String,
    pub dashboard_json: String,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS datasets (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    row_count INTEGER NOT NULL,
    column_count INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    original_csv BLOB NOT NULL,
    profile_json TEXT NOT NULL,
    dashboard_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS datasets_created_at ON datasets (created_at);
";

pub struct DatasetStore {
    conn: Mutex<Connection>,
}

impl DatasetStore {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!("Opening dataset store at {}", path.display());
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        debug!("Opening in-memory dataset store");
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, AppError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Inserts or replaces a dataset in one statement.
    pub fn upsert(&self, record: &DatasetRecord) -> Result<(), AppError> {
        let meta = &record.meta;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO datasets
                (id, name, row_count, column_count, created_at, original_csv, profile_json, dashboard_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                row_count = excluded.row_count,
                column_count = excluded.column_count,
                created_at = excluded.created_at,
                original_csv = excluded.original_csv,
                profile_json = excluded.profile_json,
                dashboard_json = excluded.dashboard_json",
            params![
                meta.id,
                meta.name,
                meta.rows as i64,
                meta.columns as i64,
                meta.created_at,
                record.original_csv,
                record.profile_json,
                record.dashboard_json,
            ],
        )?;
        info!("Stored dataset {} ({})", meta.id, meta.name);
        Ok(())
    }

    /// Newest first.
    pub fn list(&self) -> Result<Vec<DatasetMeta>, AppError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, row_count, column_count, created_at FROM datasets
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DatasetMeta {
                id: row.get(0)?,
                name: row.get(1)?,
                rows: row.get::<_, i64>(2)? as usize,
                columns: row.get::<_, i64>(3)? as usize,
                created_at: row.get(4)?,
            })
        })?;
        let metas = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(metas)
    }

    pub fn original_csv(&self, id: &str) -> Result<Option<Vec<u8>>, AppError> {
        self.fetch(id, "original_csv")
    }

    pub fn profile_json(&self, id: &str) -> Result<Option<String>, AppError> {
        self.fetch(id, "profile_json")
    }

    pub fn dashboard_json(&self, id: &str) -> Result<Option<String>, AppError> {
        self.fetch(id, "dashboard_json")
    }

    fn fetch<T: rusqlite::types::FromSql>(
        &self,
        id: &str,
        column: &'static str,
    ) -> Result<Option<T>, AppError> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM datasets WHERE id = ?1", column);
        let value = conn
            .query_row(&sql, params![id], |row| row.get(0))
            .optional()?;
        Ok(value)
    }
}
