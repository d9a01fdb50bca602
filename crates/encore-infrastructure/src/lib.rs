// SPDX-License-Identifier: GPL-3.0-or-later
pub mod repositories;
pub mod sheets;
pub mod sqlite_adapters;

use anyhow::{bail, Result};
use encore_config::{AppConfig, StorageBackend};
use reqwest::Client;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use repositories::LibraryStore;
pub use sheets::{GoogleSheetsClient, SheetLibraryStore, SheetValues, SheetsError};
pub use sqlite_adapters::SqliteLibraryStore;

pub fn http_client() -> Result<Client> {
    Ok(Client::builder()
        .pool_max_idle_per_host(8)
        .timeout(Duration::from_secs(20))
        .build()?)
}

/// Turn a relative `sqlite://` file URL into an absolute one with create mode,
/// creating the parent directory. In-memory and non-file URLs pass through.
fn normalize_sqlite_url(url: &str) -> Result<String> {
    if !url.starts_with("sqlite://") || url.starts_with("sqlite://:memory:") {
        return Ok(url.to_string());
    }
    let db_path = url.trim_start_matches("sqlite://");
    let path = Path::new(db_path);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
            info!(target: "infrastructure", path = %parent.display(), "created database directory");
        }
    }

    let absolute_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    // SQLite accepts forward slashes on every platform
    let path_str = absolute_path.to_string_lossy().replace('\\', "/");
    Ok(format!("sqlite://{}?mode=rwc", path_str))
}

/// Connect to the configured SQLite database and apply migrations.
pub async fn init_database(config: &AppConfig) -> Result<SqlitePool> {
    info!(target: "infrastructure", "initializing database");
    let db_url = normalize_sqlite_url(&config.database.url)?;

    info!(target: "infrastructure", db_url = %db_url, "connecting to database");
    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.pool_max_size)
        .connect(&db_url)
        .await?;

    info!(target: "infrastructure", "running migrations");
    sqlx::migrate!("../../migrations").run(&pool).await?;

    info!(target: "infrastructure", "database initialized successfully");
    Ok(pool)
}

/// Build the library store selected by `storage.backend`.
pub async fn open_library_store(config: &AppConfig) -> Result<Arc<dyn LibraryStore>> {
    match config.storage.backend {
        StorageBackend::Sqlite => {
            let pool = init_database(config).await?;
            Ok(Arc::new(SqliteLibraryStore::new(pool)))
        }
        StorageBackend::Sheets => {
            let sheets = &config.storage.sheets;
            if sheets.songs_spreadsheet_id.is_empty()
                || sheets.albums_spreadsheet_id.is_empty()
                || sheets.library_spreadsheet_id.is_empty()
            {
                bail!("storage.sheets requires songs, albums and library spreadsheet ids");
            }
            info!(target: "infrastructure", "using spreadsheet library store");
            let client = GoogleSheetsClient::new(
                http_client()?,
                sheets.base_url.clone(),
                sheets.access_token.clone(),
            );
            Ok(Arc::new(SheetLibraryStore::new(Arc::new(client), sheets)))
        }
    }
}
