//! Command handlers

pub mod analyze;
pub mod forecast;
pub mod soh;

use anyhow::Result;

use crate::config::Config;
use crate::ingest::{ColumnSelection, Upload};
use crate::store::{MemoryStore, RecordStore, SqliteStore};

/// The configured database, or a throwaway in-memory store for dry runs
pub async fn open_store(config: &Config, dry_run: bool) -> Result<Box<dyn RecordStore>> {
    if dry_run {
        log::info!("Dry run: writes go to an in-memory store");
        return Ok(Box::new(MemoryStore::new()));
    }
    let store = SqliteStore::connect(&config.database.path).await?;
    Ok(Box::new(store))
}

/// Load an upload and turn `--column` flags into a selection
pub fn load_upload(
    config: &Config,
    file: &std::path::Path,
    columns: &[String],
) -> Result<(Upload, ColumnSelection)> {
    let upload = Upload::from_path(file, config.import.max_upload_bytes)?;
    Ok((upload, ColumnSelection::from_labels(columns.to_vec())))
}
