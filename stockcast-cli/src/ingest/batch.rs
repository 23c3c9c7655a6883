//! Chunked persistence with partial-failure accounting
//!
//! Rows are coerced and written one chunk at a time, strictly in order.
//! A bad row costs one error entry; a rejected chunk costs every valid record
//! in it. Neither stops the import. Nothing is retried.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use super::coerce::display_row_number;
use super::grid::Cell;
use crate::store::{RecordStore, Table};

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_ERROR_CAP: usize = 10;

/// Knobs for one import run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Rows per store call
    pub batch_size: usize,
    /// Maximum error messages kept in the report
    pub error_cap: usize,
    /// Clear the target tables before writing
    pub replace_existing: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            error_cap: DEFAULT_ERROR_CAP,
            replace_existing: false,
        }
    }
}

impl ImportOptions {
    pub fn replace(mut self, replace_existing: bool) -> Self {
        self.replace_existing = replace_existing;
        self
    }
}

/// Outcome of an import, returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub success_count: usize,
    pub error_count: usize,
    /// Entirely blank rows that were ignored
    pub skipped_count: usize,
    /// Data rows after the header
    pub total_rows: usize,
    /// Store rows written: records for SOH, monthly facts for forecasts
    pub rows_written: usize,
    pub batch_id: Uuid,
    /// First few failure descriptions; `error_count` is never capped
    pub errors: Vec<String>,
    pub columns_imported: Vec<String>,
    pub header_row: usize,
    #[serde(skip)]
    error_cap: usize,
}

impl ImportReport {
    pub fn new(batch_id: Uuid, total_rows: usize, error_cap: usize) -> Self {
        Self {
            success_count: 0,
            error_count: 0,
            skipped_count: 0,
            total_rows,
            rows_written: 0,
            batch_id,
            errors: Vec::new(),
            columns_imported: Vec::new(),
            header_row: 0,
            error_cap,
        }
    }

    /// Count one failed row
    pub fn record_row_error(&mut self, message: String) {
        self.error_count += 1;
        self.push_error(message);
    }

    /// Count a rejected chunk of `size` records
    pub fn record_chunk_failure(&mut self, size: usize, message: String) {
        self.error_count += size;
        self.push_error(message);
    }

    fn push_error(&mut self, message: String) {
        if self.errors.len() < self.error_cap {
            self.errors.push(message);
        }
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Import completed: {} records imported, {} errors. Imported columns: {}",
            self.success_count,
            self.error_count,
            self.columns_imported.join(", ")
        )
    }
}

/// What to do with the rows of one kind of import
#[async_trait]
pub trait ImportPlan: Send + Sync {
    type Item: Send + Sync;

    /// Tables emptied first when replacing existing data
    fn clear_tables(&self) -> &[Table];

    /// Coerce one data row; `Ok(None)` skips a blank row
    fn coerce(&self, row: &[Cell]) -> Result<Option<Self::Item>, String>;

    /// Write one chunk, returning the number of store rows written
    async fn persist(&self, store: &dyn RecordStore, chunk: &[Self::Item]) -> Result<usize>;
}

/// Drives an [`ImportPlan`] over the data rows of an upload
pub struct BatchImporter<'a> {
    store: &'a dyn RecordStore,
    options: ImportOptions,
}

impl<'a> BatchImporter<'a> {
    pub fn new(store: &'a dyn RecordStore, options: ImportOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Run the import. Store failures are folded into the report.
    pub async fn run<P: ImportPlan>(
        &self,
        plan: &P,
        rows: &[Vec<Cell>],
        header_index: usize,
        batch_id: Uuid,
    ) -> ImportReport {
        let mut report = ImportReport::new(batch_id, rows.len(), self.options.error_cap);
        report.header_row = header_index;

        if self.options.replace_existing {
            self.clear(plan.clear_tables()).await;
        }

        let batch_size = self.options.batch_size.max(1);
        log::info!(
            "Starting import {}: {} data rows in chunks of {}",
            batch_id,
            rows.len(),
            batch_size
        );

        for (chunk_index, chunk) in rows.chunks(batch_size).enumerate() {
            let batch_start = chunk_index * batch_size;
            let chunk_number = chunk_index + 1;
            let mut items = Vec::with_capacity(chunk.len());

            for (offset, row) in chunk.iter().enumerate() {
                match plan.coerce(row) {
                    Ok(Some(item)) => items.push(item),
                    Ok(None) => report.skipped_count += 1,
                    Err(message) => {
                        let row_number = display_row_number(header_index, batch_start, offset);
                        log::warn!("Row {} rejected: {}", row_number, message);
                        report.record_row_error(format!("Row {}: {}", row_number, message));
                    }
                }
            }

            if items.is_empty() {
                log::debug!("Chunk {} has no valid records; nothing to write", chunk_number);
                continue;
            }

            let first_row = display_row_number(header_index, batch_start, 0);
            log::info!(
                "Writing chunk {} ({} records, from row {})",
                chunk_number,
                items.len(),
                first_row
            );

            match plan.persist(self.store, &items).await {
                Ok(written) => {
                    report.success_count += items.len();
                    report.rows_written += written;
                }
                Err(e) => {
                    let last_row = display_row_number(header_index, batch_start, chunk.len() - 1);
                    log::error!("Chunk {} failed: {:#}", chunk_number, e);
                    report.record_chunk_failure(
                        items.len(),
                        format!("Batch {} (rows {}-{}): {}", chunk_number, first_row, last_row, e),
                    );
                }
            }
        }

        log::info!(
            "Import {} finished: {} succeeded, {} failed, {} blank",
            batch_id,
            report.success_count,
            report.error_count,
            report.skipped_count
        );
        report
    }

    /// Clearing is best-effort: failures are logged and the import continues
    async fn clear(&self, tables: &[Table]) {
        for table in tables {
            match self.store.delete_all(*table).await {
                Ok(removed) => log::info!("Cleared {} rows from {}", removed, table.name()),
                Err(e) => log::warn!(
                    "Could not clear existing data from {}: {:#}",
                    table.name(),
                    e
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Record};
    use serde_json::json;

    /// Minimal plan: first cell is the product id, `"!"` forces a row error
    struct IdPlan;

    #[async_trait]
    impl ImportPlan for IdPlan {
        type Item = Record;

        fn clear_tables(&self) -> &[Table] {
            &[Table::Products]
        }

        fn coerce(&self, row: &[Cell]) -> Result<Option<Record>, String> {
            match row.first().and_then(Cell::display_text) {
                None => Ok(None),
                Some(id) if id == "!" => Err("bad row".to_string()),
                Some(id) => {
                    let mut r = Record::new();
                    r.insert("product_code".into(), json!(id));
                    Ok(Some(r))
                }
            }
        }

        async fn persist(&self, store: &dyn RecordStore, chunk: &[Record]) -> Result<usize> {
            store.upsert(Table::Products, chunk, &["product_code"]).await?;
            Ok(chunk.len())
        }
    }

    fn rows(ids: &[&str]) -> Vec<Vec<Cell>> {
        ids.iter().map(|id| vec![Cell::text(*id)]).collect()
    }

    fn options(batch_size: usize) -> ImportOptions {
        ImportOptions {
            batch_size,
            ..ImportOptions::default()
        }
    }

    #[tokio::test]
    async fn test_counts_success_and_row_errors() {
        let store = MemoryStore::new();
        let importer = BatchImporter::new(&store, options(2));
        let report = importer
            .run(&IdPlan, &rows(&["A", "!", "B", "", "C"]), 0, Uuid::nil())
            .await;

        assert_eq!(report.success_count, 3);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.skipped_count, 1);
        assert_eq!(report.total_rows, 5);
        assert_eq!(report.errors, vec!["Row 3: bad row"]);
        assert_eq!(store.count(Table::Products), 3);
    }

    #[tokio::test]
    async fn test_chunk_failure_counts_whole_chunk() {
        let store = MemoryStore::new();
        store.fail_writes_for("B");
        let importer = BatchImporter::new(&store, options(2));
        let report = importer
            .run(&IdPlan, &rows(&["A", "B", "C", "D", "E"]), 4, Uuid::nil())
            .await;

        assert_eq!(report.success_count, 3);
        assert_eq!(report.error_count, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Batch 1 (rows 6-7):"), "{}", report.errors[0]);
        assert_eq!(store.count(Table::Products), 3);
    }

    #[tokio::test]
    async fn test_error_list_is_capped() {
        let store = MemoryStore::new();
        let importer = BatchImporter::new(&store, options(5));
        let bad = vec!["!"; 25];
        let report = importer.run(&IdPlan, &rows(&bad), 0, Uuid::nil()).await;

        assert_eq!(report.error_count, 25);
        assert_eq!(report.errors.len(), DEFAULT_ERROR_CAP);
        assert_eq!(report.errors[9], "Row 11: bad row");
    }

    #[tokio::test]
    async fn test_empty_chunk_makes_no_store_call() {
        let store = MemoryStore::new();
        let importer = BatchImporter::new(&store, options(2));
        let report = importer
            .run(&IdPlan, &rows(&["!", "", "A"]), 0, Uuid::nil())
            .await;

        assert_eq!(report.success_count, 1);
        assert_eq!(store.write_calls(), 1);
    }

    #[tokio::test]
    async fn test_clear_failure_is_not_fatal() {
        let store = MemoryStore::new();
        store.fail_deletes();
        let importer = BatchImporter::new(&store, options(10).replace(true));
        let report = importer.run(&IdPlan, &rows(&["A"]), 0, Uuid::nil()).await;

        assert_eq!(report.success_count, 1);
        assert_eq!(report.error_count, 0);
    }

    #[tokio::test]
    async fn test_replace_clears_first() {
        let store = MemoryStore::new();
        let importer = BatchImporter::new(&store, options(10));
        importer.run(&IdPlan, &rows(&["OLD"]), 0, Uuid::nil()).await;

        let importer = BatchImporter::new(&store, options(10).replace(true));
        importer.run(&IdPlan, &rows(&["A", "B"]), 0, Uuid::nil()).await;
        assert_eq!(store.count(Table::Products), 2);
    }
}
