//! Stock-on-hand snapshots
//!
//! Imports upsert into the `soh` table keyed by `product_id`. Each row carries
//! the batch and file it came from plus the time it was written.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::ImportConfig;
use crate::ingest::grid::read_grid;
use crate::ingest::{
    BatchImporter, Cell, ColumnSelection, ImportOptions, ImportPlan, ImportReport, ImportSchema,
    PreparedUpload, RecordCoercer, Upload, prepare,
};
use crate::store::{OrderBy, Record, RecordStore, Table};

const CONFLICT_KEY: &[&str] = &["product_id"];

/// Coerces rows with the resolved mapping and upserts them into `soh`
pub struct SohPlan<'a> {
    coercer: RecordCoercer<'a>,
    imported_at: String,
}

impl<'a> SohPlan<'a> {
    pub fn new(coercer: RecordCoercer<'a>) -> Self {
        Self {
            coercer,
            imported_at: Utc::now().to_rfc3339(),
        }
    }
}

#[async_trait]
impl ImportPlan for SohPlan<'_> {
    type Item = Record;

    fn clear_tables(&self) -> &[Table] {
        &[Table::Soh]
    }

    fn coerce(&self, row: &[Cell]) -> Result<Option<Record>, String> {
        let Some(record) = self.coercer.coerce_row(row)? else {
            return Ok(None);
        };
        let mut stored = record.to_store_record();
        stored.insert("created_at".into(), Value::String(self.imported_at.clone()));
        Ok(Some(stored))
    }

    async fn persist(&self, store: &dyn RecordStore, chunk: &[Record]) -> Result<usize> {
        store
            .upsert(Table::Soh, chunk, CONFLICT_KEY)
            .await
            .context("Failed to upsert stock-on-hand records")?;
        Ok(chunk.len())
    }
}

/// Parse, validate and import a stock-on-hand upload
pub async fn import_soh(
    store: &dyn RecordStore,
    upload: &Upload,
    selection: &ColumnSelection,
    config: &ImportConfig,
    replace_existing: bool,
) -> Result<ImportReport> {
    let grid = read_grid(upload)?;
    let prepared = prepare(
        &upload.filename,
        grid,
        selection,
        &ImportSchema::stock_on_hand(),
        config.header_scan_rows,
    )?;
    Ok(import_prepared(store, &prepared, config.options(replace_existing)).await)
}

/// Import an upload whose header and columns are already resolved
pub async fn import_prepared(
    store: &dyn RecordStore,
    prepared: &PreparedUpload,
    options: ImportOptions,
) -> ImportReport {
    let batch_id = Uuid::new_v4();
    let coercer = RecordCoercer::new(&prepared.mapping, batch_id, &prepared.filename);
    let plan = SohPlan::new(coercer);

    let mut report = BatchImporter::new(store, options)
        .run(&plan, prepared.data_rows(), prepared.header.index, batch_id)
        .await;
    report.columns_imported = prepared.mapping.canonical_names();
    log::info!("{}", report.summary_line());
    report
}

/// All stock-on-hand records ordered by product
pub async fn list(store: &dyn RecordStore) -> Result<Vec<Record>> {
    store
        .query(Table::Soh, &[], &[OrderBy::asc("product_id")])
        .await
        .context("Failed to fetch stock-on-hand records")
}

/// Provenance of the most recent import
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestImport {
    pub batch_id: Option<String>,
    pub source: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SohSummary {
    pub total_records: usize,
    pub latest_import: Option<LatestImport>,
}

pub async fn summary(store: &dyn RecordStore) -> Result<SohSummary> {
    let records = store
        .query(
            Table::Soh,
            &[],
            &[OrderBy::desc("created_at"), OrderBy::asc("product_id")],
        )
        .await
        .context("Failed to fetch stock-on-hand summary")?;

    let text = |r: &Record, column: &str| r.get(column).and_then(Value::as_str).map(String::from);
    let latest_import = records.first().map(|r| LatestImport {
        batch_id: text(r, "import_batch_id"),
        source: text(r, "import_source"),
        created_at: text(r, "created_at"),
    });

    Ok(SohSummary {
        total_records: records.len(),
        latest_import,
    })
}

/// Remove every stock-on-hand record
pub async fn clear(store: &dyn RecordStore) -> Result<u64> {
    let removed = store
        .delete_all(Table::Soh)
        .await
        .context("Failed to clear stock-on-hand records")?;
    log::info!("Cleared {} stock-on-hand records", removed);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{ImportError, UploadKind};
    use crate::store::MemoryStore;
    use serde_json::json;

    const SOH_CSV: &str = "\
Weekly stock export,,,
Product ID,Description,Stock On Hand,Weight (kg)
A1,Hex bolt,12,0.5
A2,Washer,abc,
,Orphan,3,1
A3,Nut,7,0.1
";

    fn upload(body: &str) -> Upload {
        Upload::new("soh.csv", UploadKind::Csv, body.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_import_soh_end_to_end() {
        let store = MemoryStore::new();
        let report = import_soh(
            &store,
            &upload(SOH_CSV),
            &ColumnSelection::All,
            &ImportConfig::default(),
            false,
        )
        .await
        .unwrap();

        assert_eq!(report.header_row, 1);
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.success_count, 3);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Row 5:"), "{}", report.errors[0]);
        assert_eq!(
            report.columns_imported,
            vec!["product_id", "description", "stock_on_hand", "weight_kg"]
        );

        let rows = list(&store).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1]["product_id"], json!("A2"));
        assert_eq!(rows[1]["stock_on_hand"], json!(0.0));
        assert_eq!(rows[0]["import_source"], json!("soh.csv"));
        assert_eq!(rows[0]["import_batch_id"], json!(report.batch_id.to_string()));
    }

    #[tokio::test]
    async fn test_reimport_with_replace_keeps_count() {
        let store = MemoryStore::new();
        let config = ImportConfig::default();
        for _ in 0..2 {
            import_soh(&store, &upload(SOH_CSV), &ColumnSelection::All, &config, true)
                .await
                .unwrap();
        }
        assert_eq!(store.count(Table::Soh), 3);
    }

    #[tokio::test]
    async fn test_reimport_without_replace_upserts() {
        let store = MemoryStore::new();
        let config = ImportConfig::default();
        for _ in 0..2 {
            import_soh(&store, &upload(SOH_CSV), &ColumnSelection::All, &config, false)
                .await
                .unwrap();
        }
        assert_eq!(store.count(Table::Soh), 3);
    }

    #[tokio::test]
    async fn test_unsupported_selection_writes_nothing() {
        let store = MemoryStore::new();
        let body = "Product ID,Colour,Size\nA1,red,L\n";
        let err = import_soh(
            &store,
            &upload(body),
            &ColumnSelection::All,
            &ImportConfig::default(),
            true,
        )
        .await
        .unwrap_err();

        match err.downcast_ref::<ImportError>() {
            Some(ImportError::UnsupportedColumn { offending, .. }) => {
                assert_eq!(offending, &vec!["colour".to_string(), "size".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_selected_columns_only() {
        let store = MemoryStore::new();
        let selection = ColumnSelection::from_labels(vec!["Product ID".into(), "Stock On Hand".into()]);
        let report = import_soh(
            &store,
            &upload(SOH_CSV),
            &selection,
            &ImportConfig::default(),
            false,
        )
        .await
        .unwrap();

        assert_eq!(report.columns_imported, vec!["product_id", "stock_on_hand"]);
        let rows = list(&store).await.unwrap();
        assert!(rows[0].get("description").is_none());
    }

    #[tokio::test]
    async fn test_summary_and_clear() {
        let store = MemoryStore::new();
        let empty = summary(&store).await.unwrap();
        assert_eq!(empty.total_records, 0);
        assert_eq!(empty.latest_import, None);

        let report = import_soh(
            &store,
            &upload(SOH_CSV),
            &ColumnSelection::All,
            &ImportConfig::default(),
            false,
        )
        .await
        .unwrap();

        let s = summary(&store).await.unwrap();
        assert_eq!(s.total_records, 3);
        let latest = s.latest_import.unwrap();
        assert_eq!(latest.batch_id, Some(report.batch_id.to_string()));
        assert_eq!(latest.source.as_deref(), Some("soh.csv"));

        assert_eq!(clear(&store).await.unwrap(), 3);
        assert_eq!(store.count(Table::Soh), 0);
    }
}
