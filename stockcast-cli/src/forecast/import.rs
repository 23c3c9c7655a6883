//! Forecast uploads: one product per row, one fact per filled month column

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use super::MonthlyQuantity;
use crate::config::ImportConfig;
use crate::ingest::grid::read_grid;
use crate::ingest::{
    BatchImporter, Cell, ColumnSelection, ImportOptions, ImportPlan, ImportReport, ImportSchema,
    PreparedUpload, RecordCoercer, Upload, prepare,
};
use crate::store::{Record, RecordStore, Table};

/// A coerced forecast row
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub product_code: String,
    pub description: Option<String>,
    pub facts: Vec<MonthlyQuantity>,
}

impl ForecastRow {
    fn product_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("product_code".into(), json!(self.product_code));
        record.insert("description".into(), json!(self.description));
        record
    }
}

/// Parse a quantity cell.
///
/// Numbers are truncated toward zero. Empty and non-numeric cells carry no
/// forecast; negative numbers are rejected.
pub fn coerce_quantity(cell: &Cell) -> Result<Option<u64>, String> {
    let value = match cell {
        Cell::Number(f) => *f,
        Cell::Text(s) => match s.trim().parse::<f64>() {
            Ok(f) => f,
            Err(_) => return Ok(None),
        },
        Cell::Empty | Cell::Date(_) => return Ok(None),
    };
    if !value.is_finite() {
        return Ok(None);
    }
    if value < 0.0 {
        return Err(format!("negative forecast quantity {}", value));
    }
    Ok(Some(value.trunc() as u64))
}

pub struct ForecastPlan<'a> {
    coercer: RecordCoercer<'a>,
    batch_id: Uuid,
}

impl<'a> ForecastPlan<'a> {
    pub fn new(coercer: RecordCoercer<'a>, batch_id: Uuid) -> Self {
        Self { coercer, batch_id }
    }
}

#[async_trait]
impl ImportPlan for ForecastPlan<'_> {
    type Item = ForecastRow;

    fn clear_tables(&self) -> &[Table] {
        &[Table::Forecasts]
    }

    fn coerce(&self, row: &[Cell]) -> Result<Option<ForecastRow>, String> {
        let Some(record) = self.coercer.coerce_row(row)? else {
            return Ok(None);
        };
        let description = record
            .get("description")
            .and_then(|v| v.as_text())
            .map(String::from);

        let mut facts = Vec::new();
        for month in &self.coercer.mapping().months {
            let cell = row.get(month.index).unwrap_or(&Cell::Empty);
            let quantity = coerce_quantity(cell)
                .map_err(|e| format!("{} in column '{}'", e, month.label))?;
            if let Some(quantity) = quantity {
                facts.push(MonthlyQuantity {
                    product_code: record.product_id.clone(),
                    description: description.clone(),
                    month_key: month.key.clone(),
                    quantity,
                });
            }
        }

        Ok(Some(ForecastRow {
            product_code: record.product_id,
            description,
            facts,
        }))
    }

    // Products and facts are two store calls. When the facts call fails the
    // chunk is reported as failed, but its products stay written.
    async fn persist(&self, store: &dyn RecordStore, chunk: &[ForecastRow]) -> Result<usize> {
        let products: Vec<Record> = chunk.iter().map(ForecastRow::product_record).collect();
        store
            .upsert(Table::Products, &products, &["product_code"])
            .await
            .context("Failed to upsert products")?;

        let facts: Vec<Record> = chunk
            .iter()
            .flat_map(|row| row.facts.iter())
            .map(|fact| fact.to_store_record(self.batch_id))
            .collect();
        if !facts.is_empty() {
            store
                .upsert(Table::Forecasts, &facts, &["product_code", "month_key"])
                .await
                .context("Failed to upsert forecast quantities")?;
        }
        Ok(facts.len())
    }
}

/// Parse, validate and import a forecast upload
pub async fn import_forecast(
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
        &ImportSchema::forecast(),
        config.header_scan_rows,
    )?;
    if prepared.mapping.months.is_empty() {
        log::warn!(
            "No month columns found in '{}'; only products will be imported",
            upload.filename
        );
    }
    Ok(import_prepared(store, &prepared, config.options(replace_existing)).await)
}

pub async fn import_prepared(
    store: &dyn RecordStore,
    prepared: &PreparedUpload,
    options: ImportOptions,
) -> ImportReport {
    let batch_id = Uuid::new_v4();
    let coercer = RecordCoercer::new(&prepared.mapping, batch_id, &prepared.filename);
    let plan = ForecastPlan::new(coercer, batch_id);

    let mut report = BatchImporter::new(store, options)
        .run(&plan, prepared.data_rows(), prepared.header.index, batch_id)
        .await;
    report.columns_imported = prepared.mapping.canonical_names();
    log::info!(
        "{} ({} forecast entries)",
        report.summary_line(),
        report.rows_written
    );
    report
}
