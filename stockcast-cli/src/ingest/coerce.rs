//! Per-row coercion of raw cells into typed import records

use serde::Serialize;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::columns::{ColumnMapping, FieldCategory};
use super::grid::Cell;

/// A coerced cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Text(String),
    Number(f64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Number(n) => json!(*n),
        }
    }
}

/// One coerced data row plus provenance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRecord {
    pub product_id: String,
    /// Canonical fields in mapping order
    pub fields: Vec<(String, FieldValue)>,
    pub batch_id: Uuid,
    pub source_filename: String,
}

impl ImportRecord {
    pub fn get(&self, canonical: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == canonical)
            .map(|(_, v)| v)
    }

    /// Flatten into a store record with provenance columns
    pub fn to_store_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        for (name, value) in &self.fields {
            record.insert(name.clone(), value.to_json());
        }
        record.insert("product_id".into(), Value::String(self.product_id.clone()));
        record.insert(
            "import_batch_id".into(),
            Value::String(self.batch_id.to_string()),
        );
        record.insert(
            "import_source".into(),
            Value::String(self.source_filename.clone()),
        );
        record
    }
}

/// Human-facing, 1-based spreadsheet row number of a data row.
///
/// `header_index` is the zero-based header row, `batch_start` the offset of
/// the chunk within the data rows and `in_batch_offset` the row's offset in
/// that chunk.
pub fn display_row_number(header_index: usize, batch_start: usize, in_batch_offset: usize) -> usize {
    header_index + batch_start + in_batch_offset + 2
}

/// Whether every cell in a row is empty
pub fn is_blank_row(row: &[Cell]) -> bool {
    row.iter().all(Cell::is_empty)
}

/// Numeric coercion: empty and unparseable values become `0`, never NaN
pub fn coerce_numeric(cell: &Cell) -> f64 {
    let value = match cell {
        Cell::Number(f) => *f,
        Cell::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Cell::Empty | Cell::Date(_) => 0.0,
    };
    if value.is_finite() { value } else { 0.0 }
}

/// Text coercion: empty becomes null
pub fn coerce_text(cell: &Cell) -> FieldValue {
    match cell.display_text() {
        Some(s) => FieldValue::Text(s),
        None => FieldValue::Null,
    }
}

/// Turns data rows into [`ImportRecord`]s using a resolved mapping
#[derive(Debug)]
pub struct RecordCoercer<'a> {
    mapping: &'a ColumnMapping,
    batch_id: Uuid,
    source_filename: &'a str,
}

impl<'a> RecordCoercer<'a> {
    pub fn new(mapping: &'a ColumnMapping, batch_id: Uuid, source_filename: &'a str) -> Self {
        Self {
            mapping,
            batch_id,
            source_filename,
        }
    }

    pub fn mapping(&self) -> &ColumnMapping {
        self.mapping
    }

    /// Coerce one row.
    ///
    /// `Ok(None)` for entirely blank rows, `Err` with a row-level message when
    /// the row cannot become a record.
    pub fn coerce_row(&self, row: &[Cell]) -> Result<Option<ImportRecord>, String> {
        if is_blank_row(row) {
            return Ok(None);
        }

        let mut product_id: Option<String> = None;
        let mut fields = Vec::with_capacity(self.mapping.fields.len());

        for column in &self.mapping.fields {
            let cell = row.get(column.index).unwrap_or(&Cell::Empty);
            let value = match column.category {
                FieldCategory::Identifier => {
                    let id = cell.display_text().ok_or_else(|| {
                        format!("missing product identifier in column '{}'", column.label)
                    })?;
                    product_id.get_or_insert_with(|| id.clone());
                    FieldValue::Text(id)
                }
                FieldCategory::Numeric => FieldValue::Number(coerce_numeric(cell)),
                FieldCategory::Text => coerce_text(cell),
            };
            fields.push((column.canonical.clone(), value));
        }

        let product_id = product_id.ok_or_else(|| "no identifier column mapped".to_string())?;

        Ok(Some(ImportRecord {
            product_id,
            fields,
            batch_id: self.batch_id,
            source_filename: self.source_filename.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::columns::{ColumnSelection, ImportSchema, resolve_columns};
    use crate::ingest::header::HeaderRow;

    fn soh_mapping() -> ColumnMapping {
        let header = HeaderRow {
            index: 0,
            labels: ["Product ID", "Description", "Stock On Hand", "Weight (kg)", "EAN"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            score: 0.0,
        };
        resolve_columns(&header, &ColumnSelection::All, &ImportSchema::stock_on_hand()).unwrap()
    }

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|s| Cell::text(*s)).collect()
    }

    #[test]
    fn test_coerces_by_category() {
        let mapping = soh_mapping();
        let coercer = RecordCoercer::new(&mapping, Uuid::nil(), "soh.xlsx");

        let record = coercer
            .coerce_row(&[
                Cell::Number(1001.0),
                Cell::text("Hex bolt"),
                Cell::text("12.5"),
                Cell::Empty,
                Cell::Number(5012345678900.0),
            ])
            .unwrap()
            .unwrap();

        assert_eq!(record.product_id, "1001");
        assert_eq!(record.get("description"), Some(&FieldValue::Text("Hex bolt".into())));
        assert_eq!(record.get("stock_on_hand"), Some(&FieldValue::Number(12.5)));
        assert_eq!(record.get("weight_kg"), Some(&FieldValue::Number(0.0)));
        assert_eq!(record.get("ean"), Some(&FieldValue::Text("5012345678900".into())));
        assert_eq!(record.source_filename, "soh.xlsx");
    }

    #[test]
    fn test_numeric_fields_never_nan() {
        for raw in ["abc", "NaN", "inf", "-inf", "", "1,234"] {
            let value = coerce_numeric(&Cell::text(raw));
            assert!(value.is_finite(), "{raw}");
            assert_eq!(value, 0.0, "{raw}");
        }
        assert_eq!(coerce_numeric(&Cell::Number(f64::NAN)), 0.0);
        assert_eq!(coerce_numeric(&Cell::text(" 7 ")), 7.0);
    }

    #[test]
    fn test_missing_identifier_is_row_error() {
        let mapping = soh_mapping();
        let coercer = RecordCoercer::new(&mapping, Uuid::nil(), "soh.xlsx");

        let err = coercer.coerce_row(&row(&["", "Widget", "3"])).unwrap_err();
        assert!(err.contains("Product ID"), "{err}");
    }

    #[test]
    fn test_blank_and_short_rows() {
        let mapping = soh_mapping();
        let coercer = RecordCoercer::new(&mapping, Uuid::nil(), "soh.xlsx");

        assert_eq!(coercer.coerce_row(&row(&["", "", ""])).unwrap(), None);
        assert_eq!(coercer.coerce_row(&[]).unwrap(), None);

        let short = coercer.coerce_row(&row(&["A1"])).unwrap().unwrap();
        assert_eq!(short.get("description"), Some(&FieldValue::Null));
        assert_eq!(short.get("stock_on_hand"), Some(&FieldValue::Number(0.0)));
    }

    #[test]
    fn test_store_record_carries_provenance() {
        let mapping = soh_mapping();
        let batch = Uuid::new_v4();
        let coercer = RecordCoercer::new(&mapping, batch, "soh.csv");
        let record = coercer.coerce_row(&row(&["A1", "Nut"])).unwrap().unwrap();

        let stored = record.to_store_record();
        assert_eq!(stored["product_id"], json!("A1"));
        assert_eq!(stored["description"], json!("Nut"));
        assert_eq!(stored["import_batch_id"], json!(batch.to_string()));
        assert_eq!(stored["import_source"], json!("soh.csv"));
    }

    #[test]
    fn test_display_row_number() {
        assert_eq!(display_row_number(0, 0, 0), 2);
        assert_eq!(display_row_number(1, 0, 0), 3);
        assert_eq!(display_row_number(3, 100, 7), 112);
    }
}
