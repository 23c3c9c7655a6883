//! Record store contract and implementations
//!
//! The import pipeline only talks to [`RecordStore`]. `SqliteStore` is the
//! persistent backend; `MemoryStore` backs dry runs and tests.

mod memory;
mod sqlite;

use std::cmp::Ordering;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A stored row, keyed by column name
pub type Record = Map<String, Value>;

/// Column storage class, used to validate names and decode rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Real,
    Integer,
}

/// Tables (and views) the pipeline reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Stock-on-hand snapshot rows
    Soh,
    /// Product master, keyed by `product_code`
    Products,
    /// Long-form monthly forecast quantities
    Forecasts,
    /// Read-only join of forecasts with product descriptions
    ForecastFacts,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Soh => "soh",
            Table::Products => "products",
            Table::Forecasts => "forecasts",
            Table::ForecastFacts => "forecast_facts",
        }
    }

    /// Columns callers may write, filter or order by
    pub fn columns(&self) -> &'static [(&'static str, ColumnType)] {
        match self {
            Table::Soh => &[
                ("product_id", ColumnType::Text),
                ("description", ColumnType::Text),
                ("stock_on_hand", ColumnType::Real),
                ("default_uom", ColumnType::Text),
                ("locations", ColumnType::Text),
                ("ean", ColumnType::Text),
                ("weight_kg", ColumnType::Real),
                ("volume_m3", ColumnType::Real),
                ("import_batch_id", ColumnType::Text),
                ("import_source", ColumnType::Text),
                ("created_at", ColumnType::Text),
            ],
            Table::Products => &[
                ("product_code", ColumnType::Text),
                ("description", ColumnType::Text),
            ],
            Table::Forecasts => &[
                ("product_code", ColumnType::Text),
                ("month_key", ColumnType::Text),
                ("quantity", ColumnType::Integer),
                ("import_batch_id", ColumnType::Text),
            ],
            Table::ForecastFacts => &[
                ("product_code", ColumnType::Text),
                ("description", ColumnType::Text),
                ("month_key", ColumnType::Text),
                ("quantity", ColumnType::Integer),
            ],
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().iter().any(|(c, _)| *c == column)
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, Table::ForecastFacts)
    }
}

/// A query predicate over one column
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Gte(String, Value),
    Lte(String, Value),
    /// Case-insensitive substring match on a text column
    Contains(String, String),
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::Gte(c, _) | Filter::Lte(c, _) | Filter::Contains(c, _) => c,
        }
    }

    /// Evaluate against an in-memory record
    pub fn matches(&self, record: &Record) -> bool {
        let value = record.get(self.column()).unwrap_or(&Value::Null);
        match self {
            Filter::Eq(_, expected) => compare_values(value, expected) == Ordering::Equal,
            Filter::Gte(_, bound) => {
                !value.is_null() && compare_values(value, bound) != Ordering::Less
            }
            Filter::Lte(_, bound) => {
                !value.is_null() && compare_values(value, bound) != Ordering::Greater
            }
            Filter::Contains(_, needle) => value
                .as_str()
                .map(|s| s.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: true,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: false,
        }
    }
}

/// Order JSON scalars: null first, then numbers, then strings
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// The relational store the import pipeline persists into.
///
/// `upsert` and `insert` are atomic per call: either every record in the
/// call lands or none do.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Remove every row from a table, returning the number removed
    async fn delete_all(&self, table: Table) -> Result<u64>;

    /// Insert or update records keyed by `conflict_key`
    async fn upsert(&self, table: Table, records: &[Record], conflict_key: &[&str]) -> Result<()>;

    /// Insert records unconditionally
    async fn insert(&self, table: Table, records: &[Record]) -> Result<()>;

    /// Read records matching every filter, in the given order
    async fn query(&self, table: Table, filters: &[Filter], order_by: &[OrderBy])
    -> Result<Vec<Record>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filters() {
        let r = record(json!({"month_key": "2024-03", "description": "Blue Widget", "quantity": 4}));

        assert!(Filter::Gte("month_key".into(), json!("2024-03")).matches(&r));
        assert!(Filter::Lte("month_key".into(), json!("2024-12")).matches(&r));
        assert!(!Filter::Gte("month_key".into(), json!("2024-04")).matches(&r));
        assert!(Filter::Contains("description".into(), "widg".into()).matches(&r));
        assert!(!Filter::Contains("description".into(), "gadget".into()).matches(&r));
        assert!(Filter::Eq("quantity".into(), json!(4)).matches(&r));
        assert!(!Filter::Gte("missing".into(), json!(0)).matches(&r));
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_values(&Value::Null, &json!("a")), Ordering::Less);
        assert_eq!(compare_values(&json!(1.0), &json!(1)), Ordering::Equal);
    }

    #[test]
    fn test_table_columns() {
        assert!(Table::Soh.has_column("stock_on_hand"));
        assert!(!Table::Soh.has_column("colour"));
        assert!(!Table::ForecastFacts.is_writable());
    }
}
