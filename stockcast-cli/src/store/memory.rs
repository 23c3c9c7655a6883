//! In-process record store
//!
//! Mirrors the SQLite backend's semantics closely enough for dry runs and
//! tests, and can be told to fail specific calls.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::Value;

use super::{Filter, OrderBy, Record, RecordStore, Table, compare_values};

/// Columns checked when deciding whether a write should be failed
const IDENTIFIER_COLUMNS: [&str; 2] = ["product_id", "product_code"];

#[derive(Debug, Default)]
struct Failures {
    deletes: bool,
    write_ids: HashSet<String>,
}

/// Thread-safe in-memory implementation of [`RecordStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<Table, Vec<Record>>>,
    failures: Mutex<Failures>,
    write_calls: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `delete_all` call fail
    pub fn fail_deletes(&self) {
        if let Ok(mut f) = self.failures.lock() {
            f.deletes = true;
        }
    }

    /// Fail any write whose records carry this identifier
    pub fn fail_writes_for(&self, identifier: &str) {
        if let Ok(mut f) = self.failures.lock() {
            f.write_ids.insert(identifier.to_string());
        }
    }

    /// Number of `upsert`/`insert` calls that reached the store
    pub fn write_calls(&self) -> usize {
        self.write_calls.lock().map(|c| *c).unwrap_or(0)
    }

    /// Number of rows currently held in a table
    pub fn count(&self, table: Table) -> usize {
        self.tables
            .lock()
            .map(|t| t.get(&table).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }

    fn check_write(&self, table: Table, records: &[Record]) -> Result<()> {
        if let Ok(mut calls) = self.write_calls.lock() {
            *calls += 1;
        }
        if !table.is_writable() {
            bail!("Table '{}' is read-only", table.name());
        }
        for record in records {
            if let Some(column) = record.keys().find(|k| !table.has_column(k)) {
                bail!("Unknown column '{}' for table '{}'", column, table.name());
            }
        }

        let failures = self
            .failures
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        for record in records {
            for column in IDENTIFIER_COLUMNS {
                if let Some(id) = record.get(column).and_then(Value::as_str) {
                    if failures.write_ids.contains(id) {
                        bail!("simulated write failure for '{}' in '{}'", id, table.name());
                    }
                }
            }
        }
        Ok(())
    }

    fn forecast_facts(tables: &HashMap<Table, Vec<Record>>) -> Vec<Record> {
        let products = tables.get(&Table::Products).map(Vec::as_slice).unwrap_or(&[]);
        let forecasts = tables.get(&Table::Forecasts).map(Vec::as_slice).unwrap_or(&[]);

        forecasts
            .iter()
            .filter_map(|f| {
                let code = f.get("product_code")?;
                let product = products.iter().find(|p| p.get("product_code") == Some(code))?;
                let mut fact = Record::new();
                fact.insert("product_code".into(), code.clone());
                fact.insert(
                    "description".into(),
                    product.get("description").cloned().unwrap_or(Value::Null),
                );
                fact.insert(
                    "month_key".into(),
                    f.get("month_key").cloned().unwrap_or(Value::Null),
                );
                fact.insert(
                    "quantity".into(),
                    f.get("quantity").cloned().unwrap_or(Value::Null),
                );
                Some(fact)
            })
            .collect()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn delete_all(&self, table: Table) -> Result<u64> {
        let fail = self.failures.lock().map(|f| f.deletes).unwrap_or(false);
        if fail {
            bail!("simulated delete failure for '{}'", table.name());
        }
        if !table.is_writable() {
            bail!("Table '{}' is read-only", table.name());
        }
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        let removed = tables.remove(&table).map(|rows| rows.len()).unwrap_or(0);
        Ok(removed as u64)
    }

    async fn upsert(&self, table: Table, records: &[Record], conflict_key: &[&str]) -> Result<()> {
        self.check_write(table, records)?;
        if conflict_key.is_empty() {
            bail!("upsert requires a conflict key");
        }
        for record in records {
            if let Some(key) = conflict_key.iter().find(|k| !record.contains_key(**k)) {
                bail!("Record is missing conflict key '{}'", key);
            }
        }

        let mut tables = self
            .tables
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        let rows = tables.entry(table).or_default();

        for record in records {
            let existing = rows
                .iter_mut()
                .find(|row| conflict_key.iter().all(|k| row.get(*k) == record.get(*k)));
            match existing {
                Some(row) => {
                    for (k, v) in record {
                        row.insert(k.clone(), v.clone());
                    }
                }
                None => rows.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn insert(&self, table: Table, records: &[Record]) -> Result<()> {
        self.check_write(table, records)?;
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        tables.entry(table).or_default().extend(records.iter().cloned());
        Ok(())
    }

    async fn query(
        &self,
        table: Table,
        filters: &[Filter],
        order_by: &[OrderBy],
    ) -> Result<Vec<Record>> {
        for column in filters
            .iter()
            .map(Filter::column)
            .chain(order_by.iter().map(|o| o.column.as_str()))
        {
            if !table.has_column(column) {
                bail!("Unknown column '{}' for table '{}'", column, table.name());
            }
        }

        let tables = self
            .tables
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        let source = match table {
            Table::ForecastFacts => Self::forecast_facts(&tables),
            other => tables.get(&other).cloned().unwrap_or_default(),
        };

        let mut rows: Vec<Record> = source
            .into_iter()
            .filter(|r| filters.iter().all(|f| f.matches(r)))
            .collect();

        rows.sort_by(|a, b| {
            for order in order_by {
                let null = Value::Null;
                let ord = compare_values(
                    a.get(&order.column).unwrap_or(&null),
                    b.get(&order.column).unwrap_or(&null),
                );
                let ord = if order.ascending { ord } else { ord.reverse() };
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        });

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_upsert_overwrites_on_conflict() {
        let store = MemoryStore::new();
        store
            .upsert(
                Table::Products,
                &[record(json!({"product_code": "P1", "description": "Old"}))],
                &["product_code"],
            )
            .await
            .unwrap();
        store
            .upsert(
                Table::Products,
                &[
                    record(json!({"product_code": "P1", "description": "New"})),
                    record(json!({"product_code": "P2", "description": "Other"})),
                ],
                &["product_code"],
            )
            .await
            .unwrap();

        let rows = store
            .query(Table::Products, &[], &[OrderBy::asc("product_code")])
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["description"], json!("New"));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::new();
        store.fail_writes_for("BAD");
        store.fail_deletes();

        let err = store
            .insert(Table::Products, &[record(json!({"product_code": "BAD"}))])
            .await;
        assert!(err.is_err());
        assert_eq!(store.count(Table::Products), 0);
        assert!(store.delete_all(Table::Products).await.is_err());
        assert_eq!(store.write_calls(), 1);
    }

    #[tokio::test]
    async fn test_forecast_facts_join() {
        let store = MemoryStore::new();
        store
            .insert(
                Table::Products,
                &[record(json!({"product_code": "P1", "description": "Widget"}))],
            )
            .await
            .unwrap();
        store
            .insert(
                Table::Forecasts,
                &[
                    record(json!({"product_code": "P1", "month_key": "2024-02", "quantity": 3})),
                    record(json!({"product_code": "P1", "month_key": "2024-01", "quantity": 7})),
                    record(json!({"product_code": "ORPHAN", "month_key": "2024-01", "quantity": 1})),
                ],
            )
            .await
            .unwrap();

        let facts = store
            .query(
                Table::ForecastFacts,
                &[Filter::Contains("description".into(), "WID".into())],
                &[OrderBy::asc("month_key")],
            )
            .await
            .unwrap();

        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0]["month_key"], json!("2024-01"));
        assert_eq!(facts[0]["description"], json!("Widget"));
    }

    #[tokio::test]
    async fn test_rejects_unknown_columns() {
        let store = MemoryStore::new();
        assert!(
            store
                .insert(Table::Soh, &[record(json!({"colour": "red"}))])
                .await
                .is_err()
        );
        assert!(
            store
                .query(Table::Soh, &[], &[OrderBy::asc("colour")])
                .await
                .is_err()
        );
    }
}
