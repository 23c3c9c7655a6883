//! SQLite-backed record store

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};

use super::{ColumnType, Filter, OrderBy, Record, RecordStore, Table};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS soh (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id TEXT NOT NULL UNIQUE,
        description TEXT,
        stock_on_hand REAL NOT NULL DEFAULT 0,
        default_uom TEXT,
        locations TEXT,
        ean TEXT,
        weight_kg REAL NOT NULL DEFAULT 0,
        volume_m3 REAL NOT NULL DEFAULT 0,
        import_batch_id TEXT,
        import_source TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_code TEXT NOT NULL UNIQUE,
        description TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS forecasts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_code TEXT NOT NULL REFERENCES products(product_code),
        month_key TEXT NOT NULL CHECK (month_key GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]'),
        quantity INTEGER NOT NULL CHECK (quantity >= 0),
        import_batch_id TEXT,
        UNIQUE (product_code, month_key)
    )
    "#,
    r#"
    CREATE VIEW IF NOT EXISTS forecast_facts AS
    SELECT f.product_code, p.description, f.month_key, f.quantity
    FROM forecasts f
    JOIN products p ON p.product_code = f.product_code
    "#,
];

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// [`RecordStore`] over a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) a database file and apply the schema
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        let store = Self { pool };
        store.apply_schema().await?;
        log::debug!("Opened SQLite store at {}", path.display());
        Ok(store)
    }

    /// Private in-memory database (single connection so the data survives)
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory database URL")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let store = Self { pool };
        store.apply_schema().await?;
        Ok(store)
    }

    async fn apply_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to apply database schema")?;
        }
        Ok(())
    }

    async fn write(
        &self,
        table: Table,
        records: &[Record],
        conflict_key: Option<&[&str]>,
    ) -> Result<()> {
        if !table.is_writable() {
            bail!("Table '{}' is read-only", table.name());
        }

        let mut tx = self.pool.begin().await.context("Failed to start transaction")?;

        for record in records {
            let columns: Vec<&str> = record.keys().map(String::as_str).collect();
            let sql = build_write_sql(table, &columns, conflict_key)?;

            let mut query = sqlx::query(&sql);
            for column in &columns {
                query = bind_value(query, &record[*column]);
            }
            query
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to write to {}", table.name()))?;
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn delete_all(&self, table: Table) -> Result<u64> {
        if !table.is_writable() {
            bail!("Table '{}' is read-only", table.name());
        }
        let result = sqlx::query(&format!("DELETE FROM {}", table.name()))
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to clear {}", table.name()))?;
        Ok(result.rows_affected())
    }

    async fn upsert(&self, table: Table, records: &[Record], conflict_key: &[&str]) -> Result<()> {
        if conflict_key.is_empty() {
            bail!("upsert requires a conflict key");
        }
        self.write(table, records, Some(conflict_key)).await
    }

    async fn insert(&self, table: Table, records: &[Record]) -> Result<()> {
        self.write(table, records, None).await
    }

    async fn query(
        &self,
        table: Table,
        filters: &[Filter],
        order_by: &[OrderBy],
    ) -> Result<Vec<Record>> {
        let (sql, params) = build_select_sql(table, filters, order_by)?;

        let mut query = sqlx::query(&sql);
        for param in &params {
            query = bind_value(query, param);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to query {}", table.name()))?;

        rows.iter().map(|row| decode_row(table, row)).collect()
    }
}

fn check_column(table: Table, column: &str) -> Result<()> {
    if !table.has_column(column) {
        bail!("Unknown column '{}' for table '{}'", column, table.name());
    }
    Ok(())
}

fn build_write_sql(table: Table, columns: &[&str], conflict_key: Option<&[&str]>) -> Result<String> {
    if columns.is_empty() {
        bail!("Cannot write an empty record to {}", table.name());
    }
    for column in columns {
        check_column(table, column)?;
    }

    let placeholders = vec!["?"; columns.len()].join(", ");
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.name(),
        columns.join(", "),
        placeholders
    );

    if let Some(keys) = conflict_key {
        for key in keys {
            check_column(table, key)?;
        }
        let updates: Vec<String> = columns
            .iter()
            .filter(|c| !keys.contains(*c))
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        if updates.is_empty() {
            sql.push_str(&format!(" ON CONFLICT ({}) DO NOTHING", keys.join(", ")));
        } else {
            sql.push_str(&format!(
                " ON CONFLICT ({}) DO UPDATE SET {}",
                keys.join(", "),
                updates.join(", ")
            ));
        }
    }

    Ok(sql)
}

fn build_select_sql(
    table: Table,
    filters: &[Filter],
    order_by: &[OrderBy],
) -> Result<(String, Vec<Value>)> {
    let columns: Vec<&str> = table.columns().iter().map(|(c, _)| *c).collect();
    let mut sql = format!("SELECT {} FROM {}", columns.join(", "), table.name());
    let mut params = Vec::with_capacity(filters.len());

    let mut clauses = Vec::with_capacity(filters.len());
    for filter in filters {
        check_column(table, filter.column())?;
        let clause = match filter {
            Filter::Eq(c, v) => {
                params.push(v.clone());
                format!("{c} = ?")
            }
            Filter::Gte(c, v) => {
                params.push(v.clone());
                format!("{c} >= ?")
            }
            Filter::Lte(c, v) => {
                params.push(v.clone());
                format!("{c} <= ?")
            }
            Filter::Contains(c, needle) => {
                params.push(json!(format!("%{}%", escape_like(&needle.to_lowercase()))));
                format!("LOWER({c}) LIKE ? ESCAPE '\\'")
            }
        };
        clauses.push(clause);
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    if !order_by.is_empty() {
        let mut orders = Vec::with_capacity(order_by.len());
        for order in order_by {
            check_column(table, &order.column)?;
            orders.push(format!(
                "{} {}",
                order.column,
                if order.ascending { "ASC" } else { "DESC" }
            ));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&orders.join(", "));
    }

    Ok((sql, params))
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(if *b { 1i64 } else { 0i64 }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

fn decode_row(table: Table, row: &SqliteRow) -> Result<Record> {
    let mut record = Record::new();
    for (column, kind) in table.columns() {
        let value = match kind {
            ColumnType::Text => row
                .try_get::<Option<String>, _>(*column)?
                .map(Value::String)
                .unwrap_or(Value::Null),
            ColumnType::Real => row
                .try_get::<Option<f64>, _>(*column)?
                .map(|f| json!(f))
                .unwrap_or(Value::Null),
            ColumnType::Integer => row
                .try_get::<Option<i64>, _>(*column)?
                .map(|i| json!(i))
                .unwrap_or(Value::Null),
        };
        record.insert(column.to_string(), value);
    }
    Ok(record)
}
