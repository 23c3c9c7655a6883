//! Monthly demand forecasts
//!
//! Forecasts are stored long-form, one [`MonthlyQuantity`] per product and
//! month, and reshaped into a wide table on every read.

pub mod export;
pub mod import;
pub mod query;
pub mod reshape;

use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::ingest::month::is_month_key;
use crate::store::Record;

pub use import::{ForecastPlan, import_forecast};
pub use query::{ForecastQuery, MonthWindow, fetch_forecast};
pub use reshape::{ColumnHeader, ForecastSummary, ForecastView, WideForecastRow, reshape};

/// The atomic forecast fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyQuantity {
    pub product_code: String,
    pub description: Option<String>,
    /// `YYYY-MM`
    pub month_key: String,
    pub quantity: u64,
}

impl MonthlyQuantity {
    /// Read a fact back from a `forecast_facts` row; malformed rows yield `None`
    pub fn from_record(record: &Record) -> Option<Self> {
        let product_code = record.get("product_code")?.as_str()?.to_string();
        let month_key = record.get("month_key")?.as_str()?.to_string();
        if !is_month_key(&month_key) {
            return None;
        }
        let quantity = match record.get("quantity")? {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f as u64)
            })?,
            _ => return None,
        };
        let description = record
            .get("description")
            .and_then(Value::as_str)
            .map(String::from);

        Some(Self {
            product_code,
            description,
            month_key,
            quantity,
        })
    }

    /// Row for the `forecasts` table
    pub fn to_store_record(&self, batch_id: Uuid) -> Record {
        let mut record = Record::new();
        record.insert("product_code".into(), json!(self.product_code));
        record.insert("month_key".into(), json!(self.month_key));
        record.insert("quantity".into(), json!(self.quantity));
        record.insert("import_batch_id".into(), json!(batch_id.to_string()));
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_from_record() {
        let fact = MonthlyQuantity::from_record(&record(json!({
            "product_code": "P1",
            "description": "Widget",
            "month_key": "2024-01",
            "quantity": 10
        })))
        .unwrap();
        assert_eq!(fact.quantity, 10);
        assert_eq!(fact.description.as_deref(), Some("Widget"));

        let no_description = MonthlyQuantity::from_record(&record(json!({
            "product_code": "P1",
            "description": null,
            "month_key": "2024-01",
            "quantity": 3.0
        })))
        .unwrap();
        assert_eq!(no_description.description, None);
        assert_eq!(no_description.quantity, 3);
    }

    #[test]
    fn test_from_record_rejects_malformed() {
        for bad in [
            json!({"product_code": "P1", "month_key": "Jan-24", "quantity": 1}),
            json!({"product_code": "P1", "month_key": "2024-01", "quantity": -1}),
            json!({"product_code": "P1", "month_key": "2024-01"}),
            json!({"month_key": "2024-01", "quantity": 1}),
        ] {
            assert_eq!(MonthlyQuantity::from_record(&record(bad)), None);
        }
    }
}
