//! Long-to-wide pivot of forecast facts
//!
//! One row per product with a sparse column per month. Product order follows
//! first appearance in the input; month headers are sorted, which for
//! `YYYY-MM` keys is also chronological.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use super::MonthlyQuantity;
use crate::ingest::month::month_label;

/// Static columns that precede the month columns
pub const STATIC_HEADERS: [(&str, &str); 2] =
    [("product_code", "Product Code"), ("description", "Description")];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WideForecastRow {
    pub product_code: String,
    pub description: Option<String>,
    /// `month_key -> quantity`, only for months with data
    #[serde(flatten)]
    pub months: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnHeader {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSummary {
    pub total_products: usize,
    pub total_months: usize,
    /// Mean quantity per fact, two decimals
    pub avg_forecast: f64,
    /// Product with the largest total quantity
    pub top_product: Option<String>,
}

/// The wide table handed back to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastView {
    pub headers: Vec<ColumnHeader>,
    pub rows: Vec<WideForecastRow>,
    pub summary: ForecastSummary,
}

impl ForecastView {
    /// Month keys of the dynamic columns, in header order
    pub fn month_keys(&self) -> impl Iterator<Item = &str> {
        self.headers
            .iter()
            .skip(STATIC_HEADERS.len())
            .map(|h| h.key.as_str())
    }
}

/// Pivot facts into a [`ForecastView`].
///
/// Duplicate facts for the same product and month overwrite each other in
/// input order; every fact still counts toward the average.
pub fn reshape(facts: &[MonthlyQuantity]) -> ForecastView {
    let mut rows: Vec<WideForecastRow> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<u64> = Vec::new();
    let mut month_keys: BTreeSet<&str> = BTreeSet::new();
    let mut sum: u64 = 0;

    for fact in facts {
        let position = *positions.entry(fact.product_code.as_str()).or_insert_with(|| {
            rows.push(WideForecastRow {
                product_code: fact.product_code.clone(),
                description: fact.description.clone(),
                months: BTreeMap::new(),
            });
            totals.push(0);
            rows.len() - 1
        });

        rows[position]
            .months
            .insert(fact.month_key.clone(), fact.quantity);
        totals[position] = totals[position].saturating_add(fact.quantity);
        month_keys.insert(fact.month_key.as_str());
        sum = sum.saturating_add(fact.quantity);
    }

    let headers = STATIC_HEADERS
        .iter()
        .map(|(key, label)| ColumnHeader {
            key: key.to_string(),
            label: label.to_string(),
        })
        .chain(month_keys.iter().map(|key| ColumnHeader {
            key: key.to_string(),
            label: month_label(key).unwrap_or_else(|| key.to_string()),
        }))
        .collect();

    let avg_forecast = if facts.is_empty() {
        0.0
    } else {
        round2(sum as f64 / facts.len() as f64)
    };

    let mut top: Option<(usize, u64)> = None;
    for (i, total) in totals.iter().enumerate() {
        match top {
            Some((_, best)) if *total <= best => {}
            _ => top = Some((i, *total)),
        }
    }

    let summary = ForecastSummary {
        total_products: rows.len(),
        total_months: month_keys.len(),
        avg_forecast,
        top_product: top.map(|(i, _)| rows[i].product_code.clone()),
    };

    ForecastView {
        headers,
        rows,
        summary,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(code: &str, month: &str, quantity: u64) -> MonthlyQuantity {
        MonthlyQuantity {
            product_code: code.to_string(),
            description: Some(format!("{code} description")),
            month_key: month.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_single_product_many_months() {
        let facts: Vec<MonthlyQuantity> = ["2024-03", "2024-01", "2024-02", "2023-12"]
            .iter()
            .enumerate()
            .map(|(i, m)| fact("P1", m, i as u64))
            .collect();
        let view = reshape(&facts);

        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].months.len(), 4);
        assert_eq!(view.summary.total_months, 4);
        assert_eq!(
            view.month_keys().collect::<Vec<_>>(),
            vec!["2023-12", "2024-01", "2024-02", "2024-03"]
        );
    }

    #[test]
    fn test_headers_and_labels() {
        let view = reshape(&[fact("P1", "2024-02", 1), fact("P2", "2023-11", 1)]);
        let labels: Vec<&str> = view.headers.iter().map(|h| h.label.as_str()).collect();
        assert_eq!(labels, vec!["Product Code", "Description", "Nov-23", "Feb-24"]);
    }

    #[test]
    fn test_first_encounter_order_and_description() {
        let mut later = fact("P1", "2024-02", 2);
        later.description = Some("renamed".into());
        let view = reshape(&[fact("P2", "2024-01", 1), fact("P1", "2024-01", 1), later]);

        let codes: Vec<&str> = view.rows.iter().map(|r| r.product_code.as_str()).collect();
        assert_eq!(codes, vec!["P2", "P1"]);
        assert_eq!(view.rows[1].description.as_deref(), Some("P1 description"));
    }

    #[test]
    fn test_duplicate_month_last_write_wins() {
        let view = reshape(&[fact("P1", "2024-01", 4), fact("P1", "2024-01", 9)]);
        assert_eq!(view.rows[0].months["2024-01"], 9);
        assert_eq!(view.summary.total_months, 1);
        assert_eq!(view.summary.avg_forecast, 6.5);
    }

    #[test]
    fn test_summary() {
        let view = reshape(&[
            fact("P1", "2024-01", 10),
            fact("P1", "2024-02", 0),
            fact("P2", "2024-02", 5),
            fact("P3", "2024-03", 1),
        ]);
        assert_eq!(view.summary.total_products, 3);
        assert_eq!(view.summary.total_months, 3);
        assert_eq!(view.summary.avg_forecast, 4.0);
        assert_eq!(view.summary.top_product.as_deref(), Some("P1"));

        let rounded = reshape(&[fact("P1", "2024-01", 1), fact("P1", "2024-02", 1), fact("P2", "2024-01", 0)]);
        assert_eq!(rounded.summary.avg_forecast, 0.67);
    }

    #[test]
    fn test_top_product_tie_keeps_first() {
        let view = reshape(&[fact("B", "2024-01", 5), fact("A", "2024-01", 5)]);
        assert_eq!(view.summary.top_product.as_deref(), Some("B"));
    }

    #[test]
    fn test_empty_input() {
        let view = reshape(&[]);
        assert!(view.rows.is_empty());
        assert_eq!(view.headers.len(), STATIC_HEADERS.len());
        assert_eq!(view.summary.avg_forecast, 0.0);
        assert_eq!(view.summary.top_product, None);
    }

    #[test]
    fn test_wide_row_serializes_flat() {
        let view = reshape(&[fact("P1", "2024-01", 10)]);
        let json = serde_json::to_value(&view.rows[0]).unwrap();
        assert_eq!(json["product_code"], "P1");
        assert_eq!(json["2024-01"], 10);
    }
}
