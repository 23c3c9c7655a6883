//! Forecast retrieval filters

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

use super::MonthlyQuantity;
use super::reshape::{ForecastView, reshape};
use crate::ingest::month::{add_months, month_key_for_date};
use crate::store::{Filter, OrderBy, RecordStore, Table};

/// Largest `months` window accepted (a century)
pub const MAX_WINDOW_MONTHS: u32 = 1200;

/// How many calendar months to show, starting with the current one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthWindow {
    #[default]
    All,
    Next(u32),
}

impl FromStr for MonthWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(MonthWindow::All);
        }
        match s.parse::<u32>() {
            Ok(n) if (1..=MAX_WINDOW_MONTHS).contains(&n) => Ok(MonthWindow::Next(n)),
            _ => Err(format!(
                "Invalid months value '{}': expected 'all' or a number from 1 to {}",
                s, MAX_WINDOW_MONTHS
            )),
        }
    }
}

impl fmt::Display for MonthWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonthWindow::All => write!(f, "all"),
            MonthWindow::Next(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForecastQuery {
    pub months: MonthWindow,
    /// Case-insensitive substring of the product description
    pub search: Option<String>,
}

impl ForecastQuery {
    /// Store filters for this query as of `today`
    pub fn to_filters(&self, today: NaiveDate) -> Vec<Filter> {
        let mut filters = Vec::new();

        if let MonthWindow::Next(n) = self.months {
            let start = month_key_for_date(today);
            if let Some(end) = add_months(&start, n.saturating_sub(1)) {
                filters.push(Filter::Gte("month_key".into(), json!(start)));
                filters.push(Filter::Lte("month_key".into(), json!(end)));
            }
        }

        if let Some(search) = self.search.as_deref().map(str::trim) {
            if !search.is_empty() {
                filters.push(Filter::Contains("description".into(), search.to_string()));
            }
        }

        filters
    }
}

/// Fetch facts matching `query` and pivot them
pub async fn fetch_forecast(
    store: &dyn RecordStore,
    query: &ForecastQuery,
    today: NaiveDate,
) -> Result<ForecastView> {
    let filters = query.to_filters(today);
    let records = store
        .query(
            Table::ForecastFacts,
            &filters,
            &[OrderBy::asc("month_key"), OrderBy::asc("product_code")],
        )
        .await
        .context("Failed to fetch forecast records")?;

    let total = records.len();
    let facts: Vec<MonthlyQuantity> = records
        .iter()
        .filter_map(MonthlyQuantity::from_record)
        .collect();
    if facts.len() != total {
        log::warn!("Skipped {} malformed forecast rows", total - facts.len());
    }

    let view = reshape(&facts);
    log::info!(
        "Fetched forecasts (months={}, search={:?}): {} products, {} months",
        query.months,
        query.search,
        view.summary.total_products,
        view.summary.total_months
    );
    Ok(view)
}
