//! Stockcast: spreadsheet ingestion for stock-on-hand snapshots and monthly
//! demand forecasts.
//!
//! Uploads go through [`ingest`] (header detection, column resolution,
//! coercion, chunked writes) into a [`store::RecordStore`]. Forecasts are read
//! back and pivoted by [`forecast`].

pub mod cli;
pub mod config;
pub mod forecast;
pub mod ingest;
pub mod soh;
pub mod store;

pub use config::Config;
pub use ingest::{ImportError, ImportReport};
