//! Header row discovery
//!
//! Uploads often carry title rows, notes or blank lines above the real header.
//! Each candidate near the top is scored as `2 * density + month_tokens`, where
//! density is the share of non-empty cells. Dense rows full of `Jan-24` style
//! tokens win; ties go to the earliest row.

use super::error::ImportError;
use super::grid::{Cell, RawGrid};

/// Default number of leading rows considered as header candidates
pub const DEFAULT_SCAN_ROWS: usize = 10;

/// The selected header row
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderRow {
    /// Zero-based index into the grid
    pub index: usize,
    /// Labels in column order; empty cells become `""`
    pub labels: Vec<String>,
    pub score: f64,
}

impl HeaderRow {
    /// Find a label's column by exact (trimmed) match
    pub fn position(&self, label: &str) -> Option<usize> {
        let wanted = label.trim();
        self.labels.iter().position(|l| l == wanted)
    }

    /// Non-empty labels in column order
    pub fn non_empty_labels(&self) -> Vec<String> {
        self.labels.iter().filter(|l| !l.is_empty()).cloned().collect()
    }
}

/// Score one candidate row; `None` for rows with no content
pub fn score_row(row: &[Cell]) -> Option<f64> {
    if row.is_empty() {
        return None;
    }
    let filled = row.iter().filter(|c| !c.is_empty()).count();
    if filled == 0 {
        return None;
    }
    let density = filled as f64 / row.len() as f64;
    let month_tokens = row.iter().filter(|c| c.is_month_token()).count();
    Some(density * 2.0 + month_tokens as f64)
}

/// Pick the most plausible header row among the first `scan_rows` rows
pub fn locate_header(grid: &RawGrid, scan_rows: usize) -> Result<HeaderRow, ImportError> {
    let scanned = grid.len().min(scan_rows);
    let mut best: Option<(usize, f64)> = None;

    for (index, row) in grid.rows.iter().take(scanned).enumerate() {
        let Some(score) = score_row(row) else {
            continue;
        };
        log::trace!("Header candidate row {}: score {:.3}", index, score);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((index, score)),
        }
    }

    let (index, score) = best.ok_or(ImportError::HeaderNotFound { scanned })?;
    let labels = grid.rows[index].iter().map(Cell::header_label).collect();

    log::info!("Selected header row {} (score {:.2})", index, score);
    Ok(HeaderRow {
        index,
        labels,
        score,
    })
}
