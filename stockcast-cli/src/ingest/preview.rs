//! Header preview for choosing columns before an import

use serde::Serialize;

use super::error::ImportError;
use super::grid::RawGrid;
use super::header::locate_header;
use super::month::parse_month_key;

pub const DEFAULT_SAMPLE_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthHeader {
    pub label: String,
    pub key: String,
}

/// What the importer would see in an upload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderPreview {
    pub filename: String,
    pub header_row_index: usize,
    /// Non-empty header labels, in column order
    pub headers: Vec<String>,
    pub month_columns: Vec<MonthHeader>,
    /// Leading data rows rendered as text, aligned with the full header row
    pub sample_rows: Vec<Vec<String>>,
    /// Data rows after the header
    pub total_rows: usize,
}

impl HeaderPreview {
    pub fn build(
        filename: &str,
        grid: &RawGrid,
        scan_rows: usize,
        sample_rows: usize,
    ) -> Result<Self, ImportError> {
        let header = locate_header(grid, scan_rows)?;
        let data = grid.data_rows(header.index);
        let width = header.labels.len();

        let month_columns = header
            .labels
            .iter()
            .filter_map(|label| {
                parse_month_key(label).map(|key| MonthHeader {
                    label: label.clone(),
                    key,
                })
            })
            .collect();

        let sample_rows = data
            .iter()
            .take(sample_rows)
            .map(|row| {
                (0..width)
                    .map(|i| {
                        row.get(i)
                            .and_then(|c| c.display_text())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();

        Ok(Self {
            filename: filename.to_string(),
            header_row_index: header.index,
            headers: header.non_empty_labels(),
            month_columns,
            sample_rows,
            total_rows: data.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_forecast_grid() {
        let grid = RawGrid::from_text_rows(vec![
            vec!["Title"],
            vec!["Product", "Description", "Jan-24", "Feb-24"],
            vec!["P1", "Widget", "10", "0"],
            vec!["P2", "Gadget", "", "5"],
        ]);
        let preview = HeaderPreview::build("forecast.csv", &grid, 10, 1).unwrap();

        assert_eq!(preview.header_row_index, 1);
        assert_eq!(preview.headers, vec!["Product", "Description", "Jan-24", "Feb-24"]);
        assert_eq!(
            preview.month_columns,
            vec![
                MonthHeader { label: "Jan-24".into(), key: "2024-01".into() },
                MonthHeader { label: "Feb-24".into(), key: "2024-02".into() },
            ]
        );
        assert_eq!(preview.sample_rows, vec![vec!["P1", "Widget", "10", "0"]]);
        assert_eq!(preview.total_rows, 2);
    }

    #[test]
    fn test_preview_pads_short_rows() {
        let grid = RawGrid::from_text_rows(vec![vec!["Product ID", "EAN"], vec!["A1"]]);
        let preview = HeaderPreview::build("soh.csv", &grid, 10, 5).unwrap();
        assert_eq!(preview.sample_rows, vec![vec!["A1", ""]]);
    }

    #[test]
    fn test_preview_of_blank_grid_fails() {
        let grid = RawGrid::from_text_rows(vec![vec!["", ""]]);
        assert!(HeaderPreview::build("x.csv", &grid, 10, 5).is_err());
    }
}
