//! Write a forecast view to Excel or CSV

use std::path::Path;

use anyhow::{Context, Result, bail};
use rust_xlsxwriter::{Format, Workbook};

use super::reshape::ForecastView;

const SHEET_NAME: &str = "Forecast";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" => Some(ExportFormat::Xlsx),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }
}

/// Export to `path`, choosing the format from its extension
pub fn export_view(view: &ForecastView, path: &Path) -> Result<ExportFormat> {
    let format = match ExportFormat::from_path(path) {
        Some(format) => format,
        None => bail!(
            "Unsupported export file: {} (expected .xlsx or .csv)",
            path.display()
        ),
    };
    match format {
        ExportFormat::Xlsx => write_xlsx(view, path)?,
        ExportFormat::Csv => write_csv(view, path)?,
    }
    log::info!(
        "Exported {} forecast rows to {}",
        view.rows.len(),
        path.display()
    );
    Ok(format)
}

/// Cells of one wide row in header order; `None` for empty cells
fn row_cells<'a>(view: &'a ForecastView, index: usize) -> Vec<Option<CellValue<'a>>> {
    let row = &view.rows[index];
    let mut cells = vec![
        Some(CellValue::Text(row.product_code.as_str())),
        row.description.as_deref().map(CellValue::Text),
    ];
    cells.extend(
        view.month_keys()
            .map(|key| row.months.get(key).map(|q| CellValue::Quantity(*q))),
    );
    cells
}

enum CellValue<'a> {
    Text(&'a str),
    Quantity(u64),
}

pub fn write_xlsx(view: &ForecastView, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, header) in view.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, &header.label, &bold)?;
    }

    for index in 0..view.rows.len() {
        let row = (index + 1) as u32;
        for (col, cell) in row_cells(view, index).into_iter().enumerate() {
            match cell {
                None => {}
                Some(CellValue::Text(s)) => {
                    worksheet.write_string(row, col as u16, s)?;
                }
                Some(CellValue::Quantity(q)) => {
                    worksheet.write_number(row, col as u16, q as f64)?;
                }
            }
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to save Excel file: {}", path.display()))?;
    Ok(())
}

pub fn write_csv(view: &ForecastView, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

    writer.write_record(view.headers.iter().map(|h| h.label.as_str()))?;
    for index in 0..view.rows.len() {
        let record: Vec<String> = row_cells(view, index)
            .into_iter()
            .map(|cell| match cell {
                None => String::new(),
                Some(CellValue::Text(s)) => s.to_string(),
                Some(CellValue::Quantity(q)) => q.to_string(),
            })
            .collect();
        writer.write_record(&record)?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{MonthlyQuantity, reshape};
    use crate::ingest::grid::{Upload, read_grid};
    use crate::ingest::{Cell, header};

    fn view() -> ForecastView {
        let fact = |code: &str, description: Option<&str>, month: &str, quantity| MonthlyQuantity {
            product_code: code.into(),
            description: description.map(String::from),
            month_key: month.into(),
            quantity,
        };
        reshape(&[
            fact("P1", Some("Widget"), "2024-01", 10),
            fact("P1", Some("Widget"), "2024-02", 0),
            fact("P2", None, "2024-02", 5),
        ])
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("out.XLSX")), Some(ExportFormat::Xlsx));
        assert_eq!(ExportFormat::from_path(Path::new("out.csv")), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::from_path(Path::new("out.json")), None);
        assert!(export_view(&view(), Path::new("out.json")).is_err());
    }

    #[test]
    fn test_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.csv");
        export_view(&view(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Product Code,Description,Jan-24,Feb-24",
                "P1,Widget,10,0",
                "P2,,,5",
            ]
        );
    }

    #[test]
    fn test_xlsx_export_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.xlsx");
        export_view(&view(), &path).unwrap();

        let upload = Upload::from_path(&path, 10 * 1024 * 1024).unwrap();
        let grid = read_grid(&upload).unwrap();
        let header = header::locate_header(&grid, header::DEFAULT_SCAN_ROWS).unwrap();

        assert_eq!(header.index, 0);
        assert_eq!(header.labels, vec!["Product Code", "Description", "Jan-24", "Feb-24"]);
        assert_eq!(grid.rows[1][2], Cell::Number(10.0));
        assert_eq!(grid.rows[2][0], Cell::Text("P2".into()));
    }
}
