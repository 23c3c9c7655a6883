//! Raw cell grids read from uploaded spreadsheets
//!
//! Supports `.xlsx`/`.xls` workbooks (first sheet only, via calamine) and
//! `.csv` files. Everything downstream works on [`RawGrid`], never on the
//! file format.

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result, bail};
use calamine::{Data, Reader, Sheets, Xls, Xlsx};
use chrono::NaiveDate;
use serde::Serialize;

use super::month;

/// A single cell value as it came out of the file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    /// Build a cell from free text (CSV fields); blank text becomes `Empty`
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Whether this cell reads as a month-year header token.
    ///
    /// Excel frequently stores `Jan-24` headers as real dates, so date cells count too.
    pub fn is_month_token(&self) -> bool {
        match self {
            Cell::Text(s) => month::is_short_month_token(s.trim()),
            Cell::Date(_) => true,
            _ => false,
        }
    }

    /// Render the cell as a header label (dates become `Mon-YY`)
    pub fn header_label(&self) -> String {
        match self {
            Cell::Date(d) => month::month_label(&month::month_key_for_date(*d))
                .unwrap_or_else(|| d.to_string()),
            other => other.display_text().unwrap_or_default(),
        }
    }

    /// Render the cell as trimmed text, `None` when empty
    pub fn display_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Cell::Number(f) => Some(format_number(*f)),
            Cell::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }
}

/// Format a number without a trailing `.0` for whole values
pub fn format_number(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// Ordered rows of cells for one upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGrid {
    pub rows: Vec<Vec<Cell>>,
}

impl RawGrid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    /// Build a grid from string literals; `""` becomes an empty cell
    pub fn from_text_rows<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|s| Cell::text(s.as_ref())).collect())
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    /// Rows that follow the header row
    pub fn data_rows(&self, header_index: usize) -> &[Vec<Cell>] {
        self.rows.get(header_index + 1..).unwrap_or(&[])
    }
}

/// Declared format of an uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Xlsx,
    Xls,
    Csv,
}

impl UploadKind {
    /// Resolve from a MIME type
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Some(UploadKind::Xlsx)
            }
            "application/vnd.ms-excel" => Some(UploadKind::Xls),
            "text/csv" | "application/csv" => Some(UploadKind::Csv),
            _ => None,
        }
    }

    /// Resolve from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "xlsx" => Some(UploadKind::Xlsx),
            "xls" => Some(UploadKind::Xls),
            "csv" => Some(UploadKind::Csv),
            _ => None,
        }
    }
}

/// An uploaded file held in memory
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub kind: UploadKind,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, kind: UploadKind, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            kind,
            bytes,
        }
    }

    /// Read an upload from disk, enforcing the size limit
    pub fn from_path(path: &Path, max_bytes: u64) -> Result<Self> {
        let kind = match UploadKind::from_path(path) {
            Some(kind) => kind,
            None => bail!(
                "Unsupported file type: {} (expected .xlsx, .xls or .csv)",
                path.display()
            ),
        };

        let size = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat upload: {}", path.display()))?
            .len();
        if size > max_bytes {
            bail!(
                "Upload {} is {} bytes; the limit is {} bytes",
                path.display(),
                size,
                max_bytes
            );
        }

        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read upload: {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(filename, kind, bytes))
    }
}

/// Parse an upload into a grid of raw cells
pub fn read_grid(upload: &Upload) -> Result<RawGrid> {
    let grid = match upload.kind {
        UploadKind::Csv => read_csv_grid(&upload.bytes)
            .with_context(|| format!("Failed to parse CSV upload: {}", upload.filename))?,
        UploadKind::Xlsx | UploadKind::Xls => read_workbook_grid(upload)?,
    };

    log::debug!(
        "Read {} rows from '{}' ({:?})",
        grid.len(),
        upload.filename,
        upload.kind
    );
    Ok(grid)
}

fn read_csv_grid(bytes: &[u8]) -> Result<RawGrid> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("CSV parse error at line {}", idx + 1))?;
        rows.push(record.iter().map(Cell::text).collect());
    }
    Ok(RawGrid::new(rows))
}

fn read_workbook_grid(upload: &Upload) -> Result<RawGrid> {
    let cursor = Cursor::new(upload.bytes.clone());
    let mut workbook: Sheets<_> = match upload.kind {
        UploadKind::Xlsx => Sheets::Xlsx(
            Xlsx::new(cursor)
                .with_context(|| format!("Failed to open Excel file: {}", upload.filename))?,
        ),
        UploadKind::Xls => Sheets::Xls(
            Xls::new(cursor)
                .with_context(|| format!("Failed to open Excel file: {}", upload.filename))?,
        ),
        UploadKind::Csv => bail!("CSV uploads are not workbooks"),
    };

    let sheet_name = workbook
        .sheet_names()
        .first()
        .context("Excel file has no sheets")?
        .clone();

    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Failed to read sheet: {}", sheet_name))?;

    // calamine ranges start at the first used cell; pad back to A1 so row
    // numbers in reports match the sheet
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
    rows.extend(range.rows().map(|r| {
        std::iter::repeat_n(Cell::Empty, col_offset)
            .chain(r.iter().map(data_to_cell))
            .collect()
    }));
    Ok(RawGrid::new(rows))
}

/// Convert a calamine cell into a [`Cell`]
fn data_to_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::text(s.as_str()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => Cell::Date(ndt.date()),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => s
            .get(0..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::text(s.as_str())),
        Data::DurationIso(s) => Cell::text(s.as_str()),
    }
}
