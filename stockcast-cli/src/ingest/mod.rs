//! Spreadsheet ingestion pipeline
//!
//! upload -> [`grid`] -> [`header`] -> [`columns`] -> [`coerce`]/[`month`] -> [`batch`]
//!
//! Structural problems are raised as [`ImportError`] before any write; row and
//! chunk problems end up in the [`ImportReport`].

pub mod batch;
pub mod coerce;
pub mod columns;
pub mod error;
pub mod grid;
pub mod header;
pub mod month;
pub mod preview;

pub use batch::{BatchImporter, ImportOptions, ImportPlan, ImportReport};
pub use coerce::{FieldValue, ImportRecord, RecordCoercer};
pub use columns::{ColumnMapping, ColumnSelection, ImportSchema};
pub use error::ImportError;
pub use grid::{Cell, RawGrid, Upload, UploadKind};
pub use header::HeaderRow;
pub use preview::HeaderPreview;

/// A parsed upload whose header and columns have been resolved
#[derive(Debug, Clone)]
pub struct PreparedUpload {
    pub filename: String,
    pub grid: RawGrid,
    pub header: HeaderRow,
    pub mapping: ColumnMapping,
}

impl PreparedUpload {
    /// Rows after the header
    pub fn data_rows(&self) -> &[Vec<Cell>] {
        self.grid.data_rows(self.header.index)
    }
}

/// Locate the header and resolve the selection against `schema`.
///
/// Fails with an [`ImportError`] when the upload must be rejected as a whole.
pub fn prepare(
    filename: &str,
    grid: RawGrid,
    selection: &ColumnSelection,
    schema: &ImportSchema,
    scan_rows: usize,
) -> Result<PreparedUpload, ImportError> {
    let header = header::locate_header(&grid, scan_rows)?;
    if grid.data_rows(header.index).is_empty() {
        return Err(ImportError::EmptyUpload);
    }
    let mapping = columns::resolve_columns(&header, selection, schema)?;

    Ok(PreparedUpload {
        filename: filename.to_string(),
        grid,
        header,
        mapping,
    })
}
