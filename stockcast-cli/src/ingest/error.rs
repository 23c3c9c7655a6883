//! Structural import failures
//!
//! These reject an upload before anything is written. Row and chunk failures
//! are not errors in this sense; they are counted in the import report.

/// Reason an upload was rejected as a whole
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// No non-empty row among the scanned candidates
    HeaderNotFound { scanned: usize },
    /// Header found but nothing follows it
    EmptyUpload,
    /// Caller selected nothing to import
    NoColumnsSelected,
    /// Selected labels that do not appear in the header row
    ColumnNotInHeader { missing: Vec<String> },
    /// The identifying column is absent from the selection
    MissingRequiredColumn { required: String },
    /// Distinct labels that normalize to the same canonical column
    AmbiguousColumn { canonical: String, labels: Vec<String> },
    /// Labels outside the supported schema
    UnsupportedColumn {
        offending: Vec<String>,
        supported: Vec<String>,
    },
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::HeaderNotFound { scanned } => write!(
                f,
                "Could not determine header row in the file (scanned {} rows)",
                scanned
            ),
            ImportError::EmptyUpload => {
                write!(f, "File must contain a header row and at least one data row")
            }
            ImportError::NoColumnsSelected => write!(f, "No columns selected for import"),
            ImportError::ColumnNotInHeader { missing } => write!(
                f,
                "Selected columns not found in header row: {}",
                missing.join(", ")
            ),
            ImportError::MissingRequiredColumn { required } => write!(
                f,
                "A column with '{}' in the name is required",
                required
            ),
            ImportError::AmbiguousColumn { canonical, labels } => write!(
                f,
                "Columns {} all map to '{}'",
                labels
                    .iter()
                    .map(|l| format!("'{}'", l))
                    .collect::<Vec<_>>()
                    .join(", "),
                canonical
            ),
            ImportError::UnsupportedColumn {
                offending,
                supported,
            } => write!(
                f,
                "Unsupported columns: {}. Supported columns are: {}",
                offending.join(", "),
                supported.join(", ")
            ),
        }
    }
}

impl std::error::Error for ImportError {}
