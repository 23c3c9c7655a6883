//! Column normalization and resolution against a fixed schema
//!
//! Each import kind has one [`ImportSchema`] table naming its canonical
//! columns and their [`FieldCategory`]. The resolver and the record coercer
//! both read from that table, so the category rules live in one place.

use std::collections::BTreeMap;

use serde::Serialize;

use super::error::ImportError;
use super::header::HeaderRow;
use super::month::parse_month_key;

/// How a canonical column's values are coerced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    /// Record identifier, always trimmed text, never empty
    Identifier,
    /// Numbers; empty or unparseable cells become `0`
    Numeric,
    /// Free text; empty cells become null
    Text,
}

impl FieldCategory {
    /// Category implied by a canonical name
    pub fn infer(canonical: &str) -> Self {
        if canonical.contains("product") {
            FieldCategory::Identifier
        } else if ["stock", "weight", "volume"]
            .iter()
            .any(|k| canonical.contains(k))
        {
            FieldCategory::Numeric
        } else {
            FieldCategory::Text
        }
    }
}

/// How a normalized label is matched to a canonical column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMatch {
    Exact,
    /// Any normalized label containing the keyword
    Contains(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub category: FieldCategory,
    pub matcher: LabelMatch,
}

impl ColumnSpec {
    const fn exact(name: &'static str, category: FieldCategory) -> Self {
        Self {
            name,
            category,
            matcher: LabelMatch::Exact,
        }
    }

    fn matches(&self, normalized: &str) -> bool {
        match self.matcher {
            LabelMatch::Exact => self.name == normalized,
            LabelMatch::Contains(keyword) => normalized.contains(keyword),
        }
    }
}

const SOH_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::exact("product_id", FieldCategory::Identifier),
    ColumnSpec::exact("description", FieldCategory::Text),
    ColumnSpec::exact("stock_on_hand", FieldCategory::Numeric),
    ColumnSpec::exact("default_uom", FieldCategory::Text),
    ColumnSpec::exact("locations", FieldCategory::Text),
    ColumnSpec::exact("ean", FieldCategory::Text),
    ColumnSpec::exact("weight_kg", FieldCategory::Numeric),
    ColumnSpec::exact("volume_m3", FieldCategory::Numeric),
];

// `description` is tried first so "Product Description" is not taken as the code
const FORECAST_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        name: "description",
        category: FieldCategory::Text,
        matcher: LabelMatch::Contains("description"),
    },
    ColumnSpec {
        name: "product",
        category: FieldCategory::Identifier,
        matcher: LabelMatch::Contains("product"),
    },
];

/// The supported columns for one kind of import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSchema {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
    /// Accept `Jan-24` style month headers as dynamic columns
    pub month_columns: bool,
    /// Keyword the identifying column's name must contain
    pub required_keyword: &'static str,
}

impl ImportSchema {
    /// Stock-on-hand snapshot imports
    pub const fn stock_on_hand() -> Self {
        Self {
            name: "soh",
            columns: SOH_COLUMNS,
            month_columns: false,
            required_keyword: "product",
        }
    }

    /// Monthly demand forecast imports
    pub const fn forecast() -> Self {
        Self {
            name: "forecast",
            columns: FORECAST_COLUMNS,
            month_columns: true,
            required_keyword: "product",
        }
    }

    pub fn supported_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.columns.iter().map(|c| c.name.to_string()).collect();
        if self.month_columns {
            names.push("<Mon-YY month columns>".to_string());
        }
        names
    }

    pub fn category(&self, canonical: &str) -> Option<FieldCategory> {
        self.columns
            .iter()
            .find(|c| c.name == canonical)
            .map(|c| c.category)
    }

    /// Find the canonical column a normalized label belongs to.
    ///
    /// Exact names win. Among keyword matches, a column not yet in `claimed`
    /// is preferred over one already bound to an earlier label.
    pub fn resolve(&self, normalized: &str, claimed: &[&str]) -> Option<&'static ColumnSpec> {
        let columns: &'static [ColumnSpec] = self.columns;
        if let Some(exact) = columns
            .iter()
            .find(|c| c.matcher == LabelMatch::Exact && c.matches(normalized))
        {
            return Some(exact);
        }

        let mut keyword_matches = columns
            .iter()
            .filter(|c| c.matcher != LabelMatch::Exact && c.matches(normalized));
        let first = keyword_matches.clone().next();
        keyword_matches
            .find(|c| !claimed.contains(&c.name))
            .or(first)
    }
}

/// Lower-case a label and collapse every run of non-alphanumerics into `_`
pub fn normalize_column_name(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_sep = false;
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Which header labels the caller wants imported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelection {
    /// Every non-empty header label
    All,
    /// Only these labels, in this order
    Only(Vec<String>),
}

impl ColumnSelection {
    /// An empty list means "everything"
    pub fn from_labels(labels: Vec<String>) -> Self {
        if labels.is_empty() {
            ColumnSelection::All
        } else {
            ColumnSelection::Only(labels)
        }
    }
}

/// A canonical column bound to its position in each data row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedColumn {
    pub canonical: String,
    pub label: String,
    pub index: usize,
    pub category: FieldCategory,
}

/// A month column bound to its position in each data row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthColumn {
    pub key: String,
    pub label: String,
    pub index: usize,
}

/// Ordered `(canonical, index)` bindings, resolved once per upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    pub fields: Vec<ResolvedColumn>,
    pub months: Vec<MonthColumn>,
}

impl ColumnMapping {
    /// The identifying column (always present once resolved)
    pub fn identifier(&self) -> Option<&ResolvedColumn> {
        self.fields
            .iter()
            .find(|c| c.category == FieldCategory::Identifier)
    }

    pub fn field(&self, canonical: &str) -> Option<&ResolvedColumn> {
        self.fields.iter().find(|c| c.canonical == canonical)
    }

    /// Canonical names in selection order, month columns last
    pub fn canonical_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|c| c.canonical.clone())
            .chain(self.months.iter().map(|m| m.key.clone()))
            .collect()
    }
}

/// Map the selected header labels to canonical columns.
///
/// All offending labels are collected before failing, so the caller sees
/// every problem in one message.
pub fn resolve_columns(
    header: &HeaderRow,
    selection: &ColumnSelection,
    schema: &ImportSchema,
) -> Result<ColumnMapping, ImportError> {
    let selected = select_labels(header, selection)?;
    // Month-column layouts carry extra columns (totals, units) that are skipped
    // unless the caller named them
    let lenient = schema.month_columns && *selection == ColumnSelection::All;

    let mut fields: Vec<ResolvedColumn> = Vec::new();
    let mut claimed: Vec<&'static str> = Vec::new();
    let mut months = Vec::new();
    let mut unsupported = Vec::new();

    for (label, index) in selected {
        if schema.month_columns {
            if let Some(key) = parse_month_key(&label) {
                months.push(MonthColumn { key, label, index });
                continue;
            }
        }

        let normalized = normalize_column_name(&label);
        match schema.resolve(&normalized, &claimed) {
            Some(spec) if lenient && claimed.contains(&spec.name) => {
                log::debug!(
                    "Skipping column '{}': '{}' is already bound",
                    label,
                    spec.name
                );
            }
            Some(spec) => {
                claimed.push(spec.name);
                fields.push(ResolvedColumn {
                    canonical: spec.name.to_string(),
                    label,
                    index,
                    category: spec.category,
                });
            }
            None if lenient => {
                log::info!("Ignoring column '{}' in {} import", label, schema.name);
            }
            None => unsupported.push(if normalized.is_empty() { label } else { normalized }),
        }
    }

    if !unsupported.is_empty() {
        log::warn!("Unsupported columns for {} import: {:?}", schema.name, unsupported);
        return Err(ImportError::UnsupportedColumn {
            offending: unsupported,
            supported: schema.supported_names(),
        });
    }

    check_ambiguous(
        fields
            .iter()
            .map(|c| (c.canonical.as_str(), c.label.as_str()))
            .chain(months.iter().map(|m| (m.key.as_str(), m.label.as_str()))),
    )?;

    if !fields
        .iter()
        .any(|c| c.category == FieldCategory::Identifier)
    {
        return Err(ImportError::MissingRequiredColumn {
            required: schema.required_keyword.to_string(),
        });
    }

    let mapping = ColumnMapping { fields, months };
    log::info!(
        "Column mapping for {} import: {:?}",
        schema.name,
        mapping.canonical_names()
    );
    Ok(mapping)
}

fn select_labels(
    header: &HeaderRow,
    selection: &ColumnSelection,
) -> Result<Vec<(String, usize)>, ImportError> {
    match selection {
        ColumnSelection::All => {
            let selected: Vec<(String, usize)> = header
                .labels
                .iter()
                .enumerate()
                .filter(|(_, l)| !l.is_empty())
                .map(|(i, l)| (l.clone(), i))
                .collect();
            if selected.is_empty() {
                return Err(ImportError::NoColumnsSelected);
            }
            Ok(selected)
        }
        ColumnSelection::Only(labels) => {
            let mut selected: Vec<(String, usize)> = Vec::new();
            let mut missing = Vec::new();
            for label in labels {
                let label = label.trim();
                if label.is_empty() || selected.iter().any(|(l, _)| l == label) {
                    continue;
                }
                match header.position(label) {
                    Some(index) => selected.push((label.to_string(), index)),
                    None => missing.push(label.to_string()),
                }
            }
            if !missing.is_empty() {
                return Err(ImportError::ColumnNotInHeader { missing });
            }
            if selected.is_empty() {
                return Err(ImportError::NoColumnsSelected);
            }
            Ok(selected)
        }
    }
}

fn check_ambiguous<'a>(
    bindings: impl Iterator<Item = (&'a str, &'a str)>,
) -> Result<(), ImportError> {
    let mut by_canonical: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (canonical, label) in bindings {
        by_canonical.entry(canonical).or_default().push(label);
    }

    match by_canonical.into_iter().find(|(_, labels)| labels.len() > 1) {
        Some((canonical, labels)) => Err(ImportError::AmbiguousColumn {
            canonical: canonical.to_string(),
            labels: labels.into_iter().map(String::from).collect(),
        }),
        None => Ok(()),
    }
}
