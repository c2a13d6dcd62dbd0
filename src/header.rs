//! Header validation: matches the header row against a target type's fields.

use log::{debug, warn};

use crate::{
    data::normalize_name, error::HeaderError, record::TypeDescriptor, sheet::Cell,
};

/// A spreadsheet column bound to a target-type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedColumn {
    /// 1-based sheet column.
    pub column: usize,
    /// Index into [`TypeDescriptor::fields`].
    pub field: usize,
}

/// Column-to-field mapping produced by [`validate_headers`], in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    entries: Vec<MappedColumn>,
}

impl ColumnMapping {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MappedColumn> {
        self.entries.iter()
    }

    pub fn field_for(&self, column: usize) -> Option<usize> {
        self.entries
            .iter()
            .find(|entry| entry.column == column)
            .map(|entry| entry.field)
    }

    /// `(column, field name)` pairs for display.
    pub fn describe<'a, R>(&'a self, descriptor: &'a TypeDescriptor<R>) -> Vec<(usize, &'a str)> {
        self.entries
            .iter()
            .filter_map(|entry| {
                descriptor
                    .field(entry.field)
                    .map(|field| (entry.column, field.name.as_str()))
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a ColumnMapping {
    type Item = &'a MappedColumn;
    type IntoIter = std::slice::Iter<'a, MappedColumn>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Maps every non-blank header cell to the field of the same normalized name.
///
/// Blank headers are skipped. The first header without a matching field stops
/// the scan and nothing of the partial mapping is returned.
pub fn validate_headers<R>(
    descriptor: &TypeDescriptor<R>,
    header: &[Cell],
) -> Result<ColumnMapping, HeaderError> {
    let mut entries: Vec<MappedColumn> = Vec::with_capacity(header.len());
    for (idx, cell) in header.iter().enumerate() {
        let column = idx + 1;
        let text = cell.to_text();
        let name = normalize_name(&text);
        if name.is_empty() {
            continue;
        }
        let field = descriptor
            .position(&name)
            .ok_or_else(|| HeaderError::Mismatch {
                header: name.clone(),
                type_name: descriptor.type_name(),
                column,
            })?;
        if let Some(previous) = entries.iter().find(|entry| entry.field == field) {
            warn!(
                "Columns {} and {} both map to field '{}'; column {} wins",
                previous.column, column, name, column
            );
        }
        entries.push(MappedColumn { column, field });
    }
    debug!(
        "Mapped {} of {} header column(s) onto '{}'",
        entries.len(),
        header.len(),
        descriptor.type_name()
    );
    Ok(ColumnMapping { entries })
}
