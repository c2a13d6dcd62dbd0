//! Error types for the ingestion pipeline.
//!
//! Each stage has its own error so callers can tell a header problem (nothing
//! was read) from a row problem (one record is bad) from a store problem
//! (the database refused a statement):
//!
//! - [`SheetError`] - reading the spreadsheet file
//! - [`HeaderError`] - header row does not fit the target type
//! - [`RowError`] - one data row could not be turned into a record
//! - [`SchemaError`] - the destination table could not be defined or created
//! - [`StoreError`] - a statement failed inside the relational store
//! - [`PersistError`] - the bulk insert as a whole failed
//! - [`ImportError`] - the full load pipeline failed at one of the above
//!
//! Conversions are provided where one stage wraps another so `?` works across
//! the boundaries.

use std::time::Duration;

use thiserror::Error;

use crate::persist::PersistReport;

// =============================================================================
// Spreadsheet reading
// =============================================================================

/// Errors raised while loading the first worksheet of a file.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid delimited file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Failed to decode text with encoding {encoding} at row {row}")]
    Decode { encoding: &'static str, row: usize },

    #[error("Cannot detect spreadsheet format for '{name}'")]
    UnsupportedFormat { name: String },

    #[error("Workbook does not contain any worksheet")]
    NoWorksheet,

    #[error("Empty sheet or missing data")]
    EmptySheet,
}

// =============================================================================
// Header validation
// =============================================================================

/// The header row does not line up with the target type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// A non-blank header has no field of the same normalized name.
    #[error("'{header}' was not found in '{type_name}' type (column {column})")]
    Mismatch {
        header: String,
        type_name: &'static str,
        column: usize,
    },
}

// =============================================================================
// Record materialization
// =============================================================================

/// A data row whose cell could not be assigned to its field.
///
/// `row` and `column` are 1-based sheet coordinates, so the header is row 1
/// and the first data row is row 2.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Row {row}, column {column} ('{field}'): {message}")]
pub struct RowError {
    pub row: usize,
    pub column: usize,
    pub field: String,
    pub value: String,
    pub message: String,
}

// =============================================================================
// Store and persistence
// =============================================================================

/// A statement failed inside the relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    DuckDb(#[from] duckdb::Error),

    /// Failure reported by the in-memory store.
    #[error("{0}")]
    Rejected(String),
}

/// The destination table could not be defined or created.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("'{name}' is not a valid table identifier")]
    InvalidIdentifier { name: String },

    #[error("Failed to create table '{table}': {source}")]
    CreateFailed {
        table: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Table '{table}' columns do not follow the field order of '{type_name}'")]
    ColumnOrder {
        table: String,
        type_name: &'static str,
    },

    #[error("Insert of record {record} into '{table}' failed: {source}")]
    Insert {
        table: String,
        record: usize,
        #[source]
        source: StoreError,
    },

    /// `partial` is what the store holds afterwards: empty for an atomic
    /// batch, which rolls back.
    #[error(
        "Timed out after {elapsed:?}; {} record(s) left in '{}', {} failed",
        .partial.inserted,
        .partial.table,
        .partial.failures.len()
    )]
    TimedOut {
        elapsed: Duration,
        partial: PersistReport,
    },

    #[error("Transaction failed: {0}")]
    Transaction(#[source] StoreError),
}

// =============================================================================
// Pipeline
// =============================================================================

/// Top-level failure of [`crate::engine::Importer::import`].
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error("{} row(s) could not be converted", .0.len())]
    Rows(Vec<RowError>),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_mismatch_names_header_and_type() {
        let err = HeaderError::Mismatch {
            header: "colour".to_string(),
            type_name: "Car",
            column: 2,
        };
        assert_eq!(
            err.to_string(),
            "'colour' was not found in 'Car' type (column 2)"
        );
    }

    #[test]
    fn row_error_reports_coordinates() {
        let err = RowError {
            row: 3,
            column: 2,
            field: "year".to_string(),
            value: "twenty-twenty".to_string(),
            message: "cannot convert 'twenty-twenty' to int32".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Row 3, column 2 ('year'): cannot convert 'twenty-twenty' to int32"
        );
    }

    #[test]
    fn schema_error_keeps_store_message() {
        let err = SchemaError::CreateFailed {
            table: "cars".to_string(),
            source: StoreError::Rejected("table 'cars' already exists".to_string()),
        };
        assert!(err.to_string().contains("table 'cars' already exists"));
    }
}
