//! Turns data rows into records using a validated column mapping.

use std::iter::FusedIterator;

use serde::{Deserialize, Serialize};

use crate::{
    data::coerce_cell,
    error::RowError,
    header::ColumnMapping,
    record::{Record, TypeDescriptor},
    sheet::Grid,
};

/// What happens to a batch containing rows that failed to convert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowPolicy {
    /// Report every row error and persist nothing.
    #[default]
    RejectBatch,
    /// Persist the valid rows and report the rest.
    SkipInvalid,
}

/// Lazy iterator over the data rows of a grid.
///
/// Rows are read from the grid on demand, so a clone is an independent cursor
/// at the same position and a fresh call to [`materialize`] starts over.
pub struct Materialize<'a, R> {
    descriptor: &'a TypeDescriptor<R>,
    grid: &'a Grid,
    mapping: &'a ColumnMapping,
    next_row: usize,
}

impl<R> Clone for Materialize<'_, R> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor,
            grid: self.grid,
            mapping: self.mapping,
            next_row: self.next_row,
        }
    }
}

pub fn materialize<'a, R: Record>(
    descriptor: &'a TypeDescriptor<R>,
    grid: &'a Grid,
    mapping: &'a ColumnMapping,
) -> Materialize<'a, R> {
    Materialize {
        descriptor,
        grid,
        mapping,
        next_row: 2,
    }
}

impl<R: Record> Materialize<'_, R> {
    fn build(&self, row: usize) -> Result<R, RowError> {
        let mut record = R::default();
        for entry in self.mapping {
            let Some(field) = self.descriptor.field(entry.field) else {
                continue;
            };
            let cell = self.grid.cell(row, entry.column);
            let fail = |message: String| RowError {
                row,
                column: entry.column,
                field: field.name.clone(),
                value: cell.to_text(),
                message,
            };
            let value = coerce_cell(cell, field.kind).map_err(fail)?;
            if value.is_null() {
                continue;
            }
            field.set(&mut record, value).map_err(fail)?;
        }
        Ok(record)
    }
}

impl<R: Record> Iterator for Materialize<'_, R> {
    type Item = Result<R, RowError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_row > self.grid.last_row() {
            return None;
        }
        let row = self.next_row;
        self.next_row += 1;
        Some(self.build(row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.grid.last_row() + 1).saturating_sub(self.next_row);
        (remaining, Some(remaining))
    }
}

impl<R: Record> ExactSizeIterator for Materialize<'_, R> {}

impl<R: Record> FusedIterator for Materialize<'_, R> {}

/// Records and row errors of one pass, in row order.
#[derive(Debug)]
pub struct Materialized<R> {
    pub records: Vec<R>,
    pub errors: Vec<RowError>,
}

impl<R> Default for Materialized<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Drains an iterator into records and errors.
pub fn partition<R, I>(rows: I) -> Materialized<R>
where
    I: IntoIterator<Item = Result<R, RowError>>,
{
    let mut out = Materialized::default();
    for row in rows {
        match row {
            Ok(record) => out.records.push(record),
            Err(err) => out.errors.push(err),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::header::validate_headers;

    crate::target_type! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct Car {
            make: String,
            year: i32,
            price: Decimal,
        }
    }

    fn cars() -> Grid {
        Grid::from_text([
            vec!["make", "year", "price"],
            vec!["Toyota", "2020", "15000.50"],
            vec!["Honda", "twenty-twenty", "9000"],
            vec!["", "", ""],
            vec!["Ford", "2018", "$12,000.00"],
        ])
    }

    #[test]
    fn yields_one_result_per_data_row() {
        let descriptor = TypeDescriptor::<Car>::new();
        let grid = cars();
        let mapping = validate_headers(&descriptor, grid.header()).unwrap();
        let rows: Vec<_> = materialize(&descriptor, &grid, &mapping).collect();
        assert_eq!(rows.len(), 4);

        assert_eq!(
            rows[0].as_ref().unwrap(),
            &Car {
                make: "Toyota".to_string(),
                year: 2020,
                price: "15000.50".parse().unwrap(),
            }
        );
        let err = rows[1].as_ref().unwrap_err();
        assert_eq!((err.row, err.column), (3, 2));
        assert_eq!(err.field, "year");
        assert_eq!(err.value, "twenty-twenty");
        assert_eq!(rows[2].as_ref().unwrap(), &Car::default());
        assert_eq!(rows[3].as_ref().unwrap().price, "12000.00".parse().unwrap());
    }

    #[test]
    fn iterator_is_restartable_through_clone() {
        let descriptor = TypeDescriptor::<Car>::new();
        let grid = cars();
        let mapping = validate_headers(&descriptor, grid.header()).unwrap();
        let mut rows = materialize(&descriptor, &grid, &mapping);
        assert_eq!(rows.len(), 4);
        let snapshot = rows.clone();
        rows.next();
        assert_eq!(rows.len(), 3);
        assert_eq!(snapshot.count(), 4);
    }

    #[test]
    fn unmapped_fields_keep_defaults() {
        let descriptor = TypeDescriptor::<Car>::new();
        let grid = Grid::from_text([vec!["", "year"], vec!["ignored", "1999"]]);
        let mapping = validate_headers(&descriptor, grid.header()).unwrap();
        let record = materialize(&descriptor, &grid, &mapping)
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(
            record,
            Car {
                year: 1999,
                ..Car::default()
            }
        );
    }

    #[test]
    fn header_only_sheet_yields_nothing() {
        let descriptor = TypeDescriptor::<Car>::new();
        let grid = Grid::from_text([vec!["make"]]);
        let mapping = validate_headers(&descriptor, grid.header()).unwrap();
        assert_eq!(materialize(&descriptor, &grid, &mapping).count(), 0);
    }

    #[test]
    fn partition_keeps_row_order() {
        let descriptor = TypeDescriptor::<Car>::new();
        let grid = cars();
        let mapping = validate_headers(&descriptor, grid.header()).unwrap();
        let out = partition(materialize(&descriptor, &grid, &mapping));
        assert_eq!(out.records.len(), 3);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.records[2].make, "Ford");
    }
}
