//! The import pipeline for one target type.

use log::{info, warn};

use crate::{
    ddl::{TableDescriptor, TableNaming, derive_table},
    error::{HeaderError, ImportError, PersistError, RowError, SchemaError},
    header::{ColumnMapping, validate_headers},
    materialize::{Materialize, Materialized, RowPolicy, materialize, partition},
    persist::{PersistOptions, PersistReport, persist},
    record::{Record, TypeDescriptor},
    sheet::{Cell, Grid},
    store::Store,
};

/// Settings for [`Importer::import`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSettings {
    pub naming: TableNaming,
    pub row_policy: RowPolicy,
    pub persist: PersistOptions,
}

/// Result of a successful import.
#[derive(Debug)]
pub struct ImportOutcome {
    pub mapping: ColumnMapping,
    pub report: PersistReport,
    /// Rows left out under [`RowPolicy::SkipInvalid`].
    pub skipped: Vec<RowError>,
}

/// Holds the descriptor of `R` and runs every pipeline stage against it.
pub struct Importer<R> {
    descriptor: TypeDescriptor<R>,
}

impl<R: Record> Default for Importer<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> Importer<R> {
    pub fn new() -> Self {
        Self {
            descriptor: TypeDescriptor::new(),
        }
    }

    pub fn descriptor(&self) -> &TypeDescriptor<R> {
        &self.descriptor
    }

    pub fn validate_headers(&self, header: &[Cell]) -> Result<ColumnMapping, HeaderError> {
        validate_headers(&self.descriptor, header)
    }

    pub fn materialize<'a>(
        &'a self,
        grid: &'a Grid,
        mapping: &'a ColumnMapping,
    ) -> Materialize<'a, R> {
        materialize(&self.descriptor, grid, mapping)
    }

    pub fn derive_table(&self, name: &str) -> Result<TableDescriptor, SchemaError> {
        derive_table(&self.descriptor, name)
    }

    pub fn persist<S: Store + ?Sized>(
        &self,
        store: &mut S,
        table: &TableDescriptor,
        records: &[R],
        options: PersistOptions,
    ) -> Result<PersistReport, PersistError> {
        persist(store, table, &self.descriptor, records, options)
    }

    /// Validates, materializes and persists `grid` into a new table.
    ///
    /// Nothing touches the store until the header has been validated and the
    /// rows have been judged against `settings.row_policy`.
    pub fn import<S: Store + ?Sized>(
        &self,
        grid: &Grid,
        store: &mut S,
        settings: &ImportSettings,
    ) -> Result<ImportOutcome, ImportError> {
        let mapping = self.validate_headers(grid.header())?;
        info!("Headers validated for '{}'", self.descriptor.type_name());

        let Materialized { records, errors } = partition(self.materialize(grid, &mapping));
        if !errors.is_empty() {
            match settings.row_policy {
                RowPolicy::RejectBatch => return Err(ImportError::Rows(errors)),
                RowPolicy::SkipInvalid => {
                    for err in &errors {
                        warn!("Skipping {err}");
                    }
                }
            }
        }

        let name = settings.naming.resolve_now(self.descriptor.type_name());
        let table = self.derive_table(&name)?;
        let report = self.persist(store, &table, &records, settings.persist)?;
        Ok(ImportOutcome {
            mapping,
            report,
            skipped: errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::store::MemoryStore;

    crate::target_type! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct Car {
            make: String,
            year: i32,
            price: Decimal,
        }
    }

    fn fixed(name: &str) -> ImportSettings {
        ImportSettings {
            naming: TableNaming::Fixed(name.to_string()),
            ..ImportSettings::default()
        }
    }

    #[test]
    fn import_runs_every_stage() {
        let grid = Grid::from_text([
            vec!["make", "year", "price"],
            vec!["Toyota", "2020", "15000.50"],
        ]);
        let mut store = MemoryStore::new();
        let outcome = Importer::<Car>::new()
            .import(&grid, &mut store, &fixed("cars"))
            .unwrap();
        assert_eq!(outcome.mapping.len(), 3);
        assert_eq!(outcome.report.inserted, 1);
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn rejected_batch_never_touches_the_store() {
        let grid = Grid::from_text([
            vec!["make", "year"],
            vec!["Toyota", "soon"],
            vec!["Honda", "2019"],
        ]);
        let mut store = MemoryStore::new();
        let err = Importer::<Car>::new()
            .import(&grid, &mut store, &fixed("cars"))
            .unwrap_err();
        match err {
            ImportError::Rows(errors) => assert_eq!(errors[0].row, 2),
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.statements().is_empty());
    }

    #[test]
    fn skip_invalid_persists_the_rest() {
        let grid = Grid::from_text([
            vec!["make", "year"],
            vec!["Toyota", "soon"],
            vec!["Honda", "2019"],
        ]);
        let mut store = MemoryStore::new();
        let settings = ImportSettings {
            row_policy: RowPolicy::SkipInvalid,
            ..fixed("cars")
        };
        let outcome = Importer::<Car>::new()
            .import(&grid, &mut store, &settings)
            .unwrap();
        assert_eq!(outcome.report.inserted, 1);
        assert_eq!(outcome.skipped.len(), 1);
    }

    #[test]
    fn timestamped_table_carries_the_type_name() {
        let grid = Grid::from_text([vec!["make"], vec!["Toyota"]]);
        let mut store = MemoryStore::new();
        let outcome = Importer::<Car>::new()
            .import(&grid, &mut store, &ImportSettings::default())
            .unwrap();
        assert!(outcome.report.table.starts_with("Car_"));
        assert_eq!(outcome.report.table.len(), "Car_".len() + 14);
    }
}
