//! Bulk persistence: create the destination table, then insert every record.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    ddl::TableDescriptor,
    error::{PersistError, SchemaError, StoreError},
    record::TypeDescriptor,
    store::{Store, Transaction},
};

/// How insert failures are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsertPolicy {
    /// Table creation and all inserts commit together or not at all.
    #[default]
    Atomic,
    /// Every insert is attempted; failures are reported afterwards.
    CollectFailures,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistOptions {
    pub policy: InsertPolicy,
    /// Upper bound for the whole batch, checked before each statement.
    pub timeout: Option<Duration>,
}

/// An insert that failed under [`InsertPolicy::CollectFailures`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertFailure {
    /// 1-based position of the record in the batch.
    pub record: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReport {
    pub table: String,
    pub inserted: usize,
    pub failures: Vec<InsertFailure>,
}

struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    fn start(limit: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    fn check(&self, partial: impl FnOnce() -> PersistReport) -> Result<(), PersistError> {
        let elapsed = self.started.elapsed();
        match self.limit {
            Some(limit) if elapsed >= limit => Err(PersistError::TimedOut {
                elapsed,
                partial: partial(),
            }),
            _ => Ok(()),
        }
    }
}

/// Creates `table` and inserts `records` into it in order.
///
/// The table's columns must be the descriptor's fields in declaration order,
/// since each insert binds the getter values positionally.
pub fn persist<S, R>(
    store: &mut S,
    table: &TableDescriptor,
    descriptor: &TypeDescriptor<R>,
    records: &[R],
    options: PersistOptions,
) -> Result<PersistReport, PersistError>
where
    S: Store + ?Sized,
{
    if !table.column_names().eq(descriptor.names()) {
        return Err(PersistError::ColumnOrder {
            table: table.name.clone(),
            type_name: descriptor.type_name(),
        });
    }
    let dialect = store.dialect();
    let create = table.create_statement(dialect);
    let insert = table.insert_statement(dialect);
    let deadline = Deadline::start(options.timeout);
    let report = |inserted: usize, failures: Vec<InsertFailure>| PersistReport {
        table: table.name.clone(),
        inserted,
        failures,
    };

    match options.policy {
        InsertPolicy::Atomic => {
            let mut tx = Transaction::begin(store).map_err(PersistError::Transaction)?;
            deadline.check(|| report(0, Vec::new()))?;
            create_table(&mut |sql: &str| tx.execute(sql, &[]), &table.name, &create)?;
            for (idx, record) in records.iter().enumerate() {
                deadline.check(|| report(0, Vec::new()))?;
                debug!("{insert}");
                if let Err(source) = tx.execute(&insert, &descriptor.values(record)) {
                    if let Err(err) = tx.rollback() {
                        warn!("Rollback of '{}' failed: {err}", table.name);
                    }
                    return Err(PersistError::Insert {
                        table: table.name.clone(),
                        record: idx + 1,
                        source,
                    });
                }
            }
            tx.commit().map_err(PersistError::Transaction)?;
            info!(
                "Inserted {} record(s) into '{}'",
                records.len(),
                table.name
            );
            Ok(report(records.len(), Vec::new()))
        }
        InsertPolicy::CollectFailures => {
            deadline.check(|| report(0, Vec::new()))?;
            create_table(&mut |sql: &str| store.execute(sql, &[]), &table.name, &create)?;
            let mut inserted = 0;
            let mut failures = Vec::new();
            for (idx, record) in records.iter().enumerate() {
                if let Err(err) = deadline.check(|| report(inserted, failures.clone())) {
                    warn!(
                        "Stopped before record {}; '{}' keeps {inserted} row(s)",
                        idx + 1,
                        table.name
                    );
                    return Err(err);
                }
                match store.execute(&insert, &descriptor.values(record)) {
                    Ok(_) => inserted += 1,
                    Err(err) => {
                        warn!("Record {} was not inserted: {err}", idx + 1);
                        failures.push(InsertFailure {
                            record: idx + 1,
                            message: err.to_string(),
                        });
                    }
                }
            }
            info!(
                "Inserted {} of {} record(s) into '{}'",
                inserted,
                records.len(),
                table.name
            );
            Ok(report(inserted, failures))
        }
    }
}

fn create_table(
    execute: &mut dyn FnMut(&str) -> Result<usize, StoreError>,
    name: &str,
    statement: &str,
) -> Result<(), SchemaError> {
    debug!("{statement}");
    execute(statement).map_err(|source| SchemaError::CreateFailed {
        table: name.to_string(),
        source,
    })?;
    info!("Created table '{name}'");
    Ok(())
}
