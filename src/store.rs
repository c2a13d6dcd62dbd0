//! Relational store capability and its two implementations.
//!
//! [`DuckDbStore`] writes to an embedded DuckDB database (file or in-memory).
//! [`MemoryStore`] understands exactly the statements this crate renders and
//! keeps rows in memory; it backs `--dry-run` and the test suite.

use std::{collections::HashMap, path::Path, sync::OnceLock, thread, time::Duration};

use duckdb::{
    Connection,
    types::{ToSql, ToSqlOutput, Value as DuckValue},
};
use log::{debug, warn};
use regex::Regex;

use crate::{data::Value, ddl::Dialect, error::StoreError};

/// Executes DDL and DML statements with bound parameters.
pub trait Store {
    fn dialect(&self) -> Dialect;

    /// Runs one statement; returns the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize, StoreError>;

    fn begin(&mut self) -> Result<(), StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    fn rollback(&mut self) -> Result<(), StoreError>;
}

/// Open transaction that rolls back when dropped without [`Transaction::commit`].
pub struct Transaction<'a, S: Store + ?Sized> {
    store: &'a mut S,
    finished: bool,
}

impl<'a, S: Store + ?Sized> Transaction<'a, S> {
    pub fn begin(store: &'a mut S) -> Result<Self, StoreError> {
        store.begin()?;
        Ok(Self {
            store,
            finished: false,
        })
    }

    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize, StoreError> {
        self.store.execute(sql, params)
    }

    pub fn commit(mut self) -> Result<(), StoreError> {
        self.finished = true;
        self.store.commit()
    }

    pub fn rollback(mut self) -> Result<(), StoreError> {
        self.finished = true;
        self.store.rollback()
    }
}

impl<S: Store + ?Sized> Drop for Transaction<'_, S> {
    fn drop(&mut self) {
        if !self.finished {
            debug!("Rolling back unfinished transaction");
            if let Err(err) = self.store.rollback() {
                warn!("Rollback failed: {err}");
            }
        }
    }
}

// =============================================================================
// DuckDB
// =============================================================================

impl ToSql for Value {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        let value = match self {
            Value::Null => DuckValue::Null,
            Value::Text(text) => DuckValue::Text(text.clone()),
            Value::Int16(i) => DuckValue::SmallInt(*i),
            Value::Int32(i) => DuckValue::Int(*i),
            Value::Int64(i) => DuckValue::BigInt(*i),
            Value::Double(f) => DuckValue::Double(*f),
            Value::Single(f) => DuckValue::Float(*f),
            Value::Boolean(b) => DuckValue::Boolean(*b),
            // Cast by the column type on insert.
            Value::Money(d) => DuckValue::Text(d.to_string()),
            Value::DateTime(dt) => DuckValue::Text(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            Value::Guid(g) => DuckValue::Text(g.to_string()),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

pub struct DuckDbStore {
    connection: Connection,
}

impl DuckDbStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let connection = Connection::open(path.as_ref())?;
        debug!("Opened DuckDB database {:?}", path.as_ref());
        Ok(Self { connection })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            connection: Connection::open_in_memory()?,
        })
    }

    /// Underlying connection, for queries outside the load path.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

impl Store for DuckDbStore {
    fn dialect(&self) -> Dialect {
        Dialect::DuckDb
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize, StoreError> {
        let bound: Vec<&dyn ToSql> = params.iter().map(|value| value as &dyn ToSql).collect();
        Ok(self.connection.execute(sql, bound.as_slice())?)
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        Ok(self.connection.execute_batch("BEGIN TRANSACTION")?)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        Ok(self.connection.execute_batch("COMMIT")?)
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        Ok(self.connection.execute_batch("ROLLBACK")?)
    }
}

// =============================================================================
// In-memory
// =============================================================================

fn create_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)^\s*CREATE\s+TABLE\s+(\S+)\s*\((.*)\)\s*;?\s*$")
            .expect("create pattern compiles")
    })
}

fn insert_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)^\s*INSERT\s+INTO\s+(\S+)\s*\(([^)]*)\)\s*VALUES\s*\((.*)\)\s*;?\s*$")
            .expect("insert pattern compiles")
    })
}

/// A table held by [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTable {
    /// `(name, declared type)` pairs in order.
    pub columns: Vec<(String, String)>,
    pub rows: Vec<Vec<Value>>,
}

impl MemoryTable {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// Store that keeps tables in memory and records every statement.
#[derive(Debug, Default)]
pub struct MemoryStore {
    dialect: Dialect,
    tables: HashMap<String, MemoryTable>,
    snapshot: Option<HashMap<String, MemoryTable>>,
    statements: Vec<String>,
    inserts_seen: usize,
    fail_insert_at: Option<usize>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    /// Makes the `n`-th insert (1-based) fail.
    pub fn fail_insert_at(mut self, n: usize) -> Self {
        self.fail_insert_at = Some(n);
        self
    }

    /// Delays every statement by `latency`, like a slow remote store.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn table(&self, name: &str) -> Option<&MemoryTable> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Statements in execution order, transaction control included.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn create(&mut self, name: String, body: &str) -> Result<usize, StoreError> {
        if self.tables.contains_key(&name) {
            return Err(StoreError::Rejected(format!(
                "table '{name}' already exists"
            )));
        }
        let mut columns = Vec::new();
        for definition in split_top_level(body) {
            let definition = definition.trim();
            let (column, sql_type) = split_identifier(definition).ok_or_else(|| {
                StoreError::Rejected(format!("syntax error near '{definition}'"))
            })?;
            if sql_type.is_empty() {
                return Err(StoreError::Rejected(format!(
                    "column '{column}' has no type"
                )));
            }
            columns.push((column, sql_type.to_string()));
        }
        if columns.is_empty() {
            return Err(StoreError::Rejected(format!(
                "table '{name}' must have at least one column"
            )));
        }
        self.tables.insert(
            name,
            MemoryTable {
                columns,
                rows: Vec::new(),
            },
        );
        Ok(0)
    }

    fn insert(
        &mut self,
        name: &str,
        column_list: &str,
        values: &str,
        params: &[Value],
    ) -> Result<usize, StoreError> {
        self.inserts_seen += 1;
        if self.fail_insert_at == Some(self.inserts_seen) {
            return Err(StoreError::Rejected(format!(
                "injected failure on insert {}",
                self.inserts_seen
            )));
        }
        let table = self
            .tables
            .get_mut(name)
            .ok_or_else(|| StoreError::Rejected(format!("table '{name}' does not exist")))?;
        let columns = split_top_level(column_list)
            .into_iter()
            .map(|column| {
                split_identifier(column.trim())
                    .map(|(name, _)| name)
                    .ok_or_else(|| StoreError::Rejected(format!("bad column '{column}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let placeholders = split_top_level(values).len();
        if placeholders != params.len() || columns.len() != params.len() {
            return Err(StoreError::Rejected(format!(
                "{} column(s), {} placeholder(s) and {} parameter(s) do not match",
                columns.len(),
                placeholders,
                params.len()
            )));
        }
        let mut row = vec![Value::Null; table.columns.len()];
        for (column, value) in columns.iter().zip(params) {
            let position = table
                .columns
                .iter()
                .position(|(existing, _)| existing == column)
                .ok_or_else(|| {
                    StoreError::Rejected(format!("column '{column}' not found in '{name}'"))
                })?;
            row[position] = value.clone();
        }
        table.rows.push(row);
        Ok(1)
    }
}

impl Store for MemoryStore {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize, StoreError> {
        self.statements.push(sql.to_string());
        if let Some(latency) = self.latency {
            thread::sleep(latency);
        }
        if let Some(captures) = create_pattern().captures(sql) {
            let name = unquote(&captures[1]);
            return self.create(name, &captures[2]);
        }
        if let Some(captures) = insert_pattern().captures(sql) {
            let name = unquote(&captures[1]);
            return self.insert(&name, &captures[2], &captures[3], params);
        }
        Err(StoreError::Rejected(format!(
            "unsupported statement: {sql}"
        )))
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        if self.snapshot.is_some() {
            return Err(StoreError::Rejected(
                "a transaction is already active".to_string(),
            ));
        }
        self.statements.push("BEGIN TRANSACTION".to_string());
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.snapshot
            .take()
            .ok_or_else(|| StoreError::Rejected("no active transaction".to_string()))?;
        self.statements.push("COMMIT".to_string());
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        let snapshot = self
            .snapshot
            .take()
            .ok_or_else(|| StoreError::Rejected("no active transaction".to_string()))?;
        self.tables = snapshot;
        self.statements.push("ROLLBACK".to_string());
        Ok(())
    }
}

/// Splits on commas outside parentheses and quotes.
fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (idx, ch) in input.char_indices() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '"') => quote = Some('"'),
            (None, '[') => quote = Some(']'),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&input[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if !input[start..].trim().is_empty() || !parts.is_empty() {
        parts.push(&input[start..]);
    }
    parts
}

/// Splits a leading (possibly quoted) identifier from the rest of `input`.
fn split_identifier(input: &str) -> Option<(String, &str)> {
    let end = match input.chars().next()? {
        '"' => input[1..].find('"').map(|idx| idx + 2)?,
        '[' => input.find(']').map(|idx| idx + 1)?,
        _ => input
            .find(char::is_whitespace)
            .unwrap_or(input.len()),
    };
    let name = unquote(&input[..end]);
    if name.is_empty() {
        return None;
    }
    Some((name, input[end..].trim()))
}

fn unquote(identifier: &str) -> String {
    let trimmed = identifier.trim();
    if let Some(inner) = trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        inner.replace("\"\"", "\"")
    } else if let Some(inner) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        inner.replace("]]", "]")
    } else {
        trimmed.to_string()
    }
}
