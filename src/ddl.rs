//! Relational table definitions derived from a target type.

use std::{fmt, sync::OnceLock};

use chrono::{Local, NaiveDateTime};
use clap::ValueEnum;
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    error::SchemaError,
    record::{FieldKind, TypeDescriptor},
};

const TIMESTAMP_FORMAT: &str = "%d%m%Y%H%M%S";

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,127}$").expect("identifier pattern compiles")
    })
}

/// SQL flavour used when rendering statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    #[default]
    #[value(name = "duckdb")]
    #[serde(rename = "duckdb")]
    DuckDb,
    SqlServer,
}

impl Dialect {
    pub fn quote_identifier(&self, name: &str) -> String {
        match self {
            Dialect::DuckDb => format!("\"{}\"", name.replace('"', "\"\"")),
            Dialect::SqlServer => format!("[{}]", name.replace(']', "]]")),
        }
    }

    /// Placeholder for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::DuckDb => "?".to_string(),
            Dialect::SqlServer => format!("@p{index}"),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::DuckDb => "duckdb",
            Dialect::SqlServer => "sql-server",
        })
    }
}

/// Relational column type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    LargeText,
    SmallInt,
    Int,
    BigInt,
    Money,
    Float,
    Real,
    DateTime,
    Bit,
    UniqueIdentifier,
}

impl SqlType {
    pub fn for_kind(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Text | FieldKind::Unknown => SqlType::LargeText,
            FieldKind::Int16 => SqlType::SmallInt,
            FieldKind::Int32 => SqlType::Int,
            FieldKind::Int64 => SqlType::BigInt,
            FieldKind::Money => SqlType::Money,
            FieldKind::Double => SqlType::Float,
            FieldKind::Single => SqlType::Real,
            FieldKind::DateTime => SqlType::DateTime,
            FieldKind::Boolean => SqlType::Bit,
            FieldKind::Guid => SqlType::UniqueIdentifier,
        }
    }

    /// Dialect-neutral label.
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlType::LargeText => "large-text",
            SqlType::SmallInt => "small-int",
            SqlType::Int => "int",
            SqlType::BigInt => "big-int",
            SqlType::Money => "money",
            SqlType::Float => "float",
            SqlType::Real => "real",
            SqlType::DateTime => "datetime",
            SqlType::Bit => "bit",
            SqlType::UniqueIdentifier => "unique-identifier",
        }
    }

    pub fn render(&self, dialect: Dialect) -> &'static str {
        match dialect {
            Dialect::DuckDb => match self {
                SqlType::LargeText => "VARCHAR",
                SqlType::SmallInt => "SMALLINT",
                SqlType::Int => "INTEGER",
                SqlType::BigInt => "BIGINT",
                SqlType::Money => "DECIMAL(19,4)",
                SqlType::Float => "DOUBLE",
                SqlType::Real => "REAL",
                SqlType::DateTime => "TIMESTAMP",
                SqlType::Bit => "BOOLEAN",
                SqlType::UniqueIdentifier => "UUID",
            },
            Dialect::SqlServer => match self {
                SqlType::LargeText => "nvarchar(max)",
                SqlType::SmallInt => "smallint",
                SqlType::Int => "int",
                SqlType::BigInt => "bigint",
                SqlType::Money => "money",
                SqlType::Float => "float",
                SqlType::Real => "real",
                SqlType::DateTime => "datetime",
                SqlType::Bit => "bit",
                SqlType::UniqueIdentifier => "uniqueidentifier",
            },
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: SqlType,
}

/// A destination table: name plus columns in field declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableDescriptor {
    pub fn create_statement(&self, dialect: Dialect) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| {
                format!(
                    "{} {}",
                    dialect.quote_identifier(&column.name),
                    column.sql_type.render(dialect)
                )
            })
            .join(", ");
        format!(
            "CREATE TABLE {} ({})",
            dialect.quote_identifier(&self.name),
            columns
        )
    }

    /// Parameterized insert covering every column in order.
    pub fn insert_statement(&self, dialect: Dialect) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| dialect.quote_identifier(&column.name))
            .join(", ");
        let placeholders = (1..=self.columns.len())
            .map(|index| dialect.placeholder(index))
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            dialect.quote_identifier(&self.name),
            columns,
            placeholders
        )
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }
}

pub fn is_valid_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

/// Maps every field of `descriptor` to a column of table `name`.
pub fn derive_table<R>(
    descriptor: &TypeDescriptor<R>,
    name: &str,
) -> Result<TableDescriptor, SchemaError> {
    if !is_valid_identifier(name) {
        return Err(SchemaError::InvalidIdentifier {
            name: name.to_string(),
        });
    }
    let columns = descriptor
        .fields()
        .iter()
        .map(|field| ColumnDef {
            name: field.name.clone(),
            sql_type: SqlType::for_kind(field.kind),
        })
        .collect();
    Ok(TableDescriptor {
        name: name.to_string(),
        columns,
    })
}

/// How the destination table is named.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TableNaming {
    /// Exact name; a rerun fails once the table exists.
    Fixed(String),
    /// `<TypeName>_<ddMMyyyyHHmmss>`.
    #[default]
    Timestamped,
}

impl TableNaming {
    pub fn resolve(&self, type_name: &str, now: NaiveDateTime) -> String {
        match self {
            TableNaming::Fixed(name) => name.clone(),
            TableNaming::Timestamped => {
                format!("{}_{}", type_name, now.format(TIMESTAMP_FORMAT))
            }
        }
    }

    pub fn resolve_now(&self, type_name: &str) -> String {
        self.resolve(type_name, Local::now().naive_local())
    }
}

impl From<Option<String>> for TableNaming {
    fn from(value: Option<String>) -> Self {
        value.map_or(TableNaming::Timestamped, TableNaming::Fixed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::*;

    crate::target_type! {
        #[derive(Debug, Default)]
        struct Car {
            make: String,
            year: i32,
            price: Decimal,
        }
    }

    fn car_table() -> TableDescriptor {
        derive_table(&TypeDescriptor::<Car>::new(), "cars").unwrap()
    }

    #[test]
    fn car_columns_follow_declaration_order() {
        let table = car_table();
        let columns: Vec<(&str, &str)> = table
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c.sql_type.as_str()))
            .collect();
        assert_eq!(
            columns,
            vec![("make", "large-text"), ("year", "int"), ("price", "money")]
        );
    }

    #[test]
    fn create_statement_has_no_trailing_separator() {
        let table = car_table();
        assert_eq!(
            table.create_statement(Dialect::DuckDb),
            r#"CREATE TABLE "cars" ("make" VARCHAR, "year" INTEGER, "price" DECIMAL(19,4))"#
        );
        assert_eq!(
            table.create_statement(Dialect::SqlServer),
            "CREATE TABLE [cars] ([make] nvarchar(max), [year] int, [price] money)"
        );
    }

    #[test]
    fn insert_statement_uses_placeholders() {
        let table = car_table();
        assert_eq!(
            table.insert_statement(Dialect::DuckDb),
            r#"INSERT INTO "cars" ("make", "year", "price") VALUES (?, ?, ?)"#
        );
        assert_eq!(
            table.insert_statement(Dialect::SqlServer),
            "INSERT INTO [cars] ([make], [year], [price]) VALUES (@p1, @p2, @p3)"
        );
    }

    #[test]
    fn every_kind_has_a_column_type() {
        let kinds = [
            (FieldKind::Text, "nvarchar(max)"),
            (FieldKind::Unknown, "nvarchar(max)"),
            (FieldKind::Int16, "smallint"),
            (FieldKind::Int64, "bigint"),
            (FieldKind::Double, "float"),
            (FieldKind::Single, "real"),
            (FieldKind::DateTime, "datetime"),
            (FieldKind::Boolean, "bit"),
            (FieldKind::Guid, "uniqueidentifier"),
        ];
        for (kind, expected) in kinds {
            assert_eq!(SqlType::for_kind(kind).render(Dialect::SqlServer), expected);
        }
        assert_eq!(SqlType::for_kind(FieldKind::Guid).render(Dialect::DuckDb), "UUID");
    }

    #[test]
    fn invalid_table_names_are_rejected() {
        let descriptor = TypeDescriptor::<Car>::new();
        for name in ["", "1cars", "cars; DROP TABLE x", "my cars"] {
            let err = derive_table(&descriptor, name).unwrap_err();
            assert!(matches!(err, SchemaError::InvalidIdentifier { .. }), "{name}");
        }
        assert!(derive_table(&descriptor, "_cars_2024").is_ok());
    }

    #[test]
    fn timestamped_names_use_day_month_year() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 1)
            .unwrap();
        assert_eq!(
            TableNaming::Timestamped.resolve("Car", now),
            "Car_07032024090501"
        );
        assert_eq!(
            TableNaming::Fixed("cars".to_string()).resolve("Car", now),
            "cars"
        );
        assert!(is_valid_identifier(&TableNaming::Timestamped.resolve_now("Car")));
    }

    #[test]
    fn quoting_escapes_delimiters() {
        assert_eq!(Dialect::DuckDb.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::SqlServer.quote_identifier("a]b"), "[a]]b]");
    }
}
