//! Load settings read from a YAML file.
//!
//! ```yaml
//! database: warehouse.duckdb
//! table: cars
//! row_policy: skip-invalid
//! insert_policy: collect-failures
//! timeout_secs: 30
//! delimiter: tab
//! ```
//!
//! Every key is optional; command-line flags override file values.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    cli::parse_delimiter,
    ddl::{Dialect, TableNaming},
    engine::ImportSettings,
    materialize::RowPolicy,
    persist::{InsertPolicy, PersistOptions},
};

pub const DEFAULT_DATABASE: &str = "sheet-ingest.duckdb";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    pub database: PathBuf,
    /// Fixed table name; a timestamped name is generated when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub dialect: Dialect,
    pub row_policy: RowPolicy,
    pub insert_policy: InsertPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_encoding: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            table: None,
            dialect: Dialect::default(),
            row_policy: RowPolicy::default(),
            insert_policy: InsertPolicy::default(),
            timeout_secs: None,
            delimiter: None,
            input_encoding: None,
        }
    }
}

impl IngestConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: IngestConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        config.delimiter_byte()?;
        Ok(config)
    }

    /// Defaults, or the contents of `path` when one is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn delimiter_byte(&self) -> Result<Option<u8>> {
        self.delimiter
            .as_deref()
            .map(|value| parse_delimiter(value).map_err(|err| anyhow!("Invalid delimiter: {err}")))
            .transpose()
    }

    pub fn import_settings(&self) -> ImportSettings {
        ImportSettings {
            naming: TableNaming::from(self.table.clone()),
            row_policy: self.row_policy,
            persist: PersistOptions {
                policy: self.insert_policy,
                timeout: self.timeout_secs.map(Duration::from_secs),
            },
        }
    }
}
