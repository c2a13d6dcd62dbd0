use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{ddl::Dialect, targets::TargetKind};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Load spreadsheet rows into typed database tables",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate, convert and insert the first worksheet of a file
    Load(LoadArgs),
    /// Check that the header row matches the target type
    Check(CheckArgs),
    /// Show the fields of a target type and the table it maps to
    Describe(DescribeArgs),
    /// Convert the first rows of a file and print them as a table
    Preview(PreviewArgs),
}

#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Spreadsheet to read (.xlsx, .xls, .ods, .csv, .tsv, or - for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Record type the rows map onto
    #[arg(short = 't', long = "target", value_enum)]
    pub target: TargetKind,
    /// Delimiter for text input (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of text input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    #[command(flatten)]
    pub source: InputArgs,
    /// YAML file with load settings; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// DuckDB database file (created when missing)
    #[arg(long)]
    pub database: Option<PathBuf>,
    /// Fixed table name instead of <Type>_<ddMMyyyyHHmmss>
    #[arg(long)]
    pub table: Option<String>,
    /// Insert the rows that convert and report the others
    #[arg(long = "skip-invalid-rows")]
    pub skip_invalid_rows: bool,
    /// Attempt every insert outside a transaction and report failures
    #[arg(long = "collect-insert-failures")]
    pub collect_insert_failures: bool,
    /// Abort the insert batch after this many seconds
    #[arg(long = "timeout-secs")]
    pub timeout_secs: Option<u64>,
    /// Write rows that failed to convert to this CSV file (- for stdout)
    #[arg(long)]
    pub rejects: Option<PathBuf>,
    /// Run against an in-memory store and print the statements
    #[arg(long = "dry-run")]
    pub dry_run: bool,
    /// SQL dialect for the statements printed by --dry-run
    #[arg(long, value_enum)]
    pub dialect: Option<Dialect>,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub source: InputArgs,
}

#[derive(Debug, Args)]
pub struct DescribeArgs {
    /// Record type to describe
    #[arg(short = 't', long = "target", value_enum)]
    pub target: TargetKind,
    /// SQL dialect used for column types and DDL
    #[arg(long, value_enum, default_value_t = Dialect::DuckDb)]
    pub dialect: Dialect,
    /// Table name used in the DDL (defaults to a timestamped name)
    #[arg(long)]
    pub table: Option<String>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub source: InputArgs,
    /// Number of data rows to convert
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
