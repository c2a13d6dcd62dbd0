pub mod cli;
pub mod config;
pub mod data;
pub mod ddl;
pub mod engine;
pub mod error;
pub mod header;
pub mod io_utils;
mod load;
pub mod materialize;
pub mod persist;
mod preview;
pub mod record;
pub mod sheet;
pub mod store;
pub mod table;
pub mod targets;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{CheckArgs, Cli, Commands, DescribeArgs},
    ddl::{SqlType, TableNaming},
    engine::Importer,
    record::Record,
    sheet::{FileSheetReader, Grid, SheetReader},
    table::{Align, TextTable},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_ingest", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Load(args) => with_target!(args.source.target, R => load::execute::<R>(&args)),
        Commands::Check(args) => with_target!(args.source.target, R => handle_check::<R>(&args)),
        Commands::Describe(args) => with_target!(args.target, R => handle_describe::<R>(&args)),
        Commands::Preview(args) => {
            with_target!(args.source.target, R => preview::execute::<R>(&args))
        }
    }
}

/// Reads the first worksheet of `path` into memory.
pub(crate) fn read_input(
    path: &Path,
    delimiter: Option<u8>,
    encoding: Option<&str>,
) -> Result<Grid> {
    let reader = FileSheetReader {
        delimiter,
        encoding: io_utils::resolve_encoding(encoding)?,
    };
    info!("Reading first worksheet of {path:?}");
    let grid = reader
        .read_first_sheet(path)
        .with_context(|| format!("Reading spreadsheet {path:?}"))?;
    debug!(
        "Worksheet has {} data row(s) across {} column(s)",
        grid.data_row_count(),
        grid.column_count()
    );
    Ok(grid)
}

fn handle_check<R: Record>(args: &CheckArgs) -> Result<()> {
    let grid = read_input(
        &args.source.input,
        args.source.delimiter,
        args.source.input_encoding.as_deref(),
    )?;
    let importer = Importer::<R>::new();
    let mapping = importer
        .validate_headers(grid.header())
        .with_context(|| format!("Validating headers of {:?}", args.source.input))?;
    println!("Headers validated.");

    let mut table = TextTable::new(["column", "header", "field", "kind"]).align(0, Align::Right);
    for entry in &mapping {
        if let Some(field) = importer.descriptor().field(entry.field) {
            table.push_row([
                entry.column.to_string(),
                grid.cell(1, entry.column).to_text(),
                field.name.clone(),
                field.kind.to_string(),
            ]);
        }
    }
    table.print();
    info!(
        "{} column(s) of {:?} map onto '{}'",
        mapping.len(),
        args.source.input,
        R::TYPE_NAME
    );
    Ok(())
}

fn handle_describe<R: Record>(args: &DescribeArgs) -> Result<()> {
    let importer = Importer::<R>::new();
    let name = TableNaming::from(args.table.clone()).resolve_now(R::TYPE_NAME);
    let table_def = importer
        .derive_table(&name)
        .with_context(|| format!("Deriving table for '{}'", R::TYPE_NAME))?;

    println!("Type: {}", R::TYPE_NAME);
    let mut table =
        TextTable::new(["#", "field", "kind", "column type", args.dialect.to_string().as_str()])
            .align(0, Align::Right);
    for (idx, field) in importer.descriptor().fields().iter().enumerate() {
        let sql_type = SqlType::for_kind(field.kind);
        table.push_row([
            (idx + 1).to_string(),
            field.name.clone(),
            field.kind.to_string(),
            sql_type.to_string(),
            sql_type.render(args.dialect).to_string(),
        ]);
    }
    table.print();
    println!();
    println!("{};", table_def.create_statement(args.dialect));
    println!("{};", table_def.insert_statement(args.dialect));
    Ok(())
}
