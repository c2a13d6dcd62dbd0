use std::path::Path;

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};

use crate::{
    cli::LoadArgs,
    config::IngestConfig,
    ddl::Dialect,
    engine::{ImportOutcome, Importer},
    error::{ImportError, PersistError, RowError},
    io_utils,
    materialize::RowPolicy,
    persist::InsertPolicy,
    read_input,
    record::Record,
    sheet::Grid,
    store::{DuckDbStore, MemoryStore, Store},
};

pub fn execute<R: Record>(args: &LoadArgs) -> Result<()> {
    let config = resolve_config(args)?;
    let delimiter = match args.source.delimiter {
        Some(delimiter) => Some(delimiter),
        None => config.delimiter_byte()?,
    };
    let grid = read_input(
        &args.source.input,
        delimiter,
        config.input_encoding.as_deref(),
    )?;

    let importer = Importer::<R>::new();
    let mapping = importer
        .validate_headers(grid.header())
        .with_context(|| format!("Validating headers of {:?}", args.source.input))?;
    debug!("Column mapping: {:?}", mapping.describe(importer.descriptor()));
    println!("Headers validated.");

    let outcome = if args.dry_run {
        let mut store = MemoryStore::with_dialect(config.dialect);
        let outcome = run_import(&importer, &grid, &mut store, &config, args.rejects.as_deref());
        for statement in store.statements() {
            println!("{statement}");
        }
        outcome?
    } else {
        if config.dialect != Dialect::DuckDb {
            warn!(
                "Dialect '{}' only applies to --dry-run; loading into DuckDB with its own SQL",
                config.dialect
            );
        }
        let mut store = DuckDbStore::open(&config.database)
            .with_context(|| format!("Opening database {:?}", config.database))?;
        run_import(&importer, &grid, &mut store, &config, args.rejects.as_deref())?
    };

    if !outcome.skipped.is_empty() {
        println!("Skipped {} invalid row(s)", outcome.skipped.len());
    }
    if !outcome.report.failures.is_empty() {
        println!("Failed to insert {} row(s)", outcome.report.failures.len());
        for failure in &outcome.report.failures {
            println!("  record {}: {}", failure.record, failure.message);
        }
    }
    println!(
        "Data uploaded: {} row(s) into {}",
        outcome.report.inserted, outcome.report.table
    );
    info!(
        "Loaded {} row(s) from {:?} into '{}'",
        outcome.report.inserted, args.source.input, outcome.report.table
    );
    Ok(())
}

fn run_import<R: Record, S: Store + ?Sized>(
    importer: &Importer<R>,
    grid: &Grid,
    store: &mut S,
    config: &IngestConfig,
    rejects: Option<&Path>,
) -> Result<ImportOutcome> {
    match importer.import(grid, store, &config.import_settings()) {
        Ok(outcome) => {
            if let Some(path) = rejects {
                write_rejects(path, &outcome.skipped)?;
            }
            Ok(outcome)
        }
        Err(ImportError::Rows(errors)) => {
            for err in &errors {
                eprintln!("{err}");
            }
            if let Some(path) = rejects {
                write_rejects(path, &errors)?;
            }
            bail!(
                "{} row(s) could not be converted; nothing was loaded (use --skip-invalid-rows to load the rest)",
                errors.len()
            )
        }
        Err(err) => {
            if let ImportError::Persist(PersistError::TimedOut { partial, .. }) = &err {
                for failure in &partial.failures {
                    eprintln!("  record {}: {}", failure.record, failure.message);
                }
            }
            Err(err).context("Loading data")
        }
    }
}

fn resolve_config(args: &LoadArgs) -> Result<IngestConfig> {
    let mut config = IngestConfig::load_or_default(args.config.as_deref())?;
    if let Some(database) = &args.database {
        config.database = database.clone();
    }
    if let Some(table) = &args.table {
        config.table = Some(table.clone());
    }
    if args.skip_invalid_rows {
        config.row_policy = RowPolicy::SkipInvalid;
    }
    if args.collect_insert_failures {
        config.insert_policy = InsertPolicy::CollectFailures;
    }
    if let Some(timeout) = args.timeout_secs {
        config.timeout_secs = Some(timeout);
    }
    if let Some(dialect) = args.dialect {
        config.dialect = dialect;
    }
    if let Some(encoding) = &args.source.input_encoding {
        config.input_encoding = Some(encoding.clone());
    }
    debug!("Effective load settings: {config:?}");
    Ok(config)
}

fn write_rejects(path: &Path, errors: &[RowError]) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path)?;
    writer.write_record(["row", "column", "field", "value", "message"])?;
    for err in errors {
        writer.write_record([
            err.row.to_string(),
            err.column.to_string(),
            err.field.clone(),
            err.value.clone(),
            err.message.clone(),
        ])?;
    }
    writer.flush().context("Flushing rejects file")?;
    if errors.is_empty() {
        debug!("No rejected rows written to {path:?}");
    } else {
        warn!("Wrote {} rejected row(s) to {path:?}", errors.len());
    }
    Ok(())
}
