use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::PreviewArgs,
    engine::Importer,
    read_input,
    record::Record,
    table::{Align, TextTable},
};

pub fn execute<R: Record>(args: &PreviewArgs) -> Result<()> {
    let grid = read_input(
        &args.source.input,
        args.source.delimiter,
        args.source.input_encoding.as_deref(),
    )?;
    let importer = Importer::<R>::new();
    let descriptor = importer.descriptor();
    let mapping = importer
        .validate_headers(grid.header())
        .with_context(|| format!("Validating headers of {:?}", args.source.input))?;

    let mut table =
        TextTable::new(std::iter::once("row").chain(descriptor.names())).align(0, Align::Right);
    let mut errors = Vec::new();
    for (row, result) in (2..).zip(importer.materialize(&grid, &mapping).take(args.rows)) {
        match result {
            Ok(record) => {
                let values = descriptor.values(&record);
                table.push_row(
                    std::iter::once(row.to_string())
                        .chain(values.iter().map(|value| value.as_display())),
                );
            }
            Err(err) => errors.push(err),
        }
    }

    table.print();
    if !errors.is_empty() {
        println!();
        println!("{} row(s) could not be converted:", errors.len());
        for err in &errors {
            println!("  {err}");
        }
    }
    info!(
        "Previewed {} of {} data row(s) from {:?}",
        table.len() + errors.len(),
        grid.data_row_count(),
        args.source.input
    );
    Ok(())
}
