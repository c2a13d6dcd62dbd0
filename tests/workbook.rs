mod common;

use chrono::NaiveDate;
use sheet_ingest::{
    engine::{ImportSettings, Importer},
    sheet::{Cell, FileSheetReader, SheetReader},
    store::MemoryStore,
    targets::{Car, Employee},
};

use common::fixture_path;

#[test]
fn used_range_below_row_one_keeps_absolute_coordinates() {
    let grid = FileSheetReader::default()
        .read_first_sheet(&fixture_path("offset.xlsx"))
        .expect("read workbook");

    assert!(grid.header().is_empty());
    assert!(grid.row(3).is_empty());
    assert_eq!(
        grid.row(4),
        &[
            Cell::Empty,
            Cell::Empty,
            Cell::Text("make".to_string()),
            Cell::Text("year".to_string()),
        ]
    );
    assert_eq!(grid.cell(5, 3), &Cell::Text("Toyota".to_string()));
    assert_eq!(grid.cell(6, 4).to_text(), "2019");
    assert_eq!(grid.last_row(), 6);

    let numbered: Vec<usize> = grid.data_rows().map(|(row, _)| row).collect();
    assert_eq!(numbered, vec![2, 3, 4, 5, 6]);
    let filled: Vec<usize> = grid
        .data_rows()
        .filter(|(_, cells)| cells.iter().any(|cell| !cell.is_blank()))
        .map(|(row, _)| row)
        .collect();
    assert_eq!(filled, vec![4, 5, 6]);
}

#[test]
fn leading_empty_columns_are_padded() {
    let grid = FileSheetReader::default()
        .read_first_sheet(&fixture_path("cars.xlsx"))
        .expect("read workbook");

    assert_eq!(grid.cell(1, 1), &Cell::Empty);
    assert_eq!(grid.cell(1, 2), &Cell::Text("make".to_string()));
    assert_eq!(grid.column_count(), 4);

    let importer = Importer::<Car>::new();
    let mapping = importer.validate_headers(grid.header()).expect("car headers");
    assert_eq!(
        mapping.describe(importer.descriptor()),
        vec![(2, "make"), (3, "year"), (4, "price")]
    );
}

#[test]
fn workbook_dates_and_numbers_materialize_into_employee() {
    let grid = FileSheetReader::default()
        .read_first_sheet(&fixture_path("employees.xlsx"))
        .expect("read workbook");
    let importer = Importer::<Employee>::new();
    let mapping = importer.validate_headers(grid.header()).expect("employee headers");

    let employee = importer
        .materialize(&grid, &mapping)
        .next()
        .expect("one data row")
        .expect("row converts");
    assert_eq!(employee.badge, 7);
    assert_eq!(employee.employee_number, 9_000_000_001);
    assert_eq!(employee.department, None);
    assert!(employee.active);
    assert_eq!(
        employee.hired_at,
        NaiveDate::from_ymd_opt(2021, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    );
    assert_eq!(employee.birthday, NaiveDate::from_ymd_opt(1985, 12, 10));
}

#[test]
fn workbook_import_reaches_the_store() {
    let grid = FileSheetReader::default()
        .read_first_sheet(&fixture_path("employees.xlsx"))
        .expect("read workbook");
    let mut store = MemoryStore::new();
    let outcome = Importer::<Employee>::new()
        .import(&grid, &mut store, &ImportSettings::default())
        .expect("import succeeds");

    assert_eq!(outcome.report.inserted, 1);
    assert!(outcome.report.table.starts_with("Employee_"));
    assert_eq!(store.table(&outcome.report.table).unwrap().rows.len(), 1);
}
