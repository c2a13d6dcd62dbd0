//! Spreadsheet capability: the first worksheet of a file as a grid of cells.
//!
//! Workbooks (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) are read with
//! calamine; delimited text (`.csv`, `.tsv`, `.txt`, or `-` for stdin) with
//! the csv crate. Either way the file is opened, read into a [`Grid`] and
//! closed before the call returns.
//!
//! Coordinates are 1-based and absolute: row 1 is the header row of the sheet
//! even when the used range starts further down.

use std::{ffi::OsStr, path::Path};

use calamine::{Data, Reader, open_workbook_auto};
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{data::parse_naive_datetime, error::SheetError, io_utils};

static EMPTY: Cell = Cell::Empty;

/// A single cell value as read from the sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(chrono::NaiveDateTime),
    /// Spreadsheet error value such as `#N/A`.
    Error(String),
}

impl Cell {
    /// True for empty cells and for text made only of whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(text) => text.clone(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Cell::Bool(b) => b.to_string(),
            Cell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Cell::Error(code) => code.clone(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty => Cell::Empty,
            Data::String(text) => Cell::Text(text.clone()),
            Data::Int(i) => Cell::Int(*i),
            Data::Float(f) => Cell::Float(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => dt
                .as_datetime()
                .map(Cell::DateTime)
                .unwrap_or_else(|| Cell::Float(dt.as_f64())),
            Data::DateTimeIso(text) => parse_naive_datetime(text)
                .map(Cell::DateTime)
                .unwrap_or_else(|_| Cell::Text(text.clone())),
            Data::DurationIso(text) => Cell::Text(text.clone()),
            Data::Error(err) => Cell::Error(err.to_string()),
        }
    }
}

/// Rows of cells; `rows[0]` is sheet row 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    /// Builds a grid from plain strings; empty strings become empty cells.
    pub fn from_text<I, R, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|cell| Cell::from(cell.into())).collect())
            .collect();
        Self { rows }
    }

    /// Row 1, or nothing when the sheet is empty.
    pub fn header(&self) -> &[Cell] {
        self.rows.first().map(Vec::as_slice).unwrap_or_default()
    }

    /// Cell at 1-based `(row, column)`; outside the used range reads as empty.
    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        row.checked_sub(1)
            .and_then(|r| self.rows.get(r))
            .and_then(|cells| column.checked_sub(1).and_then(|c| cells.get(c)))
            .unwrap_or(&EMPTY)
    }

    /// Cells of 1-based `row`.
    pub fn row(&self, row: usize) -> &[Cell] {
        row.checked_sub(1)
            .and_then(|r| self.rows.get(r))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Rows 2 and onward, paired with their 1-based row number.
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &[Cell])> {
        self.rows
            .iter()
            .enumerate()
            .skip(1)
            .map(|(idx, cells)| (idx + 1, cells.as_slice()))
    }

    /// Number of the last row, header included.
    pub fn last_row(&self) -> usize {
        self.rows.len()
    }

    pub fn data_row_count(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Source of the authoritative (first) worksheet of a file.
pub trait SheetReader {
    fn read_first_sheet(&self, path: &Path) -> Result<Grid, SheetError>;
}

/// Reads workbooks and delimited text files by extension.
#[derive(Debug, Clone, Copy)]
pub struct FileSheetReader {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for FileSheetReader {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
        }
    }
}

impl SheetReader for FileSheetReader {
    fn read_first_sheet(&self, path: &Path) -> Result<Grid, SheetError> {
        if io_utils::is_dash(path) {
            return self.read_delimited(path);
        }
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("xlsx" | "xlsm" | "xlam" | "xlsb" | "xls" | "xla" | "ods") => read_workbook(path),
            Some("csv" | "tsv" | "txt") => self.read_delimited(path),
            _ => Err(SheetError::UnsupportedFormat {
                name: path.to_string_lossy().to_string(),
            }),
        }
    }
}

impl FileSheetReader {
    fn read_delimited(&self, path: &Path) -> Result<Grid, SheetError> {
        let delimiter = io_utils::resolve_input_delimiter(path, self.delimiter);
        let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        let mut rows = Vec::new();
        for (idx, record) in reader.byte_records().enumerate() {
            let record = record?;
            let decoded = io_utils::decode_record(&record, self.encoding).ok_or(
                SheetError::Decode {
                    encoding: self.encoding.name(),
                    row: idx + 1,
                },
            )?;
            rows.push(decoded.into_iter().map(Cell::from).collect::<Vec<_>>());
        }
        if rows.iter().all(|row| row.iter().all(Cell::is_blank)) {
            return Err(SheetError::EmptySheet);
        }
        debug!("Read {} delimited row(s) from {:?}", rows.len(), path);
        Ok(Grid::new(rows))
    }
}

fn read_workbook(path: &Path) -> Result<Grid, SheetError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SheetError::NoWorksheet)??;
    if range.is_empty() {
        return Err(SheetError::EmptySheet);
    }
    let (row_offset, column_offset) = range
        .start()
        .map(|(row, column)| (row as usize, column as usize))
        .unwrap_or_default();

    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
    for source in range.rows() {
        let mut cells = vec![Cell::Empty; column_offset];
        cells.extend(source.iter().map(Cell::from));
        rows.push(cells);
    }
    debug!(
        "Read {} row(s) from the first worksheet of {:?}",
        rows.len(),
        path
    );
    Ok(Grid::new(rows))
}
