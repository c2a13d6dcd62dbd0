//! Typed field values and the coercions from spreadsheet cells into them.
//!
//! [`Value`] is the currency passed between record setters/getters, the store
//! and the reports. [`coerce_cell`] turns one [`Cell`] into the [`Value`]
//! variant required by a field's [`FieldKind`], or explains why it cannot.

use std::{fmt, str::FromStr};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use uuid::Uuid;

use crate::{record::FieldKind, sheet::Cell};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Money(Decimal),
    Double(f64),
    Single(f32),
    Boolean(bool),
    DateTime(NaiveDateTime),
    Guid(Uuid),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short label used in conversion diagnostics.
    pub fn type_label(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "text",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Money(_) => "money",
            Value::Double(_) => "double",
            Value::Single(_) => "single",
            Value::Boolean(_) => "boolean",
            Value::DateTime(_) => "datetime",
            Value::Guid(_) => "guid",
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            Value::Int16(i) => i.to_string(),
            Value::Int32(i) => i.to_string(),
            Value::Int64(i) => i.to_string(),
            Value::Money(d) => d.to_string(),
            Value::Double(f) => f.to_string(),
            Value::Single(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::Guid(g) => g.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Lower-cased, trimmed form used to match headers against field names.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate, String> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .ok_or_else(|| format!("cannot parse '{value}' as date"))
}

/// Parses a timestamp, accepting a bare date as midnight.
pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime, String> {
    let trimmed = value.trim();
    if let Some(parsed) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
    {
        return Ok(parsed);
    }
    parse_naive_date(trimmed)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("cannot parse '{value}' as datetime"))
}

pub fn parse_boolean(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => Err(format!("cannot parse '{value}' as boolean")),
    }
}

/// Parses a decimal amount, tolerating a leading currency symbol and `,`
/// group separators.
pub fn parse_money(value: &str) -> Result<Decimal, String> {
    let trimmed = value.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };
    let digits: String = unsigned
        .trim_start_matches(['$', '€', '£'])
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let parsed = Decimal::from_str(digits.trim())
        .or_else(|_| Decimal::from_scientific(digits.trim()))
        .map_err(|_| format!("cannot parse '{value}' as money"))?;
    Ok(if negative { -parsed } else { parsed })
}

pub fn parse_guid(value: &str) -> Result<Uuid, String> {
    let trimmed = value.trim().trim_matches(|c| matches!(c, '{' | '}'));
    Uuid::parse_str(trimmed).map_err(|_| format!("cannot parse '{value}' as guid"))
}

/// Converts an Excel serial date (days since 1899-12-30) to a timestamp.
/// Serials below 60 are shifted by one day for the Lotus 1-2-3 leap year bug.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let micros = (serial.fract() * 86_400_000_000f64).round() as i64;
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let shift = if days < 60 { 1 } else { 0 };
    base.checked_add_signed(Duration::days(days + shift))?
        .checked_add_signed(Duration::microseconds(micros))
}

/// Coerces a cell into the value variant required by `kind`.
///
/// Blank cells become [`Value::Null`], which leaves the field at its default.
pub fn coerce_cell(cell: &Cell, kind: FieldKind) -> Result<Value, String> {
    if cell.is_blank() {
        return Ok(Value::Null);
    }
    if let Cell::Error(code) = cell {
        return Err(format!("cell holds error value {code}"));
    }
    match kind {
        FieldKind::Text | FieldKind::Unknown => Ok(Value::Text(cell_text(cell))),
        FieldKind::Int16 => {
            let value = to_integer(cell, kind)?;
            i16::try_from(value)
                .map(Value::Int16)
                .map_err(|_| out_of_range(cell, kind))
        }
        FieldKind::Int32 => {
            let value = to_integer(cell, kind)?;
            i32::try_from(value)
                .map(Value::Int32)
                .map_err(|_| out_of_range(cell, kind))
        }
        FieldKind::Int64 => to_integer(cell, kind).map(Value::Int64),
        FieldKind::Money => match cell {
            Cell::Int(i) => Ok(Value::Money(Decimal::from(*i))),
            Cell::Float(f) => Decimal::from_f64(*f)
                .map(Value::Money)
                .ok_or_else(|| cannot_convert(cell, kind)),
            Cell::Text(text) => parse_money(text)
                .map(Value::Money)
                .map_err(|_| cannot_convert(cell, kind)),
            _ => Err(cannot_convert(cell, kind)),
        },
        FieldKind::Double => to_float(cell, kind).map(Value::Double),
        FieldKind::Single => {
            let value = to_float(cell, kind)? as f32;
            if value.is_finite() {
                Ok(Value::Single(value))
            } else {
                Err(out_of_range(cell, kind))
            }
        }
        FieldKind::Boolean => match cell {
            Cell::Bool(b) => Ok(Value::Boolean(*b)),
            Cell::Int(0) => Ok(Value::Boolean(false)),
            Cell::Int(1) => Ok(Value::Boolean(true)),
            Cell::Float(f) if *f == 0.0 || *f == 1.0 => Ok(Value::Boolean(*f == 1.0)),
            Cell::Text(text) => parse_boolean(text)
                .map(Value::Boolean)
                .map_err(|_| cannot_convert(cell, kind)),
            _ => Err(cannot_convert(cell, kind)),
        },
        FieldKind::DateTime => match cell {
            Cell::DateTime(dt) => Ok(Value::DateTime(*dt)),
            Cell::Int(i) => excel_serial_to_datetime(*i as f64)
                .map(Value::DateTime)
                .ok_or_else(|| cannot_convert(cell, kind)),
            Cell::Float(f) => excel_serial_to_datetime(*f)
                .map(Value::DateTime)
                .ok_or_else(|| cannot_convert(cell, kind)),
            Cell::Text(text) => parse_naive_datetime(text)
                .map(Value::DateTime)
                .map_err(|_| cannot_convert(cell, kind)),
            _ => Err(cannot_convert(cell, kind)),
        },
        FieldKind::Guid => match cell {
            Cell::Text(text) => parse_guid(text)
                .map(Value::Guid)
                .map_err(|_| cannot_convert(cell, kind)),
            _ => Err(cannot_convert(cell, kind)),
        },
    }
}

/// Text for text-like fields; date cells at midnight render as a bare date so
/// date-only types parse them.
fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::DateTime(dt) if dt.time() == NaiveTime::MIN => dt.format("%Y-%m-%d").to_string(),
        _ => cell.to_text(),
    }
}

fn to_integer(cell: &Cell, kind: FieldKind) -> Result<i64, String> {
    match cell {
        Cell::Int(i) => Ok(*i),
        Cell::Float(f) if f.fract() == 0.0 => {
            if *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                Ok(*f as i64)
            } else {
                Err(out_of_range(cell, kind))
            }
        }
        Cell::Text(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| cannot_convert(cell, kind)),
        _ => Err(cannot_convert(cell, kind)),
    }
}

fn to_float(cell: &Cell, kind: FieldKind) -> Result<f64, String> {
    match cell {
        Cell::Int(i) => Ok(*i as f64),
        Cell::Float(f) => Ok(*f),
        Cell::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| cannot_convert(cell, kind)),
        _ => Err(cannot_convert(cell, kind)),
    }
}

fn cannot_convert(cell: &Cell, kind: FieldKind) -> String {
    format!("cannot convert '{}' to {}", cell.to_text(), kind.as_str())
}

fn out_of_range(cell: &Cell, kind: FieldKind) -> String {
    format!("'{}' is out of range for {}", cell.to_text(), kind.as_str())
}
