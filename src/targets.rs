//! Built-in target types selectable from the command line.

use chrono::{NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::target_type;

target_type! {
    /// A vehicle listing.
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Car {
        pub make: String,
        pub year: i32,
        pub price: Decimal,
    }
}

target_type! {
    /// Staff record covering every supported field kind.
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Employee {
        pub id: Uuid,
        pub name: String,
        pub department: Option<String>,
        pub badge: i16,
        pub age: i32,
        pub employee_number: i64,
        pub salary: Decimal,
        pub bonus: Option<Decimal>,
        pub rating: f64,
        pub score: f32,
        pub active: bool,
        pub hired_at: NaiveDateTime,
        pub birthday: Option<NaiveDate>,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum TargetKind {
    Car,
    Employee,
}

/// Runs `$body` with `$ty` aliased to the record type selected by `$kind`.
#[macro_export]
macro_rules! with_target {
    ($kind:expr, $ty:ident => $body:expr) => {
        match $kind {
            $crate::targets::TargetKind::Car => {
                type $ty = $crate::targets::Car;
                $body
            }
            $crate::targets::TargetKind::Employee => {
                type $ty = $crate::targets::Employee;
                $body
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ddl::SqlType,
        record::{FieldKind, Record, TypeDescriptor},
    };

    #[test]
    fn employee_covers_every_kind() {
        let descriptor = TypeDescriptor::<Employee>::new();
        let kinds: std::collections::HashSet<FieldKind> =
            descriptor.fields().iter().map(|field| field.kind).collect();
        assert_eq!(kinds.len(), 11);
        let types: std::collections::HashSet<SqlType> =
            kinds.into_iter().map(SqlType::for_kind).collect();
        assert_eq!(types.len(), 10);
    }

    #[test]
    fn dispatch_selects_the_record_type() {
        let name = with_target!(TargetKind::Employee, R => R::TYPE_NAME);
        assert_eq!(name, "Employee");
        let count = with_target!(TargetKind::Car, R => R::fields().len());
        assert_eq!(count, 3);
    }
}
