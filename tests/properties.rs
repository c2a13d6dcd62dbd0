use proptest::prelude::*;
use rust_decimal::Decimal;
use sheet_ingest::{
    data::Value,
    ddl::{TableNaming, derive_table},
    engine::{ImportSettings, Importer},
    header::validate_headers,
    materialize::materialize,
    record::TypeDescriptor,
    sheet::Grid,
    store::MemoryStore,
    targets::{Car, Employee},
};

const EMPLOYEE_FIELDS: &[&str] = &[
    "id",
    "name",
    "department",
    "badge",
    "age",
    "employee_number",
    "salary",
    "bonus",
    "rating",
    "score",
    "active",
    "hired_at",
    "birthday",
];

#[derive(Debug, Clone)]
enum Header {
    Known(String),
    Blank(String),
    Unknown(String),
}

impl Header {
    fn text(&self) -> &str {
        match self {
            Header::Known(text) | Header::Blank(text) | Header::Unknown(text) => text,
        }
    }
}

/// A field name with random casing and surrounding whitespace.
fn disguised_field() -> impl Strategy<Value = String> {
    (
        proptest::sample::select(EMPLOYEE_FIELDS),
        proptest::collection::vec(any::<bool>(), 16),
        "[ \t]{0,2}",
        "[ \t]{0,2}",
    )
        .prop_map(|(name, upper, before, after)| {
            let cased: String = name
                .chars()
                .zip(upper.iter().cycle())
                .map(|(ch, up)| if *up { ch.to_ascii_uppercase() } else { ch })
                .collect();
            format!("{before}{cased}{after}")
        })
}

fn header_strategy() -> impl Strategy<Value = Header> {
    prop_oneof![
        4 => disguised_field().prop_map(Header::Known),
        1 => "[ \t]{0,3}".prop_map(Header::Blank),
        1 => "[a-z]{1,8}"
            .prop_filter("must not name a field", |text| !EMPLOYEE_FIELDS.contains(&text.as_str()))
            .prop_map(Header::Unknown),
    ]
}

proptest! {
    #[test]
    fn headers_validate_iff_every_nonblank_header_is_a_field(
        headers in proptest::collection::vec(header_strategy(), 0..12)
    ) {
        let descriptor = TypeDescriptor::<Employee>::new();
        let grid = Grid::from_text([headers.iter().map(Header::text).collect::<Vec<_>>()]);
        let result = validate_headers(&descriptor, grid.header());

        let first_unknown = headers
            .iter()
            .position(|header| matches!(header, Header::Unknown(_)));
        match first_unknown {
            Some(idx) => {
                let err = result.expect_err("unknown header must fail");
                let expected = format!("(column {})", idx + 1);
                prop_assert!(err.to_string().contains(&expected));
            }
            None => {
                let mapping = result.expect("all headers known");
                let nonblank = headers
                    .iter()
                    .filter(|header| matches!(header, Header::Known(_)))
                    .count();
                prop_assert_eq!(mapping.len(), nonblank);
                for (idx, header) in headers.iter().enumerate() {
                    let mapped = mapping.field_for(idx + 1);
                    match header {
                        Header::Known(text) => {
                            let field = mapped.and_then(|f| descriptor.field(f));
                            let expected = text.trim().to_lowercase();
                            prop_assert_eq!(
                                field.map(|f| f.name.as_str()),
                                Some(expected.as_str())
                            );
                        }
                        _ => prop_assert!(mapped.is_none()),
                    }
                }
            }
        }
    }

    #[test]
    fn materialize_yields_one_result_per_data_row(
        rows in proptest::collection::vec(
            proptest::collection::vec("[A-Za-z0-9 .]{0,6}", 0..5),
            0..20,
        )
    ) {
        let descriptor = TypeDescriptor::<Car>::new();
        let mut all = vec![vec!["make".to_string(), "year".to_string(), "price".to_string()]];
        all.extend(rows.iter().cloned());
        let grid = Grid::from_text(all);
        let mapping = validate_headers(&descriptor, grid.header()).expect("car headers");

        let results: Vec<_> = materialize(&descriptor, &grid, &mapping).collect();
        prop_assert_eq!(results.len(), rows.len());
        for (idx, result) in results.iter().enumerate() {
            if let Err(err) = result {
                prop_assert_eq!(err.row, idx + 2);
                prop_assert!(err.column == 2 || err.column == 3);
            }
        }
    }

    #[test]
    fn derived_columns_follow_declaration_order(name in "[A-Za-z_][A-Za-z0-9_]{0,30}") {
        let descriptor = TypeDescriptor::<Employee>::new();
        let first = derive_table(&descriptor, &name).expect("valid identifier");
        let second = derive_table(&descriptor, &name).expect("valid identifier");
        prop_assert_eq!(&first, &second);
        let columns: Vec<&str> = first.column_names().collect();
        prop_assert_eq!(columns, EMPLOYEE_FIELDS.to_vec());
    }

    #[test]
    fn memory_store_round_trips_coerced_values(
        cars in proptest::collection::vec(
            ("[A-Za-z][A-Za-z ]{0,10}[A-Za-z]", any::<i32>(), -10_000_000i64..10_000_000i64),
            1..8,
        )
    ) {
        let mut rows = vec![vec!["make".to_string(), "year".to_string(), "price".to_string()]];
        for (make, year, cents) in &cars {
            rows.push(vec![make.clone(), year.to_string(), Decimal::new(*cents, 2).to_string()]);
        }
        let grid = Grid::from_text(rows);
        let mut store = MemoryStore::new();
        let settings = ImportSettings {
            naming: TableNaming::Fixed("cars".to_string()),
            ..ImportSettings::default()
        };
        Importer::<Car>::new()
            .import(&grid, &mut store, &settings)
            .expect("import succeeds");

        let stored = &store.table("cars").expect("table exists").rows;
        prop_assert_eq!(stored.len(), cars.len());
        for (row, (make, year, cents)) in stored.iter().zip(&cars) {
            prop_assert_eq!(&row[0], &Value::Text(make.clone()));
            prop_assert_eq!(&row[1], &Value::Int32(*year));
            prop_assert_eq!(&row[2], &Value::Money(Decimal::new(*cents, 2)));
        }
    }
}
