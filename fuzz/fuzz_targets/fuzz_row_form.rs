//! Fuzz testing for row formation.
//!
//! Builds rows from arbitrary typed values and checks that every value
//! decodes back unchanged through the full, minimal and expanded forms.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use tuplecodec::{ColumnDesc, Datum, HeapRow, RowSchema, SqlType};

#[derive(Debug, Arbitrary)]
struct FormInput {
    cells: Vec<Cell>,
    narrow: u8,
}

#[derive(Debug, Arbitrary, Clone)]
enum Cell {
    Null(bool),
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float8(f64),
    Text(String),
    Bytea(Vec<u8>),
    CString(String),
}

impl Cell {
    fn sql_type(&self) -> SqlType {
        match self {
            Cell::Null(true) => SqlType::Text,
            Cell::Null(false) => SqlType::Int4,
            Cell::Bool(_) => SqlType::Bool,
            Cell::Int2(_) => SqlType::Int2,
            Cell::Int4(_) => SqlType::Int4,
            Cell::Int8(_) => SqlType::Int8,
            Cell::Float8(_) => SqlType::Float8,
            Cell::Text(_) => SqlType::Text,
            Cell::Bytea(_) => SqlType::Bytea,
            Cell::CString(_) => SqlType::CString,
        }
    }

    fn datum(&self) -> Option<Datum<'static>> {
        Some(match self {
            Cell::Null(_) => return None,
            Cell::Bool(v) => Datum::from_bool(*v),
            Cell::Int2(v) => Datum::from_i16(*v),
            Cell::Int4(v) => Datum::from_i32(*v),
            Cell::Int8(v) => Datum::from_i64(*v),
            Cell::Float8(v) => Datum::from_f64(*v),
            Cell::Text(s) => Datum::text(s),
            Cell::Bytea(b) => Datum::bytea(b),
            Cell::CString(s) => Datum::cstring(&s.replace('\0', "")),
        })
    }
}

fn same_value(ty: SqlType, a: &Datum<'_>, b: &Datum<'_>) -> bool {
    match ty {
        SqlType::Text | SqlType::Bytea => a.varlena_payload().ok() == b.varlena_payload().ok(),
        _ => a.as_bytes() == b.as_bytes() && a.as_i64() == b.as_i64(),
    }
}

fuzz_target!(|input: FormInput| {
    if input.cells.is_empty() || input.cells.len() > 64 {
        return;
    }

    let types: Vec<SqlType> = input.cells.iter().map(Cell::sql_type).collect();
    let columns = types
        .iter()
        .enumerate()
        .map(|(i, ty)| ColumnDesc::new(format!("c{}", i), *ty))
        .collect();
    let schema = RowSchema::new(columns).unwrap();

    let cells: Vec<Option<Datum<'static>>> = input.cells.iter().map(Cell::datum).collect();
    let isnull: Vec<bool> = cells.iter().map(Option::is_none).collect();
    let values: Vec<Datum<'static>> = cells.iter().map(|c| c.clone().unwrap_or_default()).collect();

    let row = HeapRow::form(&schema, &values, &isnull).expect("valid values must encode");
    let (decoded, decoded_null) = row.deform(&schema).expect("formed row must decode");
    assert_eq!(decoded_null, isnull);
    for (idx, cell) in cells.iter().enumerate() {
        if let Some(want) = cell {
            assert!(same_value(types[idx], &decoded[idx], want), "column {}", idx);
            let single = row.get_attr(&schema, idx as i32 + 1).unwrap().unwrap();
            assert!(same_value(types[idx], &single, want), "column {}", idx);
        }
    }

    let minimal = row.to_minimal();
    assert_eq!(minimal.deform(&schema).unwrap(), (decoded.clone(), decoded_null.clone()));

    let narrow_len = input.narrow as usize % types.len() + 1;
    let narrow = RowSchema::new(schema.columns()[..narrow_len].to_vec()).unwrap();
    let short = HeapRow::form(&narrow, &values[..narrow_len], &isnull[..narrow_len]).unwrap();
    let expanded = short.expand(&schema).unwrap();
    assert_eq!(expanded.natts(), types.len());
    let (_, widened_null) = expanded.deform(&schema).unwrap();
    assert!(widened_null[narrow_len..].iter().all(|&n| n));
});
