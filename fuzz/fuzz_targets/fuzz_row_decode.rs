//! Fuzz testing for the row decoder.
//!
//! Feeds arbitrary bytes to the heap and minimal row decoders under an
//! arbitrary schema. Malformed rows must be rejected with an error, never a
//! panic or an out-of-bounds read.

#![no_main]

use arbitrary::Arbitrary;
use bumpalo::Bump;
use libfuzzer_sys::fuzz_target;

use tuplecodec::{ColumnDesc, HeapRow, MinimalRow, RowSchema, RowView, SqlType};

#[derive(Debug, Arbitrary)]
struct DecoderInput {
    column_types: Vec<FuzzSqlType>,
    data: Vec<u8>,
    probes: Vec<u8>,
}

#[derive(Debug, Arbitrary, Clone, Copy)]
enum FuzzSqlType {
    Bool,
    Int2,
    Int4,
    Int8,
    Float8,
    Name,
    Uuid,
    Text,
    Bytea,
    CString,
}

impl FuzzSqlType {
    fn to_sql_type(self) -> SqlType {
        match self {
            FuzzSqlType::Bool => SqlType::Bool,
            FuzzSqlType::Int2 => SqlType::Int2,
            FuzzSqlType::Int4 => SqlType::Int4,
            FuzzSqlType::Int8 => SqlType::Int8,
            FuzzSqlType::Float8 => SqlType::Float8,
            FuzzSqlType::Name => SqlType::Name,
            FuzzSqlType::Uuid => SqlType::Uuid,
            FuzzSqlType::Text => SqlType::Text,
            FuzzSqlType::Bytea => SqlType::Bytea,
            FuzzSqlType::CString => SqlType::CString,
        }
    }
}

fuzz_target!(|input: DecoderInput| {
    if input.column_types.is_empty() || input.column_types.len() > 64 {
        return;
    }

    let columns = input
        .column_types
        .iter()
        .enumerate()
        .map(|(i, t)| ColumnDesc::new(format!("c{}", i), t.to_sql_type()))
        .collect();
    let Ok(schema) = RowSchema::new(columns) else {
        return;
    };
    let natts = schema.natts() as i32;

    if let Ok(row) = HeapRow::from_bytes(input.data.clone()) {
        let _ = row.deform(&schema);
        for &probe in &input.probes {
            let attnum = (probe as i32 % (natts + 8)) - 7;
            let _ = row.get_attr(&schema, attnum);
            let _ = row.attr_is_null(&schema, attnum);
        }

        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        if view.store_heap(&row).is_ok() {
            for &probe in &input.probes {
                let _ = view.get_attr(probe as i32 % natts + 1);
            }
            let _ = view.extract_all();
        }
    }

    if let Ok(row) = MinimalRow::from_bytes(input.data) {
        let _ = row.deform(&schema);
        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        if view.store_minimal(&row).is_ok() {
            let _ = view.extract_all();
        }
    }
});
