//! # Row Codec Property Test Suite
//!
//! Randomized checks of the row codec against generated schemas and values.
//!
//! ## Test Categories
//!
//! 1. **Round trip**: decoding a formed row yields the values it was formed from
//! 2. **Sizing**: the predicted data size is the size actually written
//! 3. **Null bitmap**: one bit per null column, no bitmap without nulls
//! 4. **Offset cache**: cached offsets learned from one row never mislead reads of another
//! 5. **Views**: incremental extraction in any order agrees with a full decode
//! 6. **Schema evolution**: expanding a narrow row equals reading it through the wider schema
//!
//! ## Usage
//!
//! ```sh
//! cargo test --test row_properties --release
//! ```

use bumpalo::Bump;
use proptest::prelude::*;
use proptest::sample::Index;
use tuplecodec::config::ROW_HEADER_SIZE;
use tuplecodec::records::{compute_data_size, header_size};
use tuplecodec::{ColumnDesc, Datum, HeapRow, RowSchema, RowView, SqlType};

// ============================================================================
// STRATEGIES
// ============================================================================

const TYPES: [SqlType; 10] = [
    SqlType::Bool,
    SqlType::Int2,
    SqlType::Int4,
    SqlType::Int8,
    SqlType::Float8,
    SqlType::Oid,
    SqlType::Text,
    SqlType::Bytea,
    SqlType::CString,
    SqlType::Name,
];

type Cells = Vec<Option<Datum<'static>>>;

fn arb_word(len: std::ops::Range<usize>) -> impl Strategy<Value = String> {
    prop::collection::vec(proptest::char::range('a', 'z'), len)
        .prop_map(|chars| chars.into_iter().collect())
}

fn arb_value(ty: SqlType) -> BoxedStrategy<Datum<'static>> {
    match ty {
        SqlType::Bool => any::<bool>().prop_map(Datum::from_bool).boxed(),
        SqlType::Int2 => any::<i16>().prop_map(Datum::from_i16).boxed(),
        SqlType::Int4 => any::<i32>().prop_map(Datum::from_i32).boxed(),
        SqlType::Int8 => any::<i64>().prop_map(Datum::from_i64).boxed(),
        SqlType::Float8 => any::<f64>().prop_map(Datum::from_f64).boxed(),
        SqlType::Oid => any::<u32>().prop_map(Datum::from_oid).boxed(),
        SqlType::Text => arb_word(0..200).prop_map(|s| Datum::text(&s)).boxed(),
        SqlType::Bytea => prop::collection::vec(any::<u8>(), 0..300)
            .prop_map(|b| Datum::bytea(&b))
            .boxed(),
        SqlType::CString => arb_word(0..24).prop_map(|s| Datum::cstring(&s)).boxed(),
        SqlType::Name => arb_word(1..64)
            .prop_map(|s| SqlType::Name.input(&s, -1).unwrap())
            .boxed(),
        other => unreachable!("no generator for {:?}", other),
    }
}

/// A schema and two independent rows of values for it.
fn arb_rows() -> impl Strategy<Value = (Vec<SqlType>, Cells, Cells)> {
    prop::collection::vec(prop::sample::select(TYPES.to_vec()), 1..12).prop_flat_map(|types| {
        let first: Vec<_> = types
            .iter()
            .map(|ty| prop::option::of(arb_value(*ty)))
            .collect();
        let second: Vec<_> = types
            .iter()
            .map(|ty| prop::option::of(arb_value(*ty)))
            .collect();
        (Just(types), first, second)
    })
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn schema_of(types: &[SqlType]) -> RowSchema {
    RowSchema::new(
        types
            .iter()
            .enumerate()
            .map(|(i, ty)| ColumnDesc::new(format!("c{}", i), *ty))
            .collect(),
    )
    .unwrap()
}

fn split(cells: &[Option<Datum<'static>>]) -> (Vec<Datum<'static>>, Vec<bool>) {
    cells
        .iter()
        .map(|cell| match cell {
            Some(datum) => (datum.clone(), false),
            None => (Datum::default(), true),
        })
        .unzip()
}

/// Varlena values may come back with a shorter header, so they are
/// compared by payload.
fn same_value<'a>(ty: SqlType, a: &Datum<'a>, b: &Datum<'a>) -> bool {
    match ty {
        SqlType::Text | SqlType::Bytea => a.varlena_payload().ok() == b.varlena_payload().ok(),
        _ => a == b,
    }
}

fn check_cell(ty: SqlType, got: Option<&Datum<'_>>, want: &Option<Datum<'static>>) -> Result<(), TestCaseError> {
    match (got, want) {
        (None, None) => Ok(()),
        (Some(got), Some(want)) => {
            prop_assert!(same_value(ty, got, want), "{:?}: {:?} != {:?}", ty, got, want);
            Ok(())
        }
        _ => Err(TestCaseError::fail(format!("{:?}: {:?} vs {:?}", ty, got, want))),
    }
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #[test]
    fn formed_rows_decode_to_their_values((types, cells, _) in arb_rows()) {
        let schema = schema_of(&types);
        let (values, isnull) = split(&cells);
        let row = HeapRow::form(&schema, &values, &isnull).unwrap();

        let (decoded, decoded_null) = row.deform(&schema).unwrap();
        prop_assert_eq!(&decoded_null, &isnull);
        for (idx, ty) in types.iter().enumerate() {
            let got = (!decoded_null[idx]).then(|| &decoded[idx]);
            check_cell(*ty, got, &cells[idx])?;
        }

        let parsed = HeapRow::from_bytes(row.as_bytes().to_vec()).unwrap();
        prop_assert_eq!(parsed.deform(&schema).unwrap(), row.deform(&schema).unwrap());
    }

    #[test]
    fn predicted_size_is_written_size((types, cells, _) in arb_rows()) {
        let schema = schema_of(&types);
        let (values, isnull) = split(&cells);
        let row = HeapRow::form(&schema, &values, &isnull).unwrap();

        let data_len = compute_data_size(&schema, &values, &isnull).unwrap();
        let has_nulls = isnull.iter().any(|&n| n);
        let hoff = header_size(types.len(), has_nulls, false);
        prop_assert_eq!(row.header().hoff(), hoff);
        prop_assert_eq!(hoff % 8, 0);
        prop_assert_eq!(row.data_region().len(), data_len);
        prop_assert_eq!(row.len(), hoff + data_len);
        prop_assert_eq!(row.header().datum_len(), row.len());
    }

    #[test]
    fn bitmap_marks_exactly_the_null_columns((types, cells, _) in arb_rows()) {
        let schema = schema_of(&types);
        let (values, isnull) = split(&cells);
        let row = HeapRow::form(&schema, &values, &isnull).unwrap();

        let has_nulls = isnull.iter().any(|&n| n);
        prop_assert_eq!(row.has_nulls(), has_nulls);
        if has_nulls {
            let bitmap = &row.as_bytes()[ROW_HEADER_SIZE..];
            for (idx, &null) in isnull.iter().enumerate() {
                let bit = bitmap[idx / 8] >> (idx % 8) & 1 == 1;
                prop_assert_eq!(bit, null, "column {}", idx);
            }
        }
    }

    #[test]
    fn cached_offsets_never_mislead((types, first, second) in arb_rows()) {
        let schema = schema_of(&types);
        let (values_a, isnull_a) = split(&first);
        let (values_b, isnull_b) = split(&second);
        let row_a = HeapRow::form(&schema, &values_a, &isnull_a).unwrap();
        let row_b = HeapRow::form(&schema, &values_b, &isnull_b).unwrap();

        row_a.deform(&schema).unwrap();
        for attnum in (1..=types.len()).rev() {
            let got = row_b.get_attr(&schema, attnum as i32).unwrap();
            check_cell(types[attnum - 1], got.as_ref(), &second[attnum - 1])?;
        }

        row_b.deform(&schema).unwrap();
        for attnum in 1..=types.len() {
            let got = row_a.get_attr(&schema, attnum as i32).unwrap();
            check_cell(types[attnum - 1], got.as_ref(), &first[attnum - 1])?;
        }
    }

    #[test]
    fn view_agrees_with_full_decode(
        (types, cells, _) in arb_rows(),
        order in prop::collection::vec(any::<Index>(), 0..16),
    ) {
        let schema = schema_of(&types);
        let (values, isnull) = split(&cells);
        let row = HeapRow::form(&schema, &values, &isnull).unwrap();
        let minimal = row.to_minimal();

        let arena = Bump::new();
        let mut heap_view = RowView::new(&schema, &arena);
        heap_view.store_heap(&row).unwrap();
        let mut minimal_view = RowView::new(&schema, &arena);
        minimal_view.store_minimal(&minimal).unwrap();

        for pick in &order {
            let idx = pick.index(types.len());
            let from_heap = heap_view.get_attr(idx as i32 + 1).unwrap();
            let from_minimal = minimal_view.get_attr(idx as i32 + 1).unwrap();
            check_cell(types[idx], from_heap.as_ref(), &cells[idx])?;
            prop_assert_eq!(from_heap, from_minimal);
        }

        let (decoded, decoded_null) = row.deform(&schema).unwrap();
        heap_view.extract_all().unwrap();
        prop_assert_eq!(heap_view.isnull(), decoded_null.as_slice());
        prop_assert_eq!(heap_view.values(), decoded.as_slice());

        let back = HeapRow::from_minimal(&minimal).unwrap();
        prop_assert_eq!(back.deform(&schema).unwrap(), (decoded, decoded_null));
    }

    #[test]
    fn expanding_equals_reading_through_wider_schema(
        (types, cells, missing) in arb_rows(),
        split_at in any::<Index>(),
    ) {
        let narrow_len = split_at.index(types.len()) + 1;
        let narrow = schema_of(&types[..narrow_len]);
        let (values, isnull) = split(&cells[..narrow_len]);
        let row = HeapRow::form(&narrow, &values, &isnull).unwrap();

        let mut wide = narrow.clone();
        for idx in narrow_len..types.len() {
            wide.add_column(ColumnDesc::new(format!("c{}", idx), types[idx]), missing[idx].clone())
                .unwrap();
        }

        let expanded = row.expand(&wide).unwrap();
        prop_assert_eq!(expanded.natts(), types.len());
        let (through_wide, through_wide_null) = row.deform(&wide).unwrap();
        let (decoded, decoded_null) = expanded.deform(&wide).unwrap();
        prop_assert_eq!(&decoded_null, &through_wide_null);
        for idx in 0..types.len() {
            if !decoded_null[idx] {
                prop_assert!(same_value(types[idx], &decoded[idx], &through_wide[idx]));
            }
        }
    }
}
