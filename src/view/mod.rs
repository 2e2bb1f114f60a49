//! # RowView - Incremental Row Access
//!
//! A `RowView` holds one row at a time and decodes its columns lazily, left
//! to right, remembering how far it got. Asking for column 3 decodes columns
//! 1 through 3; a later request for column 5 resumes at column 4.
//!
//! ## Sources
//!
//! | Source | Decoded | System attributes |
//! |--------|---------|-------------------|
//! | `HeapRow` | incrementally | yes |
//! | `MinimalRow` | incrementally | no (panics) |
//! | textual data row | all columns on first access | no (panics) |
//! | virtual (values supplied) | already | no (panics) |
//!
//! ## Usage
//!
//! ```ignore
//! let arena = Bump::new();
//! let mut view = RowView::new(&schema, &arena);
//! view.store_heap(&row)?;
//! let id = view.get_attr(1)?;       // decodes column 1 only
//! view.extract_all()?;              // decodes the rest
//! let values = view.values();
//! ```
//!
//! Values converted from a textual data row are allocated in the view's
//! arena; they live until the arena is reset or dropped.

pub mod datarow;

use bumpalo::Bump;
use eyre::Result;
use tracing::debug;

use crate::error::RowError;
use crate::records::deform::{deform_range, fill_missing, DeformState, RawRow};
use crate::records::fill::check_arity;
use crate::records::{HeapRow, MinimalRow, SystemAttr};
use crate::schema::RowSchema;
use crate::types::Datum;

pub use datarow::encode_data_row;

#[derive(Debug, Clone, Copy)]
enum RowSource<'a> {
    Empty,
    Heap { row: &'a HeapRow, raw: RawRow<'a> },
    Minimal { row: &'a MinimalRow, raw: RawRow<'a> },
    DataRow(&'a [u8]),
    Virtual,
}

pub struct RowView<'a> {
    schema: &'a RowSchema,
    arena: &'a Bump,
    source: RowSource<'a>,
    values: Vec<Datum<'a>>,
    isnull: Vec<bool>,
    nvalid: usize,
    state: DeformState,
}

impl<'a> RowView<'a> {
    pub fn new(schema: &'a RowSchema, arena: &'a Bump) -> Self {
        let natts = schema.natts();
        Self {
            schema,
            arena,
            source: RowSource::Empty,
            values: vec![Datum::default(); natts],
            isnull: vec![true; natts],
            nvalid: 0,
            state: DeformState::new(),
        }
    }

    pub fn schema(&self) -> &'a RowSchema {
        self.schema
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.source, RowSource::Empty)
    }

    /// Number of leading columns already decoded.
    pub fn nvalid(&self) -> usize {
        self.nvalid
    }

    /// Decoded values; only the first `nvalid()` entries are meaningful.
    pub fn values(&self) -> &[Datum<'a>] {
        &self.values
    }

    /// Null flags; only the first `nvalid()` entries are meaningful.
    pub fn isnull(&self) -> &[bool] {
        &self.isnull
    }

    pub fn clear(&mut self) {
        self.source = RowSource::Empty;
        self.nvalid = 0;
        self.state = DeformState::new();
    }

    pub fn store_heap(&mut self, row: &'a HeapRow) -> Result<()> {
        let raw = row.raw()?;
        self.clear();
        self.source = RowSource::Heap { row, raw };
        Ok(())
    }

    pub fn store_minimal(&mut self, row: &'a MinimalRow) -> Result<()> {
        let raw = row.raw()?;
        self.clear();
        self.source = RowSource::Minimal { row, raw };
        Ok(())
    }

    /// Stores a textual data row. Nothing is parsed until the first access.
    pub fn store_data_row(&mut self, msg: &'a [u8]) {
        self.clear();
        self.source = RowSource::DataRow(msg);
    }

    /// Stores values directly; every column is valid immediately.
    pub fn store_virtual(&mut self, values: Vec<Datum<'a>>, isnull: Vec<bool>) -> Result<()> {
        check_arity(self.schema, values.len(), isnull.len())?;
        self.clear();
        self.values = values;
        self.isnull = isnull;
        self.nvalid = self.schema.natts();
        self.source = RowSource::Virtual;
        Ok(())
    }

    fn value_at(&self, idx: usize) -> Option<Datum<'a>> {
        if self.isnull[idx] {
            None
        } else {
            Some(self.values[idx].clone())
        }
    }

    fn system_row(&self) -> &'a HeapRow {
        match self.source {
            RowSource::Heap { row, .. } => row,
            RowSource::Minimal { .. } => {
                panic!("cannot extract system attribute from minimal row")
            }
            RowSource::DataRow(_) | RowSource::Virtual => {
                panic!("cannot extract system attribute from virtual row")
            }
            RowSource::Empty => panic!("cannot extract attribute from empty row view"),
        }
    }

    /// Reads one attribute, decoding only as far as needed.
    ///
    /// Negative numbers name system attributes. Numbers beyond the schema's
    /// column count and dropped columns read as null.
    ///
    /// # Panics
    ///
    /// On an empty view, and for system attributes of a row that has no
    /// header (minimal, data row, virtual).
    pub fn get_attr(&mut self, attnum: i32) -> Result<Option<Datum<'a>>> {
        if attnum <= 0 {
            return self.system_row().system_attr(attnum).map(Some);
        }
        let idx = attnum as usize - 1;
        if idx < self.nvalid {
            return Ok(self.value_at(idx));
        }
        if idx >= self.schema.natts() || self.schema.columns()[idx].is_dropped() {
            return Ok(None);
        }

        match self.source {
            RowSource::Empty => panic!("cannot extract attribute from empty row view"),
            RowSource::DataRow(msg) => {
                self.parse_data_row(msg)?;
                Ok(self.value_at(idx))
            }
            RowSource::Virtual => Ok(self.value_at(idx)),
            RowSource::Heap { raw, .. } | RowSource::Minimal { raw, .. } => {
                if idx >= raw.natts {
                    return Ok(self.schema.missing_value(idx).cloned());
                }
                if raw.is_null(idx) {
                    return Ok(None);
                }
                self.deform(&raw, idx + 1)?;
                Ok(self.value_at(idx))
            }
        }
    }

    /// Makes the first `upto` columns valid.
    ///
    /// # Panics
    ///
    /// On an empty view.
    pub fn extract_upto(&mut self, upto: usize) -> Result<()> {
        if upto == 0 || upto > self.schema.natts() {
            return Err(RowError::InvalidAttribute(upto as i32).into());
        }
        if self.nvalid >= upto {
            return Ok(());
        }

        match self.source {
            RowSource::Empty => panic!("cannot extract attribute from empty row view"),
            RowSource::DataRow(msg) => self.parse_data_row(msg),
            RowSource::Virtual => Ok(()),
            RowSource::Heap { raw, .. } | RowSource::Minimal { raw, .. } => {
                self.deform(&raw, upto)?;
                if raw.natts < upto {
                    let from = self.nvalid.max(raw.natts);
                    fill_missing(self.schema, from, upto, &mut self.values, &mut self.isnull);
                    self.nvalid = upto;
                }
                Ok(())
            }
        }
    }

    /// Makes every column valid.
    pub fn extract_all(&mut self) -> Result<()> {
        if self.schema.natts() == 0 {
            if self.is_empty() {
                panic!("cannot extract attribute from empty row view");
            }
            return Ok(());
        }
        self.extract_upto(self.schema.natts())
    }

    /// Null test for one attribute, decoding nothing it does not need to.
    ///
    /// # Panics
    ///
    /// Under the same conditions as [`RowView::get_attr`].
    pub fn attr_is_null(&mut self, attnum: i32) -> Result<bool> {
        if attnum <= 0 {
            self.system_row();
            SystemAttr::from_attnum(attnum).ok_or(RowError::InvalidAttribute(attnum))?;
            return Ok(false);
        }
        let idx = attnum as usize - 1;
        if idx < self.nvalid {
            return Ok(self.isnull[idx]);
        }
        if idx >= self.schema.natts() || self.schema.columns()[idx].is_dropped() {
            return Ok(true);
        }

        match self.source {
            RowSource::Empty => panic!("cannot extract attribute from empty row view"),
            RowSource::DataRow(msg) => {
                self.parse_data_row(msg)?;
                Ok(self.isnull[idx])
            }
            RowSource::Virtual => Ok(self.isnull[idx]),
            RowSource::Heap { raw, .. } | RowSource::Minimal { raw, .. } => {
                if idx >= raw.natts {
                    return Ok(self.schema.missing_value(idx).is_none());
                }
                Ok(raw.is_null(idx))
            }
        }
    }

    /// Forms a standalone row from the view's current contents.
    pub fn to_heap_row(&mut self) -> Result<HeapRow> {
        match self.source {
            RowSource::Heap { row, .. } => Ok(row.copy()),
            RowSource::Minimal { row, .. } => HeapRow::from_minimal(row),
            _ => {
                self.extract_all()?;
                HeapRow::form(self.schema, &self.values, &self.isnull)
            }
        }
    }

    /// Forms a standalone minimal row from the view's current contents.
    pub fn to_minimal_row(&mut self) -> Result<MinimalRow> {
        match self.source {
            RowSource::Heap { row, .. } => Ok(row.to_minimal()),
            RowSource::Minimal { row, .. } => Ok(row.copy()),
            _ => {
                self.extract_all()?;
                MinimalRow::form(self.schema, &self.values, &self.isnull)
            }
        }
    }

    fn deform(&mut self, raw: &RawRow<'a>, upto: usize) -> Result<()> {
        deform_range(
            self.schema,
            raw,
            &mut self.state,
            upto,
            &mut self.values,
            &mut self.isnull,
        )?;
        self.nvalid = self.nvalid.max(self.state.next);
        Ok(())
    }

    fn parse_data_row(&mut self, msg: &'a [u8]) -> Result<()> {
        let spans = datarow::parse_field_spans(msg, self.schema.natts())?;
        let arena = self.arena;
        for (idx, span) in spans.iter().enumerate() {
            let col = &self.schema.columns()[idx];
            let Some((start, len)) = *span else {
                self.values[idx] = Datum::default();
                self.isnull[idx] = true;
                continue;
            };
            if col.is_dropped() {
                self.values[idx] = Datum::default();
                self.isnull[idx] = true;
                continue;
            }
            let bytes = &msg[start..start + len];
            let text = std::str::from_utf8(bytes).map_err(|_| RowError::InvalidInput {
                type_name: col.sql_type().map_or("unknown", |t| t.name()),
                text: String::from_utf8_lossy(bytes).into_owned(),
            })?;
            let datum = match col.input(text)? {
                Datum::ByRef(owned) => Datum::borrowed(arena.alloc_slice_copy(&owned)),
                other => other,
            };
            self.values[idx] = datum;
            self.isnull[idx] = false;
        }
        self.nvalid = self.schema.natts();
        debug!(fields = spans.len(), "parsed data row");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ItemPointer;
    use crate::schema::ColumnDesc;
    use crate::types::SqlType;

    fn people() -> RowSchema {
        RowSchema::new(vec![
            ColumnDesc::new("id", SqlType::Int4),
            ColumnDesc::new("name", SqlType::Text),
            ColumnDesc::new("score", SqlType::Int8),
        ])
        .unwrap()
    }

    fn alice(schema: &RowSchema) -> HeapRow {
        HeapRow::form(
            schema,
            &[Datum::from_i32(1), Datum::text("alice"), Datum::from_i64(90)],
            &[false; 3],
        )
        .unwrap()
    }

    #[test]
    fn get_attr_decodes_only_as_far_as_needed() {
        let schema = people();
        let row = alice(&schema);
        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        view.store_heap(&row).unwrap();

        assert_eq!(view.nvalid(), 0);
        assert_eq!(view.get_attr(2).unwrap().unwrap().as_text().unwrap(), "alice");
        assert_eq!(view.nvalid(), 2);
        assert_eq!(view.get_attr(1).unwrap(), Some(Datum::from_i32(1)));
        assert_eq!(view.nvalid(), 2);

        view.extract_all().unwrap();
        assert_eq!(view.nvalid(), 3);
        assert_eq!(view.values()[2].as_i64(), Some(90));
        assert_eq!(view.isnull(), &[false, false, false]);
    }

    #[test]
    fn view_matches_full_deform() {
        let schema = people();
        let row = HeapRow::form(
            &schema,
            &[Datum::from_i32(4), Datum::default(), Datum::from_i64(-3)],
            &[false, true, false],
        )
        .unwrap();
        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        view.store_heap(&row).unwrap();

        assert_eq!(view.get_attr(2).unwrap(), None);
        assert_eq!(view.nvalid(), 0);
        assert_eq!(view.get_attr(3).unwrap(), Some(Datum::from_i64(-3)));

        let (values, isnull) = row.deform(&schema).unwrap();
        view.extract_all().unwrap();
        assert_eq!(view.values(), values.as_slice());
        assert_eq!(view.isnull(), isnull.as_slice());
    }

    #[test]
    fn null_test_does_not_advance_the_cursor() {
        let schema = people();
        let row = alice(&schema);
        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        view.store_heap(&row).unwrap();

        assert!(!view.attr_is_null(3).unwrap());
        assert_eq!(view.nvalid(), 0);
        assert!(view.attr_is_null(4).unwrap());
    }

    #[test]
    fn attnum_beyond_schema_reads_null() {
        let schema = people();
        let row = alice(&schema);
        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        view.store_heap(&row).unwrap();
        assert_eq!(view.get_attr(9).unwrap(), None);
    }

    #[test]
    fn narrow_row_reads_missing_values() {
        let narrow = RowSchema::new(vec![ColumnDesc::new("id", SqlType::Int4)]).unwrap();
        let row = HeapRow::form(&narrow, &[Datum::from_i32(8)], &[false]).unwrap();

        let mut wide = narrow.clone();
        wide.add_column(ColumnDesc::new("name", SqlType::Text), None)
            .unwrap();
        wide.add_column(ColumnDesc::new("score", SqlType::Int8), Some(Datum::from_i64(50)))
            .unwrap();

        let arena = Bump::new();
        let mut view = RowView::new(&wide, &arena);
        view.store_heap(&row).unwrap();
        assert_eq!(view.get_attr(3).unwrap(), Some(Datum::from_i64(50)));
        assert!(view.attr_is_null(2).unwrap());

        view.extract_all().unwrap();
        assert_eq!(view.nvalid(), 3);
        assert_eq!(view.isnull(), &[false, true, false]);
        assert_eq!(view.values()[0].as_i32(), Some(8));
        assert_eq!(view.values()[2].as_i64(), Some(50));
    }

    #[test]
    fn dropped_column_reads_null() {
        let mut schema = people();
        let row = alice(&schema);
        schema.drop_column(2).unwrap();

        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        view.store_heap(&row).unwrap();
        assert_eq!(view.get_attr(2).unwrap(), None);
        assert_eq!(view.get_attr(3).unwrap(), Some(Datum::from_i64(90)));
        assert!(view.isnull()[1]);
    }

    #[test]
    fn extract_upto_rejects_out_of_range() {
        let schema = people();
        let row = alice(&schema);
        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        view.store_heap(&row).unwrap();

        for bad in [0usize, 4] {
            let err = view.extract_upto(bad).unwrap_err();
            assert_eq!(
                err.downcast_ref::<RowError>(),
                Some(&RowError::InvalidAttribute(bad as i32))
            );
        }
        view.extract_upto(1).unwrap();
        assert_eq!(view.nvalid(), 1);
    }

    #[test]
    fn storing_a_new_row_resets_progress() {
        let schema = people();
        let first = alice(&schema);
        let second = HeapRow::form(
            &schema,
            &[Datum::from_i32(2), Datum::text("bob"), Datum::from_i64(70)],
            &[false; 3],
        )
        .unwrap();
        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);

        view.store_heap(&first).unwrap();
        view.extract_all().unwrap();
        view.store_heap(&second).unwrap();
        assert_eq!(view.nvalid(), 0);
        assert_eq!(view.get_attr(2).unwrap().unwrap().as_text().unwrap(), "bob");
    }

    #[test]
    fn heap_view_answers_system_attributes() {
        let schema = people();
        let mut row = alice(&schema);
        row.set_table_oid(1259);
        row.set_self_ptr(ItemPointer::new(0, 7));
        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        view.store_heap(&row).unwrap();

        assert_eq!(view.get_attr(-7).unwrap(), Some(Datum::from_oid(1259)));
        assert!(!view.attr_is_null(-1).unwrap());
        assert!(view.get_attr(-20).is_err());
    }

    #[test]
    fn minimal_view_decodes_like_heap_view() {
        let schema = people();
        let row = alice(&schema);
        let minimal = row.to_minimal();
        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        view.store_minimal(&minimal).unwrap();

        assert_eq!(view.get_attr(3).unwrap(), Some(Datum::from_i64(90)));
        assert_eq!(view.to_heap_row().unwrap().deform(&schema).unwrap(), row.deform(&schema).unwrap());
        assert_eq!(view.to_minimal_row().unwrap(), minimal);
    }

    #[test]
    #[should_panic(expected = "cannot extract system attribute from minimal row")]
    fn minimal_view_has_no_system_attributes() {
        let schema = people();
        let minimal = alice(&schema).to_minimal();
        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        view.store_minimal(&minimal).unwrap();
        let _ = view.get_attr(-1);
    }

    #[test]
    #[should_panic(expected = "cannot extract attribute from empty row view")]
    fn empty_view_panics() {
        let schema = people();
        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        let _ = view.get_attr(1);
    }

    #[test]
    fn data_row_is_parsed_on_first_access() {
        let schema = RowSchema::new(vec![
            ColumnDesc::new("n", SqlType::Int4),
            ColumnDesc::new("note", SqlType::Text),
            ColumnDesc::new("ok", SqlType::Bool),
            ColumnDesc::new("label", SqlType::Text),
        ])
        .unwrap();
        let msg = encode_data_row(&[Some("12"), None, Some("t"), Some("hello")]).unwrap();
        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        view.store_data_row(&msg);

        assert_eq!(view.nvalid(), 0);
        assert_eq!(view.get_attr(1).unwrap(), Some(Datum::from_i32(12)));
        assert_eq!(view.nvalid(), 4);
        assert!(view.attr_is_null(2).unwrap());
        assert_eq!(view.get_attr(3).unwrap().and_then(|d| d.as_bool()), Some(true));
        assert_eq!(view.get_attr(4).unwrap().unwrap().as_text().unwrap(), "hello");

        let row = view.to_heap_row().unwrap();
        let (values, isnull) = row.deform(&schema).unwrap();
        assert_eq!(isnull, vec![false, true, false, false]);
        assert_eq!(values[0].as_i32(), Some(12));
        assert_eq!(values[3].as_text().unwrap(), "hello");
    }

    #[test]
    fn data_row_with_wrong_field_count_fails() {
        let schema = people();
        let msg = encode_data_row(&[Some("1"), Some("x")]).unwrap();
        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        view.store_data_row(&msg);

        let err = view.get_attr(1).unwrap_err();
        assert_eq!(
            err.downcast_ref::<RowError>(),
            Some(&RowError::ColumnCountMismatch { row: 2, schema: 3 })
        );
    }

    #[test]
    fn data_row_with_bad_text_fails() {
        let schema = people();
        let msg = encode_data_row(&[Some("one"), Some("x"), Some("1")]).unwrap();
        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        view.store_data_row(&msg);

        let err = view.extract_all().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RowError>(),
            Some(RowError::InvalidInput { type_name: "integer", .. })
        ));
    }

    #[test]
    #[should_panic(expected = "cannot extract system attribute from virtual row")]
    fn data_row_has_no_system_attributes() {
        let schema = people();
        let msg = encode_data_row(&[Some("1"), Some("x"), Some("2")]).unwrap();
        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        view.store_data_row(&msg);
        let _ = view.get_attr(-2);
    }

    #[test]
    fn virtual_row_is_valid_immediately() {
        let schema = people();
        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        view.store_virtual(
            vec![Datum::from_i32(5), Datum::text("v"), Datum::default()],
            vec![false, false, true],
        )
        .unwrap();

        assert_eq!(view.nvalid(), 3);
        assert_eq!(view.get_attr(2).unwrap().unwrap().as_text().unwrap(), "v");
        assert_eq!(view.get_attr(3).unwrap(), None);

        let minimal = view.to_minimal_row().unwrap();
        let (values, isnull) = minimal.deform(&schema).unwrap();
        assert_eq!(isnull, vec![false, false, true]);
        assert_eq!(values[0].as_i32(), Some(5));
        assert_eq!(values[1].as_text().unwrap(), "v");
    }

    #[test]
    fn virtual_row_needs_one_value_per_column() {
        let schema = people();
        let arena = Bump::new();
        let mut view = RowView::new(&schema, &arena);
        let err = view
            .store_virtual(vec![Datum::from_i32(5)], vec![false])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RowError>(),
            Some(RowError::ColumnCountMismatch { .. })
        ));
        assert!(view.is_empty());
    }
}
