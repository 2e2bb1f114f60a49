//! # Row Reconstruction
//!
//! Building a new row from an existing one:
//!
//! - `modify`: replace columns selected by a boolean mask
//! - `modify_by_cols`: replace columns named by 1-based column numbers
//! - `expand`: widen a row formed before columns were added to its schema
//!
//! Every result is a fresh row; the source is never touched.

use eyre::Result;
use tracing::debug;

use crate::config::{OID_SIZE, ROW_HEADER_SIZE};
use crate::records::fill::{check_arity, fill_value, value_end};
use crate::records::header::{
    att_isnull, bitmap_len, header_size, infomask, set_null_bit, ItemPointer, RowHeader,
};
use crate::records::heap_row::HeapRow;
use crate::schema::RowSchema;
use crate::types::Datum;

impl HeapRow {
    /// New row with every column whose `do_replace` entry is set taken from
    /// `repl_values` / `repl_isnull`. Identity fields are carried over.
    pub fn modify(
        &self,
        schema: &RowSchema,
        repl_values: &[Datum<'_>],
        repl_isnull: &[bool],
        do_replace: &[bool],
    ) -> Result<HeapRow> {
        check_arity(schema, repl_values.len(), repl_isnull.len())?;
        check_arity(schema, do_replace.len(), do_replace.len())?;

        let (mut values, mut isnull) = self.deform(schema)?;
        let mut replaced = 0usize;
        for idx in 0..schema.natts() {
            if do_replace[idx] {
                values[idx] = repl_values[idx].reborrow();
                isnull[idx] = repl_isnull[idx];
                replaced += 1;
            }
        }

        let mut row = HeapRow::form(schema, &values, &isnull)?;
        row.copy_identity(self);
        debug!(replaced, len = row.len(), "modified row");
        Ok(row)
    }

    /// New row with the 1-based columns in `attnums` replaced by the
    /// matching entries of `repl_values` / `repl_isnull`.
    pub fn modify_by_cols(
        &self,
        schema: &RowSchema,
        attnums: &[i32],
        repl_values: &[Datum<'_>],
        repl_isnull: &[bool],
    ) -> Result<HeapRow> {
        eyre::ensure!(
            attnums.len() == repl_values.len() && attnums.len() == repl_isnull.len(),
            "{} column numbers but {} values and {} null flags",
            attnums.len(),
            repl_values.len(),
            repl_isnull.len()
        );

        let (mut values, mut isnull) = self.deform(schema)?;
        for (k, &attnum) in attnums.iter().enumerate() {
            let idx = schema.user_index(attnum)?;
            values[idx] = repl_values[k].reborrow();
            isnull[idx] = repl_isnull[k];
        }

        let mut row = HeapRow::form(schema, &values, &isnull)?;
        row.copy_identity(self);
        debug!(replaced = attnums.len(), len = row.len(), "modified row by column numbers");
        Ok(row)
    }

    /// Widens the row to the schema's column count. Each added column takes
    /// the schema's missing value when one is defined and is null otherwise.
    ///
    /// The object id, data bytes and identity of the source are carried
    /// over. The header's composite fields are restamped from `schema` and
    /// the ctid is invalid, as for a freshly formed row. A row that already
    /// has at least as many columns as the schema is returned as a copy.
    pub fn expand(&self, schema: &RowSchema) -> Result<HeapRow> {
        let src_natts = self.natts();
        let natts = schema.natts();
        if src_natts >= natts {
            return Ok(self.copy());
        }

        let src_header = self.header();
        let src_bitmap = if src_header.has_nulls() {
            Some(&self.as_bytes()[ROW_HEADER_SIZE..ROW_HEADER_SIZE + bitmap_len(src_natts)])
        } else {
            None
        };
        let src_data = self.data_region();

        let added: Vec<Option<&Datum<'static>>> =
            (src_natts..natts).map(|idx| schema.missing_value(idx)).collect();
        let has_nulls = src_bitmap.is_some() || added.iter().any(Option::is_none);
        let has_oid = src_header.has_oid();

        let mut data_len = src_data.len();
        for (k, value) in added.iter().enumerate() {
            if let Some(value) = value {
                let column = src_natts + k;
                data_len = value_end(data_len, column, &schema.columns()[column], value)?;
            }
        }

        let hoff = header_size(natts, has_nulls, has_oid);
        let len = hoff + data_len;
        let mut data = vec![0u8; len].into_boxed_slice();

        let (head, body) = data.split_at_mut(hoff);
        let mut mask = src_header.infomask() & !infomask::HAS_NULL;
        if has_nulls {
            mask |= infomask::HAS_NULL;
            let bitmap = &mut head[ROW_HEADER_SIZE..ROW_HEADER_SIZE + bitmap_len(natts)];
            if let Some(src_bits) = src_bitmap {
                for idx in 0..src_natts {
                    if att_isnull(idx, src_bits) {
                        set_null_bit(idx, bitmap);
                    }
                }
            }
            for (k, value) in added.iter().enumerate() {
                if value.is_none() {
                    set_null_bit(src_natts + k, bitmap);
                }
            }
        }
        if has_oid {
            head[hoff - OID_SIZE..].copy_from_slice(&self.oid().to_le_bytes());
        }

        body[..src_data.len()].copy_from_slice(src_data);
        let mut offset = src_data.len();
        for (k, value) in added.iter().enumerate() {
            if let Some(value) = value {
                let column = src_natts + k;
                offset = fill_value(column, &schema.columns()[column], value, body, offset, &mut mask)?;
            }
        }

        let header = RowHeader::from_bytes_mut(&mut data)?;
        header.set_datum_len(len);
        header.set_typmod(schema.typmod());
        header.set_type_id(schema.type_id());
        header.set_ctid(ItemPointer::INVALID);
        header.set_natts(natts);
        header.set_infomask(mask);
        header.set_hoff(hoff);

        let mut row = HeapRow::from_bytes(data)?;
        row.set_self_ptr(self.self_ptr());
        row.set_table_oid(self.table_oid());
        debug!(from = src_natts, to = natts, len, "expanded row");
        Ok(row)
    }
}
