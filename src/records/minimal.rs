//! # MinimalRow - Rows Without Transaction Fields
//!
//! A minimal row is a [`HeapRow`] with the first eight header bytes removed.
//! The null bitmap, object id and data region sit at the same positions
//! relative to the data as in the full row, so both share one decoder.
//!
//! ```text
//! full:     [xmin xmax | cid ctid infomask2 infomask hoff | bitmap | data]
//! minimal:             [len pad  infomask2 infomask hoff | bitmap | data]
//!            <-- 8 --->
//! ```
//!
//! Minimal rows have no item pointer, table id or transaction ids, so they
//! cannot answer system attributes.

use eyre::Result;

use crate::config::{MINIMAL_ROW_HEADER_SIZE, MINIMAL_ROW_OFFSET};
use crate::records::deform::{deform_range, fill_missing, DeformState, RawRow};
use crate::records::fill::{check_arity, compute_data_size, fill_data};
use crate::records::header::{bitmap_len, header_size, infomask, MinimalHeader};
use crate::records::heap_row::HeapRow;
use crate::schema::RowSchema;
use crate::types::Datum;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinimalRow {
    data: Box<[u8]>,
}

impl MinimalRow {
    pub fn form(schema: &RowSchema, values: &[Datum<'_>], isnull: &[bool]) -> Result<Self> {
        check_arity(schema, values.len(), isnull.len())?;
        let natts = schema.natts();
        let has_nulls = isnull.iter().any(|&n| n);
        let hoff = header_size(natts, has_nulls, schema.has_oid());
        let start = hoff - MINIMAL_ROW_OFFSET;
        let len = start + compute_data_size(schema, values, isnull)?;

        let mut data = vec![0u8; len].into_boxed_slice();
        let (head, body) = data.split_at_mut(start);
        let bitmap = if has_nulls {
            Some(&mut head[MINIMAL_ROW_HEADER_SIZE..MINIMAL_ROW_HEADER_SIZE + bitmap_len(natts)])
        } else {
            None
        };
        let mut mask = fill_data(schema, values, isnull, body, bitmap)?;
        if schema.has_oid() {
            mask |= infomask::HAS_OID;
        }

        let header = MinimalHeader::from_bytes_mut(&mut data)?;
        header.set_len(len as u32);
        header.set_natts(natts);
        header.set_infomask(mask);
        header.set_hoff(hoff);
        Ok(Self { data })
    }

    /// Wraps an encoded minimal row after checking its header.
    pub fn from_bytes(bytes: impl Into<Box<[u8]>>) -> Result<Self> {
        let data = bytes.into();
        RawRow::from_minimal(&data)?;
        let stated = MinimalHeader::from_bytes(&data)?.len() as usize;
        eyre::ensure!(
            stated == data.len(),
            "minimal row states length {} but has {} bytes",
            stated,
            data.len()
        );
        Ok(Self { data })
    }

    pub(crate) fn from_heap(row: &HeapRow) -> Self {
        let mut data: Box<[u8]> = row.as_bytes()[MINIMAL_ROW_OFFSET..].into();
        let len = data.len() as u32;
        data[..4].copy_from_slice(&len.to_le_bytes());
        Self { data }
    }

    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn natts(&self) -> usize {
        MinimalHeader::from_bytes(&self.data)
            .map(|h| h.natts())
            .unwrap_or(0)
    }

    pub(crate) fn raw(&self) -> Result<RawRow<'_>> {
        RawRow::from_minimal(&self.data)
    }

    pub fn to_heap(&self) -> Result<HeapRow> {
        HeapRow::from_minimal(self)
    }

    pub fn deform(&self, schema: &RowSchema) -> Result<(Vec<Datum<'_>>, Vec<bool>)> {
        let mut values = vec![Datum::default(); schema.natts()];
        let mut isnull = vec![true; schema.natts()];
        let raw = self.raw()?;
        let mut state = DeformState::new();
        deform_range(schema, &raw, &mut state, schema.natts(), &mut values, &mut isnull)?;
        fill_missing(schema, raw.natts.min(schema.natts()), schema.natts(), &mut values, &mut isnull);
        Ok((values, isnull))
    }

    /// Widens the row to the schema's column count; see [`HeapRow::expand`].
    pub fn expand(&self, schema: &RowSchema) -> Result<MinimalRow> {
        Ok(self.to_heap()?.expand(schema)?.to_minimal())
    }
}
