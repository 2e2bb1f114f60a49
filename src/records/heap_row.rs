//! # HeapRow - Owned Encoded Row
//!
//! A `HeapRow` owns one contiguous buffer holding the full row header, the
//! optional null bitmap and object id, and the data region. It also carries
//! two identity fields that live outside the encoded bytes: the row's own
//! item pointer and the id of the table it was read from.
//!
//! ## Usage
//!
//! ```ignore
//! let row = HeapRow::form(&schema, &values, &isnull)?;
//! let second = row.get_attr(&schema, 2)?;          // Option<Datum>
//! let (values, isnull) = row.deform(&schema)?;     // every column
//! let bytes: &[u8] = row.as_bytes();
//! ```

use std::borrow::Cow;

use eyre::Result;
use tracing::debug;

use crate::config::{MAX_ROW_ATTRIBUTES, MINIMAL_ROW_OFFSET, OID_SIZE, ROW_HEADER_SIZE};
use crate::error::RowError;
use crate::records::deform::{deform_range, fill_missing, nocache_get_attr, DeformState, RawRow};
use crate::records::fill::{check_arity, compute_data_size, fill_data};
use crate::records::header::{bitmap_len, header_size, infomask, ItemPointer, RowHeader, SystemAttr};
use crate::records::minimal::MinimalRow;
use crate::schema::RowSchema;
use crate::types::{AttrLen, Datum};
use crate::varlena::external::{inline_value, ExternalStore};
use crate::varlena;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapRow {
    data: Box<[u8]>,
    self_ptr: ItemPointer,
    table_oid: u32,
}

impl HeapRow {
    /// Encodes `values` into a new row.
    ///
    /// `values` and `isnull` must have one entry per schema column; the
    /// value of a null column is ignored.
    pub fn form(schema: &RowSchema, values: &[Datum<'_>], isnull: &[bool]) -> Result<Self> {
        check_arity(schema, values.len(), isnull.len())?;
        let natts = schema.natts();
        let has_nulls = isnull.iter().any(|&n| n);
        let hoff = header_size(natts, has_nulls, schema.has_oid());
        let data_len = compute_data_size(schema, values, isnull)?;
        let len = hoff + data_len;

        let mut data = vec![0u8; len].into_boxed_slice();
        let (head, body) = data.split_at_mut(hoff);
        let bitmap = if has_nulls {
            Some(&mut head[ROW_HEADER_SIZE..ROW_HEADER_SIZE + bitmap_len(natts)])
        } else {
            None
        };
        let mut mask = fill_data(schema, values, isnull, body, bitmap)?;
        if schema.has_oid() {
            mask |= infomask::HAS_OID;
        }

        let header = RowHeader::from_bytes_mut(&mut data)?;
        header.set_datum_len(len);
        header.set_typmod(schema.typmod());
        header.set_type_id(schema.type_id());
        header.set_ctid(ItemPointer::INVALID);
        header.set_natts(natts);
        header.set_infomask(mask);
        header.set_hoff(hoff);

        debug!(natts, len, has_nulls, "formed row");
        Ok(Self {
            data,
            self_ptr: ItemPointer::INVALID,
            table_oid: 0,
        })
    }

    /// Wraps an encoded row after checking its header.
    pub fn from_bytes(bytes: impl Into<Box<[u8]>>) -> Result<Self> {
        let data = bytes.into();
        let natts = RawRow::from_heap(&data)?.natts;
        if natts > MAX_ROW_ATTRIBUTES {
            return Err(RowError::TooManyColumns {
                count: natts,
                limit: MAX_ROW_ATTRIBUTES,
            }
            .into());
        }
        let header = RowHeader::from_bytes(&data)?;
        if header.has_oid() {
            eyre::ensure!(
                header.hoff() >= ROW_HEADER_SIZE + OID_SIZE,
                "row has an object id but hoff {} leaves no room for it",
                header.hoff()
            );
        }
        Ok(Self {
            data,
            self_ptr: ItemPointer::INVALID,
            table_oid: 0,
        })
    }

    /// Byte-identical duplicate, identity fields included.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Box<[u8]> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn header(&self) -> &RowHeader {
        RowHeader::from_bytes(&self.data).expect("row buffer validated on construction")
    }

    pub fn header_mut(&mut self) -> &mut RowHeader {
        RowHeader::from_bytes_mut(&mut self.data).expect("row buffer validated on construction")
    }

    pub fn natts(&self) -> usize {
        self.header().natts()
    }

    pub fn has_nulls(&self) -> bool {
        self.header().has_nulls()
    }

    pub fn has_external(&self) -> bool {
        self.header().has_external()
    }

    pub fn self_ptr(&self) -> ItemPointer {
        self.self_ptr
    }

    pub fn set_self_ptr(&mut self, ptr: ItemPointer) {
        self.self_ptr = ptr;
    }

    pub fn table_oid(&self) -> u32 {
        self.table_oid
    }

    pub fn set_table_oid(&mut self, oid: u32) {
        self.table_oid = oid;
    }

    /// Object id stored ahead of the data region, 0 when the row has none.
    pub fn oid(&self) -> u32 {
        let header = self.header();
        if !header.has_oid() {
            return 0;
        }
        let at = header.hoff() - OID_SIZE;
        u32::from_le_bytes([
            self.data[at],
            self.data[at + 1],
            self.data[at + 2],
            self.data[at + 3],
        ])
    }

    /// Stores an object id. A row formed without an oid slot ignores it.
    pub fn set_oid(&mut self, oid: u32) {
        let header = self.header();
        if !header.has_oid() {
            return;
        }
        let at = header.hoff() - OID_SIZE;
        self.data[at..at + OID_SIZE].copy_from_slice(&oid.to_le_bytes());
    }

    /// The data region, starting at `hoff`.
    pub fn data_region(&self) -> &[u8] {
        &self.data[self.header().hoff()..]
    }

    pub(crate) fn raw(&self) -> Result<RawRow<'_>> {
        RawRow::from_heap(&self.data)
    }

    /// Reads one attribute. User columns are numbered from 1; negative
    /// numbers name system attributes.
    ///
    /// Columns beyond the row's own count report the schema's missing value
    /// (or null); numbers beyond the schema's count and dropped columns read
    /// as null.
    pub fn get_attr(&self, schema: &RowSchema, attnum: i32) -> Result<Option<Datum<'_>>> {
        if attnum <= 0 {
            return self.system_attr(attnum).map(Some);
        }
        let idx = attnum as usize - 1;
        let Some(col) = schema.column(idx) else {
            return Ok(None);
        };
        if col.is_dropped() {
            return Ok(None);
        }
        let raw = self.raw()?;
        if idx >= raw.natts {
            return Ok(schema.missing_value(idx).cloned());
        }
        if raw.is_null(idx) {
            return Ok(None);
        }
        nocache_get_attr(schema, &raw, idx).map(Some)
    }

    /// Null test for one attribute; system attributes are never null.
    pub fn attr_is_null(&self, schema: &RowSchema, attnum: i32) -> Result<bool> {
        if attnum <= 0 {
            SystemAttr::from_attnum(attnum).ok_or(RowError::InvalidAttribute(attnum))?;
            return Ok(false);
        }
        let idx = attnum as usize - 1;
        let Some(col) = schema.column(idx) else {
            return Ok(true);
        };
        if col.is_dropped() {
            return Ok(true);
        }
        let raw = self.raw()?;
        if idx >= raw.natts {
            return Ok(schema.missing_value(idx).is_none());
        }
        Ok(raw.is_null(idx))
    }

    /// Value of a system attribute.
    pub fn system_attr(&self, attnum: i32) -> Result<Datum<'static>> {
        let attr = SystemAttr::from_attnum(attnum).ok_or(RowError::InvalidAttribute(attnum))?;
        let header = self.header();
        let datum = match attr {
            SystemAttr::ItemPointer => Datum::fixed(self.self_ptr.to_bytes().to_vec()),
            SystemAttr::ObjectId => Datum::from_oid(self.oid()),
            SystemAttr::MinXid => Datum::from_oid(header.xmin()),
            SystemAttr::MaxXid => Datum::from_oid(header.xmax()),
            SystemAttr::MinCid | SystemAttr::MaxCid => Datum::from_oid(header.cid()),
            SystemAttr::TableOid => Datum::from_oid(self.table_oid),
        };
        Ok(datum)
    }

    /// Decodes every schema column.
    pub fn deform(&self, schema: &RowSchema) -> Result<(Vec<Datum<'_>>, Vec<bool>)> {
        let mut values = vec![Datum::default(); schema.natts()];
        let mut isnull = vec![true; schema.natts()];
        self.deform_into(schema, &mut values, &mut isnull)?;
        Ok((values, isnull))
    }

    /// Decodes every schema column into caller-provided arrays.
    pub fn deform_into<'a>(
        &'a self,
        schema: &RowSchema,
        values: &mut [Datum<'a>],
        isnull: &mut [bool],
    ) -> Result<()> {
        check_arity(schema, values.len(), isnull.len())?;
        let raw = self.raw()?;
        let mut state = DeformState::new();
        deform_range(schema, &raw, &mut state, schema.natts(), values, isnull)?;
        let decoded = raw.natts.min(schema.natts());
        fill_missing(schema, decoded, schema.natts(), values, isnull);
        Ok(())
    }

    /// Copies the identity of `src`: item pointers, table id and object id.
    pub(crate) fn copy_identity(&mut self, src: &HeapRow) {
        let ctid = src.header().ctid();
        self.header_mut().set_ctid(ctid);
        self.self_ptr = src.self_ptr;
        self.table_oid = src.table_oid;
        self.set_oid(src.oid());
    }

    pub fn to_minimal(&self) -> MinimalRow {
        MinimalRow::from_heap(self)
    }

    /// Converts a minimal row back to a full row with zeroed transaction
    /// fields and an invalid item pointer.
    pub fn from_minimal(row: &MinimalRow) -> Result<Self> {
        let src = row.as_bytes();
        let mut data = vec![0u8; src.len() + MINIMAL_ROW_OFFSET].into_boxed_slice();
        data[MINIMAL_ROW_OFFSET..].copy_from_slice(src);
        data[..crate::config::INFOMASK2_OFFSET].fill(0);
        {
            let header = RowHeader::from_bytes_mut(&mut data)?;
            header.set_ctid(ItemPointer::INVALID);
        }
        Self::from_bytes(data)
    }

    /// Copies the row as a self-contained composite value: the header words
    /// carry the datum length, type id and type modifier, and external
    /// references are replaced by their values fetched from `store`.
    pub fn to_composite_datum(&self, schema: &RowSchema, store: &dyn ExternalStore) -> Result<Datum<'static>> {
        let mut row = if self.has_external() {
            self.inline_externals(schema, store)?
        } else {
            self.clone()
        };
        let len = row.len();
        let header = row.header_mut();
        header.set_datum_len(len);
        header.set_typmod(schema.typmod());
        header.set_type_id(schema.type_id());
        Ok(Datum::ByRef(Cow::Owned(row.data.into_vec())))
    }

    fn inline_externals(&self, schema: &RowSchema, store: &dyn ExternalStore) -> Result<HeapRow> {
        let (values, isnull) = self.deform(schema)?;
        let mut inlined: Vec<Datum<'_>> = Vec::with_capacity(values.len());
        let mut fetched = 0usize;
        for (idx, value) in values.into_iter().enumerate() {
            let is_varlena = schema.columns()[idx].attr_len() == AttrLen::Varlena;
            match value {
                Datum::ByRef(bytes) if !isnull[idx] && is_varlena && varlena::is_external(&bytes) => {
                    let inline = inline_value(&bytes, store)?.into_owned();
                    fetched += 1;
                    inlined.push(Datum::ByRef(Cow::Owned(inline)));
                }
                other => inlined.push(other),
            }
        }
        let mut row = HeapRow::form(schema, &inlined, &isnull)?;
        row.copy_identity(self);
        debug!(fetched, "inlined external values");
        Ok(row)
    }
}
