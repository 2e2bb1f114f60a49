//! # Data Region Decoding
//!
//! Walks the data region of a row column by column, turning bytes back into
//! [`Datum`]s that borrow from the row.
//!
//! ## Trust Flag
//!
//! The walk starts "trusted": every column so far sat at the same offset it
//! would occupy in any row of this schema. While trusted, cached column
//! offsets are used and recorded. Trust is lost for the rest of the walk on
//!
//! - any null column,
//! - a varlena column whose position is not already aligned,
//! - stepping past any column that is not fixed-length.
//!
//! A varlena column at an aligned position still gets its offset cached:
//! only its own length is unpredictable.

use eyre::Result;

use crate::config::{MINIMAL_ROW_OFFSET, ROW_HEADER_SIZE};
use crate::error::{slice_at, RowError};
use crate::records::header::{
    att_isnull, bitmap_len, infomask, MinimalHeader, RowHeader,
};
use crate::schema::{ColumnDesc, RowSchema};
use crate::types::{AttrLen, Datum};
use crate::varlena;

/// The parts of an encoded row the decoder needs, borrowed from the row.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawRow<'a> {
    pub natts: usize,
    pub infomask: u16,
    pub bitmap: Option<&'a [u8]>,
    pub data: &'a [u8],
}

impl<'a> RawRow<'a> {
    pub fn from_heap(bytes: &'a [u8]) -> Result<Self> {
        let header = RowHeader::from_bytes(bytes)?;
        Self::split(
            bytes,
            header.natts(),
            header.infomask(),
            ROW_HEADER_SIZE,
            header.hoff(),
        )
    }

    pub fn from_minimal(bytes: &'a [u8]) -> Result<Self> {
        let header = MinimalHeader::from_bytes(bytes)?;
        eyre::ensure!(
            header.hoff() >= MINIMAL_ROW_OFFSET,
            "minimal row hoff {} precedes the minimal row start",
            header.hoff()
        );
        Self::split(
            bytes,
            header.natts(),
            header.infomask(),
            ROW_HEADER_SIZE - MINIMAL_ROW_OFFSET,
            header.hoff() - MINIMAL_ROW_OFFSET,
        )
    }

    fn split(bytes: &'a [u8], natts: usize, mask: u16, bitmap_at: usize, hoff: usize) -> Result<Self> {
        let has_nulls = mask & infomask::HAS_NULL != 0;
        let bitmap_end = bitmap_at + if has_nulls { bitmap_len(natts) } else { 0 };
        eyre::ensure!(
            hoff >= bitmap_end,
            "row header offset {} overlaps the null bitmap ending at {}",
            hoff,
            bitmap_end
        );
        if hoff > bytes.len() {
            return Err(RowError::Truncated {
                needed: hoff,
                available: bytes.len(),
            }
            .into());
        }
        let bitmap = if has_nulls {
            Some(&bytes[bitmap_at..bitmap_end])
        } else {
            None
        };
        Ok(Self {
            natts,
            infomask: mask,
            bitmap,
            data: &bytes[hoff..],
        })
    }

    /// True for columns beyond the row's count as well as for null ones.
    #[inline]
    pub fn is_null(&self, idx: usize) -> bool {
        if idx >= self.natts {
            return true;
        }
        self.bitmap.is_some_and(|bits| att_isnull(idx, bits))
    }

    #[inline]
    pub fn has_varwidth(&self) -> bool {
        self.infomask & infomask::HAS_VARWIDTH != 0
    }
}

/// Resumable cursor of a decode walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeformState {
    /// Index of the next column to decode.
    pub next: usize,
    /// Data-region offset just past the last decoded value.
    pub offset: usize,
    pub trusted: bool,
}

impl DeformState {
    pub const fn new() -> Self {
        Self {
            next: 0,
            offset: 0,
            trusted: true,
        }
    }
}

impl Default for DeformState {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the value of `col` stored at `offset` and returns it with its size.
pub(crate) fn fetch_attr<'a>(col: &ColumnDesc, data: &'a [u8], offset: usize) -> Result<(Datum<'a>, usize)> {
    let tail = data.get(offset..).ok_or(RowError::Truncated {
        needed: offset,
        available: data.len(),
    })?;
    match col.attr_len() {
        AttrLen::Fixed(n) if col.by_val() => {
            let bytes = slice_at(tail, 0, n)?;
            let mut word = [0u8; 8];
            word[..n].copy_from_slice(bytes);
            Ok((Datum::ByVal(u64::from_le_bytes(word)), n))
        }
        AttrLen::Fixed(n) => Ok((Datum::borrowed(slice_at(tail, 0, n)?), n)),
        AttrLen::Varlena => {
            let n = varlena::varsize_any(tail)?;
            Ok((Datum::borrowed(slice_at(tail, 0, n)?), n))
        }
        AttrLen::CString => {
            let nul = tail.iter().position(|&b| b == 0).ok_or(RowError::Truncated {
                needed: data.len() + 1,
                available: data.len(),
            })?;
            Ok((Datum::borrowed(&tail[..=nul]), nul + 1))
        }
    }
}

/// Moves the cursor to the start of `col`'s value, maintaining the cache.
fn locate(col: &ColumnDesc, data: &[u8], state: &mut DeformState) -> Result<usize> {
    if state.trusted {
        if let Some(off) = col.cached_offset() {
            state.offset = off;
            return Ok(off);
        }
    }
    if col.attr_len().is_varlena() {
        if state.trusted && col.align().is_aligned(state.offset) {
            col.set_cached_offset(state.offset);
        } else {
            state.offset = varlena::align_pointer(data, state.offset, col.align())?;
            state.trusted = false;
        }
    } else {
        state.offset = col.align().align(state.offset);
        if state.trusted {
            col.set_cached_offset(state.offset);
        }
    }
    Ok(state.offset)
}

/// Decodes the non-null column at the cursor and advances past it.
fn step<'a>(col: &ColumnDesc, data: &'a [u8], state: &mut DeformState) -> Result<Datum<'a>> {
    let off = locate(col, data, state)?;
    let (datum, size) = fetch_attr(col, data, off)?;
    state.offset = off + size;
    if !col.attr_len().is_fixed() {
        state.trusted = false;
    }
    Ok(datum)
}

/// Decodes columns `state.next..upto` (clamped to the row's column count)
/// into `values` / `isnull`. Dropped columns decode as null.
pub(crate) fn deform_range<'a>(
    schema: &RowSchema,
    row: &RawRow<'a>,
    state: &mut DeformState,
    upto: usize,
    values: &mut [Datum<'a>],
    isnull: &mut [bool],
) -> Result<()> {
    let upto = upto.min(row.natts).min(schema.natts());
    let columns = schema.columns();
    while state.next < upto {
        let idx = state.next;
        state.next += 1;
        if row.is_null(idx) {
            values[idx] = Datum::default();
            isnull[idx] = true;
            state.trusted = false;
            continue;
        }
        let col = &columns[idx];
        let datum = step(col, row.data, state)?;
        if col.is_dropped() {
            values[idx] = Datum::default();
            isnull[idx] = true;
        } else {
            values[idx] = datum;
            isnull[idx] = false;
        }
    }
    Ok(())
}

/// Fills columns `from..to` from the schema's missing-value table.
pub(crate) fn fill_missing<'a>(
    schema: &RowSchema,
    from: usize,
    to: usize,
    values: &mut [Datum<'a>],
    isnull: &mut [bool],
) {
    for idx in from..to {
        match schema.missing_value(idx) {
            Some(value) => {
                values[idx] = value.clone();
                isnull[idx] = false;
            }
            None => {
                values[idx] = Datum::default();
                isnull[idx] = true;
            }
        }
    }
}

/// Reads the single non-null column `idx` (which must be below the row's
/// column count) without a persistent cursor.
///
/// When nothing before `idx` is null or variable-width, the offsets of the
/// whole fixed-width prefix of the schema are cached in one pass.
pub(crate) fn nocache_get_attr<'a>(schema: &RowSchema, row: &RawRow<'a>, idx: usize) -> Result<Datum<'a>> {
    let columns = schema.columns();
    let col = &columns[idx];

    let mut slow = row
        .bitmap
        .is_some_and(|bits| (0..idx).any(|i| att_isnull(i, bits)));

    if !slow {
        if let Some(off) = col.cached_offset() {
            return Ok(fetch_attr(col, row.data, off)?.0);
        }
        if row.has_varwidth() {
            slow = columns[..=idx].iter().any(|c| !c.attr_len().is_fixed());
        }
    }

    if !slow {
        cache_fixed_prefix(columns, row.natts.min(columns.len()));
        if let Some(off) = col.cached_offset() {
            return Ok(fetch_attr(col, row.data, off)?.0);
        }
    }

    let mut state = DeformState::new();
    for i in 0..idx {
        if row.is_null(i) {
            state.trusted = false;
            continue;
        }
        step(&columns[i], row.data, &mut state)?;
    }
    let off = locate(col, row.data, &mut state)?;
    Ok(fetch_attr(col, row.data, off)?.0)
}

fn cache_fixed_prefix(columns: &[ColumnDesc], natts: usize) {
    if natts == 0 {
        return;
    }
    columns[0].set_cached_offset(0);
    let mut j = 1;
    while j < natts
        && columns[j].cached_offset().is_some_and(|off| off > 0)
        && columns[j - 1].attr_len().is_fixed()
    {
        j += 1;
    }
    let prev = &columns[j - 1];
    let (Some(prev_off), Some(prev_len)) = (prev.cached_offset(), prev.attr_len().fixed()) else {
        return;
    };
    let mut off = prev_off + prev_len;
    for col in &columns[j..natts] {
        let Some(len) = col.attr_len().fixed() else {
            break;
        };
        off = col.align().align(off);
        col.set_cached_offset(off);
        off += len;
    }
}
