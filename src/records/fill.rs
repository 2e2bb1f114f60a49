//! # Data Region Encoding
//!
//! Size computation and value placement for the data region of a row. The
//! two walks share one per-value rule set, so the size predicted by
//! [`compute_data_size`] is exactly what [`fill_data`] writes.
//!
//! ## Placement Rules
//!
//! | Value | Alignment | Bytes written |
//! |-------|-----------|---------------|
//! | by-value scalar | column | low `len` bytes, little-endian |
//! | fixed by-reference | column | `len` bytes |
//! | cstring | none | bytes up to and including the terminator |
//! | varlena, external | none | pointer bytes as-is |
//! | varlena, short | none | value as-is |
//! | varlena, full, packable and fits | none | rewritten with a 1-byte header |
//! | varlena, full, otherwise | column | value as-is |
//! | expanded object | column | flattened full form |
//!
//! The output buffer must be zeroed: alignment padding is never written.

use eyre::Result;

use crate::error::{slice_at, slice_at_mut, RowError};
use crate::records::header::{infomask, set_null_bit};
use crate::schema::{ColumnDesc, RowSchema};
use crate::types::{align_datum, value_length, AttrLen, Datum};
use crate::varlena;

/// Offset just past a non-null value placed at `offset`.
pub(crate) fn value_end(
    offset: usize,
    column: usize,
    col: &ColumnDesc,
    datum: &Datum<'_>,
) -> Result<usize> {
    if col.attr_len().is_varlena() {
        match datum {
            Datum::Expanded(obj) => return Ok(col.align().align(offset) + obj.flat_size()),
            Datum::ByRef(bytes) if col.is_packable() && varlena::can_make_short(bytes) => {
                return Ok(offset + varlena::short_size(bytes));
            }
            _ => {}
        }
    }
    let start = align_datum(offset, col.attr_len(), col.align(), datum);
    Ok(start + value_length(column, col.attr_len(), datum)?)
}

pub(crate) fn check_arity(schema: &RowSchema, values: usize, isnull: usize) -> Result<()> {
    if values != schema.natts() || isnull != schema.natts() {
        return Err(RowError::ColumnCountMismatch {
            row: values.min(isnull),
            schema: schema.natts(),
        }
        .into());
    }
    Ok(())
}

/// Size of the data region needed to hold `values`.
pub fn compute_data_size(schema: &RowSchema, values: &[Datum<'_>], isnull: &[bool]) -> Result<usize> {
    check_arity(schema, values.len(), isnull.len())?;
    let mut len = 0;
    for (idx, col) in schema.columns().iter().enumerate() {
        if isnull[idx] {
            continue;
        }
        col.check_datum(idx, &values[idx])?;
        len = value_end(len, idx, col, &values[idx])?;
    }
    Ok(len)
}

/// Writes one non-null value of the 0-based `column` at `offset` and
/// returns the offset past it.
///
/// Sets `HAS_VARWIDTH` and `HAS_EXTERNAL` in `mask` as the value requires.
pub(crate) fn fill_value(
    column: usize,
    col: &ColumnDesc,
    datum: &Datum<'_>,
    data: &mut [u8],
    offset: usize,
    mask: &mut u16,
) -> Result<usize> {
    if col.by_val() {
        let start = col.align().align(offset);
        let n = col.attr_len().fixed().unwrap_or(0);
        let bits = match datum {
            Datum::ByVal(bits) => *bits,
            _ => {
                return Err(RowError::DatumMismatch {
                    column,
                    expected: "a by-value datum",
                }
                .into())
            }
        };
        slice_at_mut(data, start, n)?.copy_from_slice(&bits.to_le_bytes()[..n]);
        return Ok(start + n);
    }

    match col.attr_len() {
        AttrLen::Varlena => {
            *mask |= infomask::HAS_VARWIDTH;
            match datum {
                Datum::Expanded(obj) => {
                    let start = col.align().align(offset);
                    let n = obj.flat_size();
                    obj.flatten_into(slice_at_mut(data, start, n)?);
                    Ok(start + n)
                }
                Datum::ByRef(bytes) => {
                    if varlena::is_external(bytes) {
                        *mask |= infomask::HAS_EXTERNAL;
                    }
                    if varlena::has_one_byte_header(bytes) {
                        let n = varlena::varsize_any(bytes)?;
                        slice_at_mut(data, offset, n)?.copy_from_slice(slice_at(bytes, 0, n)?);
                        Ok(offset + n)
                    } else if col.is_packable() && varlena::can_make_short(bytes) {
                        let n = varlena::short_size(bytes);
                        let dst = slice_at_mut(data, offset, n)?;
                        dst[0] = varlena::short_header(n);
                        dst[1..].copy_from_slice(slice_at(bytes, crate::config::VARHDRSZ, n - 1)?);
                        Ok(offset + n)
                    } else {
                        let start = col.align().align(offset);
                        let n = varlena::varsize_any(bytes)?;
                        slice_at_mut(data, start, n)?.copy_from_slice(slice_at(bytes, 0, n)?);
                        Ok(start + n)
                    }
                }
                Datum::ByVal(_) => Err(RowError::DatumMismatch {
                    column,
                    expected: "a varlena or expanded datum",
                }
                .into()),
            }
        }
        AttrLen::CString => {
            *mask |= infomask::HAS_VARWIDTH;
            let n = value_length(column, AttrLen::CString, datum)?;
            let bytes = datum.as_bytes().unwrap_or_default();
            slice_at_mut(data, offset, n)?.copy_from_slice(slice_at(bytes, 0, n)?);
            Ok(offset + n)
        }
        AttrLen::Fixed(n) => {
            let start = col.align().align(offset);
            let bytes = datum.as_bytes().ok_or(RowError::DatumMismatch {
                column,
                expected: "a by-reference datum of the column's length",
            })?;
            slice_at_mut(data, start, n)?.copy_from_slice(slice_at(bytes, 0, n)?);
            Ok(start + n)
        }
    }
}

/// Encodes `values` into the zeroed `data` region and marks nulls in
/// `bitmap` when one is supplied.
///
/// Returns the data flags (`HAS_NULL`, `HAS_VARWIDTH`, `HAS_EXTERNAL`) of
/// the encoded row, computed from scratch.
pub fn fill_data(
    schema: &RowSchema,
    values: &[Datum<'_>],
    isnull: &[bool],
    data: &mut [u8],
    mut bitmap: Option<&mut [u8]>,
) -> Result<u16> {
    check_arity(schema, values.len(), isnull.len())?;
    let mut mask = 0u16;
    let mut offset = 0;
    for (idx, col) in schema.columns().iter().enumerate() {
        if isnull[idx] {
            let bitmap = bitmap.as_deref_mut().ok_or_else(|| {
                eyre::eyre!("column {} is null but the row has no null bitmap", idx)
            })?;
            set_null_bit(idx, bitmap);
            mask |= infomask::HAS_NULL;
            continue;
        }
        offset = fill_value(idx, col, &values[idx], data, offset, &mut mask)?;
    }
    Ok(mask)
}
