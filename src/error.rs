//! # Row Codec Errors
//!
//! Every fallible operation in the crate returns `eyre::Result`. Conditions a
//! caller may want to branch on are raised as a [`RowError`] and can be
//! recovered with `err.downcast_ref::<RowError>()`:
//!
//! | Category | Variants |
//! |----------|----------|
//! | Schema violation | `TooManyColumns`, `UnsupportedByValWidth`, `DatumMismatch` |
//! | Invalid argument | `InvalidColumnNumber`, `InvalidAttribute` |
//! | Corrupted input | `ColumnCountMismatch`, `Truncated`, `MalformedVarlena`, `InvalidInput` |
//!
//! Caller contract violations (reading a system column from a row that has
//! none, extracting from an empty view) are not errors: they panic.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// The schema has more columns than the header's natts field can carry.
    TooManyColumns { count: usize, limit: usize },
    /// A by-value column declared a width other than 1, 2, 4 or 8 bytes.
    UnsupportedByValWidth { column: usize, len: usize },
    /// A value's representation does not match its column descriptor.
    DatumMismatch { column: usize, expected: &'static str },
    /// A 1-based column number outside `1..=natts` in a targeted call.
    InvalidColumnNumber(i32),
    /// An attribute number that names neither a user nor a system column.
    InvalidAttribute(i32),
    /// A row declares a column count that disagrees with its schema.
    ColumnCountMismatch { row: usize, schema: usize },
    /// A read would run past the end of the buffer.
    Truncated { needed: usize, available: usize },
    /// A variable-length header that no valid encoding produces.
    MalformedVarlena { offset: usize, byte: u8 },
    /// Text that the column's input conversion rejects.
    InvalidInput { type_name: &'static str, text: String },
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowError::TooManyColumns { count, limit } => {
                write!(f, "number of columns ({}) exceeds limit ({})", count, limit)
            }
            RowError::UnsupportedByValWidth { column, len } => {
                write!(
                    f,
                    "column {} is pass-by-value with unsupported length {}",
                    column, len
                )
            }
            RowError::DatumMismatch { column, expected } => {
                write!(f, "value for column {} must be {}", column, expected)
            }
            RowError::InvalidColumnNumber(attnum) => {
                write!(f, "invalid column number {}", attnum)
            }
            RowError::InvalidAttribute(attnum) => write!(f, "invalid attnum: {}", attnum),
            RowError::ColumnCountMismatch { row, schema } => {
                write!(
                    f,
                    "row does not match the descriptor, row cols {}, descriptor cols {}",
                    row, schema
                )
            }
            RowError::Truncated { needed, available } => {
                write!(
                    f,
                    "row data truncated: need {} bytes, have {}",
                    needed, available
                )
            }
            RowError::MalformedVarlena { offset, byte } => {
                write!(
                    f,
                    "malformed varlena header 0x{:02x} at offset {}",
                    byte, offset
                )
            }
            RowError::InvalidInput { type_name, text } => {
                write!(f, "invalid input syntax for type {}: \"{}\"", type_name, text)
            }
        }
    }
}

impl std::error::Error for RowError {}

/// Returns the subslice `buf[start..start + len]` or a `Truncated` error.
#[inline]
pub(crate) fn slice_at(buf: &[u8], start: usize, len: usize) -> eyre::Result<&[u8]> {
    let end = start.checked_add(len).ok_or(RowError::Truncated {
        needed: usize::MAX,
        available: buf.len(),
    })?;
    buf.get(start..end).ok_or_else(|| {
        RowError::Truncated {
            needed: end,
            available: buf.len(),
        }
        .into()
    })
}

/// Mutable counterpart of [`slice_at`].
#[inline]
pub(crate) fn slice_at_mut(buf: &mut [u8], start: usize, len: usize) -> eyre::Result<&mut [u8]> {
    let available = buf.len();
    let end = start.checked_add(len).ok_or(RowError::Truncated {
        needed: usize::MAX,
        available,
    })?;
    buf.get_mut(start..end).ok_or_else(|| {
        RowError::Truncated {
            needed: end,
            available,
        }
        .into()
    })
}
