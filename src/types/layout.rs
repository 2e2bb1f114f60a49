//! # Alignment & Length Classes
//!
//! Pure functions deciding where a value starts and how many bytes it
//! occupies. Every column carries three physical properties:
//!
//! | Property | Values | Meaning |
//! |----------|--------|---------|
//! | `AttrLen` | `Fixed(n)`, `Varlena`, `CString` | byte length class |
//! | `Align` | `Char`, `Short`, `Int`, `Double` | 1/2/4/8 byte boundary |
//! | `Storage` | `Plain`, `External`, `Extended`, `Main` | may the value be packed? |
//!
//! Null-terminated strings are always byte-aligned; no alignment is ever
//! applied to them.

use eyre::Result;

use crate::error::RowError;
use crate::types::Datum;
use crate::varlena;

/// Alignment class of a column.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Align {
    Char = b'c',
    Short = b's',
    Int = b'i',
    Double = b'd',
}

impl Align {
    /// Boundary in bytes.
    #[inline]
    pub const fn alignment(self) -> usize {
        match self {
            Align::Char => 1,
            Align::Short => 2,
            Align::Int => 4,
            Align::Double => 8,
        }
    }

    /// Rounds `offset` up to this class's boundary.
    #[inline]
    pub const fn align(self, offset: usize) -> usize {
        let a = self.alignment();
        (offset + a - 1) & !(a - 1)
    }

    #[inline]
    pub const fn is_aligned(self, offset: usize) -> bool {
        offset & (self.alignment() - 1) == 0
    }
}

/// Declared length class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrLen {
    /// Fixed positive byte count.
    Fixed(usize),
    /// Self-describing variable-length value with a 1- or 4-byte header.
    Varlena,
    /// Null-terminated string.
    CString,
}

impl AttrLen {
    pub fn fixed(&self) -> Option<usize> {
        match self {
            AttrLen::Fixed(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, AttrLen::Fixed(_))
    }

    pub fn is_varlena(&self) -> bool {
        matches!(self, AttrLen::Varlena)
    }

    /// Catalog encoding: the positive length, -1 for varlena, -2 for cstring.
    pub fn as_raw(&self) -> i16 {
        match self {
            AttrLen::Fixed(n) => *n as i16,
            AttrLen::Varlena => -1,
            AttrLen::CString => -2,
        }
    }
}

/// Storage policy of a variable-length column.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Storage {
    /// Never packed, compressed or moved out of line.
    Plain = b'p',
    /// May be moved out of line, never compressed.
    External = b'e',
    /// May be compressed and moved out of line.
    Extended = b'x',
    /// May be compressed, moved out of line only as a last resort.
    Main = b'm',
}

impl Storage {
    /// Whether a full-header value may be rewritten with a 1-byte header.
    #[inline]
    pub fn allows_packing(self) -> bool {
        self != Storage::Plain
    }
}

/// Offset at which a value of this column starts when written at `offset`.
///
/// Values that already carry a 1-byte varlena header are never aligned.
pub fn align_datum(offset: usize, len: AttrLen, align: Align, datum: &Datum<'_>) -> usize {
    if len.is_varlena() {
        if let Some(bytes) = datum.as_bytes() {
            if varlena::has_one_byte_header(bytes) {
                return offset;
            }
        }
    }
    align.align(offset)
}

/// Physical byte length of `datum` under length class `len`. `column` is
/// the 0-based column the value belongs to and only names it in errors.
///
/// Expanded objects report their flattened size.
pub fn value_length(column: usize, len: AttrLen, datum: &Datum<'_>) -> Result<usize> {
    match len {
        AttrLen::Fixed(n) => Ok(n),
        AttrLen::CString => {
            let bytes = datum.as_bytes().ok_or(RowError::DatumMismatch {
                column,
                expected: "a by-reference cstring",
            })?;
            let nul = bytes.iter().position(|&b| b == 0).ok_or_else(|| {
                eyre::eyre!("cstring value of {} bytes has no terminator", bytes.len())
            })?;
            Ok(nul + 1)
        }
        AttrLen::Varlena => match datum {
            Datum::Expanded(obj) => Ok(obj.flat_size()),
            Datum::ByRef(bytes) => varlena::varsize_any(bytes),
            Datum::ByVal(_) => Err(RowError::DatumMismatch {
                column,
                expected: "a by-reference varlena",
            }
            .into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_rounds_up_to_class_boundary() {
        assert_eq!(Align::Char.align(7), 7);
        assert_eq!(Align::Short.align(7), 8);
        assert_eq!(Align::Int.align(5), 8);
        assert_eq!(Align::Int.align(8), 8);
        assert_eq!(Align::Double.align(9), 16);
        assert_eq!(Align::Double.align(0), 0);
    }

    #[test]
    fn value_length_by_class() {
        assert_eq!(
            value_length(0, AttrLen::Fixed(16), &Datum::fixed(vec![0; 16])).unwrap(),
            16
        );
        assert_eq!(
            value_length(0, AttrLen::CString, &Datum::cstring("abc")).unwrap(),
            4
        );
        assert_eq!(
            value_length(0, AttrLen::Varlena, &Datum::text("hello")).unwrap(),
            9
        );
    }

    #[test]
    fn cstring_without_terminator_is_rejected() {
        let datum = Datum::borrowed(b"abc");
        assert!(value_length(0, AttrLen::CString, &datum).is_err());
    }

    #[test]
    fn one_byte_header_values_are_not_aligned() {
        let short = Datum::ByRef(varlena::make_short(b"ab").unwrap().into());
        assert_eq!(align_datum(5, AttrLen::Varlena, Align::Int, &short), 5);
        assert_eq!(
            align_datum(5, AttrLen::Varlena, Align::Int, &Datum::text("ab")),
            8
        );
    }
}
