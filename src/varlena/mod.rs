//! # Variable-Length Value Headers
//!
//! Every variable-length value starts with a self-describing header. The first
//! byte alone tells which of four encodings follows:
//!
//! ```text
//! first byte   form                  total size
//! ----------   -------------------   ---------------------------------------
//! 0x80         external reference    2 + body size of the tag in byte 1
//! 1xxxxxxx     short (1-byte hdr)    low 7 bits, header included (<= 127)
//! 00xxxxxx     full, uncompressed    BE u32 of bytes 0..4 & 0x3FFFFFFF
//! 01xxxxxx     full, compressed      BE u32 of bytes 0..4 & 0x3FFFFFFF
//! ```
//!
//! Full headers are big-endian so the discriminating bits land in the first
//! byte. Full-header values are aligned to their column's alignment; short
//! and external values are never aligned. A zero byte at an unaligned
//! position is therefore always padding, never a header.
//!
//! Compressed values are passed through untouched: this crate never inflates
//! or deflates them.

pub mod external;

use eyre::Result;

use crate::config::{VARATT_MAX_SIZE, VARATT_SHORT_MAX, VARHDRSZ, VARHDRSZ_EXTERNAL, VARHDRSZ_SHORT};
use crate::error::{slice_at, RowError};
use crate::types::Align;

pub use external::{ExternalPointer, ExternalStore, ExternalTag};

/// Marker byte of an external reference.
pub const EXTERNAL_MARKER: u8 = 0x80;

const SHORT_FLAG: u8 = 0x80;
const COMPRESSED_FLAG: u8 = 0x40;

/// Decoded first-byte discriminator of a varlena value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarlenaTag {
    External(ExternalTag),
    Short,
    Full { compressed: bool },
}

pub fn decode_tag(bytes: &[u8]) -> Result<VarlenaTag> {
    let b0 = *bytes.first().ok_or(RowError::Truncated {
        needed: 1,
        available: 0,
    })?;
    if b0 == EXTERNAL_MARKER {
        let tag_byte = *bytes.get(1).ok_or(RowError::Truncated {
            needed: 2,
            available: bytes.len(),
        })?;
        let tag = ExternalTag::from_byte(tag_byte).ok_or(RowError::MalformedVarlena {
            offset: 1,
            byte: tag_byte,
        })?;
        return Ok(VarlenaTag::External(tag));
    }
    if b0 & SHORT_FLAG != 0 {
        return Ok(VarlenaTag::Short);
    }
    Ok(VarlenaTag::Full {
        compressed: b0 & COMPRESSED_FLAG != 0,
    })
}

/// Total size of the value starting at `bytes[0]`, header included.
pub fn varsize_any(bytes: &[u8]) -> Result<usize> {
    match decode_tag(bytes)? {
        VarlenaTag::External(tag) => Ok(VARHDRSZ_EXTERNAL + tag.body_size()),
        VarlenaTag::Short => Ok((bytes[0] & !SHORT_FLAG) as usize),
        VarlenaTag::Full { .. } => {
            let hdr = slice_at(bytes, 0, VARHDRSZ)?;
            let size = full_size(hdr);
            if size < VARHDRSZ {
                return Err(RowError::MalformedVarlena {
                    offset: 0,
                    byte: bytes[0],
                }
                .into());
            }
            Ok(size)
        }
    }
}

fn full_size(hdr: &[u8]) -> usize {
    let word = u32::from_be_bytes([hdr[0], hdr[1], hdr[2], hdr[3]]);
    (word & VARATT_MAX_SIZE as u32) as usize
}

/// True for short values and external references.
#[inline]
pub fn has_one_byte_header(bytes: &[u8]) -> bool {
    bytes.first().is_some_and(|&b| b & SHORT_FLAG != 0)
}

#[inline]
pub fn is_external(bytes: &[u8]) -> bool {
    bytes.first() == Some(&EXTERNAL_MARKER)
}

#[inline]
pub fn is_full_uncompressed(bytes: &[u8]) -> bool {
    bytes.first().is_some_and(|&b| b & (SHORT_FLAG | COMPRESSED_FLAG) == 0)
}

/// Whether a full uncompressed value fits a 1-byte header.
pub fn can_make_short(bytes: &[u8]) -> bool {
    if !is_full_uncompressed(bytes) || bytes.len() < VARHDRSZ {
        return false;
    }
    let size = full_size(bytes);
    size >= VARHDRSZ && size - VARHDRSZ + VARHDRSZ_SHORT <= VARATT_SHORT_MAX
}

/// Size of `bytes` once rewritten with a 1-byte header.
#[inline]
pub fn short_size(bytes: &[u8]) -> usize {
    full_size(bytes) - VARHDRSZ + VARHDRSZ_SHORT
}

#[inline]
pub fn full_header(total: usize) -> [u8; VARHDRSZ] {
    ((total & VARATT_MAX_SIZE) as u32).to_be_bytes()
}

#[inline]
pub fn compressed_header(total: usize) -> [u8; VARHDRSZ] {
    (((total & VARATT_MAX_SIZE) as u32) | ((COMPRESSED_FLAG as u32) << 24)).to_be_bytes()
}

#[inline]
pub fn short_header(total: usize) -> u8 {
    debug_assert!((1..=VARATT_SHORT_MAX).contains(&total));
    SHORT_FLAG | total as u8
}

/// Builds a full uncompressed value around `payload`.
pub fn make_full(payload: &[u8]) -> Vec<u8> {
    let total = payload.len() + VARHDRSZ;
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&full_header(total));
    out.extend_from_slice(payload);
    out
}

/// Builds a short value around `payload`.
pub fn make_short(payload: &[u8]) -> Result<Vec<u8>> {
    let total = payload.len() + VARHDRSZ_SHORT;
    eyre::ensure!(
        total <= VARATT_SHORT_MAX,
        "payload of {} bytes does not fit a 1-byte header",
        payload.len()
    );
    let mut out = Vec::with_capacity(total);
    out.push(short_header(total));
    out.extend_from_slice(payload);
    Ok(out)
}

/// Payload of an inline value, header stripped.
pub fn payload(bytes: &[u8]) -> Result<&[u8]> {
    let size = varsize_any(bytes)?;
    let hdr = match decode_tag(bytes)? {
        VarlenaTag::External(_) => {
            eyre::bail!("external reference has no inline payload")
        }
        VarlenaTag::Short => VARHDRSZ_SHORT,
        VarlenaTag::Full { .. } => VARHDRSZ,
    };
    slice_at(bytes, hdr, size - hdr)
}

/// Start of a varlena value whose nominal position is `offset`.
///
/// At an aligned offset the value starts there. At an unaligned offset a
/// zero byte is padding and the value starts at the next aligned offset; a
/// nonzero byte is a 1-byte header.
pub fn align_pointer(data: &[u8], offset: usize, align: Align) -> Result<usize> {
    if align.is_aligned(offset) {
        return Ok(offset);
    }
    let byte = *data.get(offset).ok_or(RowError::Truncated {
        needed: offset + 1,
        available: data.len(),
    })?;
    if byte == 0 {
        return Ok(align.align(offset));
    }
    if byte & SHORT_FLAG == 0 {
        return Err(RowError::MalformedVarlena { offset, byte }.into());
    }
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_header_sizes() {
        let v = make_short(b"hello").unwrap();
        assert_eq!(v[0], 0x86);
        assert_eq!(decode_tag(&v).unwrap(), VarlenaTag::Short);
        assert_eq!(varsize_any(&v).unwrap(), 6);
        assert_eq!(payload(&v).unwrap(), b"hello");
    }

    #[test]
    fn full_header_is_big_endian() {
        let v = make_full(&[7u8; 300]);
        assert_eq!(&v[..4], &[0, 0, 0x01, 0x30]);
        assert_eq!(
            decode_tag(&v).unwrap(),
            VarlenaTag::Full { compressed: false }
        );
        assert_eq!(varsize_any(&v).unwrap(), 304);
    }

    #[test]
    fn compressed_flag_round_trips() {
        let mut v = compressed_header(10).to_vec();
        v.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(
            decode_tag(&v).unwrap(),
            VarlenaTag::Full { compressed: true }
        );
        assert_eq!(varsize_any(&v).unwrap(), 10);
        assert!(!can_make_short(&v));
    }

    #[test]
    fn short_conversion_threshold() {
        assert!(can_make_short(&make_full(&[b'a'; 126])));
        assert!(!can_make_short(&make_full(&[b'a'; 127])));
        assert_eq!(short_size(&make_full(&[b'a'; 50])), 51);
    }

    #[test]
    fn full_header_smaller_than_itself_is_malformed() {
        let err = varsize_any(&[0, 0, 0, 2]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RowError>(),
            Some(RowError::MalformedVarlena { .. })
        ));
    }

    #[test]
    fn unknown_external_tag_is_malformed() {
        let err = decode_tag(&[EXTERNAL_MARKER, 3]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<RowError>(),
            Some(&RowError::MalformedVarlena { offset: 1, byte: 3 })
        );
    }

    #[test]
    fn align_pointer_skips_padding_only() {
        let data = [0u8, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(align_pointer(&data, 5, Align::Int).unwrap(), 8);
        let data = [0u8, 0, 0, 0, 0, 0x83, b'a', b'b'];
        assert_eq!(align_pointer(&data, 5, Align::Int).unwrap(), 5);
        assert_eq!(align_pointer(&data, 4, Align::Int).unwrap(), 4);
        let data = [0u8, 0, 0, 0, 0, 0x05];
        assert!(align_pointer(&data, 5, Align::Int).is_err());
    }

    #[test]
    fn empty_input_is_truncated() {
        assert!(decode_tag(&[]).is_err());
        assert!(!has_one_byte_header(&[]));
    }
}
