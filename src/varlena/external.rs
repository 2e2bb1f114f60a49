//! # External References
//!
//! A varlena column may hold a pointer to a value stored out of line instead
//! of the value itself. The row codec never dereferences these on its own: it
//! copies the pointer bytes verbatim and only flags the row with
//! `HAS_EXTERNAL`. Inlining happens when a row is converted to a
//! self-contained composite datum, through a caller-supplied
//! [`ExternalStore`].
//!
//! ## Pointer Format
//!
//! ```text
//! +--------+--------+-----------+-----------+-----------+-------------+
//! | Marker | Tag    | raw_size  | ext_size  | value_id  | toast_relid |
//! | 0x80   | 18     | i32 LE    | i32 LE    | u32 LE    | u32 LE      |
//! +--------+--------+-----------+-----------+-----------+-------------+
//! ```
//!
//! `raw_size` includes the 4-byte header of the original value. `ext_size`
//! is the stored size, smaller than `raw_size - 4` when the value was
//! compressed before being moved out of line.

use std::borrow::Cow;

use eyre::{ensure, Result};

use crate::config::{VARHDRSZ, VARHDRSZ_EXTERNAL};
use crate::varlena::{decode_tag, is_external, VarlenaTag, EXTERNAL_MARKER};

/// Kind of external reference, stored in the byte after the marker.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalTag {
    OnDisk = 18,
}

impl ExternalTag {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            18 => Some(ExternalTag::OnDisk),
            _ => None,
        }
    }

    /// Bytes following the marker and tag.
    pub const fn body_size(self) -> usize {
        match self {
            ExternalTag::OnDisk => 16,
        }
    }
}

/// Size of an encoded on-disk pointer, marker and tag included.
pub const EXTERNAL_POINTER_SIZE: usize = VARHDRSZ_EXTERNAL + ExternalTag::OnDisk.body_size();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternalPointer {
    pub raw_size: i32,
    pub ext_size: i32,
    pub value_id: u32,
    pub toast_rel_id: u32,
}

impl ExternalPointer {
    pub fn new(payload_len: usize, value_id: u32, toast_rel_id: u32) -> Self {
        let len = payload_len as i32;
        Self {
            raw_size: len + VARHDRSZ as i32,
            ext_size: len,
            value_id,
            toast_rel_id,
        }
    }

    pub fn encode(&self) -> [u8; EXTERNAL_POINTER_SIZE] {
        let mut buf = [0u8; EXTERNAL_POINTER_SIZE];
        buf[0] = EXTERNAL_MARKER;
        buf[1] = ExternalTag::OnDisk as u8;
        buf[2..6].copy_from_slice(&self.raw_size.to_le_bytes());
        buf[6..10].copy_from_slice(&self.ext_size.to_le_bytes());
        buf[10..14].copy_from_slice(&self.value_id.to_le_bytes());
        buf[14..18].copy_from_slice(&self.toast_rel_id.to_le_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        ensure!(
            data.len() >= EXTERNAL_POINTER_SIZE,
            "external pointer too short: {} < {}",
            data.len(),
            EXTERNAL_POINTER_SIZE
        );
        ensure!(
            decode_tag(data)? == VarlenaTag::External(ExternalTag::OnDisk),
            "not an on-disk external pointer: {:02x} {:02x}",
            data[0],
            data[1]
        );

        let word = |at: usize| [data[at], data[at + 1], data[at + 2], data[at + 3]];
        Ok(Self {
            raw_size: i32::from_le_bytes(word(2)),
            ext_size: i32::from_le_bytes(word(6)),
            value_id: u32::from_le_bytes(word(10)),
            toast_rel_id: u32::from_le_bytes(word(14)),
        })
    }

    pub fn is_compressed(&self) -> bool {
        self.ext_size < self.raw_size - VARHDRSZ as i32
    }
}

/// Resolves external references to their values.
pub trait ExternalStore {
    /// Returns the referenced value as an inline varlena, header included.
    fn fetch(&self, pointer: &ExternalPointer) -> Result<Vec<u8>>;
}

/// Inline form of `bytes`: unchanged unless it is an external reference.
pub fn inline_value<'a>(bytes: &'a [u8], store: &dyn ExternalStore) -> Result<Cow<'a, [u8]>> {
    if !is_external(bytes) {
        return Ok(Cow::Borrowed(bytes));
    }
    let pointer = ExternalPointer::decode(bytes)?;
    let value = store.fetch(&pointer)?;
    ensure!(
        !is_external(&value),
        "external store returned another external reference for value {}",
        pointer.value_id
    );
    Ok(Cow::Owned(value))
}
