//! # Row Headers
//!
//! Zerocopy views over the fixed part of a row, the null bitmap helpers and
//! the system-attribute numbering.
//!
//! ## Full Row Header (23 bytes)
//!
//! ```text
//! offset  size  field
//! ------  ----  ------------------------------------------------------------
//!   0      4    xmin        | datum_len   (stored row | composite datum)
//!   4      4    xmax        | typmod
//!   8      4    cid         | type_id
//!  12      6    ctid: block hi (2), block lo (2), position (2)
//!  18      2    infomask2 (low 11 bits = natts)
//!  20      2    infomask  (HAS_NULL | HAS_VARWIDTH | HAS_EXTERNAL | HAS_OID)
//!  22      1    hoff      (offset of the data region)
//!  23      -    null bitmap, if HAS_NULL; object id at hoff - 4, if HAS_OID
//! ```
//!
//! ## Minimal Row Header (15 bytes)
//!
//! A minimal row is the full layout with the first eight bytes cut off. The
//! first four bytes of what remains are reused for the row's length and the
//! item pointer becomes padding. `hoff` still counts from the full-row
//! origin, so the data region of a minimal row starts at `hoff - 8`.
//!
//! ## Null Bitmap
//!
//! One bit per column, least-significant bit first: bit `i % 8` of byte
//! `i / 8` describes column `i`. A set bit means the column is null.

use eyre::Result;
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{
    max_align, MINIMAL_ROW_HEADER_SIZE, NATTS_MASK, OID_SIZE, ROW_HEADER_SIZE, VARATT_MAX_SIZE,
};
use crate::error::{slice_at, RowError};
use crate::varlena;

/// Flag bits stored in `infomask`.
pub mod infomask {
    pub const HAS_NULL: u16 = 0x0001;
    pub const HAS_VARWIDTH: u16 = 0x0002;
    pub const HAS_EXTERNAL: u16 = 0x0004;
    pub const HAS_OID: u16 = 0x0008;

    /// Flags recomputed by every encode.
    pub const DATA_FLAGS: u16 = HAS_NULL | HAS_VARWIDTH | HAS_EXTERNAL;
}

/// Physical location of a row: block number and line position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemPointer {
    pub block: u32,
    pub pos: u16,
}

impl ItemPointer {
    pub const INVALID: ItemPointer = ItemPointer {
        block: u32::MAX,
        pos: 0,
    };

    pub fn new(block: u32, pos: u16) -> Self {
        Self { block, pos }
    }

    pub fn is_valid(&self) -> bool {
        self.pos != 0
    }

    /// 6-byte datum form: block hi, block lo, position (LE halves).
    pub fn to_bytes(self) -> [u8; 6] {
        let mut out = [0u8; 6];
        out[0..2].copy_from_slice(&((self.block >> 16) as u16).to_le_bytes());
        out[2..4].copy_from_slice(&(self.block as u16).to_le_bytes());
        out[4..6].copy_from_slice(&self.pos.to_le_bytes());
        out
    }
}

impl Default for ItemPointer {
    fn default() -> Self {
        Self::INVALID
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct RowHeader {
    word0: U32,
    word1: U32,
    word2: U32,
    block_hi: U16,
    block_lo: U16,
    pos: U16,
    infomask2: U16,
    infomask: U16,
    hoff: u8,
}

const _: () = assert!(std::mem::size_of::<RowHeader>() == ROW_HEADER_SIZE);

impl RowHeader {
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let head = slice_at(bytes, 0, ROW_HEADER_SIZE)?;
        Self::ref_from_bytes(head).map_err(|e| eyre::eyre!("failed to parse RowHeader: {:?}", e))
    }

    pub fn from_bytes_mut(bytes: &mut [u8]) -> Result<&mut Self> {
        let available = bytes.len();
        let head = bytes.get_mut(..ROW_HEADER_SIZE).ok_or(RowError::Truncated {
            needed: ROW_HEADER_SIZE,
            available,
        })?;
        Self::mut_from_bytes(head).map_err(|e| eyre::eyre!("failed to parse RowHeader: {:?}", e))
    }

    zerocopy_accessors! {
        word0: u32,
        word1: u32,
        word2: u32,
        infomask2: u16,
        infomask: u16,
    }

    pub fn xmin(&self) -> u32 {
        self.word0()
    }

    pub fn set_xmin(&mut self, xid: u32) {
        self.set_word0(xid);
    }

    pub fn xmax(&self) -> u32 {
        self.word1()
    }

    pub fn set_xmax(&mut self, xid: u32) {
        self.set_word1(xid);
    }

    pub fn cid(&self) -> u32 {
        self.word2()
    }

    pub fn set_cid(&mut self, cid: u32) {
        self.set_word2(cid);
    }

    /// Length of a composite value. It is stored as a full varlena header so
    /// the row can be embedded in a variable-length column.
    pub fn datum_len(&self) -> usize {
        let word = u32::from_be_bytes(self.word0.to_bytes());
        (word & VARATT_MAX_SIZE as u32) as usize
    }

    pub fn set_datum_len(&mut self, len: usize) {
        self.word0 = U32::from_bytes(varlena::full_header(len));
    }

    pub fn typmod(&self) -> i32 {
        self.word1() as i32
    }

    pub fn set_typmod(&mut self, typmod: i32) {
        self.set_word1(typmod as u32);
    }

    pub fn type_id(&self) -> u32 {
        self.word2()
    }

    pub fn set_type_id(&mut self, type_id: u32) {
        self.set_word2(type_id);
    }

    pub fn ctid(&self) -> ItemPointer {
        ItemPointer {
            block: ((self.block_hi.get() as u32) << 16) | self.block_lo.get() as u32,
            pos: self.pos.get(),
        }
    }

    pub fn set_ctid(&mut self, ctid: ItemPointer) {
        self.block_hi = U16::new((ctid.block >> 16) as u16);
        self.block_lo = U16::new(ctid.block as u16);
        self.pos = U16::new(ctid.pos);
    }

    pub fn natts(&self) -> usize {
        (self.infomask2() & NATTS_MASK) as usize
    }

    pub fn set_natts(&mut self, natts: usize) {
        let high = self.infomask2() & !NATTS_MASK;
        self.set_infomask2(high | (natts as u16 & NATTS_MASK));
    }

    pub fn hoff(&self) -> usize {
        self.hoff as usize
    }

    pub fn set_hoff(&mut self, hoff: usize) {
        self.hoff = hoff as u8;
    }

    pub fn has_nulls(&self) -> bool {
        self.infomask() & infomask::HAS_NULL != 0
    }

    pub fn has_varwidth(&self) -> bool {
        self.infomask() & infomask::HAS_VARWIDTH != 0
    }

    pub fn has_external(&self) -> bool {
        self.infomask() & infomask::HAS_EXTERNAL != 0
    }

    pub fn has_oid(&self) -> bool {
        self.infomask() & infomask::HAS_OID != 0
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct MinimalHeader {
    len: U32,
    padding: [u8; 6],
    infomask2: U16,
    infomask: U16,
    hoff: u8,
}

const _: () = assert!(std::mem::size_of::<MinimalHeader>() == MINIMAL_ROW_HEADER_SIZE);

impl MinimalHeader {
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let head = slice_at(bytes, 0, MINIMAL_ROW_HEADER_SIZE)?;
        Self::ref_from_bytes(head)
            .map_err(|e| eyre::eyre!("failed to parse MinimalHeader: {:?}", e))
    }

    pub fn from_bytes_mut(bytes: &mut [u8]) -> Result<&mut Self> {
        let available = bytes.len();
        let head = bytes
            .get_mut(..MINIMAL_ROW_HEADER_SIZE)
            .ok_or(RowError::Truncated {
                needed: MINIMAL_ROW_HEADER_SIZE,
                available,
            })?;
        Self::mut_from_bytes(head)
            .map_err(|e| eyre::eyre!("failed to parse MinimalHeader: {:?}", e))
    }

    zerocopy_accessors! {
        len: u32,
        infomask2: u16,
        infomask: u16,
    }

    pub fn natts(&self) -> usize {
        (self.infomask2() & NATTS_MASK) as usize
    }

    pub fn set_natts(&mut self, natts: usize) {
        let high = self.infomask2() & !NATTS_MASK;
        self.set_infomask2(high | (natts as u16 & NATTS_MASK));
    }

    /// Offset of the data region from the full-row origin.
    pub fn hoff(&self) -> usize {
        self.hoff as usize
    }

    pub fn set_hoff(&mut self, hoff: usize) {
        self.hoff = hoff as u8;
    }

    pub fn has_nulls(&self) -> bool {
        self.infomask() & infomask::HAS_NULL != 0
    }

    pub fn has_oid(&self) -> bool {
        self.infomask() & infomask::HAS_OID != 0
    }
}

/// System attribute numbers. User columns are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemAttr {
    ItemPointer,
    ObjectId,
    MinXid,
    MinCid,
    MaxXid,
    MaxCid,
    TableOid,
}

impl SystemAttr {
    pub fn from_attnum(attnum: i32) -> Option<Self> {
        Some(match attnum {
            -1 => SystemAttr::ItemPointer,
            -2 => SystemAttr::ObjectId,
            -3 => SystemAttr::MinXid,
            -4 => SystemAttr::MinCid,
            -5 => SystemAttr::MaxXid,
            -6 => SystemAttr::MaxCid,
            -7 => SystemAttr::TableOid,
            _ => return None,
        })
    }

    pub fn attnum(self) -> i32 {
        match self {
            SystemAttr::ItemPointer => -1,
            SystemAttr::ObjectId => -2,
            SystemAttr::MinXid => -3,
            SystemAttr::MinCid => -4,
            SystemAttr::MaxXid => -5,
            SystemAttr::MaxCid => -6,
            SystemAttr::TableOid => -7,
        }
    }
}

/// Bytes needed for a null bitmap covering `natts` columns.
#[inline]
pub const fn bitmap_len(natts: usize) -> usize {
    natts.div_ceil(8)
}

#[inline]
pub fn att_isnull(idx: usize, bitmap: &[u8]) -> bool {
    bitmap[idx / 8] & (1 << (idx % 8)) != 0
}

#[inline]
pub fn set_null_bit(idx: usize, bitmap: &mut [u8]) {
    bitmap[idx / 8] |= 1 << (idx % 8);
}

/// Data-region offset for a row with the given bitmap and oid presence.
#[inline]
pub const fn header_size(natts: usize, has_nulls: bool, has_oid: bool) -> usize {
    let mut len = ROW_HEADER_SIZE;
    if has_nulls {
        len += bitmap_len(natts);
    }
    if has_oid {
        len += OID_SIZE;
    }
    max_align(len)
}
