//! # Row Codec Layout Constants
//!
//! Every number that shapes the physical row format lives here. These values
//! are part of the on-disk format: changing any of them makes previously
//! encoded rows unreadable.
//!
//! ## Dependency Graph
//!
//! ```text
//! MAXIMUM_ALIGNOF (8)
//!       │
//!       ├─> hoff = MAXALIGN(ROW_HEADER_SIZE + bitmap + oid)
//!       │
//!       └─> MINIMAL_ROW_OFFSET (largest multiple of 8 that keeps the
//!             minimal row's length word ahead of infomask2)
//!
//! ROW_HEADER_SIZE (23 bytes)
//!       │
//!       ├─> INFOMASK2_OFFSET (18) ──> MINIMAL_ROW_OFFSET + MINIMAL_ROW_PADDING + 4
//!       │
//!       └─> MINIMAL_ROW_HEADER_SIZE (ROW_HEADER_SIZE - MINIMAL_ROW_OFFSET)
//!
//! NATTS_MASK (11 bits)
//!       │
//!       └─> MAX_ROW_ATTRIBUTES (must fit in the mask)
//!
//! VARATT_SHORT_MAX (127)
//!       │
//!       └─> largest total size of a 1-byte-header varlena
//! ```
//!
//! ## Critical Invariants
//!
//! Enforced by compile-time assertions below:
//!
//! 1. `MAX_ROW_ATTRIBUTES <= NATTS_MASK`
//! 2. `MINIMAL_ROW_OFFSET` is a multiple of `MAXIMUM_ALIGNOF`
//! 3. `MINIMAL_ROW_OFFSET + MINIMAL_ROW_HEADER_SIZE == ROW_HEADER_SIZE`

// ============================================================================
// ALIGNMENT
// ============================================================================

/// Strictest alignment any column can request (the `double` class).
/// The data region of every row starts on a multiple of this.
pub const MAXIMUM_ALIGNOF: usize = 8;

/// Rounds `len` up to `MAXIMUM_ALIGNOF`.
#[inline]
pub const fn max_align(len: usize) -> usize {
    (len + MAXIMUM_ALIGNOF - 1) & !(MAXIMUM_ALIGNOF - 1)
}

// ============================================================================
// ROW HEADER
// ============================================================================

/// Size of the fixed row header, up to (not including) the null bitmap.
pub const ROW_HEADER_SIZE: usize = 23;

/// Byte offset of `infomask2` inside the fixed row header.
pub const INFOMASK2_OFFSET: usize = 18;

/// Low bits of `infomask2` holding the attribute count.
pub const NATTS_MASK: u16 = 0x07FF;

/// Maximum number of attributes a formed row may carry.
pub const MAX_ROW_ATTRIBUTES: usize = 1664;

/// Size of the object id stored just ahead of the data region.
pub const OID_SIZE: usize = 4;

const _: () = assert!(
    MAX_ROW_ATTRIBUTES <= NATTS_MASK as usize,
    "MAX_ROW_ATTRIBUTES must fit in the natts bits of infomask2"
);

// ============================================================================
// MINIMAL ROWS
// A minimal row is a full row with its leading transaction fields cut off.
// ============================================================================

/// Number of leading full-row bytes a minimal row omits.
pub const MINIMAL_ROW_OFFSET: usize =
    (INFOMASK2_OFFSET - 4) / MAXIMUM_ALIGNOF * MAXIMUM_ALIGNOF;

/// Unused bytes between the minimal row's length word and `infomask2`.
pub const MINIMAL_ROW_PADDING: usize = (INFOMASK2_OFFSET - 4) % MAXIMUM_ALIGNOF;

/// Size of the minimal row header, up to (not including) the null bitmap.
pub const MINIMAL_ROW_HEADER_SIZE: usize = 4 + MINIMAL_ROW_PADDING + 5;

const _: () = assert!(
    MINIMAL_ROW_OFFSET % MAXIMUM_ALIGNOF == 0,
    "MINIMAL_ROW_OFFSET must preserve data alignment"
);

const _: () = assert!(
    MINIMAL_ROW_OFFSET + MINIMAL_ROW_HEADER_SIZE == ROW_HEADER_SIZE,
    "minimal row header must be a suffix of the full row header"
);

// ============================================================================
// VARIABLE-LENGTH VALUES
// ============================================================================

/// Size of the full (4-byte) varlena header.
pub const VARHDRSZ: usize = 4;

/// Size of the short (1-byte) varlena header.
pub const VARHDRSZ_SHORT: usize = 1;

/// Header bytes of an external reference: the 0x80 marker plus a tag byte.
pub const VARHDRSZ_EXTERNAL: usize = 2;

/// Largest total size (header included) of a short varlena.
pub const VARATT_SHORT_MAX: usize = 0x7F;

/// Largest total size (header included) of a full varlena.
pub const VARATT_MAX_SIZE: usize = 0x3FFF_FFFF;

// ============================================================================
// BUILT-IN TYPES
// ============================================================================

/// Storage size of the fixed-length `name` type, terminator included.
pub const NAMEDATALEN: usize = 64;
