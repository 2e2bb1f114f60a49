//! # Row Encoding and Decoding
//!
//! This module turns an ordered list of column values into a single
//! contiguous byte row and back. The layout is PostgreSQL-compatible: a fixed
//! header, an optional null bitmap, an optional object id, then a data region
//! in which every value sits at its column's alignment.
//!
//! ## Row Binary Layout
//!
//! ```text
//! +-------------------+-------------------+---------+-----+-------------------+
//! | Header (23 bytes) | Null Bitmap       | Padding | Oid | Data Region       |
//! |                   | [u8; (N+7)/8]     |         | u32 | aligned values    |
//! +-------------------+-------------------+---------+-----+-------------------+
//! ^                                                       ^
//! 0                                                     hoff (multiple of 8)
//! ```
//!
//! | Component | Present when | Description |
//! |-----------|--------------|-------------|
//! | **Header** | always | identity words, item pointer, natts, flags, hoff |
//! | **Null Bitmap** | some column is null | 1 bit per column, `1` = NULL |
//! | **Oid** | schema has oids | 4 bytes ending at `hoff` |
//! | **Data Region** | always | non-null values only, nulls take no space |
//!
//! ## Design Goals
//!
//! 1. **Exact size prediction**: the size walk and the write walk share one rule set
//! 2. **Zero-copy reads**: decoded by-reference values borrow from the row
//! 3. **Schema-dependent**: types come from the schema, never from the row
//! 4. **Cached offsets**: fixed-position columns are found without a walk
//!
//! ## Module Structure
//!
//! - `header`: zerocopy header structs, flags, null bitmap helpers
//! - `fill`: data-region size computation and value placement
//! - `deform`: decode walk, offset cache, single-attribute access
//! - `heap_row`: `HeapRow`, the owned full row
//! - `minimal`: `MinimalRow`, the row without transaction fields
//! - `modify`: modify and expand

pub(crate) mod deform;
pub mod fill;
pub mod header;
pub mod heap_row;
pub mod minimal;
pub mod modify;


pub use fill::{compute_data_size, fill_data};
pub use header::{
    bitmap_len, header_size, infomask, ItemPointer, MinimalHeader, RowHeader, SystemAttr,
};
pub use heap_row::HeapRow;
pub use minimal::MinimalRow;
