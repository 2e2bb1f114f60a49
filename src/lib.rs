//! # tuplecodec - PostgreSQL-Style Row Codec
//!
//! tuplecodec converts between an ordered list of typed column values and a
//! single contiguous, self-describing byte row, and back. The layout is the
//! PostgreSQL heap row format: a fixed header, a null bitmap, an optional
//! object id and an aligned data region. This implementation prioritizes:
//!
//! - **Exact sizing**: one allocation per row, sized before anything is written
//! - **Zero-copy reads**: decoded values borrow from the row they came from
//! - **Cheap random access**: per-column offset caches for fixed-position columns
//!
//! ## Quick Start
//!
//! ```ignore
//! use tuplecodec::{ColumnDesc, Datum, HeapRow, RowSchema, RowView, SqlType};
//!
//! let schema = RowSchema::new(vec![
//!     ColumnDesc::new("id", SqlType::Int4),
//!     ColumnDesc::new("name", SqlType::Text),
//! ])?;
//!
//! let row = HeapRow::form(&schema, &[Datum::from_i32(1), Datum::text("Alice")], &[false, false])?;
//!
//! let arena = bumpalo::Bump::new();
//! let mut view = RowView::new(&schema, &arena);
//! view.store_heap(&row)?;
//! let name = view.get_attr(2)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   RowView (incremental extraction)   │
//! ├─────────────────────────────────────┤
//! │ HeapRow / MinimalRow (form, deform,  │
//! │   get_attr, modify, expand, copy)    │
//! ├───────────────────┬─────────────────┤
//! │  Row Schema and   │  Varlena header │
//! │   offset cache    │  codec, external│
//! ├───────────────────┴─────────────────┤
//! │  Alignment, length classes, Datum    │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`]: layout constants
//! - [`error`]: `RowError`, the typed error carried inside `eyre::Report`
//! - [`types`]: `Datum`, alignment and length classes, built-in SQL types
//! - [`schema`]: column descriptors and row schemas
//! - [`varlena`]: variable-length headers and external references
//! - [`records`]: row encoding and decoding
//! - [`view`]: incremental row view and textual data rows

#[macro_use]
mod macros;

pub mod config;
pub mod error;
pub mod records;
pub mod schema;
pub mod types;
pub mod varlena;
pub mod view;

pub use error::RowError;
pub use records::{HeapRow, ItemPointer, MinimalRow, RowHeader, SystemAttr};
pub use schema::{ColumnDesc, RowSchema};
pub use types::{Align, AttrLen, Datum, ExpandedObject, SqlType, Storage};
pub use varlena::{ExternalPointer, ExternalStore};
pub use view::{encode_data_row, RowView};
