//! # Value Types
//!
//! In-memory values and the physical layout classes that decide how they are
//! placed in a row.
//!
//! - [`layout`]: alignment, length and storage classes plus per-value size rules
//! - [`datum`]: the [`Datum`] value representation and expanded objects
//! - [`sql_type`]: built-in SQL types, their layouts and text input

pub mod datum;
pub mod layout;
pub mod sql_type;

pub use datum::{Datum, ExpandedObject};
pub use layout::{align_datum, value_length, Align, AttrLen, Storage};
pub use sql_type::{PhysicalType, SqlType};
