//! # Row Schemas
//!
//! The ordered column descriptors rows are encoded and decoded against.
//!
//! - [`column`]: `ColumnDesc`, one column's physical layout and offset cache
//! - [`row_schema`]: `RowSchema`, the column list plus row-level properties

pub mod column;
pub mod row_schema;

pub use column::ColumnDesc;
pub use row_schema::RowSchema;
