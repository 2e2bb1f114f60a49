//! # Configuration Module
//!
//! Layout constants for the row codec. Constants that depend on each other
//! are co-located and their relationships are checked at compile time, so a
//! mismatched edit fails the build rather than corrupting rows.
//!
//! ## Module Organization
//!
//! - [`constants`]: Header sizes, alignment, attribute limits and varlena thresholds

pub mod constants;
pub use constants::*;
