//! # Internal Macros
//!
//! ## zerocopy_accessors!
//!
//! Generates getter and setter methods for zerocopy struct fields that use
//! little-endian wrapper types (U16, U32).
//!
//! ### Usage
//!
//! ```ignore
//! use zerocopy::little_endian::{U16, U32};
//!
//! #[repr(C)]
//! struct RowHeader {
//!     infomask: U16,
//!     word0: U32,
//! }
//!
//! impl RowHeader {
//!     zerocopy_accessors! {
//!         infomask: u16,
//!         word0: u32,
//!     }
//! }
//!
//! // Generates:
//! // pub fn infomask(&self) -> u16 { self.infomask.get() }
//! // pub fn set_infomask(&mut self, val: u16) { self.infomask = U16::new(val); }
//! // pub fn word0(&self) -> u32 { self.word0.get() }
//! // pub fn set_word0(&mut self, val: u32) { self.word0 = U32::new(val); }
//! ```

/// Generates getter and setter methods for zerocopy little-endian fields.
#[macro_export]
macro_rules! zerocopy_accessors {
    (@impl $field:ident, u16) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u16 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u16) {
                self.$field = ::zerocopy::little_endian::U16::new(val);
            }
        }
    };
    (@impl $field:ident, u32) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u32 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u32) {
                self.$field = ::zerocopy::little_endian::U32::new(val);
            }
        }
    };
    ($($field:ident : $ty:tt),* $(,)?) => {
        $(
            $crate::zerocopy_accessors!(@impl $field, $ty);
        )*
    };
}
