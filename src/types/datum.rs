//! # Datum
//!
//! A single column value in memory. By-value columns carry their bits in a
//! `u64`; by-reference columns carry the exact bytes that are written to a
//! row (for varlena columns that includes the header). A third form holds
//! an in-memory "expanded" object that knows how to flatten itself.
//!
//! ```text
//! Datum::ByVal(bits)      int2/int4/int8/float4/float8/bool/oid
//! Datum::ByRef(bytes)     name/uuid/point, text/bytea/varchar, cstring
//! Datum::Expanded(obj)    varlena columns only; flattened on write
//! ```
//!
//! Decoded by-reference values borrow from the row they were read from, so
//! `Datum<'a>` is tied to that row's lifetime. Use [`Datum::into_owned`]
//! to detach.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use eyre::Result;

use crate::varlena;

/// A value stored outside the flat representation that can serialize
/// itself into a varlena byte image on demand.
pub trait ExpandedObject: fmt::Debug + Send + Sync {
    /// Size in bytes of the flattened varlena, header included.
    fn flat_size(&self) -> usize;

    /// Writes exactly `flat_size()` bytes into `dst`.
    fn flatten_into(&self, dst: &mut [u8]);
}

#[derive(Debug, Clone)]
pub enum Datum<'a> {
    ByVal(u64),
    ByRef(Cow<'a, [u8]>),
    Expanded(Arc<dyn ExpandedObject>),
}

impl Default for Datum<'_> {
    fn default() -> Self {
        Datum::ByVal(0)
    }
}

impl PartialEq for Datum<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Datum::ByVal(a), Datum::ByVal(b)) => a == b,
            (Datum::ByRef(a), Datum::ByRef(b)) => a == b,
            (Datum::Expanded(a), Datum::Expanded(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Datum<'static> {
    pub fn from_bool(v: bool) -> Self {
        Datum::ByVal(v as u64)
    }

    pub fn from_i16(v: i16) -> Self {
        Datum::ByVal(v as u16 as u64)
    }

    pub fn from_i32(v: i32) -> Self {
        Datum::ByVal(v as u32 as u64)
    }

    pub fn from_i64(v: i64) -> Self {
        Datum::ByVal(v as u64)
    }

    pub fn from_f32(v: f32) -> Self {
        Datum::ByVal(v.to_bits() as u64)
    }

    pub fn from_f64(v: f64) -> Self {
        Datum::ByVal(v.to_bits())
    }

    pub fn from_oid(v: u32) -> Self {
        Datum::ByVal(v as u64)
    }

    /// Text value in full 4-byte-header form.
    pub fn text(s: &str) -> Self {
        Datum::ByRef(Cow::Owned(varlena::make_full(s.as_bytes())))
    }

    /// Binary value in full 4-byte-header form.
    pub fn bytea(bytes: &[u8]) -> Self {
        Datum::ByRef(Cow::Owned(varlena::make_full(bytes)))
    }

    /// Null-terminated string.
    pub fn cstring(s: &str) -> Self {
        let mut bytes = Vec::with_capacity(s.len() + 1);
        bytes.extend_from_slice(s.as_bytes());
        bytes.push(0);
        Datum::ByRef(Cow::Owned(bytes))
    }

    /// Fixed-length by-reference value, taken as-is.
    pub fn fixed(bytes: Vec<u8>) -> Self {
        Datum::ByRef(Cow::Owned(bytes))
    }

    pub fn expanded(obj: Arc<dyn ExpandedObject>) -> Self {
        Datum::Expanded(obj)
    }
}

impl<'a> Datum<'a> {
    /// By-reference value borrowing `bytes` verbatim.
    pub fn borrowed(bytes: &'a [u8]) -> Self {
        Datum::ByRef(Cow::Borrowed(bytes))
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.bits().map(|b| b & 0xFF != 0)
    }

    pub fn as_i16(&self) -> Option<i16> {
        self.bits().map(|b| b as u16 as i16)
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.bits().map(|b| b as u32 as i32)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.bits().map(|b| b as i64)
    }

    pub fn as_f32(&self) -> Option<f32> {
        self.bits().map(|b| f32::from_bits(b as u32))
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.bits().map(f64::from_bits)
    }

    pub fn as_oid(&self) -> Option<u32> {
        self.bits().map(|b| b as u32)
    }

    fn bits(&self) -> Option<u64> {
        match self {
            Datum::ByVal(b) => Some(*b),
            _ => None,
        }
    }

    /// Raw bytes of a by-reference value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Datum::ByRef(bytes) => Some(&bytes[..]),
            _ => None,
        }
    }

    pub fn is_expanded(&self) -> bool {
        matches!(self, Datum::Expanded(_))
    }

    /// Payload of an inline varlena value, header stripped.
    ///
    /// Compressed values are returned in their stored (compressed) form.
    pub fn varlena_payload(&self) -> Result<&[u8]> {
        match self {
            Datum::ByRef(bytes) => varlena::payload(bytes),
            _ => eyre::bail!("value is not an inline varlena"),
        }
    }

    /// Payload of a text-like varlena value as UTF-8.
    pub fn as_text(&self) -> Result<&str> {
        let payload = self.varlena_payload()?;
        Ok(std::str::from_utf8(payload)?)
    }

    /// Contents of a null-terminated string, terminator excluded.
    pub fn as_cstr(&self) -> Result<&str> {
        let bytes = self
            .as_bytes()
            .ok_or_else(|| eyre::eyre!("value is not a cstring"))?;
        let nul = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(std::str::from_utf8(&bytes[..nul])?)
    }

    /// A datum borrowing from `self`.
    pub fn reborrow(&self) -> Datum<'_> {
        match self {
            Datum::ByVal(b) => Datum::ByVal(*b),
            Datum::ByRef(bytes) => Datum::ByRef(Cow::Borrowed(&bytes[..])),
            Datum::Expanded(obj) => Datum::Expanded(Arc::clone(obj)),
        }
    }

    pub fn into_owned(self) -> Datum<'static> {
        match self {
            Datum::ByVal(b) => Datum::ByVal(b),
            Datum::ByRef(bytes) => Datum::ByRef(Cow::Owned(bytes.into_owned())),
            Datum::Expanded(obj) => Datum::Expanded(obj),
        }
    }
}
