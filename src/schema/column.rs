//! # Column Descriptors
//!
//! A `ColumnDesc` carries the physical properties of one column plus a
//! mutable offset cache filled in by the decoder.
//!
//! ## Offset Cache
//!
//! For a prefix of columns whose positions are the same in every row (no
//! nulls before them and nothing variable-length before them), the decoder
//! records the byte offset from the start of the data region. The cache is
//! an `AtomicI32` (-1 = unknown) so a shared schema can be populated from
//! `&self` while several readers decode rows against it. Every writer
//! stores the same value for a given column, so relaxed ordering suffices.

use std::sync::atomic::{AtomicI32, Ordering};

use eyre::Result;

use crate::config::VARHDRSZ;
use crate::error::RowError;
use crate::types::{Align, AttrLen, Datum, SqlType, Storage};

const UNKNOWN_OFFSET: i32 = -1;

#[derive(Debug)]
pub struct ColumnDesc {
    name: String,
    sql_type: Option<SqlType>,
    len: AttrLen,
    align: Align,
    by_val: bool,
    storage: Storage,
    typmod: i32,
    dropped: bool,
    cached_offset: AtomicI32,
}

impl Clone for ColumnDesc {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            sql_type: self.sql_type,
            len: self.len,
            align: self.align,
            by_val: self.by_val,
            storage: self.storage,
            typmod: self.typmod,
            dropped: self.dropped,
            cached_offset: AtomicI32::new(UNKNOWN_OFFSET),
        }
    }
}

impl ColumnDesc {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        let p = sql_type.physical();
        Self {
            sql_type: Some(sql_type),
            ..Self::with_layout(name, p.len, p.align, p.by_val, p.storage)
        }
    }

    /// `varchar(n)`, or unbounded `varchar` when `max_chars` is `None`.
    ///
    /// Fails when `n` plus the header size does not fit the typmod.
    pub fn varchar(name: impl Into<String>, max_chars: Option<u32>) -> Result<Self> {
        let mut col = Self::new(name, SqlType::Varchar);
        if let Some(n) = max_chars {
            col.typmod = i32::try_from(n)
                .ok()
                .and_then(|n| n.checked_add(VARHDRSZ as i32))
                .ok_or_else(|| {
                    eyre::eyre!(
                        "length for type varchar cannot exceed {}",
                        i32::MAX - VARHDRSZ as i32
                    )
                })?;
        }
        Ok(col)
    }

    /// A column of a type outside the built-in catalog, described only by
    /// its physical layout. Such columns have no text input conversion.
    pub fn with_layout(
        name: impl Into<String>,
        len: AttrLen,
        align: Align,
        by_val: bool,
        storage: Storage,
    ) -> Self {
        Self {
            name: name.into(),
            sql_type: None,
            len,
            align,
            by_val,
            storage,
            typmod: -1,
            dropped: false,
            cached_offset: AtomicI32::new(UNKNOWN_OFFSET),
        }
    }

    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_typmod(mut self, typmod: i32) -> Self {
        self.typmod = typmod;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> Option<SqlType> {
        self.sql_type
    }

    pub fn attr_len(&self) -> AttrLen {
        self.len
    }

    pub fn align(&self) -> Align {
        self.align
    }

    pub fn by_val(&self) -> bool {
        self.by_val
    }

    pub fn storage(&self) -> Storage {
        self.storage
    }

    pub fn typmod(&self) -> i32 {
        self.typmod
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped
    }

    /// Variable-length column whose values may be stored with a 1-byte header.
    pub fn is_packable(&self) -> bool {
        self.len.is_varlena() && self.storage.allows_packing()
    }

    pub fn cached_offset(&self) -> Option<usize> {
        let off = self.cached_offset.load(Ordering::Relaxed);
        (off >= 0).then_some(off as usize)
    }

    pub(crate) fn set_cached_offset(&self, offset: usize) {
        self.cached_offset.store(offset as i32, Ordering::Relaxed);
    }

    pub(crate) fn reset_cached_offset(&self) {
        self.cached_offset.store(UNKNOWN_OFFSET, Ordering::Relaxed);
    }

    pub(crate) fn mark_dropped(&mut self) {
        self.dropped = true;
    }

    /// Parses `text` with the column type's input conversion.
    pub fn input(&self, text: &str) -> Result<Datum<'static>> {
        let ty = self
            .sql_type
            .ok_or_else(|| eyre::eyre!("column '{}' has no text input conversion", self.name))?;
        ty.input(text, self.typmod)
    }

    pub(crate) fn validate(&self, column: usize) -> Result<()> {
        if self.by_val {
            match self.len {
                AttrLen::Fixed(1 | 2 | 4 | 8) => {}
                AttrLen::Fixed(len) => {
                    return Err(RowError::UnsupportedByValWidth { column, len }.into())
                }
                _ => {
                    return Err(RowError::UnsupportedByValWidth { column, len: 0 }.into());
                }
            }
        }
        if let AttrLen::Fixed(0) = self.len {
            eyre::bail!("column '{}' declares a zero fixed length", self.name);
        }
        Ok(())
    }

    /// Checks that `datum` has the representation this column stores.
    pub(crate) fn check_datum(&self, column: usize, datum: &Datum<'_>) -> Result<()> {
        let expected = match (self.by_val, self.len, datum) {
            (true, _, Datum::ByVal(_)) => return Ok(()),
            (true, _, _) => "a by-value datum",
            (false, AttrLen::Varlena, Datum::ByRef(bytes)) if !bytes.is_empty() => return Ok(()),
            (false, AttrLen::Varlena, Datum::Expanded(_)) => return Ok(()),
            (false, AttrLen::Varlena, _) => "a varlena or expanded datum",
            (false, AttrLen::Fixed(n), Datum::ByRef(bytes)) if bytes.len() >= n => return Ok(()),
            (false, AttrLen::Fixed(_), _) => "a by-reference datum of the column's length",
            (false, AttrLen::CString, Datum::ByRef(bytes)) if bytes.contains(&0) => return Ok(()),
            (false, AttrLen::CString, _) => "a null-terminated string",
        };
        Err(RowError::DatumMismatch { column, expected }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_resets_offset_cache() {
        let col = ColumnDesc::new("a", SqlType::Int4);
        col.set_cached_offset(12);
        assert_eq!(col.cached_offset(), Some(12));
        assert_eq!(col.clone().cached_offset(), None);
    }

    #[test]
    fn varchar_typmod_includes_header() {
        assert_eq!(ColumnDesc::varchar("v", Some(10)).unwrap().typmod(), 14);
        assert_eq!(ColumnDesc::varchar("v", None).unwrap().typmod(), -1);
    }

    #[test]
    fn varchar_length_must_fit_typmod() {
        let max = (i32::MAX - VARHDRSZ as i32) as u32;
        assert_eq!(ColumnDesc::varchar("v", Some(max)).unwrap().typmod(), i32::MAX);
        for n in [max + 1, i32::MAX as u32, i32::MAX as u32 + 1, u32::MAX] {
            assert!(ColumnDesc::varchar("v", Some(n)).is_err(), "{}", n);
        }
    }

    #[test]
    fn packable_needs_varlena_and_non_plain_storage() {
        assert!(ColumnDesc::new("t", SqlType::Text).is_packable());
        assert!(!ColumnDesc::new("t", SqlType::Text)
            .with_storage(Storage::Plain)
            .is_packable());
        assert!(!ColumnDesc::new("c", SqlType::CString).is_packable());
    }

    #[test]
    fn by_val_width_must_be_supported() {
        let col = ColumnDesc::with_layout("odd", AttrLen::Fixed(3), Align::Char, true, Storage::Plain);
        let err = col.validate(0).unwrap_err();
        assert_eq!(
            err.downcast_ref::<RowError>(),
            Some(&RowError::UnsupportedByValWidth { column: 0, len: 3 })
        );
    }

    #[test]
    fn check_datum_matches_representation() {
        let int = ColumnDesc::new("i", SqlType::Int4);
        assert!(int.check_datum(0, &Datum::from_i32(1)).is_ok());
        assert!(int.check_datum(0, &Datum::text("x")).is_err());

        let uuid = ColumnDesc::new("u", SqlType::Uuid);
        assert!(uuid.check_datum(1, &Datum::fixed(vec![0; 16])).is_ok());
        assert!(uuid.check_datum(1, &Datum::fixed(vec![0; 4])).is_err());

        let cs = ColumnDesc::new("c", SqlType::CString);
        assert!(cs.check_datum(2, &Datum::cstring("x")).is_ok());
        assert!(cs.check_datum(2, &Datum::borrowed(b"x")).is_err());
    }

    #[test]
    fn layout_only_column_has_no_input() {
        let col = ColumnDesc::with_layout("p", AttrLen::Fixed(8), Align::Double, true, Storage::Plain);
        assert!(col.input("1").is_err());
    }
}
