//! # Row Schema
//!
//! Ordered column descriptors plus the row-level properties every encode and
//! decode call needs: whether rows carry an object id, the composite type
//! identity, and a per-column "missing value" used when a stored row
//! predates a column that was added later.
//!
//! Schema changes (`add_column`, `drop_column`) invalidate every cached
//! column offset.

use eyre::{ensure, Result};

use crate::config::MAX_ROW_ATTRIBUTES;
use crate::error::RowError;
use crate::schema::ColumnDesc;
use crate::types::Datum;

#[derive(Debug, Clone)]
pub struct RowSchema {
    columns: Vec<ColumnDesc>,
    has_oid: bool,
    type_id: u32,
    typmod: i32,
    missing: Vec<Option<Datum<'static>>>,
}

impl RowSchema {
    pub fn new(columns: Vec<ColumnDesc>) -> Result<Self> {
        check_column_count(columns.len())?;
        for (idx, col) in columns.iter().enumerate() {
            col.validate(idx)?;
        }
        let missing = vec![None; columns.len()];
        Ok(Self {
            columns,
            has_oid: false,
            type_id: 0,
            typmod: -1,
            missing,
        })
    }

    pub fn with_oids(mut self, has_oid: bool) -> Self {
        self.has_oid = has_oid;
        self
    }

    /// Sets the composite type identity stamped into composite datums.
    pub fn with_type(mut self, type_id: u32, typmod: i32) -> Self {
        self.type_id = type_id;
        self.typmod = typmod;
        self
    }

    pub fn natts(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    pub fn column(&self, idx: usize) -> Option<&ColumnDesc> {
        self.columns.get(idx)
    }

    pub fn has_oid(&self) -> bool {
        self.has_oid
    }

    pub fn type_id(&self) -> u32 {
        self.type_id
    }

    pub fn typmod(&self) -> i32 {
        self.typmod
    }

    /// Value reported for column `idx` when a row has fewer columns than
    /// the schema. `None` means the column reads as null.
    pub fn missing_value(&self, idx: usize) -> Option<&Datum<'static>> {
        if self.columns.get(idx)?.is_dropped() {
            return None;
        }
        self.missing.get(idx)?.as_ref()
    }

    pub fn has_missing_values(&self) -> bool {
        self.missing.iter().any(Option::is_some)
    }

    pub fn set_missing_value(&mut self, idx: usize, value: Option<Datum<'static>>) -> Result<()> {
        let col = self.columns.get(idx).ok_or_else(|| {
            eyre::eyre!("column index {} out of range for {} columns", idx, self.columns.len())
        })?;
        if let Some(datum) = &value {
            ensure!(
                !datum.is_expanded(),
                "missing value for column '{}' must be a flat datum",
                col.name()
            );
            col.check_datum(idx, datum)?;
        }
        self.missing[idx] = value;
        Ok(())
    }

    /// Appends a column. Rows formed before the call report `missing` (or
    /// null) for it.
    pub fn add_column(&mut self, column: ColumnDesc, missing: Option<Datum<'static>>) -> Result<()> {
        check_column_count(self.columns.len() + 1)?;
        column.validate(self.columns.len())?;
        self.columns.push(column);
        self.missing.push(None);
        if let Err(e) = self.set_missing_value(self.columns.len() - 1, missing) {
            self.columns.pop();
            self.missing.pop();
            return Err(e);
        }
        self.reset_offset_cache();
        Ok(())
    }

    /// Marks the 1-based column `attnum` dropped. Its stored bytes stay in
    /// place; it reads as null from then on.
    pub fn drop_column(&mut self, attnum: i32) -> Result<()> {
        let idx = self.user_index(attnum)?;
        self.columns[idx].mark_dropped();
        self.missing[idx] = None;
        self.reset_offset_cache();
        Ok(())
    }

    pub fn reset_offset_cache(&self) {
        for col in &self.columns {
            col.reset_cached_offset();
        }
    }

    /// 0-based index of the 1-based column number `attnum`.
    pub(crate) fn user_index(&self, attnum: i32) -> Result<usize> {
        if attnum < 1 || attnum as usize > self.columns.len() {
            return Err(RowError::InvalidColumnNumber(attnum).into());
        }
        Ok(attnum as usize - 1)
    }
}

fn check_column_count(count: usize) -> Result<()> {
    if count > MAX_ROW_ATTRIBUTES {
        return Err(RowError::TooManyColumns {
            count,
            limit: MAX_ROW_ATTRIBUTES,
        }
        .into());
    }
    Ok(())
}
