//! # Textual Data Rows
//!
//! A data row carries every column of a row as text, as sent over the wire
//! between nodes:
//!
//! ```text
//! +-------------+----------------+------------+-----+----------------+------------+
//! | Field count | Field 0 length | Field 0    | ... | Field N length | Field N    |
//! | u16 BE      | i32 BE, -1=NULL| text bytes |     | i32 BE         | text bytes |
//! +-------------+----------------+------------+-----+----------------+------------+
//! ```
//!
//! Parsing happens in two steps: the framing is validated into a list of
//! field spans first, then each span is handed to its column's input
//! conversion by the view.

use eyre::{ensure, Result};
use smallvec::SmallVec;
use tracing::warn;

use crate::error::{slice_at, RowError};

/// Byte range of one field in the message, `None` for a null field.
pub(crate) type FieldSpan = Option<(usize, usize)>;

pub(crate) type FieldSpans = SmallVec<[FieldSpan; 16]>;

const NULL_FIELD: i32 = -1;

/// Builds a data row from text fields.
pub fn encode_data_row(fields: &[Option<&str>]) -> Result<Vec<u8>> {
    ensure!(
        fields.len() <= u16::MAX as usize,
        "data row cannot carry {} fields",
        fields.len()
    );
    let body: usize = fields.iter().map(|f| 4 + f.map_or(0, str::len)).sum();
    let mut out = Vec::with_capacity(2 + body);
    out.extend_from_slice(&(fields.len() as u16).to_be_bytes());
    for field in fields {
        match field {
            Some(text) => {
                ensure!(
                    text.len() <= i32::MAX as usize,
                    "data row field of {} bytes is too long",
                    text.len()
                );
                out.extend_from_slice(&(text.len() as i32).to_be_bytes());
                out.extend_from_slice(text.as_bytes());
            }
            None => out.extend_from_slice(&NULL_FIELD.to_be_bytes()),
        }
    }
    Ok(out)
}

/// Validates the framing of `msg` against a schema of `natts` columns.
pub(crate) fn parse_field_spans(msg: &[u8], natts: usize) -> Result<FieldSpans> {
    let count = slice_at(msg, 0, 2)?;
    let count = u16::from_be_bytes([count[0], count[1]]) as usize;
    if count != natts {
        warn!(row_cols = count, schema_cols = natts, "data row does not match the schema");
        return Err(RowError::ColumnCountMismatch {
            row: count,
            schema: natts,
        }
        .into());
    }

    let mut spans = FieldSpans::with_capacity(count);
    let mut pos = 2;
    for _ in 0..count {
        let len = slice_at(msg, pos, 4)?;
        let len = i32::from_be_bytes([len[0], len[1], len[2], len[3]]);
        pos += 4;
        if len == NULL_FIELD {
            spans.push(None);
            continue;
        }
        ensure!(len >= 0, "data row field has invalid length {}", len);
        let len = len as usize;
        slice_at(msg, pos, len)?;
        spans.push(Some((pos, len)));
        pos += len;
    }
    Ok(spans)
}
