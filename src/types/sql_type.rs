//! # Built-in Column Types
//!
//! A small catalog of SQL types, each mapping to the physical properties
//! the row codec needs and to a text input conversion used when building
//! rows from wire-format data rows.
//!
//! | Type | Length | Align | By value | Storage |
//! |------|--------|-------|----------|---------|
//! | bool | 1 | char | yes | plain |
//! | int2 | 2 | short | yes | plain |
//! | int4, float4, oid | 4 | int | yes | plain |
//! | int8, float8 | 8 | double | yes | plain |
//! | name | 64 | char | no | plain |
//! | uuid | 16 | char | no | plain |
//! | point | 16 | double | no | plain |
//! | text, varchar, bytea | varlena | int | no | extended |
//! | cstring | cstring | char | no | plain |

use eyre::{bail, Result};

use crate::config::NAMEDATALEN;
use crate::error::RowError;
use crate::types::{Align, AttrLen, Datum, Storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Oid,
    Name,
    Point,
    Uuid,
    Text,
    Varchar,
    Bytea,
    CString,
}

/// Physical layout of a column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalType {
    pub len: AttrLen,
    pub align: Align,
    pub by_val: bool,
    pub storage: Storage,
}

impl SqlType {
    pub fn name(&self) -> &'static str {
        match self {
            SqlType::Bool => "boolean",
            SqlType::Int2 => "smallint",
            SqlType::Int4 => "integer",
            SqlType::Int8 => "bigint",
            SqlType::Float4 => "real",
            SqlType::Float8 => "double precision",
            SqlType::Oid => "oid",
            SqlType::Name => "name",
            SqlType::Point => "point",
            SqlType::Uuid => "uuid",
            SqlType::Text => "text",
            SqlType::Varchar => "character varying",
            SqlType::Bytea => "bytea",
            SqlType::CString => "cstring",
        }
    }

    /// Catalog object id of the type.
    pub fn type_oid(&self) -> u32 {
        match self {
            SqlType::Bool => 16,
            SqlType::Bytea => 17,
            SqlType::Name => 19,
            SqlType::Int8 => 20,
            SqlType::Int2 => 21,
            SqlType::Int4 => 23,
            SqlType::Text => 25,
            SqlType::Oid => 26,
            SqlType::Point => 600,
            SqlType::Float4 => 700,
            SqlType::Float8 => 701,
            SqlType::Varchar => 1043,
            SqlType::CString => 2275,
            SqlType::Uuid => 2950,
        }
    }

    pub fn physical(&self) -> PhysicalType {
        let (len, align, by_val, storage) = match self {
            SqlType::Bool => (AttrLen::Fixed(1), Align::Char, true, Storage::Plain),
            SqlType::Int2 => (AttrLen::Fixed(2), Align::Short, true, Storage::Plain),
            SqlType::Int4 | SqlType::Float4 | SqlType::Oid => {
                (AttrLen::Fixed(4), Align::Int, true, Storage::Plain)
            }
            SqlType::Int8 | SqlType::Float8 => {
                (AttrLen::Fixed(8), Align::Double, true, Storage::Plain)
            }
            SqlType::Name => (AttrLen::Fixed(NAMEDATALEN), Align::Char, false, Storage::Plain),
            SqlType::Uuid => (AttrLen::Fixed(16), Align::Char, false, Storage::Plain),
            SqlType::Point => (AttrLen::Fixed(16), Align::Double, false, Storage::Plain),
            SqlType::Text | SqlType::Varchar | SqlType::Bytea => {
                (AttrLen::Varlena, Align::Int, false, Storage::Extended)
            }
            SqlType::CString => (AttrLen::CString, Align::Char, false, Storage::Plain),
        };
        PhysicalType {
            len,
            align,
            by_val,
            storage,
        }
    }

    /// Parses the text representation of a value.
    ///
    /// `typmod` is the column's type modifier; only `varchar` consults it.
    pub fn input(&self, text: &str, typmod: i32) -> Result<Datum<'static>> {
        let invalid = || RowError::InvalidInput {
            type_name: self.name(),
            text: text.to_string(),
        };
        let trimmed = text.trim();
        let datum = match self {
            SqlType::Bool => Datum::from_bool(parse_bool(trimmed).ok_or_else(invalid)?),
            SqlType::Int2 => Datum::from_i16(trimmed.parse().map_err(|_| invalid())?),
            SqlType::Int4 => Datum::from_i32(trimmed.parse().map_err(|_| invalid())?),
            SqlType::Int8 => Datum::from_i64(trimmed.parse().map_err(|_| invalid())?),
            SqlType::Float4 => Datum::from_f32(trimmed.parse().map_err(|_| invalid())?),
            SqlType::Float8 => Datum::from_f64(trimmed.parse().map_err(|_| invalid())?),
            SqlType::Oid => Datum::from_oid(trimmed.parse().map_err(|_| invalid())?),
            SqlType::Name => Datum::fixed(name_bytes(text)),
            SqlType::Point => Datum::fixed(parse_point(trimmed).ok_or_else(invalid)?),
            SqlType::Uuid => Datum::fixed(parse_uuid(trimmed).ok_or_else(invalid)?.to_vec()),
            SqlType::Text => Datum::text(text),
            SqlType::Varchar => Datum::text(check_varchar(text, typmod)?),
            SqlType::Bytea => Datum::bytea(&parse_bytea(text).ok_or_else(invalid)?),
            SqlType::CString => Datum::cstring(text),
        };
        Ok(datum)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Some(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Zero-padded name, truncated on a character boundary to leave room for
/// the terminator.
fn name_bytes(s: &str) -> Vec<u8> {
    let mut end = s.len().min(NAMEDATALEN - 1);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut bytes = vec![0u8; NAMEDATALEN];
    bytes[..end].copy_from_slice(&s.as_bytes()[..end]);
    bytes
}

fn parse_point(s: &str) -> Option<Vec<u8>> {
    let inner = s
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(s);
    let (x, y) = inner.split_once(',')?;
    let x: f64 = x.trim().parse().ok()?;
    let y: f64 = y.trim().parse().ok()?;
    let mut bytes = Vec::with_capacity(16);
    bytes.extend_from_slice(&x.to_le_bytes());
    bytes.extend_from_slice(&y.to_le_bytes());
    Some(bytes)
}

fn parse_uuid(s: &str) -> Option<[u8; 16]> {
    let s = s
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(s);
    let digits: Vec<u8> = s.bytes().filter(|&b| b != b'-').collect();
    if digits.len() != 32 {
        return None;
    }
    let mut out = [0u8; 16];
    for (i, pair) in digits.chunks_exact(2).enumerate() {
        out[i] = (hex_digit(pair[0])? << 4) | hex_digit(pair[1])?;
    }
    Some(out)
}

/// Accepts `\x` hex format or the escape format (`\\` and `\ooo`).
fn parse_bytea(s: &str) -> Option<Vec<u8>> {
    let bytes = s.as_bytes();
    if let Some(hex) = s.strip_prefix("\\x") {
        let digits: Vec<u8> = hex.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
        if digits.len() % 2 != 0 {
            return None;
        }
        return digits
            .chunks_exact(2)
            .map(|pair| Some((hex_digit(pair[0])? << 4) | hex_digit(pair[1])?))
            .collect();
    }

    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        match bytes.get(i + 1..i + 4) {
            Some(&[b'\\', ..]) => {
                out.push(b'\\');
                i += 2;
            }
            Some(&[a @ b'0'..=b'3', b @ b'0'..=b'7', c @ b'0'..=b'7']) => {
                out.push(((a - b'0') << 6) | ((b - b'0') << 3) | (c - b'0'));
                i += 4;
            }
            _ if bytes.get(i + 1) == Some(&b'\\') => {
                out.push(b'\\');
                i += 2;
            }
            _ => return None,
        }
    }
    Some(out)
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Enforces a `varchar(n)` limit. Excess trailing spaces are silently cut.
fn check_varchar(s: &str, typmod: i32) -> Result<&str> {
    if typmod < crate::config::VARHDRSZ as i32 {
        return Ok(s);
    }
    let max_chars = (typmod - crate::config::VARHDRSZ as i32) as usize;
    let Some((cut, _)) = s.char_indices().nth(max_chars) else {
        return Ok(s);
    };
    if s[cut..].bytes().all(|b| b == b' ') {
        return Ok(&s[..cut]);
    }
    bail!(
        "value too long for type character varying({})",
        max_chars
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_input() {
        assert_eq!(SqlType::Int4.input(" 42 ", -1).unwrap().as_i32(), Some(42));
        assert_eq!(SqlType::Int2.input("-5", -1).unwrap().as_i16(), Some(-5));
        assert_eq!(
            SqlType::Int8.input("9000000000", -1).unwrap().as_i64(),
            Some(9_000_000_000)
        );
    }

    #[test]
    fn bad_integer_reports_type() {
        let err = SqlType::Int4.input("abc", -1).unwrap_err();
        assert_eq!(
            err.downcast_ref::<RowError>(),
            Some(&RowError::InvalidInput {
                type_name: "integer",
                text: "abc".to_string(),
            })
        );
    }

    #[test]
    fn int2_overflow_is_rejected() {
        assert!(SqlType::Int2.input("40000", -1).is_err());
    }

    #[test]
    fn bool_spellings() {
        for t in ["t", "TRUE", "yes", "on", "1"] {
            assert_eq!(SqlType::Bool.input(t, -1).unwrap().as_bool(), Some(true));
        }
        for f in ["f", "False", "no", "off", "0"] {
            assert_eq!(SqlType::Bool.input(f, -1).unwrap().as_bool(), Some(false));
        }
        assert!(SqlType::Bool.input("maybe", -1).is_err());
    }

    #[test]
    fn name_is_padded_and_truncated() {
        let d = SqlType::Name.input("abc", -1).unwrap();
        let bytes = d.as_bytes().unwrap();
        assert_eq!(bytes.len(), NAMEDATALEN);
        assert_eq!(&bytes[..4], b"abc\0");

        let long = "x".repeat(100);
        let d = SqlType::Name.input(&long, -1).unwrap();
        let bytes = d.as_bytes().unwrap();
        assert_eq!(bytes[NAMEDATALEN - 2], b'x');
        assert_eq!(bytes[NAMEDATALEN - 1], 0);
    }

    #[test]
    fn uuid_input() {
        let d = SqlType::Uuid
            .input("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11", -1)
            .unwrap();
        let bytes = d.as_bytes().unwrap();
        assert_eq!(bytes[0], 0xa0);
        assert_eq!(bytes[15], 0x11);
        assert!(SqlType::Uuid.input("a0eebc99", -1).is_err());
    }

    #[test]
    fn point_input() {
        let d = SqlType::Point.input("(1.5, -2)", -1).unwrap();
        let bytes = d.as_bytes().unwrap();
        assert_eq!(&bytes[..8], &1.5f64.to_le_bytes());
        assert_eq!(&bytes[8..], &(-2.0f64).to_le_bytes());
    }

    #[test]
    fn bytea_hex_and_escape() {
        let d = SqlType::Bytea.input("\\xDEADbeef", -1).unwrap();
        assert_eq!(d.varlena_payload().unwrap(), &[0xde, 0xad, 0xbe, 0xef]);

        let d = SqlType::Bytea.input("a\\\\b\\001", -1).unwrap();
        assert_eq!(d.varlena_payload().unwrap(), b"a\\b\x01");

        assert!(SqlType::Bytea.input("\\xabc", -1).is_err());
    }

    #[test]
    fn varchar_length_limit() {
        let typmod = 3 + crate::config::VARHDRSZ as i32;
        assert_eq!(
            SqlType::Varchar.input("abc", typmod).unwrap().as_text().unwrap(),
            "abc"
        );
        assert_eq!(
            SqlType::Varchar.input("abc   ", typmod).unwrap().as_text().unwrap(),
            "abc"
        );
        let err = SqlType::Varchar.input("abcd", typmod).unwrap_err();
        assert!(err.to_string().contains("character varying(3)"));
        assert!(SqlType::Varchar.input(&"z".repeat(500), -1).is_ok());
    }

    #[test]
    fn physical_layouts() {
        let p = SqlType::Int8.physical();
        assert_eq!(p.len, AttrLen::Fixed(8));
        assert_eq!(p.align, Align::Double);
        assert!(p.by_val);

        let p = SqlType::Text.physical();
        assert_eq!(p.len, AttrLen::Varlena);
        assert_eq!(p.storage, Storage::Extended);
        assert!(!p.by_val);

        assert_eq!(SqlType::CString.physical().len, AttrLen::CString);
    }
}
