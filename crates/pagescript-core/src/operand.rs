//! Operand values accumulated between content stream operators.
//!
//! The operand stack holds dynamically-typed values; operators consume
//! them through the typed accessors here, which fail with
//! [`ContentError::WrongType`] instead of panicking when the stream puts
//! the wrong kind of value under an operator.

use crate::error::ContentError;

/// A content stream operand value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// Boolean value (`true` or `false`).
    Boolean(bool),
    /// The null object.
    Null,
    /// Integer number (e.g. `42`, `-7`).
    Integer(i64),
    /// Real (floating-point) number (e.g. `3.14`, `.5`).
    Real(f64),
    /// Name object (e.g. `/F1`, `/DeviceRGB`). Stored without the leading `/`.
    Name(String),
    /// Literal string delimited by parentheses, stored as raw bytes.
    LiteralString(Vec<u8>),
    /// Hexadecimal string delimited by angle brackets, stored as decoded bytes.
    HexString(Vec<u8>),
    /// Array of operands (e.g. `[1 2 3]`).
    Array(Vec<Operand>),
    /// Inline dictionary (`<< /Key value ... >>`), insertion ordered.
    Dictionary(Vec<(String, Operand)>),
}

impl Operand {
    /// Short type tag for diagnostics and `WrongType` errors.
    pub fn tag(&self) -> &'static str {
        match self {
            Operand::Boolean(_) => "boolean",
            Operand::Null => "null",
            Operand::Integer(_) => "integer",
            Operand::Real(_) => "real",
            Operand::Name(_) => "name",
            Operand::LiteralString(_) => "string",
            Operand::HexString(_) => "hex string",
            Operand::Array(_) => "array",
            Operand::Dictionary(_) => "dictionary",
        }
    }

    /// Numeric value; accepts both integers and reals.
    pub fn as_f64(&self) -> Result<f64, ContentError> {
        match self {
            Operand::Integer(i) => Ok(*i as f64),
            Operand::Real(r) => Ok(*r),
            other => Err(wrong_type("number", other)),
        }
    }

    /// Integer value; a real with no fractional part is accepted.
    pub fn as_i64(&self) -> Result<i64, ContentError> {
        match self {
            Operand::Integer(i) => Ok(*i),
            Operand::Real(r) if r.fract() == 0.0 => Ok(*r as i64),
            other => Err(wrong_type("integer", other)),
        }
    }

    /// Name value without the leading slash.
    pub fn as_name(&self) -> Result<&str, ContentError> {
        match self {
            Operand::Name(n) => Ok(n),
            other => Err(wrong_type("name", other)),
        }
    }

    /// String bytes from either string form.
    pub fn as_string_bytes(&self) -> Result<&[u8], ContentError> {
        match self {
            Operand::LiteralString(b) | Operand::HexString(b) => Ok(b),
            other => Err(wrong_type("string", other)),
        }
    }

    /// Array elements.
    pub fn as_array(&self) -> Result<&[Operand], ContentError> {
        match self {
            Operand::Array(a) => Ok(a),
            other => Err(wrong_type("array", other)),
        }
    }

    /// Dictionary entries.
    pub fn as_dict(&self) -> Result<&[(String, Operand)], ContentError> {
        match self {
            Operand::Dictionary(d) => Ok(d),
            other => Err(wrong_type("dictionary", other)),
        }
    }

    /// Boolean value.
    pub fn as_bool(&self) -> Result<bool, ContentError> {
        match self {
            Operand::Boolean(b) => Ok(*b),
            other => Err(wrong_type("boolean", other)),
        }
    }
}

fn wrong_type(expected: &'static str, found: &Operand) -> ContentError {
    ContentError::WrongType {
        expected,
        found: found.tag(),
    }
}

/// Look up a key in insertion-ordered dictionary entries.
pub fn dict_get<'a>(entries: &'a [(String, Operand)], key: &str) -> Option<&'a Operand> {
    entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}
