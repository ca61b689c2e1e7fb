//! Dynamically typed leaf values, as the client layout sees them.

use crate::ast::{IntWidth, IntegerLeaf, Leaf};
use crate::codec::{self, CodecError, Wire};
use std::fmt;
use std::io::Cursor;
use std::mem;

/// A single leaf value. Enumerations travel as their discriminant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    Bool(bool),
    Str(String),
    Enum(u32),
}

impl Value {
    /// The declared default of `leaf`.
    pub fn default_for(leaf: &Leaf) -> Value {
        match leaf {
            Leaf::String(s) => Value::Str(s.default_value().to_string()),
            Leaf::Boolean(b) => Value::Bool(b.default),
            Leaf::Enum(e) => Value::Enum(e.default_index() as u32),
            // Defaults are lint-checked against the native range before any backend runs.
            Leaf::Integer(i) => Value::integer(i, i.default).unwrap_or_else(|| Value::integer_zero(i)),
        }
    }

    /// `v` as the native type of `leaf`, or `None` if it does not fit.
    pub fn integer(leaf: &IntegerLeaf, v: i128) -> Option<Value> {
        Some(match (leaf.signed, leaf.width) {
            (false, IntWidth::W8) => Value::U8(v.try_into().ok()?),
            (false, IntWidth::W16) => Value::U16(v.try_into().ok()?),
            (false, IntWidth::W32) => Value::U32(v.try_into().ok()?),
            (false, IntWidth::W64) => Value::U64(v.try_into().ok()?),
            (false, IntWidth::W128) => Value::U128(v.try_into().ok()?),
            (true, IntWidth::W8) => Value::I8(v.try_into().ok()?),
            (true, IntWidth::W16) => Value::I16(v.try_into().ok()?),
            (true, IntWidth::W32) => Value::I32(v.try_into().ok()?),
            (true, IntWidth::W64) => Value::I64(v.try_into().ok()?),
            (true, IntWidth::W128) => Value::I128(v),
        })
    }

    fn integer_zero(leaf: &IntegerLeaf) -> Value {
        match Value::integer(leaf, 0) {
            Some(v) => v,
            None => Value::I128(0),
        }
    }

    /// Whether this value has the variant `leaf` decodes to.
    pub fn fits_kind(&self, leaf: &Leaf) -> bool {
        mem::discriminant(self) == mem::discriminant(&Value::default_for(leaf))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::U128(_) => "u128",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::I128(_) => "i128",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Enum(_) => "enum",
        }
    }

    /// Integer value widened to `i128`; `None` for non-integers and `u128` above `i128::MAX`.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::U8(x) => Some(*x as i128),
            Value::U16(x) => Some(*x as i128),
            Value::U32(x) => Some(*x as i128),
            Value::U64(x) => Some(*x as i128),
            Value::U128(x) => i128::try_from(*x).ok(),
            Value::I8(x) => Some(*x as i128),
            Value::I16(x) => Some(*x as i128),
            Value::I32(x) => Some(*x as i128),
            Value::I64(x) => Some(*x as i128),
            Value::I128(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<u32> {
        match self {
            Value::Enum(d) => Some(*d),
            _ => None,
        }
    }

    /// Append this value's wire form. The variant alone decides the encoding.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Value::U8(x) => x.encode(out),
            Value::U16(x) => x.encode(out),
            Value::U32(x) => x.encode(out),
            Value::U64(x) => x.encode(out),
            Value::U128(x) => x.encode(out),
            Value::I8(x) => x.encode(out),
            Value::I16(x) => x.encode(out),
            Value::I32(x) => x.encode(out),
            Value::I64(x) => x.encode(out),
            Value::I128(x) => x.encode(out),
            Value::Bool(b) => codec::write_bool(out, *b),
            Value::Str(s) => codec::write_str(out, s),
            Value::Enum(d) => codec::write_varuint(out, *d as u128),
        }
    }

    /// Read one value of `leaf`'s kind, enforcing string capacity and variant count.
    pub fn decode(leaf: &Leaf, r: &mut Cursor<&[u8]>) -> Result<Value, CodecError> {
        Ok(match leaf {
            Leaf::String(s) => {
                let v = codec::read_str(r)?;
                if v.len() > s.max_length {
                    return Err(CodecError::StringTooLong {
                        len: v.len(),
                        max: s.max_length,
                    });
                }
                Value::Str(v.to_string())
            }
            Leaf::Boolean(_) => Value::Bool(codec::read_bool(r)?),
            Leaf::Enum(e) => {
                let d = u32::decode(r)?;
                if d as usize >= e.variants().len() {
                    return Err(CodecError::InvalidDiscriminant(d));
                }
                Value::Enum(d)
            }
            Leaf::Integer(i) => match (i.signed, i.width) {
                (false, IntWidth::W8) => Value::U8(u8::decode(r)?),
                (false, IntWidth::W16) => Value::U16(u16::decode(r)?),
                (false, IntWidth::W32) => Value::U32(u32::decode(r)?),
                (false, IntWidth::W64) => Value::U64(u64::decode(r)?),
                (false, IntWidth::W128) => Value::U128(u128::decode(r)?),
                (true, IntWidth::W8) => Value::I8(i8::decode(r)?),
                (true, IntWidth::W16) => Value::I16(i16::decode(r)?),
                (true, IntWidth::W32) => Value::I32(i32::decode(r)?),
                (true, IntWidth::W64) => Value::I64(i64::decode(r)?),
                (true, IntWidth::W128) => Value::I128(i128::decode(r)?),
            },
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::U128(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Enum(d) => write!(f, "#{}", d),
            other => match other.as_i128() {
                Some(v) => write!(f, "{}", v),
                None => write!(f, "{:?}", other),
            },
        }
    }
}
