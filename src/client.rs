//! In-process mirror of the generated TypeScript client.
//!
//! [`ClientLayout`] derives the same index map and wire plan from the schema as
//! the client backend does, and performs `decode` / `encodeUpdate` over
//! [`Value`]s with the shared [`codec`]. It is what the test suites use to check
//! that device-encoded blobs decode on the client side and vice versa.

use crate::ast::{IntWidth, Leaf, Schema};
use crate::codec::{self, CodecError};
use crate::frame::{self, DeserializeError};
use crate::value::Value;
use crate::walk::{flatten, FlatKey};
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;

/// How one leaf appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WirePrimitive {
    /// Single raw byte (8-bit integers).
    Byte { signed: bool },
    /// Unsigned LEB128; `wide` when the value needs more than 32 bits (`bigint` on the client).
    VarUint { wide: bool },
    /// ZigZag + LEB128.
    VarInt { wide: bool },
    Str { max_len: usize },
    Bool,
}

impl WirePrimitive {
    pub fn of(leaf: &Leaf) -> Self {
        match leaf {
            Leaf::String(s) => WirePrimitive::Str {
                max_len: s.max_length,
            },
            Leaf::Boolean(_) => WirePrimitive::Bool,
            Leaf::Enum(_) => WirePrimitive::VarUint { wide: false },
            Leaf::Integer(i) => {
                let wide = i.width.bits() > 32;
                match (i.width, i.signed) {
                    (IntWidth::W8, signed) => WirePrimitive::Byte { signed },
                    (_, false) => WirePrimitive::VarUint { wide },
                    (_, true) => WirePrimitive::VarInt { wide },
                }
            }
        }
    }
}

impl fmt::Display for WirePrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WirePrimitive::Byte { signed: false } => write!(f, "u8"),
            WirePrimitive::Byte { signed: true } => write!(f, "i8"),
            WirePrimitive::VarUint { wide: false } => write!(f, "varuint"),
            WirePrimitive::VarUint { wide: true } => write!(f, "varuint(bigint)"),
            WirePrimitive::VarInt { wide: false } => write!(f, "varint"),
            WirePrimitive::VarInt { wide: true } => write!(f, "varint(bigint)"),
            WirePrimitive::Str { max_len } => write!(f, "string({})", max_len),
            WirePrimitive::Bool => write!(f, "bool"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Deserialize(#[from] DeserializeError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("leaf {index} ({path}) holds {expected}, got {got}")]
    TypeMismatch {
        index: usize,
        path: String,
        expected: &'static str,
        got: &'static str,
    },
    #[error("no leaf with index {0}")]
    UnknownIndex(usize),
    #[error("config has {got} value(s), schema has {expected} leaves")]
    LengthMismatch { expected: usize, got: usize },
}

#[derive(Debug, Clone)]
pub struct LayoutEntry {
    pub key: FlatKey,
    pub leaf: Leaf,
    pub wire: WirePrimitive,
}

/// Client-side configuration: one value per flattened index.
pub type Config = Vec<Value>;

#[derive(Debug, Clone)]
pub struct ClientLayout {
    version: u32,
    entries: Vec<LayoutEntry>,
    by_name: HashMap<String, usize>,
}

impl ClientLayout {
    pub fn from_schema(schema: &Schema) -> Self {
        let entries: Vec<LayoutEntry> = flatten(schema)
            .into_iter()
            .map(|(key, leaf)| LayoutEntry {
                wire: WirePrimitive::of(leaf),
                leaf: leaf.clone(),
                key,
            })
            .collect();
        let by_name = entries
            .iter()
            .map(|e| (e.key.dotted(), e.key.index))
            .collect();
        ClientLayout {
            version: schema.version,
            entries,
            by_name,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of a dotted path, e.g. `network.home.ssid`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn defaults(&self) -> Config {
        self.entries.iter().map(|e| Value::default_for(&e.leaf)).collect()
    }

    /// Version prefix first, then every leaf in index order; leftovers are an error.
    pub fn decode(&self, bytes: &[u8]) -> Result<Config, ClientError> {
        let payload = frame::check_version(bytes, self.version)?;
        let mut r = Cursor::new(payload);
        let config = self
            .entries
            .iter()
            .map(|e| Value::decode(&e.leaf, &mut r))
            .collect::<Result<Config, _>>()?;
        codec::finish(&r)?;
        Ok(config)
    }

    pub fn encode(&self, config: &[Value]) -> Result<Vec<u8>, ClientError> {
        if config.len() != self.entries.len() {
            return Err(ClientError::LengthMismatch {
                expected: self.entries.len(),
                got: config.len(),
            });
        }
        let mut out = Vec::new();
        frame::write_version(&mut out, self.version);
        for (entry, value) in self.entries.iter().zip(config) {
            check_kind(entry, value)?;
            value.encode(&mut out);
        }
        Ok(out)
    }

    /// Update message for leaf `index`. Only the value's kind is checked; bounds and
    /// capacity are the device's to enforce.
    pub fn encode_update(&self, index: usize, value: &Value) -> Result<Vec<u8>, ClientError> {
        let entry = self.entries.get(index).ok_or(ClientError::UnknownIndex(index))?;
        check_kind(entry, value)?;
        let mut out = frame::begin_update(index);
        value.encode(&mut out);
        Ok(out)
    }

    pub fn decode_update(&self, bytes: &[u8]) -> Result<(usize, Value), ClientError> {
        let mut r = Cursor::new(bytes);
        let index = frame::read_update_index(&mut r)?;
        let entry = self
            .entries
            .get(index as usize)
            .ok_or(CodecError::UnknownIndex(index))?;
        let value = Value::decode(&entry.leaf, &mut r)?;
        codec::finish(&r)?;
        Ok((index as usize, value))
    }
}

fn check_kind(entry: &LayoutEntry, value: &Value) -> Result<(), ClientError> {
    if value.fits_kind(&entry.leaf) {
        return Ok(());
    }
    Err(ClientError::TypeMismatch {
        index: entry.key.index,
        path: entry.key.dotted(),
        expected: Value::default_for(&entry.leaf).type_name(),
        got: value.type_name(),
    })
}
