//! Schema model: an ordered tree of groups and typed leaves.
//!
//! Groups only organise; every value lives in a [`Leaf`]. The declared child order
//! is significant: it is the order [`walk`](crate::walk) assigns flattened indices in,
//! and therefore the wire order of every encoded blob.

use crate::codec::{MAX_DISCRIMINANT_LEN, MAX_LENGTH_PREFIX_LEN};
use crate::frame::VERSION_PREFIX_LEN;

/// Errors raised while building a schema (text or builder API).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("enum {name}: expected exactly one default variant, found {count}")]
    EnumDefaults { name: String, count: usize },
    #[error("enum {0}: no variants")]
    EmptyEnum(String),
    #[error("io: {0}")]
    Io(String),
}

/// Root of a settings tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub name: String,
    /// Written as the 4-byte prefix of every encoded blob.
    pub version: u32,
    pub children: Vec<Node>,
}

impl Schema {
    pub fn new(name: impl Into<String>, version: u32, children: Vec<Node>) -> Self {
        Schema {
            name: name.into(),
            version,
            children,
        }
    }

    /// Worst-case size of a versioned blob: version prefix plus every leaf's bound.
    /// Saturates at `usize::MAX`; lint rejects capacities that would get there.
    pub fn max_serialized_len(&self) -> usize {
        crate::walk::flatten(self)
            .iter()
            .map(|(_, leaf)| leaf.max_encoded_len())
            .fold(VERSION_PREFIX_LEN, usize::saturating_add)
    }

    /// All enumerations in traversal order.
    pub fn enums(&self) -> Vec<&EnumLeaf> {
        crate::walk::flatten(self)
            .into_iter()
            .filter_map(|(_, leaf)| match leaf {
                Leaf::Enum(e) => Some(e),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group(Vec<Node>),
    Leaf(Leaf),
}

impl Node {
    pub fn group(name: impl Into<String>, children: Vec<Node>) -> Self {
        Node {
            name: name.into(),
            kind: NodeKind::Group(children),
        }
    }

    pub fn leaf(name: impl Into<String>, leaf: impl Into<Leaf>) -> Self {
        Node {
            name: name.into(),
            kind: NodeKind::Leaf(leaf.into()),
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match &self.kind {
            NodeKind::Leaf(l) => Some(l),
            NodeKind::Group(_) => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group(_))
    }
}

/// The four value kinds a leaf can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    String(StringLeaf),
    Integer(IntegerLeaf),
    Enum(EnumLeaf),
    Boolean(BooleanLeaf),
}

impl Leaf {
    /// Upper bound on the encoded size of this leaf's value.
    pub fn max_encoded_len(&self) -> usize {
        match self {
            Leaf::String(s) => s.max_length.saturating_add(MAX_LENGTH_PREFIX_LEN),
            Leaf::Integer(i) => i.width.max_encoded_len(),
            Leaf::Enum(_) => MAX_DISCRIMINANT_LEN,
            Leaf::Boolean(_) => 1,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Leaf::String(_) => "string",
            Leaf::Integer(_) => "integer",
            Leaf::Enum(_) => "enum",
            Leaf::Boolean(_) => "bool",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLeaf {
    /// Capacity in UTF-8 bytes.
    pub max_length: usize,
    pub default: Option<String>,
}

impl StringLeaf {
    pub fn new(max_length: usize) -> Self {
        StringLeaf {
            max_length,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn default_value(&self) -> &str {
        self.default.as_deref().unwrap_or("")
    }
}

impl From<StringLeaf> for Leaf {
    fn from(l: StringLeaf) -> Self {
        Leaf::String(l)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
    W128,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
            IntWidth::W128 => 128,
        }
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(IntWidth::W8),
            16 => Some(IntWidth::W16),
            32 => Some(IntWidth::W32),
            64 => Some(IntWidth::W64),
            128 => Some(IntWidth::W128),
            _ => None,
        }
    }

    /// Worst-case wire bytes: raw byte for 8-bit, LEB128 otherwise.
    pub fn max_encoded_len(self) -> usize {
        match self {
            IntWidth::W8 => 1,
            IntWidth::W16 => 3,
            IntWidth::W32 => 5,
            IntWidth::W64 => 10,
            IntWidth::W128 => 19,
        }
    }
}

/// Integer leaf. Literals are held as `i128`; a `u128` bound above `i128::MAX`
/// cannot be expressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerLeaf {
    pub width: IntWidth,
    pub signed: bool,
    pub default: i128,
    pub min: Option<i128>,
    pub max: Option<i128>,
}

impl IntegerLeaf {
    pub fn unsigned(width: IntWidth, default: i128) -> Self {
        IntegerLeaf {
            width,
            signed: false,
            default,
            min: None,
            max: None,
        }
    }

    pub fn signed(width: IntWidth, default: i128) -> Self {
        IntegerLeaf {
            width,
            signed: true,
            default,
            min: None,
            max: None,
        }
    }

    pub fn min(mut self, min: i128) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: i128) -> Self {
        self.max = Some(max);
        self
    }

    /// Rust spelling of the native type, e.g. `u16` or `i128`.
    pub fn rust_type(&self) -> String {
        format!("{}{}", if self.signed { 'i' } else { 'u' }, self.width.bits())
    }

    /// Range of the native type, clamped to what an `i128` literal can hold.
    pub fn native_range(&self) -> (i128, i128) {
        let bits = self.width.bits();
        if self.signed {
            if bits == 128 {
                (i128::MIN, i128::MAX)
            } else {
                (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
            }
        } else if bits == 128 {
            (0, i128::MAX)
        } else {
            (0, (1i128 << bits) - 1)
        }
    }

    /// Declared bounds with absent sides filled from the native range.
    pub fn effective_range(&self) -> (i128, i128) {
        let (lo, hi) = self.native_range();
        (self.min.unwrap_or(lo), self.max.unwrap_or(hi))
    }
}

impl From<IntegerLeaf> for Leaf {
    fn from(l: IntegerLeaf) -> Self {
        Leaf::Integer(l)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumVariant {
    /// Human-readable label.
    pub name: String,
    /// Code identifier (CamelCase).
    pub ident: String,
    pub is_default: bool,
}

impl EnumVariant {
    pub fn new(ident: impl Into<String>) -> Self {
        let ident = ident.into();
        EnumVariant {
            name: ident.clone(),
            ident,
            is_default: false,
        }
    }

    pub fn labelled(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Enumeration leaf. Fields are private so the single-default invariant holds
/// for every value that exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumLeaf {
    name: String,
    variants: Vec<EnumVariant>,
}

impl EnumLeaf {
    pub fn new(name: impl Into<String>, variants: Vec<EnumVariant>) -> Result<Self, SchemaError> {
        let name = name.into();
        if variants.is_empty() {
            return Err(SchemaError::EmptyEnum(name));
        }
        let count = variants.iter().filter(|v| v.is_default).count();
        if count != 1 {
            return Err(SchemaError::EnumDefaults { name, count });
        }
        Ok(EnumLeaf { name, variants })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[EnumVariant] {
        &self.variants
    }

    /// Position of the default variant; also its wire discriminant.
    pub fn default_index(&self) -> usize {
        self.variants.iter().position(|v| v.is_default).unwrap_or(0)
    }

    pub fn default_variant(&self) -> &EnumVariant {
        &self.variants[self.default_index()]
    }
}

impl From<EnumLeaf> for Leaf {
    fn from(l: EnumLeaf) -> Self {
        Leaf::Enum(l)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BooleanLeaf {
    pub default: bool,
}

impl BooleanLeaf {
    pub fn new(default: bool) -> Self {
        BooleanLeaf { default }
    }
}

impl From<BooleanLeaf> for Leaf {
    fn from(l: BooleanLeaf) -> Self {
        Leaf::Boolean(l)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variants(defaults: &[bool]) -> Vec<EnumVariant> {
        defaults
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let v = EnumVariant::new(format!("V{}", i));
                if *d {
                    v.as_default()
                } else {
                    v
                }
            })
            .collect()
    }

    #[test]
    fn enum_requires_exactly_one_default() {
        for n in 1..=6 {
            let none = vec![false; n];
            assert_eq!(
                EnumLeaf::new("E", variants(&none)),
                Err(SchemaError::EnumDefaults { name: "E".into(), count: 0 })
            );
            let mut one = vec![false; n];
            one[n - 1] = true;
            assert!(EnumLeaf::new("E", variants(&one)).is_ok());
            if n >= 2 {
                let mut two = vec![false; n];
                two[0] = true;
                two[n - 1] = true;
                assert!(matches!(
                    EnumLeaf::new("E", variants(&two)),
                    Err(SchemaError::EnumDefaults { count: 2, .. })
                ));
                let all = vec![true; n];
                assert!(matches!(
                    EnumLeaf::new("E", variants(&all)),
                    Err(SchemaError::EnumDefaults { count, .. }) if count == n
                ));
            }
        }
    }

    #[test]
    fn enum_without_variants_is_rejected() {
        assert_eq!(EnumLeaf::new("E", vec![]), Err(SchemaError::EmptyEnum("E".into())));
    }

    #[test]
    fn native_ranges() {
        assert_eq!(IntegerLeaf::unsigned(IntWidth::W8, 0).native_range(), (0, 255));
        assert_eq!(IntegerLeaf::signed(IntWidth::W8, 0).native_range(), (-128, 127));
        assert_eq!(
            IntegerLeaf::signed(IntWidth::W64, 0).native_range(),
            (i64::MIN as i128, i64::MAX as i128)
        );
        assert_eq!(IntegerLeaf::unsigned(IntWidth::W128, 0).native_range(), (0, i128::MAX));
    }

    #[test]
    fn max_serialized_len_sums_leaf_bounds() {
        let schema = Schema::new(
            "s",
            1,
            vec![
                Node::leaf("name", StringLeaf::new(20)),
                Node::leaf("expert", BooleanLeaf::new(false)),
                Node::group(
                    "g",
                    vec![
                        Node::leaf("a", IntegerLeaf::unsigned(IntWidth::W8, 0)),
                        Node::leaf("b", IntegerLeaf::signed(IntWidth::W128, 0)),
                    ],
                ),
            ],
        );
        assert_eq!(schema.max_serialized_len(), 4 + 25 + 1 + 1 + 19);
    }

    #[test]
    fn max_serialized_len_saturates() {
        let schema = Schema::new(
            "s",
            1,
            vec![
                Node::leaf("a", StringLeaf::new(usize::MAX)),
                Node::leaf("b", StringLeaf::new(usize::MAX - 2)),
            ],
        );
        assert_eq!(schema.max_serialized_len(), usize::MAX);
    }
}
