//! Generation-time checks on a [`Schema`].
//!
//! Every backend runs [`lint`] first (through [`crate::backend::ensure_valid`]) and
//! refuses to emit anything while an error-level finding remains. Warnings are
//! logged and generation continues.
//!
//! ## Rules
//!
//! - **Identifiers**: node names are `snake_case` (`[a-z][a-z0-9]*(_[a-z0-9]+)*`, so never
//!   `__`, which joins path components in record field names); enum type names and
//!   variant idents are `CamelCase`.
//! - **Reserved names**: Rust keywords, and the accessor methods `lock`, `subscribe`, `clone`.
//! - **Uniqueness**: sibling names, variant idents within an enum, enum type names across
//!   the schema, and every derived identifier (`keys::NetworkHomeSsid`, `NetworkHomeView`, ...).
//! - **Ranges**: string capacity at most `u32::MAX` bytes and defaults within it; integer
//!   bounds inside the native range, `min <= max`, default inside `[min, max]`.
//! - **Type names**: enums may not take a name the generated code already refers to
//!   (`Result`, `Option`, `Config`, `Uint8Array`, ...).
//! - **Warnings**: empty group, schema without leaves, 128-bit integers (the client maps
//!   them to `bigint`).
//!
//! Run it from the command line with `confgen lint FILE.cfg`; exit code 1 if any error-level
//! findings.

use crate::ast::*;
use crate::backend::{camel_path, view_name};
use crate::walk::{walk, FlatKey, Visitor};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Identifies which rule produced the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LintRule {
    /// Node name not `snake_case`, or enum/variant ident not `CamelCase`.
    InvalidIdentifier,
    /// Keyword or accessor method name used as a node name or variant.
    ReservedName,
    /// Two siblings share a name.
    DuplicateName,
    /// Two variants of one enum share an ident.
    DuplicateVariant,
    /// Two enum leaves declare the same type name.
    DuplicateEnumName,
    /// Two nodes map to the same generated identifier.
    IdentifierCollision,
    /// Default outside capacity, bounds or native range.
    DefaultOutOfRange,
    /// String capacity whose length prefix would not fit a `u32`.
    CapacityOutOfRange,
    /// A declared bound lies outside the native range of the width.
    BoundOutOfRange,
    /// `min > max`.
    MinAboveMax,
    EmptyGroup,
    EmptySchema,
    /// 128-bit integer; legal, but the client has to use `bigint`.
    WideInteger,
}

impl LintRule {
    /// Stable kebab-case id printed next to each finding.
    pub fn id(self) -> &'static str {
        match self {
            LintRule::InvalidIdentifier => "invalid-identifier",
            LintRule::ReservedName => "reserved-name",
            LintRule::DuplicateName => "duplicate-name",
            LintRule::DuplicateVariant => "duplicate-variant",
            LintRule::DuplicateEnumName => "duplicate-enum-name",
            LintRule::IdentifierCollision => "identifier-collision",
            LintRule::DefaultOutOfRange => "default-out-of-range",
            LintRule::CapacityOutOfRange => "capacity-out-of-range",
            LintRule::BoundOutOfRange => "bound-out-of-range",
            LintRule::MinAboveMax => "min-above-max",
            LintRule::EmptyGroup => "empty-group",
            LintRule::EmptySchema => "empty-schema",
            LintRule::WideInteger => "wide-integer",
        }
    }
}

/// A single lint message, located by dotted node path (`<root>` for the schema itself).
#[derive(Debug, Clone, PartialEq)]
pub struct LintMessage {
    pub path: String,
    pub rule: LintRule,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for LintMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}: {} [{}]", self.path, severity, self.message, self.rule.id())
    }
}

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while", "abstract", "become", "box", "do", "final",
    "gen", "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

/// Methods every generated accessor already has.
const ACCESSOR_METHODS: &[&str] = &["lock", "subscribe", "clone"];

/// Type names the backends emit next to the schema's own, or use unqualified
/// from the Rust prelude and the TypeScript globals.
const FIXED_TYPE_NAMES: &[&str] = &[
    "RawConfig", "Update", "Accessor",
    "Result", "Option", "Some", "None", "Ok", "Err", "Vec", "String", "Box", "Default",
    "Debug", "Clone", "Copy", "PartialEq", "Eq", "Hash", "FnOnce", "Fn", "FnMut", "Send",
    "Sync", "Sized", "Drop", "Into", "From", "Iterator",
    "Config", "Key", "Reader", "Writer", "WireError", "Uint8Array", "Error", "Number",
    "BigInt", "Array", "Object", "Boolean", "Symbol",
];

/// Largest string capacity whose varuint length prefix stays within
/// `MAX_LENGTH_PREFIX_LEN` bytes.
pub const MAX_STRING_CAPACITY: usize = u32::MAX as usize;

pub fn is_snake_case(s: &str) -> bool {
    let mut parts = s.split('_');
    let Some(first) = parts.next() else {
        return false;
    };
    let starts_alpha = first.chars().next().is_some_and(|c| c.is_ascii_lowercase());
    let part_ok = |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    starts_alpha && part_ok(first) && parts.all(part_ok)
}

pub fn is_camel_case(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && s.chars().all(|c| c.is_ascii_alphanumeric())
}

fn display_path(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}

struct Linter {
    out: Vec<LintMessage>,
    /// `keys::*` marker names -> first owner.
    key_names: HashMap<String, String>,
    /// Module-level type names -> first owner.
    type_names: HashMap<String, String>,
    enum_names: HashSet<String>,
    leaves: usize,
}

impl Linter {
    fn push(&mut self, path: &str, rule: LintRule, severity: Severity, message: String) {
        self.out.push(LintMessage {
            path: path.to_string(),
            rule,
            severity,
            message,
        });
    }

    fn error(&mut self, path: &str, rule: LintRule, message: String) {
        self.push(path, rule, Severity::Error, message);
    }

    fn claim_key(&mut self, path: &[String]) {
        let owner = display_path(path);
        let name = camel_path(path);
        if let Some(prev) = self.key_names.get(&name) {
            let msg = format!("key type `{}` also generated for `{}`", name, prev);
            self.error(&owner, LintRule::IdentifierCollision, msg);
        } else {
            self.key_names.insert(name, owner);
        }
    }

    fn claim_type(&mut self, name: String, owner: &str) {
        if let Some(prev) = self.type_names.get(&name) {
            let msg = format!("type `{}` also generated for `{}`", name, prev);
            self.error(owner, LintRule::IdentifierCollision, msg);
        } else {
            self.type_names.insert(name, owner.to_string());
        }
    }

    fn check_node_name(&mut self, path: &[String]) {
        let Some(name) = path.last() else {
            return;
        };
        let owner = display_path(path);
        if KEYWORDS.contains(&name.as_str()) || ACCESSOR_METHODS.contains(&name.as_str()) {
            self.error(&owner, LintRule::ReservedName, format!("`{}` is reserved", name));
        } else if !is_snake_case(name) {
            let msg = format!("node name `{}` must be snake_case without `__`", name);
            self.error(&owner, LintRule::InvalidIdentifier, msg);
        }
    }

    fn check_siblings(&mut self, path: &[String], children: &[Node]) {
        let mut seen = HashSet::new();
        for child in children {
            if !seen.insert(child.name.as_str()) {
                let mut p = path.to_vec();
                p.push(child.name.clone());
                let msg = format!("duplicate sibling name `{}`", child.name);
                self.error(&display_path(&p), LintRule::DuplicateName, msg);
            }
        }
    }

    fn check_integer(&mut self, owner: &str, leaf: &IntegerLeaf) {
        let (lo, hi) = leaf.native_range();
        let ty = leaf.rust_type();
        for (side, bound) in [("min", leaf.min), ("max", leaf.max)] {
            if let Some(b) = bound {
                if b < lo || b > hi {
                    let msg = format!("{} bound {} outside {} range [{}, {}]", side, b, ty, lo, hi);
                    self.error(owner, LintRule::BoundOutOfRange, msg);
                }
            }
        }
        let (min, max) = leaf.effective_range();
        if min > max {
            let msg = format!("min {} is above max {}", min, max);
            self.error(owner, LintRule::MinAboveMax, msg);
        } else if leaf.default < lo || leaf.default > hi {
            let msg = format!("default {} does not fit {}", leaf.default, ty);
            self.error(owner, LintRule::DefaultOutOfRange, msg);
        } else if leaf.default < min || leaf.default > max {
            let msg = format!("default {} outside [{}, {}]", leaf.default, min, max);
            self.error(owner, LintRule::DefaultOutOfRange, msg);
        }
        if leaf.width == IntWidth::W128 {
            let msg = format!("{} is carried as bigint by the client", ty);
            self.push(owner, LintRule::WideInteger, Severity::Warning, msg);
        }
    }

    fn check_enum(&mut self, owner: &str, leaf: &EnumLeaf) {
        let name = leaf.name();
        if KEYWORDS.contains(&name) {
            self.error(owner, LintRule::ReservedName, format!("enum name `{}` is reserved", name));
        } else if !is_camel_case(name) {
            let msg = format!("enum name `{}` must be CamelCase", name);
            self.error(owner, LintRule::InvalidIdentifier, msg);
        }
        if !self.enum_names.insert(name.to_string()) {
            let msg = format!("enum `{}` is declared more than once", name);
            self.error(owner, LintRule::DuplicateEnumName, msg);
        } else {
            self.claim_type(name.to_string(), owner);
        }
        let mut seen = HashSet::new();
        for v in leaf.variants() {
            if v.ident == "Self" {
                self.error(owner, LintRule::ReservedName, "variant `Self` is reserved".to_string());
            } else if !is_camel_case(&v.ident) {
                let msg = format!("variant `{}` must be CamelCase", v.ident);
                self.error(owner, LintRule::InvalidIdentifier, msg);
            }
            if !seen.insert(v.ident.as_str()) {
                let msg = format!("variant `{}` appears twice in `{}`", v.ident, name);
                self.error(owner, LintRule::DuplicateVariant, msg);
            }
        }
    }
}

impl Visitor for Linter {
    fn start_nested(&mut self, path: &[String], children: &[Node]) {
        self.check_node_name(path);
        self.check_siblings(path, children);
        self.claim_key(path);
        self.claim_type(view_name(path), &display_path(path));
        if !path.is_empty() && children.is_empty() {
            let msg = "group has no children".to_string();
            self.push(&display_path(path), LintRule::EmptyGroup, Severity::Warning, msg);
        }
    }

    fn leaf(&mut self, key: &FlatKey) {
        self.leaves += 1;
        self.check_node_name(&key.path);
        self.claim_key(&key.path);
    }

    fn string_leaf(&mut self, key: &FlatKey, leaf: &StringLeaf) {
        self.leaf(key);
        let len = leaf.default_value().len();
        if leaf.max_length > MAX_STRING_CAPACITY {
            let msg = format!("capacity {} exceeds {}", leaf.max_length, MAX_STRING_CAPACITY);
            self.error(&key.dotted(), LintRule::CapacityOutOfRange, msg);
        } else if len > leaf.max_length {
            let msg = format!("default is {} bytes, capacity is {}", len, leaf.max_length);
            self.error(&key.dotted(), LintRule::DefaultOutOfRange, msg);
        }
    }

    fn integer_leaf(&mut self, key: &FlatKey, leaf: &IntegerLeaf) {
        self.leaf(key);
        self.check_integer(&key.dotted(), leaf);
    }

    fn enum_leaf(&mut self, key: &FlatKey, leaf: &EnumLeaf) {
        self.leaf(key);
        self.check_enum(&key.dotted(), leaf);
    }
}

/// Run all rules on `schema`. Findings come in traversal order.
pub fn lint(schema: &Schema) -> Vec<LintMessage> {
    let mut linter = Linter {
        out: Vec::new(),
        key_names: HashMap::new(),
        type_names: FIXED_TYPE_NAMES
            .iter()
            .map(|n| (n.to_string(), "<generated>".to_string()))
            .collect(),
        enum_names: HashSet::new(),
        leaves: 0,
    };
    walk(schema, &mut linter);
    if linter.leaves == 0 {
        let msg = format!("schema `{}` has no leaves", schema.name);
        linter.push("<root>", LintRule::EmptySchema, Severity::Warning, msg);
    }
    linter.out
}

pub fn has_errors(messages: &[LintMessage]) -> bool {
    messages.iter().any(|m| m.severity == Severity::Error)
}
