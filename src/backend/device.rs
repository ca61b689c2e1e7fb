//! Device backend: emits the Rust module a device crate `include!`s.
//!
//! Output for a schema, in order:
//!
//! - constants `VERSION`, `MAX_SERIALIZED_LEN`, `LEAF_COUNT`, `KEY_PATHS`;
//! - one enum per enumeration leaf, with `#[default]`, label and discriminant helpers
//!   and a `Wire` impl;
//! - `RawConfig`, one field per leaf named by its path joined with `__`, plus
//!   `Default`, `Wire` and `Versioned`;
//! - in [`DeviceMode::Full`] only: the `keys` marker module, `Accessor<'a, K>` with
//!   per-key `lock` and navigation, the `…View<'c>` group views, `Update`,
//!   `RawConfig::apply` and `apply_update`.
//!
//! The emitted file has no inner attributes so it can be `include!`d inside a module.
//! It refers to this crate as `confgen`.

use super::{camel_path, ensure_valid, view_name, GenerateError};
use crate::ast::*;
use crate::walk::{walk, FlatKey, Visitor, FIELD_SEPARATOR};
use std::fmt::{self, Write};

/// How much of the device artifact to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    /// Everything a running device needs.
    Full,
    /// Record, defaults, enums and wire format only, for migration tooling that holds
    /// two schema versions side by side.
    Migration,
}

/// Render the device module for `schema`.
pub fn generate_device(schema: &Schema, mode: DeviceMode) -> Result<String, GenerateError> {
    ensure_valid(schema)?;
    let mut emitter = DeviceEmitter::new(mode);
    let leaf_count = walk(schema, &mut emitter);
    emitter.status?;
    let out = emitter.render(schema, leaf_count)?;
    log::debug!(
        "device backend: schema {} v{}, {} leaves, {:?}, {} bytes of source",
        schema.name,
        schema.version,
        leaf_count,
        mode,
        out.len()
    );
    Ok(out)
}

const RT: &str = "confgen::runtime";
const CODEC: &str = "confgen::codec";

/// What the generated code needs to know about one leaf's Rust representation.
struct FieldSpec {
    ty: String,
    default: String,
    is_str: bool,
    /// Integer bounds that are tighter than the native range.
    min: Option<i128>,
    max: Option<i128>,
}

impl FieldSpec {
    fn of(leaf: &Leaf) -> Self {
        match leaf {
            Leaf::String(s) => Self::string(s),
            Leaf::Integer(i) => Self::integer(i),
            Leaf::Enum(e) => Self::enumeration(e),
            Leaf::Boolean(b) => Self::boolean(b),
        }
    }

    fn plain(ty: String, default: String) -> Self {
        FieldSpec {
            ty,
            default,
            is_str: false,
            min: None,
            max: None,
        }
    }

    fn string(leaf: &StringLeaf) -> Self {
        let default = match leaf.default_value() {
            "" => "Default::default()".to_string(),
            s => format!("{}::bounded_lossy({:?})", RT, s),
        };
        FieldSpec {
            is_str: true,
            ..Self::plain(format!("{}::BoundedString<{}>", RT, leaf.max_length), default)
        }
    }

    fn integer(leaf: &IntegerLeaf) -> Self {
        let ty = leaf.rust_type();
        let (lo, hi) = leaf.native_range();
        let unsigned_128 = !leaf.signed && leaf.width == IntWidth::W128;
        FieldSpec {
            min: leaf.min.filter(|&m| m > lo),
            // `native_range` clamps u128 to i128::MAX, so any declared max is real there.
            max: leaf.max.filter(|&m| m < hi || (unsigned_128 && m <= hi)),
            ..Self::plain(ty.clone(), format!("{}{}", leaf.default, ty))
        }
    }

    fn enumeration(leaf: &EnumLeaf) -> Self {
        let default = format!("{}::{}", leaf.name(), leaf.default_variant().ident);
        Self::plain(leaf.name().to_string(), default)
    }

    fn boolean(leaf: &BooleanLeaf) -> Self {
        Self::plain("bool".to_string(), leaf.default.to_string())
    }

    /// Parameter type handed to a `lock` callback.
    fn borrowed(&self) -> String {
        if self.is_str {
            "&str".to_string()
        } else {
            format!("&{}", self.ty)
        }
    }

    /// Expression borrowing the field out of `raw`.
    fn borrow_from(&self, raw: &str, field: &str) -> String {
        if self.is_str {
            format!("{}.{}.as_str()", raw, field)
        } else {
            format!("&{}.{}", raw, field)
        }
    }

    fn update_payload(&self) -> String {
        if self.is_str {
            "&'a str".to_string()
        } else {
            self.ty.clone()
        }
    }
}

/// A `///` line for `text`, or `#[doc = "..."]` when the text holds control characters
/// that would end the comment or be rejected inside it.
fn doc_attr(text: &str) -> String {
    if text.chars().any(char::is_control) {
        format!("#[doc = {:?}]", text)
    } else {
        format!("/// {}", text)
    }
}

fn field_name(path: &[String]) -> String {
    path.join(FIELD_SEPARATOR)
}

fn child_path(path: &[String], child: &Node) -> Vec<String> {
    let mut p = path.to_vec();
    p.push(child.name.clone());
    p
}

/// Collects every section of the artifact in one traversal.
struct DeviceEmitter {
    mode: DeviceMode,
    status: fmt::Result,
    has_strings: bool,
    enums: String,
    fields: String,
    defaults: String,
    encode: String,
    decode: String,
    key_paths: Vec<String>,
    keys: String,
    leaf_keys: String,
    accessors: String,
    views: String,
    variants: String,
    index_arms: String,
    encode_arms: String,
    decode_arms: String,
    apply_arms: String,
}

impl DeviceEmitter {
    fn new(mode: DeviceMode) -> Self {
        DeviceEmitter {
            mode,
            status: Ok(()),
            has_strings: false,
            enums: String::new(),
            fields: String::new(),
            defaults: String::new(),
            encode: String::new(),
            decode: String::new(),
            key_paths: Vec::new(),
            keys: String::new(),
            leaf_keys: String::new(),
            accessors: String::new(),
            views: String::new(),
            variants: String::new(),
            index_arms: String::new(),
            encode_arms: String::new(),
            decode_arms: String::new(),
            apply_arms: String::new(),
        }
    }

    fn record(&mut self, r: fmt::Result) {
        if self.status.is_ok() {
            self.status = r;
        }
    }

    fn full(&self) -> bool {
        self.mode == DeviceMode::Full
    }

    fn on_leaf(&mut self, key: &FlatKey, spec: FieldSpec) -> fmt::Result {
        let field = key.field_name();
        let camel = camel_path(&key.path);
        let index = key.index;
        self.has_strings |= spec.is_str;
        self.key_paths.push(key.dotted());

        writeln!(self.fields, "    pub {}: {},", field, spec.ty)?;
        writeln!(self.defaults, "            {}: {},", field, spec.default)?;
        writeln!(self.encode, "        self.{}.encode(out);", field)?;
        writeln!(self.decode, "            {}: {}::Wire::decode(r)?,", field, CODEC)?;

        if !self.full() {
            return Ok(());
        }
        writeln!(self.keys, "    pub struct {};", camel)?;
        writeln!(
            self.leaf_keys,
            "impl {rt}::LeafKey for keys::{camel} {{\n    const INDEX: usize = {index};\n    const PATH: &'static str = {path:?};\n}}\n",
            rt = RT,
            camel = camel,
            index = index,
            path = key.dotted(),
        )?;
        writeln!(
            self.accessors,
            "impl<'a> Accessor<'a, keys::{camel}> {{\n    pub fn lock<R>(&self, f: impl FnOnce({arg}) -> R) -> R {{\n        self.cell.with(|raw| f({borrow}))\n    }}\n}}\n",
            camel = camel,
            arg = spec.borrowed(),
            borrow = spec.borrow_from("raw", &field),
        )?;

        writeln!(self.variants, "    {}({}),", camel, spec.update_payload())?;
        writeln!(self.index_arms, "            Update::{}(_) => {},", camel, index)?;
        if spec.is_str {
            writeln!(
                self.encode_arms,
                "            Update::{}(v) => {}::write_str(&mut out, v),",
                camel, CODEC
            )?;
            writeln!(
                self.decode_arms,
                "            {} => Update::{}({}::read_str(&mut r)?),",
                index, camel, CODEC
            )?;
            writeln!(
                self.apply_arms,
                "            Update::{}(v) => self.{} = {}::bounded(v)?,",
                camel, field, RT
            )?;
        } else {
            writeln!(self.encode_arms, "            Update::{}(v) => v.encode(&mut out),", camel)?;
            writeln!(
                self.decode_arms,
                "            {} => Update::{}({}::Wire::decode(&mut r)?),",
                index, camel, CODEC
            )?;
            if spec.min.is_none() && spec.max.is_none() {
                writeln!(self.apply_arms, "            Update::{}(v) => self.{} = v,", camel, field)?;
            } else {
                writeln!(self.apply_arms, "            Update::{}(v) => {{", camel)?;
                if let Some(min) = spec.min {
                    writeln!(
                        self.apply_arms,
                        "                if v < {min}{ty} {{\n                    return Err({rt}::UpdateError::TooSmall {{ min: {min} }});\n                }}",
                        min = min,
                        ty = spec.ty,
                        rt = RT,
                    )?;
                }
                if let Some(max) = spec.max {
                    writeln!(
                        self.apply_arms,
                        "                if v > {max}{ty} {{\n                    return Err({rt}::UpdateError::TooLarge {{ max: {max} }});\n                }}",
                        max = max,
                        ty = spec.ty,
                        rt = RT,
                    )?;
                }
                writeln!(self.apply_arms, "                self.{} = v;\n            }}", field)?;
            }
        }
        Ok(())
    }

    fn on_enum(&mut self, leaf: &EnumLeaf) -> fmt::Result {
        let name = leaf.name();
        let out = &mut self.enums;
        writeln!(out, "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]")?;
        writeln!(out, "pub enum {} {{", name)?;
        for v in leaf.variants() {
            if v.name != v.ident {
                writeln!(out, "    {}", doc_attr(&v.name))?;
            }
            if v.is_default {
                writeln!(out, "    #[default]")?;
            }
            writeln!(out, "    {},", v.ident)?;
        }
        writeln!(out, "}}\n")?;

        let count = leaf.variants().len();
        writeln!(out, "impl {} {{", name)?;
        write!(out, "    pub const ALL: [{}; {}] = [", name, count)?;
        for (i, v) in leaf.variants().iter().enumerate() {
            let sep = if i + 1 == count { "" } else { ", " };
            write!(out, "{}::{}{}", name, v.ident, sep)?;
        }
        writeln!(out, "];\n")?;
        writeln!(out, "    pub fn name(self) -> &'static str {{\n        match self {{")?;
        for v in leaf.variants() {
            writeln!(out, "            {}::{} => {:?},", name, v.ident, v.name)?;
        }
        writeln!(out, "        }}\n    }}\n")?;
        writeln!(out, "    pub fn discriminant(self) -> u32 {{\n        self as u32\n    }}\n")?;
        writeln!(out, "    pub fn from_discriminant(d: u32) -> Option<Self> {{\n        match d {{")?;
        for (i, v) in leaf.variants().iter().enumerate() {
            writeln!(out, "            {} => Some({}::{}),", i, name, v.ident)?;
        }
        writeln!(out, "            _ => None,\n        }}\n    }}\n}}\n")?;

        writeln!(
            out,
            "impl {codec}::Wire for {name} {{
    fn encode(&self, out: &mut Vec<u8>) {{
        {codec}::write_varuint(out, self.discriminant() as u128);
    }}
    fn decode(r: &mut std::io::Cursor<&[u8]>) -> Result<Self, {codec}::CodecError> {{
        let d = <u32 as {codec}::Wire>::decode(r)?;
        Self::from_discriminant(d).ok_or({codec}::CodecError::InvalidDiscriminant(d))
    }}
}}
",
            codec = CODEC,
            name = name,
        )
    }

    fn on_group(&mut self, path: &[String], children: &[Node]) -> fmt::Result {
        let camel = camel_path(path);
        let view = view_name(path);
        if !path.is_empty() {
            writeln!(self.keys, "    pub struct {};", camel)?;
        }

        let v = &mut self.views;
        writeln!(v, "/// Read-only view of `{}`.", display(path))?;
        writeln!(v, "#[derive(Clone, Copy)]")?;
        writeln!(v, "pub struct {}<'c> {{\n    raw: &'c RawConfig,\n}}\n", view)?;
        writeln!(v, "impl<'c> {}<'c> {{", view)?;
        let mut first = true;
        for child in children {
            if !first {
                writeln!(v)?;
            }
            first = false;
            let cp = child_path(path, child);
            match &child.kind {
                NodeKind::Leaf(leaf) => {
                    let spec = FieldSpec::of(leaf);
                    let ret = if spec.is_str {
                        "&'c str".to_string()
                    } else {
                        format!("&'c {}", spec.ty)
                    };
                    writeln!(
                        v,
                        "    pub fn {}(&self) -> {} {{\n        {}\n    }}",
                        child.name,
                        ret,
                        spec.borrow_from("self.raw", &field_name(&cp))
                    )?;
                }
                NodeKind::Group(_) => {
                    writeln!(
                        v,
                        "    pub fn {}(&self) -> {}<'c> {{\n        {} {{ raw: self.raw }}\n    }}",
                        child.name,
                        view_name(&cp),
                        view_name(&cp)
                    )?;
                }
            }
        }
        writeln!(v, "}}\n")?;

        let a = &mut self.accessors;
        writeln!(a, "impl<'a> Accessor<'a, keys::{}> {{", camel)?;
        writeln!(
            a,
            "    pub fn lock<R>(&self, f: impl FnOnce({}<'_>) -> R) -> R {{\n        self.cell.with(|raw| f({} {{ raw }}))\n    }}",
            view, view
        )?;
        for child in children {
            writeln!(
                a,
                "\n    pub fn {}(&self) -> Accessor<'a, keys::{}> {{\n        accessor(self.cell)\n    }}",
                child.name,
                camel_path(&child_path(path, child))
            )?;
        }
        writeln!(a, "}}\n")
    }

    fn render(&self, schema: &Schema, leaf_count: usize) -> Result<String, GenerateError> {
        let mut out = String::new();
        let lt = if self.has_strings { "<'a>" } else { "" };
        let update_ty = if self.has_strings { "Update<'_>" } else { "Update" };

        writeln!(
            out,
            "// @generated by confgen from schema `{}` version {} ({:?}). Do not edit.\n",
            schema.name, schema.version, self.mode
        )?;
        writeln!(out, "use {}::Wire as _;\n", CODEC)?;
        writeln!(out, "pub const VERSION: u32 = {};", schema.version)?;
        writeln!(out, "/// Upper bound on a serialized blob, version prefix included.")?;
        writeln!(out, "pub const MAX_SERIALIZED_LEN: usize = {};", schema.max_serialized_len())?;
        writeln!(out, "pub const LEAF_COUNT: usize = {};", leaf_count)?;
        writeln!(out, "/// Dotted path of every leaf, by flattened index.")?;
        write!(out, "pub const KEY_PATHS: [&str; LEAF_COUNT] = [")?;
        for (i, p) in self.key_paths.iter().enumerate() {
            let sep = if i + 1 == self.key_paths.len() { "" } else { ", " };
            write!(out, "{:?}{}", p, sep)?;
        }
        writeln!(out, "];\n")?;

        out.push_str(&self.enums);

        writeln!(out, "/// Every leaf of `{}`, flattened in index order.", schema.name)?;
        writeln!(out, "#[allow(non_snake_case)]")?;
        writeln!(out, "#[derive(Debug, Clone, PartialEq, Eq)]")?;
        writeln!(out, "pub struct RawConfig {{\n{}}}\n", self.fields)?;
        writeln!(
            out,
            "impl Default for RawConfig {{\n    fn default() -> Self {{\n        RawConfig {{\n{}        }}\n    }}\n}}\n",
            self.defaults
        )?;
        writeln!(
            out,
            "impl {codec}::Wire for RawConfig {{
    fn encode(&self, out: &mut Vec<u8>) {{
{encode}    }}

    fn decode(r: &mut std::io::Cursor<&[u8]>) -> Result<Self, {codec}::CodecError> {{
        Ok(RawConfig {{
{decode}        }})
    }}
}}

impl {rt}::Versioned for RawConfig {{
    const VERSION: u32 = VERSION;
    const MAX_SERIALIZED_LEN: usize = MAX_SERIALIZED_LEN;
}}

impl RawConfig {{
    /// `[version u32 LE][fields]`.
    pub fn serialize(&self) -> Vec<u8> {{
        <Self as {rt}::Versioned>::serialize(self)
    }}

    pub fn deserialize(bytes: &[u8]) -> Result<Self, confgen::frame::DeserializeError> {{
        <Self as {rt}::Versioned>::deserialize(bytes)
    }}

    pub fn load_or_default(bytes: Option<&[u8]>) -> Self {{
        <Self as {rt}::Versioned>::load_or_default(bytes)
    }}
}}
",
            codec = CODEC,
            rt = RT,
            encode = self.encode,
            decode = self.decode,
        )?;

        if !self.full() {
            return Ok(out);
        }

        writeln!(out, "/// Zero-sized key types, one per schema node.")?;
        writeln!(out, "pub mod keys {{\n    pub struct Root;\n{}}}\n", self.keys)?;
        out.push_str(&self.leaf_keys);
        writeln!(
            out,
            "/// Handle on one node of the configuration held in a `ConfigCell`.
pub struct Accessor<'a, K> {{
    cell: &'a {rt}::ConfigCell<RawConfig>,
    _key: core::marker::PhantomData<K>,
}}

impl<K> Clone for Accessor<'_, K> {{
    fn clone(&self) -> Self {{
        *self
    }}
}}

impl<K> Copy for Accessor<'_, K> {{}}

fn accessor<K>(cell: &{rt}::ConfigCell<RawConfig>) -> Accessor<'_, K> {{
    Accessor {{
        cell,
        _key: core::marker::PhantomData,
    }}
}}

pub fn root(cell: &{rt}::ConfigCell<RawConfig>) -> Accessor<'_, keys::Root> {{
    accessor(cell)
}}

impl<K: {rt}::LeafKey> Accessor<'_, K> {{
    /// Change notifications for this leaf; `None` when the cell has no free slot.
    pub fn subscribe(&self) -> Option<{rt}::Subscription> {{
        self.cell.subscribe(K::INDEX)
    }}
}}
",
            rt = RT
        )?;
        out.push_str(&self.accessors);
        out.push_str(&self.views);

        writeln!(out, "/// One leaf assignment, as carried by an update message.")?;
        writeln!(out, "#[derive(Debug, Clone, Copy, PartialEq, Eq)]")?;
        writeln!(out, "pub enum Update{} {{\n{}}}\n", lt, self.variants)?;
        let (index_body, encode_body, apply_body) = if leaf_count == 0 {
            ("        match *self {}\n".to_string(), "        match *self {}\n".to_string(), "        match update {}\n".to_string())
        } else {
            (
                format!("        match self {{\n{}        }}\n", self.index_arms),
                format!("        match self {{\n{}        }}\n", self.encode_arms),
                format!("        match update {{\n{}        }}\n        Ok(update.index())\n", self.apply_arms),
            )
        };
        writeln!(
            out,
            "impl{lt} Update{lt} {{
    /// Flattened index of the leaf this update targets.
    pub fn index(&self) -> usize {{
{index_body}    }}

    /// `[index varuint][value]`.
    pub fn encode(&self) -> Vec<u8> {{
        let mut out = confgen::frame::begin_update(self.index());
{encode_body}        out
    }}

    pub fn decode(bytes: &{a}[u8]) -> Result<Self, {codec}::CodecError> {{
        let mut r = std::io::Cursor::new(bytes);
        let update = match confgen::frame::read_update_index(&mut r)? {{
{decode_arms}            other => return Err({codec}::CodecError::UnknownIndex(other)),
        }};
        {codec}::finish(&r)?;
        Ok(update)
    }}
}}

impl RawConfig {{
    /// Assign one leaf if the value is within its bounds. Returns the leaf index;
    /// on error the record is unchanged.
    pub fn apply(&mut self, update: {update_ty}) -> Result<usize, {rt}::UpdateError> {{
{apply_body}    }}
}}

/// Apply `update` under the cell's lock, then notify the leaf's subscribers.
pub fn apply_update(
    cell: &{rt}::ConfigCell<RawConfig>,
    update: {update_ty},
) -> Result<usize, {rt}::UpdateError> {{
    cell.modify(|raw| raw.apply(update))
}}",
            lt = lt,
            a = if self.has_strings { "'a " } else { "" },
            codec = CODEC,
            rt = RT,
            update_ty = update_ty,
            index_body = index_body,
            encode_body = encode_body,
            decode_arms = self.decode_arms,
            apply_body = apply_body,
        )?;
        Ok(out)
    }
}

fn display(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}

impl Visitor for DeviceEmitter {
    fn start_nested(&mut self, path: &[String], children: &[Node]) {
        if self.full() {
            let r = self.on_group(path, children);
            self.record(r);
        }
    }

    fn string_leaf(&mut self, key: &FlatKey, leaf: &StringLeaf) {
        let r = self.on_leaf(key, FieldSpec::string(leaf));
        self.record(r);
    }

    fn integer_leaf(&mut self, key: &FlatKey, leaf: &IntegerLeaf) {
        let r = self.on_leaf(key, FieldSpec::integer(leaf));
        self.record(r);
    }

    fn enum_leaf(&mut self, key: &FlatKey, leaf: &EnumLeaf) {
        let r = self.on_enum(leaf).and_then(|_| self.on_leaf(key, FieldSpec::enumeration(leaf)));
        self.record(r);
    }

    fn boolean_leaf(&mut self, key: &FlatKey, leaf: &BooleanLeaf) {
        let r = self.on_leaf(key, FieldSpec::boolean(leaf));
        self.record(r);
    }
}
