//! Client backend: emits a TypeScript module over the `./wire` runtime.
//!
//! The module exports `VERSION`, a `KEYS` path-to-index map, one `enum` per schema
//! enumeration, an `interface Config` keyed by flattened index, `defaults()`,
//! `decode(bytes)` and `encodeUpdate(index, value)`. Values are read and written with
//! the same primitives the device uses; see [`WirePrimitive`].

use super::{ensure_valid, GenerateError};
use crate::ast::*;
use crate::client::WirePrimitive;
use crate::walk::{walk, FlatKey, Visitor};
use std::collections::BTreeMap;
use std::fmt::{self, Write};

/// The `./wire` module every generated client imports.
pub const WIRE_RUNTIME_TS: &str = include_str!("wire.ts");

pub fn generate_client(schema: &Schema) -> Result<String, GenerateError> {
    ensure_valid(schema)?;
    let mut emitter = ClientEmitter::new();
    let leaf_count = walk(schema, &mut emitter);
    emitter.status?;
    let out = emitter.render(schema)?;
    log::debug!(
        "client backend: schema {} v{}, {} leaves, {} bytes of source",
        schema.name,
        schema.version,
        leaf_count,
        out.len()
    );
    Ok(out)
}

/// TypeScript type and reader call for one leaf.
fn ts_type(leaf: &Leaf) -> String {
    match leaf {
        Leaf::String(_) => "string".to_string(),
        Leaf::Boolean(_) => "boolean".to_string(),
        Leaf::Enum(e) => e.name().to_string(),
        Leaf::Integer(i) if i.width.bits() > 32 => "bigint".to_string(),
        Leaf::Integer(_) => "number".to_string(),
    }
}

fn read_call(leaf: &Leaf) -> String {
    match (leaf, WirePrimitive::of(leaf)) {
        (Leaf::Enum(e), _) => format!("r.discriminant({}) as {}", e.variants().len(), e.name()),
        (Leaf::Integer(i), WirePrimitive::VarUint { wide }) => {
            format!("r.varuint{}({})", if wide { "Big" } else { "" }, i.width.bits())
        }
        (Leaf::Integer(i), WirePrimitive::VarInt { wide }) => {
            format!("r.varint{}({})", if wide { "Big" } else { "" }, i.width.bits())
        }
        (_, WirePrimitive::Byte { signed }) => format!("r.{}()", if signed { "i8" } else { "u8" }),
        (_, WirePrimitive::Str { max_len }) => format!("r.string({})", max_len),
        (_, WirePrimitive::Bool) => "r.bool()".to_string(),
        (_, WirePrimitive::VarUint { .. }) => "r.varuint()".to_string(),
        (_, WirePrimitive::VarInt { .. }) => "r.varint()".to_string(),
    }
}

/// Writer statement for a value of `primitive`, as `case` body.
fn write_call(primitive: WirePrimitive) -> &'static str {
    match primitive {
        WirePrimitive::Byte { signed: false } => "w.u8(value as number);",
        WirePrimitive::Byte { signed: true } => "w.i8(value as number);",
        WirePrimitive::VarUint { wide: false } => "w.varuint(value as number);",
        WirePrimitive::VarUint { wide: true } => "w.varuintBig(value as bigint);",
        WirePrimitive::VarInt { wide: false } => "w.varint(value as number);",
        WirePrimitive::VarInt { wide: true } => "w.varintBig(value as bigint);",
        WirePrimitive::Str { .. } => "w.string(value as string);",
        WirePrimitive::Bool => "w.bool(value as boolean);",
    }
}

/// `text` made safe for a single-line `/** */` comment.
fn doc_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .replace("*/", "*\\/")
}

fn default_literal(leaf: &Leaf) -> String {
    match leaf {
        Leaf::String(s) => format!("{:?}", s.default_value()),
        Leaf::Boolean(b) => b.default.to_string(),
        Leaf::Enum(e) => format!("{}.{}", e.name(), e.default_variant().ident),
        Leaf::Integer(i) if i.width.bits() > 32 => format!("{}n", i.default),
        Leaf::Integer(i) => i.default.to_string(),
    }
}

struct ClientEmitter {
    status: fmt::Result,
    keys: String,
    enums: String,
    fields: String,
    defaults: String,
    reads: String,
    /// Indices grouped by the writer call that encodes them, in first-seen order.
    cases: BTreeMap<&'static str, Vec<usize>>,
    case_order: Vec<&'static str>,
}

impl ClientEmitter {
    fn new() -> Self {
        ClientEmitter {
            status: Ok(()),
            keys: String::new(),
            enums: String::new(),
            fields: String::new(),
            defaults: String::new(),
            reads: String::new(),
            cases: BTreeMap::new(),
            case_order: Vec::new(),
        }
    }

    fn on_leaf(&mut self, key: &FlatKey, leaf: &Leaf) -> fmt::Result {
        if let Leaf::Enum(e) = leaf {
            writeln!(self.enums, "export enum {} {{", e.name())?;
            for (i, v) in e.variants().iter().enumerate() {
                if v.name != v.ident {
                    writeln!(self.enums, "  /** {} */", doc_text(&v.name))?;
                }
                writeln!(self.enums, "  {} = {},", v.ident, i)?;
            }
            writeln!(self.enums, "}}\n")?;
        }
        let index = key.index;
        writeln!(self.keys, "  {:?}: {},", key.dotted(), index)?;
        writeln!(self.fields, "  /** {} */\n  {}: {};", key.dotted(), index, ts_type(leaf))?;
        writeln!(self.defaults, "    {}: {},", index, default_literal(leaf))?;
        writeln!(self.reads, "    {}: {},", index, read_call(leaf))?;
        let call = write_call(WirePrimitive::of(leaf));
        let slot = self.cases.entry(call).or_default();
        if slot.is_empty() {
            self.case_order.push(call);
        }
        slot.push(index);
        Ok(())
    }

    fn record(&mut self, r: fmt::Result) {
        if self.status.is_ok() {
            self.status = r;
        }
    }

    fn render(&self, schema: &Schema) -> Result<String, GenerateError> {
        let mut out = String::new();
        writeln!(
            out,
            "// @generated by confgen from schema `{}` version {}. Do not edit.\n",
            schema.name, schema.version
        )?;
        writeln!(out, "import {{ Reader, Writer, WireError, readVersion }} from \"./wire\";\n")?;
        writeln!(out, "export const VERSION = {};\n", schema.version)?;
        writeln!(out, "/** Dotted leaf path to flattened index. */")?;
        writeln!(out, "export const KEYS = {{\n{}}} as const;\n", self.keys)?;
        writeln!(out, "export type Key = keyof typeof KEYS;\n")?;
        out.push_str(&self.enums);
        writeln!(out, "/** One entry per leaf, keyed by flattened index. */")?;
        writeln!(out, "export interface Config {{\n{}}}\n", self.fields)?;
        writeln!(
            out,
            "export function defaults(): Config {{\n  return {{\n{}  }};\n}}\n",
            self.defaults
        )?;
        writeln!(
            out,
            "/** Decode a versioned blob: prefix first, then every leaf in index order. */
export function decode(bytes: Uint8Array): Config {{
  const r = new Reader(bytes);
  readVersion(r, VERSION);
  const config: Config = {{
{}  }};
  r.finish();
  return config;
}}
",
            self.reads
        )?;
        writeln!(out, "/** `[index varuint][value]` for one leaf. */")?;
        writeln!(
            out,
            "export function encodeUpdate<I extends keyof Config>(index: I, value: Config[I]): Uint8Array {{"
        )?;
        writeln!(out, "  const w = new Writer();\n  w.varuint(index);\n  switch (index) {{")?;
        for call in &self.case_order {
            for index in self.cases.get(call).into_iter().flatten() {
                writeln!(out, "    case {}:", index)?;
            }
            writeln!(out, "      {}\n      break;", call)?;
        }
        writeln!(
            out,
            "    default:\n      throw new WireError(`unknown leaf index ${{index}}`);\n  }}\n  return w.finish();\n}}"
        )?;
        Ok(out)
    }
}

impl Visitor for ClientEmitter {
    fn string_leaf(&mut self, key: &FlatKey, leaf: &StringLeaf) {
        let r = self.on_leaf(key, &Leaf::String(leaf.clone()));
        self.record(r);
    }

    fn integer_leaf(&mut self, key: &FlatKey, leaf: &IntegerLeaf) {
        let r = self.on_leaf(key, &Leaf::Integer(leaf.clone()));
        self.record(r);
    }

    fn enum_leaf(&mut self, key: &FlatKey, leaf: &EnumLeaf) {
        let r = self.on_leaf(key, &Leaf::Enum(leaf.clone()));
        self.record(r);
    }

    fn boolean_leaf(&mut self, key: &FlatKey, leaf: &BooleanLeaf) {
        let r = self.on_leaf(key, &Leaf::Boolean(*leaf));
        self.record(r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::new(
            "sample",
            2,
            vec![
                Node::leaf("name", StringLeaf::new(20)),
                Node::group(
                    "keyer",
                    vec![
                        Node::leaf("wpm", IntegerLeaf::unsigned(IntWidth::W8, 20)),
                        Node::leaf(
                            "mode",
                            EnumLeaf::new(
                                "Mode",
                                vec![EnumVariant::new("Straight"), EnumVariant::new("IambicA").as_default()],
                            )
                            .unwrap(),
                        ),
                    ],
                ),
                Node::leaf("ppm", IntegerLeaf::signed(IntWidth::W32, -3)),
                Node::leaf("uptime", IntegerLeaf::unsigned(IntWidth::W64, 0)),
                Node::leaf("ssid", StringLeaf::new(32).with_default("keyer")),
            ],
        )
    }

    #[test]
    fn labels_cannot_close_the_doc_comment() {
        let mode = EnumLeaf::new(
            "Shape",
            vec![EnumVariant::new("Plain").labelled("a */ b\nc").as_default()],
        )
        .unwrap();
        let ts = generate_client(&Schema::new("s", 1, vec![Node::leaf("shape", mode)])).unwrap();
        assert!(ts.contains("export enum Shape {\n  /** a *\\/ b c */\n  Plain = 0,\n}"));
    }

    #[test]
    fn keys_and_interface_follow_traversal() {
        let ts = generate_client(&sample()).unwrap();
        assert!(ts.contains("export const VERSION = 2;"));
        assert!(ts.contains("  \"keyer.wpm\": 1,\n  \"keyer.mode\": 2,"));
        assert!(ts.contains("  2: Mode;"));
        assert!(ts.contains("  4: bigint;"));
        assert!(ts.contains("export enum Mode {\n  Straight = 0,\n  IambicA = 1,\n}"));
    }

    #[test]
    fn decode_reads_in_index_order() {
        let ts = generate_client(&sample()).unwrap();
        let body = &ts[ts.find("const config: Config = {").unwrap()..];
        let order: Vec<usize> = (0..5).map(|i| body.find(&format!("    {}: ", i)).unwrap()).collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
        assert!(body.contains("0: r.string(20),"));
        assert!(body.contains("2: r.discriminant(2) as Mode,"));
        assert!(body.contains("3: r.varint(32),"));
        assert!(body.contains("4: r.varuintBig(64),"));
    }

    #[test]
    fn update_cases_grouped_by_primitive() {
        let ts = generate_client(&sample()).unwrap();
        assert!(ts.contains("    case 0:\n    case 5:\n      w.string(value as string);\n      break;"));
        assert!(ts.contains("    case 2:\n      w.varuint(value as number);"));
        assert!(ts.contains("    case 4:\n      w.varuintBig(value as bigint);"));
    }

    #[test]
    fn wire_runtime_is_embedded() {
        assert!(WIRE_RUNTIME_TS.contains("export class Reader"));
        assert!(WIRE_RUNTIME_TS.contains("export function readVersion"));
    }
}
