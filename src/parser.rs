//! Parse schema source into the [`Schema`] model using PEST.

use crate::ast::*;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;
use std::path::Path;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct SchemaParser;

/// Parse schema source.
pub fn parse(source: &str) -> Result<Schema, SchemaError> {
    let pairs = SchemaParser::parse(Rule::schema, source)
        .map_err(|e| SchemaError::Parse(e.to_string()))?;
    let pair = pairs
        .into_iter()
        .next()
        .ok_or_else(|| SchemaError::Parse("empty parse".to_string()))?;
    let schema = build_schema(pair)?;
    log::debug!(
        "parsed schema {} version {} ({} top-level node(s))",
        schema.name,
        schema.version,
        schema.children.len()
    );
    Ok(schema)
}

/// Read and parse a schema file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Schema, SchemaError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .map_err(|e| SchemaError::Io(format!("{}: {}", path.display(), e)))?;
    parse(&source)
}

fn err(msg: impl Into<String>) -> SchemaError {
    SchemaError::Parse(msg.into())
}

fn build_schema(pair: Pair<Rule>) -> Result<Schema, SchemaError> {
    let mut name = None;
    let mut version = None;
    let mut children = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = Some(inner.as_str().to_string()),
            Rule::uint => version = Some(parse_uint::<u32>(inner.as_str(), "version")?),
            Rule::group | Rule::leaf => children.push(build_node(inner)?),
            _ => {}
        }
    }
    Ok(Schema {
        name: name.ok_or_else(|| err("schema: missing name"))?,
        version: version.ok_or_else(|| err("schema: missing version"))?,
        children,
    })
}

fn build_node(pair: Pair<Rule>) -> Result<Node, SchemaError> {
    let rule = pair.as_rule();
    let mut it = pair.into_inner();
    let name = it.next().ok_or_else(|| err("node: missing name"))?.as_str().to_string();
    match rule {
        Rule::group => {
            let children = it.map(build_node).collect::<Result<Vec<_>, _>>()?;
            Ok(Node::group(name, children))
        }
        Rule::leaf => {
            let ty = it.next().ok_or_else(|| err(format!("leaf {}: missing type", name)))?;
            Ok(Node::leaf(name, build_leaf(ty)?))
        }
        other => Err(err(format!("unexpected node rule {:?}", other))),
    }
}

fn build_leaf(pair: Pair<Rule>) -> Result<Leaf, SchemaError> {
    match pair.as_rule() {
        Rule::string_type => build_string(pair).map(Leaf::from),
        Rule::bool_type => {
            let default = pair
                .into_inner()
                .next()
                .map(|p| p.as_str() == "true")
                .unwrap_or(false);
            Ok(BooleanLeaf::new(default).into())
        }
        Rule::int_type => build_integer(pair).map(Leaf::from),
        Rule::enum_type => build_enum(pair).map(Leaf::from),
        other => Err(err(format!("unexpected leaf type {:?}", other))),
    }
}

fn build_string(pair: Pair<Rule>) -> Result<StringLeaf, SchemaError> {
    let mut leaf = StringLeaf::new(0);
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::uint => leaf.max_length = parse_uint::<usize>(inner.as_str(), "string capacity")?,
            Rule::string_lit => leaf.default = Some(unescape(inner)?),
            _ => {}
        }
    }
    Ok(leaf)
}

/// An absent default is zero; the lint reports it if that falls outside the bounds.
fn build_integer(pair: Pair<Rule>) -> Result<IntegerLeaf, SchemaError> {
    let mut it = pair.into_inner();
    let kind = it.next().ok_or_else(|| err("integer: missing type"))?.as_str();
    let (sign, bits) = kind.split_at(1);
    let width = bits
        .parse()
        .ok()
        .and_then(IntWidth::from_bits)
        .ok_or_else(|| err(format!("unknown integer type {}", kind)))?;
    let mut leaf = if sign == "i" {
        IntegerLeaf::signed(width, 0)
    } else {
        IntegerLeaf::unsigned(width, 0)
    };
    for inner in it {
        match inner.as_rule() {
            Rule::int_lit => leaf.default = parse_int(inner.as_str())?,
            Rule::bounds => {
                for bound in inner.into_inner() {
                    let lit = bound
                        .clone()
                        .into_inner()
                        .next()
                        .ok_or_else(|| err("range: missing literal"))?;
                    let v = parse_int(lit.as_str())?;
                    match bound.as_rule() {
                        Rule::range_min => leaf.min = Some(v),
                        Rule::range_max => leaf.max = Some(v),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    Ok(leaf)
}

fn build_enum(pair: Pair<Rule>) -> Result<EnumLeaf, SchemaError> {
    let mut name = None;
    let mut variants = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = Some(inner.as_str().to_string()),
            Rule::variant => {
                let mut it = inner.into_inner();
                let ident = it.next().ok_or_else(|| err("variant: missing ident"))?;
                let mut variant = EnumVariant::new(ident.as_str());
                for part in it {
                    match part.as_rule() {
                        Rule::string_lit => variant = variant.labelled(unescape(part)?),
                        Rule::default_flag => variant = variant.as_default(),
                        _ => {}
                    }
                }
                variants.push(variant);
            }
            _ => {}
        }
    }
    EnumLeaf::new(name.ok_or_else(|| err("enum: missing name"))?, variants)
}

fn parse_uint<T: std::str::FromStr>(s: &str, what: &str) -> Result<T, SchemaError> {
    s.parse().map_err(|_| err(format!("{} {} out of range", what, s)))
}

/// Decimal or `0x` hex, optionally negative, into `i128`.
fn parse_int(s: &str) -> Result<i128, SchemaError> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u128::from_str_radix(hex, 16),
        None => digits.parse::<u128>(),
    };
    let magnitude = parsed.map_err(|_| err(format!("integer literal {} out of range", s)))?;
    let out_of_range = || err(format!("integer literal {} does not fit i128", s));
    if negative {
        if magnitude == 1u128 << 127 {
            Ok(i128::MIN)
        } else {
            i128::try_from(magnitude).map(|m| -m).map_err(|_| out_of_range())
        }
    } else {
        i128::try_from(magnitude).map_err(|_| out_of_range())
    }
}

fn unescape(pair: Pair<Rule>) -> Result<String, SchemaError> {
    let raw = pair
        .into_inner()
        .next()
        .map(|p| p.as_str())
        .unwrap_or_default();
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some(c @ ('"' | '\\')) => out.push(c),
            Some(other) => return Err(err(format!("unknown escape \\{} in {:?}", other, raw))),
            None => return Err(err("dangling backslash in string literal")),
        }
    }
    Ok(out)
}
