//! Migration backend: field-wise conversions between two schema versions.
//!
//! Emits `up(&old::RawConfig) -> new::RawConfig` and `down(&new::RawConfig) ->
//! old::RawConfig`, where `old` and `new` are the module paths holding each
//! version's [`DeviceMode::Migration`](super::DeviceMode::Migration) artifact.
//! Each conversion starts from the target's defaults and carries over every leaf
//! that exists at the same path with the same kind and whose value is legal in the
//! target: strings that fit, integers that fit the target type and bounds, enum
//! values whose variant ident still exists, booleans as-is.

use super::{ensure_valid, GenerateError};
use crate::ast::*;
use crate::walk::{flatten, FlatKey};
use std::collections::HashMap;
use std::fmt::Write;

/// Rust module paths of the two record versions, e.g. `crate::v1` and `crate::v2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationModules {
    pub old: String,
    pub new: String,
}

impl MigrationModules {
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        MigrationModules {
            old: old.into(),
            new: new.into(),
        }
    }
}

pub fn generate_migration(
    old: &Schema,
    new: &Schema,
    modules: &MigrationModules,
) -> Result<String, GenerateError> {
    ensure_valid(old)?;
    ensure_valid(new)?;
    let mut out = String::new();
    writeln!(
        out,
        "// @generated by confgen: `{}` version {} <-> `{}` version {}. Do not edit.\n",
        old.name, old.version, new.name, new.version
    )?;
    write_conversion(&mut out, "up", old, &modules.old, new, &modules.new)?;
    writeln!(out)?;
    write_conversion(&mut out, "down", new, &modules.new, old, &modules.old)?;
    log::debug!(
        "migration backend: {} v{} <-> v{}, {} bytes of source",
        new.name,
        old.version,
        new.version,
        out.len()
    );
    Ok(out)
}

fn write_conversion(
    out: &mut String,
    name: &str,
    from: &Schema,
    from_mod: &str,
    to: &Schema,
    to_mod: &str,
) -> Result<(), GenerateError> {
    let sources: HashMap<String, (FlatKey, &Leaf)> = flatten(from)
        .into_iter()
        .map(|(key, leaf)| (key.dotted(), (key, leaf)))
        .collect();

    writeln!(
        out,
        "/// Version {} to version {}. Leaves that cannot be carried over keep their default.",
        from.version, to.version
    )?;
    writeln!(out, "#[allow(irrefutable_let_patterns, clippy::useless_conversion)]")?;
    writeln!(
        out,
        "pub fn {}(from: &{}::RawConfig) -> {}::RawConfig {{",
        name, from_mod, to_mod
    )?;
    writeln!(out, "    let mut to = {}::RawConfig::default();", to_mod)?;
    let mut carried = 0usize;
    for (key, target) in flatten(to) {
        let field = key.field_name();
        let Some((src_key, source)) = sources.get(&key.dotted()) else {
            writeln!(out, "    // {}: not in version {}", key.dotted(), from.version)?;
            continue;
        };
        let src = format!("from.{}", src_key.field_name());
        let dst = format!("to.{}", field);
        match (source, target) {
            (Leaf::String(_), Leaf::String(_)) => {
                writeln!(
                    out,
                    "    if let Ok(v) = confgen::runtime::bounded({}.as_str()) {{\n        {} = v;\n    }}",
                    src, dst
                )?;
            }
            (Leaf::Integer(_), Leaf::Integer(t)) => {
                let ty = t.rust_type();
                writeln!(out, "    if let Ok(v) = {}::try_from({}) {{", ty, src)?;
                match range_check(t) {
                    Some((lo, hi)) => writeln!(
                        out,
                        "        if ({lo}{ty}..={hi}{ty}).contains(&v) {{\n            {dst} = v;\n        }}",
                        lo = lo,
                        hi = hi,
                        ty = ty,
                        dst = dst
                    )?,
                    None => writeln!(out, "        {} = v;", dst)?,
                }
                writeln!(out, "    }}")?;
            }
            (Leaf::Enum(s), Leaf::Enum(t)) => {
                writeln!(out, "    {} = match {} {{", dst, src)?;
                for v in s.variants() {
                    let mapped = if t.variants().iter().any(|tv| tv.ident == v.ident) {
                        format!("{}::{}::{}", to_mod, t.name(), v.ident)
                    } else {
                        dst.clone()
                    };
                    writeln!(out, "        {}::{}::{} => {},", from_mod, s.name(), v.ident, mapped)?;
                }
                writeln!(out, "    }};")?;
            }
            (Leaf::Boolean(_), Leaf::Boolean(_)) => writeln!(out, "    {} = {};", dst, src)?,
            (s, t) => {
                writeln!(
                    out,
                    "    // {}: {} in version {}, {} in version {}",
                    key.dotted(),
                    s.kind_name(),
                    from.version,
                    t.kind_name(),
                    to.version
                )?;
                continue;
            }
        }
        carried += 1;
    }
    writeln!(out, "    to\n}}")?;
    log::debug!("{}: {} leaf/leaves carried over", name, carried);
    Ok(())
}

/// Inclusive range to enforce when it is tighter than the native type.
fn range_check(leaf: &IntegerLeaf) -> Option<(i128, i128)> {
    let (native_lo, native_hi) = leaf.native_range();
    let (lo, hi) = leaf.effective_range();
    let u128_max = !leaf.signed && leaf.width == IntWidth::W128 && leaf.max.is_some();
    (lo > native_lo || hi < native_hi || u128_max).then_some((lo, hi))
}
