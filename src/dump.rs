//! Human-readable layout table: one row per leaf in wire order, plus the worst-case total.

use crate::ast::{Leaf, Schema};
use crate::client::WirePrimitive;
use crate::frame::VERSION_PREFIX_LEN;
use crate::walk::flatten;

/// Short description of a leaf's declared type, e.g. `u16 [5..60]` or `enum Mode(3)`.
pub fn describe_leaf(leaf: &Leaf) -> String {
    match leaf {
        Leaf::String(s) => format!("string({})", s.max_length),
        Leaf::Boolean(_) => "bool".to_string(),
        Leaf::Enum(e) => format!("enum {}({})", e.name(), e.variants().len()),
        Leaf::Integer(i) => match (i.min, i.max) {
            (None, None) => i.rust_type().to_string(),
            (min, max) => format!(
                "{} [{}..{}]",
                i.rust_type(),
                min.map(|v| v.to_string()).unwrap_or_default(),
                max.map(|v| v.to_string()).unwrap_or_default()
            ),
        },
    }
}

/// Render the layout of `schema` as an aligned text table.
pub fn render_layout(schema: &Schema) -> String {
    let rows: Vec<[String; 5]> = flatten(schema)
        .into_iter()
        .map(|(key, leaf)| {
            [
                key.index.to_string(),
                key.dotted(),
                describe_leaf(leaf),
                WirePrimitive::of(leaf).to_string(),
                leaf.max_encoded_len().to_string(),
            ]
        })
        .collect();
    let header = ["index", "path", "type", "wire", "max bytes"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 3);
    lines.push(format!("schema {} version {}", schema.name, schema.version));
    lines.push(format_row(&header.map(String::from), &widths));
    lines.extend(rows.iter().map(|row| format_row(row, &widths)));
    lines.push(format!(
        "{} leaves, at most {} bytes ({} prefix + payload)",
        rows.len(),
        schema.max_serialized_len(),
        VERSION_PREFIX_LEN
    ));
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn format_row(cells: &[String; 5], widths: &[usize; 5]) -> String {
    let line = format!(
        "{:>w0$}  {:<w1$}  {:<w2$}  {:<w3$}  {:>w4$}",
        cells[0],
        cells[1],
        cells[2],
        cells[3],
        cells[4],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
        w3 = widths[3],
        w4 = widths[4]
    );
    line.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    #[test]
    fn layout_lists_leaves_in_wire_order() {
        let schema = Schema::new(
            "keyer",
            1,
            vec![
                Node::leaf("name", StringLeaf::new(3)),
                Node::group(
                    "keyer",
                    vec![Node::leaf("wpm", IntegerLeaf::unsigned(IntWidth::W16, 20).min(5).max(60))],
                ),
                Node::leaf("expert", BooleanLeaf::new(true)),
            ],
        );
        let text = render_layout(&schema);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "schema keyer version 1");
        assert!(lines[2].starts_with("    0  name"));
        assert!(lines[3].contains("keyer.wpm") && lines[3].contains("u16 [5..60]") && lines[3].contains("varuint"));
        assert!(lines[4].contains("expert") && lines[4].ends_with('1'));
        // 4 prefix + (5 + 3) + 3 + 1
        assert_eq!(lines[5], "3 leaves, at most 16 bytes (4 prefix + payload)");
    }

    #[test]
    fn open_bounds_are_left_blank() {
        let leaf = Leaf::Integer(IntegerLeaf::signed(IntWidth::W32, 0).min(-10));
        assert_eq!(describe_leaf(&leaf), "i32 [-10..]");
    }
}
