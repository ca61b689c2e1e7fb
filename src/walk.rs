//! Canonical depth-first traversal of a [`Schema`].
//!
//! This is the only place flattened indices are assigned. Leaves are numbered
//! `0, 1, 2, …` in encounter order, where encounter order is declaration order
//! applied recursively. Groups (the root included, with an empty path) are
//! announced pre-order through [`Visitor::start_nested`] and closed with
//! [`Visitor::end_nested`] after their subtree.
//!
//! Every backend derives its field order, update keys and wire layout from this
//! stream, so two backends given the same schema agree without consulting each other.
//!
//! ## Partial visitors
//!
//! All [`Visitor`] methods have defaults. A kind-specific leaf method that is not
//! overridden falls back to [`Visitor::leaf`], which only sees the [`FlatKey`].
//!
//! ```
//! use confgen::ast::{BooleanLeaf, Node, Schema, StringLeaf};
//! use confgen::walk::{walk, FlatKey, Visitor};
//!
//! struct Paths(Vec<String>);
//! impl Visitor for Paths {
//!     fn leaf(&mut self, key: &FlatKey) {
//!         self.0.push(format!("{}={}", key.dotted(), key.index));
//!     }
//! }
//!
//! let schema = Schema::new("s", 1, vec![
//!     Node::leaf("name", StringLeaf::new(20)),
//!     Node::group("ui", vec![Node::leaf("expert", BooleanLeaf::new(false))]),
//! ]);
//! let mut v = Paths(Vec::new());
//! assert_eq!(walk(&schema, &mut v), 2);
//! assert_eq!(v.0, ["name=0", "ui.expert=1"]);
//! ```

use crate::ast::*;

/// Separator joining path components into a device record field name.
pub const FIELD_SEPARATOR: &str = "__";

/// A leaf's position in the flattened schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlatKey {
    pub index: usize,
    pub path: Vec<String>,
}

impl FlatKey {
    /// `network.home.ssid`
    pub fn dotted(&self) -> String {
        self.path.join(".")
    }

    /// `network__home__ssid`
    pub fn field_name(&self) -> String {
        self.path.join(FIELD_SEPARATOR)
    }
}

pub trait Visitor {
    fn start_nested(&mut self, _path: &[String], _children: &[Node]) {}

    fn end_nested(&mut self, _path: &[String]) {}

    /// Fallback for leaf kinds without a dedicated override.
    fn leaf(&mut self, _key: &FlatKey) {}

    fn string_leaf(&mut self, key: &FlatKey, _leaf: &StringLeaf) {
        self.leaf(key)
    }

    fn integer_leaf(&mut self, key: &FlatKey, _leaf: &IntegerLeaf) {
        self.leaf(key)
    }

    fn enum_leaf(&mut self, key: &FlatKey, _leaf: &EnumLeaf) {
        self.leaf(key)
    }

    fn boolean_leaf(&mut self, key: &FlatKey, _leaf: &BooleanLeaf) {
        self.leaf(key)
    }
}

enum Event<'s, 'p> {
    Start(&'p [String], &'s [Node]),
    End(&'p [String]),
    Leaf(FlatKey, &'s Leaf),
}

fn traverse<'s>(schema: &'s Schema, on: &mut dyn FnMut(Event<'s, '_>)) -> usize {
    let mut path: Vec<String> = Vec::new();
    let mut next = 0usize;
    on(Event::Start(path.as_slice(), &schema.children));
    traverse_children(&schema.children, &mut path, &mut next, on);
    on(Event::End(path.as_slice()));
    next
}

fn traverse_children<'s>(
    children: &'s [Node],
    path: &mut Vec<String>,
    next: &mut usize,
    on: &mut dyn FnMut(Event<'s, '_>),
) {
    for node in children {
        path.push(node.name.clone());
        match &node.kind {
            NodeKind::Group(kids) => {
                on(Event::Start(path.as_slice(), kids));
                traverse_children(kids, path, next, on);
                on(Event::End(path.as_slice()));
            }
            NodeKind::Leaf(leaf) => {
                let key = FlatKey {
                    index: *next,
                    path: path.clone(),
                };
                *next += 1;
                on(Event::Leaf(key, leaf));
            }
        }
        path.pop();
    }
}

/// Walk `schema`, driving `visitor`. Returns the number of leaves.
pub fn walk<V: Visitor + ?Sized>(schema: &Schema, visitor: &mut V) -> usize {
    traverse(schema, &mut |event| match event {
        Event::Start(path, children) => visitor.start_nested(path, children),
        Event::End(path) => visitor.end_nested(path),
        Event::Leaf(key, leaf) => match leaf {
            Leaf::String(l) => visitor.string_leaf(&key, l),
            Leaf::Integer(l) => visitor.integer_leaf(&key, l),
            Leaf::Enum(l) => visitor.enum_leaf(&key, l),
            Leaf::Boolean(l) => visitor.boolean_leaf(&key, l),
        },
    })
}

/// Every leaf with its key, in index order.
pub fn flatten(schema: &Schema) -> Vec<(FlatKey, &Leaf)> {
    let mut out = Vec::new();
    traverse(schema, &mut |event| {
        if let Event::Leaf(key, leaf) = event {
            out.push((key, leaf));
        }
    });
    out
}

/// Every group path (root first, as an empty path) in pre-order.
pub fn group_paths(schema: &Schema) -> Vec<Vec<String>> {
    let mut out = Vec::new();
    traverse(schema, &mut |event| {
        if let Event::Start(path, _) = event {
            out.push(path.to_vec());
        }
    });
    out
}
