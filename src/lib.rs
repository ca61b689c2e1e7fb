//! # confgen: settings-tree schema compiler and wire codec
//!
//! A small language for describing a device's settings as a tree of groups and
//! typed leaves, with a PEST grammar, a linter, and backends that emit matching
//! device (Rust) and client (TypeScript) code over one compact binary codec.
//!
//! ## Schema structure
//!
//! - **Groups**: named, ordered containers; they never hold values themselves
//! - **Leaves**: `string(N)`, `u8`..`u128`, `i8`..`i128` with optional `[min..max]`,
//!   `enum Name { ... }` with exactly one `default` variant, `bool`
//! - **Version**: written as a 4-byte little-endian prefix of every stored blob
//!
//! Depth-first traversal in declaration order assigns every leaf a flattened index.
//! That index is the wire order of a blob and the key of an update message.
//!
//! ## Example schema
//!
//! ```text
//! schema keyer version 1 {
//!     name: string(3) = "abc";
//!     keyer {
//!         wpm: u16 = 20 [5..60];
//!         mode: enum IambicMode { Straight, IambicA default, IambicB };
//!     }
//!     expert: bool = true;
//! }
//! ```
//!
//! ## Wire format
//!
//! - `u8`/`i8`: one raw byte; `bool`: one byte, `0` or `1`
//! - wider unsigned integers and enum discriminants: LEB128
//! - wider signed integers: ZigZag, then LEB128
//! - strings: LEB128 byte length, then UTF-8
//!
//! ## Usage
//!
//! Build scripts call [`parser::parse_file`] and [`backend::generate_device`] and
//! `include!` the result; the `confgen` binary does the same from the command line.
//! See `tests/integration.rs` and the `demos/keyer-settings` crate for full examples.

pub mod ast;
pub mod backend;
pub mod client;
pub mod codec;
pub mod dump;
pub mod frame;
pub mod lint;
pub mod parser;
pub mod runtime;
pub mod value;
pub mod walk;

pub use ast::{Leaf, Node, NodeKind, Schema, SchemaError};
pub use backend::{
    generate_client, generate_device, generate_migration, DeviceMode, GenerateError,
    MigrationModules,
};
pub use client::{ClientError, ClientLayout};
pub use codec::{CodecError, Wire};
pub use frame::DeserializeError;
pub use parser::{parse, parse_file};
pub use runtime::{ConfigCell, Subscription, UpdateError, Versioned};
pub use value::Value;
pub use walk::{flatten, walk, FlatKey, Visitor};
