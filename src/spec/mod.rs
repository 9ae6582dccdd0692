//! Spec layer: JSON boundary formats consumed by the compiler.
//!
//! This module is intentionally separate from SQL generation.
//! It owns:
//! - node documents (one object per graph node, `Type`-tagged)
//! - the schema catalog supplied by schema discovery

pub mod catalog;
pub mod node;

pub use catalog::{ColumnSchema, SchemaCatalog, TableSchema};
pub use node::{NodeSpec, parse_graph_document};
