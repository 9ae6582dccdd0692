//! Compile a visual graph of data operations into one dialect-correct SQL
//! statement for MySQL, PostgreSQL or SQL Server.
//!
//! The pipeline:
//! - `spec`: serde boundary formats (node documents, schema catalog)
//! - `graph`: arena of nodes built and wired from those documents
//! - `node`: the capability set and the nine node variants
//! - `statement`: fetch/count statement assembly
//! - `dialect`: per-database fragments and type classification
//! - `config`: resolved compile options for the CLI

pub mod config;
pub mod diagnostics;
pub mod dialect;
pub mod error;
pub mod graph;
pub mod node;
pub mod spec;
pub mod statement;

pub use config::CompileConfig;
pub use dialect::{Dialect, Strategy};
pub use error::CompileError;
pub use graph::Graph;
pub use node::{Column, NodeRef, Projection, SortKey};
pub use spec::{NodeSpec, SchemaCatalog};
pub use statement::Page;

pub type Result<T, E = CompileError> = std::result::Result<T, E>;
