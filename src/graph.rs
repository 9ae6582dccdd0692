//! Graph arena: every node of one compile request, wired by id.
//!
//! Building happens in passes over the full node list, so a processor may
//! name inputs declared before or after it:
//! 1. index every node by id (ids must be unique),
//! 2. resolve each declared input id to a node key (absent ids stay
//!    unresolved and surface as `UnknownInput` only when used),
//! 3. configure table sources against the schema catalog.
//!
//! The graph is read-only afterwards. Nothing is cached: schemas and SQL are
//! recomputed on every request.

use crate::Result;
use crate::diagnostics;
use crate::dialect::{Dialect, Strategy};
use crate::error::CompileError;
use crate::node::{InputRef, Node, NodeKey, NodeKind, NodeRef};
use crate::spec::{NodeSpec, SchemaCatalog};
use crate::statement::{self, Page};

use std::collections::HashMap;

#[derive(Debug)]
pub struct Graph {
    nodes: Vec<Node>,
    index: HashMap<String, NodeKey>,
    dialect: Dialect,
    strategy: Strategy,
}

impl Graph {
    /// Instantiate, wire and configure one node per spec. The statement
    /// strategy starts at the dialect's default.
    pub fn build(specs: Vec<NodeSpec>, catalog: &SchemaCatalog, dialect: Dialect) -> Result<Self> {
        let mut index = HashMap::with_capacity(specs.len());
        for (pos, spec) in specs.iter().enumerate() {
            if index.insert(spec.id.clone(), NodeKey(pos)).is_some() {
                return Err(CompileError::DuplicateNodeId(spec.id.clone()));
            }
        }

        let mut nodes = Vec::with_capacity(specs.len());
        for spec in specs {
            let inputs = spec
                .inputs
                .into_iter()
                .map(|id| {
                    let key = index.get(&id).copied();
                    if key.is_none() {
                        log::debug!("node '{}': input '{}' is not in the graph", spec.id, id);
                    }
                    InputRef { id, key }
                })
                .collect();
            let mut kind = spec.kind;
            if let NodeKind::TableSource(source) = &mut kind {
                if !source.configure(catalog) {
                    diagnostics::warn(format!(
                        "node '{}': table {:?} not found in the schema catalog",
                        spec.id,
                        source.table.as_deref().unwrap_or_default()
                    ));
                }
            }
            nodes.push(Node {
                id: spec.id,
                dialect,
                inputs,
                kind,
            });
        }
        log::debug!("built graph of {} nodes for {}", nodes.len(), dialect);

        Ok(Self {
            nodes,
            index,
            dialect,
            strategy: dialect.default_strategy(),
        })
    }

    /// Override how statements reference upstream nodes.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Result<NodeRef<'_>> {
        self.index
            .get(id)
            .map(|&key| NodeRef::new(self, key))
            .ok_or_else(|| CompileError::UnknownNode(id.to_string()))
    }

    /// Every node in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeRef<'_>> {
        (0..self.nodes.len()).map(|i| NodeRef::new(self, NodeKey(i)))
    }

    pub(crate) fn node_at(&self, key: NodeKey) -> &Node {
        &self.nodes[key.0]
    }

    /// Statement returning the target's rows, optionally one page of them.
    pub fn fetch_statement(&self, target: &str, page: Option<Page>) -> Result<String> {
        statement::fetch(self.node(target)?, page)
    }

    /// Statement returning the target's row count.
    pub fn count_statement(&self, target: &str) -> Result<String> {
        statement::count(self.node(target)?)
    }
}
