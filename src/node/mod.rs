//! Node capability set and the closed catalog of node variants.
//!
//! Every node answers the same questions: what columns it outputs, whether
//! its settings are complete, and what `SELECT` defines it over its inputs.
//! Output columns are always aliased positionally (`Column_0`, `Column_1`,
//! ...); logical names live only in the [`Projection`].
//!
//! Nodes live in the [`Graph`] arena and reference their inputs by
//! [`NodeKey`]. A [`NodeRef`] pairs a node with its graph so variant code can
//! walk to its inputs.

pub mod append;
pub mod chart;
pub mod extract;
pub mod filter;
pub mod join;
pub mod select;
pub mod sort;
pub mod summarize;
pub mod table;

use crate::dialect::{Dialect, Strategy};
use crate::error::CompileError;
use crate::graph::Graph;
use crate::Result;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub use append::Append;
pub use chart::ChartProjection;
pub use extract::Extract;
pub use filter::Filter;
pub use join::Join;
pub use select::Select;
pub use sort::Sort;
pub use summarize::Summarize;
pub use table::TableSource;

/// Stable index of a node inside its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey(pub(crate) usize);

/// The nine node variants, selected by the `Type` tag of a node document.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "Type")]
pub enum NodeKind {
    TableSource(TableSource),
    Select(Select),
    Filter(Filter),
    Sort(Sort),
    Join(Join),
    Append(Append),
    Summarize(Summarize),
    Extract(Extract),
    ChartProjection(ChartProjection),
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::TableSource(_) => "TableSource",
            NodeKind::Select(_) => "Select",
            NodeKind::Filter(_) => "Filter",
            NodeKind::Sort(_) => "Sort",
            NodeKind::Join(_) => "Join",
            NodeKind::Append(_) => "Append",
            NodeKind::Summarize(_) => "Summarize",
            NodeKind::Extract(_) => "Extract",
            NodeKind::ChartProjection(_) => "ChartProjection",
        }
    }

    fn variant(&self) -> &dyn Variant {
        match self {
            NodeKind::TableSource(v) => v,
            NodeKind::Select(v) => v,
            NodeKind::Filter(v) => v,
            NodeKind::Sort(v) => v,
            NodeKind::Join(v) => v,
            NodeKind::Append(v) => v,
            NodeKind::Summarize(v) => v,
            NodeKind::Extract(v) => v,
            NodeKind::ChartProjection(v) => v,
        }
    }
}

/// A declared input and, once the graph is wired, the node it resolved to.
#[derive(Debug, Clone)]
pub struct InputRef {
    pub id: String,
    pub key: Option<NodeKey>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub dialect: Dialect,
    pub inputs: Vec<InputRef>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// A node's output schema: names and type names, positionally aligned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Projection(Vec<Column>);

impl Projection {
    pub fn new(columns: Vec<Column>) -> Self {
        Self(columns)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Column> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.0.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|c| c.name.clone()).collect()
    }

    pub fn types(&self) -> Vec<String> {
        self.0.iter().map(|c| c.type_name.clone()).collect()
    }

    /// Position of the first column with this logical name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|c| c.name == name)
    }

    /// Column at `index`, or an out-of-range error naming `node`.
    pub fn column(&self, node: &str, index: usize) -> Result<&Column> {
        self.0
            .get(index)
            .ok_or_else(|| CompileError::column_out_of_range(node, index, self.0.len()))
    }

    pub fn push(&mut self, column: Column) {
        self.0.push(column);
    }

    pub fn extend(&mut self, other: Projection) {
        self.0.extend(other.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortColumn {
    pub index: usize,
    pub direction: SortDirection,
}

/// Row ordering used by the statement assembler for deterministic paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey(pub Vec<SortColumn>);

impl Default for SortKey {
    /// First output column, ascending.
    fn default() -> Self {
        SortKey(vec![SortColumn {
            index: 0,
            direction: SortDirection::Ascending,
        }])
    }
}

impl SortKey {
    pub fn columns(&self) -> &[SortColumn] {
        &self.0
    }

    /// `Column_2 DESC, Column_0 ASC`
    pub fn order_by(&self) -> String {
        self.0
            .iter()
            .map(|c| {
                let dir = match c.direction {
                    SortDirection::Ascending => "ASC",
                    SortDirection::Descending => "DESC",
                };
                format!("{} {}", column_alias(c.index), dir)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Carry this key through a projection that outputs input column
    /// `picks[k]` at position `k`. Columns that were dropped fall out of the
    /// key; an empty result falls back to the default.
    pub fn remap(&self, picks: &[usize]) -> SortKey {
        let remapped: Vec<SortColumn> = self
            .0
            .iter()
            .filter_map(|c| {
                picks.iter().position(|&i| i == c.index).map(|pos| SortColumn {
                    index: pos,
                    direction: c.direction,
                })
            })
            .collect();
        if remapped.is_empty() {
            SortKey::default()
        } else {
            SortKey(remapped)
        }
    }
}

/// Positional alias every node uses for its output columns.
pub fn column_alias(index: usize) -> String {
    format!("Column_{}", index)
}

/// `Column_0, Column_1, ...` for a projection of `len` columns.
pub(crate) fn column_list(len: usize) -> String {
    (0..len).map(column_alias).collect::<Vec<_>>().join(", ")
}

static NON_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("identifier pattern"));

/// Per-variant behaviour behind the capability set.
///
/// Defaults describe a single-input processor that mirrors its input.
pub(crate) trait Variant {
    fn projection(&self, node: NodeRef<'_>) -> Result<Projection> {
        node.input(0)?.projection()
    }

    fn is_configured(&self, node: NodeRef<'_>) -> bool;

    fn query_sql(&self, node: NodeRef<'_>) -> Result<String>;

    fn sort_key(&self, _node: NodeRef<'_>) -> Result<SortKey> {
        Ok(SortKey::default())
    }

    /// Nodes referenced by alias from this node's `query_sql`.
    fn dependencies<'g>(&self, node: NodeRef<'g>) -> Result<Vec<NodeRef<'g>>> {
        node.inputs()
    }

    fn collapsible(&self) -> Option<&dyn Collapsible> {
        None
    }
}

/// Optional capability: a consumer may splice this node's raw column
/// expressions and FROM fragment instead of nesting it as a subquery.
pub(crate) trait Collapsible {
    /// Table-qualified, possibly cast, expression for output column `index`.
    fn raw_column_name(&self, node: NodeRef<'_>, index: usize) -> Result<String>;

    /// Table references that follow `FROM`, joins included.
    fn table_from_clause(&self, node: NodeRef<'_>) -> Result<String>;

    /// True when the FROM fragment holds more than one table reference.
    fn is_compound(&self) -> bool;

    /// Nodes still referenced by alias inside the spliced fragments.
    fn referenced_dependencies<'g>(&self, node: NodeRef<'g>) -> Result<Vec<NodeRef<'g>>>;

    /// Range aliases the FROM fragment introduces.
    fn table_aliases(&self, node: NodeRef<'_>) -> Result<Vec<String>>;
}

/// A collapsible node together with its position in the graph.
#[derive(Clone, Copy)]
pub struct Collapsed<'g> {
    node: NodeRef<'g>,
    source: &'g dyn Collapsible,
}

impl<'g> Collapsed<'g> {
    pub fn node(&self) -> NodeRef<'g> {
        self.node
    }

    pub fn raw_column_name(&self, index: usize) -> Result<String> {
        self.source.raw_column_name(self.node, index)
    }

    pub fn table_from_clause(&self) -> Result<String> {
        self.source.table_from_clause(self.node)
    }

    pub fn is_compound(&self) -> bool {
        self.source.is_compound()
    }

    pub fn referenced_dependencies(&self) -> Result<Vec<NodeRef<'g>>> {
        self.source.referenced_dependencies(self.node)
    }

    pub fn table_aliases(&self) -> Result<Vec<String>> {
        self.source.table_aliases(self.node)
    }
}

/// A node viewed through its graph.
#[derive(Clone, Copy)]
pub struct NodeRef<'g> {
    graph: &'g Graph,
    key: NodeKey,
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id())
            .field("type", &self.kind().type_name())
            .finish()
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.graph, other.graph) && self.key == other.key
    }
}

impl Eq for NodeRef<'_> {}

impl<'g> NodeRef<'g> {
    pub(crate) fn new(graph: &'g Graph, key: NodeKey) -> Self {
        Self { graph, key }
    }

    fn node(&self) -> &'g Node {
        self.graph.node_at(self.key)
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn id(&self) -> &'g str {
        &self.node().id
    }

    pub fn dialect(&self) -> Dialect {
        self.node().dialect
    }

    pub fn strategy(&self) -> Strategy {
        self.graph.strategy()
    }

    pub fn kind(&self) -> &'g NodeKind {
        &self.node().kind
    }

    /// CTE name and subquery alias: `node_` plus the id with every
    /// character outside `[A-Za-z0-9_]` replaced by `_`.
    pub fn alias_name(&self) -> String {
        format!("node_{}", NON_IDENT.replace_all(self.id(), "_"))
    }

    pub fn declared_inputs(&self) -> &'g [InputRef] {
        &self.node().inputs
    }

    pub fn input(&self, index: usize) -> Result<NodeRef<'g>> {
        let inputs = self.declared_inputs();
        let input = inputs.get(index).ok_or_else(|| CompileError::MissingInput {
            node: self.id().to_string(),
            index,
            declared: inputs.len(),
        })?;
        let key = input.key.ok_or_else(|| CompileError::UnknownInput {
            node: self.id().to_string(),
            input: input.id.clone(),
        })?;
        Ok(NodeRef::new(self.graph, key))
    }

    pub fn inputs(&self) -> Result<Vec<NodeRef<'g>>> {
        (0..self.declared_inputs().len())
            .map(|i| self.input(i))
            .collect()
    }

    /// Every declared input is present in the graph.
    pub fn inputs_resolved(&self, min: usize) -> bool {
        let inputs = self.declared_inputs();
        inputs.len() >= min && inputs.iter().all(|i| i.key.is_some())
    }

    pub fn projection(&self) -> Result<Projection> {
        self.kind().variant().projection(*self)
    }

    pub fn columns(&self) -> Result<Vec<String>> {
        Ok(self.projection()?.names())
    }

    pub fn column_types(&self) -> Result<Vec<String>> {
        Ok(self.projection()?.types())
    }

    /// Settings are complete enough to emit valid SQL.
    pub fn is_configured(&self) -> bool {
        self.kind().variant().is_configured(*self)
    }

    /// A `SELECT` defining this node's output over its inputs.
    pub fn query_sql(&self) -> Result<String> {
        self.kind().variant().query_sql(*self)
    }

    /// What a consumer writes after `FROM` to read this node.
    pub fn dependency_sql(&self) -> Result<String> {
        match self.strategy() {
            Strategy::CommonTableExpressions => Ok(self.alias_name()),
            Strategy::Inline => Ok(format!("({}) AS {}", self.query_sql()?, self.alias_name())),
        }
    }

    /// Like [`NodeRef::dependency_sql`], but read under another range alias.
    pub(crate) fn dependency_sql_as(&self, alias: &str) -> Result<String> {
        match self.strategy() {
            Strategy::CommonTableExpressions => Ok(format!("{} AS {}", self.alias_name(), alias)),
            Strategy::Inline => Ok(format!("({}) AS {}", self.query_sql()?, alias)),
        }
    }

    pub fn sort_key(&self) -> Result<SortKey> {
        self.kind().variant().sort_key(*self)
    }

    pub fn dependencies(&self) -> Result<Vec<NodeRef<'g>>> {
        self.kind().variant().dependencies(*self)
    }

    pub fn collapsible(&self) -> Option<Collapsed<'g>> {
        self.kind()
            .variant()
            .collapsible()
            .map(|source| Collapsed { node: *self, source })
    }

    /// Output column `index` of this node as seen by a consumer that did not
    /// collapse it.
    pub(crate) fn qualified_column(&self, index: usize) -> String {
        format!("{}.{}", self.alias_name(), column_alias(index))
    }
}

/// Table references for one side of a consumer's FROM clause, plus the
/// nodes those references still name by alias.
pub(crate) fn from_fragment<'g>(
    input: NodeRef<'g>,
    parenthesize_compound: bool,
) -> Result<(String, Vec<NodeRef<'g>>)> {
    match input.collapsible() {
        Some(collapsed) => {
            let clause = collapsed.table_from_clause()?;
            let clause = if parenthesize_compound && collapsed.is_compound() {
                format!("({})", clause)
            } else {
                clause
            };
            Ok((clause, collapsed.referenced_dependencies()?))
        }
        None => Ok((input.dependency_sql()?, vec![input])),
    }
}

/// Range aliases `input` brings into a consumer's FROM clause.
pub(crate) fn fragment_aliases(input: NodeRef<'_>) -> Result<Vec<String>> {
    match input.collapsible() {
        Some(collapsed) => collapsed.table_aliases(),
        None => Ok(vec![input.alias_name()]),
    }
}

/// Expression for column `index` of `input`, collapsed when possible.
pub(crate) fn input_column(input: NodeRef<'_>, index: usize) -> Result<String> {
    match input.collapsible() {
        Some(collapsed) => collapsed.raw_column_name(index),
        None => Ok(input.qualified_column(index)),
    }
}
