//! Table source: reads one catalog table, no inputs.

use super::{Collapsible, Column, NodeRef, Projection, Variant, column_alias};
use crate::Result;
use crate::error::CompileError;
use crate::spec::SchemaCatalog;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TableSource {
    /// Display name of the catalog table.
    pub table: Option<String>,

    /// Filled from the schema catalog when the graph is built.
    #[serde(skip)]
    columns: Vec<Column>,

    #[serde(skip)]
    path: Vec<String>,
}

impl TableSource {
    /// Take the column list of the first catalog table whose display name
    /// matches. Returns false (and leaves the columns empty) on no match.
    pub fn configure(&mut self, catalog: &SchemaCatalog) -> bool {
        let found = self.table.as_deref().and_then(|name| catalog.find(name));
        match found {
            Some(schema) => {
                self.columns = schema
                    .columns
                    .iter()
                    .map(|c| Column::new(c.name.clone(), c.type_name.clone()))
                    .collect();
                self.path = schema.path();
                true
            }
            None => {
                self.columns.clear();
                self.path.clear();
                false
            }
        }
    }

    fn table_alias(node: NodeRef<'_>) -> String {
        format!("{}_table", node.alias_name())
    }

    fn catalog_column(&self, node: NodeRef<'_>, index: usize) -> Result<&Column> {
        self.columns
            .get(index)
            .ok_or_else(|| CompileError::column_out_of_range(node.id(), index, self.columns.len()))
    }

    fn require_columns(&self, node: NodeRef<'_>) -> Result<&str> {
        let table = self
            .table
            .as_deref()
            .ok_or_else(|| CompileError::missing_setting(node.id(), "Table"))?;
        if self.columns.is_empty() {
            return Err(CompileError::UnknownTable {
                node: node.id().to_string(),
                table: table.to_string(),
            });
        }
        Ok(table)
    }
}

impl Variant for TableSource {
    /// Catalog columns; types that are exposed through a text cast report
    /// the dialect's text type so later operations treat them uniformly.
    fn projection(&self, node: NodeRef<'_>) -> Result<Projection> {
        let dialect = node.dialect();
        Ok(Projection::new(
            self.columns
                .iter()
                .map(|c| {
                    if dialect.needs_text_exposure(&c.type_name) {
                        Column::new(c.name.clone(), dialect.text_type_name())
                    } else {
                        c.clone()
                    }
                })
                .collect(),
        ))
    }

    fn is_configured(&self, _node: NodeRef<'_>) -> bool {
        self.table.is_some() && !self.columns.is_empty()
    }

    fn query_sql(&self, node: NodeRef<'_>) -> Result<String> {
        self.require_columns(node)?;
        let select = (0..self.columns.len())
            .map(|i| Ok(format!("{} AS {}", self.raw_column_name(node, i)?, column_alias(i))))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!(
            "SELECT {} FROM {}",
            select.join(", "),
            self.table_from_clause(node)?
        ))
    }

    fn dependencies<'g>(&self, _node: NodeRef<'g>) -> Result<Vec<NodeRef<'g>>> {
        Ok(Vec::new())
    }

    fn collapsible(&self) -> Option<&dyn Collapsible> {
        Some(self)
    }
}

impl Collapsible for TableSource {
    fn raw_column_name(&self, node: NodeRef<'_>, index: usize) -> Result<String> {
        let dialect = node.dialect();
        let column = self.catalog_column(node, index)?;
        let raw = format!(
            "{}.{}",
            Self::table_alias(node),
            dialect.quote_ident(&column.name)
        );
        if dialect.needs_text_exposure(&column.type_name) {
            Ok(dialect.cast_to_text(&raw, &column.type_name))
        } else {
            Ok(raw)
        }
    }

    fn table_from_clause(&self, node: NodeRef<'_>) -> Result<String> {
        self.require_columns(node)?;
        Ok(format!(
            "{} AS {}",
            node.dialect().quote_path(self.path.as_slice()),
            Self::table_alias(node)
        ))
    }

    fn is_compound(&self) -> bool {
        false
    }

    fn referenced_dependencies<'g>(&self, _node: NodeRef<'g>) -> Result<Vec<NodeRef<'g>>> {
        Ok(Vec::new())
    }

    fn table_aliases(&self, node: NodeRef<'_>) -> Result<Vec<String>> {
        Ok(vec![Self::table_alias(node)])
    }
}
