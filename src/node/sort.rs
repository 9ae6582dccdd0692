//! Sort: passes rows through and declares the ordering the final statement
//! should use. It never emits `ORDER BY` itself.

use super::{NodeRef, SortColumn, SortDirection, SortKey, Variant};
use crate::Result;
use crate::error::CompileError;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Sort {
    pub sort_columns: Vec<usize>,

    /// Aligned with `sort_columns`; missing entries sort ascending.
    pub sort_directions: Vec<SortDirection>,
}

impl Variant for Sort {
    fn is_configured(&self, node: NodeRef<'_>) -> bool {
        node.inputs_resolved(1) && !self.sort_columns.is_empty()
    }

    fn query_sql(&self, node: NodeRef<'_>) -> Result<String> {
        Ok(format!("SELECT * FROM {}", node.input(0)?.dependency_sql()?))
    }

    fn sort_key(&self, node: NodeRef<'_>) -> Result<SortKey> {
        if self.sort_columns.is_empty() {
            return Ok(SortKey::default());
        }
        let len = node.input(0)?.projection()?.len();
        let mut columns: Vec<SortColumn> = Vec::with_capacity(self.sort_columns.len());
        for (pos, &index) in self.sort_columns.iter().enumerate() {
            if index >= len {
                return Err(CompileError::column_out_of_range(node.id(), index, len));
            }
            // A column listed again adds nothing; the first direction wins.
            if columns.iter().any(|c| c.index == index) {
                continue;
            }
            columns.push(SortColumn {
                index,
                direction: self.sort_directions.get(pos).copied().unwrap_or_default(),
            });
        }
        Ok(SortKey(columns))
    }
}
