//! Select: reorder, subset and rename input columns by index.

use super::{
    Column, NodeRef, Projection, SortKey, Variant, column_alias, from_fragment, input_column,
};
use crate::Result;
use crate::error::CompileError;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Select {
    pub included_column_indexes: Option<Vec<usize>>,

    /// Positionally aligned with `included_column_indexes`; empty or missing
    /// entries keep the input name.
    pub column_aliases: Vec<Option<String>>,
}

struct Pick<'a> {
    input_index: usize,
    alias: Option<&'a str>,
}

impl Select {
    /// Requested columns that exist in the input; out-of-range indices are
    /// skipped without error.
    fn picks(&self, input_len: usize) -> Vec<Pick<'_>> {
        let Some(included) = &self.included_column_indexes else {
            return Vec::new();
        };
        included
            .iter()
            .enumerate()
            .filter(|(_, index)| **index < input_len)
            .map(|(pos, index)| Pick {
                input_index: *index,
                alias: self
                    .column_aliases
                    .get(pos)
                    .and_then(|a| a.as_deref())
                    .filter(|a| !a.trim().is_empty()),
            })
            .collect()
    }
}

impl Variant for Select {
    fn projection(&self, node: NodeRef<'_>) -> Result<Projection> {
        let input = node.input(0)?.projection()?;
        let mut out = Projection::default();
        for pick in self.picks(input.len()) {
            let source = input.column(node.id(), pick.input_index)?;
            let name = pick.alias.unwrap_or(source.name.as_str());
            out.push(Column::new(name, source.type_name.clone()));
        }
        Ok(out)
    }

    fn is_configured(&self, node: NodeRef<'_>) -> bool {
        node.inputs_resolved(1)
            && self
                .included_column_indexes
                .as_ref()
                .is_some_and(|i| !i.is_empty())
    }

    fn query_sql(&self, node: NodeRef<'_>) -> Result<String> {
        let input = node.input(0)?;
        let picks = self.picks(input.projection()?.len());
        if picks.is_empty() {
            return Err(CompileError::missing_setting(
                node.id(),
                "IncludedColumnIndexes",
            ));
        }

        let select = picks
            .iter()
            .enumerate()
            .map(|(pos, pick)| {
                Ok(format!(
                    "{} AS {}",
                    input_column(input, pick.input_index)?,
                    column_alias(pos)
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let (from, _) = from_fragment(input, false)?;

        Ok(format!("SELECT {} FROM {}", select.join(", "), from))
    }

    /// Input ordering carried through the picks.
    fn sort_key(&self, node: NodeRef<'_>) -> Result<SortKey> {
        let input = node.input(0)?;
        let picks = self
            .picks(input.projection()?.len())
            .iter()
            .map(|p| p.input_index)
            .collect::<Vec<_>>();
        Ok(input.sort_key()?.remap(&picks))
    }

    fn dependencies<'g>(&self, node: NodeRef<'g>) -> Result<Vec<NodeRef<'g>>> {
        let (_, deps) = from_fragment(node.input(0)?, false)?;
        Ok(deps)
    }
}
