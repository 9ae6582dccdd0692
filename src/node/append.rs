//! Append: stacks the rows of one or more inputs with `UNION ALL`.
//!
//! Columns are matched by logical name. With `IncludeUniqueColumns` the
//! output has every name seen in any input (first-seen order) and branches
//! missing a column contribute `NULL`; without it only names present in
//! every input survive, in the first input's order.

use super::{Column, NodeRef, Projection, Variant, column_alias};
use crate::Result;
use crate::error::CompileError;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Append {
    pub include_unique_columns: bool,
}

impl Variant for Append {
    fn projection(&self, node: NodeRef<'_>) -> Result<Projection> {
        let projections = node
            .inputs()?
            .iter()
            .map(|i| i.projection())
            .collect::<Result<Vec<_>>>()?;
        let Some((first, rest)) = projections.split_first() else {
            return Err(CompileError::MissingInput {
                node: node.id().to_string(),
                index: 0,
                declared: 0,
            });
        };

        let mut out = Projection::default();
        if self.include_unique_columns {
            for column in projections.iter().flat_map(|p| p.iter()) {
                if out.position(&column.name).is_none() {
                    out.push(column.clone());
                }
            }
        } else {
            for column in first.iter() {
                let everywhere = rest.iter().all(|p| p.position(&column.name).is_some());
                if everywhere && out.position(&column.name).is_none() {
                    out.push(Column::new(column.name.clone(), column.type_name.clone()));
                }
            }
        }
        Ok(out)
    }

    fn is_configured(&self, node: NodeRef<'_>) -> bool {
        node.inputs_resolved(1)
    }

    fn query_sql(&self, node: NodeRef<'_>) -> Result<String> {
        let out = self.projection(node)?;
        let branches = node
            .inputs()?
            .into_iter()
            .map(|input| {
                let available = input.projection()?;
                let select = out
                    .iter()
                    .enumerate()
                    .map(|(k, column)| match available.position(&column.name) {
                        Some(j) => format!("{} AS {}", column_alias(j), column_alias(k)),
                        None => format!("NULL AS {}", column_alias(k)),
                    })
                    .collect::<Vec<_>>();
                Ok(format!(
                    "SELECT {} FROM {}",
                    select.join(", "),
                    input.dependency_sql()?
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(branches.join(" UNION ALL "))
    }
}

#[cfg(test)]
mod tests {
    use crate::dialect::Dialect;
    use crate::graph::Graph;
    use crate::node::testing::{graph, query};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn append(unique: bool) -> Graph {
        graph(
            Dialect::PostgreSql,
            json!([
                { "Id": "c", "Type": "TableSource", "Table": "customers" },
                { "Id": "o", "Type": "TableSource", "Table": "orders" },
                { "Id": "n", "Type": "TableSource", "Table": "notes" },
                { "Id": "a", "Type": "Append", "Inputs": ["c", "o", "n"],
                  "IncludeUniqueColumns": unique }
            ]),
        )
    }

    #[test]
    fn unique_columns_are_the_first_seen_union() {
        let g = append(true);
        assert_eq!(
            g.node("a").unwrap().columns().unwrap(),
            vec!["id", "name", "active", "created", "customer_id", "total", "placed", "body"]
        );
        let sql = query(&g, "a");
        assert!(sql.starts_with(
            "SELECT Column_0 AS Column_0, Column_1 AS Column_1, Column_2 AS Column_2, \
             Column_3 AS Column_3, NULL AS Column_4, NULL AS Column_5, NULL AS Column_6, \
             NULL AS Column_7 FROM node_c UNION ALL "
        ));
        assert!(sql.ends_with(
            "SELECT Column_0 AS Column_0, NULL AS Column_1, NULL AS Column_2, NULL AS Column_3, \
             NULL AS Column_4, NULL AS Column_5, NULL AS Column_6, Column_1 AS Column_7 FROM node_n"
        ));
    }

    #[test]
    fn shared_columns_are_the_intersection() {
        let g = append(false);
        assert_eq!(g.node("a").unwrap().columns().unwrap(), vec!["id"]);
        assert_eq!(
            query(&g, "a"),
            "SELECT Column_0 AS Column_0 FROM node_c UNION ALL \
             SELECT Column_0 AS Column_0 FROM node_o UNION ALL \
             SELECT Column_0 AS Column_0 FROM node_n"
        );
    }
}
