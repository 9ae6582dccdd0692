//! Join: equi-join of two inputs on one column pair.
//!
//! Output columns are the first input's followed by the second's. When an
//! input is itself collapsible (a table source or another join) its table
//! references are spliced into this join's FROM clause, so a chain of joins
//! over tables renders as one flat `FROM a JOIN b ON ... JOIN c ON ...`.
//!
//! Range aliases in one FROM clause must be distinct. When the right input
//! would bring an alias the left side already uses (a self-join, or a chain
//! that reaches the same table twice), it is read as a whole under the
//! alias `<join alias>_rhs` instead of being spliced.

use super::{
    Collapsible, NodeRef, Projection, Variant, column_alias, fragment_aliases, from_fragment,
    input_column,
};
use crate::Result;
use crate::error::CompileError;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum JoinType {
    #[default]
    Inner,
    LeftOuter,
    RightOuter,
    /// Rendered as the `UNION` of a left and a right outer join.
    FullOuter,
    Cross,
}

impl JoinType {
    fn keyword(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::LeftOuter => "LEFT OUTER JOIN",
            JoinType::RightOuter => "RIGHT OUTER JOIN",
            JoinType::FullOuter => "FULL OUTER JOIN",
            JoinType::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Join {
    pub join_type: JoinType,
    pub table1_column: Option<usize>,
    pub table2_column: Option<usize>,
}

impl Join {
    fn sides<'g>(node: NodeRef<'g>) -> Result<(NodeRef<'g>, NodeRef<'g>)> {
        Ok((node.input(0)?, node.input(1)?))
    }

    /// Alias the right input is read under when splicing it would repeat an
    /// alias of the left side; `None` when it can be spliced as usual.
    fn renamed_right(node: NodeRef<'_>) -> Result<Option<String>> {
        let (left, right) = Self::sides(node)?;
        let taken = fragment_aliases(left)?;
        let clash = fragment_aliases(right)?
            .iter()
            .any(|alias| taken.contains(alias));
        Ok(clash.then(|| format!("{}_rhs", node.alias_name())))
    }

    fn right_fragment<'g>(node: NodeRef<'g>) -> Result<(String, Vec<NodeRef<'g>>)> {
        let right = node.input(1)?;
        match Self::renamed_right(node)? {
            Some(alias) => Ok((right.dependency_sql_as(&alias)?, vec![right])),
            None => from_fragment(right, true),
        }
    }

    fn right_column(node: NodeRef<'_>, index: usize) -> Result<String> {
        match Self::renamed_right(node)? {
            Some(alias) => Ok(format!("{}.{}", alias, column_alias(index))),
            None => input_column(node.input(1)?, index),
        }
    }

    fn from_clause(&self, node: NodeRef<'_>, join_type: JoinType) -> Result<String> {
        let (left, right) = Self::sides(node)?;
        let (left_from, _) = from_fragment(left, false)?;
        let (right_from, _) = Self::right_fragment(node)?;

        if join_type == JoinType::Cross {
            return Ok(format!("{} CROSS JOIN {}", left_from, right_from));
        }

        let left_index = self
            .table1_column
            .ok_or_else(|| CompileError::missing_setting(node.id(), "Table1Column"))?;
        let right_index = self
            .table2_column
            .ok_or_else(|| CompileError::missing_setting(node.id(), "Table2Column"))?;
        check_index(node, left, left_index)?;
        check_index(node, right, right_index)?;

        Ok(format!(
            "{} {} {} ON {} = {}",
            left_from,
            join_type.keyword(),
            right_from,
            input_column(left, left_index)?,
            Self::right_column(node, right_index)?
        ))
    }

    fn select_sql(&self, node: NodeRef<'_>, join_type: JoinType) -> Result<String> {
        let len = self.projection(node)?.len();
        let select = (0..len)
            .map(|i| Ok(format!("{} AS {}", self.raw_column_name(node, i)?, column_alias(i))))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!(
            "SELECT {} FROM {}",
            select.join(", "),
            self.from_clause(node, join_type)?
        ))
    }
}

fn check_index(node: NodeRef<'_>, side: NodeRef<'_>, index: usize) -> Result<()> {
    let len = side.projection()?.len();
    if index >= len {
        return Err(CompileError::column_out_of_range(node.id(), index, len));
    }
    Ok(())
}

impl Variant for Join {
    fn projection(&self, node: NodeRef<'_>) -> Result<Projection> {
        let (left, right) = Self::sides(node)?;
        let mut out = left.projection()?;
        out.extend(right.projection()?);
        Ok(out)
    }

    fn is_configured(&self, node: NodeRef<'_>) -> bool {
        if !node.inputs_resolved(2) {
            return false;
        }
        if self.join_type == JoinType::Cross {
            return true;
        }
        let (Some(l), Some(r)) = (self.table1_column, self.table2_column) else {
            return false;
        };
        Self::sides(node).is_ok_and(|(left, right)| {
            check_index(node, left, l).is_ok() && check_index(node, right, r).is_ok()
        })
    }

    fn query_sql(&self, node: NodeRef<'_>) -> Result<String> {
        match self.join_type {
            JoinType::FullOuter => Ok(format!(
                "{} UNION {}",
                self.select_sql(node, JoinType::LeftOuter)?,
                self.select_sql(node, JoinType::RightOuter)?
            )),
            join_type => self.select_sql(node, join_type),
        }
    }

    fn dependencies<'g>(&self, node: NodeRef<'g>) -> Result<Vec<NodeRef<'g>>> {
        self.referenced_dependencies(node)
    }

    fn collapsible(&self) -> Option<&dyn Collapsible> {
        // A full outer join is a UNION and has no single FROM fragment.
        match self.join_type {
            JoinType::FullOuter => None,
            _ => Some(self),
        }
    }
}

impl Collapsible for Join {
    fn raw_column_name(&self, node: NodeRef<'_>, index: usize) -> Result<String> {
        let (left, right) = Self::sides(node)?;
        let left_len = left.projection()?.len();
        if index < left_len {
            return input_column(left, index);
        }
        let right_len = right.projection()?.len();
        if index - left_len < right_len {
            return Self::right_column(node, index - left_len);
        }
        Err(CompileError::column_out_of_range(
            node.id(),
            index,
            left_len + right_len,
        ))
    }

    fn table_from_clause(&self, node: NodeRef<'_>) -> Result<String> {
        self.from_clause(node, self.join_type)
    }

    fn is_compound(&self) -> bool {
        true
    }

    fn referenced_dependencies<'g>(&self, node: NodeRef<'g>) -> Result<Vec<NodeRef<'g>>> {
        let (_, mut deps) = from_fragment(node.input(0)?, false)?;
        let (_, right_deps) = Self::right_fragment(node)?;
        deps.extend(right_deps);
        Ok(deps)
    }

    fn table_aliases(&self, node: NodeRef<'_>) -> Result<Vec<String>> {
        let mut aliases = fragment_aliases(node.input(0)?)?;
        match Self::renamed_right(node)? {
            Some(alias) => aliases.push(alias),
            None => aliases.extend(fragment_aliases(node.input(1)?)?),
        }
        Ok(aliases)
    }
}

#[cfg(test)]
mod tests {
    use crate::dialect::Dialect;
    use crate::node::testing::{graph, query};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn join_of_two_tables_is_flat() {
        let g = graph(
            Dialect::MySql,
            json!([
                { "Id": "c", "Type": "TableSource", "Table": "customers" },
                { "Id": "o", "Type": "TableSource", "Table": "orders" },
                { "Id": "j", "Type": "Join", "Inputs": ["c", "o"],
                  "JoinType": "Inner", "Table1Column": 0, "Table2Column": 1 }
            ]),
        );
        assert_eq!(
            query(&g, "j"),
            "SELECT node_c_table.`id` AS Column_0, node_c_table.`name` AS Column_1, \
             node_c_table.`active` AS Column_2, node_c_table.`created` AS Column_3, \
             node_o_table.`id` AS Column_4, node_o_table.`customer_id` AS Column_5, \
             node_o_table.`total` AS Column_6, node_o_table.`placed` AS Column_7 \
             FROM `customers` AS node_c_table INNER JOIN `orders` AS node_o_table \
             ON node_c_table.`id` = node_o_table.`customer_id`"
        );
        let j = g.node("j").unwrap();
        assert_eq!(j.columns().unwrap().len(), 8);
        assert!(j.dependencies().unwrap().is_empty());
    }

    #[test]
    fn filtered_side_is_nested_alone() {
        let g = graph(
            Dialect::PostgreSql,
            json!([
                { "Id": "c", "Type": "TableSource", "Table": "customers" },
                { "Id": "o", "Type": "TableSource", "Table": "orders" },
                { "Id": "big", "Type": "Filter", "Inputs": ["o"],
                  "FilterColumnIndex": 2, "Operator": "GreaterThan", "FilterValue": 100 },
                { "Id": "j", "Type": "Join", "Inputs": ["c", "big"],
                  "JoinType": "LeftOuter", "Table1Column": 0, "Table2Column": 1 }
            ]),
        );
        assert_eq!(
            query(&g, "j"),
            "SELECT node_c_table.\"id\" AS Column_0, node_c_table.\"name\" AS Column_1, \
             node_c_table.\"active\" AS Column_2, node_c_table.\"created\" AS Column_3, \
             node_big.Column_0 AS Column_4, node_big.Column_1 AS Column_5, \
             node_big.Column_2 AS Column_6, node_big.Column_3 AS Column_7 \
             FROM \"customers\" AS node_c_table LEFT OUTER JOIN node_big \
             ON node_c_table.\"id\" = node_big.Column_1"
        );
        assert_eq!(
            g.node("j").unwrap().dependencies().unwrap(),
            vec![g.node("big").unwrap()]
        );
    }

    #[test]
    fn join_over_join_splices_and_parenthesizes_the_right_side() {
        let g = graph(
            Dialect::SqlServer,
            json!([
                { "Id": "n", "Type": "TableSource", "Table": "notes" },
                { "Id": "c", "Type": "TableSource", "Table": "customers" },
                { "Id": "o", "Type": "TableSource", "Table": "orders" },
                { "Id": "co", "Type": "Join", "Inputs": ["c", "o"],
                  "Table1Column": 0, "Table2Column": 1 },
                { "Id": "j", "Type": "Join", "Inputs": ["n", "co"],
                  "Table1Column": 0, "Table2Column": 4 }
            ]),
        );
        let sql = query(&g, "j");
        assert!(sql.ends_with(
            "FROM [notes] AS node_n_table INNER JOIN \
             ([customers] AS node_c_table INNER JOIN [orders] AS node_o_table \
             ON node_c_table.[id] = node_o_table.[customer_id]) \
             ON node_n_table.[id] = node_o_table.[id]"
        ));
        assert!(sql.contains("CAST(node_n_table.[body] AS NVARCHAR(MAX)) AS Column_1"));
        assert!(sql.contains("node_o_table.[placed] AS Column_9"));
    }

    #[test]
    fn full_outer_join_is_a_union_of_outer_joins() {
        let g = graph(
            Dialect::MySql,
            json!([
                { "Id": "c", "Type": "TableSource", "Table": "notes" },
                { "Id": "o", "Type": "TableSource", "Table": "notes" },
                { "Id": "j", "Type": "Join", "Inputs": ["c", "o"],
                  "JoinType": "FullOuter", "Table1Column": 0, "Table2Column": 0 }
            ]),
        );
        assert_eq!(
            query(&g, "j"),
            "SELECT node_c_table.`id` AS Column_0, node_c_table.`body` AS Column_1, \
             node_o_table.`id` AS Column_2, node_o_table.`body` AS Column_3 \
             FROM `notes` AS node_c_table LEFT OUTER JOIN `notes` AS node_o_table \
             ON node_c_table.`id` = node_o_table.`id` \
             UNION \
             SELECT node_c_table.`id` AS Column_0, node_c_table.`body` AS Column_1, \
             node_o_table.`id` AS Column_2, node_o_table.`body` AS Column_3 \
             FROM `notes` AS node_c_table RIGHT OUTER JOIN `notes` AS node_o_table \
             ON node_c_table.`id` = node_o_table.`id`"
        );
        assert!(g.node("j").unwrap().collapsible().is_none());
    }

    #[test]
    fn cross_join_needs_no_columns() {
        let g = graph(
            Dialect::PostgreSql,
            json!([
                { "Id": "c", "Type": "TableSource", "Table": "notes" },
                { "Id": "o", "Type": "TableSource", "Table": "notes" },
                { "Id": "j", "Type": "Join", "Inputs": ["c", "o"], "JoinType": "Cross" }
            ]),
        );
        let j = g.node("j").unwrap();
        assert!(j.is_configured());
        assert!(query(&g, "j").ends_with(
            "FROM \"notes\" AS node_c_table CROSS JOIN \"notes\" AS node_o_table"
        ));
    }

    #[test]
    fn chain_reaching_a_table_twice_reads_it_once_more_by_alias() {
        let g = graph(
            Dialect::PostgreSql,
            json!([
                { "Id": "c", "Type": "TableSource", "Table": "customers" },
                { "Id": "o", "Type": "TableSource", "Table": "orders" },
                { "Id": "co", "Type": "Join", "Inputs": ["c", "o"],
                  "Table1Column": 0, "Table2Column": 1 },
                { "Id": "j", "Type": "Join", "Inputs": ["co", "o"],
                  "Table1Column": 4, "Table2Column": 0 }
            ]),
        );
        let sql = query(&g, "j");
        assert_eq!(
            sql,
            "SELECT node_c_table.\"id\" AS Column_0, node_c_table.\"name\" AS Column_1, \
             node_c_table.\"active\" AS Column_2, node_c_table.\"created\" AS Column_3, \
             node_o_table.\"id\" AS Column_4, node_o_table.\"customer_id\" AS Column_5, \
             node_o_table.\"total\" AS Column_6, node_o_table.\"placed\" AS Column_7, \
             node_j_rhs.Column_0 AS Column_8, node_j_rhs.Column_1 AS Column_9, \
             node_j_rhs.Column_2 AS Column_10, node_j_rhs.Column_3 AS Column_11 \
             FROM \"customers\" AS node_c_table INNER JOIN \"orders\" AS node_o_table \
             ON node_c_table.\"id\" = node_o_table.\"customer_id\" \
             INNER JOIN node_o AS node_j_rhs ON node_o_table.\"id\" = node_j_rhs.Column_0"
        );
        assert_eq!(sql.matches("AS node_o_table").count(), 1);
        assert_eq!(
            g.node("j").unwrap().dependencies().unwrap(),
            vec![g.node("o").unwrap()]
        );

        let fetch = g.fetch_statement("j", None).unwrap();
        assert!(fetch.starts_with("WITH node_o AS (SELECT node_o_table.\"id\" AS Column_0"));
        assert_eq!(fetch.matches("node_o AS (").count(), 1);
    }

    #[test]
    fn self_join_nests_the_right_side() {
        let g = graph(
            Dialect::MySql,
            json!([
                { "Id": "n", "Type": "TableSource", "Table": "notes" },
                { "Id": "j", "Type": "Join", "Inputs": ["n", "n"], "JoinType": "Cross" }
            ]),
        );
        assert_eq!(
            query(&g, "j"),
            "SELECT node_n_table.`id` AS Column_0, node_n_table.`body` AS Column_1, \
             node_j_rhs.Column_0 AS Column_2, node_j_rhs.Column_1 AS Column_3 \
             FROM `notes` AS node_n_table CROSS JOIN \
             (SELECT node_n_table.`id` AS Column_0, node_n_table.`body` AS Column_1 \
             FROM `notes` AS node_n_table) AS node_j_rhs"
        );
    }

    #[test]
    fn self_join_of_a_subquery_gets_a_second_alias() {
        let g = graph(
            Dialect::SqlServer,
            json!([
                { "Id": "o", "Type": "TableSource", "Table": "orders" },
                { "Id": "big", "Type": "Filter", "Inputs": ["o"],
                  "FilterColumnIndex": 2, "Operator": "GreaterThan", "FilterValue": 100 },
                { "Id": "j", "Type": "Join", "Inputs": ["big", "big"],
                  "Table1Column": 1, "Table2Column": 1 }
            ]),
        );
        let sql = query(&g, "j");
        assert!(sql.ends_with(
            "FROM node_big INNER JOIN node_big AS node_j_rhs \
             ON node_big.Column_1 = node_j_rhs.Column_1"
        ));
        assert!(sql.contains("node_j_rhs.Column_3 AS Column_7"));
    }
}
