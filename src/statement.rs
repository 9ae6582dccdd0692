//! Statement assembly: turns a target node into one complete fetch or count
//! statement.
//!
//! Under the inline strategy the target's query already nests every input,
//! so it is wrapped once. Under the CTE strategy every node the target
//! reaches by alias is named exactly once in a leading `WITH` clause, in an
//! order where each definition precedes its first use.

use crate::Result;
use crate::dialect::Strategy;
use crate::error::CompileError;
use crate::node::{NodeKey, NodeRef, SortKey, column_list};

use std::collections::HashMap;

/// One page of rows: skip `offset`, return at most `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

impl Page {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }
}

/// Every node `target` reaches by alias, dependencies first, each once.
///
/// Depth-first over dependencies; a node seen again is moved to the front
/// together with everything it reaches, so it stays ahead of every user.
/// The block a node moves to the front is the same every time, so it is
/// built once per node.
pub fn dependency_order<'g>(target: NodeRef<'g>) -> Result<Vec<NodeRef<'g>>> {
    let mut blocks = HashMap::new();
    prepend_dependencies(target, Vec::new(), &mut blocks)
}

/// `order` after each dependency of `node`, in turn, has been moved to the
/// front along with its own block.
fn prepend_dependencies<'g>(
    node: NodeRef<'g>,
    mut order: Vec<NodeRef<'g>>,
    blocks: &mut HashMap<NodeKey, Vec<NodeRef<'g>>>,
) -> Result<Vec<NodeRef<'g>>> {
    for dep in node.dependencies()? {
        let mut block = front_block(dep, blocks)?;
        order.retain(|n| !block.contains(n));
        block.append(&mut order);
        order = block;
    }
    Ok(order)
}

/// `node` and everything it reaches, in the order they lead the list once
/// `node` has been moved to the front and walked.
fn front_block<'g>(
    node: NodeRef<'g>,
    blocks: &mut HashMap<NodeKey, Vec<NodeRef<'g>>>,
) -> Result<Vec<NodeRef<'g>>> {
    if let Some(block) = blocks.get(&node.key()) {
        return Ok(block.clone());
    }
    let block = prepend_dependencies(node, vec![node], blocks)?;
    blocks.insert(node.key(), block.clone());
    Ok(block)
}

/// Ordering for the final statement, checked against the target's output.
fn checked_sort_key(target: NodeRef<'_>, len: usize) -> Result<SortKey> {
    let key = target.sort_key()?;
    if let Some(bad) = key.columns().iter().find(|c| c.index >= len) {
        return Err(CompileError::column_out_of_range(target.id(), bad.index, len));
    }
    Ok(key)
}

/// `name AS (query), ...` for every node in `nodes`.
fn with_entries(nodes: &[NodeRef<'_>]) -> Result<Vec<String>> {
    nodes
        .iter()
        .map(|n| Ok(format!("{} AS ({})", n.alias_name(), n.query_sql()?)))
        .collect()
}

pub fn fetch(target: NodeRef<'_>, page: Option<Page>) -> Result<String> {
    let dialect = target.dialect();
    let len = target.projection()?.len();
    let order_by = checked_sort_key(target, len)?.order_by();
    let columns = column_list(len);

    let sql = match target.strategy() {
        Strategy::Inline => {
            let mut sql = format!(
                "SELECT {} FROM ({}) AS results ORDER BY {}",
                columns,
                target.query_sql()?,
                order_by
            );
            if let Some(page) = page {
                sql.push(' ');
                sql.push_str(&dialect.limit_clause(page.offset, page.limit));
            }
            sql
        }
        Strategy::CommonTableExpressions => {
            let mut nodes = dependency_order(target)?;
            nodes.push(target);
            let mut entries = with_entries(&nodes)?;
            let alias = target.alias_name();
            match page {
                None => format!(
                    "WITH {} SELECT {} FROM {} ORDER BY {}",
                    entries.join(", "),
                    columns,
                    alias,
                    order_by
                ),
                Some(page) => {
                    let out_of_range = || CompileError::PageOutOfRange {
                        offset: page.offset,
                        limit: page.limit,
                    };
                    let first = page.offset.checked_add(1).ok_or_else(out_of_range)?;
                    let last = page.offset.checked_add(page.limit).ok_or_else(out_of_range)?;
                    let paged = format!("{}_paged", alias);
                    entries.push(format!(
                        "{} AS (SELECT *, ROW_NUMBER() OVER (ORDER BY {}) AS ROW_NUM FROM {})",
                        paged, order_by, alias
                    ));
                    format!(
                        "WITH {} SELECT {} FROM {} WHERE ROW_NUM BETWEEN {} AND {} ORDER BY {}",
                        entries.join(", "),
                        columns,
                        paged,
                        first,
                        last,
                        order_by
                    )
                }
            }
        }
    };
    log::debug!("fetch statement for node '{}' ({})", target.id(), dialect);
    Ok(sql)
}

pub fn count(target: NodeRef<'_>) -> Result<String> {
    let wrapped = format!(
        "SELECT COUNT(*) FROM ({}) AS {}",
        target.query_sql()?,
        target.alias_name()
    );
    let sql = match target.strategy() {
        Strategy::Inline => wrapped,
        Strategy::CommonTableExpressions => {
            let deps = dependency_order(target)?;
            if deps.is_empty() {
                wrapped
            } else {
                format!("WITH {} {}", with_entries(&deps)?.join(", "), wrapped)
            }
        }
    };
    log::debug!("count statement for node '{}'", target.id());
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::graph::Graph;
    use crate::node::testing::graph;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const PG_ORDERS: &str = "SELECT node_o_table.\"id\" AS Column_0, \
        node_o_table.\"customer_id\" AS Column_1, node_o_table.\"total\" AS Column_2, \
        node_o_table.\"placed\" AS Column_3 FROM \"orders\" AS node_o_table";

    fn sorted_orders(dialect: Dialect) -> Graph {
        graph(
            dialect,
            json!([
                { "Id": "o", "Type": "TableSource", "Table": "orders" },
                { "Id": "f", "Type": "Filter", "Inputs": ["o"],
                  "FilterColumnIndex": 2, "Operator": "GreaterThan", "FilterValue": 100 },
                { "Id": "s", "Type": "Sort", "Inputs": ["f"],
                  "SortColumns": [2], "SortDirections": ["Descending"] }
            ]),
        )
    }

    #[test]
    fn cte_fetch_without_page() {
        let g = graph(
            Dialect::PostgreSql,
            json!([{ "Id": "o", "Type": "TableSource", "Table": "orders" }]),
        );
        assert_eq!(
            g.fetch_statement("o", None).unwrap(),
            format!(
                "WITH node_o AS ({}) SELECT Column_0, Column_1, Column_2, Column_3 \
                 FROM node_o ORDER BY Column_0 ASC",
                PG_ORDERS
            )
        );
    }

    #[test]
    fn cte_fetch_pages_with_row_number() {
        let g = sorted_orders(Dialect::PostgreSql);
        assert_eq!(
            g.fetch_statement("s", Some(Page::new(10, 5))).unwrap(),
            format!(
                "WITH node_o AS ({}), \
                 node_f AS (SELECT * FROM node_o WHERE Column_2 > 100), \
                 node_s AS (SELECT * FROM node_f), \
                 node_s_paged AS (SELECT *, ROW_NUMBER() OVER (ORDER BY Column_2 DESC) \
                 AS ROW_NUM FROM node_s) \
                 SELECT Column_0, Column_1, Column_2, Column_3 FROM node_s_paged \
                 WHERE ROW_NUM BETWEEN 11 AND 15 ORDER BY Column_2 DESC",
                PG_ORDERS
            )
        );
    }

    #[test]
    fn inline_fetch_uses_the_dialect_limit_clause() {
        let g = sorted_orders(Dialect::MySql);
        assert_eq!(
            g.fetch_statement("f", Some(Page::new(20, 10))).unwrap(),
            "SELECT Column_0, Column_1, Column_2, Column_3 FROM (SELECT * FROM \
             (SELECT node_o_table.`id` AS Column_0, node_o_table.`customer_id` AS Column_1, \
             node_o_table.`total` AS Column_2, node_o_table.`placed` AS Column_3 \
             FROM `orders` AS node_o_table) AS node_o WHERE Column_2 > 100) AS results \
             ORDER BY Column_0 ASC LIMIT 20,10"
        );

        let g = sorted_orders(Dialect::SqlServer).with_strategy(Strategy::Inline);
        let sql = g.fetch_statement("s", Some(Page::new(0, 50))).unwrap();
        assert!(sql.starts_with("SELECT Column_0, Column_1, Column_2, Column_3 FROM (SELECT * FROM (SELECT * FROM (SELECT"));
        assert!(sql.ends_with(
            ") AS results ORDER BY Column_2 DESC OFFSET 0 ROWS FETCH NEXT 50 ROWS ONLY"
        ));
    }

    #[test]
    fn diamond_defines_the_shared_ancestor_once() {
        let g = graph(
            Dialect::PostgreSql,
            json!([
                { "Id": "o", "Type": "TableSource", "Table": "orders" },
                { "Id": "small", "Type": "Filter", "Inputs": ["o"],
                  "FilterColumnIndex": 2, "Operator": "LessThan", "FilterValue": 10 },
                { "Id": "big", "Type": "Filter", "Inputs": ["o"],
                  "FilterColumnIndex": 2, "Operator": "GreaterThan", "FilterValue": 1000 },
                { "Id": "j", "Type": "Join", "Inputs": ["small", "big"],
                  "Table1Column": 1, "Table2Column": 1 }
            ]),
        );
        let j = g.node("j").unwrap();
        let order: Vec<_> = dependency_order(j)
            .unwrap()
            .iter()
            .map(|n| n.id())
            .collect();
        assert_eq!(order, vec!["o", "big", "small"]);

        let sql = g.fetch_statement("j", None).unwrap();
        assert_eq!(sql.matches("node_o AS (").count(), 1);
        assert!(sql.find("node_o AS (").unwrap() < sql.find("node_big AS (").unwrap());
        assert!(sql.find("node_big AS (").unwrap() < sql.find("node_j AS (").unwrap());
    }

    #[test]
    fn stacked_diamonds_are_ordered_once_each() {
        let mut nodes = vec![json!({ "Id": "d0", "Type": "TableSource", "Table": "orders" })];
        for level in 1..=40 {
            let below = format!("d{}", level - 1);
            for side in ["a", "b"] {
                nodes.push(json!({
                    "Id": format!("{}{}", side, level), "Type": "Filter", "Inputs": [below],
                    "FilterColumnIndex": 0, "Operator": "IsNotEmpty"
                }));
            }
            nodes.push(json!({
                "Id": format!("d{}", level), "Type": "Append",
                "Inputs": [format!("a{}", level), format!("b{}", level)]
            }));
        }
        let g = graph(Dialect::PostgreSql, serde_json::Value::Array(nodes));

        let order = dependency_order(g.node("d40").unwrap()).unwrap();
        assert_eq!(order.len(), 3 * 40);
        for (at, node) in order.iter().enumerate() {
            assert_eq!(order.iter().filter(|n| *n == node).count(), 1, "{}", node.id());
            for dep in node.dependencies().unwrap() {
                let dep_at = order.iter().position(|n| *n == dep).unwrap();
                assert!(dep_at < at, "{} before {}", dep.id(), node.id());
            }
        }

        let sql = g.fetch_statement("d3", None).unwrap();
        assert_eq!(sql.matches("node_d1 AS (").count(), 1);
        assert_eq!(sql.matches("node_d0 AS (").count(), 1);
    }

    #[test]
    fn page_past_the_last_row_number_is_an_error() {
        let g = sorted_orders(Dialect::PostgreSql);
        assert_eq!(
            g.fetch_statement("o", Some(Page::new(u64::MAX, 1))).unwrap_err(),
            CompileError::PageOutOfRange {
                offset: u64::MAX,
                limit: 1
            }
        );
        assert!(g.fetch_statement("o", Some(Page::new(0, u64::MAX))).is_ok());
        assert!(
            g.fetch_statement("o", Some(Page::new(u64::MAX - 5, 5)))
                .unwrap()
                .contains(&format!("BETWEEN {} AND {}", u64::MAX - 4, u64::MAX))
        );
    }

    #[test]
    fn collapsed_tables_are_not_named_in_the_with_clause() {
        let g = graph(
            Dialect::SqlServer,
            json!([
                { "Id": "c", "Type": "TableSource", "Table": "customers" },
                { "Id": "o", "Type": "TableSource", "Table": "orders" },
                { "Id": "j", "Type": "Join", "Inputs": ["c", "o"],
                  "Table1Column": 0, "Table2Column": 1 }
            ]),
        );
        let sql = g.fetch_statement("j", None).unwrap();
        assert!(sql.starts_with("WITH node_j AS (SELECT node_c_table.[id] AS Column_0"));
        assert!(!sql.contains("node_c AS ("));
    }

    #[test]
    fn count_statements() {
        let g = sorted_orders(Dialect::SqlServer);
        assert_eq!(
            g.count_statement("f").unwrap(),
            "WITH node_o AS (SELECT node_o_table.[id] AS Column_0, \
             node_o_table.[customer_id] AS Column_1, node_o_table.[total] AS Column_2, \
             node_o_table.[placed] AS Column_3 FROM [orders] AS node_o_table) \
             SELECT COUNT(*) FROM (SELECT * FROM node_o WHERE Column_2 > 100) AS node_f"
        );
        assert_eq!(
            g.count_statement("o").unwrap(),
            "SELECT COUNT(*) FROM (SELECT node_o_table.[id] AS Column_0, \
             node_o_table.[customer_id] AS Column_1, node_o_table.[total] AS Column_2, \
             node_o_table.[placed] AS Column_3 FROM [orders] AS node_o_table) AS node_o"
        );

        let g = sorted_orders(Dialect::MySql);
        assert!(g.count_statement("s").unwrap().starts_with(
            "SELECT COUNT(*) FROM (SELECT * FROM (SELECT * FROM (SELECT node_o_table.`id`"
        ));
    }

    #[test]
    fn compiling_twice_is_byte_identical() {
        let g = sorted_orders(Dialect::PostgreSql);
        let page = Some(Page::new(5, 5));
        assert_eq!(
            g.fetch_statement("s", page).unwrap(),
            g.fetch_statement("s", page).unwrap()
        );
        assert_eq!(g.count_statement("s").unwrap(), g.count_statement("s").unwrap());
    }
}
