//! Summarize: group by zero or more keys and aggregate.

use super::{Column, NodeRef, Projection, Variant, column_alias};
use crate::Result;
use crate::error::CompileError;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum GroupByFunction {
    #[default]
    #[serde(alias = "None")]
    Raw,
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Average,
    /// Computed as an average; there is no portable median.
    Median,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Summarize {
    pub group_by_column_indexes: Vec<usize>,

    /// Aligned with `group_by_column_indexes`; missing entries group by the raw value.
    pub group_by_functions: Vec<GroupByFunction>,

    /// Aligned with `aggregate_functions`. Ignored for `Count`.
    pub aggregate_column_indexes: Vec<Option<usize>>,

    pub aggregate_functions: Vec<AggregateFunction>,
}

struct Output {
    column: Column,
    expr: String,
}

impl Summarize {
    fn group_outputs(&self, node: NodeRef<'_>, input: &Projection) -> Result<Vec<Output>> {
        let dialect = node.dialect();
        self.group_by_column_indexes
            .iter()
            .enumerate()
            .map(|(pos, &index)| {
                let source = input.column(node.id(), index)?;
                let col = column_alias(index);
                let function = self.group_by_functions.get(pos).copied().unwrap_or_default();
                let output = match function {
                    GroupByFunction::Raw => Output {
                        column: source.clone(),
                        expr: col,
                    },
                    GroupByFunction::Month => Output {
                        column: Column::new(
                            format!("Month of {}", source.name),
                            dialect.text_type_name(),
                        ),
                        expr: dialect.month_of(&col),
                    },
                    GroupByFunction::Year => Output {
                        column: Column::new(
                            format!("Year of {}", source.name),
                            dialect.integer_type_name(),
                        ),
                        expr: dialect.year_of(&col),
                    },
                };
                Ok(output)
            })
            .collect()
    }

    fn aggregate_outputs(&self, node: NodeRef<'_>, input: &Projection) -> Result<Vec<Output>> {
        let dialect = node.dialect();
        self.aggregate_functions
            .iter()
            .enumerate()
            .map(|(pos, &function)| {
                if function == AggregateFunction::Count {
                    return Ok(Output {
                        column: Column::new("Count", dialect.integer_type_name()),
                        expr: "COUNT(*)".to_string(),
                    });
                }

                let index = self
                    .aggregate_column_indexes
                    .get(pos)
                    .copied()
                    .flatten()
                    .ok_or_else(|| {
                        CompileError::missing_setting(node.id(), "AggregateColumnIndexes")
                    })?;
                let source = input.column(node.id(), index)?;
                let col = column_alias(index);
                let (label, expr, type_name) = match function {
                    AggregateFunction::Sum => ("Sum", format!("SUM({})", col), &*source.type_name),
                    AggregateFunction::Min => ("Min", format!("MIN({})", col), &*source.type_name),
                    AggregateFunction::Max => ("Max", format!("MAX({})", col), &*source.type_name),
                    AggregateFunction::Median => {
                        log::warn!("node '{}': median is computed as an average", node.id());
                        ("Median", dialect.average(&col), dialect.float_type_name())
                    }
                    _ => ("Average", dialect.average(&col), dialect.float_type_name()),
                };
                Ok(Output {
                    column: Column::new(format!("{} of {}", label, source.name), type_name),
                    expr,
                })
            })
            .collect()
    }

    fn outputs(&self, node: NodeRef<'_>) -> Result<(Vec<Output>, Vec<Output>)> {
        let input = node.input(0)?.projection()?;
        Ok((
            self.group_outputs(node, &input)?,
            self.aggregate_outputs(node, &input)?,
        ))
    }
}

impl Variant for Summarize {
    fn projection(&self, node: NodeRef<'_>) -> Result<Projection> {
        let (groups, aggregates) = self.outputs(node)?;
        Ok(Projection::new(
            groups
                .into_iter()
                .chain(aggregates)
                .map(|o| o.column)
                .collect(),
        ))
    }

    fn is_configured(&self, node: NodeRef<'_>) -> bool {
        node.inputs_resolved(1)
            && !(self.group_by_column_indexes.is_empty() && self.aggregate_functions.is_empty())
            && self.outputs(node).is_ok()
    }

    fn query_sql(&self, node: NodeRef<'_>) -> Result<String> {
        let (groups, aggregates) = self.outputs(node)?;
        if groups.is_empty() && aggregates.is_empty() {
            return Err(CompileError::missing_setting(node.id(), "AggregateFunctions"));
        }

        let select = groups
            .iter()
            .chain(&aggregates)
            .enumerate()
            .map(|(k, o)| format!("{} AS {}", o.expr, column_alias(k)))
            .collect::<Vec<_>>();
        let mut sql = format!(
            "SELECT {} FROM {}",
            select.join(", "),
            node.input(0)?.dependency_sql()?
        );
        if !groups.is_empty() {
            let keys = groups.iter().map(|o| o.expr.as_str()).collect::<Vec<_>>();
            sql.push_str(" GROUP BY ");
            sql.push_str(&keys.join(", "));
        }
        Ok(sql)
    }
}
