//! Filter: keeps the rows of its input that satisfy one predicate.

use super::{NodeRef, SortKey, Variant, column_alias};
use crate::Result;
use crate::dialect::{Dialect, TypeClass};
use crate::error::CompileError;
use crate::spec::node::loose_string;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum FilterOperator {
    EqualTo,
    DoesNotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    StartsWith,
    EndsWith,
    Contains,
    DoesNotContain,
    IsEmpty,
    IsNotEmpty,
    Today,
    Last24Hours,
    Next24Hours,
    Last7Days,
    Next7Days,
    LastMonth,
    ThisMonth,
    NextMonth,
    Last90Days,
    Next90Days,
    LastNDays,
    NextNDays,
}

impl FilterOperator {
    pub fn needs_value(self) -> bool {
        use FilterOperator::*;
        matches!(
            self,
            EqualTo
                | DoesNotEqual
                | GreaterThan
                | GreaterThanOrEqual
                | LessThan
                | LessThanOrEqual
                | StartsWith
                | EndsWith
                | Contains
                | DoesNotContain
                | LastNDays
                | NextNDays
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Filter {
    pub filter_column_index: Option<usize>,
    pub operator: Option<FilterOperator>,

    #[serde(deserialize_with = "loose_string")]
    pub filter_value: Option<String>,

    pub case_sensitive: bool,
}

impl Filter {
    fn value(&self, node: NodeRef<'_>) -> Result<&str> {
        self.filter_value
            .as_deref()
            .ok_or_else(|| CompileError::missing_setting(node.id(), "FilterValue"))
    }

    /// The filter value written as a literal of the column's type.
    fn literal(&self, node: NodeRef<'_>, type_name: &str) -> Result<String> {
        let dialect = node.dialect();
        let value = self.value(node)?;
        match dialect.classify(type_name) {
            TypeClass::Boolean => parse_bool(value)
                .map(|b| dialect.bool_literal(b).to_string())
                .ok_or_else(|| {
                    CompileError::invalid_literal(node.id(), value, "expected true or false")
                }),
            TypeClass::Text | TypeClass::Date => Ok(dialect.quote_string(value)),
            // Opaque types are never quoted, so only numbers may pass through.
            TypeClass::Numeric | TypeClass::Opaque => {
                let trimmed = value.trim();
                if trimmed.parse::<f64>().is_ok_and(f64::is_finite) {
                    Ok(trimmed.to_string())
                } else {
                    Err(CompileError::invalid_literal(
                        node.id(),
                        value,
                        "expected a number",
                    ))
                }
            }
        }
    }

    fn day_count(&self, node: NodeRef<'_>) -> Result<i64> {
        let value = self.value(node)?;
        match value.trim().parse::<i64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(CompileError::invalid_literal(
                node.id(),
                value,
                "expected a positive whole number of days",
            )),
        }
    }

    fn predicate(&self, node: NodeRef<'_>) -> Result<String> {
        use FilterOperator::*;

        let dialect = node.dialect();
        let index = self
            .filter_column_index
            .ok_or_else(|| CompileError::missing_setting(node.id(), "FilterColumnIndex"))?;
        let operator = self
            .operator
            .ok_or_else(|| CompileError::missing_setting(node.id(), "Operator"))?;
        let projection = node.input(0)?.projection()?;
        let type_name = projection.column(node.id(), index)?.type_name.as_str();
        let col = column_alias(index);
        let is_text = dialect.is_text(type_name);

        let sql = match operator {
            EqualTo | DoesNotEqual | GreaterThan | GreaterThanOrEqual | LessThan
            | LessThanOrEqual => {
                let op = comparison_operator(operator);
                let literal = self.literal(node, type_name)?;
                if is_text && matches!(operator, EqualTo | DoesNotEqual) {
                    dialect.compare_text(&col, op, &literal, self.case_sensitive)
                } else {
                    format!("{} {} {}", col, op, literal)
                }
            }
            StartsWith | EndsWith | Contains | DoesNotContain => {
                let value = dialect.escape_like(&self.value(node)?);
                let pattern = match operator {
                    StartsWith => format!("{}%", value),
                    EndsWith => format!("%{}", value),
                    _ => format!("%{}%", value),
                };
                let op = if operator == DoesNotContain {
                    "NOT LIKE"
                } else {
                    "LIKE"
                };
                let lhs = if is_text {
                    col
                } else {
                    dialect.cast_to_text(&col, type_name)
                };
                let test = dialect.compare_text(
                    &lhs,
                    op,
                    &dialect.quote_string(&pattern),
                    self.case_sensitive,
                );
                format!("{} {}", test, dialect.like_escape())
            }
            IsEmpty if is_text => format!("({c} IS NULL OR {c} = '')", c = col),
            IsEmpty => format!("{} IS NULL", col),
            IsNotEmpty if is_text => format!("({c} IS NOT NULL AND {c} <> '')", c = col),
            IsNotEmpty => format!("{} IS NOT NULL", col),
            Today => format!("{} = 0", dialect.day_offset(&col)),
            Last24Hours => format!(
                "{} BETWEEN {} AND {}",
                col,
                dialect.hours_from_now(-24),
                dialect.now()
            ),
            Next24Hours => format!(
                "{} BETWEEN {} AND {}",
                col,
                dialect.now(),
                dialect.hours_from_now(24)
            ),
            Last7Days => day_window(dialect, &col, -7, -1),
            Next7Days => day_window(dialect, &col, 1, 7),
            Last90Days => day_window(dialect, &col, -90, -1),
            Next90Days => day_window(dialect, &col, 1, 90),
            LastNDays => day_window(dialect, &col, -self.day_count(node)?, -1),
            NextNDays => day_window(dialect, &col, 1, self.day_count(node)?),
            LastMonth => format!("{} = -1", dialect.month_offset(&col)),
            ThisMonth => format!("{} = 0", dialect.month_offset(&col)),
            NextMonth => format!("{} = 1", dialect.month_offset(&col)),
        };
        Ok(sql)
    }
}

fn comparison_operator(operator: FilterOperator) -> &'static str {
    match operator {
        FilterOperator::DoesNotEqual => "<>",
        FilterOperator::GreaterThan => ">",
        FilterOperator::GreaterThanOrEqual => ">=",
        FilterOperator::LessThan => "<",
        FilterOperator::LessThanOrEqual => "<=",
        _ => "=",
    }
}

/// Inclusive range of whole days relative to today.
fn day_window(dialect: Dialect, col: &str, from: i64, to: i64) -> String {
    format!("{} BETWEEN {} AND {}", dialect.day_offset(col), from, to)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

impl Variant for Filter {
    fn is_configured(&self, node: NodeRef<'_>) -> bool {
        let (Some(index), Some(operator)) = (self.filter_column_index, self.operator) else {
            return false;
        };
        if operator.needs_value() && self.filter_value.is_none() {
            return false;
        }
        node.inputs_resolved(1)
            && node
                .input(0)
                .and_then(|i| i.projection())
                .is_ok_and(|p| index < p.len())
    }

    fn query_sql(&self, node: NodeRef<'_>) -> Result<String> {
        Ok(format!(
            "SELECT * FROM {} WHERE {}",
            node.input(0)?.dependency_sql()?,
            self.predicate(node)?
        ))
    }

    /// Rows keep their input's column layout, so does the ordering.
    fn sort_key(&self, node: NodeRef<'_>) -> Result<SortKey> {
        node.input(0)?.sort_key()
    }
}
