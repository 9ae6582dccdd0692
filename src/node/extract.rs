//! Extract: appends one column holding a substring of an input column.
//!
//! The substring is described by a start anchor and an end anchor. All
//! position arithmetic is 1-based, like SQL's `SUBSTRING`.

use super::{Column, NodeRef, Projection, SortKey, Variant, column_alias};
use crate::Result;
use crate::error::CompileError;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum StartType {
    #[default]
    Beginning,
    Position,
    FirstOccurrence,
    AfterFirstOccurrence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum EndType {
    #[default]
    End,
    Position,
    Length,
    NextOccurrence,
    AfterNextOccurrence,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Extract {
    pub input_column_index: Option<usize>,
    pub start_type: StartType,
    pub start_position: Option<i64>,
    pub start_search: Option<String>,
    pub end_type: EndType,
    pub end_position: Option<i64>,
    pub end_length: Option<i64>,
    pub end_search: Option<String>,

    /// Logical name of the new column.
    pub column_name: Option<String>,
}

impl Extract {
    fn source_index(&self, node: NodeRef<'_>) -> Result<usize> {
        self.input_column_index
            .ok_or_else(|| CompileError::missing_setting(node.id(), "InputColumnIndex"))
    }

    fn search<'a>(
        node: NodeRef<'_>,
        value: &'a Option<String>,
        setting: &'static str,
    ) -> Result<&'a str> {
        value
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CompileError::missing_setting(node.id(), setting))
    }

    fn positive(node: NodeRef<'_>, value: Option<i64>, setting: &'static str) -> Result<i64> {
        match value {
            Some(n) if n >= 1 => Ok(n),
            Some(n) => Err(CompileError::invalid_literal(
                node.id(),
                n.to_string(),
                "positions and lengths start at 1",
            )),
            None => Err(CompileError::missing_setting(node.id(), setting)),
        }
    }

    /// 1-based start position expression.
    fn start_expr(&self, node: NodeRef<'_>, source: &str) -> Result<String> {
        let dialect = node.dialect();
        let expr = match self.start_type {
            StartType::Beginning => "1".to_string(),
            StartType::Position => {
                Self::positive(node, self.start_position, "StartPosition")?.to_string()
            }
            StartType::FirstOccurrence => {
                let needle = Self::search(node, &self.start_search, "StartSearch")?;
                dialect.locate(&dialect.quote_string(needle), source, None)
            }
            StartType::AfterFirstOccurrence => {
                let needle = Self::search(node, &self.start_search, "StartSearch")?;
                format!(
                    "({} + {})",
                    dialect.locate(&dialect.quote_string(needle), source, None),
                    needle.chars().count()
                )
            }
        };
        Ok(expr)
    }

    /// Length expression given the start expression.
    fn length_expr(&self, node: NodeRef<'_>, source: &str, start: &str) -> Result<String> {
        let dialect = node.dialect();
        // The next occurrence is searched for strictly after the start.
        let search_from = format!("{} + 1", start);
        let expr = match self.end_type {
            EndType::End => format!("{}({})", dialect.length_function(), source),
            EndType::Position => {
                let end = Self::positive(node, self.end_position, "EndPosition")?;
                format!("{} - {} + 1", end, start)
            }
            EndType::Length => Self::positive(node, self.end_length, "EndLength")?.to_string(),
            EndType::NextOccurrence => {
                let needle = Self::search(node, &self.end_search, "EndSearch")?;
                format!(
                    "{} - {}",
                    dialect.locate(&dialect.quote_string(needle), source, Some(&search_from)),
                    start
                )
            }
            EndType::AfterNextOccurrence => {
                let needle = Self::search(node, &self.end_search, "EndSearch")?;
                format!(
                    "{} + {} - {}",
                    dialect.locate(&dialect.quote_string(needle), source, Some(&search_from)),
                    needle.chars().count(),
                    start
                )
            }
        };
        Ok(expr)
    }

    fn substring_expr(&self, node: NodeRef<'_>) -> Result<String> {
        let dialect = node.dialect();
        let index = self.source_index(node)?;
        let projection = node.input(0)?.projection()?;
        let type_name = &projection.column(node.id(), index)?.type_name;

        let col = column_alias(index);
        let source = if dialect.needs_cast_before_substring(type_name) {
            dialect.cast_to_text(&col, type_name)
        } else {
            col
        };
        let start = self.start_expr(node, &source)?;
        let length = self.length_expr(node, &source, &start)?;
        Ok(dialect.substring(&source, &start, &length))
    }
}

impl Variant for Extract {
    fn projection(&self, node: NodeRef<'_>) -> Result<Projection> {
        let mut out = node.input(0)?.projection()?;
        let index = self.source_index(node)?;
        let source = out.column(node.id(), index)?.clone();

        let dialect = node.dialect();
        let type_name = if dialect.is_date(&source.type_name) {
            dialect.text_type_name().to_string()
        } else {
            source.type_name.clone()
        };
        let name = self
            .column_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("{} (extract)", source.name));
        out.push(Column::new(name, type_name));
        Ok(out)
    }

    fn is_configured(&self, node: NodeRef<'_>) -> bool {
        node.inputs_resolved(1) && self.substring_expr(node).is_ok()
    }

    fn query_sql(&self, node: NodeRef<'_>) -> Result<String> {
        let input = node.input(0)?;
        let new_index = input.projection()?.len();
        Ok(format!(
            "SELECT *, {} AS {} FROM {}",
            self.substring_expr(node)?,
            column_alias(new_index),
            input.dependency_sql()?
        ))
    }

    fn sort_key(&self, node: NodeRef<'_>) -> Result<SortKey> {
        node.input(0)?.sort_key()
    }
}
