//! Chart projection: narrows its input to a horizontal axis plus the data
//! series a chart plots.

use super::{NodeRef, Projection, SortKey, Variant, column_alias};
use crate::Result;
use crate::error::CompileError;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum ChartType {
    #[default]
    #[serde(rename = "Line Chart")]
    Line,
    #[serde(rename = "Bar Chart")]
    Bar,
    #[serde(rename = "Pie Chart")]
    Pie,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ChartProjection {
    pub chart_type: ChartType,
    pub horizontal_column_index: Option<usize>,
    pub data_series_column_indexes: Option<Vec<usize>>,

    /// Single implied series, used when no series list is given.
    pub value_column_index: Option<usize>,
}

impl ChartProjection {
    /// Input column of the axis, when it names an existing column.
    fn axis(&self, input: &Projection) -> Option<usize> {
        self.horizontal_column_index.filter(|&i| i < input.len())
    }

    fn series(&self) -> Vec<usize> {
        match &self.data_series_column_indexes {
            Some(indexes) if !indexes.is_empty() => indexes.clone(),
            _ => self.value_column_index.into_iter().collect(),
        }
    }

    /// Input column indexes in output order.
    fn picks(&self, node: NodeRef<'_>) -> Result<Vec<usize>> {
        let input = node.input(0)?.projection()?;
        let series = self.series();
        if series.is_empty() {
            return Err(CompileError::missing_setting(
                node.id(),
                "DataSeriesColumnIndexes",
            ));
        }
        for &index in &series {
            input.column(node.id(), index)?;
        }
        Ok(self.axis(&input).into_iter().chain(series).collect())
    }
}

impl Variant for ChartProjection {
    fn projection(&self, node: NodeRef<'_>) -> Result<Projection> {
        let input = node.input(0)?.projection()?;
        let picks = self.picks(node)?;
        Ok(Projection::new(
            picks
                .into_iter()
                .filter_map(|i| input.get(i).cloned())
                .collect(),
        ))
    }

    fn is_configured(&self, node: NodeRef<'_>) -> bool {
        node.inputs_resolved(1) && self.picks(node).is_ok()
    }

    fn query_sql(&self, node: NodeRef<'_>) -> Result<String> {
        let select = self
            .picks(node)?
            .into_iter()
            .enumerate()
            .map(|(k, i)| format!("{} AS {}", column_alias(i), column_alias(k)))
            .collect::<Vec<_>>();
        Ok(format!(
            "SELECT {} FROM {}",
            select.join(", "),
            node.input(0)?.dependency_sql()?
        ))
    }

    /// Line charts are ordered along their axis, output column 0. Other
    /// charts keep the input's ordering.
    fn sort_key(&self, node: NodeRef<'_>) -> Result<SortKey> {
        let input = node.input(0)?;
        if self.chart_type == ChartType::Line && self.axis(&input.projection()?).is_some() {
            return Ok(SortKey::default());
        }
        Ok(input.sort_key()?.remap(&self.picks(node)?))
    }
}
