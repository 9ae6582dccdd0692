//! Resolved compile options: target dialect, statement strategy and page.
//!
//! Values come from CLI flags; the dialect falls back to the
//! `QUERY_GRAPH_DIALECT` environment variable.

use crate::dialect::{Dialect, Strategy};
use crate::graph::Graph;
use crate::statement::Page;

use std::env;
use thiserror::Error;

pub const DIALECT_ENV: &str = "QUERY_GRAPH_DIALECT";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no dialect given: pass --dialect or set QUERY_GRAPH_DIALECT")]
    MissingDialect,

    #[error("invalid {field}: {message}")]
    Parse {
        field: &'static str,
        message: String,
    },

    #[error("--offset requires --limit")]
    OffsetWithoutLimit,
}

/// Raw option values before validation.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub dialect: Option<String>,
    pub strategy: Option<String>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileConfig {
    pub dialect: Dialect,

    /// `None` keeps the dialect's default strategy.
    pub strategy: Option<Strategy>,

    pub page: Option<Page>,
}

impl CompileConfig {
    /// Validate CLI values, reading the dialect from the environment when
    /// no flag was given.
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let from_env = env::var(DIALECT_ENV).ok().filter(|v| !v.trim().is_empty());
        Self::resolve(cli, from_env)
    }

    fn resolve(cli: CliConfig, env_dialect: Option<String>) -> Result<Self, ConfigError> {
        let dialect = cli
            .dialect
            .or(env_dialect)
            .ok_or(ConfigError::MissingDialect)?
            .parse::<Dialect>()
            .map_err(|message| ConfigError::Parse {
                field: "dialect",
                message,
            })?;
        let strategy = cli
            .strategy
            .map(|s| s.parse::<Strategy>())
            .transpose()
            .map_err(|message| ConfigError::Parse {
                field: "strategy",
                message,
            })?;
        let page = match (cli.offset, cli.limit) {
            (Some(_), None) => return Err(ConfigError::OffsetWithoutLimit),
            (offset, Some(limit)) => Some(Page::new(offset.unwrap_or(0), limit)),
            (None, None) => None,
        };
        Ok(Self {
            dialect,
            strategy,
            page,
        })
    }

    pub fn effective_strategy(&self) -> Strategy {
        self.strategy
            .unwrap_or_else(|| self.dialect.default_strategy())
    }

    /// Apply the strategy override to a graph built for this dialect.
    pub fn apply(&self, graph: Graph) -> Graph {
        graph.with_strategy(self.effective_strategy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cli(dialect: Option<&str>) -> CliConfig {
        CliConfig {
            dialect: dialect.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn flag_wins_over_environment() {
        let config =
            CompileConfig::resolve(cli(Some("mssql")), Some("postgres".into())).unwrap();
        assert_eq!(config.dialect, Dialect::SqlServer);
        assert_eq!(config.effective_strategy(), Strategy::CommonTableExpressions);
        assert_eq!(config.page, None);
    }

    #[test]
    fn environment_is_the_fallback() {
        let config = CompileConfig::resolve(cli(None), Some("MySQL".into())).unwrap();
        assert_eq!(config.dialect, Dialect::MySql);
        assert_eq!(
            CompileConfig::resolve(cli(None), None).unwrap_err(),
            ConfigError::MissingDialect
        );
    }

    #[test]
    fn strategy_override_and_page() {
        let config = CompileConfig::resolve(
            CliConfig {
                dialect: Some("postgresql".into()),
                strategy: Some("inline".into()),
                offset: None,
                limit: Some(25),
            },
            None,
        )
        .unwrap();
        assert_eq!(config.effective_strategy(), Strategy::Inline);
        assert_eq!(config.page, Some(Page::new(0, 25)));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            CompileConfig::resolve(cli(Some("oracle")), None).unwrap_err(),
            ConfigError::Parse { field: "dialect", .. }
        ));
        let err = CompileConfig::resolve(
            CliConfig {
                dialect: Some("mysql".into()),
                offset: Some(10),
                ..Default::default()
            },
            None,
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::OffsetWithoutLimit);
    }
}
