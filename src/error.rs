use thiserror::Error;

/// Failures raised while wiring a graph or rendering its SQL.
///
/// Every variant that concerns a single node carries that node's id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("duplicate node id '{0}'")]
    DuplicateNodeId(String),

    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error("node '{node}' references input '{input}' which is not in the graph")]
    UnknownInput { node: String, input: String },

    #[error("node '{node}' needs input #{index} but declares only {declared}")]
    MissingInput {
        node: String,
        index: usize,
        declared: usize,
    },

    #[error("node '{node}' references column index {index} but only {len} columns are available")]
    ColumnIndexOutOfRange {
        node: String,
        index: usize,
        len: usize,
    },

    #[error("node '{node}' is missing required setting '{setting}'")]
    MissingSetting { node: String, setting: &'static str },

    #[error("node '{node}' reads table '{table}' which is not in the schema catalog")]
    UnknownTable { node: String, table: String },

    #[error("node '{node}' has invalid value {value:?}: {reason}")]
    InvalidLiteral {
        node: String,
        value: String,
        reason: &'static str,
    },

    #[error("page at offset {offset} with limit {limit} is past the last addressable row")]
    PageOutOfRange { offset: u64, limit: u64 },
}

impl CompileError {
    pub fn missing_setting(node: &str, setting: &'static str) -> Self {
        CompileError::MissingSetting {
            node: node.to_string(),
            setting,
        }
    }

    pub fn column_out_of_range(node: &str, index: usize, len: usize) -> Self {
        CompileError::ColumnIndexOutOfRange {
            node: node.to_string(),
            index,
            len,
        }
    }

    pub fn invalid_literal(node: &str, value: impl Into<String>, reason: &'static str) -> Self {
        CompileError::InvalidLiteral {
            node: node.to_string(),
            value: value.into(),
            reason,
        }
    }
}
