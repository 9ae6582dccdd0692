//! Uniform wording for user-facing warnings and errors.

/// Prefix a message so errors from this tool are recognisable in mixed logs.
pub fn error_message(msg: impl AsRef<str>) -> String {
    format!("query-graph: {}", msg.as_ref())
}

/// Advisory problem that does not stop compilation.
pub fn warn(msg: impl AsRef<str>) {
    log::warn!("{}", error_message(msg));
}
