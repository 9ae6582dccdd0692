//! Node documents: a flat list of `Type`-tagged node objects.
//!
//! JSON shape:
//! [
//!   { "Id": "orders", "Type": "TableSource", "Table": "dbo.Orders" },
//!   { "Id": "big", "Type": "Filter", "Inputs": ["orders"],
//!     "FilterColumnIndex": 2, "Operator": "GreaterThan", "FilterValue": 100 }
//! ]
//!
//! An object `{ "nodes": [...] }` is accepted too. Variant settings are
//! deserialized straight into the node variants; unknown `Type` tags and
//! unknown enumeration values (operator, join type...) fail here.

use crate::node::NodeKind;
use serde::de::Deserializer;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeSpec {
    pub id: String,

    /// Ids of the producer nodes, in input order.
    #[serde(default)]
    pub inputs: Vec<String>,

    #[serde(flatten)]
    pub kind: NodeKind,
}

/// Parse a node document.
///
/// The wrapper object is peeled off by hand rather than through an untagged
/// enum so that a bad `Operator` or `Type` keeps serde's precise message.
pub fn parse_graph_document(text: &str) -> serde_json::Result<Vec<NodeSpec>> {
    let mut value: serde_json::Value = serde_json::from_str(text)?;
    if let Some(nodes) = value.get_mut("nodes") {
        value = nodes.take();
    }
    serde_json::from_value(value)
}

/// Accept a string, number or bool where a textual setting is expected.
///
/// The UI layer is loose about this: `"FilterValue": 365` and
/// `"FilterValue": "365"` mean the same thing.
pub(crate) fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        serde_json::Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, number or bool, found {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::filter::FilterOperator;
    use serde_json::json;

    #[test]
    fn parses_tagged_nodes_with_settings() {
        let doc = json!({
            "nodes": [
                { "Id": "t", "Type": "TableSource", "Table": "orders" },
                { "Id": "f", "Type": "Filter", "Inputs": ["t"],
                  "FilterColumnIndex": 1, "Operator": "LastNDays", "FilterValue": 30 }
            ]
        });
        let nodes = parse_graph_document(&doc.to_string()).unwrap();

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].inputs, vec!["t".to_string()]);
        match &nodes[1].kind {
            NodeKind::Filter(f) => {
                assert_eq!(f.filter_column_index, Some(1));
                assert_eq!(f.operator, Some(FilterOperator::LastNDays));
                assert_eq!(f.filter_value.as_deref(), Some("30"));
            }
            other => panic!("expected a filter, got {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_enumeration_values() {
        let err = parse_graph_document(
            r#"[ { "Id": "f", "Type": "Filter", "Operator": "RoughlyEqual" } ]"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("RoughlyEqual"));

        let err = serde_json::from_value::<Vec<NodeSpec>>(json!([
            { "Id": "x", "Type": "Pivot" }
        ]));
        assert!(err.is_err());
    }
}
