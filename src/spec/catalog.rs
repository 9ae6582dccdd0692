//! Schema catalog: the table/column listing produced by schema discovery.
//!
//! JSON shape:
//! {
//!   "tables": [
//!     {
//!       "display_name": "dbo.Orders",
//!       "columns": [ { "name": "Id", "type": "int" }, ... ]
//!     }
//!   ]
//! }
//!
//! A bare array of tables is accepted too.
//!
//! A table is referenced in SQL by splitting its display name on `.` into
//! schema and table parts. Entries whose names themselves contain a dot (or
//! whose display name is not the SQL name at all) carry explicit `schema`
//! and `name` fields instead:
//!
//! { "display_name": "Orders (v1.2)", "schema": "sales", "name": "Orders v1.2" }

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "CatalogDocument")]
pub struct SchemaCatalog {
    pub tables: Vec<TableSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// SQL table name when it differs from the display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,

    /// Free-form type name as reported by the database (not normalised).
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    Wrapped { tables: Vec<TableSchema> },
    Bare(Vec<TableSchema>),
}

impl From<CatalogDocument> for SchemaCatalog {
    fn from(doc: CatalogDocument) -> Self {
        match doc {
            CatalogDocument::Wrapped { tables } | CatalogDocument::Bare(tables) => {
                SchemaCatalog { tables }
            }
        }
    }
}

impl SchemaCatalog {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self { tables }
    }

    /// First table whose display name matches exactly.
    pub fn find(&self, display_name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.display_name == display_name)
    }
}

impl TableSchema {
    pub fn new(display_name: impl Into<String>, columns: &[(&str, &str)]) -> Self {
        Self {
            display_name: display_name.into(),
            schema: None,
            name: None,
            columns: columns
                .iter()
                .map(|(name, type_name)| ColumnSchema {
                    name: name.to_string(),
                    type_name: type_name.to_string(),
                })
                .collect(),
        }
    }

    /// Identifier parts of the table reference, outermost first.
    pub fn path(&self) -> Vec<String> {
        if self.schema.is_none() && self.name.is_none() {
            return self.display_name.split('.').map(str::to_string).collect();
        }
        self.schema
            .iter()
            .cloned()
            .chain(Some(self.name.clone().unwrap_or_else(|| self.display_name.clone())))
            .collect()
    }
}
