//! Domain metadata describing the data resources a pipeline may reference

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where a metadata document came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataSource {
    Api,
    #[default]
    Manual,
    Mock,
    Error,
}

/// Workspaces, lakehouses and tables available to the caller
///
/// Treated as an opaque input by generation and validation; only
/// [`DomainMetadata::known_tables`] looks inside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainMetadata {
    #[serde(default)]
    pub workspaces: Vec<Workspace>,

    #[serde(default)]
    pub lakehouses: Vec<Lakehouse>,

    /// Table schemas entered by hand or fetched on demand
    #[serde(rename = "_tableSchemas", default, skip_serializing_if = "Vec::is_empty")]
    pub table_schemas: Vec<TableRef>,

    #[serde(rename = "_source", default)]
    pub source: MetadataSource,

    /// Explanation shown to the user when the source is mock or error
    #[serde(rename = "_message", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lakehouse {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
    #[serde(default)]
    pub tables: Vec<TableRef>,
}

/// A table listed either by bare name or as an object with a name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableRef {
    Name(String),
    Described {
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        columns: Vec<serde_json::Value>,
    },
}

impl TableRef {
    pub fn name(&self) -> &str {
        match self {
            TableRef::Name(name) => name,
            TableRef::Described { name, .. } => name,
        }
    }
}

impl DomainMetadata {
    /// Every table name mentioned in schema listings or lakehouse table lists
    pub fn known_tables(&self) -> BTreeSet<String> {
        let tables: BTreeSet<String> = self
            .table_schemas
            .iter()
            .chain(self.lakehouses.iter().flat_map(|lh| lh.tables.iter()))
            .map(|t| t.name().trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        debug!(table_count = tables.len(), "known_tables: collected");
        tables
    }

    /// Parse metadata from JSON text
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tables_accepts_names_and_objects() {
        let metadata: DomainMetadata = serde_json::from_value(serde_json::json!({
            "workspaces": [{ "id": "ws-1", "name": "Sales" }],
            "lakehouses": [{
                "id": "lh-1",
                "name": "sales_lakehouse",
                "tables": ["sales_raw", { "name": "customers", "columns": [{ "name": "id" }] }]
            }],
            "_tableSchemas": [{ "name": "products" }],
            "_source": "manual"
        }))
        .unwrap();

        let tables: Vec<String> = metadata.known_tables().into_iter().collect();
        assert_eq!(tables, vec!["customers", "products", "sales_raw"]);
        assert_eq!(metadata.source, MetadataSource::Manual);
    }

    #[test]
    fn test_known_tables_empty() {
        let metadata = DomainMetadata::default();
        assert!(metadata.known_tables().is_empty());
    }

    #[test]
    fn test_minimal_metadata_parses() {
        let metadata = DomainMetadata::from_json(r#"{"lakehouses":[{"name":"lh"}]}"#).unwrap();
        assert_eq!(metadata.lakehouses[0].name, "lh");
        assert!(metadata.lakehouses[0].tables.is_empty());
        assert!(metadata.workspaces.is_empty());
    }

    #[test]
    fn test_serialize_uses_wire_names() {
        let metadata = DomainMetadata {
            source: MetadataSource::Mock,
            message: Some("No credentials".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["_source"], "mock");
        assert_eq!(json["_message"], "No credentials");
        assert!(json.get("_tableSchemas").is_none());
    }
}
