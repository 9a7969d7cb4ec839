//! Serialization of generated documents to YAML or JSON.
//!
//! Output is deterministic: paths and definitions are sorted maps and example
//! objects keep the order they had in the analysed source.

use crate::openapi_builder::ApiDocument;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Serializes a document to YAML.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_yaml(doc: &ApiDocument) -> Result<String> {
    debug!("Serializing document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize document to YAML")
}

/// Serializes a document to pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json(doc: &ApiDocument) -> Result<String> {
    debug!("Serializing document to JSON");
    serde_json::to_string_pretty(doc).context("Failed to serialize document to JSON")
}

/// Writes string content to a file, creating parent directories as needed.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    fs::write(path, content).with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openapi_builder::{Info, SecurityScheme};
    use crate::schema_generator::Schema;
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn create_test_document() -> ApiDocument {
        let mut security_definitions = BTreeMap::new();
        security_definitions.insert("Bearer".to_string(), SecurityScheme::bearer());
        let mut definitions = BTreeMap::new();
        definitions.insert(
            "crate::models::User".to_string(),
            Schema::with_example("object", json!({"id": 1})),
        );

        ApiDocument {
            swagger: "2.0".to_string(),
            info: Info {
                version: "1.0.0".to_string(),
                title: "Test API".to_string(),
                description: String::new(),
            },
            security_definitions,
            tags: Vec::new(),
            paths: BTreeMap::new(),
            definitions,
        }
    }

    #[test]
    fn test_serialize_yaml() {
        let yaml = serialize_yaml(&create_test_document()).unwrap();

        assert!(yaml.contains("swagger: '2.0'") || yaml.contains("swagger: \"2.0\""));
        assert!(yaml.contains("title: Test API"));
        assert!(yaml.contains("securityDefinitions:"));
        assert!(yaml.contains("name: Authorization"));
        assert!(!yaml.contains("description:"));
        assert!(!yaml.contains("tags:"));
    }

    #[test]
    fn test_serialize_json_round_trips() {
        let doc = create_test_document();
        let json = serialize_json(&doc).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["swagger"], "2.0");
        assert_eq!(value["securityDefinitions"]["Bearer"]["in"], "header");
        assert_eq!(value["definitions"]["crate::models::User"]["example"]["id"], 1);

        let parsed: ApiDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.definitions, doc.definitions);
    }

    #[test]
    fn test_write_to_file_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docs/api/swagger.yaml");

        write_to_file("swagger: '2.0'\n", &path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "swagger: '2.0'\n");
    }

    #[test]
    fn test_write_to_file_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.json");

        write_to_file("first", &path).unwrap();
        write_to_file("second", &path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }
}
