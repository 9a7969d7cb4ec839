//! Generator configuration.
//!
//! The configuration is a static YAML document read once per run, by default
//! from `openapi-generator.yaml` at the project root. Every key is optional.
//!
//! ```yaml
//! title: Blog API
//! create_factories: false
//! class_maps:
//!   crate::support::Money: { amount: 100, currency: EUR }
//! resource_maps:
//!   crate::resources::ProfileResource: crate::models::User
//! endpoint_maps:
//!   users.index:
//!     response: crate::resources::UserResource::collection
//!     request: { page: integer }
//! factories:
//!   crate::models::User:
//!     attributes: { name: Ada, email: ada@example.com }
//!     states:
//!       documentation: { name: Documented User }
//! ```

use crate::factory::{FactoryDefinition, Materialization};
use crate::routes::manifest::ManifestRoute;
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Complete configuration of one generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Document title
    pub title: String,
    /// Document version; `APP_VERSION` is consulted when unset
    pub version: Option<String>,
    /// Document description
    pub description: String,
    /// Source directory of the analysed crate, relative to the project root
    pub source_dir: PathBuf,
    /// Output file, relative to the working directory (stdout when unset)
    pub output: Option<PathBuf>,
    /// Persist example instances instead of building transient ones
    pub create_factories: bool,
    /// Named factory state preferred when materializing examples
    pub factory_state: String,
    /// Envelope key transformers wrap their output in (`null` disables it)
    pub resource_wrap: Option<String>,
    /// Type name → example value for bare domain/class responses
    pub class_maps: BTreeMap<String, Value>,
    /// Transformer name → model type name (string) or literal input value
    pub resource_maps: BTreeMap<String, Value>,
    /// Endpoint identity (route name or handler identity) → overrides
    pub endpoint_maps: BTreeMap<String, EndpointOverride>,
    /// Example fixtures keyed by model type name
    pub factories: BTreeMap<String, FactoryDefinition>,
    /// How transformer/validator/domain capabilities are recognised
    pub capabilities: CapabilityConfig,
    /// Tunables of the handler analyzer
    pub analysis: AnalysisConfig,
    /// Route URIs that never produce endpoints
    pub ignore_uris: Vec<String>,
    /// HTTP verbs that never produce endpoints
    pub ignore_methods: Vec<String>,
    /// Inline route table, used when no route manifest is given
    pub routes: Vec<ManifestRoute>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            version: None,
            description: String::new(),
            source_dir: PathBuf::from("src"),
            output: None,
            create_factories: false,
            factory_state: "documentation".to_string(),
            resource_wrap: Some("data".to_string()),
            class_maps: BTreeMap::new(),
            resource_maps: BTreeMap::new(),
            endpoint_maps: BTreeMap::new(),
            factories: BTreeMap::new(),
            capabilities: CapabilityConfig::default(),
            analysis: AnalysisConfig::default(),
            ignore_uris: vec!["{fallbackPlaceholder}".to_string()],
            ignore_methods: vec!["HEAD".to_string(), "OPTIONS".to_string()],
            routes: Vec::new(),
        }
    }
}

/// Developer-supplied replacement for the inferred contract of one endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointOverride {
    pub request: Option<RequestOverride>,
    pub response: Option<ResponseOverride>,
}

/// Request override: a validator type to read rules from, or the rules themselves
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestOverride {
    Validator(String),
    Rules(serde_json::Map<String, Value>),
}

/// Response override: a transformer/type reference (`::collection` suffix allowed)
/// or a literal example
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseOverride {
    Reference(String),
    Example {
        example: Value,
        #[serde(default)]
        status: Option<u16>,
    },
}

/// Marker traits/derives and explicit type lists per capability
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityConfig {
    pub transformer_markers: Vec<String>,
    pub validator_markers: Vec<String>,
    pub domain_markers: Vec<String>,
    pub transformers: Vec<String>,
    pub validators: Vec<String>,
    pub domain_objects: Vec<String>,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            transformer_markers: strings(&["Transformer", "JsonResource", "Resource"]),
            validator_markers: strings(&["Validator", "FormRequest"]),
            domain_markers: strings(&["Model", "Entity"]),
            transformers: Vec::new(),
            validators: Vec::new(),
            domain_objects: Vec::new(),
        }
    }
}

/// Method-name conventions the handler analyzer recognises
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// "respond with body + status" calls
    pub responder_methods: Vec<String>,
    /// Calls on a domain object that yield a collection
    pub collection_methods: Vec<String>,
    /// Calls on a domain object that yield a paginated collection
    pub paginate_methods: Vec<String>,
    /// Static calls on a transformer that yield a collection
    pub transformer_collection_methods: Vec<String>,
    /// Routine of a validator type returning its rule set
    pub rules_method: String,
    /// Field of a domain object used as its route key
    pub route_key_field: String,
    /// Request extractors unwrapped to reach a parameter's declared type
    pub extractor_wrappers: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            responder_methods: strings(&["json"]),
            collection_methods: strings(&[
                "all",
                "list",
                "paginate",
                "simple_paginate",
                "get_all",
                "collect",
            ]),
            paginate_methods: strings(&["paginate", "simple_paginate"]),
            transformer_collection_methods: strings(&["collection"]),
            rules_method: "rules".to_string(),
            route_key_field: "id".to_string(),
            extractor_wrappers: strings(&[
                "Path",
                "Json",
                "Query",
                "Form",
                "State",
                "Extension",
                "Valid",
                "Validated",
            ]),
        }
    }
}

impl AnalysisConfig {
    pub fn is_responder(&self, name: &str) -> bool {
        contains_ignore_case(&self.responder_methods, name)
    }

    pub fn is_collection_method(&self, name: &str) -> bool {
        self.collection_methods.iter().any(|m| m == name)
    }

    pub fn is_paginate_method(&self, name: &str) -> bool {
        self.paginate_methods.iter().any(|m| m == name)
    }

    pub fn is_transformer_collection(&self, name: &str) -> bool {
        self.transformer_collection_methods.iter().any(|m| m == name)
    }

    pub fn is_extractor_wrapper(&self, name: &str) -> bool {
        self.extractor_wrappers.iter().any(|m| m == name)
    }
}

impl GeneratorConfig {
    /// Default configuration file name, looked up at the project root
    pub const FILE_NAME: &'static str = "openapi-generator.yaml";

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML for this schema.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: GeneratorConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Loads `openapi-generator.yaml` from the project root, or the defaults when absent.
    pub fn discover(project_path: &Path) -> Result<Self> {
        let candidate = project_path.join(Self::FILE_NAME);
        if candidate.is_file() {
            info!("Using configuration: {}", candidate.display());
            Self::load(&candidate)
        } else {
            debug!("No {} in project, using defaults", Self::FILE_NAME);
            Ok(Self::default())
        }
    }

    /// Version written to the document's info block
    pub fn info_version(&self) -> String {
        self.version
            .clone()
            .or_else(|| std::env::var("APP_VERSION").ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| "1.0.0".to_string())
    }

    pub fn materialization(&self) -> Materialization {
        if self.create_factories {
            Materialization::Create
        } else {
            Materialization::Make
        }
    }

    pub fn is_ignored_uri(&self, uri: &str) -> bool {
        self.ignore_uris.iter().any(|u| u == uri)
    }

    pub fn is_ignored_method(&self, method: &str) -> bool {
        contains_ignore_case(&self.ignore_methods, method)
    }
}

/// Looks up a type-keyed map by canonical name, then by unique short name.
///
/// Keys may be written as `crate::models::User` or just `User`.
pub fn lookup_by_type<'m, V>(map: &'m BTreeMap<String, V>, type_name: &str) -> Option<&'m V> {
    if let Some(value) = map.get(type_name) {
        return Some(value);
    }
    let short = short_name(type_name);
    let mut matches = map.iter().filter(|(key, _)| short_name(key) == short);
    match (matches.next(), matches.next()) {
        (Some((_, value)), None) => Some(value),
        _ => None,
    }
}

/// Last `::` segment of a path
pub fn short_name(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

fn contains_ignore_case(list: &[String], name: &str) -> bool {
    list.iter().any(|m| m.eq_ignore_ascii_case(name))
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
