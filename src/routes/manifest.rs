//! Route manifests.
//!
//! ```yaml
//! - uri: users/{user}
//!   methods: [GET, HEAD]
//!   handler: crate::http::controllers::UserController::show
//!   name: users.show
//!   prefix: api
//!   middleware: [auth]
//! - uri: health
//!   method: GET
//! ```
//!
//! A route without `handler` is an inline closure.

use super::{HandlerIdentity, RouteAction, RouteProvider, RouteRecord};
use anyhow::{bail, Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One route entry of a manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestRoute {
    pub uri: String,
    pub methods: Vec<String>,
    /// Single-verb shorthand for `methods`
    pub method: Option<String>,
    pub handler: Option<String>,
    pub name: Option<String>,
    pub prefix: Option<String>,
    pub middleware: Vec<String>,
}

impl ManifestRoute {
    fn to_record(&self) -> RouteRecord {
        let mut methods: Vec<String> = self.methods.iter().map(|m| m.to_uppercase()).collect();
        if let Some(method) = &self.method {
            methods.push(method.to_uppercase());
        }

        let action = match self.handler.as_deref().map(HandlerIdentity::parse) {
            Some(Some(identity)) => RouteAction::Handler(identity),
            Some(None) => {
                warn!("Unrecognized handler `{}` for {}", self.handler.as_deref().unwrap_or_default(), self.uri);
                RouteAction::Inline
            }
            None => RouteAction::Inline,
        };

        RouteRecord {
            uri: self.uri.clone(),
            methods,
            action,
            name: self.name.clone(),
            prefix: self.prefix.clone(),
            middleware: self.middleware.clone(),
        }
    }
}

/// Route provider over a static list of manifest entries
#[derive(Debug, Clone, Default)]
pub struct ManifestRouteProvider {
    entries: Vec<ManifestRoute>,
}

impl ManifestRouteProvider {
    pub fn new(entries: Vec<ManifestRoute>) -> Self {
        Self { entries }
    }

    /// Loads a manifest file; `.json` files are read as JSON, anything else as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading route manifest from {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read route manifest: {}", path.display()))?;

        let entries: Vec<ManifestRoute> = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse route manifest: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse route manifest: {}", path.display()))?
        };

        Ok(Self::new(entries))
    }
}

impl RouteProvider for ManifestRouteProvider {
    fn routes(&self) -> Result<Vec<RouteRecord>> {
        let mut records = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if entry.uri.is_empty() && entry.methods.is_empty() && entry.method.is_none() {
                bail!("Route manifest entry without uri or methods: {:?}", entry);
            }
            records.push(entry.to_record());
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MANIFEST: &str = r#"
- uri: users/{user}
  methods: [get, HEAD]
  handler: crate::http::UserController::show
  name: users.show
  prefix: api
  middleware: [auth]
- uri: health
  method: GET
"#;

    #[test]
    fn test_yaml_manifest() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();

        let routes = ManifestRouteProvider::from_file(file.path()).unwrap().routes().unwrap();
        assert_eq!(routes.len(), 2);

        assert_eq!(routes[0].methods, vec!["GET", "HEAD"]);
        assert_eq!(
            routes[0].action,
            RouteAction::Handler(HandlerIdentity::new("crate::http::UserController", "show"))
        );
        assert_eq!(routes[0].name.as_deref(), Some("users.show"));
        assert_eq!(routes[0].middleware, vec!["auth"]);

        assert_eq!(routes[1].methods, vec!["GET"]);
        assert_eq!(routes[1].action, RouteAction::Inline);
    }

    #[test]
    fn test_json_manifest() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(br#"[{"uri": "posts", "method": "post", "handler": "PostController@store"}]"#)
            .unwrap();

        let routes = ManifestRouteProvider::from_file(file.path()).unwrap().routes().unwrap();
        assert_eq!(routes[0].methods, vec!["POST"]);
        assert_eq!(
            routes[0].action,
            RouteAction::Handler(HandlerIdentity::new("PostController", "store"))
        );
    }

    #[test]
    fn test_invalid_manifest() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(b"uri: not-a-list").unwrap();
        assert!(ManifestRouteProvider::from_file(file.path()).is_err());

        let provider = ManifestRouteProvider::new(vec![ManifestRoute::default()]);
        assert!(provider.routes().is_err());
    }
}
