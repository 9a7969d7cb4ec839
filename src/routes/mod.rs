//! Route table providers.
//!
//! The generator never discovers routes itself; a [`RouteProvider`] hands it
//! the application's route table. Two providers ship with the crate:
//!
//! - [`manifest::ManifestRouteProvider`]: a YAML/JSON route manifest, or the
//!   `routes:` list of the configuration
//! - [`axum::AxumRouteProvider`]: `Router` chains found in the crate's source
//!
//! # Example
//!
//! ```no_run
//! use openapi_from_handlers::routes::{RouteProvider, manifest::ManifestRouteProvider};
//! use std::path::Path;
//!
//! let provider = ManifestRouteProvider::from_file(Path::new("routes.yaml")).unwrap();
//! let routes = provider.routes().unwrap();
//! println!("Found {} routes", routes.len());
//! ```

pub mod axum;
pub mod manifest;

use std::fmt;

/// Source of the application's route table
pub trait RouteProvider {
    /// Every registered route, in registration order.
    ///
    /// # Errors
    ///
    /// Returns an error when the route table cannot be produced at all.
    fn routes(&self) -> anyhow::Result<Vec<RouteRecord>>;
}

/// One registered route
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRecord {
    /// URI pattern as registered (`users/{user}`, `/users/:id`)
    pub uri: String,
    /// HTTP verbs, upper-case
    pub methods: Vec<String>,
    pub action: RouteAction,
    /// Route name, used as endpoint identity when present
    pub name: Option<String>,
    /// Route group prefix, used as operation tag
    pub prefix: Option<String>,
    pub middleware: Vec<String>,
}

impl RouteRecord {
    pub fn new(uri: impl Into<String>, methods: Vec<String>, action: RouteAction) -> Self {
        Self {
            uri: uri.into(),
            methods,
            action,
            name: None,
            prefix: None,
            middleware: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteAction {
    /// Named handler routine
    Handler(HandlerIdentity),
    /// Inline closure; nothing to analyze
    Inline,
}

/// `(owner, routine)` of a handler: a type and one of its methods, or a
/// module and one of its free functions
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerIdentity {
    pub class: String,
    pub method: String,
}

impl HandlerIdentity {
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
        }
    }

    /// Parses `crate::http::UserController::show` or `UserController@show`.
    pub fn parse(action: &str) -> Option<Self> {
        let (class, method) = action
            .rsplit_once('@')
            .or_else(|| action.rsplit_once("::"))?;
        if class.is_empty() || method.is_empty() {
            return None;
        }
        Some(Self::new(class, method))
    }
}

impl fmt::Display for HandlerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.class, self.method)
    }
}

/// HTTP methods routes can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    /// Parse HTTP method from string, case-insensitively
    pub fn parse(method: &str) -> Option<Self> {
        match method.to_lowercase().as_str() {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            "put" => Some(HttpMethod::Put),
            "delete" => Some(HttpMethod::Delete),
            "patch" => Some(HttpMethod::Patch),
            "head" => Some(HttpMethod::Head),
            "options" => Some(HttpMethod::Options),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        }
    }

    /// Verbs whose input travels in the request body
    pub fn has_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

/// Joins a prefix and a path with exactly one slash between them
pub fn combine_paths(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return path.to_string();
    }

    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        prefix.to_string()
    } else {
        format!("{}/{}", prefix, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_identity_parse() {
        assert_eq!(
            HandlerIdentity::parse("crate::http::UserController::show"),
            Some(HandlerIdentity::new("crate::http::UserController", "show"))
        );
        assert_eq!(
            HandlerIdentity::parse("UserController@index"),
            Some(HandlerIdentity::new("UserController", "index"))
        );
        assert_eq!(HandlerIdentity::parse("closure"), None);
        assert_eq!(
            HandlerIdentity::new("crate::handlers", "health").to_string(),
            "crate::handlers::health"
        );
    }

    #[test]
    fn test_http_method() {
        assert_eq!(HttpMethod::parse("PATCH"), Some(HttpMethod::Patch));
        assert_eq!(HttpMethod::parse("trace"), None);
        assert!(HttpMethod::Put.has_body());
        assert!(!HttpMethod::Delete.has_body());
        assert_eq!(HttpMethod::Get.as_str(), "GET");
    }

    #[test]
    fn test_combine_paths() {
        assert_eq!(combine_paths("", "/users"), "/users");
        assert_eq!(combine_paths("/api/", "/users"), "/api/users");
        assert_eq!(combine_paths("/api", "/"), "/api");
    }
}
