//! One generation run, from source tree and route table to document.
//!
//! Every run builds its own class-analysis cache and definition cache, so two
//! runs over the same input never share state and produce identical documents.

use crate::capability::{Capability, CapabilityIndex};
use crate::class_cache::ClassAnalysisCache;
use crate::config::GeneratorConfig;
use crate::error::Diagnostics;
use crate::factory::FixtureFactory;
use crate::openapi_builder::{ApiDocument, DocumentAssembler};
use crate::parser::{ParsedFile, SourceTree};
use crate::renderer::StructProjectionRenderer;
use crate::routes::RouteProvider;
use crate::scanner::FileScanner;
use crate::schema_generator::SchemaSynthesizer;
use crate::type_resolver::TypeResolver;
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Outcome of a run: the document plus every non-fatal failure met on the way
#[derive(Debug)]
pub struct Generation {
    pub document: ApiDocument,
    pub diagnostics: Diagnostics,
    pub route_count: usize,
}

pub struct Generator<'c> {
    config: &'c GeneratorConfig,
    src_root: PathBuf,
}

impl<'c> Generator<'c> {
    /// Generator for the crate at `project_root`; sources live in `config.source_dir` below it.
    pub fn new(config: &'c GeneratorConfig, project_root: &Path) -> Self {
        Self {
            config,
            src_root: project_root.join(&config.source_dir),
        }
    }

    pub fn src_root(&self) -> &Path {
        &self.src_root
    }

    /// Scans and parses the source directory; unparsable files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the source directory does not exist.
    pub fn parse_sources(&self) -> Result<Vec<ParsedFile>> {
        info!("Scanning {}", self.src_root.display());
        let files = FileScanner::new(self.src_root.clone()).parse_all()?;
        info!("Parsed {} source files", files.len());
        Ok(files)
    }

    /// Scans the sources and generates the document for `provider`'s routes.
    ///
    /// # Errors
    ///
    /// Returns an error if the sources cannot be scanned or the route table
    /// cannot be produced. Per-handler failures end up in the diagnostics.
    pub fn run(&self, provider: &dyn RouteProvider) -> Result<Generation> {
        let files = self.parse_sources()?;
        self.run_with(&files, provider)
    }

    /// Generates the document from already parsed sources.
    ///
    /// # Errors
    ///
    /// Returns an error if the route table cannot be produced.
    pub fn run_with(&self, files: &[ParsedFile], provider: &dyn RouteProvider) -> Result<Generation> {
        let routes = provider.routes().context("Failed to read the route table")?;
        info!("Route table has {} routes", routes.len());

        let classifier = CapabilityIndex::build(files, &self.config.capabilities);
        debug!(
            "Classified {} domain objects, {} transformers, {} validators",
            classifier.types_with(Capability::DomainObject).len(),
            classifier.types_with(Capability::Transformer).len(),
            classifier.types_with(Capability::Validator).len()
        );
        let resolver = TypeResolver::new(files);
        let tree = SourceTree::new(self.src_root.clone());
        let factory = FixtureFactory::new(self.config.factories.clone(), self.config.factory_state.clone());
        let renderer = StructProjectionRenderer::new(&resolver, self.config.resource_wrap.clone());

        let cache = ClassAnalysisCache::new(&tree, &classifier, &self.config.analysis);
        let synthesizer = SchemaSynthesizer::new(
            &factory,
            &renderer,
            &self.config.class_maps,
            &self.config.resource_maps,
            self.config.materialization(),
        );

        let assembler = DocumentAssembler::new(self.config, cache, &classifier, &resolver, synthesizer);
        let (document, diagnostics) = assembler.assemble(&routes);

        debug!(
            "Generated {} paths and {} definitions with {} diagnostics",
            document.paths.len(),
            document.definitions.len(),
            diagnostics.len()
        );

        Ok(Generation {
            document,
            diagnostics,
            route_count: routes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::manifest::{ManifestRoute, ManifestRouteProvider};
    use crate::routes::RouteRecord;
    use std::fs;
    use tempfile::TempDir;

    struct FailingProvider;

    impl RouteProvider for FailingProvider {
        fn routes(&self) -> Result<Vec<RouteRecord>> {
            anyhow::bail!("router unavailable")
        }
    }

    fn project() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("lib.rs"), "pub mod handlers;").unwrap();
        fs::write(
            src.join("handlers.rs"),
            r#"
            use axum::Json;
            use serde_json::{json, Value};

            /// Liveness probe
            pub async fn health() -> Json<Value> {
                Json(json!({"status": "ok"}))
            }
            "#,
        )
        .unwrap();
        temp_dir
    }

    fn provider() -> ManifestRouteProvider {
        ManifestRouteProvider::new(vec![ManifestRoute {
            uri: "health".to_string(),
            method: Some("GET".to_string()),
            handler: Some("crate::handlers::health".to_string()),
            ..ManifestRoute::default()
        }])
    }

    #[test]
    fn test_run_generates_document() {
        let temp_dir = project();
        let config = GeneratorConfig::default();
        let generator = Generator::new(&config, temp_dir.path());

        let generation = generator.run(&provider()).unwrap();

        assert_eq!(generation.route_count, 1);
        let operation = generation.document.paths["/health"].get.as_ref().unwrap();
        assert_eq!(operation.summary, "Liveness probe");
        assert_eq!(operation.operation_id, "crate::handlers::health");
        assert!(generation.diagnostics.is_empty());
    }

    #[test]
    fn test_runs_are_independent() {
        let temp_dir = project();
        let config = GeneratorConfig::default();
        let generator = Generator::new(&config, temp_dir.path());

        let first = serde_json::to_string(&generator.run(&provider()).unwrap().document).unwrap();
        let second = serde_json::to_string(&generator.run(&provider()).unwrap().document).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_route_table_failure_is_fatal() {
        let temp_dir = project();
        let config = GeneratorConfig::default();
        let generator = Generator::new(&config, temp_dir.path());

        let err = generator.run(&FailingProvider).unwrap_err();
        assert!(err.to_string().contains("route table"));
    }

    #[test]
    fn test_missing_source_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config = GeneratorConfig::default();
        let generator = Generator::new(&config, temp_dir.path());
        assert!(generator.run(&provider()).is_err());
    }
}
