//! Handler contract inference - Swagger documents from Rust handler source.
//!
//! The library reads a route table, statically analyses the source of every
//! handler it names and infers the request parameters and response body the
//! handler produces, without compiling or running the analysed crate. Response
//! examples are materialized from configured fixtures, so the document shows
//! realistic payloads.
//!
//! # Architecture
//!
//! 1. [`routes`] - Route tables from axum `Router` chains or a manifest file
//! 2. [`scanner`] / [`parser`] - Source discovery and module-aware parsing
//! 3. [`capability`] - Which types are domain models, responders, validators
//! 4. [`analyzer`] / [`class_cache`] - Per-handler response and parameter inference
//! 5. [`rules`] - Validation rule parsing for request parameters
//! 6. [`factory`] / [`renderer`] / [`type_resolver`] - Example materialization
//! 7. [`schema_generator`] - Definitions and schemas from inferred shapes
//! 8. [`openapi_builder`] - Document assembly
//! 9. [`serializer`] - YAML or JSON output
//!
//! [`generator`] wires these together for one run.
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_handlers::{
//!     config::GeneratorConfig,
//!     generator::Generator,
//!     routes::manifest::ManifestRouteProvider,
//!     serializer::serialize_yaml,
//! };
//! use std::path::Path;
//!
//! let project = Path::new("./my-api");
//! let config = GeneratorConfig::discover(project).unwrap();
//! let provider = ManifestRouteProvider::from_file(&project.join("routes.yaml")).unwrap();
//!
//! let generation = Generator::new(&config, project).run(&provider).unwrap();
//! println!("{}", serialize_yaml(&generation.document).unwrap());
//! ```
//!
//! For command-line usage, see the [`cli`] module.

pub mod analyzer;
pub mod capability;
pub mod class_cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod factory;
pub mod generator;
pub mod openapi_builder;
pub mod parser;
pub mod renderer;
pub mod routes;
pub mod rules;
pub mod scanner;
pub mod schema_generator;
pub mod serializer;
pub mod type_resolver;
