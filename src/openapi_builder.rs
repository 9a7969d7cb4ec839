//! Endpoint aggregation and Swagger document assembly.
//!
//! Every `(route, verb)` pair of the route table becomes an [`EndpointRecord`]
//! carrying the handler's descriptor and any configured override. Records are
//! grouped by normalized URI and verb (a later route for the same pair
//! replaces an earlier one) and turned into operations whose response schema
//! comes from the [`SchemaSynthesizer`].

use crate::analyzer::expression::reason_phrase;
use crate::analyzer::{HandlerDescriptor, ParameterKind, ResponseDescriptor, ResponseShape};
use crate::capability::{Capability, CapabilityClassifier};
use crate::class_cache::ClassAnalysisCache;
use crate::config::{short_name, EndpointOverride, GeneratorConfig, RequestOverride, ResponseOverride};
use crate::error::{Diagnostics, GenerationError};
use crate::routes::{HandlerIdentity, HttpMethod, RouteAction, RouteRecord};
use crate::rules::{self, FieldRules};
use crate::schema_generator::{Schema, SchemaSynthesizer};
use crate::type_resolver::{PrimitiveType, TypeResolver};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Identity of endpoints whose route has neither name nor named handler
pub const INLINE_IDENTITY: &str = "inline";

/// Name of the security scheme applied to every operation
pub const SECURITY_SCHEME: &str = "Bearer";

const JSON_MIME: &str = "application/json";

/// One `(route, verb)` pair with everything inferred or configured for it
#[derive(Debug, Clone)]
pub struct EndpointRecord {
    /// Normalized URI (`/users/{user}`)
    pub uri: String,
    pub verb: HttpMethod,
    /// Route name, else handler identity, else [`INLINE_IDENTITY`]
    pub identity: String,
    pub handler: Option<HandlerIdentity>,
    pub middleware: Vec<String>,
    pub tags: Vec<String>,
    pub descriptor: HandlerDescriptor,
    pub endpoint_override: Option<EndpointOverride>,
}

/// Complete Swagger 2.0 document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiDocument {
    pub swagger: String,
    pub info: Info,
    #[serde(rename = "securityDefinitions")]
    pub security_definitions: BTreeMap<String, SecurityScheme>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<Tag>,
    /// Normalized URI → operations
    pub paths: BTreeMap<String, PathItem>,
    pub definitions: BTreeMap<String, Schema>,
}

/// Swagger Info object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    pub version: String,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub scheme_type: String,
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
}

impl SecurityScheme {
    /// API key read from the `Authorization` header
    pub fn bearer() -> Self {
        Self {
            scheme_type: "apiKey".to_string(),
            name: "Authorization".to_string(),
            location: "header".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

/// Swagger PathItem object - all operations for a single path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
}

impl PathItem {
    pub fn operation(&self, verb: HttpMethod) -> Option<&Operation> {
        match verb {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Options => self.options.as_ref(),
            HttpMethod::Head => self.head.as_ref(),
        }
    }

    fn slot(&mut self, verb: HttpMethod) -> &mut Option<Operation> {
        match verb {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
        }
    }
}

/// Swagger Operation object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub summary: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub description: String,
    pub security: Vec<BTreeMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    #[serde(rename = "operationId")]
    pub operation_id: String,
    pub consumes: Vec<String>,
    pub produces: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub parameters: Vec<Parameter>,
    /// Status code → response; exactly one entry
    pub responses: BTreeMap<String, Response>,
    #[serde(rename = "x-middleware", skip_serializing_if = "Vec::is_empty", default)]
    pub middleware: Vec<String>,
}

/// Swagger Parameter object (path, query or body)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Schema>,
    #[serde(rename = "collectionFormat", skip_serializing_if = "Option::is_none")]
    pub collection_format: Option<String>,
    /// Body parameters only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

impl Parameter {
    fn path(name: &str, param_type: &str) -> Self {
        Self {
            name: name.to_string(),
            location: "path".to_string(),
            required: true,
            param_type: Some(param_type.to_string()),
            description: None,
            items: None,
            collection_format: None,
            schema: None,
        }
    }

    fn query(field: &FieldRules) -> Self {
        let (param_type, items, collection_format) = if field.array {
            (
                "array".to_string(),
                Some(Schema::of_type(field.items_type.unwrap_or("string"))),
                Some("multi".to_string()),
            )
        } else {
            (field.value_type.to_string(), None, None)
        };

        Self {
            name: field.name.clone(),
            location: "query".to_string(),
            required: field.required,
            param_type: Some(param_type),
            description: non_empty(field.description()),
            items,
            collection_format,
            schema: None,
        }
    }

    fn body(fields: &[FieldRules]) -> Self {
        let mut properties = BTreeMap::new();
        let mut required = Vec::new();

        for field in fields {
            let mut property = if field.array {
                Schema {
                    items: Some(Box::new(Schema::of_type(field.items_type.unwrap_or("string")))),
                    ..Schema::of_type("array")
                }
            } else {
                Schema::of_type(field.value_type)
            };
            property.description = non_empty(field.description());
            properties.insert(field.name.clone(), property);
            if field.required {
                required.push(field.name.clone());
            }
        }

        Self {
            name: "body".to_string(),
            location: "body".to_string(),
            required: true,
            param_type: None,
            description: None,
            items: None,
            collection_format: None,
            schema: Some(Schema {
                properties: Some(properties),
                required: if required.is_empty() { None } else { Some(required) },
                ..Schema::of_type("object")
            }),
        }
    }
}

/// Swagger Response object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    pub schema: Schema,
}

/// Builds the document for one generation run
pub struct DocumentAssembler<'a> {
    config: &'a GeneratorConfig,
    cache: ClassAnalysisCache<'a>,
    classifier: &'a dyn CapabilityClassifier,
    resolver: &'a TypeResolver,
    synthesizer: SchemaSynthesizer<'a>,
    diagnostics: Diagnostics,
    matched_overrides: BTreeSet<String>,
    reported_sources: HashSet<String>,
}

impl<'a> DocumentAssembler<'a> {
    pub fn new(
        config: &'a GeneratorConfig,
        cache: ClassAnalysisCache<'a>,
        classifier: &'a dyn CapabilityClassifier,
        resolver: &'a TypeResolver,
        synthesizer: SchemaSynthesizer<'a>,
    ) -> Self {
        debug!("Initializing DocumentAssembler");
        Self {
            config,
            cache,
            classifier,
            resolver,
            synthesizer,
            diagnostics: Diagnostics::new(),
            matched_overrides: BTreeSet::new(),
            reported_sources: HashSet::new(),
        }
    }

    /// One record per `(route, verb)` pair, in route table order.
    ///
    /// Ignored URIs and verbs produce nothing. A handler whose source cannot
    /// be analysed yields an empty descriptor.
    pub fn endpoints(&mut self, routes: &[RouteRecord]) -> Vec<EndpointRecord> {
        let mut records = Vec::new();

        for route in routes {
            if self.config.is_ignored_uri(&route.uri) || self.config.is_ignored_uri(route.uri.trim_matches('/')) {
                debug!("Ignoring route {}", route.uri);
                continue;
            }

            let handler = match &route.action {
                RouteAction::Handler(identity) => Some(identity.clone()),
                RouteAction::Inline => None,
            };
            let identity = route
                .name
                .clone()
                .or_else(|| handler.as_ref().map(ToString::to_string))
                .unwrap_or_else(|| INLINE_IDENTITY.to_string());

            let endpoint_override = self.config.endpoint_maps.get(&identity).cloned();
            if endpoint_override.is_some() {
                self.matched_overrides.insert(identity.clone());
            }

            let descriptor = match &handler {
                Some(handler) => self.descriptor(handler),
                None => HandlerDescriptor::empty(INLINE_IDENTITY),
            };

            let tags: Vec<String> = route
                .prefix
                .as_deref()
                .map(|p| p.trim_matches('/'))
                .filter(|p| !p.is_empty())
                .map(|p| vec![p.to_string()])
                .unwrap_or_default();

            for method in &route.methods {
                if self.config.is_ignored_method(method) {
                    continue;
                }
                let Some(verb) = HttpMethod::parse(method) else {
                    debug!("Skipping unsupported verb {} for {}", method, route.uri);
                    continue;
                };

                records.push(EndpointRecord {
                    uri: normalize_uri(&route.uri),
                    verb,
                    identity: identity.clone(),
                    handler: handler.clone(),
                    middleware: route.middleware.clone(),
                    tags: tags.clone(),
                    descriptor: descriptor.clone(),
                    endpoint_override: endpoint_override.clone(),
                });
            }
        }

        debug!("Aggregated {} endpoint(s) from {} route(s)", records.len(), routes.len());
        records
    }

    /// Assembles the document for `routes`.
    pub fn assemble(mut self, routes: &[RouteRecord]) -> (ApiDocument, Diagnostics) {
        let mut grouped: BTreeMap<(String, &'static str), EndpointRecord> = BTreeMap::new();
        for record in self.endpoints(routes) {
            if let Some(previous) = grouped.insert((record.uri.clone(), record.verb.as_str()), record) {
                debug!("{} {} replaced by a later route", previous.verb.as_str(), previous.uri);
            }
        }

        let mut paths: BTreeMap<String, PathItem> = BTreeMap::new();
        let mut tags = BTreeSet::new();

        for record in grouped.into_values() {
            debug!("Adding endpoint: {} {}", record.verb.as_str(), record.uri);
            tags.extend(record.tags.iter().cloned());
            let operation = self.operation(&record);
            *paths.entry(record.uri.clone()).or_default().slot(record.verb) = Some(operation);
        }

        for identity in self.config.endpoint_maps.keys() {
            if !self.matched_overrides.contains(identity) {
                self.diagnostics.report(GenerationError::InvalidOverrideReference {
                    identity: identity.clone(),
                });
            }
        }

        let (definitions, synthesis_diagnostics) = self.synthesizer.into_parts();
        self.diagnostics.extend(synthesis_diagnostics);

        let mut security_definitions = BTreeMap::new();
        security_definitions.insert(SECURITY_SCHEME.to_string(), SecurityScheme::bearer());

        let document = ApiDocument {
            swagger: "2.0".to_string(),
            info: Info {
                version: self.config.info_version(),
                title: self.config.title.clone(),
                description: self.config.description.clone(),
            },
            security_definitions,
            tags: tags.into_iter().map(|name| Tag { name }).collect(),
            paths,
            definitions,
        };

        (document, self.diagnostics)
    }

    fn descriptor(&mut self, handler: &HandlerIdentity) -> HandlerDescriptor {
        let lookup = match self.cache.get(&handler.class) {
            Ok(analysis) => analysis.handler(&handler.method).cloned().ok_or_else(|| {
                let known: Vec<&str> = analysis.handler_names().collect();
                GenerationError::source_unavailable(
                    handler.to_string(),
                    format!("handler routine not found (known: {})", known.join(", ")),
                )
            }),
            Err(e) => Err(e),
        };

        match lookup {
            Ok(descriptor) => descriptor,
            Err(e) => {
                self.report_source(e);
                HandlerDescriptor::empty(handler.method.clone())
            }
        }
    }

    /// Reports a source failure once per subject.
    fn report_source(&mut self, error: GenerationError) {
        let subject = match &error {
            GenerationError::SourceUnavailable { name, .. } => name.clone(),
            other => other.to_string(),
        };
        if self.reported_sources.insert(subject) {
            self.diagnostics.report(error);
        }
    }

    fn operation(&mut self, record: &EndpointRecord) -> Operation {
        let response = self.response(record);
        let schema = self.synthesizer.build(response.as_ref().map(|r| &r.shape));
        let status = response.as_ref().map(|r| r.status).unwrap_or(200);

        let mut responses = BTreeMap::new();
        responses.insert(
            status.to_string(),
            Response {
                description: reason_phrase(status).to_string(),
                schema,
            },
        );

        let mut security = BTreeMap::new();
        security.insert(SECURITY_SCHEME.to_string(), Vec::new());

        Operation {
            summary: record.descriptor.summary.clone(),
            description: record.descriptor.description.clone(),
            security: vec![security],
            tags: record.tags.clone(),
            operation_id: record.identity.clone(),
            consumes: vec![JSON_MIME.to_string()],
            produces: vec![JSON_MIME.to_string()],
            parameters: self.parameters(record),
            responses,
            middleware: record.middleware.clone(),
        }
    }

    /// The override response when configured, else the best inferred candidate.
    fn response(&mut self, record: &EndpointRecord) -> Option<ResponseDescriptor> {
        if let Some(response) = record.endpoint_override.as_ref().and_then(|o| o.response.as_ref()) {
            return Some(self.override_response(response));
        }

        let selected = select_response(&record.descriptor.responses).cloned();
        if let Some(ResponseDescriptor {
            shape: ResponseShape::Unresolved,
            ..
        }) = &selected
        {
            self.diagnostics.report(GenerationError::UnresolvedExpression {
                handler: record.identity.clone(),
            });
        }
        selected
    }

    fn override_response(&self, response: &ResponseOverride) -> ResponseDescriptor {
        match response {
            ResponseOverride::Reference(reference) => {
                let (name, is_collection) = match reference.strip_suffix("::collection") {
                    Some(name) => (name, true),
                    None => (reference.as_str(), false),
                };
                let shape = if self.classifier.has_capability(name, Capability::Transformer) {
                    ResponseShape::Wrapped {
                        transformer: name.to_string(),
                        is_collection,
                        is_paginated: false,
                        source: Box::new(ResponseShape::Unresolved),
                    }
                } else {
                    ResponseShape::RawType {
                        type_name: name.to_string(),
                        is_collection,
                        is_paginated: false,
                    }
                };
                ResponseDescriptor { status: 200, shape }
            }
            ResponseOverride::Example { example, status } => ResponseDescriptor {
                status: status.unwrap_or(200),
                shape: ResponseShape::literal(example.clone()),
            },
        }
    }

    fn parameters(&mut self, record: &EndpointRecord) -> Vec<Parameter> {
        let mut parameters: Vec<Parameter> = path_parameter_names(&record.uri)
            .into_iter()
            .map(|name| {
                let param_type = self.path_parameter_type(&record.descriptor, &name);
                Parameter::path(&name, param_type)
            })
            .collect();

        let fields = self.request_rules(record);
        if fields.is_empty() {
            return parameters;
        }

        if record.verb.has_body() {
            parameters.push(Parameter::body(&fields));
        } else {
            parameters.extend(fields.iter().map(Parameter::query));
        }
        parameters
    }

    fn path_parameter_type(&self, descriptor: &HandlerDescriptor, name: &str) -> &'static str {
        let Some(binding) = descriptor.parameter(name) else {
            return "string";
        };
        let Some(declared) = binding.declared_type.as_deref() else {
            return "string";
        };

        match binding.kind {
            ParameterKind::DomainObject => self
                .resolver
                .key_type(declared, &self.config.analysis.route_key_field),
            ParameterKind::Native => PrimitiveType::parse(short_name(declared))
                .map(PrimitiveType::schema_type)
                .unwrap_or("string"),
            _ => "string",
        }
    }

    /// Override rules when configured, else the rules of the handler's validator.
    fn request_rules(&mut self, record: &EndpointRecord) -> Vec<FieldRules> {
        match record.endpoint_override.as_ref().and_then(|o| o.request.as_ref()) {
            Some(RequestOverride::Rules(map)) => rules::from_map(map),
            Some(RequestOverride::Validator(validator)) => self.validator_rules(validator),
            None => match record.descriptor.validator.clone() {
                Some(validator) => self.validator_rules(&validator),
                None => Vec::new(),
            },
        }
    }

    fn validator_rules(&mut self, validator: &str) -> Vec<FieldRules> {
        let rules_method = self.config.analysis.rules_method.clone();
        let lookup = match self.cache.get(validator) {
            Ok(analysis) => analysis
                .handler(&rules_method)
                .and_then(|rules| {
                    rules.responses.iter().find_map(|r| match &r.shape {
                        ResponseShape::Literal { value } => Some(value.clone()),
                        _ => None,
                    })
                })
                .ok_or_else(|| {
                    GenerationError::source_unavailable(
                        format!("{}::{}", validator, rules_method),
                        "no literal rule set",
                    )
                }),
            Err(e) => Err(e),
        };

        match lookup {
            Ok(value) => rules::interpret(&value),
            Err(e) => {
                self.report_source(e);
                Vec::new()
            }
        }
    }
}

/// Best candidate response: 200/201 first, then any other 2xx, then the rest;
/// within a rank transformer output over literals over anything else, then
/// declaration order.
pub fn select_response(responses: &[ResponseDescriptor]) -> Option<&ResponseDescriptor> {
    responses
        .iter()
        .enumerate()
        .min_by_key(|(index, response)| {
            let status_rank = match response.status {
                200 | 201 => 0,
                202..=299 => 1,
                _ => 2,
            };
            let shape_rank = match response.shape {
                ResponseShape::Wrapped { .. } => 0,
                ResponseShape::Literal { .. } => 1,
                _ => 2,
            };
            (status_rank, shape_rank, *index)
        })
        .map(|(_, response)| response)
}

/// Convert a route URI to the document's path format: one leading slash and
/// `{name}` placeholders (from `:name`, `*name`, `{name?}` and `{*name}`).
pub fn normalize_uri(uri: &str) -> String {
    let segments: Vec<String> = uri
        .trim_matches('/')
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':').or_else(|| segment.strip_prefix('*')) {
                format!("{{{}}}", name)
            } else if let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                format!("{{{}}}", inner.trim_start_matches('*').trim_end_matches('?'))
            } else {
                segment.to_string()
            }
        })
        .collect();

    format!("/{}", segments.join("/"))
}

/// Placeholder names of a normalized URI, in order
pub fn path_parameter_names(uri: &str) -> Vec<String> {
    uri.split('/')
        .filter_map(|segment| segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
        .map(str::to_string)
        .collect()
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
