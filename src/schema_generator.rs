use crate::analyzer::ResponseShape;
use crate::config::{lookup_by_type, short_name};
use crate::error::{Diagnostics, GenerationError, Result};
use crate::factory::{ExampleFactory, Materialization};
use crate::renderer::{RenderInput, TransformerRenderer};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Schema node of the generated document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Properties for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    /// Required field names for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Example payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    /// Reference to a shared definition
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Schema {
    pub fn of_type(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Self::default()
        }
    }

    pub fn with_example(schema_type: &str, example: Value) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            example: Some(example),
            ..Self::default()
        }
    }

    /// `{ "$ref": "#/definitions/<key>" }`
    pub fn reference(key: &str) -> Self {
        Self {
            reference: Some(definition_ref(key)),
            ..Self::default()
        }
    }

    /// Empty object schema used when nothing is known about a response
    pub fn empty_object() -> Self {
        Self::with_example("object", json!({}))
    }
}

/// JSON-pointer reference to a definition key
pub fn definition_ref(key: &str) -> String {
    format!("#/definitions/{}", key.replace('~', "~0").replace('/', "~1"))
}

/// Definition key of a type or transformer
pub fn definition_key(name: &str, is_collection: bool) -> String {
    if is_collection {
        format!("{}::collection", name)
    } else {
        name.to_string()
    }
}

/// Swagger type keyword describing a JSON value
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) | Value::Null => "object",
    }
}

/// Schema/example synthesizer with a per-run definition cache
pub struct SchemaSynthesizer<'a> {
    factory: &'a dyn ExampleFactory,
    renderer: &'a dyn TransformerRenderer,
    class_maps: &'a BTreeMap<String, Value>,
    resource_maps: &'a BTreeMap<String, Value>,
    mode: Materialization,
    definitions: BTreeMap<String, Schema>,
    diagnostics: Diagnostics,
}

impl<'a> SchemaSynthesizer<'a> {
    pub fn new(
        factory: &'a dyn ExampleFactory,
        renderer: &'a dyn TransformerRenderer,
        class_maps: &'a BTreeMap<String, Value>,
        resource_maps: &'a BTreeMap<String, Value>,
        mode: Materialization,
    ) -> Self {
        debug!("Initializing SchemaSynthesizer");
        Self {
            factory,
            renderer,
            class_maps,
            resource_maps,
            mode,
            definitions: BTreeMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Schema for a response shape; named shapes become shared definitions.
    pub fn build(&mut self, shape: Option<&ResponseShape>) -> Schema {
        match shape {
            None | Some(ResponseShape::Unresolved) => Schema::empty_object(),
            Some(ResponseShape::Literal { value }) => Schema::with_example(json_type(value), value.clone()),
            Some(ResponseShape::RawType {
                type_name,
                is_collection,
                ..
            }) => {
                let key = definition_key(type_name, *is_collection);
                if !self.definitions.contains_key(&key) {
                    let schema = self.class_schema(type_name, *is_collection);
                    self.definitions.insert(key.clone(), schema);
                }
                Schema::reference(&key)
            }
            Some(ResponseShape::Wrapped {
                transformer,
                is_collection,
                is_paginated,
                source,
            }) => {
                let key = definition_key(transformer, *is_collection);
                if !self.definitions.contains_key(&key) {
                    let schema = match self.resource_schema(transformer, *is_collection, *is_paginated, source) {
                        Ok(schema) => schema,
                        Err(e) => {
                            self.diagnostics.report(e);
                            Schema::with_example("object", Value::String(transformer.clone()))
                        }
                    };
                    self.definitions.insert(key.clone(), schema);
                }
                Schema::reference(&key)
            }
        }
    }

    /// Definitions gathered so far
    pub fn definitions(&self) -> &BTreeMap<String, Schema> {
        &self.definitions
    }

    pub fn into_parts(self) -> (BTreeMap<String, Schema>, Diagnostics) {
        (self.definitions, self.diagnostics)
    }

    fn class_schema(&self, type_name: &str, is_collection: bool) -> Schema {
        let example = lookup_by_type(self.class_maps, type_name)
            .cloned()
            .unwrap_or_else(|| Value::String(type_name.to_string()));

        if is_collection {
            Schema::with_example("array", Value::Array(vec![example.clone(), example]))
        } else {
            Schema::with_example("object", example)
        }
    }

    fn resource_schema(
        &self,
        transformer: &str,
        is_collection: bool,
        is_paginated: bool,
        source: &ResponseShape,
    ) -> Result<Schema> {
        let count = if is_collection { 2 } else { 1 };
        let (items, model) = match self.resource_input(transformer, source) {
            Some(ResourceInput::Model(model)) => (self.factory.materialize(&model, count, self.mode)?, Some(model)),
            Some(ResourceInput::Value(value)) => (vec![value; count], None),
            None => {
                return Err(GenerationError::materialization(transformer, "no input to build the resource from"));
            }
        };

        let input = RenderInput {
            items: &items,
            model: model.as_deref(),
            collection: is_collection,
            paginated: is_paginated,
        };
        let example = self.renderer.render(transformer, &input)?;
        Ok(Schema::with_example("object", example))
    }

    fn resource_input(&self, transformer: &str, source: &ResponseShape) -> Option<ResourceInput> {
        if let Some(mapped) = lookup_by_type(self.resource_maps, transformer) {
            return Some(match mapped {
                Value::String(model) => ResourceInput::Model(model.clone()),
                other => ResourceInput::Value(other.clone()),
            });
        }

        if let Some(model) = self.find_resource_model(transformer) {
            return Some(ResourceInput::Model(model));
        }

        match source {
            ResponseShape::RawType { type_name, .. } => Some(ResourceInput::Model(type_name.clone())),
            ResponseShape::Literal { value } => Some(ResourceInput::Value(value.clone())),
            _ => None,
        }
    }

    /// Known model whose short name occurs in the transformer's short name,
    /// longest first.
    fn find_resource_model(&self, transformer: &str) -> Option<String> {
        let resource_name = short_name(transformer);
        let mut models = self.factory.known_types();
        models.sort_by_key(|model| std::cmp::Reverse(short_name(model).len()));
        models
            .into_iter()
            .find(|model| resource_name.contains(short_name(model)))
    }
}

enum ResourceInput {
    Model(String),
    Value(Value),
}
