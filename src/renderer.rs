//! Rendering of example instances through transformers.
//!
//! [`StructProjectionRenderer`] renders the way a serializable transformer
//! struct would: each instance is projected onto the transformer's serialized
//! fields, missing fields get type placeholders, and the result is wrapped in
//! the resource envelope (`{"data": …}`) or the paginator envelope.

use crate::config::short_name;
use crate::error::{GenerationError, Result};
use crate::type_resolver::{StructDef, StructShape, TypeResolver};
use log::debug;
use serde_json::{json, Map, Value};

/// Items handed to a transformer
#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    pub items: &'a [Value],
    /// Domain type the items were materialized from, when known
    pub model: Option<&'a str>,
    pub collection: bool,
    pub paginated: bool,
}

pub trait TransformerRenderer {
    /// Renders `input` through `transformer` as the response body would look.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::ExampleMaterialization`] when the transformer
    /// cannot render the input.
    fn render(&self, transformer: &str, input: &RenderInput<'_>) -> Result<Value>;
}

/// Page size of the paginator envelope
pub const PER_PAGE: usize = 15;

pub struct StructProjectionRenderer<'a> {
    resolver: &'a TypeResolver,
    wrap: Option<String>,
}

impl<'a> StructProjectionRenderer<'a> {
    pub fn new(resolver: &'a TypeResolver, wrap: Option<String>) -> Self {
        Self { resolver, wrap }
    }

    fn project(&self, def: &StructDef, item: &Value, model: Option<&str>) -> Value {
        if def.shape != StructShape::Named {
            return item.clone();
        }

        let source = item.as_object();
        let mut projected = Map::new();

        for field in def.fields.iter().filter(|f| !f.serde_attrs.skip) {
            let holds_model = model.is_some_and(|m| {
                field.type_info.name == m || short_name(&field.type_info.name) == short_name(m)
            });

            let value = if holds_model {
                item.clone()
            } else if let Some(value) = source.and_then(|s| s.get(&field.name).or_else(|| s.get(field.serialized_name()))) {
                value.clone()
            } else {
                self.resolver.example_value(&field.type_info)
            };

            match (field.serde_attrs.flatten, value) {
                (true, Value::Object(inner)) => projected.extend(inner),
                (_, value) => {
                    projected.insert(field.serialized_name().to_string(), value);
                }
            }
        }

        Value::Object(projected)
    }

    fn envelope(&self, body: Value) -> Value {
        match &self.wrap {
            Some(key) => {
                let mut object = Map::new();
                object.insert(key.clone(), body);
                Value::Object(object)
            }
            None => body,
        }
    }
}

impl TransformerRenderer for StructProjectionRenderer<'_> {
    fn render(&self, transformer: &str, input: &RenderInput<'_>) -> Result<Value> {
        let def = self
            .resolver
            .struct_def(transformer)
            .ok_or_else(|| GenerationError::materialization(transformer, "transformer definition not found"))?;

        debug!(
            "Rendering {} item(s) through {} (collection: {}, paginated: {})",
            input.items.len(),
            def.name,
            input.collection,
            input.paginated
        );

        let mut projected = input.items.iter().map(|item| self.project(def, item, input.model));

        if input.paginated {
            let items: Vec<Value> = projected.collect();
            return Ok(paginator(items, self.wrap.as_deref().unwrap_or("data")));
        }
        if input.collection {
            return Ok(self.envelope(Value::Array(projected.collect())));
        }

        let single = projected
            .next()
            .ok_or_else(|| GenerationError::materialization(transformer, "no instance to render"))?;
        Ok(self.envelope(single))
    }
}

/// First-page paginator envelope around `items`
pub fn paginator(items: Vec<Value>, key: &str) -> Value {
    let count = items.len();
    let mut body = Map::new();
    body.insert(key.to_string(), Value::Array(items));
    body.insert(
        "links".to_string(),
        json!({
            "first": "/?page=1",
            "last": "/?page=1",
            "prev": null,
            "next": null,
        }),
    );
    body.insert(
        "meta".to_string(),
        json!({
            "current_page": 1,
            "from": if count == 0 { Value::Null } else { Value::from(1) },
            "last_page": 1,
            "path": "/",
            "per_page": PER_PAGE,
            "to": if count == 0 { Value::Null } else { Value::from(count) },
            "total": count,
        }),
    );
    Value::Object(body)
}
