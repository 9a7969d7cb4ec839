//! Example-instance factories.
//!
//! The synthesizer never runs the analysed application; example domain objects
//! come from an [`ExampleFactory`]. The bundled [`FixtureFactory`] builds them
//! from attribute fixtures declared in the configuration.

use crate::error::{GenerationError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Whether materialized instances behave as persisted rows or transient values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialization {
    /// Transient instance, no primary key or timestamps assigned
    Make,
    /// Persisted instance, primary key and timestamps assigned
    Create,
}

/// Source of example instances for domain object types
pub trait ExampleFactory {
    /// Type names this factory can materialize, in a stable order.
    fn known_types(&self) -> Vec<String>;

    /// Produces `count` instances of `type_name`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::ExampleMaterialization`] when the type is unknown.
    fn materialize(&self, type_name: &str, count: usize, mode: Materialization) -> Result<Vec<Value>>;
}

/// Attribute fixture for one model type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryDefinition {
    /// Base attributes of every instance
    pub attributes: Map<String, Value>,
    /// Named variants, overlaid on the base attributes
    pub states: BTreeMap<String, Map<String, Value>>,
}

/// Timestamp stamped on persisted fixtures; fixed so output is reproducible
const PERSISTED_AT: &str = "2024-01-01T00:00:00.000000Z";

/// Factory backed by configured attribute fixtures
#[derive(Debug, Clone, Default)]
pub struct FixtureFactory {
    definitions: BTreeMap<String, FactoryDefinition>,
    state: String,
}

impl FixtureFactory {
    /// Creates a factory preferring the named `state` when a definition declares it.
    pub fn new(definitions: BTreeMap<String, FactoryDefinition>, state: impl Into<String>) -> Self {
        Self {
            definitions,
            state: state.into(),
        }
    }

    fn definition(&self, type_name: &str) -> Option<&FactoryDefinition> {
        crate::config::lookup_by_type(&self.definitions, type_name)
    }

    fn build_one(&self, definition: &FactoryDefinition, index: usize, mode: Materialization) -> Value {
        let mut attributes = definition.attributes.clone();

        // named state when declared, default attributes otherwise
        if let Some(overlay) = definition.states.get(&self.state) {
            for (key, value) in overlay {
                attributes.insert(key.clone(), value.clone());
            }
        }

        if mode == Materialization::Create {
            if !attributes.contains_key("id") {
                // insert at the front so the key reads first in examples
                let mut persisted = Map::new();
                persisted.insert("id".to_string(), Value::from(index as u64 + 1));
                persisted.extend(attributes);
                attributes = persisted;
            }
            for stamp in ["created_at", "updated_at"] {
                attributes
                    .entry(stamp.to_string())
                    .or_insert_with(|| Value::from(PERSISTED_AT));
            }
        }

        Value::Object(attributes)
    }
}

impl ExampleFactory for FixtureFactory {
    fn known_types(&self) -> Vec<String> {
        self.definitions.keys().cloned().collect()
    }

    fn materialize(&self, type_name: &str, count: usize, mode: Materialization) -> Result<Vec<Value>> {
        let definition = self.definition(type_name).ok_or_else(|| {
            GenerationError::materialization(type_name, "no factory is defined for this type")
        })?;

        debug!("Materializing {} x {} ({:?})", count, type_name, mode);
        Ok((0..count)
            .map(|index| self.build_one(definition, index, mode))
            .collect())
    }
}
