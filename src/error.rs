//! Error taxonomy for a generation run.
//!
//! Every failure that concerns a single handler or a single schema is a
//! [`GenerationError`]. Those never abort the run: they are caught at the
//! smallest enclosing unit, turned into degraded output and pushed into a
//! [`Diagnostics`] collector so the caller can report them afterwards.

use log::{debug, warn};
use thiserror::Error;

/// Result type alias for per-item operations of the generator
pub type Result<T> = std::result::Result<T, GenerationError>;

/// Non-fatal, per-item failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The source of a type or module could not be located or parsed.
    #[error("source unavailable for `{name}`: {reason}")]
    SourceUnavailable { name: String, reason: String },

    /// An expression could not be classified into a response shape.
    #[error("unresolved response expression in `{handler}`")]
    UnresolvedExpression { handler: String },

    /// The factory could not produce an instance, or the transformer could not render it.
    #[error("cannot build example for `{name}`: {reason}")]
    ExampleMaterialization { name: String, reason: String },

    /// A configured endpoint override names an identity no route produced.
    #[error("override `{identity}` does not match any route")]
    InvalidOverrideReference { identity: String },
}

impl GenerationError {
    pub fn source_unavailable(name: impl Into<String>, reason: impl ToString) -> Self {
        GenerationError::SourceUnavailable {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn materialization(name: impl Into<String>, reason: impl ToString) -> Self {
        GenerationError::ExampleMaterialization {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this failure is expected to go unnoticed by default.
    ///
    /// Unused overrides and unclassifiable expressions are ordinary outcomes of
    /// heuristic analysis and are only logged at debug level.
    pub fn is_quiet(&self) -> bool {
        matches!(
            self,
            GenerationError::InvalidOverrideReference { .. }
                | GenerationError::UnresolvedExpression { .. }
        )
    }
}

/// Collector for the non-fatal failures of one generation run
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<GenerationError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log the failure and keep it for the final report.
    pub fn report(&mut self, error: GenerationError) {
        if error.is_quiet() {
            debug!("{}", error);
        } else {
            warn!("{}", error);
        }
        self.entries.push(error);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[GenerationError] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of failures that are logged as warnings.
    pub fn warning_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_quiet()).count()
    }
}
