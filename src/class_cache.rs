//! Per-run memo of analysed handler types.
//!
//! Every distinct type (or module of free-function handlers) is located,
//! parsed and analysed at most once per generation run. Failures are memoised
//! too, so a missing controller is reported once, not once per route.

use crate::analyzer::{analyze_handler, AnalysisContext, HandlerDescriptor};
use crate::capability::CapabilityClassifier;
use crate::config::AnalysisConfig;
use crate::error::{GenerationError, Result};
use crate::parser::{impl_self_name, SourceTree, UnitTarget};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Handlers of one analysed type or module
#[derive(Debug, Clone)]
pub struct ClassAnalysis {
    /// Canonical name after following re-exports
    pub type_name: String,
    pub source_path: PathBuf,
    handlers: BTreeMap<String, HandlerDescriptor>,
}

impl ClassAnalysis {
    pub fn handler(&self, name: &str) -> Option<&HandlerDescriptor> {
        self.handlers.get(name)
    }

    pub fn handler_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

pub struct ClassAnalysisCache<'a> {
    tree: &'a SourceTree,
    classifier: &'a dyn CapabilityClassifier,
    settings: &'a AnalysisConfig,
    entries: HashMap<String, Result<ClassAnalysis>>,
    analyses: usize,
}

impl<'a> ClassAnalysisCache<'a> {
    pub fn new(
        tree: &'a SourceTree,
        classifier: &'a dyn CapabilityClassifier,
        settings: &'a AnalysisConfig,
    ) -> Self {
        Self {
            tree,
            classifier,
            settings,
            entries: HashMap::new(),
            analyses: 0,
        }
    }

    /// Analysis of `type_name`, computed on first request.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::SourceUnavailable`] (memoised) when the type
    /// cannot be located or parsed.
    pub fn get(&mut self, type_name: &str) -> Result<&ClassAnalysis> {
        if !self.entries.contains_key(type_name) {
            let analysis = self.analyze(type_name);
            self.entries.insert(type_name.to_string(), analysis);
        }

        match &self.entries[type_name] {
            Ok(analysis) => Ok(analysis),
            Err(e) => Err(e.clone()),
        }
    }

    /// Number of types actually located and analysed so far
    pub fn analysis_count(&self) -> usize {
        self.analyses
    }

    fn analyze(&mut self, type_name: &str) -> Result<ClassAnalysis> {
        self.analyses += 1;
        let located = self.tree.locate(type_name)?;
        debug!("Analyzing {} from {}", located.canonical, located.unit.path.display());

        let self_type = match &located.target {
            UnitTarget::Type(_) => Some(located.canonical.clone()),
            UnitTarget::Module => None,
        };
        let ctx = AnalysisContext {
            unit: &located.unit,
            classifier: self.classifier,
            settings: self.settings,
            self_type,
        };

        let mut handlers = BTreeMap::new();
        for item in &located.unit.items {
            match (&located.target, item) {
                (UnitTarget::Type(name), syn::Item::Impl(item_impl))
                    if impl_self_name(item_impl).as_deref() == Some(name.as_str()) =>
                {
                    for impl_item in &item_impl.items {
                        let syn::ImplItem::Fn(method) = impl_item else {
                            continue;
                        };
                        let routine = method.sig.ident.to_string();
                        if handlers.contains_key(&routine) {
                            continue;
                        }
                        let descriptor = analyze_handler(&ctx, &routine, &method.attrs, &method.sig, &method.block);
                        handlers.insert(routine, descriptor);
                    }
                }
                (UnitTarget::Module, syn::Item::Fn(function)) => {
                    let routine = function.sig.ident.to_string();
                    let descriptor = analyze_handler(&ctx, &routine, &function.attrs, &function.sig, &function.block);
                    handlers.insert(routine, descriptor);
                }
                _ => {}
            }
        }

        if handlers.is_empty() {
            return Err(GenerationError::source_unavailable(type_name, "no handler routines found"));
        }

        Ok(ClassAnalysis {
            type_name: located.canonical,
            source_path: located.unit.path,
            handlers,
        })
    }
}
