//! Capability classification of types.
//!
//! A type is a *transformer* when it implements one of the configured marker
//! traits (`impl Transformer for UserResource`), a *validator* or *domain object*
//! likewise, or when it derives a marker (`#[derive(Model)]`). Types can also be
//! listed explicitly in the configuration.

use crate::config::{short_name, CapabilityConfig};
use crate::parser::{path_to_string, ParsedFile, SourceUnit};
use log::debug;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Renders domain objects into a response payload
    Transformer,
    /// Carries a rule set describing request input
    Validator,
    /// Persistent entity with a route key
    DomainObject,
}

/// Answers capability queries for canonical type names
pub trait CapabilityClassifier {
    fn has_capability(&self, type_name: &str, capability: Capability) -> bool;

    /// First capability the type has, in transformer/validator/domain order
    fn classify(&self, type_name: &str) -> Option<Capability> {
        [
            Capability::Transformer,
            Capability::Validator,
            Capability::DomainObject,
        ]
        .into_iter()
        .find(|c| self.has_capability(type_name, *c))
    }
}

/// Capabilities gathered from marker impls, derives and configuration
#[derive(Debug, Default, Clone)]
pub struct CapabilityIndex {
    types: HashMap<Capability, BTreeSet<String>>,
}

impl CapabilityIndex {
    /// Indexes every marker impl and derive in `files`, plus the configured lists.
    pub fn build(files: &[ParsedFile], config: &CapabilityConfig) -> Self {
        let mut index = Self::default();

        let markers = [
            (Capability::Transformer, &config.transformer_markers),
            (Capability::Validator, &config.validator_markers),
            (Capability::DomainObject, &config.domain_markers),
        ];

        for file in files {
            for unit in SourceUnit::scopes(file) {
                for item in &unit.items {
                    let found = match item {
                        syn::Item::Impl(item_impl) => marker_impl(&unit, item_impl),
                        syn::Item::Struct(s) => derived(&unit, &s.ident, &s.attrs),
                        syn::Item::Enum(e) => derived(&unit, &e.ident, &e.attrs),
                        _ => Vec::new(),
                    };
                    for (type_name, marker) in found {
                        for (capability, names) in &markers {
                            if names.iter().any(|n| *n == marker) {
                                debug!("{} is a {:?} ({})", type_name, capability, marker);
                                index.insert(*capability, type_name.clone());
                            }
                        }
                    }
                }
            }
        }

        for name in &config.transformers {
            index.insert(Capability::Transformer, name.clone());
        }
        for name in &config.validators {
            index.insert(Capability::Validator, name.clone());
        }
        for name in &config.domain_objects {
            index.insert(Capability::DomainObject, name.clone());
        }

        index
    }

    pub fn insert(&mut self, capability: Capability, type_name: String) {
        self.types.entry(capability).or_default().insert(type_name);
    }

    /// All types of one capability, sorted
    pub fn types_with(&self, capability: Capability) -> Vec<String> {
        self.types
            .get(&capability)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl CapabilityClassifier for CapabilityIndex {
    fn has_capability(&self, type_name: &str, capability: Capability) -> bool {
        let Some(names) = self.types.get(&capability) else {
            return false;
        };
        if names.contains(type_name) {
            return true;
        }
        // unqualified entries (config lists, unresolvable impls) match by short name
        let short = short_name(type_name);
        names
            .iter()
            .any(|n| (!n.contains("::") && n == short) || (!type_name.contains("::") && short_name(n) == short))
    }
}

/// `(self type, trait short name)` of an `impl Trait for Type` block
fn marker_impl(unit: &SourceUnit, item: &syn::ItemImpl) -> Vec<(String, String)> {
    let Some((_, trait_path, _)) = &item.trait_ else {
        return Vec::new();
    };
    let syn::Type::Path(self_ty) = item.self_ty.as_ref() else {
        return Vec::new();
    };
    let Some(marker) = trait_path.segments.last() else {
        return Vec::new();
    };

    vec![(
        unit.resolve(&path_to_string(&self_ty.path)),
        marker.ident.to_string(),
    )]
}

/// `(type, derive short name)` for each `#[derive(...)]` entry on a type
fn derived(unit: &SourceUnit, ident: &syn::Ident, attrs: &[syn::Attribute]) -> Vec<(String, String)> {
    let type_name = unit.resolve(&ident.to_string());
    let mut found = Vec::new();

    for attr in attrs.iter().filter(|a| a.path().is_ident("derive")) {
        let parsed = attr.parse_nested_meta(|meta| {
            if let Some(last) = meta.path.segments.last() {
                found.push((type_name.clone(), last.ident.to_string()));
            }
            Ok(())
        });
        if let Err(e) = parsed {
            debug!("Malformed derive on {}: {}", type_name, e);
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parsed(module: &str, code: &str) -> ParsedFile {
        ParsedFile {
            path: PathBuf::from(format!("src/{}.rs", module)),
            module_path: vec!["crate".to_string(), module.to_string()],
            syntax_tree: syn::parse_file(code).unwrap(),
        }
    }

    fn index() -> CapabilityIndex {
        let models = parsed(
            "models",
            r#"
            #[derive(Debug, Clone, Model)]
            pub struct User { pub id: u64 }
            pub struct Post { pub id: u64 }
            impl Entity for Post {}
            pub struct Comment { pub id: u64 }
            "#,
        );
        let resources = parsed(
            "resources",
            r#"
            use crate::models::Comment;
            pub struct UserResource;
            impl framework::Transformer for UserResource {}
            impl Entity for Comment {}
            "#,
        );
        let requests = parsed(
            "requests",
            r#"
            pub struct StoreUser;
            impl Validator for StoreUser {}
            "#,
        );

        let mut config = CapabilityConfig::default();
        config.transformers.push("LegacyResource".to_string());
        CapabilityIndex::build(&[models, resources, requests], &config)
    }

    #[test]
    fn test_marker_impls_and_derives() {
        let index = index();

        assert!(index.has_capability("crate::models::User", Capability::DomainObject));
        assert!(index.has_capability("crate::models::Post", Capability::DomainObject));
        assert!(index.has_capability("crate::resources::UserResource", Capability::Transformer));
        assert!(index.has_capability("crate::requests::StoreUser", Capability::Validator));
        assert!(!index.has_capability("crate::requests::StoreUser", Capability::Transformer));
    }

    #[test]
    fn test_impl_for_foreign_type_resolves_through_use() {
        let index = index();
        // `impl Entity for Comment` inside resources refers to crate::models::Comment
        assert!(index.has_capability("crate::models::Comment", Capability::DomainObject));
        assert_eq!(index.classify("crate::models::Comment"), Some(Capability::DomainObject));
        assert!(!index.has_capability("crate::resources::Comment", Capability::DomainObject));
    }

    #[test]
    fn test_configured_types_match_by_short_name() {
        let index = index();
        assert!(index.has_capability("crate::legacy::LegacyResource", Capability::Transformer));
        assert_eq!(index.classify("crate::unknown::Thing"), None);
    }

    #[test]
    fn test_malformed_derive_keeps_earlier_entries() {
        let models = parsed(
            "models",
            r#"
            #[derive(Model, "oops")]
            pub struct Invoice { pub id: u64 }
            "#,
        );
        let index = CapabilityIndex::build(&[models], &CapabilityConfig::default());
        assert!(index.has_capability("crate::models::Invoice", Capability::DomainObject));
    }

    #[test]
    fn test_types_with_is_sorted() {
        let index = index();
        assert_eq!(
            index.types_with(Capability::DomainObject),
            vec![
                "crate::models::Comment".to_string(),
                "crate::models::Post".to_string(),
                "crate::models::User".to_string()
            ]
        );
    }
}
