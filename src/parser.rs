//! Syntax tree provider.
//!
//! Parses Rust source units with `syn` and resolves the names appearing in them
//! to canonical `crate::…` paths using the unit's module path and `use` table.
//! [`SourceTree`] locates the unit defining a fully-qualified type or module by
//! following Rust's module-to-file conventions.

use crate::error::{GenerationError, Result as GenResult};
use anyhow::{Context, Result};
use log::{debug, warn};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// AST (Abstract Syntax Tree) parser for Rust source files.
pub struct AstParser;

/// A successfully parsed Rust file with its abstract syntax tree.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// Module path of the file, starting with `crate`
    pub module_path: Vec<String>,
    /// The parsed abstract syntax tree
    pub syntax_tree: syn::File,
}

impl AstParser {
    /// Parses a single Rust source file into an AST.
    ///
    /// The module path is derived from the file's location below `src_root`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file contains invalid Rust syntax
    pub fn parse_file(path: &Path, src_root: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        let syntax_tree = syn::parse_file(&content)
            .with_context(|| format!("Failed to parse Rust syntax in file: {}", path.display()))?;

        Ok(ParsedFile {
            path: path.to_path_buf(),
            module_path: module_path_for(path, src_root),
            syntax_tree,
        })
    }

    /// Parses multiple Rust source files, continuing even if some fail.
    ///
    /// Files that fail to parse are logged as warnings; their errors are kept in
    /// the returned vector at the same index.
    pub fn parse_files(paths: &[PathBuf], src_root: &Path) -> Vec<Result<ParsedFile>> {
        debug!("Parsing {} files", paths.len());

        let results: Vec<Result<ParsedFile>> = paths
            .iter()
            .map(|path| {
                let result = Self::parse_file(path, src_root);
                if let Err(e) = &result {
                    warn!("Failed to parse {}: {:#}", path.display(), e);
                }
                result
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }
}

/// Derives the module path of a file from its location below the source root.
///
/// `lib.rs`/`main.rs` are the crate root, `a/mod.rs` and `a.rs` are `crate::a`.
pub fn module_path_for(path: &Path, src_root: &Path) -> Vec<String> {
    let mut module = vec!["crate".to_string()];
    let Ok(relative) = path.strip_prefix(src_root) else {
        return module;
    };

    let components: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();

    for (index, component) in components.iter().enumerate() {
        let is_last = index + 1 == components.len();
        if !is_last {
            module.push(component.clone());
            continue;
        }
        let stem = component.trim_end_matches(".rs");
        let is_root = index == 0 && (stem == "lib" || stem == "main");
        if stem != "mod" && !is_root {
            module.push(stem.to_string());
        }
    }

    module
}

/// Names that resolve to themselves wherever they appear
const PRELUDE: &[&str] = &[
    "bool", "char", "str", "String", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16",
    "u32", "u64", "u128", "usize", "f32", "f64", "Vec", "Option", "Result", "Box", "Some", "None",
    "Ok", "Err", "Default", "Self",
];

pub fn is_prelude(name: &str) -> bool {
    PRELUDE.contains(&name)
}

/// One module scope of parsed source with its name-resolution table
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// File the scope lives in
    pub path: PathBuf,
    /// Module path of the scope, starting with `crate`
    pub module_path: Vec<String>,
    /// Items declared directly in the scope
    pub items: Vec<syn::Item>,
    /// `use` aliases: local name → canonical path
    aliases: BTreeMap<String, String>,
    /// Child modules declared in the scope
    local_modules: HashSet<String>,
}

impl SourceUnit {
    pub fn new(path: PathBuf, module_path: Vec<String>, items: Vec<syn::Item>) -> Self {
        let mut aliases = BTreeMap::new();
        let mut local_modules = HashSet::new();

        for item in &items {
            match item {
                syn::Item::Use(item_use) => {
                    collect_use_tree(&item_use.tree, Vec::new(), &module_path, &mut aliases);
                }
                syn::Item::Mod(item_mod) => {
                    local_modules.insert(item_mod.ident.to_string());
                }
                _ => {}
            }
        }

        Self {
            path,
            module_path,
            items,
            aliases,
            local_modules,
        }
    }

    /// Every module scope of a parsed file: the file itself and its inline modules.
    pub fn scopes(file: &ParsedFile) -> Vec<SourceUnit> {
        let mut scopes = Vec::new();
        collect_scopes(
            &file.path,
            file.module_path.clone(),
            &file.syntax_tree.items,
            &mut scopes,
        );
        scopes
    }

    /// Canonical module path as a `::`-joined string
    pub fn module_name(&self) -> String {
        self.module_path.join("::")
    }

    /// Resolves an alias or (partially) qualified name to its canonical path.
    pub fn resolve(&self, name: &str) -> String {
        let segments: Vec<&str> = name.split("::").filter(|s| !s.is_empty()).collect();
        let Some(first) = segments.first() else {
            return name.to_string();
        };

        match *first {
            "crate" => segments.join("::"),
            "self" | "super" => {
                let owned: Vec<String> = segments.iter().map(|s| s.to_string()).collect();
                absolutize(&owned, &self.module_path)
            }
            _ if self.aliases.contains_key(*first) => {
                let mut resolved = self.aliases[*first].clone();
                for rest in &segments[1..] {
                    resolved.push_str("::");
                    resolved.push_str(rest);
                }
                resolved
            }
            _ if segments.len() == 1 && is_prelude(first) => first.to_string(),
            _ if segments.len() == 1 || self.local_modules.contains(*first) => {
                format!("{}::{}", self.module_name(), segments.join("::"))
            }
            _ => segments.join("::"),
        }
    }

    /// Whether the scope declares `name` as a type or implements something for it.
    pub fn defines(&self, name: &str) -> bool {
        self.items.iter().any(|item| match item {
            syn::Item::Struct(s) => s.ident == name,
            syn::Item::Enum(e) => e.ident == name,
            syn::Item::Union(u) => u.ident == name,
            syn::Item::Trait(t) => t.ident == name,
            syn::Item::Type(t) => t.ident == name,
            syn::Item::Impl(i) => impl_self_name(i).as_deref() == Some(name),
            _ => false,
        })
    }

    /// The canonical target of a `use` alias in this scope, if any
    pub fn alias(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    /// Inline module `name` declared with a body in this scope
    fn inline_module(&self, name: &str) -> Option<SourceUnit> {
        self.items.iter().find_map(|item| match item {
            syn::Item::Mod(m) if m.ident == name => m.content.as_ref().map(|(_, items)| {
                let mut module_path = self.module_path.clone();
                module_path.push(name.to_string());
                SourceUnit::new(self.path.clone(), module_path, items.clone())
            }),
            _ => None,
        })
    }
}

/// Last identifier of an `impl` block's self type
pub fn impl_self_name(item: &syn::ItemImpl) -> Option<String> {
    match item.self_ty.as_ref() {
        syn::Type::Path(type_path) => type_path.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

/// `::`-joined identifiers of a path, generics dropped
pub fn path_to_string(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|s| s.ident.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

fn collect_scopes(path: &Path, module_path: Vec<String>, items: &[syn::Item], out: &mut Vec<SourceUnit>) {
    for item in items {
        if let syn::Item::Mod(item_mod) = item {
            if let Some((_, inner)) = &item_mod.content {
                let mut inner_path = module_path.clone();
                inner_path.push(item_mod.ident.to_string());
                collect_scopes(path, inner_path, inner, out);
            }
        }
    }
    out.insert(0, SourceUnit::new(path.to_path_buf(), module_path, items.to_vec()));
}

fn collect_use_tree(
    tree: &syn::UseTree,
    prefix: Vec<String>,
    module_path: &[String],
    out: &mut BTreeMap<String, String>,
) {
    match tree {
        syn::UseTree::Path(use_path) => {
            let mut next = prefix;
            next.push(use_path.ident.to_string());
            collect_use_tree(&use_path.tree, next, module_path, out);
        }
        syn::UseTree::Name(use_name) => {
            let name = use_name.ident.to_string();
            if name == "self" {
                if let Some(last) = prefix.last() {
                    out.insert(last.clone(), absolutize(&prefix, module_path));
                }
            } else {
                let mut full = prefix;
                full.push(name.clone());
                out.insert(name, absolutize(&full, module_path));
            }
        }
        syn::UseTree::Rename(rename) => {
            let mut full = prefix;
            if rename.ident != "self" {
                full.push(rename.ident.to_string());
            }
            out.insert(rename.rename.to_string(), absolutize(&full, module_path));
        }
        syn::UseTree::Group(group) => {
            for item in &group.items {
                collect_use_tree(item, prefix.clone(), module_path, out);
            }
        }
        syn::UseTree::Glob(_) => {}
    }
}

/// Rewrites `self::`/`super::` prefixed paths against `module_path`.
fn absolutize(segments: &[String], module_path: &[String]) -> String {
    let mut base: Vec<String> = module_path.to_vec();
    let mut rest = segments;

    match rest.first().map(String::as_str) {
        Some("self") => rest = &rest[1..],
        Some("super") => {
            while rest.first().map(String::as_str) == Some("super") {
                if base.len() > 1 {
                    base.pop();
                }
                rest = &rest[1..];
            }
        }
        _ => return segments.join("::"),
    }

    base.extend(rest.iter().cloned());
    base.join("::")
}

/// What a located source unit was looked up for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitTarget {
    /// A type; handlers are the methods of its `impl` blocks
    Type(String),
    /// A module; handlers are its free functions
    Module,
}

/// A located unit together with what was asked for
#[derive(Debug, Clone)]
pub struct LocatedUnit {
    pub unit: SourceUnit,
    pub target: UnitTarget,
    /// Canonical name of the target after following re-exports
    pub canonical: String,
}

const MAX_REEXPORT_DEPTH: usize = 8;

/// Locates source units of the analysed crate by module path
pub struct SourceTree {
    src_root: PathBuf,
}

impl SourceTree {
    pub fn new(src_root: PathBuf) -> Self {
        Self { src_root }
    }

    pub fn src_root(&self) -> &Path {
        &self.src_root
    }

    /// Locates and parses the unit defining `name` (`crate::…::Type` or `crate::…::module`).
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::SourceUnavailable`] when no file defines the
    /// name or the defining file does not parse.
    pub fn locate(&self, name: &str) -> GenResult<LocatedUnit> {
        self.locate_at_depth(name, 0)
    }

    fn locate_at_depth(&self, name: &str, depth: usize) -> GenResult<LocatedUnit> {
        if depth > MAX_REEXPORT_DEPTH {
            return Err(GenerationError::source_unavailable(name, "too many re-exports"));
        }

        let mut segments: Vec<String> = name
            .split("::")
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if segments.first().map(String::as_str) == Some("crate") {
            segments.remove(0);
        }
        let Some(target) = segments.last().cloned() else {
            return self.module_unit(&[], name);
        };

        if target.starts_with(|c: char| c.is_lowercase()) {
            return self.module_unit(&segments, name);
        }

        let modules = &segments[..segments.len() - 1];
        let unit = self.scope_unit(modules, name)?;

        if unit.defines(&target) {
            debug!("Located {} in {}", name, unit.path.display());
            let canonical = format!("{}::{}", unit.module_name(), target);
            return Ok(LocatedUnit {
                unit,
                target: UnitTarget::Type(target),
                canonical,
            });
        }

        if let Some(reexport) = unit.alias(&target) {
            if reexport != name {
                debug!("Following re-export {} -> {}", name, reexport);
                let reexport = reexport.to_string();
                return self.locate_at_depth(&reexport, depth + 1);
            }
        }

        Err(GenerationError::source_unavailable(
            name,
            format!("`{}` is not defined in {}", target, unit.path.display()),
        ))
    }

    fn module_unit(&self, modules: &[String], name: &str) -> GenResult<LocatedUnit> {
        let unit = self.scope_unit(modules, name)?;
        let canonical = unit.module_name();
        Ok(LocatedUnit {
            unit,
            target: UnitTarget::Module,
            canonical,
        })
    }

    /// The scope of module `crate::modules…`, file-based or inline.
    fn scope_unit(&self, modules: &[String], name: &str) -> GenResult<SourceUnit> {
        for split in (0..=modules.len()).rev() {
            let Some(file_path) = self.module_file(&modules[..split]) else {
                continue;
            };

            let parsed = AstParser::parse_file(&file_path, &self.src_root)
                .map_err(|e| GenerationError::source_unavailable(name, format!("{:#}", e)))?;

            let mut module_path = vec!["crate".to_string()];
            module_path.extend(modules[..split].iter().cloned());
            let mut unit = SourceUnit::new(file_path, module_path, parsed.syntax_tree.items);

            // the remaining segments can only be inline modules of this file
            for inline in &modules[split..] {
                unit = unit.inline_module(inline).ok_or_else(|| {
                    GenerationError::source_unavailable(name, format!("module `{}` not found", inline))
                })?;
            }
            return Ok(unit);
        }

        Err(GenerationError::source_unavailable(name, "no source file for module"))
    }

    fn module_file(&self, modules: &[String]) -> Option<PathBuf> {
        let candidates = if modules.is_empty() {
            vec![self.src_root.join("lib.rs"), self.src_root.join("main.rs")]
        } else {
            let dir = modules.iter().fold(self.src_root.clone(), |acc, m| acc.join(m));
            vec![dir.with_extension("rs"), dir.join("mod.rs")]
        };
        candidates.into_iter().find(|p| p.is_file())
    }
}
