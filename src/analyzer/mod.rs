//! Handler analyzer.
//!
//! Builds one [`HandlerDescriptor`] per handler routine: its documentation,
//! parameter bindings, validator and every candidate response found at its
//! return sites. The body is scanned once, top to bottom; branches are not
//! merged and the last assignment to a name wins.

pub mod expression;
pub mod literal;

use crate::capability::{Capability, CapabilityClassifier};
use crate::config::AnalysisConfig;
use crate::parser::{path_to_string, SourceUnit};
use expression::Evaluator;
use log::debug;
use serde_json::Value;
use std::collections::HashMap;
use syn::visit::{self, Visit};

/// Classification of a value a handler may return
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// A value known at analysis time
    Literal { value: Value },
    /// Output of a transformer applied to `source`
    Wrapped {
        transformer: String,
        is_collection: bool,
        is_paginated: bool,
        source: Box<ResponseShape>,
    },
    /// A domain object or other named type, not transformed
    RawType {
        type_name: String,
        is_collection: bool,
        is_paginated: bool,
    },
    Unresolved,
}

impl ResponseShape {
    pub fn literal(value: Value) -> Self {
        ResponseShape::Literal { value }
    }

    pub fn raw(type_name: impl Into<String>) -> Self {
        ResponseShape::RawType {
            type_name: type_name.into(),
            is_collection: false,
            is_paginated: false,
        }
    }

    pub fn is_paginated(&self) -> bool {
        match self {
            ResponseShape::Wrapped { is_paginated, .. } | ResponseShape::RawType { is_paginated, .. } => {
                *is_paginated
            }
            _ => false,
        }
    }

    /// The same shape as a paginated collection
    pub fn paginated(self) -> Self {
        match self {
            ResponseShape::Wrapped {
                transformer, source, ..
            } => ResponseShape::Wrapped {
                transformer,
                is_collection: true,
                is_paginated: true,
                source,
            },
            ResponseShape::RawType { type_name, .. } => ResponseShape::RawType {
                type_name,
                is_collection: true,
                is_paginated: true,
            },
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Native,
    Validator,
    DomainObject,
    Other,
}

/// One declared parameter of a handler
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBinding {
    pub name: String,
    pub kind: ParameterKind,
    /// Canonical name of the declared type after unwrapping extractors
    pub declared_type: Option<String>,
}

/// A candidate response found at one return site
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDescriptor {
    pub status: u16,
    pub shape: ResponseShape,
}

/// Everything inferred about one handler routine
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerDescriptor {
    pub name: String,
    pub summary: String,
    pub description: String,
    pub parameters: Vec<ParameterBinding>,
    pub validator: Option<String>,
    pub responses: Vec<ResponseDescriptor>,
}

impl HandlerDescriptor {
    /// Descriptor of a handler whose source is unavailable
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: String::new(),
            description: String::new(),
            parameters: Vec::new(),
            validator: None,
            responses: Vec::new(),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterBinding> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Local name → last shape assigned to it
#[derive(Debug, Default, Clone)]
pub struct VariableEnvironment {
    bindings: HashMap<String, ResponseShape>,
}

impl VariableEnvironment {
    pub fn bind(&mut self, name: impl Into<String>, shape: ResponseShape) {
        self.bindings.insert(name.into(), shape);
    }

    pub fn lookup(&self, name: &str) -> Option<&ResponseShape> {
        self.bindings.get(name)
    }
}

/// What the analyzer knows about the unit a handler lives in
pub struct AnalysisContext<'a> {
    pub unit: &'a SourceUnit,
    pub classifier: &'a dyn CapabilityClassifier,
    pub settings: &'a AnalysisConfig,
    /// Canonical type `Self` refers to, for methods
    pub self_type: Option<String>,
}

impl AnalysisContext<'_> {
    /// Canonical name of a path written in the handler's unit
    pub fn resolve(&self, name: &str) -> String {
        match (&self.self_type, name.strip_prefix("Self")) {
            (Some(self_type), Some("")) => self_type.clone(),
            (Some(self_type), Some(rest)) if rest.starts_with("::") => format!("{}{}", self_type, rest),
            _ => self.unit.resolve(name),
        }
    }

    pub fn has_capability(&self, type_name: &str, capability: Capability) -> bool {
        self.classifier.has_capability(type_name, capability)
    }
}

/// Analyzes one routine.
pub fn analyze_handler(
    ctx: &AnalysisContext<'_>,
    name: &str,
    attrs: &[syn::Attribute],
    sig: &syn::Signature,
    body: &syn::Block,
) -> HandlerDescriptor {
    let description = doc_text(attrs);
    let summary = description.lines().next().unwrap_or_default().to_string();
    let (parameters, validator) = bind_parameters(ctx, sig);

    let mut tails = Vec::new();
    tail_sites(body, &mut tails);

    let mut scanner = BodyScanner {
        ctx,
        params: &parameters,
        env: VariableEnvironment::default(),
        tails,
        responses: Vec::new(),
    };
    scanner.visit_block(body);
    let responses = scanner.responses;

    debug!("Analyzed handler {}: {} response(s)", name, responses.len());

    HandlerDescriptor {
        name: name.to_string(),
        summary,
        description,
        parameters,
        validator,
        responses,
    }
}

/// Leading documentation of an item, tag lines (`@…`) excluded
pub fn doc_text(attrs: &[syn::Attribute]) -> String {
    let mut lines = Vec::new();

    for attr in attrs.iter().filter(|a| a.path().is_ident("doc")) {
        let syn::Meta::NameValue(meta) = &attr.meta else {
            continue;
        };
        let syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(text),
            ..
        }) = &meta.value
        else {
            continue;
        };

        // an empty `///` line is an empty attribute and still separates paragraphs
        for line in text.value().split('\n') {
            let line = line.trim_matches(|c| matches!(c, '\t' | '\r' | ' ' | '/' | '*'));
            if !line.starts_with('@') {
                lines.push(line.to_string());
            }
        }
    }

    lines.join("\n").trim().to_string()
}

const NATIVE_TYPES: &[&str] = &[
    "bool", "char", "str", "String", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16",
    "u32", "u64", "u128", "usize", "f32", "f64",
];

pub fn is_native_type(name: &str) -> bool {
    NATIVE_TYPES.contains(&name)
}

fn bind_parameters(ctx: &AnalysisContext<'_>, sig: &syn::Signature) -> (Vec<ParameterBinding>, Option<String>) {
    let mut parameters = Vec::new();
    let mut validator = None;

    for (index, input) in sig.inputs.iter().enumerate() {
        let syn::FnArg::Typed(typed) = input else {
            continue;
        };

        let name = pattern_name(&typed.pat).unwrap_or_else(|| format!("arg{}", index));
        let declared_type = declared_type(ctx, &typed.ty);

        let kind = match declared_type.as_deref() {
            None => ParameterKind::Native,
            Some(t) if is_native_type(t) => ParameterKind::Native,
            Some(t) if ctx.has_capability(t, Capability::Validator) => ParameterKind::Validator,
            Some(t) if ctx.has_capability(t, Capability::DomainObject) => ParameterKind::DomainObject,
            Some(_) => ParameterKind::Other,
        };

        if kind == ParameterKind::Validator {
            validator = declared_type;
            continue;
        }

        parameters.push(ParameterBinding {
            name,
            kind,
            declared_type,
        });
    }

    (parameters, validator)
}

/// Binding name of a parameter pattern: `id`, `Path(id)`, `mut id`
fn pattern_name(pat: &syn::Pat) -> Option<String> {
    match pat {
        syn::Pat::Ident(ident) => Some(ident.ident.to_string()),
        syn::Pat::Type(typed) => pattern_name(&typed.pat),
        syn::Pat::Reference(reference) => pattern_name(&reference.pat),
        syn::Pat::TupleStruct(tuple) if tuple.elems.len() == 1 => pattern_name(&tuple.elems[0]),
        _ => None,
    }
}

/// Declared type with references, `Option`s and request extractors unwrapped
fn declared_type(ctx: &AnalysisContext<'_>, ty: &syn::Type) -> Option<String> {
    match ty {
        syn::Type::Reference(reference) => declared_type(ctx, &reference.elem),
        syn::Type::Paren(paren) => declared_type(ctx, &paren.elem),
        syn::Type::Group(group) => declared_type(ctx, &group.elem),
        syn::Type::Path(type_path) => {
            let last = type_path.path.segments.last()?;
            let ident = last.ident.to_string();
            let transparent = matches!(ident.as_str(), "Option" | "Box" | "Arc")
                || ctx.settings.is_extractor_wrapper(&ident);

            if transparent {
                let syn::PathArguments::AngleBracketed(args) = &last.arguments else {
                    return None;
                };
                return args.args.iter().find_map(|arg| match arg {
                    syn::GenericArgument::Type(inner) => declared_type(ctx, inner),
                    _ => None,
                });
            }

            if is_native_type(&ident) {
                return Some(ident);
            }
            Some(ctx.resolve(&path_to_string(&type_path.path)))
        }
        _ => None,
    }
}

/// A return site in tail position
enum TailSite<'ast> {
    Expr(&'ast syn::Expr),
    Macro(&'ast syn::StmtMacro),
}

fn tail_sites<'ast>(block: &'ast syn::Block, out: &mut Vec<TailSite<'ast>>) {
    match block.stmts.last() {
        Some(syn::Stmt::Expr(expr, None)) => expr_tails(expr, out),
        Some(syn::Stmt::Macro(mac)) if mac.semi_token.is_none() => out.push(TailSite::Macro(mac)),
        _ => {}
    }
}

fn expr_tails<'ast>(expr: &'ast syn::Expr, out: &mut Vec<TailSite<'ast>>) {
    match expr {
        syn::Expr::If(branch) => {
            tail_sites(&branch.then_branch, out);
            if let Some((_, otherwise)) = &branch.else_branch {
                expr_tails(otherwise, out);
            }
        }
        syn::Expr::Match(matched) => {
            for arm in &matched.arms {
                expr_tails(&arm.body, out);
            }
        }
        syn::Expr::Block(block) => tail_sites(&block.block, out),
        syn::Expr::Unsafe(block) => tail_sites(&block.block, out),
        // recorded by the scanner as an explicit return
        syn::Expr::Return(_) => {}
        _ => out.push(TailSite::Expr(expr)),
    }
}

/// Single pass over a handler body
struct BodyScanner<'ast, 's> {
    ctx: &'s AnalysisContext<'s>,
    params: &'s [ParameterBinding],
    env: VariableEnvironment,
    tails: Vec<TailSite<'ast>>,
    responses: Vec<ResponseDescriptor>,
}

impl BodyScanner<'_, '_> {
    fn evaluator(&self) -> Evaluator<'_> {
        Evaluator {
            ctx: self.ctx,
            env: &self.env,
            params: self.params,
        }
    }

    fn record(&mut self, expr: &syn::Expr) {
        let response = self.evaluator().classify_return(expr);
        self.responses.push(response);
    }

    fn bind(&mut self, name: String, expr: &syn::Expr) {
        let shape = self.evaluator().evaluate(expr);
        self.env.bind(name, shape);
    }
}

impl<'ast> Visit<'ast> for BodyScanner<'ast, '_> {
    fn visit_expr(&mut self, expr: &'ast syn::Expr) {
        visit::visit_expr(self, expr);

        let is_tail = self
            .tails
            .iter()
            .any(|t| matches!(t, TailSite::Expr(tail) if std::ptr::eq(*tail, expr)));
        if is_tail {
            self.record(expr);
        }
    }

    fn visit_stmt_macro(&mut self, mac: &'ast syn::StmtMacro) {
        let is_tail = self
            .tails
            .iter()
            .any(|t| matches!(t, TailSite::Macro(tail) if std::ptr::eq(*tail, mac)));
        if is_tail {
            let expr = syn::Expr::Macro(syn::ExprMacro {
                attrs: Vec::new(),
                mac: mac.mac.clone(),
            });
            self.record(&expr);
        }
    }

    fn visit_local(&mut self, local: &'ast syn::Local) {
        let Some(init) = &local.init else {
            return;
        };
        self.visit_expr(&init.expr);
        if let Some((_, diverge)) = &init.diverge {
            self.visit_expr(diverge);
        }

        if let Some(name) = binding_name(&local.pat) {
            self.bind(name, &init.expr);
        }
    }

    fn visit_expr_assign(&mut self, assign: &'ast syn::ExprAssign) {
        self.visit_expr(&assign.right);

        if let syn::Expr::Path(target) = assign.left.as_ref() {
            if let Some(ident) = target.path.get_ident() {
                self.bind(ident.to_string(), &assign.right);
            }
        }
    }

    fn visit_expr_return(&mut self, ret: &'ast syn::ExprReturn) {
        match &ret.expr {
            Some(expr) => {
                self.visit_expr(expr);
                self.record(expr);
            }
            None => self.responses.push(ResponseDescriptor {
                status: 200,
                shape: ResponseShape::literal(Value::Null),
            }),
        }
    }

    // deferred code does not run as part of the handler body
    fn visit_expr_closure(&mut self, _: &'ast syn::ExprClosure) {}

    fn visit_expr_async(&mut self, _: &'ast syn::ExprAsync) {}

    fn visit_item(&mut self, _: &'ast syn::Item) {}
}

fn binding_name(pat: &syn::Pat) -> Option<String> {
    match pat {
        syn::Pat::Ident(ident) => Some(ident.ident.to_string()),
        syn::Pat::Type(typed) => binding_name(&typed.pat),
        _ => None,
    }
}
