//! Route table read from `axum::Router` chains in the analysed crate.
//!
//! A router function is any free function whose body calls `.route(..)` or
//! `.nest(..)` with a literal path. Router functions that no other router
//! function calls are the roots; their chains are evaluated into route records:
//!
//! - `.route(path, get(h).post(h2))` registers one route per verb
//! - `.nest(prefix, router)` prefixes every route of `router`
//! - `.merge(router)` adds the routes of `router`
//! - `.layer(l)`/`.route_layer(l)` attach `l` as middleware to the routes so far
//!
//! Routers may be built inline, bound to `let` variables, or returned from
//! other router functions.

use super::{combine_paths, HandlerIdentity, HttpMethod, RouteAction, RouteProvider, RouteRecord};
use crate::parser::{path_to_string, ParsedFile, SourceUnit};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use syn::{visit::Visit, Expr, ExprMethodCall, Lit, Stmt};

const MAX_NEST_DEPTH: usize = 16;

struct FunctionEntry {
    unit: usize,
    block: syn::Block,
}

/// Axum route provider
pub struct AxumRouteProvider {
    units: Vec<SourceUnit>,
    functions: BTreeMap<String, FunctionEntry>,
    routers: BTreeSet<String>,
}

impl AxumRouteProvider {
    pub fn new(files: &[ParsedFile]) -> Self {
        let mut units = Vec::new();
        let mut functions = BTreeMap::new();

        for file in files {
            for unit in SourceUnit::scopes(file) {
                let index = units.len();
                for item in &unit.items {
                    if let syn::Item::Fn(item_fn) = item {
                        let name = format!("{}::{}", unit.module_name(), item_fn.sig.ident);
                        functions.insert(
                            name,
                            FunctionEntry {
                                unit: index,
                                block: (*item_fn.block).clone(),
                            },
                        );
                    }
                }
                units.push(unit);
            }
        }

        let routers = functions
            .iter()
            .filter(|(_, entry)| {
                let mut finder = RouterCallFinder::default();
                finder.visit_block(&entry.block);
                finder.found
            })
            .map(|(name, _)| name.clone())
            .collect();

        Self {
            units,
            functions,
            routers,
        }
    }

    /// Router functions no other router function calls
    fn roots(&self) -> Vec<&str> {
        let mut nested = BTreeSet::new();
        for name in &self.routers {
            let entry = &self.functions[name];
            let unit = &self.units[entry.unit];
            let mut calls = CallCollector::default();
            calls.visit_block(&entry.block);
            for call in calls.paths {
                let callee = unit.resolve(&call);
                if callee != *name && self.routers.contains(&callee) {
                    nested.insert(callee);
                }
            }
        }

        self.routers
            .iter()
            .filter(|name| !nested.contains(*name))
            .map(String::as_str)
            .collect()
    }

    fn walk_function(&self, name: &str, depth: usize) -> Vec<RouteRecord> {
        if depth > MAX_NEST_DEPTH {
            warn!("Router nesting too deep at {}", name);
            return Vec::new();
        }
        let Some(entry) = self.functions.get(name) else {
            return Vec::new();
        };
        debug!("Reading router function {}", name);
        let scope = Scope {
            unit: &self.units[entry.unit],
            depth,
            bindings: HashMap::new(),
        };
        self.walk_block(&entry.block, scope)
    }

    fn walk_block(&self, block: &syn::Block, mut scope: Scope<'_>) -> Vec<RouteRecord> {
        let mut last_bound: Option<String> = None;

        for (index, stmt) in block.stmts.iter().enumerate() {
            let is_tail = index + 1 == block.stmts.len();
            let binding = match stmt {
                Stmt::Local(local) => local
                    .init
                    .as_ref()
                    .and_then(|init| Some((pat_ident(&local.pat)?, init.expr.as_ref()))),
                Stmt::Expr(Expr::Assign(assign), _) => {
                    expr_ident(&assign.left).map(|name| (name, assign.right.as_ref()))
                }
                Stmt::Expr(Expr::Return(ret), _) => {
                    return ret.expr.as_ref().map(|e| self.walk(e, &scope)).unwrap_or_default();
                }
                Stmt::Expr(expr, None) if is_tail => {
                    let routes = self.walk(expr, &scope);
                    if !routes.is_empty() {
                        return routes;
                    }
                    None
                }
                _ => None,
            };

            if let Some((name, init)) = binding {
                let routes = self.walk(init, &scope);
                if !routes.is_empty() {
                    last_bound = Some(name.clone());
                }
                scope.bindings.insert(name, routes);
            }
        }

        // `axum::serve(listener, app)` style bodies: the router is the last binding
        last_bound
            .and_then(|name| scope.bindings.remove(&name))
            .unwrap_or_default()
    }

    fn walk(&self, expr: &Expr, scope: &Scope<'_>) -> Vec<RouteRecord> {
        match expr {
            Expr::MethodCall(call) => self.walk_method(call, scope),
            Expr::Call(call) => {
                if let Expr::Path(func) = call.func.as_ref() {
                    let callee = scope.unit.resolve(&path_to_string(&func.path));
                    if self.routers.contains(&callee) {
                        return self.walk_function(&callee, scope.depth + 1);
                    }
                }
                self.first_routes(call.args.iter(), scope)
            }
            Expr::Path(path) => path
                .path
                .get_ident()
                .and_then(|ident| scope.bindings.get(&ident.to_string()))
                .cloned()
                .unwrap_or_default(),
            Expr::Block(block) => self.walk_block(&block.block, scope.child()),
            Expr::Paren(inner) => self.walk(&inner.expr, scope),
            Expr::Group(inner) => self.walk(&inner.expr, scope),
            Expr::Await(inner) => self.walk(&inner.base, scope),
            Expr::Try(inner) => self.walk(&inner.expr, scope),
            Expr::Reference(inner) => self.walk(&inner.expr, scope),
            Expr::Return(ret) => ret.expr.as_ref().map(|e| self.walk(e, scope)).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn walk_method(&self, call: &ExprMethodCall, scope: &Scope<'_>) -> Vec<RouteRecord> {
        let mut routes = self.walk(&call.receiver, scope);

        match call.method.to_string().as_str() {
            "route" => {
                let (Some(path), Some(method_router)) =
                    (call.args.first().and_then(extract_string_literal), call.args.get(1))
                else {
                    return routes;
                };

                let mut handlers = Vec::new();
                let mut layers = Vec::new();
                collect_method_handlers(method_router, &mut handlers, &mut layers);
                if handlers.is_empty() {
                    debug!("No recognised method router for {}", path);
                }

                for (method, handler) in handlers {
                    let mut record = RouteRecord::new(
                        path.clone(),
                        vec![method.as_str().to_string()],
                        handler_action(handler, scope.unit),
                    );
                    record.middleware = layers.clone();
                    routes.push(record);
                }
            }
            "nest" => {
                let (Some(prefix), Some(inner)) =
                    (call.args.first().and_then(extract_string_literal), call.args.get(1))
                else {
                    return routes;
                };
                let tag = prefix.trim_matches('/');
                for mut record in self.walk(inner, scope) {
                    record.uri = combine_paths(&prefix, &record.uri);
                    record.prefix = match record.prefix.take() {
                        Some(inner_tag) if !tag.is_empty() => Some(format!("{}/{}", tag, inner_tag)),
                        Some(inner_tag) => Some(inner_tag),
                        None if !tag.is_empty() => Some(tag.to_string()),
                        None => None,
                    };
                    routes.push(record);
                }
            }
            "merge" => {
                if let Some(other) = call.args.first() {
                    routes.extend(self.walk(other, scope));
                }
            }
            "layer" | "route_layer" => {
                if let Some(layer) = call.args.first() {
                    let name = middleware_name(layer);
                    for record in &mut routes {
                        record.middleware.push(name.clone());
                    }
                }
            }
            // with_state, fallback, into_make_service, …
            _ if routes.is_empty() => routes = self.first_routes(call.args.iter(), scope),
            _ => {}
        }

        routes
    }

    fn first_routes<'e>(&self, args: impl Iterator<Item = &'e Expr>, scope: &Scope<'_>) -> Vec<RouteRecord> {
        args.map(|arg| self.walk(arg, scope))
            .find(|routes| !routes.is_empty())
            .unwrap_or_default()
    }
}

impl RouteProvider for AxumRouteProvider {
    fn routes(&self) -> anyhow::Result<Vec<RouteRecord>> {
        let roots = self.roots();
        debug!("Found {} router function(s), {} root(s)", self.routers.len(), roots.len());

        let mut routes = Vec::new();
        for root in roots {
            routes.extend(self.walk_function(root, 0));
        }

        if routes.is_empty() {
            warn!("No axum routes found");
        }
        Ok(routes)
    }
}

struct Scope<'u> {
    unit: &'u SourceUnit,
    depth: usize,
    bindings: HashMap<String, Vec<RouteRecord>>,
}

impl Scope<'_> {
    fn child(&self) -> Self {
        Scope {
            unit: self.unit,
            depth: self.depth,
            bindings: self.bindings.clone(),
        }
    }
}

/// `(verb, handler)` pairs of a method router such as `get(a).post(b)`
fn collect_method_handlers<'e>(
    expr: &'e Expr,
    handlers: &mut Vec<(HttpMethod, &'e Expr)>,
    layers: &mut Vec<String>,
) {
    match expr {
        Expr::Call(call) => {
            let Expr::Path(func) = call.func.as_ref() else {
                return;
            };
            let verb = func
                .path
                .segments
                .last()
                .and_then(|segment| HttpMethod::parse(&segment.ident.to_string()));
            if let (Some(verb), Some(handler)) = (verb, call.args.first()) {
                handlers.push((verb, handler));
            }
        }
        Expr::MethodCall(call) => {
            collect_method_handlers(&call.receiver, handlers, layers);
            let name = call.method.to_string();
            if let (Some(verb), Some(handler)) = (HttpMethod::parse(&name), call.args.first()) {
                handlers.push((verb, handler));
            } else if name == "layer" || name == "route_layer" {
                if let Some(layer) = call.args.first() {
                    layers.push(middleware_name(layer));
                }
            }
        }
        Expr::Paren(inner) => collect_method_handlers(&inner.expr, handlers, layers),
        _ => {}
    }
}

fn handler_action(expr: &Expr, unit: &SourceUnit) -> RouteAction {
    match expr {
        Expr::Path(path) => {
            let resolved = unit.resolve(&path_to_string(&path.path));
            match HandlerIdentity::parse(&resolved) {
                Some(identity) => RouteAction::Handler(identity),
                None => RouteAction::Inline,
            }
        }
        Expr::Paren(inner) => handler_action(&inner.expr, unit),
        Expr::Reference(inner) => handler_action(&inner.expr, unit),
        _ => RouteAction::Inline,
    }
}

/// Display name of a layer: the middleware fn of `from_fn(auth)`, the layer
/// type of `TraceLayer::new_for_http()`
fn middleware_name(expr: &Expr) -> String {
    match expr {
        Expr::Call(call) => {
            let Expr::Path(func) = call.func.as_ref() else {
                return "layer".to_string();
            };
            let segments: Vec<&syn::PathSegment> = func.path.segments.iter().collect();
            let Some(last) = segments.last() else {
                return "layer".to_string();
            };
            let last_name = last.ident.to_string();

            if last_name.starts_with("from_fn") || last_name.starts_with("from_extractor") {
                if let syn::PathArguments::AngleBracketed(args) = &last.arguments {
                    if let Some(syn::GenericArgument::Type(syn::Type::Path(ty))) = args.args.first() {
                        if let Some(segment) = ty.path.segments.last() {
                            return segment.ident.to_string();
                        }
                    }
                }
                return call
                    .args
                    .iter()
                    .rev()
                    .find_map(|arg| match arg {
                        Expr::Path(p) => p.path.segments.last().map(|s| s.ident.to_string()),
                        _ => None,
                    })
                    .unwrap_or(last_name);
            }

            match segments.len() {
                0 | 1 => last_name,
                n => segments[n - 2].ident.to_string(),
            }
        }
        Expr::MethodCall(call) => middleware_name(&call.receiver),
        Expr::Path(path) => path
            .path
            .segments
            .last()
            .map(|s| s.ident.to_string())
            .unwrap_or_else(|| "layer".to_string()),
        Expr::Paren(inner) => middleware_name(&inner.expr),
        _ => "layer".to_string(),
    }
}

/// Extract a string literal from an expression
fn extract_string_literal(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            Lit::Str(lit_str) => Some(lit_str.value()),
            _ => None,
        },
        _ => None,
    }
}

fn pat_ident(pat: &syn::Pat) -> Option<String> {
    match pat {
        syn::Pat::Ident(ident) => Some(ident.ident.to_string()),
        syn::Pat::Type(typed) => pat_ident(&typed.pat),
        _ => None,
    }
}

fn expr_ident(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Path(path) => path.path.get_ident().map(|i| i.to_string()),
        _ => None,
    }
}

/// Detects `.route("…", …)`/`.nest("…", …)` calls
#[derive(Default)]
struct RouterCallFinder {
    found: bool,
}

impl<'ast> Visit<'ast> for RouterCallFinder {
    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        let method = node.method.to_string();
        if matches!(method.as_str(), "route" | "nest")
            && node.args.first().and_then(extract_string_literal).is_some()
        {
            self.found = true;
        }
        syn::visit::visit_expr_method_call(self, node);
    }
}

/// Paths of every function call in a body
#[derive(Default)]
struct CallCollector {
    paths: Vec<String>,
}

impl<'ast> Visit<'ast> for CallCollector {
    fn visit_expr_call(&mut self, node: &'ast syn::ExprCall) {
        if let Expr::Path(func) = node.func.as_ref() {
            self.paths.push(path_to_string(&func.path));
        }
        syn::visit::visit_expr_call(self, node);
    }
}
