//! Classification of returned and assigned expressions into response shapes.

use super::literal::literal_value;
use super::{AnalysisContext, ParameterBinding, ParameterKind, ResponseDescriptor, ResponseShape, VariableEnvironment};
use crate::capability::Capability;
use crate::parser::path_to_string;
use serde_json::Value;
use syn::visit::{self, Visit};
use syn::Expr;

/// `StatusCode` constants understood in handler source
const STATUS_CODES: &[(&str, u16, &str)] = &[
    ("CONTINUE", 100, "Continue"),
    ("OK", 200, "OK"),
    ("CREATED", 201, "Created"),
    ("ACCEPTED", 202, "Accepted"),
    ("NO_CONTENT", 204, "No Content"),
    ("MOVED_PERMANENTLY", 301, "Moved Permanently"),
    ("FOUND", 302, "Found"),
    ("SEE_OTHER", 303, "See Other"),
    ("NOT_MODIFIED", 304, "Not Modified"),
    ("TEMPORARY_REDIRECT", 307, "Temporary Redirect"),
    ("BAD_REQUEST", 400, "Bad Request"),
    ("UNAUTHORIZED", 401, "Unauthorized"),
    ("PAYMENT_REQUIRED", 402, "Payment Required"),
    ("FORBIDDEN", 403, "Forbidden"),
    ("NOT_FOUND", 404, "Not Found"),
    ("METHOD_NOT_ALLOWED", 405, "Method Not Allowed"),
    ("CONFLICT", 409, "Conflict"),
    ("GONE", 410, "Gone"),
    ("UNPROCESSABLE_ENTITY", 422, "Unprocessable Entity"),
    ("TOO_MANY_REQUESTS", 429, "Too Many Requests"),
    ("INTERNAL_SERVER_ERROR", 500, "Internal Server Error"),
    ("NOT_IMPLEMENTED", 501, "Not Implemented"),
    ("BAD_GATEWAY", 502, "Bad Gateway"),
    ("SERVICE_UNAVAILABLE", 503, "Service Unavailable"),
];

/// Standard reason phrase of a status code
pub fn reason_phrase(status: u16) -> &'static str {
    STATUS_CODES
        .iter()
        .find(|(_, code, _)| *code == status)
        .map(|(_, _, reason)| *reason)
        .unwrap_or("Response")
}

/// Methods that do not change what a value represents
const TRANSPARENT_METHODS: &[&str] = &["into_response", "into", "unwrap", "expect"];

/// Wrappers that do not change what a value represents
const TRANSPARENT_CALLS: &[&str] = &["Ok", "Some", "Box::new", "Arc::new", "Rc::new"];

/// Type names never treated as a constructed response type
const FOREIGN_TYPES: &[&str] = &[
    "Ok", "Err", "Some", "None", "Vec", "String", "Box", "Arc", "Rc", "HashMap", "BTreeMap",
    "Option", "Result", "Default", "Json", "StatusCode",
];

/// Evaluates expressions against the current environment of a handler
pub struct Evaluator<'e> {
    pub ctx: &'e AnalysisContext<'e>,
    pub env: &'e VariableEnvironment,
    pub params: &'e [ParameterBinding],
}

impl Evaluator<'_> {
    /// Classifies the expression at a return site.
    pub fn classify_return(&self, expr: &Expr) -> ResponseDescriptor {
        let mut status = None;
        let mut failed = false;
        let mut current = unwrap_transparent(expr);

        loop {
            match current {
                Expr::Call(call) if call_path(call).as_deref() == Some("Err") && call.args.len() == 1 => {
                    failed = true;
                    current = unwrap_transparent(&call.args[0]);
                }
                Expr::Tuple(tuple) if tuple.elems.len() >= 2 => {
                    let Some(code) = self.status_code(&tuple.elems[0]) else {
                        break;
                    };
                    status = Some(code);
                    match tuple.elems.last() {
                        Some(last) => current = unwrap_transparent(last),
                        None => break,
                    }
                }
                _ => break,
            }
        }

        let fallback = status.unwrap_or(if failed { 500 } else { 200 });

        if let Some(code) = self.bare_status(current) {
            return ResponseDescriptor {
                status: code,
                shape: ResponseShape::literal(Value::Null),
            };
        }

        if let Some(shape) = self.direct_transformer(current) {
            return ResponseDescriptor {
                status: fallback,
                shape,
            };
        }

        if let Some(responder) = self.find_responder(current) {
            let explicit = responder.status.and_then(|s| self.status_code(s));
            return ResponseDescriptor {
                status: explicit.unwrap_or(fallback),
                shape: self.evaluate(responder.payload),
            };
        }

        ResponseDescriptor {
            status: fallback,
            shape: self.evaluate(current),
        }
    }

    /// General evaluation of an expression to a shape.
    pub fn evaluate(&self, expr: &Expr) -> ResponseShape {
        let expr = unwrap_transparent(expr);

        if let Some(value) = literal_value(expr, self) {
            return ResponseShape::literal(value);
        }

        match expr {
            Expr::Index(index) => {
                if let Some(shape) = self.variable(&index.expr) {
                    return shape;
                }
            }
            Expr::Field(field) => {
                if let Some(shape) = self.variable(&field.base) {
                    return shape;
                }
            }
            Expr::Path(_) => return self.variable(expr).unwrap_or(ResponseShape::Unresolved),
            Expr::MethodCall(_) => {
                let (root, methods) = method_chain(expr);
                if let Some(shape) = self.variable(root) {
                    if methods.iter().any(|m| self.ctx.settings.is_paginate_method(m)) {
                        return shape.paginated();
                    }
                    return shape;
                }
            }
            _ => {}
        }

        match self.first_construction(expr) {
            Some(found) => self.construction_shape(expr, &found),
            None => ResponseShape::Unresolved,
        }
    }

    /// Shape bound to a bare local name or parameter
    fn variable(&self, expr: &Expr) -> Option<ResponseShape> {
        let Expr::Path(path) = expr else {
            return None;
        };
        let name = path.path.get_ident()?.to_string();
        if name == "self" {
            return None;
        }

        if let Some(shape) = self.env.lookup(&name) {
            return Some(shape.clone());
        }

        let param = self.params.iter().find(|p| p.name == name)?;
        match (&param.kind, &param.declared_type) {
            (ParameterKind::DomainObject | ParameterKind::Other, Some(type_name)) => {
                Some(ResponseShape::raw(type_name.clone()))
            }
            _ => None,
        }
    }

    /// Status code denoted by an expression.
    pub fn status_code(&self, expr: &Expr) -> Option<u16> {
        match unwrap_transparent(expr) {
            Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Int(int),
                ..
            }) => int.base10_parse::<u16>().ok().filter(|c| (100..=599).contains(c)),
            Expr::Path(path) => {
                if let Some(ident) = path.path.get_ident() {
                    return match self.env.lookup(&ident.to_string()) {
                        Some(ResponseShape::Literal { value }) => value
                            .as_u64()
                            .and_then(|c| u16::try_from(c).ok())
                            .filter(|c| (100..=599).contains(c)),
                        _ => None,
                    };
                }
                status_constant(&path.path)
            }
            Expr::Call(call) => {
                let name = call_path(call)?;
                if name.ends_with("StatusCode::from_u16") && call.args.len() == 1 {
                    return self.status_code(&call.args[0]);
                }
                None
            }
            _ => None,
        }
    }

    /// `StatusCode::X` forms standing alone as the returned value
    fn bare_status(&self, expr: &Expr) -> Option<u16> {
        match expr {
            Expr::Path(path) => status_constant(&path.path),
            Expr::Call(call) if call_path(call).is_some_and(|p| p.ends_with("from_u16")) => self.status_code(expr),
            _ => None,
        }
    }

    /// Construction of a transformer at the root of the returned expression
    fn direct_transformer(&self, expr: &Expr) -> Option<ResponseShape> {
        let (root, _) = method_chain(expr);
        let found = construction_at(root, self.ctx)?;
        if !self.ctx.has_capability(&found.type_name, Capability::Transformer) {
            return None;
        }
        Some(self.construction_shape(expr, &found))
    }

    fn find_responder<'x>(&self, expr: &'x Expr) -> Option<Responder<'x>> {
        let mut finder = ResponderFinder {
            ctx: self.ctx,
            found: None,
        };
        finder.visit_expr(expr);
        finder.found
    }

    /// First construction in pre-order, skipping std and framework types
    fn first_construction(&self, expr: &Expr) -> Option<Construction> {
        let mut finder = ConstructionFinder {
            ctx: self.ctx,
            found: None,
        };
        finder.visit_expr(expr);
        finder.found
    }

    fn construction_shape(&self, scope: &Expr, found: &Construction) -> ResponseShape {
        let settings = self.ctx.settings;

        if self.ctx.has_capability(&found.type_name, Capability::Transformer) {
            let source = found
                .first_arg
                .as_ref()
                .map(|arg| self.evaluate(arg))
                .unwrap_or(ResponseShape::Unresolved);
            let is_collection = found
                .method
                .as_deref()
                .is_some_and(|m| settings.is_transformer_collection(m));
            return ResponseShape::Wrapped {
                transformer: found.type_name.clone(),
                is_collection,
                is_paginated: source.is_paginated(),
                source: Box::new(source),
            };
        }

        if self.ctx.has_capability(&found.type_name, Capability::DomainObject) {
            let methods = called_methods(scope);
            return ResponseShape::RawType {
                type_name: found.type_name.clone(),
                is_collection: methods.iter().any(|m| settings.is_collection_method(m)),
                is_paginated: methods.iter().any(|m| settings.is_paginate_method(m)),
            };
        }

        ResponseShape::raw(found.type_name.clone())
    }
}

/// Strips wrappers that do not change what an expression represents.
pub fn unwrap_transparent(mut expr: &Expr) -> &Expr {
    loop {
        expr = match expr {
            Expr::Paren(inner) => &inner.expr,
            Expr::Group(inner) => &inner.expr,
            Expr::Reference(inner) => &inner.expr,
            Expr::Await(inner) => &inner.base,
            Expr::Try(inner) => &inner.expr,
            Expr::Call(call)
                if call.args.len() == 1
                    && call_path(call).is_some_and(|p| TRANSPARENT_CALLS.contains(&p.as_str())) =>
            {
                &call.args[0]
            }
            Expr::MethodCall(call)
                if call.args.len() <= 1
                    && TRANSPARENT_METHODS.contains(&call.method.to_string().as_str()) =>
            {
                &call.receiver
            }
            _ => return expr,
        };
    }
}

/// Path of a call's callee, when it is a plain path
pub fn call_path(call: &syn::ExprCall) -> Option<String> {
    match call.func.as_ref() {
        Expr::Path(path) => Some(path_to_string(&path.path)),
        _ => None,
    }
}

fn status_constant(path: &syn::Path) -> Option<u16> {
    let mut segments = path.segments.iter().rev();
    let constant = segments.next()?.ident.to_string();
    let owner = segments.next()?.ident.to_string();
    if owner != "StatusCode" {
        return None;
    }
    STATUS_CODES
        .iter()
        .find(|(name, _, _)| *name == constant)
        .map(|(_, code, _)| *code)
}

/// Root of a method/field/index chain and the methods called along it, outermost first
fn method_chain(mut expr: &Expr) -> (&Expr, Vec<String>) {
    let mut methods = Vec::new();
    loop {
        expr = match expr {
            Expr::MethodCall(call) => {
                methods.push(call.method.to_string());
                &call.receiver
            }
            Expr::Field(field) => &field.base,
            Expr::Index(index) => &index.expr,
            Expr::Try(inner) => &inner.expr,
            Expr::Await(inner) => &inner.base,
            Expr::Paren(inner) => &inner.expr,
            _ => return (expr, methods),
        };
    }
}

/// Every method name called in an expression, static calls included
fn called_methods(expr: &Expr) -> Vec<String> {
    struct Collector(Vec<String>);

    impl<'ast> Visit<'ast> for Collector {
        fn visit_expr_method_call(&mut self, call: &'ast syn::ExprMethodCall) {
            self.0.push(call.method.to_string());
            visit::visit_expr_method_call(self, call);
        }

        fn visit_expr_call(&mut self, call: &'ast syn::ExprCall) {
            if let Expr::Path(path) = call.func.as_ref() {
                if let Some(last) = path.path.segments.last() {
                    self.0.push(last.ident.to_string());
                }
            }
            visit::visit_expr_call(self, call);
        }

        fn visit_expr_closure(&mut self, _: &'ast syn::ExprClosure) {}
    }

    let mut collector = Collector(Vec::new());
    collector.visit_expr(expr);
    collector.0
}

/// A construction or static call on a named type
struct Construction {
    type_name: String,
    /// Static method called on the type (`collection`, `find`), if any
    method: Option<String>,
    first_arg: Option<Expr>,
}

fn is_type_name(segment: &str) -> bool {
    segment.starts_with(|c: char| c.is_ascii_uppercase())
}

/// Construction denoted by `expr` itself: `Type::method(..)`, `Type(..)` or `Type { .. }`
fn construction_at(expr: &Expr, ctx: &AnalysisContext<'_>) -> Option<Construction> {
    let (type_path, method, first_arg) = match expr {
        Expr::Call(call) => {
            let Expr::Path(callee) = call.func.as_ref() else {
                return None;
            };
            let segments: Vec<String> = callee.path.segments.iter().map(|s| s.ident.to_string()).collect();
            let first_arg = call.args.first().cloned();
            match segments.as_slice() {
                [.., owner, method] if is_type_name(owner) && !is_type_name(method) => {
                    (segments[..segments.len() - 1].join("::"), Some(method.clone()), first_arg)
                }
                [.., name] if is_type_name(name) => (segments.join("::"), None, first_arg),
                _ => return None,
            }
        }
        Expr::Struct(literal) => {
            let first_arg = literal.fields.first().map(|f| f.expr.clone());
            (path_to_string(&literal.path), None, first_arg)
        }
        _ => return None,
    };

    let short = type_path.rsplit("::").next().unwrap_or(&type_path);
    if FOREIGN_TYPES.contains(&short) {
        return None;
    }

    let type_name = ctx.resolve(&type_path);
    let known = ctx.classifier.classify(&type_name).is_some();
    if !known && !type_name.starts_with("crate::") {
        return None;
    }

    Some(Construction {
        type_name,
        method,
        first_arg,
    })
}

struct ConstructionFinder<'f, 'a> {
    ctx: &'f AnalysisContext<'a>,
    found: Option<Construction>,
}

impl<'ast> Visit<'ast> for ConstructionFinder<'_, '_> {
    fn visit_expr(&mut self, expr: &'ast Expr) {
        if self.found.is_some() {
            return;
        }
        if let Some(found) = construction_at(expr, self.ctx) {
            self.found = Some(found);
            return;
        }
        visit::visit_expr(self, expr);
    }

    fn visit_expr_closure(&mut self, _: &'ast syn::ExprClosure) {}

    fn visit_expr_async(&mut self, _: &'ast syn::ExprAsync) {}
}

/// A "respond with body + status" call
struct Responder<'x> {
    payload: &'x Expr,
    status: Option<&'x Expr>,
}

struct ResponderFinder<'f, 'a, 'x> {
    ctx: &'f AnalysisContext<'a>,
    found: Option<Responder<'x>>,
}

impl<'x> Visit<'x> for ResponderFinder<'_, '_, 'x> {
    fn visit_expr(&mut self, expr: &'x Expr) {
        if self.found.is_some() {
            return;
        }

        let settings = self.ctx.settings;
        let args = match expr {
            Expr::Call(call) => match call.func.as_ref() {
                Expr::Path(callee) => callee
                    .path
                    .segments
                    .last()
                    .filter(|s| settings.is_responder(&s.ident.to_string()))
                    .map(|_| &call.args),
                _ => None,
            },
            Expr::MethodCall(call) if settings.is_responder(&call.method.to_string()) => Some(&call.args),
            _ => None,
        };

        if let Some(payload) = args.and_then(|a| a.first()) {
            self.found = Some(Responder {
                payload,
                status: args.and_then(|a| a.iter().nth(1)),
            });
            return;
        }

        visit::visit_expr(self, expr);
    }

    fn visit_expr_closure(&mut self, _: &'x syn::ExprClosure) {}

    fn visit_expr_async(&mut self, _: &'x syn::ExprAsync) {}
}

#[cfg(test)]
mod tests {
    use super::super::tests::analyze;
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn only_response(code: &str) -> ResponseDescriptor {
        let descriptor = analyze(code);
        assert_eq!(descriptor.responses.len(), 1, "{:?}", descriptor.responses);
        descriptor.responses[0].clone()
    }

    #[test]
    fn test_paginated_transformer_collection() {
        let response = only_response(
            r#"
            impl UserController {
                pub async fn index(&self) -> Json<Value> {
                    Json(UserResource::collection(User::paginate(15)))
                }
            }
            "#,
        );

        assert_eq!(
            response.shape,
            ResponseShape::Wrapped {
                transformer: "crate::resources::UserResource".to_string(),
                is_collection: true,
                is_paginated: true,
                source: Box::new(ResponseShape::RawType {
                    type_name: "crate::models::User".to_string(),
                    is_collection: true,
                    is_paginated: true,
                }),
            }
        );
    }

    #[test]
    fn test_method_chain_on_variable_marks_pagination() {
        let response = only_response(
            r#"
            impl UserController {
                pub async fn index(&self) -> Json<Value> {
                    let users = User::query();
                    let page = users.filter(active).paginate(20);
                    Json(page)
                }
            }
            "#,
        );

        assert_eq!(
            response.shape,
            ResponseShape::RawType {
                type_name: "crate::models::User".to_string(),
                is_collection: true,
                is_paginated: true,
            }
        );
    }

    #[test]
    fn test_domain_collection_from_static_call() {
        let response = only_response(
            r#"
            impl UserController {
                pub async fn index(&self) -> Json<Vec<Post>> {
                    Json(Post::all(&self.db).await?)
                }
            }
            "#,
        );

        assert_eq!(
            response.shape,
            ResponseShape::RawType {
                type_name: "crate::models::Post".to_string(),
                is_collection: true,
                is_paginated: false,
            }
        );
    }

    #[test]
    fn test_responder_status_argument() {
        let response = only_response(
            r#"
            impl UserController {
                pub fn store(&self) -> Response {
                    response().json(json!({"created": true}), 201)
                }
            }
            "#,
        );

        assert_eq!(response.status, 201);
        assert_eq!(response.shape, ResponseShape::literal(json!({"created": true})));
    }

    #[test]
    fn test_status_from_bound_variable_and_from_u16() {
        let response = only_response(
            r#"
            impl UserController {
                pub fn store(&self) -> Response {
                    let code = 202;
                    (StatusCode::from_u16(code).unwrap(), Json(json!([1, 2])))
                }
            }
            "#,
        );

        assert_eq!(response.status, 202);
        assert_eq!(response.shape, ResponseShape::literal(json!([1, 2])));
    }

    #[test]
    fn test_error_return_defaults_to_500() {
        let descriptor = analyze(
            r#"
            impl UserController {
                pub fn show(&self) -> Result<Json<Value>, AppError> {
                    if missing {
                        return Err(AppError::NotFound);
                    }
                    Err((StatusCode::CONFLICT, Json(json!({"error": "taken"}))))
                }
            }
            "#,
        );

        assert_eq!(descriptor.responses[0].status, 500);
        assert_eq!(descriptor.responses[0].shape, ResponseShape::Unresolved);
        assert_eq!(descriptor.responses[1].status, 409);
        assert_eq!(descriptor.responses[1].shape, ResponseShape::literal(json!({"error": "taken"})));
    }

    #[test]
    fn test_not_found_before_no_content_selects_no_content() {
        let descriptor = analyze(
            r#"
            impl UserController {
                pub async fn destroy(&self, user: User) -> impl IntoResponse {
                    if user.is_locked() {
                        return (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))).into_response();
                    }
                    user.delete().await;
                    StatusCode::NO_CONTENT.into_response()
                }
            }
            "#,
        );

        assert_eq!(descriptor.responses.len(), 2);
        let selected = crate::openapi_builder::select_response(&descriptor.responses).unwrap();
        assert_eq!(selected.status, 204);
        assert_eq!(selected.shape, ResponseShape::literal(Value::Null));
    }

    #[test]
    fn test_bare_status_code() {
        let response = only_response(
            r#"
            impl UserController {
                pub async fn destroy(&self, user: User) -> StatusCode {
                    user.delete().await;
                    StatusCode::NO_CONTENT
                }
            }
            "#,
        );

        assert_eq!(response.status, 204);
        assert_eq!(response.shape, ResponseShape::literal(Value::Null));
    }

    #[test]
    fn test_domain_parameter_returned_directly() {
        let response = only_response(
            r#"
            impl UserController {
                pub async fn show(&self, user: User) -> Json<User> {
                    Json(user)
                }
            }
            "#,
        );

        assert_eq!(response.shape, ResponseShape::raw("crate::models::User"));
    }

    #[test]
    fn test_direct_transformer_with_struct_literal() {
        let response = only_response(
            r#"
            impl UserController {
                pub async fn show(&self, user: User) -> impl IntoResponse {
                    (StatusCode::CREATED, UserResource { user }.into_response())
                }
            }
            "#,
        );

        assert_eq!(response.status, 201);
        assert!(matches!(
            response.shape,
            ResponseShape::Wrapped { ref transformer, is_collection: false, ref source, .. }
                if transformer == "crate::resources::UserResource"
                    && **source == ResponseShape::raw("crate::models::User")
        ));
    }

    #[test]
    fn test_unresolved_expression() {
        let response = only_response(
            r#"
            impl UserController {
                pub async fn show(&self) -> impl IntoResponse {
                    helper()
                }
            }
            "#,
        );

        assert_eq!(response.shape, ResponseShape::Unresolved);
    }

    #[test]
    fn test_reason_phrase() {
        assert_eq!(reason_phrase(200), "OK");
        assert_eq!(reason_phrase(422), "Unprocessable Entity");
        assert_eq!(reason_phrase(299), "Response");
    }
}
