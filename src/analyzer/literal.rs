//! Reduction of literal expressions to JSON values.
//!
//! Entries that cannot be reduced (calls, non-literal variables) are dropped.

use super::expression::{call_path, Evaluator};
use super::ResponseShape;
use serde_json::{Map, Number, Value};
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Expr, Token};

const MAP_TYPES: &[&str] = &["HashMap", "BTreeMap", "IndexMap", "Map"];

/// JSON value of a literal expression, if it has one.
pub fn literal_value(expr: &Expr, eval: &Evaluator<'_>) -> Option<Value> {
    match expr {
        Expr::Lit(lit) => lit_value(&lit.lit),
        Expr::Paren(inner) => literal_value(&inner.expr, eval),
        Expr::Group(inner) => literal_value(&inner.expr, eval),
        Expr::Reference(inner) => literal_value(&inner.expr, eval),
        Expr::Unary(unary) if matches!(unary.op, syn::UnOp::Neg(_)) => negate(literal_value(&unary.expr, eval)?),
        Expr::Path(path) => {
            let ident = path.path.get_ident()?.to_string();
            if ident == "None" {
                return Some(Value::Null);
            }
            match eval.env.lookup(&ident) {
                Some(ResponseShape::Literal { value }) => Some(value.clone()),
                _ => None,
            }
        }
        Expr::Tuple(tuple) if tuple.elems.is_empty() => Some(Value::Null),
        Expr::Tuple(tuple) => Some(sequence(tuple.elems.iter(), eval)),
        Expr::Array(array) => Some(sequence(array.elems.iter(), eval)),
        Expr::Macro(mac) => macro_value(&mac.mac, eval),
        Expr::Struct(literal) => struct_value(literal, eval),
        Expr::Call(call) => call_value(call, eval),
        Expr::MethodCall(call) => {
            let method = call.method.to_string();
            if call.args.is_empty() && matches!(method.as_str(), "to_string" | "to_owned" | "into") {
                return literal_value(&call.receiver, eval);
            }
            None
        }
        _ => None,
    }
}

fn lit_value(lit: &syn::Lit) -> Option<Value> {
    match lit {
        syn::Lit::Str(s) => Some(Value::String(s.value())),
        syn::Lit::Char(c) => Some(Value::String(c.value().to_string())),
        syn::Lit::Bool(b) => Some(Value::Bool(b.value)),
        syn::Lit::Int(int) => int
            .base10_parse::<u64>()
            .ok()
            .map(Value::from)
            .or_else(|| int.base10_parse::<i64>().ok().map(Value::from)),
        syn::Lit::Float(float) => float
            .base10_parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        _ => None,
    }
}

fn negate(value: Value) -> Option<Value> {
    let number = value.as_number()?;
    if let Some(int) = number.as_i64() {
        return Some(Value::from(-int));
    }
    number.as_f64().and_then(|f| Number::from_f64(-f)).map(Value::Number)
}

fn sequence<'x>(elems: impl Iterator<Item = &'x Expr>, eval: &Evaluator<'_>) -> Value {
    Value::Array(elems.filter_map(|e| literal_value(e, eval)).collect())
}

fn key_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn macro_value(mac: &syn::Macro, eval: &Evaluator<'_>) -> Option<Value> {
    let name = mac.path.segments.last()?.ident.to_string();
    match name.as_str() {
        "json" => mac.parse_body::<JsonTemplate>().ok().and_then(|t| t.reduce(eval)),
        "vec" => {
            let elems = mac
                .parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated)
                .ok()?;
            Some(sequence(elems.iter(), eval))
        }
        _ => None,
    }
}

/// Struct literals of plain data types; capability types are classified elsewhere
fn struct_value(literal: &syn::ExprStruct, eval: &Evaluator<'_>) -> Option<Value> {
    let type_name = eval.ctx.resolve(&crate::parser::path_to_string(&literal.path));
    if eval.ctx.classifier.classify(&type_name).is_some() {
        return None;
    }

    let mut object = Map::new();
    for field in &literal.fields {
        let syn::Member::Named(name) = &field.member else {
            continue;
        };
        if let Some(value) = literal_value(&field.expr, eval) {
            object.insert(name.to_string(), value);
        }
    }
    Some(Value::Object(object))
}

/// `HashMap::from([(k, v), ..])` and `String::from("..")`
fn call_value(call: &syn::ExprCall, eval: &Evaluator<'_>) -> Option<Value> {
    let path = call_path(call)?;
    let mut segments = path.rsplit("::");
    if segments.next()? != "from" || call.args.len() != 1 {
        return None;
    }
    let owner = segments.next()?;

    if owner == "String" {
        return literal_value(&call.args[0], eval);
    }
    if !MAP_TYPES.contains(&owner) {
        return None;
    }

    let Expr::Array(entries) = &call.args[0] else {
        return None;
    };
    let mut object = Map::new();
    for entry in &entries.elems {
        let Expr::Tuple(pair) = entry else {
            continue;
        };
        if pair.elems.len() != 2 {
            continue;
        }
        let (Some(key), Some(value)) = (
            literal_value(&pair.elems[0], eval),
            literal_value(&pair.elems[1], eval),
        ) else {
            continue;
        };
        object.insert(key_string(key), value);
    }
    Some(Value::Object(object))
}

/// Body of a `json!` invocation
enum JsonTemplate {
    Null,
    Object(Vec<(JsonKey, JsonTemplate)>),
    Array(Vec<JsonTemplate>),
    Expr(Expr),
}

enum JsonKey {
    Literal(String),
    Expr(Expr),
}

impl JsonTemplate {
    fn reduce(&self, eval: &Evaluator<'_>) -> Option<Value> {
        match self {
            JsonTemplate::Null => Some(Value::Null),
            JsonTemplate::Expr(expr) => literal_value(expr, eval),
            JsonTemplate::Array(items) => Some(Value::Array(
                items.iter().filter_map(|item| item.reduce(eval)).collect(),
            )),
            JsonTemplate::Object(entries) => {
                let mut object = Map::new();
                for (key, value) in entries {
                    let key = match key {
                        JsonKey::Literal(key) => key.clone(),
                        JsonKey::Expr(expr) => match literal_value(expr, eval) {
                            Some(key) => key_string(key),
                            None => continue,
                        },
                    };
                    if let Some(value) = value.reduce(eval) {
                        object.insert(key, value);
                    }
                }
                Some(Value::Object(object))
            }
        }
    }
}

impl Parse for JsonTemplate {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.peek(syn::token::Brace) {
            let content;
            syn::braced!(content in input);
            let mut entries = Vec::new();
            while !content.is_empty() {
                let key = if content.peek(syn::LitStr) {
                    JsonKey::Literal(content.parse::<syn::LitStr>()?.value())
                } else {
                    JsonKey::Expr(content.parse::<Expr>()?)
                };
                content.parse::<Token![:]>()?;
                let value = content.parse::<JsonTemplate>()?;
                entries.push((key, value));
                if content.is_empty() {
                    break;
                }
                content.parse::<Token![,]>()?;
            }
            return Ok(JsonTemplate::Object(entries));
        }

        if input.peek(syn::token::Bracket) {
            let content;
            syn::bracketed!(content in input);
            let items = Punctuated::<JsonTemplate, Token![,]>::parse_terminated(&content)?;
            return Ok(JsonTemplate::Array(items.into_iter().collect()));
        }

        let fork = input.fork();
        if fork.parse::<syn::Ident>().is_ok_and(|ident| ident == "null") && (fork.is_empty() || fork.peek(Token![,])) {
            input.parse::<syn::Ident>()?;
            return Ok(JsonTemplate::Null);
        }

        Ok(JsonTemplate::Expr(input.parse()?))
    }
}
