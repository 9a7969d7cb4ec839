//! Validator rule sets.
//!
//! A rule set maps a field to its rule tokens, written either as one
//! `"required|integer|between:1,10"` string or as a list of tokens. Each token
//! is `name[:arg,arg…]`; unknown tokens are ignored.

use serde_json::{Map, Value};

/// What the rules of one field say about it
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRules {
    pub name: String,
    pub required: bool,
    /// Swagger type keyword, `string` unless a type rule says otherwise
    pub value_type: &'static str,
    /// Field holds a list of values
    pub array: bool,
    /// Type of list items, from `field.*` rules
    pub items_type: Option<&'static str>,
    pub notes: Vec<String>,
}

impl FieldRules {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            value_type: "string",
            array: false,
            items_type: None,
            notes: Vec::new(),
        }
    }

    /// Notes joined for display
    pub fn description(&self) -> String {
        self.notes.join("<br>")
    }

    fn apply(&mut self, token: &str) {
        let (rule, params) = parse_rule(token);
        match rule.as_str() {
            "required" | "present" => self.required = true,
            "integer" => self.value_type = "integer",
            "numeric" => self.value_type = "number",
            "boolean" => self.value_type = "boolean",
            "array" => self.array = true,
            "nullable" => self.notes.push("Field may be null.".to_string()),
            "required_if" if params.len() >= 2 => {
                self.notes.push(format!("Required when {}={}.", params[0], params[1]));
            }
            "in" => self.notes.push(format!("One of {}.", params.join(", "))),
            "between" => self.notes.push(format!("Between {}.", params.join(" and "))),
            "unique" => self.notes.push("Must be unique.".to_string()),
            "min" if !params.is_empty() => self.notes.push(format!("Minimum {}.", params[0])),
            "max" if !params.is_empty() => self.notes.push(format!("Maximum {}.", params[0])),
            _ => {}
        }
    }
}

/// Splits `name:a,b` into the rule name and its arguments.
pub fn parse_rule(token: &str) -> (String, Vec<String>) {
    match token.split_once(':') {
        Some((name, args)) => (
            name.trim().to_string(),
            args.split(',').map(|a| a.trim().to_string()).collect(),
        ),
        None => (token.trim().to_string(), Vec::new()),
    }
}

/// Field → rule tokens, from any accepted rule-set layout.
///
/// Accepts an object (`{"name": "required|string"}`) or a list of
/// `[field, rules]` pairs. Anything else yields no fields.
pub fn normalize(rules: &Value) -> Vec<(String, Vec<String>)> {
    let entries: Vec<(String, &Value)> = match rules {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(pairs) => pairs
            .iter()
            .filter_map(|pair| match pair.as_array()?.as_slice() {
                [Value::String(field), tokens] => Some((field.clone(), tokens)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .map(|(field, tokens)| (field, tokens_of(tokens)))
        .collect()
}

fn tokens_of(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .split('|')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items.iter().flat_map(tokens_of).collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

/// Interprets a rule set, one entry per field in declaration order.
///
/// Rules for `field.*` describe the items of `field` and do not produce a
/// field of their own.
pub fn interpret(rules: &Value) -> Vec<FieldRules> {
    let mut fields: Vec<FieldRules> = Vec::new();

    for (name, tokens) in normalize(rules) {
        if let Some(parent) = name.strip_suffix(".*") {
            let mut items = FieldRules::new(parent);
            for token in &tokens {
                items.apply(token);
            }
            let index = match fields.iter().position(|f| f.name == parent) {
                Some(index) => index,
                None => {
                    fields.push(FieldRules::new(parent));
                    fields.len() - 1
                }
            };
            fields[index].array = true;
            fields[index].items_type = Some(items.value_type);
            continue;
        }

        let mut field = FieldRules::new(name);
        for token in &tokens {
            field.apply(token);
        }
        match fields.iter().position(|f| f.name == field.name) {
            // `field.*` came first: keep what it said about the items
            Some(index) => {
                field.array = true;
                field.items_type = fields[index].items_type;
                fields[index] = field;
            }
            None => fields.push(field),
        }
    }

    fields
}

/// Rule set written as a map, for overrides given in configuration
pub fn from_map(rules: &Map<String, Value>) -> Vec<FieldRules> {
    interpret(&Value::Object(rules.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_rule() {
        assert_eq!(parse_rule("required"), ("required".to_string(), vec![]));
        assert_eq!(
            parse_rule("in:draft,published"),
            ("in".to_string(), vec!["draft".to_string(), "published".to_string()])
        );
    }

    #[test]
    fn test_rule_aggregation() {
        let fields = interpret(&json!({
            "age": "required|integer|between:18,99",
            "status": ["nullable", "in:draft,published"],
            "coupon": "required_if:type,promo",
            "price": "numeric",
            "newsletter": "boolean|present",
            "email": "required|unique:users,email|max:255",
            "unknown": "uuid|weird_rule",
        }));

        let by_name = |name: &str| fields.iter().find(|f| f.name == name).unwrap();

        let age = by_name("age");
        assert!(age.required);
        assert_eq!(age.value_type, "integer");
        assert_eq!(age.description(), "Between 18 and 99.");

        let status = by_name("status");
        assert!(!status.required);
        assert_eq!(status.description(), "Field may be null.<br>One of draft, published.");

        assert_eq!(by_name("coupon").description(), "Required when type=promo.");
        assert_eq!(by_name("price").value_type, "number");
        assert!(by_name("newsletter").required);
        assert_eq!(by_name("newsletter").value_type, "boolean");
        assert_eq!(by_name("email").description(), "Must be unique.<br>Maximum 255.");

        let unknown = by_name("unknown");
        assert_eq!(unknown.value_type, "string");
        assert!(unknown.notes.is_empty());

        let order: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(order[0], "age");
    }

    #[test]
    fn test_pairs_layout_and_array_items() {
        let fields = interpret(&json!([
            ["tags.*", "integer"],
            ["tags", "required|array"],
            ["title", "required"],
        ]));

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "tags");
        assert!(fields[0].array);
        assert!(fields[0].required);
        assert_eq!(fields[0].items_type, Some("integer"));
        assert_eq!(fields[1].name, "title");
    }

    #[test]
    fn test_non_rule_values_yield_nothing() {
        assert!(interpret(&json!("required")).is_empty());
        assert!(interpret(&Value::Null).is_empty());
    }
}
