use serde_json::{json, Value};

pub struct StorePost;

impl Validator for StorePost {
    fn rules(&self) -> Value {
        json!({
            "title": "required|string|max:255",
            "body": "required|string",
            "published": "boolean",
        })
    }
}

pub struct SearchPosts;

impl Validator for SearchPosts {
    fn rules(&self) -> Value {
        json!({
            "q": "required|string",
            "page": "integer|min:1",
        })
    }
}
