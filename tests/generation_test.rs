use openapi_from_handlers::{
    config::GeneratorConfig,
    error::GenerationError,
    generator::{Generation, Generator},
    routes::manifest::ManifestRouteProvider,
    serializer::{serialize_json, serialize_yaml},
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Helper function to create a temporary copy of the blog fixture project
fn create_test_project() -> TempDir {
    let files = [
        ("src/lib.rs", include_str!("fixtures/blog_api/src/lib.rs")),
        ("src/models.rs", include_str!("fixtures/blog_api/src/models.rs")),
        ("src/resources.rs", include_str!("fixtures/blog_api/src/resources.rs")),
        ("src/requests.rs", include_str!("fixtures/blog_api/src/requests.rs")),
        ("src/router.rs", include_str!("fixtures/blog_api/src/router.rs")),
        ("src/http/mod.rs", include_str!("fixtures/blog_api/src/http/mod.rs")),
        ("src/http/users.rs", include_str!("fixtures/blog_api/src/http/users.rs")),
        ("src/http/posts.rs", include_str!("fixtures/blog_api/src/http/posts.rs")),
        ("openapi-generator.yaml", include_str!("fixtures/blog_api/openapi-generator.yaml")),
        ("routes.yaml", include_str!("fixtures/blog_api/routes.yaml")),
    ];

    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    for (path, content) in files {
        let file_path = temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&file_path, content).expect("Failed to write test file");
    }
    temp_dir
}

fn generate(temp_dir: &TempDir) -> Generation {
    let config = GeneratorConfig::discover(temp_dir.path()).expect("Failed to load config");
    let provider = ManifestRouteProvider::from_file(&temp_dir.path().join("routes.yaml"))
        .expect("Failed to load route manifest");
    Generator::new(&config, temp_dir.path())
        .run(&provider)
        .expect("Generation failed")
}

fn document_json(generation: &Generation) -> Value {
    serde_json::from_str(&serialize_json(&generation.document).unwrap()).unwrap()
}

#[test]
fn test_document_skeleton() {
    let temp_dir = create_test_project();
    let doc = document_json(&generate(&temp_dir));

    assert_eq!(doc["swagger"], "2.0");
    assert_eq!(
        doc["info"],
        json!({"version": "2.0.0", "title": "Blog API", "description": "Public blog endpoints"})
    );
    assert_eq!(
        doc["securityDefinitions"],
        json!({"Bearer": {"type": "apiKey", "name": "Authorization", "in": "header"}})
    );
    assert_eq!(doc["tags"], json!([{"name": "api"}]));

    let paths: Vec<&str> = doc["paths"].as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(
        paths,
        vec![
            "/api/posts",
            "/api/posts/legacy",
            "/api/posts/search",
            "/api/users",
            "/api/users/{user}",
            "/up",
        ]
    );

    let show = &doc["paths"]["/api/users/{user}"];
    assert!(show.get("head").is_none());
    assert_eq!(show["get"]["security"], json!([{"Bearer": []}]));
    assert_eq!(show["get"]["consumes"], json!(["application/json"]));
    assert_eq!(show["get"]["produces"], json!(["application/json"]));
}

#[test]
fn test_paginated_transformer_collection() {
    let temp_dir = create_test_project();
    let generation = generate(&temp_dir);
    let doc = document_json(&generation);

    let index = &doc["paths"]["/api/users"]["get"];
    assert_eq!(index["operationId"], "users.index");
    assert_eq!(index["summary"], "List users");
    assert_eq!(index["description"], "List users\n\nUsers are returned fifteen per page.");
    assert_eq!(
        index["responses"]["200"]["schema"],
        json!({"$ref": "#/definitions/crate::resources::UserResource::collection"})
    );

    let example = &doc["definitions"]["crate::resources::UserResource::collection"]["example"];
    let user = json!({"id": 1, "name": "Ada Lovelace", "email": "ada@example.com"});
    assert_eq!(example["data"], json!([user.clone(), user]));
    assert_eq!(example["meta"]["per_page"], 15);
    assert_eq!(example["meta"]["total"], 2);
    assert_eq!(example["links"]["next"], Value::Null);
}

#[test]
fn test_single_resource_and_path_parameter() {
    let temp_dir = create_test_project();
    let doc = document_json(&generate(&temp_dir));

    let show = &doc["paths"]["/api/users/{user}"]["get"];
    assert_eq!(
        show["parameters"],
        json!([{"name": "user", "in": "path", "required": true, "type": "integer"}])
    );
    assert_eq!(
        doc["definitions"]["crate::resources::UserResource"]["example"],
        json!({"data": {"id": 1, "name": "Ada Lovelace", "email": "ada@example.com"}})
    );
}

#[test]
fn test_validator_rules_become_body() {
    let temp_dir = create_test_project();
    let doc = document_json(&generate(&temp_dir));

    let store = &doc["paths"]["/api/posts"]["post"];
    assert_eq!(store["x-middleware"], json!(["auth"]));
    assert_eq!(store["responses"]["201"]["description"], "Created");
    assert_eq!(
        store["responses"]["201"]["schema"],
        json!({"$ref": "#/definitions/crate::resources::PostResource"})
    );

    let body = &store["parameters"][0];
    assert_eq!(body["in"], "body");
    assert_eq!(body["schema"]["required"], json!(["title", "body"]));
    assert_eq!(body["schema"]["properties"]["published"]["type"], "boolean");
    assert_eq!(body["schema"]["properties"]["title"]["type"], "string");

    let post = &doc["definitions"]["crate::resources::PostResource"]["example"]["data"];
    assert_eq!(post["id"], 7);
    assert_eq!(post["title"], "Documented post");
    assert_eq!(post["excerpt"], "First post");
}

#[test]
fn test_overrides_take_precedence() {
    let temp_dir = create_test_project();
    let generation = generate(&temp_dir);
    let doc = document_json(&generation);

    let search = &doc["paths"]["/api/posts/search"]["get"];
    assert_eq!(
        search["parameters"],
        json!([{"name": "term", "in": "query", "required": true, "type": "string"}])
    );
    assert_eq!(
        search["responses"]["200"]["schema"],
        json!({"type": "object", "example": {"results": [], "total": 0}})
    );

    // the later route for the same path and verb wins, and its name selects the override
    let legacy = &doc["paths"]["/api/posts/legacy"]["get"];
    assert_eq!(legacy["operationId"], "posts.legacy");
    assert_eq!(
        legacy["responses"]["200"]["schema"],
        json!({"type": "object", "example": {"items": [], "legacy": true}})
    );
    assert!(!generation
        .diagnostics
        .entries()
        .iter()
        .any(|e| matches!(e, GenerationError::InvalidOverrideReference { .. })));
}

#[test]
fn test_inline_route_gets_empty_object() {
    let temp_dir = create_test_project();
    let doc = document_json(&generate(&temp_dir));

    let up = &doc["paths"]["/up"]["get"];
    assert_eq!(up["operationId"], "inline");
    assert_eq!(up["responses"]["200"]["schema"], json!({"type": "object", "example": {}}));
    assert!(up.get("parameters").is_none());
}

#[test]
fn test_generation_is_deterministic() {
    let temp_dir = create_test_project();

    let first = serialize_yaml(&generate(&temp_dir).document).unwrap();
    let second = serialize_yaml(&generate(&temp_dir).document).unwrap();

    assert_eq!(first, second);
}
