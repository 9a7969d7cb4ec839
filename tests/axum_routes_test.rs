use openapi_from_handlers::{
    cli::route_provider,
    config::GeneratorConfig,
    generator::Generator,
    routes::RouteAction,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

/// Helper function to create a temporary test project
fn create_test_project(files: Vec<(&str, &str)>) -> TempDir {
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

fn blog_project() -> TempDir {
    create_test_project(vec![
        ("src/lib.rs", include_str!("fixtures/blog_api/src/lib.rs")),
        ("src/models.rs", include_str!("fixtures/blog_api/src/models.rs")),
        ("src/resources.rs", include_str!("fixtures/blog_api/src/resources.rs")),
        ("src/requests.rs", include_str!("fixtures/blog_api/src/requests.rs")),
        ("src/router.rs", include_str!("fixtures/blog_api/src/router.rs")),
        ("src/http/mod.rs", include_str!("fixtures/blog_api/src/http/mod.rs")),
        ("src/http/users.rs", include_str!("fixtures/blog_api/src/http/users.rs")),
        ("src/http/posts.rs", include_str!("fixtures/blog_api/src/http/posts.rs")),
        ("openapi-generator.yaml", include_str!("fixtures/blog_api/openapi-generator.yaml")),
    ])
}

#[test]
fn test_router_routes_are_extracted() {
    let temp_dir = blog_project();
    let config = GeneratorConfig::discover(temp_dir.path()).unwrap();
    let generator = Generator::new(&config, temp_dir.path());
    let files = generator.parse_sources().unwrap();

    let routes = route_provider(None, &config, &files).unwrap().routes().unwrap();

    let mut found: Vec<(String, String)> = routes
        .iter()
        .flat_map(|r| r.methods.iter().map(move |m| (m.clone(), r.uri.clone())))
        .collect();
    found.sort();
    assert_eq!(
        found,
        vec![
            ("DELETE".to_string(), "/api/users/:user".to_string()),
            ("GET".to_string(), "/api/posts/search".to_string()),
            ("GET".to_string(), "/api/users".to_string()),
            ("GET".to_string(), "/api/users/:user".to_string()),
            ("GET".to_string(), "/api/users/:user/profile".to_string()),
            ("GET".to_string(), "/health".to_string()),
            ("POST".to_string(), "/api/posts".to_string()),
        ]
    );

    let health = routes.iter().find(|r| r.uri == "/health").unwrap();
    assert_eq!(health.action, RouteAction::Inline);
    assert!(health.middleware.is_empty());

    let index = routes.iter().find(|r| r.uri == "/api/users").unwrap();
    assert_eq!(index.prefix.as_deref(), Some("api"));
    assert_eq!(index.middleware, vec!["require_auth"]);
    match &index.action {
        RouteAction::Handler(identity) => {
            assert_eq!(identity.to_string(), "crate::http::users::UserController::index")
        }
        other => panic!("expected a handler, got {:?}", other),
    }
}

#[test]
fn test_axum_end_to_end_generation() {
    let temp_dir = blog_project();
    let config = GeneratorConfig::discover(temp_dir.path()).unwrap();
    let generator = Generator::new(&config, temp_dir.path());
    let files = generator.parse_sources().unwrap();
    let provider = route_provider(None, &config, &files).unwrap();

    let generation = generator.run_with(&files, provider.as_ref()).unwrap();
    let doc = serde_json::to_value(&generation.document).unwrap();

    let user = &doc["paths"]["/api/users/{user}"];
    assert_eq!(user["get"]["operationId"], "crate::http::users::UserController::show");
    assert_eq!(user["get"]["x-middleware"], json!(["require_auth"]));
    assert_eq!(user["get"]["tags"], json!(["api"]));
    assert_eq!(user["delete"]["responses"]["204"]["description"], "No Content");

    // show and profile render the same transformer, synthesized once
    let profile = &doc["paths"]["/api/users/{user}/profile"]["get"];
    assert_eq!(profile["responses"]["200"]["schema"], user["get"]["responses"]["200"]["schema"]);
    assert_eq!(
        profile["parameters"],
        json!([{"name": "user", "in": "path", "required": true, "type": "integer"}])
    );
    let user_definitions = doc["definitions"]
        .as_object()
        .unwrap()
        .keys()
        .filter(|k| k.starts_with("crate::resources::UserResource"))
        .count();
    assert_eq!(user_definitions, 2);

    let search = &doc["paths"]["/api/posts/search"]["get"];
    assert_eq!(search["parameters"][0]["name"], "term");

    assert_eq!(doc["paths"]["/health"]["get"]["operationId"], "inline");
}

#[test]
fn test_project_without_routers() {
    let temp_dir = create_test_project(vec![("src/lib.rs", "pub fn helper() -> u32 { 1 }")]);
    let config = GeneratorConfig::default();
    let generator = Generator::new(&config, temp_dir.path());
    let files = generator.parse_sources().unwrap();
    let provider = route_provider(None, &config, &files).unwrap();

    let generation = generator.run_with(&files, provider.as_ref()).unwrap();

    assert_eq!(generation.route_count, 0);
    assert!(generation.document.paths.is_empty());
    assert!(generation.document.definitions.is_empty());
}
