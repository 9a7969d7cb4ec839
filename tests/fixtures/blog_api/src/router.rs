use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::http::posts::PostController;
use crate::http::users::UserController;

pub fn app() -> Router {
    Router::new()
        .nest("/api", api())
        .route("/health", get(|| async { "ok" }))
}

fn api() -> Router {
    Router::new()
        .route("/users", get(UserController::index))
        .route("/users/:user", get(UserController::show).delete(UserController::destroy))
        .route("/users/:user/profile", get(UserController::profile))
        .route("/posts", post(PostController::store))
        .route("/posts/search", get(PostController::search))
        .layer(middleware::from_fn(require_auth))
}
