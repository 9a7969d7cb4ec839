use axum::{extract::Query, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::models::Post;
use crate::requests::{SearchPosts, StorePost};
use crate::resources::PostResource;

pub struct PostController;

impl PostController {
    /// Publish a post
    pub async fn store(Json(input): Json<StorePost>) -> (StatusCode, Json<Value>) {
        let post = Post::create(input).await;
        (StatusCode::CREATED, Json(PostResource::new(post)))
    }

    /// Search posts
    pub async fn search(Query(filter): Query<SearchPosts>) -> Json<Value> {
        Json(json!({"results": [], "total": 0}))
    }

    /// Legacy feed
    pub async fn legacy() -> Json<Value> {
        Json(legacy_feed())
    }

    pub async fn archive() -> Json<Value> {
        Json(json!([]))
    }
}
