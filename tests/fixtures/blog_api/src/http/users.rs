use axum::{extract::Path, http::StatusCode, Json};
use serde_json::Value;

use crate::models::User;
use crate::resources::UserResource;

pub struct UserController;

impl UserController {
    /// List users
    ///
    /// Users are returned fifteen per page.
    pub async fn index() -> Json<Value> {
        Json(UserResource::collection(User::paginate(15)))
    }

    /// Show a user
    pub async fn show(Path(user): Path<User>) -> Json<Value> {
        Json(UserResource::new(user))
    }

    /// Profile of a user
    pub async fn profile(Path(user): Path<User>) -> Json<Value> {
        Json(UserResource::new(user))
    }

    /// Delete a user
    pub async fn destroy(Path(user): Path<User>) -> StatusCode {
        user.delete().await;
        StatusCode::NO_CONTENT
    }
}
