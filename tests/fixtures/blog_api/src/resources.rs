use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct UserResource {
    pub id: u64,
    pub name: String,
    pub email: String,
}

impl Transformer for UserResource {}

#[derive(Debug, Serialize)]
pub struct PostResource {
    pub id: u64,
    pub title: String,
    #[serde(rename = "excerpt")]
    pub body: String,
    pub published: bool,
}

impl Transformer for PostResource {}
