use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Model)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Model)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub author_id: u64,
}
