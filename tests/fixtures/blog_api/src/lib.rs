pub mod http;
pub mod models;
pub mod requests;
pub mod resources;
pub mod router;
