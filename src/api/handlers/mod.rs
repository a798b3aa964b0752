use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

pub mod account;
pub mod admin;
pub mod catalog;

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
