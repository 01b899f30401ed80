use axum::{routing::get, Router};

pub mod system;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/status", get(system::status))
}
