//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: backend selection and engine construction
//! - `routes/`: operational endpoints

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    routes::router()
        .layer(Extension(services))
        .layer(ServiceBuilder::new())
}
