use axum::{middleware::from_fn, routing::get, Router};

use crate::middleware::require_identity;

pub mod accounts;
pub mod admin;
pub mod rbac;
pub mod system;

/// Router for every endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route_layer(from_fn(require_identity))
        .nest("/users", accounts::router())
        .nest("/admin", admin::router())
        .nest("/rbac", rbac::router())
}
