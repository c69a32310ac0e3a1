//! Version 1 of the products resource.

use crate::handlers::healthcheck;
use crate::handlers::products::{create, delete, list, read, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn product_routes(state: AppState) -> Router {
    Router::new()
        .route("/v1", get(healthcheck))
        .route("/v1/", get(healthcheck))
        .route("/v1/products", get(list).post(create))
        .route("/v1/products/:id", get(read).put(update).delete(delete))
        .with_state(state)
}
