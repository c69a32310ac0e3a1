//! Router assembly.

mod common;
mod products;

pub use common::common_routes;
pub use products::product_routes;

use crate::handlers::{envelope_bare_errors, healthcheck, not_found};
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, middleware::map_response, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Full application: health at `/` and `/v1/`, service routes, products under `/v1`, a JSON 404
/// fallback, the error envelope on framework-built errors, CORS, a body size limit and request
/// tracing. Outside local/dev everything is nested under the environment's root path.
pub fn app(state: AppState) -> Router {
    let body_limit = state.settings.app.body_limit_bytes;
    let root_path = state.settings.environment.root_path();

    let api = Router::new()
        .route("/", get(healthcheck))
        .merge(common_routes(state.clone()))
        .merge(product_routes(state));

    let router = match root_path {
        Some(prefix) => Router::new().nest(prefix, api),
        None => api,
    };

    router
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(map_response(envelope_bare_errors))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
