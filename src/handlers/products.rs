//! Products CRUD handlers.

use super::{json_rejection, rejection};
use crate::error::AppError;
use crate::response::{item_created, item_ok, paginated};
use crate::service::{ListQuery, ProductRequest, ProductService, PRODUCT_FILTERS};
use crate::state::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    response::IntoResponse,
    Json,
};
use serde_json::Value;

fn parse_id(raw: &str) -> Result<i64, AppError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::Validation(vec![format!(
            "id: must be a positive integer, got '{}'",
            raw
        )])),
    }
}

fn body(payload: Result<Json<Value>, JsonRejection>) -> Result<ProductRequest, AppError> {
    let Json(value) = payload.map_err(json_rejection)?;
    ProductRequest::from_json(value)
}

pub async fn list(
    State(state): State<AppState>,
    params: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(pairs) = params.map_err(|e| rejection("query", e.body_text()))?;
    let query = ListQuery::parse(&pairs, PRODUCT_FILTERS, &state.settings.app)?;
    let page = ProductService::list(&state.pool, &query.filters, query.pagination).await?;
    Ok(paginated(page.items, page.page, page.items_per_page, page.total_pages))
}

pub async fn read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    let product = ProductService::read(&state.pool, id).await?;
    Ok(item_ok(product))
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = body(payload)?;
    let product = ProductService::create(&state.pool, &req).await?;
    Ok(item_created(product))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    let req = body(payload)?;
    let product = ProductService::update(&state.pool, id, &req).await?;
    Ok(item_ok(product))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    let product = ProductService::delete(&state.pool, id).await?;
    Ok(item_ok(product))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_positive_integers() {
        assert_eq!(parse_id("42").unwrap(), 42);
        for raw in ["0", "-3", "abc", "1.5", ""] {
            assert!(matches!(parse_id(raw), Err(AppError::Validation(_))), "{}", raw);
        }
    }
}
