//! Standard response envelope helpers.

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// `{ok: true}`, used by health checks.
#[derive(Serialize, Debug)]
pub struct BaseResponse {
    pub ok: bool,
}

impl Default for BaseResponse {
    fn default() -> Self {
        BaseResponse { ok: true }
    }
}

#[derive(Serialize, Debug)]
pub struct ItemResponse<T> {
    pub ok: bool,
    pub item: T,
}

#[derive(Serialize, Debug)]
pub struct PaginatedResponse<T> {
    pub ok: bool,
    pub items: Vec<T>,
    pub page: u32,
    pub items_per_page: u32,
    pub total_pages: u32,
}

pub fn item_created<T: Serialize>(item: T) -> (StatusCode, Json<ItemResponse<T>>) {
    (StatusCode::CREATED, Json(ItemResponse { ok: true, item }))
}

pub fn item_ok<T: Serialize>(item: T) -> (StatusCode, Json<ItemResponse<T>>) {
    (StatusCode::OK, Json(ItemResponse { ok: true, item }))
}

pub fn paginated<T: Serialize>(
    items: Vec<T>,
    page: u32,
    items_per_page: u32,
    total_pages: u32,
) -> (StatusCode, Json<PaginatedResponse<T>>) {
    (
        StatusCode::OK,
        Json(PaginatedResponse {
            ok: true,
            items,
            page,
            items_per_page,
            total_pages,
        }),
    )
}
