//! Products resource: row type, request body, filter allow-list and CRUD execution.

use crate::error::AppError;
use crate::service::{FieldRule, RequestValidator};
use crate::sql::{
    compile, count_pages, delete, exists_by_id, insert, select_base, select_by_id, update, BindValue,
    FilterField, FilterOp, FilterSpec, FilterValue, Pagination, QueryExecutor, TableDef, ValueKind,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PRODUCTS: TableDef = TableDef {
    name: "products",
    pk: "id",
    columns: &["id", "name", "description", "price", "image_url"],
};

/// Filterable columns and the operators each accepts on `GET /v1/products`.
pub const PRODUCT_FILTERS: &[FilterField] = &[
    FilterField::new("id", ValueKind::Int, &[FilterOp::Eq, FilterOp::In]),
    FilterField::new("name", ValueKind::Text, &[FilterOp::Eq, FilterOp::In, FilterOp::Like]),
    FilterField::new(
        "price",
        ValueKind::Float,
        &[FilterOp::Lt, FilterOp::Gt, FilterOp::Le, FilterOp::Ge],
    ),
];

const URL_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9+.\-]*://[^\s/?#]+\S*$";

const PRODUCT_RULES: &[FieldRule] = &[
    FieldRule::string("name").length(5, 50),
    FieldRule::string("description").length(10, 65_535),
    FieldRule::number("price").greater_than(0.0),
    FieldRule::string("image_url")
        .optional()
        .max_length(250)
        .pattern(URL_PATTERN),
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub image_url: Option<String>,
}

/// Body of create and full-replace update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl ProductRequest {
    /// Validate a raw JSON body and decode it.
    pub fn from_json(body: Value) -> Result<Self, AppError> {
        RequestValidator::validate(&body, PRODUCT_RULES)?;
        serde_json::from_value(body).map_err(|e| AppError::Validation(vec![format!("body: {}", e)]))
    }

    /// Values in `PRODUCTS.columns` order, primary key excluded.
    fn bind_values(&self) -> Vec<BindValue> {
        vec![
            BindValue::from(self.name.as_str()),
            BindValue::from(self.description.as_str()),
            BindValue::F64(self.price),
            BindValue::from(self.image_url.clone()),
        ]
    }
}

/// Range checks on filter values that the column type alone does not express.
fn check_filter_bounds(filters: &FilterSpec) -> Result<(), AppError> {
    let mut problems = Vec::new();
    for (key, value) in filters.active() {
        let FilterValue::Scalar(v) = value else { continue };
        let ok = match (key.field, key.op, v) {
            ("id", FilterOp::Eq, BindValue::I64(n)) => *n > 0,
            ("price", FilterOp::Gt, BindValue::F64(n)) => *n >= 0.0,
            ("price", _, BindValue::F64(n)) => *n > 0.0,
            _ => true,
        };
        if !ok {
            let bound = if key.op == FilterOp::Gt { "greater than or equal to 0" } else { "greater than 0" };
            problems.push(format!("{}: must be {}", key.name(), bound));
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(problems))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub page: u32,
    pub items_per_page: u32,
    pub total_pages: u32,
}

pub struct ProductService;

impl ProductService {
    /// One page of products matching `filters`. The list query is compiled first (failing fast on
    /// bad filters), then pages are counted, then the page is fetched.
    pub async fn list<E: QueryExecutor>(
        executor: &E,
        filters: &FilterSpec,
        pagination: Pagination,
    ) -> Result<ProductPage, AppError> {
        check_filter_bounds(filters)?;
        let base = select_base(&PRODUCTS);
        let q = compile(&base, filters, Some(PRODUCTS.pk), pagination)?;
        let total_pages = count_pages(executor, &base, filters, pagination.items_per_page()).await?;
        let items = executor.fetch_all::<Product>(&q).await?;
        Ok(ProductPage {
            items,
            page: pagination.page(),
            items_per_page: pagination.items_per_page(),
            total_pages,
        })
    }

    pub async fn read<E: QueryExecutor>(executor: &E, id: i64) -> Result<Product, AppError> {
        executor
            .fetch_optional::<Product>(&select_by_id(&PRODUCTS, id))
            .await?
            .ok_or_else(AppError::product_not_found)
    }

    pub async fn create<E: QueryExecutor>(executor: &E, body: &ProductRequest) -> Result<Product, AppError> {
        let product = executor
            .fetch_optional::<Product>(&insert(&PRODUCTS, body.bind_values()))
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        tracing::info!(id = product.id, "product created");
        Ok(product)
    }

    /// Full replace. Checks existence first so a missing id is a 404, not a silent no-op.
    pub async fn update<E: QueryExecutor>(
        executor: &E,
        id: i64,
        body: &ProductRequest,
    ) -> Result<Product, AppError> {
        Self::ensure_exists(executor, id).await?;
        let product = executor
            .fetch_optional::<Product>(&update(&PRODUCTS, id, body.bind_values()))
            .await?
            .ok_or_else(AppError::product_not_found)?;
        tracing::info!(id, "product updated");
        Ok(product)
    }

    /// Delete and return the row as it was. Only the statement that actually removed the row
    /// sees it, so a repeated or concurrent delete is a 404.
    pub async fn delete<E: QueryExecutor>(executor: &E, id: i64) -> Result<Product, AppError> {
        let product = executor
            .fetch_optional::<Product>(&delete(&PRODUCTS, id))
            .await?
            .ok_or_else(AppError::product_not_found)?;
        tracing::info!(id, "product deleted");
        Ok(product)
    }

    async fn ensure_exists<E: QueryExecutor>(executor: &E, id: i64) -> Result<(), AppError> {
        let found: Option<(i64,)> = executor.fetch_optional(&exists_by_id(&PRODUCTS, id)).await?;
        found.map(|_| ()).ok_or_else(AppError::product_not_found)
    }
}
