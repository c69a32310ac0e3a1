//! Executes compiled queries and counts pages for a filter set.

use crate::error::AppError;
use crate::sql::{compile_count, total_pages, FilterSpec, QueryBuf};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};

/// Runs parameterized SQL. SQL text and params are passed through to the driver unmodified.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn fetch_all<T>(&self, q: &QueryBuf) -> Result<Vec<T>, AppError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin;

    async fn fetch_optional<T>(&self, q: &QueryBuf) -> Result<Option<T>, AppError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin;

    /// First column of the first row as a count.
    async fn fetch_count(&self, q: &QueryBuf) -> Result<i64, AppError>;

    /// Rows affected.
    async fn execute(&self, q: &QueryBuf) -> Result<u64, AppError>;
}

fn bind_all<'q>(
    q: &'q QueryBuf,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p);
    }
    query
}

fn bind_all_as<'q, T>(
    q: &'q QueryBuf,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, T, sqlx::postgres::PgArguments>
where
    T: for<'r> FromRow<'r, PgRow>,
{
    let mut query = sqlx::query_as::<_, T>(&q.sql);
    for p in &q.params {
        query = query.bind(p);
    }
    query
}

/// Each call checks a connection out of the pool and returns it when the call completes or fails.
#[async_trait]
impl QueryExecutor for PgPool {
    async fn fetch_all<T>(&self, q: &QueryBuf) -> Result<Vec<T>, AppError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        Ok(bind_all_as::<T>(q).fetch_all(self).await?)
    }

    async fn fetch_optional<T>(&self, q: &QueryBuf) -> Result<Option<T>, AppError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        Ok(bind_all_as::<T>(q).fetch_optional(self).await?)
    }

    async fn fetch_count(&self, q: &QueryBuf) -> Result<i64, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "count");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(p);
        }
        Ok(query.fetch_one(self).await?)
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        let result = bind_all(q).execute(self).await?;
        Ok(result.rows_affected())
    }
}

/// Total pages for `filters` applied to `base_query`: same validation and predicates as
/// [`compile`](crate::sql::compile), wrapped in COUNT(*). Filter errors are raised before the
/// executor is called; executor errors are returned unchanged.
pub async fn count_pages<E>(
    executor: &E,
    base_query: &str,
    filters: &FilterSpec,
    items_per_page: u32,
) -> Result<u32, AppError>
where
    E: QueryExecutor + ?Sized,
{
    let q = compile_count(base_query, filters)?;
    let count = executor.fetch_count(&q).await?;
    Ok(total_pages(count, items_per_page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{BindValue, FilterError, FilterKey, FilterOp, FilterValue};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers every count with a fixed number and records what it was asked.
    struct FixedCount {
        rows: i64,
        calls: AtomicUsize,
        last: Mutex<Option<QueryBuf>>,
    }

    impl FixedCount {
        fn new(rows: i64) -> Self {
            FixedCount {
                rows,
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl QueryExecutor for FixedCount {
        async fn fetch_all<T>(&self, _q: &QueryBuf) -> Result<Vec<T>, AppError>
        where
            T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
        {
            Ok(Vec::new())
        }

        async fn fetch_optional<T>(&self, _q: &QueryBuf) -> Result<Option<T>, AppError>
        where
            T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
        {
            Ok(None)
        }

        async fn fetch_count(&self, q: &QueryBuf) -> Result<i64, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(q.clone());
            Ok(self.rows)
        }

        async fn execute(&self, _q: &QueryBuf) -> Result<u64, AppError> {
            Ok(0)
        }
    }

    /// Fails every call the way a dropped connection would.
    struct Broken;

    #[async_trait]
    impl QueryExecutor for Broken {
        async fn fetch_all<T>(&self, _q: &QueryBuf) -> Result<Vec<T>, AppError>
        where
            T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
        {
            Err(AppError::Db(sqlx::Error::PoolClosed))
        }

        async fn fetch_optional<T>(&self, _q: &QueryBuf) -> Result<Option<T>, AppError>
        where
            T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
        {
            Err(AppError::Db(sqlx::Error::PoolClosed))
        }

        async fn fetch_count(&self, _q: &QueryBuf) -> Result<i64, AppError> {
            Err(AppError::Db(sqlx::Error::PoolClosed))
        }

        async fn execute(&self, _q: &QueryBuf) -> Result<u64, AppError> {
            Err(AppError::Db(sqlx::Error::PoolClosed))
        }
    }

    const BASE: &str = "SELECT id, price FROM items";

    #[tokio::test]
    async fn floors_to_one_page() {
        let exec = FixedCount::new(0);
        assert_eq!(count_pages(&exec, BASE, &FilterSpec::new(), 100).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rounds_up_partial_pages() {
        for (rows, per_page, expected) in [(1, 100, 1), (100, 100, 1), (101, 100, 2), (7, 3, 3), (9, 3, 3)] {
            let exec = FixedCount::new(rows);
            assert_eq!(count_pages(&exec, BASE, &FilterSpec::new(), per_page).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn counts_with_filter_predicates() {
        let exec = FixedCount::new(3);
        let filters = FilterSpec::new()
            .with(FilterKey::new("price", FilterOp::Gt), Some(FilterValue::Scalar(BindValue::F64(5.0))));
        count_pages(&exec, BASE, &filters, 10).await.unwrap();
        let q = exec.last.lock().unwrap().clone().unwrap();
        assert_eq!(
            q.sql,
            "SELECT COUNT(*) FROM (SELECT id, price FROM items WHERE \"price\" > $1) AS filtered"
        );
        assert_eq!(q.params, vec![BindValue::F64(5.0)]);
    }

    #[tokio::test]
    async fn conflicting_filters_never_reach_the_executor() {
        let exec = FixedCount::new(10);
        let filters = FilterSpec::new()
            .with(FilterKey::new("price", FilterOp::Gt), Some(FilterValue::Scalar(BindValue::F64(1.0))))
            .with(FilterKey::new("price", FilterOp::Le), Some(FilterValue::Scalar(BindValue::F64(9.0))));
        let err = count_pages(&exec, BASE, &filters, 10).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Filter(FilterError::ConflictingForms { ref field }) if field == "price"
        ));
        assert_eq!(exec.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn executor_errors_pass_through() {
        let err = count_pages(&Broken, BASE, &FilterSpec::new(), 10).await.unwrap_err();
        assert!(matches!(err, AppError::Db(sqlx::Error::PoolClosed)));
    }
}
