//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE statements.
//!
//! Identifiers only ever come from static table definitions and filter allow-lists; every value
//! goes through a `$n` placeholder.

use crate::sql::{BindValue, FilterError, FilterOp, FilterSpec, FilterValue, Pagination};
use regex::Regex;
use std::sync::OnceLock;

/// Static description of a table the service reads and writes.
#[derive(Clone, Copy, Debug)]
pub struct TableDef {
    pub name: &'static str,
    pub pk: &'static str,
    /// All columns in select order, primary key included.
    pub columns: &'static [&'static str],
}

impl TableDef {
    /// Columns written on insert/update (everything except the primary key).
    fn data_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().copied().filter(move |c| *c != self.pk)
    }
}

/// Quote identifier for PostgreSQL (safe: only from static definitions).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn column_list(table: &TableDef) -> String {
    table
        .columns
        .iter()
        .map(|c| quoted(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn where_in_query(sql: &str) -> bool {
    static WHERE: OnceLock<Regex> = OnceLock::new();
    WHERE
        .get_or_init(|| Regex::new(r"(?i)\bwhere\b").expect("static regex"))
        .is_match(sql)
}

/// Final SQL text plus its positional parameters; `params[i]` binds `$i+1`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<BindValue>,
}

impl QueryBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<BindValue>) -> Self {
        QueryBuf {
            sql: sql.into(),
            params,
        }
    }

    fn push_param(&mut self, v: BindValue) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// `SELECT <all columns> FROM <table>`, the base query for list and count.
pub fn select_base(table: &TableDef) -> String {
    format!("SELECT {} FROM {}", column_list(table), quoted(table.name))
}

/// Validate the filter set, then render its predicates as a WHERE (or AND) tail for `base_query`.
/// Placeholders continue from whatever `q` already holds.
fn push_filters(q: &mut QueryBuf, base_query: &str, filters: &FilterSpec) -> Result<String, FilterError> {
    filters.validate()?;

    let mut where_parts = Vec::new();
    for (key, value) in filters.active() {
        let col = quoted(key.field);
        let part = match (key.op, value) {
            (FilterOp::In, FilterValue::List(items)) => {
                let placeholders: Vec<String> = items
                    .iter()
                    .map(|v| format!("${}", q.push_param(v.clone())))
                    .collect();
                format!("{} IN ({})", col, placeholders.join(", "))
            }
            (FilterOp::Like, FilterValue::Scalar(v)) => {
                let n = q.push_param(v.clone());
                format!("{} ILIKE '%' || ${} || '%'", col, n)
            }
            (op, FilterValue::Scalar(v)) => {
                let Some(cmp) = op.comparison() else {
                    return Err(FilterError::ExpectedList { key: key.name() });
                };
                let n = q.push_param(v.clone());
                format!("{} {} ${}", col, cmp, n)
            }
            (_, FilterValue::List(_)) => {
                return Err(FilterError::ExpectedScalar { key: key.name() });
            }
        };
        where_parts.push(part);
    }

    if where_parts.is_empty() {
        return Ok(String::new());
    }
    let joined = where_parts.join(" AND ");
    Ok(if where_in_query(base_query) {
        format!(" AND {}", joined)
    } else {
        format!(" WHERE {}", joined)
    })
}

/// Compile a paginated list query: base query, filter predicates in insertion order, optional
/// ORDER BY, then `LIMIT $n OFFSET $m` with both bounds bound as parameters.
///
/// `base_query` is a SELECT without trailing ORDER BY/LIMIT. If it already has a WHERE clause
/// the predicates are appended with AND.
pub fn compile(
    base_query: &str,
    filters: &FilterSpec,
    order_by: Option<&str>,
    pagination: Pagination,
) -> Result<QueryBuf, FilterError> {
    let mut q = QueryBuf::new();
    let base = base_query.trim_end();
    let where_clause = push_filters(&mut q, base, filters)?;
    let order_clause = order_by
        .map(|c| format!(" ORDER BY {}", quoted(c)))
        .unwrap_or_default();
    let limit = q.push_param(BindValue::I64(pagination.limit()));
    let offset = q.push_param(BindValue::I64(pagination.offset()));
    q.sql = format!(
        "{}{}{} LIMIT ${} OFFSET ${}",
        base, where_clause, order_clause, limit, offset
    );
    Ok(q)
}

/// Compile the row count for the same filter set: identical predicates, no ordering or paging.
pub fn compile_count(base_query: &str, filters: &FilterSpec) -> Result<QueryBuf, FilterError> {
    let mut q = QueryBuf::new();
    let base = base_query.trim_end();
    let where_clause = push_filters(&mut q, base, filters)?;
    q.sql = format!("SELECT COUNT(*) FROM ({}{}) AS filtered", base, where_clause);
    Ok(q)
}

/// SELECT by primary key. Caller's id is the sole param.
pub fn select_by_id(table: &TableDef, id: i64) -> QueryBuf {
    QueryBuf::with_params(
        format!("{} WHERE {} = $1", select_base(table), quoted(table.pk)),
        vec![BindValue::I64(id)],
    )
}

/// Existence check by primary key.
pub fn exists_by_id(table: &TableDef, id: i64) -> QueryBuf {
    QueryBuf::with_params(
        format!(
            "SELECT {} FROM {} WHERE {} = $1",
            quoted(table.pk),
            quoted(table.name),
            quoted(table.pk)
        ),
        vec![BindValue::I64(id)],
    )
}

/// INSERT of every data column; `values` follow `table.columns` order without the PK.
pub fn insert(table: &TableDef, values: Vec<BindValue>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (col, v) in table.data_columns().zip(values) {
        let n = q.push_param(v);
        cols.push(quoted(col));
        placeholders.push(format!("${}", n));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        quoted(table.name),
        cols.join(", "),
        placeholders.join(", "),
        column_list(table)
    );
    q
}

/// Full-replace UPDATE by id; `values` follow `table.columns` order without the PK.
pub fn update(table: &TableDef, id: i64, values: Vec<BindValue>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for (col, v) in table.data_columns().zip(values) {
        let n = q.push_param(v);
        sets.push(format!("{} = ${}", quoted(col), n));
    }
    let id_param = q.push_param(BindValue::I64(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
        quoted(table.name),
        sets.join(", "),
        quoted(table.pk),
        id_param,
        column_list(table)
    );
    q
}

/// DELETE by id, returning the removed row (none when nothing matched).
pub fn delete(table: &TableDef, id: i64) -> QueryBuf {
    QueryBuf::with_params(
        format!(
            "DELETE FROM {} WHERE {} = $1 RETURNING {}",
            quoted(table.name),
            quoted(table.pk),
            column_list(table)
        ),
        vec![BindValue::I64(id)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::FilterKey;

    const ITEMS: TableDef = TableDef {
        name: "items",
        pk: "id",
        columns: &["id", "name", "price"],
    };

    const BASE: &str = "SELECT id, name, price FROM items";

    fn page(page: u32, items_per_page: u32) -> Pagination {
        Pagination::new(page, items_per_page, 1000).unwrap()
    }

    fn placeholders(sql: &str) -> Vec<usize> {
        let re = Regex::new(r"\$(\d+)").unwrap();
        re.captures_iter(sql).map(|c| c[1].parse().unwrap()).collect()
    }

    fn scalar(v: impl Into<BindValue>) -> Option<FilterValue> {
        Some(FilterValue::Scalar(v.into()))
    }

    fn sample_filters() -> FilterSpec {
        FilterSpec::new()
            .with(FilterKey::new("id", FilterOp::Eq), None)
            .with(
                FilterKey::new("id", FilterOp::In),
                Some(FilterValue::List(vec![BindValue::I64(1), BindValue::I64(2), BindValue::I64(3)])),
            )
            .with(FilterKey::new("name", FilterOp::Like), scalar("chair"))
            .with(FilterKey::new("price", FilterOp::Ge), scalar(2.5))
    }

    #[test]
    fn no_filters_only_paginates() {
        let q = compile(BASE, &FilterSpec::new(), None, page(1, 100)).unwrap();
        assert_eq!(q.sql, "SELECT id, name, price FROM items LIMIT $1 OFFSET $2");
        assert_eq!(q.params, vec![BindValue::I64(100), BindValue::I64(0)]);
    }

    #[test]
    fn renders_each_operator_in_insertion_order() {
        let q = compile(BASE, &sample_filters(), Some("id"), page(3, 10)).unwrap();
        assert_eq!(
            q.sql,
            "SELECT id, name, price FROM items WHERE \"id\" IN ($1, $2, $3) \
             AND \"name\" ILIKE '%' || $4 || '%' AND \"price\" >= $5 \
             ORDER BY \"id\" LIMIT $6 OFFSET $7"
        );
        assert_eq!(
            q.params,
            vec![
                BindValue::I64(1),
                BindValue::I64(2),
                BindValue::I64(3),
                BindValue::Text("chair".into()),
                BindValue::F64(2.5),
                BindValue::I64(10),
                BindValue::I64(20),
            ]
        );
    }

    #[test]
    fn comparison_operators() {
        for (op, sym) in [
            (FilterOp::Eq, "="),
            (FilterOp::Lt, "<"),
            (FilterOp::Gt, ">"),
            (FilterOp::Le, "<="),
            (FilterOp::Ge, ">="),
        ] {
            let filters = FilterSpec::new().with(FilterKey::new("price", op), scalar(5.0));
            let q = compile_count(BASE, &filters).unwrap();
            assert_eq!(
                q.sql,
                format!("SELECT COUNT(*) FROM (SELECT id, name, price FROM items WHERE \"price\" {} $1) AS filtered", sym)
            );
        }
    }

    #[test]
    fn appends_with_and_when_base_has_where() {
        let base = "SELECT id FROM items where price > 0";
        let filters = FilterSpec::new().with(FilterKey::new("name", FilterOp::Eq), scalar("x"));
        let q = compile(base, &filters, None, page(1, 5)).unwrap();
        assert_eq!(
            q.sql,
            "SELECT id FROM items where price > 0 AND \"name\" = $1 LIMIT $2 OFFSET $3"
        );
        let q = compile(base, &FilterSpec::new(), None, page(1, 5)).unwrap();
        assert_eq!(q.sql, "SELECT id FROM items where price > 0 LIMIT $1 OFFSET $2");
    }

    #[test]
    fn column_named_like_where_is_not_a_where_clause() {
        let base = "SELECT somewhere FROM items";
        let filters = FilterSpec::new().with(FilterKey::new("name", FilterOp::Eq), scalar("x"));
        let q = compile_count(base, &filters).unwrap();
        assert!(q.sql.contains("items WHERE \"name\" = $1"));
    }

    #[test]
    fn param_count_matches_placeholders() {
        let q = compile(BASE, &sample_filters(), None, page(2, 50)).unwrap();
        let found = placeholders(&q.sql);
        assert_eq!(found.len(), q.params.len());
        assert_eq!(found, (1..=q.params.len()).collect::<Vec<_>>());

        let c = compile_count(BASE, &sample_filters()).unwrap();
        assert_eq!(placeholders(&c.sql).len(), c.params.len());
    }

    #[test]
    fn compile_is_deterministic() {
        let a = compile(BASE, &sample_filters(), Some("id"), page(2, 7)).unwrap();
        let b = compile(BASE, &sample_filters(), Some("id"), page(2, 7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn count_shares_list_predicates() {
        let list = compile(BASE, &sample_filters(), None, page(1, 10)).unwrap();
        let count = compile_count(BASE, &sample_filters()).unwrap();
        let predicates = list.sql.split(" LIMIT ").next().unwrap();
        assert_eq!(count.sql, format!("SELECT COUNT(*) FROM ({}) AS filtered", predicates));
        assert_eq!(count.params[..], list.params[..list.params.len() - 2]);
    }

    #[test]
    fn conflicting_forms_fail_both_compilers() {
        let filters = FilterSpec::new()
            .with(FilterKey::new("name", FilterOp::Eq), scalar("a"))
            .with(FilterKey::new("name", FilterOp::Like), scalar("b"));
        let expected = FilterError::ConflictingForms { field: "name".into() };
        assert_eq!(compile(BASE, &filters, None, page(1, 1)), Err(expected.clone()));
        assert_eq!(compile_count(BASE, &filters), Err(expected));
    }

    #[test]
    fn empty_in_list_fails() {
        let filters = FilterSpec::new().with(FilterKey::new("id", FilterOp::In), Some(FilterValue::List(vec![])));
        assert_eq!(
            compile(BASE, &filters, None, page(1, 1)),
            Err(FilterError::EmptyInList { key: "id_in".into() })
        );
    }

    #[test]
    fn crud_statements() {
        assert_eq!(select_base(&ITEMS), "SELECT \"id\", \"name\", \"price\" FROM \"items\"");
        assert_eq!(
            select_by_id(&ITEMS, 4).sql,
            "SELECT \"id\", \"name\", \"price\" FROM \"items\" WHERE \"id\" = $1"
        );
        let q = insert(&ITEMS, vec!["desk".into(), BindValue::F64(9.0)]);
        assert_eq!(
            q.sql,
            "INSERT INTO \"items\" (\"name\", \"price\") VALUES ($1, $2) RETURNING \"id\", \"name\", \"price\""
        );
        assert_eq!(q.params.len(), 2);
        let q = update(&ITEMS, 7, vec!["desk".into(), BindValue::F64(9.0)]);
        assert_eq!(
            q.sql,
            "UPDATE \"items\" SET \"name\" = $1, \"price\" = $2 WHERE \"id\" = $3 RETURNING \"id\", \"name\", \"price\""
        );
        assert_eq!(q.params[2], BindValue::I64(7));
        assert_eq!(
            delete(&ITEMS, 7).sql,
            "DELETE FROM \"items\" WHERE \"id\" = $1 RETURNING \"id\", \"name\", \"price\""
        );
        assert_eq!(exists_by_id(&ITEMS, 7).sql, "SELECT \"id\" FROM \"items\" WHERE \"id\" = $1");
    }
}
