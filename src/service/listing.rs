//! Turns list-endpoint query parameters into a filter specification and a page window.

use crate::config::AppSettings;
use crate::error::AppError;
use crate::sql::{FilterField, FilterKey, FilterOp, FilterSpec, FilterValue, Pagination};

#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery {
    pub filters: FilterSpec,
    pub pagination: Pagination,
}

fn parse_u32(key: &str, raw: &str, problems: &mut Vec<String>) -> Option<u32> {
    match raw.trim().parse::<u32>() {
        Ok(n) => Some(n),
        Err(_) => {
            problems.push(format!("{}: must be a non-negative integer", key));
            None
        }
    }
}

impl ListQuery {
    /// Parse raw `key=value` pairs. Every allow-listed key is present in the filter set (unset ones as
    /// `None`) in allow-list order, so clause order never depends on the query string. Repeated
    /// `_in` keys accumulate; other repeated keys keep the last value. Unknown keys are ignored.
    pub fn parse(
        pairs: &[(String, String)],
        allowed: &[FilterField],
        app: &AppSettings,
    ) -> Result<Self, AppError> {
        let mut filters = FilterSpec::new();
        for field in allowed {
            for op in field.ops {
                filters.set(FilterKey::new(field.column, *op), None);
            }
        }

        let mut problems = Vec::new();
        let mut page = 1;
        let mut items_per_page = app.default_items_per_page;

        for (k, raw) in pairs {
            match k.as_str() {
                "page" => page = parse_u32(k, raw, &mut problems).unwrap_or(page),
                "items_per_page" => {
                    items_per_page = parse_u32(k, raw, &mut problems).unwrap_or(items_per_page)
                }
                _ => {
                    let Some((key, field)) = FilterKey::parse(k, allowed) else {
                        continue;
                    };
                    let Some(value) = field.kind.parse(raw) else {
                        problems.push(format!("{}: invalid value '{}'", k, raw));
                        continue;
                    };
                    let next = match (key.op, filters.get(&key)) {
                        (FilterOp::In, Some(FilterValue::List(existing))) => {
                            let mut items = existing.clone();
                            items.push(value);
                            FilterValue::List(items)
                        }
                        (FilterOp::In, _) => FilterValue::List(vec![value]),
                        _ => FilterValue::Scalar(value),
                    };
                    filters.set(key, Some(next));
                }
            }
        }

        let pagination = match Pagination::new(page, items_per_page, app.max_items_per_page) {
            Ok(p) => Some(p),
            Err(AppError::Validation(mut more)) => {
                problems.append(&mut more);
                None
            }
            Err(other) => return Err(other),
        };

        match pagination {
            Some(pagination) if problems.is_empty() => Ok(ListQuery {
                filters,
                pagination,
            }),
            _ => Err(AppError::Validation(problems)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{BindValue, ValueKind};

    const FIELDS: &[FilterField] = &[
        FilterField::new("id", ValueKind::Int, &[FilterOp::Eq, FilterOp::In]),
        FilterField::new("name", ValueKind::Text, &[FilterOp::Eq, FilterOp::Like]),
        FilterField::new("price", ValueKind::Float, &[FilterOp::Gt]),
    ];

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn parse(list: &[(&str, &str)]) -> Result<ListQuery, AppError> {
        ListQuery::parse(&pairs(list), FIELDS, &AppSettings::default())
    }

    #[test]
    fn defaults_without_parameters() {
        let q = parse(&[]).unwrap();
        assert!(q.filters.is_empty());
        assert_eq!(q.filters.entries().count(), 5);
        assert_eq!((q.pagination.page(), q.pagination.items_per_page()), (1, 100));
    }

    #[test]
    fn clause_order_follows_allow_list() {
        let q = parse(&[("price_gt", "2"), ("name_like", "oak"), ("id_in", "3")]).unwrap();
        let active: Vec<String> = q.filters.active().map(|(k, _)| k.name()).collect();
        assert_eq!(active, vec!["id_in", "name_like", "price_gt"]);
    }

    #[test]
    fn repeated_in_keys_accumulate() {
        let q = parse(&[("id_in", "1"), ("id_in", "5"), ("name", "a"), ("name", "b")]).unwrap();
        assert_eq!(
            q.filters.get(&FilterKey::new("id", FilterOp::In)),
            Some(&FilterValue::List(vec![BindValue::I64(1), BindValue::I64(5)]))
        );
        assert_eq!(
            q.filters.get(&FilterKey::new("name", FilterOp::Eq)),
            Some(&FilterValue::Scalar(BindValue::Text("b".into())))
        );
    }

    #[test]
    fn ignores_unknown_keys() {
        let q = parse(&[("description", "x"), ("price_lt", "3"), ("sort", "id")]).unwrap();
        assert!(q.filters.is_empty());
    }

    #[test]
    fn collects_value_and_paging_problems() {
        match parse(&[("id", "abc"), ("page", "0"), ("items_per_page", "5000")]) {
            Err(AppError::Validation(p)) => assert_eq!(
                p,
                vec![
                    "id: invalid value 'abc'",
                    "page: must be greater than 0",
                    "items_per_page: must be less than or equal to 1000",
                ]
            ),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn paging_parameters() {
        let q = parse(&[("page", "3"), ("items_per_page", "20")]).unwrap();
        assert_eq!(q.pagination.offset(), 40);
        assert!(matches!(parse(&[("page", "-1")]), Err(AppError::Validation(_))));
    }
}
