//! Filter specification: named optional predicates parsed from `field[_op]` keys.
//!
//! A key such as `price_gt` is parsed once into a [`FilterKey`] (`price`, [`FilterOp::Gt`]).
//! Columns are only ever taken from a static allow-list of [`FilterField`]s.

use crate::sql::BindValue;
use thiserror::Error;

/// Operator applied to a filtered column. The bare key (no suffix) is equality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Eq,
    In,
    Like,
    Lt,
    Gt,
    Le,
    Ge,
}

impl FilterOp {
    /// Every suffixed operator, longest suffix first so `_like` is tried before the two-letter ones.
    pub const SUFFIXED: [FilterOp; 6] = [
        FilterOp::Like,
        FilterOp::In,
        FilterOp::Lt,
        FilterOp::Gt,
        FilterOp::Le,
        FilterOp::Ge,
    ];

    pub fn suffix(self) -> Option<&'static str> {
        match self {
            FilterOp::Eq => None,
            FilterOp::In => Some("in"),
            FilterOp::Like => Some("like"),
            FilterOp::Lt => Some("lt"),
            FilterOp::Gt => Some("gt"),
            FilterOp::Le => Some("le"),
            FilterOp::Ge => Some("ge"),
        }
    }

    /// SQL comparison operator for the scalar comparison forms.
    pub fn comparison(self) -> Option<&'static str> {
        match self {
            FilterOp::Eq => Some("="),
            FilterOp::Lt => Some("<"),
            FilterOp::Gt => Some(">"),
            FilterOp::Le => Some("<="),
            FilterOp::Ge => Some(">="),
            FilterOp::In | FilterOp::Like => None,
        }
    }
}

/// How raw query-string values for a column are converted before binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Float,
    Text,
}

impl ValueKind {
    /// Parse one raw value. Returns `None` when it does not fit the kind.
    pub fn parse(self, raw: &str) -> Option<BindValue> {
        match self {
            ValueKind::Int => raw.trim().parse::<i64>().ok().map(BindValue::I64),
            ValueKind::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(BindValue::F64),
            ValueKind::Text => Some(BindValue::Text(raw.to_string())),
        }
    }
}

/// One allow-listed filterable column.
#[derive(Clone, Copy, Debug)]
pub struct FilterField {
    pub column: &'static str,
    pub kind: ValueKind,
    pub ops: &'static [FilterOp],
}

impl FilterField {
    pub const fn new(column: &'static str, kind: ValueKind, ops: &'static [FilterOp]) -> Self {
        FilterField { column, kind, ops }
    }

    pub fn allows(&self, op: FilterOp) -> bool {
        self.ops.contains(&op)
    }
}

/// Parsed `field[_op]` key. `field` is always an allow-listed column name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FilterKey {
    pub field: &'static str,
    pub op: FilterOp,
}

impl FilterKey {
    pub fn new(field: &'static str, op: FilterOp) -> Self {
        FilterKey { field, op }
    }

    /// Parse a query key against the allow-list. The most specific match wins: a suffixed
    /// form is tried first, then the bare column name. Returns `None` for unknown keys.
    pub fn parse(key: &str, allowed: &[FilterField]) -> Option<(FilterKey, FilterField)> {
        for op in FilterOp::SUFFIXED {
            let Some(suffix) = op.suffix() else { continue };
            let Some(base) = key
                .strip_suffix(suffix)
                .and_then(|rest| rest.strip_suffix('_'))
            else {
                continue;
            };
            if let Some(field) = allowed.iter().find(|f| f.column == base && f.allows(op)) {
                return Some((FilterKey::new(field.column, op), *field));
            }
        }
        allowed
            .iter()
            .find(|f| f.column == key && f.allows(FilterOp::Eq))
            .map(|f| (FilterKey::new(f.column, FilterOp::Eq), *f))
    }

    /// Key as a client writes it, e.g. `price_gt`.
    pub fn name(&self) -> String {
        match self.op.suffix() {
            Some(suffix) => format!("{}_{}", self.field, suffix),
            None => self.field.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    Scalar(BindValue),
    List(Vec<BindValue>),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Same filter may not be provided in multiple forms")]
    ConflictingForms { field: String },
    #[error("`{key}` requires at least one value")]
    EmptyInList { key: String },
    #[error("`{key}` expects a single value")]
    ExpectedScalar { key: String },
    #[error("`{key}` expects a list of values")]
    ExpectedList { key: String },
}

/// Ordered filter set. Insertion order is the left-to-right order of the generated clauses.
/// A `None` value means "not applied".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterSpec {
    entries: Vec<(FilterKey, Option<FilterValue>)>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a filter. Setting an existing key replaces its value and keeps its position.
    pub fn set(&mut self, key: FilterKey, value: Option<FilterValue>) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with(mut self, key: FilterKey, value: Option<FilterValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &FilterKey) -> Option<&FilterValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&FilterKey, Option<&FilterValue>)> {
        self.entries.iter().map(|(k, v)| (k, v.as_ref()))
    }

    /// Filters that carry a value, in insertion order.
    pub fn active(&self) -> impl Iterator<Item = (&FilterKey, &FilterValue)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.active().next().is_none()
    }

    /// Fails when a column carries a value in more than one form, or when a value has the wrong
    /// shape for its operator. Runs before any SQL is built.
    pub fn validate(&self) -> Result<(), FilterError> {
        let mut seen: Vec<&str> = Vec::new();
        for (key, _) in self.active() {
            if seen.contains(&key.field) {
                return Err(FilterError::ConflictingForms {
                    field: key.field.to_string(),
                });
            }
            seen.push(key.field);
        }
        for (key, value) in self.active() {
            match (key.op, value) {
                (FilterOp::In, FilterValue::List(items)) if items.is_empty() => {
                    return Err(FilterError::EmptyInList { key: key.name() });
                }
                (FilterOp::In, FilterValue::Scalar(_)) => {
                    return Err(FilterError::ExpectedList { key: key.name() });
                }
                (op, FilterValue::List(_)) if op != FilterOp::In => {
                    return Err(FilterError::ExpectedScalar { key: key.name() });
                }
                _ => {}
            }
        }
        Ok(())
    }
}
