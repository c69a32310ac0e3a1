//! Request body validation from static per-field rules.

use crate::error::AppError;
use regex::Regex;
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
}

/// Rule for one body field. Lengths count characters, not bytes.
#[derive(Clone, Copy, Debug)]
pub struct FieldRule {
    pub field: &'static str,
    pub ty: FieldType,
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Value must be strictly greater than this.
    pub exclusive_minimum: Option<f64>,
    pub pattern: Option<&'static str>,
}

impl FieldRule {
    pub const fn string(field: &'static str) -> Self {
        FieldRule {
            field,
            ty: FieldType::String,
            required: true,
            min_length: None,
            max_length: None,
            exclusive_minimum: None,
            pattern: None,
        }
    }

    pub const fn number(field: &'static str) -> Self {
        FieldRule {
            ty: FieldType::Number,
            ..FieldRule::string(field)
        }
    }

    pub const fn optional(self) -> Self {
        FieldRule {
            required: false,
            ..self
        }
    }

    pub const fn length(self, min: usize, max: usize) -> Self {
        FieldRule {
            min_length: Some(min),
            max_length: Some(max),
            ..self
        }
    }

    pub const fn max_length(self, max: usize) -> Self {
        FieldRule {
            max_length: Some(max),
            ..self
        }
    }

    pub const fn greater_than(self, min: f64) -> Self {
        FieldRule {
            exclusive_minimum: Some(min),
            ..self
        }
    }

    pub const fn pattern(self, pattern: &'static str) -> Self {
        FieldRule {
            pattern: Some(pattern),
            ..self
        }
    }
}

pub struct RequestValidator;

impl RequestValidator {
    /// Validate `body` against every rule and report all offending fields at once.
    pub fn validate(body: &Value, rules: &[FieldRule]) -> Result<(), AppError> {
        let Value::Object(map) = body else {
            return Err(AppError::Validation(vec!["body: must be a JSON object".into()]));
        };
        let problems: Vec<String> = rules
            .iter()
            .filter_map(|rule| check_field(map, rule))
            .collect();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(problems))
        }
    }
}

fn check_field(map: &Map<String, Value>, rule: &FieldRule) -> Option<String> {
    let col = rule.field;
    let v = match map.get(col) {
        None | Some(Value::Null) => {
            return rule.required.then(|| format!("{}: field required", col));
        }
        Some(v) => v,
    };
    match rule.ty {
        FieldType::String => {
            let Some(s) = v.as_str() else {
                return Some(format!("{}: must be a string", col));
            };
            let len = s.chars().count();
            if let Some(min) = rule.min_length {
                if len < min {
                    return Some(format!("{}: must be at least {} characters", col, min));
                }
            }
            if let Some(max) = rule.max_length {
                if len > max {
                    return Some(format!("{}: must be at most {} characters", col, max));
                }
            }
            if let Some(pattern) = rule.pattern {
                match Regex::new(pattern) {
                    Ok(re) if re.is_match(s) => {}
                    Ok(_) => return Some(format!("{}: does not match required format", col)),
                    Err(_) => return Some(format!("{}: invalid pattern", col)),
                }
            }
        }
        FieldType::Number => {
            let Some(n) = v.as_f64() else {
                return Some(format!("{}: must be a number", col));
            };
            if let Some(min) = rule.exclusive_minimum {
                if n <= min {
                    return Some(format!("{}: must be greater than {}", col, min));
                }
            }
        }
    }
    None
}
