//! Query state: cursor, filter and sort

use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Row;

/// Continuation token identifying where the next page begins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cursor {
    /// One-based page number
    Page(u64),
    /// Opaque backend token
    Token(String),
}

impl Cursor {
    /// Page number for page-kind pagination; tokens that parse as numbers count
    pub fn page_number(&self) -> Option<u64> {
        match self {
            Cursor::Page(page) => Some(*page),
            Cursor::Token(token) => token.trim().parse().ok(),
        }
    }

    /// Convert a backend-supplied JSON cursor. Null and empty strings mean "no cursor".
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Cursor::Token(s.clone())),
            Value::Number(n) => Some(match n.as_u64() {
                Some(page) => Cursor::Page(page),
                None => Cursor::Token(n.to_string()),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Page(page) => write!(f, "{}", page),
            Cursor::Token(token) => f.write_str(token),
        }
    }
}

/// Sort direction as the UI names it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn label(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ascending",
            SortOrder::Descending => "descending",
        }
    }
}

/// Active sort column and direction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub column: Option<String>,
    pub order: SortOrder,
}

impl SortState {
    pub fn by(column: impl Into<String>, order: SortOrder) -> Self {
        Self {
            column: Some(column.into()),
            order,
        }
    }

    pub fn is_active(&self) -> bool {
        self.column.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// Supported filter operators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    #[default]
    Equal,
}

/// One row of the UI filter builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    #[serde(default)]
    pub operator: FilterOperator,
    pub value: Value,
}

impl FilterCondition {
    pub fn equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::Equal,
            value: value.into(),
        }
    }
}

/// Filter expression grouped by operator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    #[serde(default)]
    pub equal: IndexMap<String, Value>,
}

impl SearchFilter {
    pub fn equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut filter = Self::default();
        filter.equal.insert(field.into(), value.into());
        filter
    }

    /// Fold UI filter conditions into an expression; blank fields are dropped
    pub fn from_conditions(conditions: &[FilterCondition]) -> Self {
        let mut filter = Self::default();
        for condition in conditions {
            if condition.field.trim().is_empty() {
                continue;
            }
            match condition.operator {
                FilterOperator::Equal => {
                    filter
                        .equal
                        .insert(condition.field.clone(), condition.value.clone());
                }
            }
        }
        filter
    }

    pub fn is_empty(&self) -> bool {
        self.equal.is_empty()
    }

    /// Evaluate the expression against a row locally
    pub fn matches(&self, row: &Row) -> bool {
        self.equal.iter().all(|(field, expected)| {
            row.get(field)
                .is_some_and(|actual| loosely_equal(actual, expected))
        })
    }
}

/// Query state owned by a fetch controller
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub cursor: Option<Cursor>,
    pub limit: usize,
    pub filter: SearchFilter,
    pub sort: SortState,
    pub paginate: bool,
}

impl QueryState {
    pub fn new(limit: usize, paginate: bool) -> Self {
        Self {
            cursor: None,
            limit,
            filter: SearchFilter::default(),
            sort: SortState::default(),
            paginate,
        }
    }
}

/// Partial change pushed into a fetch controller. `None` leaves a part unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryUpdate {
    pub filter: Option<SearchFilter>,
    pub sort: Option<SortState>,
    pub limit: Option<usize>,
    pub paginate: Option<bool>,
}

impl QueryUpdate {
    pub fn filter(filter: SearchFilter) -> Self {
        Self {
            filter: Some(filter),
            ..Default::default()
        }
    }

    pub fn sort(sort: SortState) -> Self {
        Self {
            sort: Some(sort),
            ..Default::default()
        }
    }
}

/// Equality that treats `1` and `"1"` as the same value
pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            s.trim() == n.to_string()
        }
        (Value::String(s), Value::Bool(v)) | (Value::Bool(v), Value::String(s)) => {
            s.trim().eq_ignore_ascii_case(if *v { "true" } else { "false" })
        }
        _ => false,
    }
}

/// Ordering used for client-side sorting: nulls first, then booleans,
/// numbers and strings; mixed kinds fall back to their rank.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
