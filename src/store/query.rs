//! Queries and watch targets.
//!
//! A `Query` carries equality and array-contains predicates with optional
//! ordering and limit; `WatchTarget` names either a single document or a
//! query. `WatchTarget::topic_key` renders a deterministic identifier so
//! that re-subscribing to the same logical target is detectable.

use std::cmp::Ordering;

use serde_json::Value;

use super::document::DocumentData;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value.
    Eq(String, Value),
    /// Field is an array containing value.
    ArrayContains(String, Value),
}

impl Filter {
    pub fn matches(&self, data: &DocumentData) -> bool {
        match self {
            Filter::Eq(field, expected) => data.get(field) == Some(expected),
            Filter::ArrayContains(field, expected) => match data.get(field) {
                Some(Value::Array(items)) => items.contains(expected),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.into(), value.into()));
        self
    }

    pub fn where_array_contains(
        mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.filters
            .push(Filter::ArrayContains(field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, data: &DocumentData) -> bool {
        self.filters.iter().all(|f| f.matches(data))
    }

    /// Order two documents under this query's `order_by` clause. Without
    /// one, insertion order stands.
    pub fn compare(&self, a: &DocumentData, b: &DocumentData) -> Ordering {
        match &self.order {
            None => Ordering::Equal,
            Some((field, direction)) => {
                let ordering = compare_values(
                    a.get(field).unwrap_or(&Value::Null),
                    b.get(field).unwrap_or(&Value::Null),
                );
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            }
        }
    }
}

/// Cross-type ordering for stored field values: null < bool < number <
/// string; arrays and objects compare equal (never used as sort keys here).
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) | Value::Object(_) => 4,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// What a watch observes: one document or one query.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchTarget {
    Document { collection: String, id: String },
    Query(Query),
}

impl WatchTarget {
    pub fn document(collection: impl Into<String>, id: impl Into<String>) -> Self {
        WatchTarget::Document {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn query(query: Query) -> Self {
        WatchTarget::Query(query)
    }

    /// Deterministic identifier for this target. Equal targets render equal
    /// keys, so a registry can detect re-subscription to the same logical
    /// topic.
    pub fn topic_key(&self) -> String {
        match self {
            WatchTarget::Document { collection, id } => format!("doc:{collection}/{id}"),
            WatchTarget::Query(query) => {
                let mut key = format!("query:{}", query.collection);
                let mut sep = '?';
                for filter in &query.filters {
                    let clause = match filter {
                        Filter::Eq(field, value) => format!("eq({field})={value}"),
                        Filter::ArrayContains(field, value) => {
                            format!("contains({field})={value}")
                        }
                    };
                    key.push(sep);
                    key.push_str(&clause);
                    sep = '&';
                }
                if let Some((field, direction)) = &query.order {
                    let dir = match direction {
                        Direction::Ascending => "asc",
                        Direction::Descending => "desc",
                    };
                    key.push(sep);
                    key.push_str(&format!("order={field}.{dir}"));
                    sep = '&';
                }
                if let Some(limit) = query.limit {
                    key.push(sep);
                    key.push_str(&format!("limit={limit}"));
                }
                key
            }
        }
    }
}
