// lib/src/storage_engine/query.rs
//
// Structured queries over schemaless documents. Values compare within their
// own type only: numbers numerically, strings lexicographically, booleans
// false-before-true. Timestamps are the exception: an RFC 3339 string and an
// epoch-millisecond number compare as the instants they name.

use std::cmp::Ordering;

use chrono::DateTime;
use models::document::decode_timestamp;
use models::{Collection, Document, Fields};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
    /// The field equals one of the values in an array.
    In,
}

impl FilterOp {
    pub fn is_equality(&self) -> bool {
        matches!(self, FilterOp::Eq | FilterOp::In)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: Collection,
    pub filters: Vec<FieldFilter>,
    pub order: Vec<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: Collection) -> Self {
        Query { collection, filters: Vec::new(), order: Vec::new(), limit: None }
    }

    fn filter(mut self, field: &str, op: FilterOp, value: Value) -> Self {
        self.filters.push(FieldFilter { field: field.to_string(), op, value });
        self
    }

    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value.into())
    }

    pub fn where_lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Lt, value.into())
    }

    pub fn where_lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Lte, value.into())
    }

    pub fn where_gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Gt, value.into())
    }

    pub fn where_gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Gte, value.into())
    }

    pub fn where_in<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect::<Vec<_>>();
        self.filter(field, FilterOp::In, Value::Array(values))
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order.push(OrderBy { field: field.to_string(), direction });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, data: &Fields) -> bool {
        self.filters.iter().all(|f| filter_matches(f, data))
    }

    /// Every field the query touches, in first-mention order.
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        let names = self
            .filters
            .iter()
            .map(|f| f.field.as_str())
            .chain(self.order.iter().map(|o| o.field.as_str()));
        for name in names {
            if !fields.contains(&name) {
                fields.push(name);
            }
        }
        fields
    }

    /// Filters, orders and truncates a batch of documents.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs.into_iter().filter(|d| self.matches(&d.data)).collect();
        if !self.order.is_empty() {
            out.sort_by(|a, b| self.compare(a, b));
        }
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }

    fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for order in &self.order {
            let ord = sort_cmp(a.data.get(&order.field), b.data.get(&order.field));
            let ord = match order.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id.cmp(&b.id)
    }
}

fn filter_matches(filter: &FieldFilter, data: &Fields) -> bool {
    let Some(actual) = data.get(&filter.field) else {
        return false;
    };
    match filter.op {
        FilterOp::Eq => compare_values(actual, &filter.value) == Some(Ordering::Equal),
        FilterOp::In => match &filter.value {
            Value::Array(candidates) => candidates
                .iter()
                .any(|c| compare_values(actual, c) == Some(Ordering::Equal)),
            _ => false,
        },
        FilterOp::Lt => compare_values(actual, &filter.value) == Some(Ordering::Less),
        FilterOp::Lte => matches!(compare_values(actual, &filter.value), Some(Ordering::Less | Ordering::Equal)),
        FilterOp::Gt => compare_values(actual, &filter.value) == Some(Ordering::Greater),
        FilterOp::Gte => matches!(compare_values(actual, &filter.value), Some(Ordering::Greater | Ordering::Equal)),
    }
}

/// Compares two values of the same type; `None` when they cannot be
/// compared. When either side is a timestamp string both sides must decode to
/// instants, so a malformed date never falls inside a date range.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if is_timestamp_text(a) || is_timestamp_text(b) {
        return Some(decode_timestamp(a)?.cmp(&decode_timestamp(b)?));
    }
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn is_timestamp_text(value: &Value) -> bool {
    matches!(value, Value::String(_)) && decode_timestamp(value).is_some()
}

// Variant order is the sort order across types.
#[derive(PartialEq, PartialOrd)]
enum SortKey<'a> {
    Missing,
    Bool(bool),
    Number(f64),
    Text(&'a str),
    Array,
    Object,
}

/// Timestamp strings sort as their epoch milliseconds, so both stored forms
/// of a date interleave chronologically.
fn sort_key(value: Option<&Value>) -> SortKey<'_> {
    match value {
        None | Some(Value::Null) => SortKey::Missing,
        Some(Value::Bool(b)) => SortKey::Bool(*b),
        Some(Value::Number(n)) => SortKey::Number(n.as_f64().unwrap_or_default()),
        Some(Value::String(s)) => match DateTime::parse_from_rfc3339(s) {
            Ok(ts) => SortKey::Number(ts.timestamp_millis() as f64),
            Err(_) => SortKey::Text(s),
        },
        Some(Value::Array(_)) => SortKey::Array,
        Some(Value::Object(_)) => SortKey::Object,
    }
}

/// Total order used for sorting: missing fields first, then by type, then by value.
fn sort_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    sort_key(a).partial_cmp(&sort_key(b)).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        Document::new(id, value.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn range_filters_are_inclusive_where_asked() {
        let q = Query::collection(Collection::Appointments)
            .where_gte("date", "2024-05-01T00:00:00.000Z")
            .where_lte("date", "2024-05-01T23:59:59.999Z");
        assert!(q.matches(&doc("a", json!({ "date": "2024-05-01T00:00:00.000Z" })).data));
        assert!(q.matches(&doc("b", json!({ "date": "2024-05-01T23:59:59.999Z" })).data));
        assert!(!q.matches(&doc("c", json!({ "date": "2024-05-02T00:00:00.000Z" })).data));
        assert!(!q.matches(&doc("d", json!({ "time": "09:00" })).data));
    }

    #[test]
    fn in_filter_and_type_mismatch() {
        let q = Query::collection(Collection::Appointments).where_in("status", ["scheduled", "checked-in"]);
        assert!(q.matches(&doc("a", json!({ "status": "checked-in" })).data));
        assert!(!q.matches(&doc("b", json!({ "status": "completed" })).data));
        let q = Query::collection(Collection::Patients).where_eq("age", 30);
        assert!(!q.matches(&doc("c", json!({ "age": "30" })).data));
        assert!(q.matches(&doc("d", json!({ "age": 30.0 })).data));
    }

    #[test]
    fn apply_orders_by_several_fields_then_limits() {
        let docs = vec![
            doc("1", json!({ "date": "2024-05-02", "time": "09:00" })),
            doc("2", json!({ "date": "2024-05-01", "time": "11:00" })),
            doc("3", json!({ "date": "2024-05-01", "time": "08:30" })),
            doc("4", json!({ "time": "07:00" })),
        ];
        let q = Query::collection(Collection::Appointments)
            .order_by("date", Direction::Asc)
            .order_by("time", Direction::Asc);
        let ids: Vec<_> = q.apply(docs.clone()).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["4", "3", "2", "1"]);

        let q = Query::collection(Collection::Appointments).order_by("date", Direction::Desc).limit(2);
        let ids: Vec<_> = q.apply(docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn millisecond_dates_fall_inside_string_ranges() {
        let q = Query::collection(Collection::Appointments)
            .where_gte("date", "2024-05-01T00:00:00.000Z")
            .where_lte("date", "2024-05-01T23:59:59.999Z");
        // 2024-05-01T10:00:00Z
        assert!(q.matches(&doc("ms", json!({ "date": 1714557600000i64 })).data));
        assert!(!q.matches(&doc("next", json!({ "date": 1714608000000i64 })).data));
        assert!(!q.matches(&doc("bad", json!({ "date": "garbage" })).data));
        assert!(!q.matches(&doc("bad2", json!({ "date": "2024-05-01T12:00" })).data));
    }

    #[test]
    fn both_date_forms_sort_chronologically() {
        let docs = vec![
            doc("late", json!({ "date": "2024-05-01T15:00:00.000Z" })),
            doc("ms", json!({ "date": 1714557600000i64 })),
            doc("early", json!({ "date": "2024-05-01T08:00:00.000Z" })),
            doc("offset", json!({ "date": "2024-05-01T11:00:00+02:00" })),
        ];
        let q = Query::collection(Collection::Appointments).order_by("date", Direction::Asc);
        let ids: Vec<_> = q.apply(docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["early", "offset", "ms", "late"]);
    }

    #[test]
    fn referenced_fields_are_deduplicated() {
        let q = Query::collection(Collection::Appointments)
            .where_eq("doctorId", "d1")
            .where_gte("date", "a")
            .where_lte("date", "b")
            .order_by("date", Direction::Asc)
            .order_by("time", Direction::Asc);
        assert_eq!(q.referenced_fields(), vec!["doctorId", "date", "time"]);
    }
}
