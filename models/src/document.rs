// models/src/document.rs
//
// Stored records are schemaless JSON maps. Typed records convert to a map on
// write and are decoded leniently on read: a missing or malformed field takes
// a default instead of failing the whole batch.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field map of a stored document.
pub type Fields = Map<String, Value>;

/// A document as returned by the store: its id plus its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Fields) -> Self {
        Document { id: id.into(), data }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn reader(&self) -> FieldReader<'_> {
        FieldReader { fields: &self.data }
    }
}

pub trait ToDocument {
    fn to_document(&self) -> Fields;
}

pub trait FromDocument: Sized {
    /// Decodes a record, substituting defaults for anything unusable.
    fn from_document(doc: &Document) -> Self;
}

/// Timestamps are stored as RFC 3339 strings with millisecond precision in
/// UTC. Records written elsewhere may hold epoch milliseconds instead.
pub fn encode_timestamp(ts: &DateTime<Utc>) -> Value {
    Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub fn decode_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

/// Defensive accessors over a document's fields.
pub struct FieldReader<'a> {
    fields: &'a Fields,
}

impl<'a> FieldReader<'a> {
    pub fn new(fields: &'a Fields) -> Self {
        FieldReader { fields }
    }

    pub fn opt_str(&self, field: &str) -> Option<String> {
        match self.fields.get(field) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Like `opt_str`, but treats the empty string as absent.
    pub fn non_empty_str(&self, field: &str) -> Option<String> {
        self.opt_str(field).filter(|s| !s.trim().is_empty())
    }

    pub fn str_or_default(&self, field: &str) -> String {
        self.opt_str(field).unwrap_or_default()
    }

    pub fn opt_u32(&self, field: &str) -> Option<u32> {
        match self.fields.get(field) {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .and_then(|v| u32::try_from(v).ok()),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn opt_timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.fields.get(field).and_then(decode_timestamp)
    }

    /// Falls back to the current time when the field is missing or malformed.
    pub fn timestamp_or_now(&self, field: &str) -> DateTime<Utc> {
        self.opt_timestamp(field).unwrap_or_else(Utc::now)
    }
}

/// Inserts `value` under `field` only when it is present.
pub fn put_opt(fields: &mut Fields, field: &str, value: Option<&String>) {
    if let Some(v) = value {
        fields.insert(field.to_string(), Value::String(v.clone()));
    }
}
