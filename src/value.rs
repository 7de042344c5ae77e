//! Closed value model for documents read from the oplog or a collection scan.
//!
//! Every [Bson] value is mapped into [Value]; kinds that transformations can't receive end up in
//! [Value::Unsupported] instead of being dropped, so translation can refuse them explicitly.

use bson::oid::ObjectId;
use bson::spec::{BinarySubtype, ElementType};
use bson::{Binary, Bson, Document};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Document fields after conversion, key order is irrelevant.
pub type Fields = BTreeMap<String, Value>;

/// One document value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Document(Fields),
    /// mongodb 12 bytes object id.
    ObjectId(ObjectId),
    /// binary value with uuid subtype.
    Uuid(Uuid),
    /// anything else, keeps the bson element type for error reporting.
    Unsupported(ElementType),
}

impl From<Bson> for Value {
    fn from(value: Bson) -> Self {
        match value {
            Bson::String(s) => Value::String(s),
            Bson::Int32(i) => Value::Int32(i),
            Bson::Int64(i) => Value::Int64(i),
            Bson::Double(f) => Value::Double(f),
            Bson::Boolean(b) => Value::Boolean(b),
            Bson::DateTime(t) => match DateTime::from_timestamp_millis(t.timestamp_millis()) {
                Some(t) => Value::DateTime(t),
                None => Value::Unsupported(ElementType::DateTime),
            },
            Bson::Document(d) => Value::Document(to_fields(d)),
            Bson::ObjectId(oid) => Value::ObjectId(oid),
            Bson::Binary(bin) => match get_uuid(&bin) {
                Some(uuid) => Value::Uuid(uuid),
                None => Value::Unsupported(ElementType::Binary),
            },
            other => Value::Unsupported(other.element_type()),
        }
    }
}

/// Convert a whole bson document.
pub fn to_fields(doc: Document) -> Fields {
    doc.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
}

/// Get uuid from a binary value, only when the subtype says so and length is right.
fn get_uuid(bin: &Binary) -> Option<Uuid> {
    match bin.subtype {
        BinarySubtype::Uuid => Uuid::from_slice(&bin.bytes).ok(),
        _ => None,
    }
}
