//! Translate documents into the values transformation handlers receive.

use bson::Document;
use std::collections::BTreeMap;

use crate::value::{to_fields, Fields, Value};
use crate::{Result, SyncError};

/// Table of native values, the argument type of every handler.
pub type NativeTable = BTreeMap<String, NativeValue>;

/// Value as seen by a transformation handler.
///
/// Every number is a `f64`, so 64 bits integers above 2^53 lose precision.  Timestamps are
/// rendered to strings and identifiers to lowercase hex, handlers never see raw bson values.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Null,
    String(String),
    Number(f64),
    Boolean(bool),
    Table(NativeTable),
}

impl NativeValue {
    /// Walk into nested tables by `keys`, None when any key is missing.
    pub fn lookup<'a, I>(&self, keys: I) -> Option<&NativeValue>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut current = self;
        for key in keys {
            match current {
                NativeValue::Table(table) => current = table.get(key)?,
                _ => return None,
            }
        }
        Some(current)
    }
}

/// Translate `doc` into a native table.
///
/// Fails with [SyncError::UnsupportedValueKind] on the first value outside the supported set, no
/// partially translated table is returned.
pub fn translate(doc: Document) -> Result<NativeValue> {
    translate_fields(to_fields(doc)).map(NativeValue::Table)
}

fn translate_fields(fields: Fields) -> Result<NativeTable> {
    fields
        .into_iter()
        .map(|(key, value)| {
            let native = translate_value(&key, value)?;
            Ok((key, native))
        })
        .collect()
}

fn translate_value(key: &str, value: Value) -> Result<NativeValue> {
    Ok(match value {
        Value::String(s) => NativeValue::String(s),
        Value::Int32(i) => NativeValue::Number(i as f64),
        Value::Int64(i) => NativeValue::Number(i as f64),
        Value::Double(f) => NativeValue::Number(f),
        Value::Boolean(b) => NativeValue::Boolean(b),
        Value::DateTime(t) => NativeValue::String(t.to_string()),
        Value::Document(fields) => NativeValue::Table(translate_fields(fields)?),
        Value::ObjectId(oid) => NativeValue::String(oid.to_hex()),
        Value::Uuid(uuid) => NativeValue::String(uuid.simple().to_string()),
        Value::Unsupported(kind) => {
            return Err(SyncError::UnsupportedValueKind {
                key: key.to_string(),
                kind: format!("{:?}", kind),
            })
        }
    })
}
