//! Structured change record parsed from a raw oplog entry.
//!
//! Useful oplog fields:
//! ts: The time when the oplog entry was created. (Timestamp)
//! op: The operation type. ("i" insert, "u" update, "d" delete, "c" command, "n" noop)
//! ns: The namespace on which to apply the operation. (String)
//! o: The operation applied. (Document)
//! o2: Additional information about the operation applied, the `_id` predicate for update. (Document)

use bson::{Bson, Document};

use crate::{Position, Result, SyncError};
use crate::{NAMESPACE_KEY, OBJ2_KEY, OBJ_KEY, OP_KEY, TIMESTAMP_KEY};

/// Insert operation.
pub const INSERT_OP: &str = "i";
/// Update operation.
pub const UPDATE_OP: &str = "u";
/// Delete operation.
pub const DELETE_OP: &str = "d";

/// Kind of the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Update,
    Delete,
    /// any other oplog operation, keeps the raw `op` value.
    Other(String),
}

impl Operation {
    fn from_op(op: &str) -> Self {
        match op {
            INSERT_OP => Operation::Insert,
            UPDATE_OP => Operation::Update,
            DELETE_OP => Operation::Delete,
            other => Operation::Other(other.to_string()),
        }
    }

    /// name used in logs and errors.
    pub fn name(&self) -> &str {
        match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Other(op) => op,
        }
    }
}

/// One source mutation.
///
/// For insert, `document` is the new document.  For update, `filter` identifies the target and
/// `document` is the modifier or the replacement.  For delete, `filter` identifies the target and
/// `document` is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub namespace: String,
    pub operation: Operation,
    pub position: Position,
    pub document: Document,
    pub filter: Option<Document>,
}

impl ChangeRecord {
    /// Parse a raw mongodb oplog entry.
    ///
    /// # Example
    /// ```
    /// use mongo2sql::{ChangeRecord, Operation, Position};
    /// use bson::{doc, Timestamp};
    /// let entry = doc! {
    ///     "ts": Timestamp { time: 1001, increment: 0 },
    ///     "op": "u",
    ///     "ns": "shop.orders",
    ///     "o": {"$set": {"total": 12.0}},
    ///     "o2": {"_id": 1},
    /// };
    /// let record = ChangeRecord::from_oplog_doc(entry).unwrap();
    /// assert_eq!(record.operation, Operation::Update);
    /// assert_eq!(record.position, Position::new(1001, 0));
    /// assert_eq!(record.filter, Some(doc! {"_id": 1}));
    /// ```
    pub fn from_oplog_doc(mut doc: Document) -> Result<Self> {
        let position = Position::from(doc.get_timestamp(TIMESTAMP_KEY)?);
        let namespace = doc.get_str(NAMESPACE_KEY)?.to_string();
        let operation = Operation::from_op(doc.get_str(OP_KEY)?);

        let obj = take_document(&mut doc, OBJ_KEY)?;
        let obj2 = take_document(&mut doc, OBJ2_KEY)?;
        let (document, filter) = match operation {
            Operation::Insert => (require(obj, &namespace, position)?, None),
            Operation::Update => (require(obj, &namespace, position)?, obj2),
            // delete oplog keeps the `_id` predicate in `o`.
            Operation::Delete => (Document::new(), obj),
            Operation::Other(_) => (obj.unwrap_or_default(), obj2),
        };

        Ok(ChangeRecord {
            namespace,
            operation,
            position,
            document,
            filter,
        })
    }
}

fn take_document(doc: &mut Document, key: &str) -> Result<Option<Document>> {
    match doc.remove(key) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::Document(d)) => Ok(Some(d)),
        Some(other) => Err(SyncError::InvalidOplog(format!(
            "`{}` should be a document, get {:?}",
            key,
            other.element_type()
        ))),
    }
}

fn require(obj: Option<Document>, namespace: &str, position: Position) -> Result<Document> {
    obj.ok_or_else(|| {
        SyncError::InvalidOplog(format!(
            "oplog for {} at {} has no `{}` field",
            namespace, position, OBJ_KEY
        ))
    })
}
