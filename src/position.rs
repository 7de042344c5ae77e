//! Position of a change inside the oplog.

use bson::Timestamp;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;

/// Oplog position, `seconds` first and `ordinal` to order changes inside the same second.
///
/// The derived ordering compares fields in declaration order, which is exactly the oplog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    /// seconds since unix epoch.
    pub seconds: i64,
    /// ordinal of the change inside `seconds`.
    pub ordinal: i32,
}

impl Position {
    /// create a new position.
    pub fn new(seconds: i64, ordinal: i32) -> Self {
        Position { seconds, ordinal }
    }

    /// Return true if `self` comes strictly after `other`.
    pub fn is_after(&self, other: &Position) -> bool {
        self > other
    }

    /// wall clock time of the position, ordinal is dropped.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, 0)
    }

    /// same as [to_datetime](Position::to_datetime), without timezone, which is how it's persisted.
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        self.to_datetime().map(|t| t.naive_utc())
    }

    /// rebuild a position from persisted parts.
    pub fn from_naive(time: NaiveDateTime, ordinal: i32) -> Self {
        Position {
            seconds: time.and_utc().timestamp(),
            ordinal,
        }
    }
}

/// `increment` above `i32::MAX` saturates, so order inside a second never goes backwards.
impl From<Timestamp> for Position {
    fn from(ts: Timestamp) -> Self {
        Position {
            seconds: ts.time as i64,
            ordinal: i32::try_from(ts.increment).unwrap_or(i32::MAX),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.seconds, self.ordinal)
    }
}
