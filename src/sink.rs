//! Relational sink, the only thing transformations can reach through `exec`.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use postgres::{Client, NoTls};
use std::error::Error as StdError;
use std::fmt;

use crate::{Result, SyncError};

/// Argument for a parameterized sink statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

impl fmt::Display for SqlArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlArg::String(s) => write!(f, "{:?}", s),
            SqlArg::Number(n) => write!(f, "{}", n),
            SqlArg::Boolean(b) => write!(f, "{}", b),
            SqlArg::Null => write!(f, "null"),
        }
    }
}

/// Execute parameterized statements against the destination database.
pub trait Sink: Send {
    /// Execute `statement` with positional `args`, return affected rows.
    fn execute(&mut self, statement: &str, args: &[SqlArg]) -> Result<u64>;
}

/// Postgres sink, one connection per transformation unit.
pub struct PgSink {
    client: Client,
}

impl PgSink {
    pub fn connect(url: &str) -> Result<PgSink> {
        Ok(PgSink {
            client: Client::connect(url, NoTls)?,
        })
    }

    pub fn new(client: Client) -> PgSink {
        PgSink { client }
    }
}

impl Sink for PgSink {
    fn execute(&mut self, statement: &str, args: &[SqlArg]) -> Result<u64> {
        let params: Vec<&(dyn ToSql + Sync)> =
            args.iter().map(|a| a as &(dyn ToSql + Sync)).collect();
        self.client
            .execute(statement, &params)
            .map_err(SyncError::Sink)
    }
}

type BoxError = Box<dyn StdError + Sync + Send>;

// Numbers arrive as f64 from documents, so integer columns need an explicit narrowing.
fn integer(n: f64, min: f64, max: f64, ty: &Type) -> std::result::Result<i64, BoxError> {
    if n.fract() != 0.0 || n < min || n > max {
        return Err(format!("number {} doesn't fit column type {}", n, ty).into());
    }
    Ok(n as i64)
}

fn is_text(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

/// Parse timestamps rendered by document translation, or rfc3339 ones.
fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f UTC")
                .ok()
                .map(|t| t.and_utc())
        })
}

fn mismatch(arg: &SqlArg, ty: &Type) -> BoxError {
    format!("{} can't be written to column type {}", arg, ty).into()
}

impl ToSql for SqlArg {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        match self {
            SqlArg::Null => Ok(IsNull::Yes),
            SqlArg::Boolean(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                ref t if is_text(t) => b.to_string().as_str().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            SqlArg::String(s) => match *ty {
                ref t if is_text(t) => s.as_str().to_sql(ty, out),
                Type::TIMESTAMPTZ => parse_time(s)
                    .ok_or_else(|| mismatch(self, ty))?
                    .to_sql(ty, out),
                Type::TIMESTAMP => parse_time(s)
                    .ok_or_else(|| mismatch(self, ty))?
                    .naive_utc()
                    .to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            SqlArg::Number(n) => match *ty {
                Type::INT2 => {
                    let n = integer(*n, i16::MIN as f64, i16::MAX as f64, ty)?;
                    (n as i16).to_sql(ty, out)
                }
                Type::INT4 => {
                    let n = integer(*n, i32::MIN as f64, i32::MAX as f64, ty)?;
                    (n as i32).to_sql(ty, out)
                }
                Type::INT8 => integer(*n, i64::MIN as f64, i64::MAX as f64, ty)?.to_sql(ty, out),
                Type::FLOAT4 => (*n as f32).to_sql(ty, out),
                Type::FLOAT8 => n.to_sql(ty, out),
                ref t if is_text(t) => n.to_string().as_str().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::BOOL
                | Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::UNKNOWN
        )
    }

    to_sql_checked!();
}
