//! Declarative transformation definitions, expressed in toml.
//!
//! Definition file example, saved as `converters/shop.orders.toml`:
//! ```toml
//! [[insert]]
//! sql = "INSERT INTO orders(id, total) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET total = EXCLUDED.total"
//! args = ["doc._id", "doc.total"]
//! on_error = "fail"
//!
//! [[update]]
//! sql = "UPDATE orders SET total = $2 WHERE id = $1"
//! args = ["filter._id", "doc.$set.total"]
//!
//! [[delete]]
//! sql = "DELETE FROM orders WHERE id = $1"
//! args = ["filter._id"]
//! ```
//!
//! Argument paths start with a handler parameter name (`doc` for insert, `filter` and `doc` for
//! update, `filter` for delete) followed by dotted keys.  A missing key binds null.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use toml::Value as TomlValue;

use super::{
    Definition, Executor, Handler, HandlerResult, Lookup, NativeValue, DELETE_HANDLER,
    INSERT_HANDLER, UPDATE_HANDLER,
};
use crate::{Result, SyncError};

/// What to do when a statement fails in the sink.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// keep going, the failure is only logged.
    #[default]
    Ignore,
    /// fail the handler, which stops the sync.
    Fail,
}

/// One parameterized statement of a handler.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct Statement {
    sql: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    on_error: OnError,
}

/// Handler which runs a list of statements, in order.
#[derive(Debug)]
struct RuleHandler {
    params: &'static [&'static str],
    statements: Vec<Statement>,
}

impl RuleHandler {
    fn resolve(&self, args: &[NativeValue], path: &str) -> NativeValue {
        let mut keys = path.split('.');
        let root = keys.next().unwrap_or_default();
        self.params
            .iter()
            .position(|p| *p == root)
            .and_then(|idx| args.get(idx))
            .and_then(|arg| arg.lookup(keys))
            .cloned()
            .unwrap_or(NativeValue::Null)
    }
}

impl Handler for RuleHandler {
    fn call(&self, args: &[NativeValue], exec: &mut Executor) -> HandlerResult {
        for stmt in self.statements.iter() {
            let values: Vec<NativeValue> =
                stmt.args.iter().map(|p| self.resolve(args, p)).collect();
            if !exec.exec(&stmt.sql, &values) && stmt.on_error == OnError::Fail {
                return Err(format!("statement {:?} failed", stmt.sql));
            }
        }
        Ok(())
    }
}

const INSERT_PARAMS: &[&str] = &["doc"];
const UPDATE_PARAMS: &[&str] = &["filter", "doc"];
const DELETE_PARAMS: &[&str] = &["filter"];

fn params_of(name: &str) -> Option<&'static [&'static str]> {
    match name {
        INSERT_HANDLER => Some(INSERT_PARAMS),
        UPDATE_HANDLER => Some(UPDATE_PARAMS),
        DELETE_HANDLER => Some(DELETE_PARAMS),
        _ => None,
    }
}

/// Transformation definition parsed from a toml rule table.
#[derive(Debug)]
pub struct RuleDefinition {
    table: BTreeMap<String, TomlValue>,
}

impl RuleDefinition {
    /// Parse definition from toml `content`.
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        let table: BTreeMap<String, TomlValue> = toml::from_str(content)?;
        Ok(RuleDefinition { table })
    }

    /// Load definition from file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|detail| SyncError::Io {
            path: path.display().to_string(),
            detail,
        })?;
        RuleDefinition::parse(&content).map_err(|detail| SyncError::Toml {
            path: path.display().to_string(),
            detail,
        })
    }

    fn build(name: &str, value: TomlValue) -> std::result::Result<RuleHandler, String> {
        let params = params_of(name).ok_or_else(|| format!("unknown handler `{}`", name))?;
        let items = match value {
            TomlValue::Array(items) => items,
            table @ TomlValue::Table(_) => vec![table],
            other => {
                return Err(format!(
                    "expect a statement table or an array of them, get {}",
                    other.type_str()
                ))
            }
        };

        let mut statements = Vec::with_capacity(items.len());
        for item in items {
            let stmt: Statement = item.try_into().map_err(|e| e.to_string())?;
            for path in stmt.args.iter() {
                let root = path.split('.').next().unwrap_or_default();
                if !params.iter().any(|p| *p == root) {
                    return Err(format!(
                        "argument {:?} must start with one of {:?}",
                        path, params
                    ));
                }
            }
            statements.push(stmt);
        }
        Ok(RuleHandler { params, statements })
    }
}

impl Definition for RuleDefinition {
    fn lookup(&mut self, name: &str) -> Lookup {
        match self.table.remove(name) {
            None => Lookup::Missing,
            Some(value) => match RuleDefinition::build(name, value) {
                Ok(handler) => Lookup::Found(Box::new(handler)),
                Err(reason) => Lookup::NotCallable(reason),
            },
        }
    }
}
