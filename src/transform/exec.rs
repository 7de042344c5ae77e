//! The `exec` capability handed to transformation handlers.

use tracing::{debug, warn};

use super::NativeValue;
use crate::sink::{Sink, SqlArg};

/// Private sink channel of one transformation unit.
///
/// [exec](Executor::exec) never returns an error: a failed statement is logged and reported as
/// `false`, the handler decides whether that fails the whole change.
pub struct Executor {
    namespace: String,
    sink: Box<dyn Sink>,
}

impl Executor {
    pub fn new(namespace: impl Into<String>, sink: Box<dyn Sink>) -> Self {
        Executor {
            namespace: namespace.into(),
            sink,
        }
    }

    /// Execute `statement` with `args`, return true on success.
    ///
    /// Tables can't be bound as statement arguments, they are logged and sent as null.
    pub fn exec(&mut self, statement: &str, args: &[NativeValue]) -> bool {
        let args: Vec<SqlArg> = args
            .iter()
            .enumerate()
            .map(|(idx, arg)| to_sql_arg(&self.namespace, statement, idx, arg))
            .collect();

        match self.sink.execute(statement, &args) {
            Ok(rows) => {
                debug!(namespace = %self.namespace, %statement, rows, "Execute statement.");
                true
            }
            Err(err) => {
                warn!(namespace = %self.namespace, %statement, ?err, "Execute statement failed.");
                false
            }
        }
    }
}

fn to_sql_arg(namespace: &str, statement: &str, idx: usize, arg: &NativeValue) -> SqlArg {
    match arg {
        NativeValue::Null => SqlArg::Null,
        NativeValue::String(s) => SqlArg::String(s.clone()),
        NativeValue::Number(n) => SqlArg::Number(*n),
        NativeValue::Boolean(b) => SqlArg::Boolean(*b),
        NativeValue::Table(_) => {
            warn!(%namespace, %statement, position = idx + 1, "Table argument is not supported, use null instead.");
            SqlArg::Null
        }
    }
}
