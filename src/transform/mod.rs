//! Per-collection transformations.
//!
//! A [TransformationUnit] binds three handlers, `insert`, `update` and `delete`, from a
//! [Definition].  Definitions can be native closures ([NativeDefinition]) or declarative rule
//! tables loaded from toml files ([RuleDefinition]).  Each unit owns an [Executor], the `exec`
//! capability its handlers use to reach the sink.

mod exec;
mod registry;
mod rules;
mod translate;

pub use exec::Executor;
pub use registry::Registry;
pub use rules::RuleDefinition;
pub use translate::{translate, NativeTable, NativeValue};

use bson::Document;
use std::collections::HashMap;
use std::fmt;

use crate::sink::Sink;
use crate::{Result, SyncError};

/// Insert handler name.
pub const INSERT_HANDLER: &str = "insert";
/// Update handler name.
pub const UPDATE_HANDLER: &str = "update";
/// Delete handler name.
pub const DELETE_HANDLER: &str = "delete";

/// Collection namespace, `<database>.<collection>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    db_name: String,
    coll_name: String,
}

impl Namespace {
    /// Parse `ns`, it's split at the first `.` and both parts must be non-empty.
    ///
    /// # Example
    /// ```
    /// use mongo2sql::transform::Namespace;
    /// let ns = Namespace::parse("shop.orders.archive").unwrap();
    /// assert_eq!(ns.db_name(), "shop");
    /// assert_eq!(ns.coll_name(), "orders.archive");
    /// assert!(Namespace::parse("shop.").is_err());
    /// ```
    pub fn parse(ns: &str) -> Result<Namespace> {
        match ns.split_once('.') {
            Some((db, coll)) if !db.is_empty() && !coll.is_empty() => Ok(Namespace {
                db_name: db.to_string(),
                coll_name: coll.to_string(),
            }),
            _ => Err(SyncError::Config(format!(
                "invalid namespace {:?}, expect `<database>.<collection>`",
                ns
            ))),
        }
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn coll_name(&self) -> &str {
        &self.coll_name
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db_name, self.coll_name)
    }
}

/// Error message returned by a handler.
pub type HandlerResult = std::result::Result<(), String>;

/// One transformation callback.
///
/// `args` are the translated documents: `[doc]` for insert, `[filter, doc]` for update and
/// `[filter]` for delete.
pub trait Handler: Send {
    fn call(&self, args: &[NativeValue], exec: &mut Executor) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&[NativeValue], &mut Executor) -> HandlerResult + Send,
{
    fn call(&self, args: &[NativeValue], exec: &mut Executor) -> HandlerResult {
        self(args, exec)
    }
}

/// Result of looking up a handler by name in a [Definition].
pub enum Lookup {
    Found(Box<dyn Handler>),
    Missing,
    /// defined under the name, but it can't be invoked.
    NotCallable(String),
}

/// Source of handlers for one transformation unit.
pub trait Definition {
    /// Take the handler named `name` out of the definition.
    fn lookup(&mut self, name: &str) -> Lookup;
}

/// Definition made of rust closures.
///
/// # Example
/// ```
/// use mongo2sql::transform::{NativeDefinition, NativeValue, Executor};
/// let def = NativeDefinition::new()
///     .handler("insert", |args: &[NativeValue], exec: &mut Executor| {
///         let id = args[0].lookup(["_id"]).cloned().unwrap_or(NativeValue::Null);
///         exec.exec("INSERT INTO orders(id) VALUES ($1) ON CONFLICT DO NOTHING", &[id]);
///         Ok(())
///     });
/// ```
#[derive(Default)]
pub struct NativeDefinition {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl NativeDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`.
    pub fn handler<H: Handler + 'static>(mut self, name: &str, handler: H) -> Self {
        self.handlers.insert(name.to_string(), Box::new(handler));
        self
    }
}

impl Definition for NativeDefinition {
    fn lookup(&mut self, name: &str) -> Lookup {
        match self.handlers.remove(name) {
            Some(handler) => Lookup::Found(handler),
            None => Lookup::Missing,
        }
    }
}

/// Transformation of one collection, from change records to sink statements.
pub struct TransformationUnit {
    namespace: Namespace,
    full_name: String,
    insert: Box<dyn Handler>,
    update: Box<dyn Handler>,
    delete: Box<dyn Handler>,
    exec: Executor,
}

impl TransformationUnit {
    /// Bind `insert`, `update` and `delete` handlers of `def` for namespace `ns`.
    ///
    /// Fails with [SyncError::Config] when the namespace is invalid, or when any handler is
    /// missing or not callable.
    pub fn load(ns: &str, def: &mut dyn Definition, sink: Box<dyn Sink>) -> Result<Self> {
        let namespace = Namespace::parse(ns)?;
        let full_name = namespace.to_string();
        let insert = bind(&full_name, def, INSERT_HANDLER)?;
        let update = bind(&full_name, def, UPDATE_HANDLER)?;
        let delete = bind(&full_name, def, DELETE_HANDLER)?;
        let exec = Executor::new(full_name.clone(), sink);
        Ok(TransformationUnit {
            namespace,
            full_name,
            insert,
            update,
            delete,
            exec,
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// `<database>.<collection>` string, same as the oplog `ns` field.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Translate `doc` and invoke the insert handler.
    pub fn handle_insert(&mut self, doc: Document) -> Result<()> {
        let args = [translate(doc)?];
        invoke(&self.full_name, INSERT_HANDLER, &*self.insert, &mut self.exec, &args)
    }

    /// Translate `filter` and `doc`, invoke the update handler with filter first.
    pub fn handle_update(&mut self, filter: Document, doc: Document) -> Result<()> {
        let args = [translate(filter)?, translate(doc)?];
        invoke(&self.full_name, UPDATE_HANDLER, &*self.update, &mut self.exec, &args)
    }

    /// Translate `filter` and invoke the delete handler.
    pub fn handle_delete(&mut self, filter: Document) -> Result<()> {
        let args = [translate(filter)?];
        invoke(&self.full_name, DELETE_HANDLER, &*self.delete, &mut self.exec, &args)
    }
}

fn bind(ns: &str, def: &mut dyn Definition, name: &'static str) -> Result<Box<dyn Handler>> {
    match def.lookup(name) {
        Lookup::Found(handler) => Ok(handler),
        Lookup::Missing => Err(SyncError::Config(format!(
            "transformation for {} has no `{}` handler",
            ns, name
        ))),
        Lookup::NotCallable(reason) => Err(SyncError::Config(format!(
            "`{}` handler of {} is not callable: {}",
            name, ns, reason
        ))),
    }
}

fn invoke(
    ns: &str,
    name: &'static str,
    handler: &dyn Handler,
    exec: &mut Executor,
    args: &[NativeValue],
) -> Result<()> {
    handler.call(args, exec).map_err(|reason| SyncError::Handler {
        namespace: ns.to_string(),
        handler: name,
        reason,
    })
}
