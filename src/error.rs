use crate::Position;
use bson::document::ValueAccessError;
use mongodb::error::Error as MongoError;
use postgres::Error as PgError;
use std::result::Result as StdResult;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Mongodb connection error")]
    MongoError(#[from] MongoError),
    #[error("Oplog field access error")]
    BsonError(#[from] ValueAccessError),
    #[error("Check permission for database {db:?} failed, connection string: {uri:?}, detailed: {detail:?}")]
    PermissionError {
        uri: String,
        db: String,
        detail: MongoError,
    },
    #[error("Postgres error")]
    Postgres(#[from] PgError),
    #[error("Invalid oplog entry: {0}")]
    InvalidOplog(String),
    #[error("Oplog tail closed by server")]
    StreamClosed,
    #[error("Empty document, can't read position")]
    EmptyDocError,
    #[error("Oplog no longer contains changes for {namespace} after {position}, earliest retained is {earliest}")]
    OplogWindowLost {
        namespace: String,
        position: Position,
        earliest: Position,
    },

    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Install signal handler failed")]
    SignalHandler(#[from] ctrlc::Error),
    #[error("Load file {path:?} failed")]
    Io {
        path: String,
        #[source]
        detail: std::io::Error,
    },
    #[error("Parse toml file {path:?} failed")]
    Toml {
        path: String,
        #[source]
        detail: toml::de::Error,
    },

    #[error("Value of kind {kind} for key {key:?} can't be translated")]
    UnsupportedValueKind { key: String, kind: String },
    #[error("Transformation handler `{handler}` for {namespace} failed: {reason}")]
    Handler {
        namespace: String,
        handler: &'static str,
        reason: String,
    },
    #[error("Sink statement failed")]
    Sink(#[source] PgError),

    #[error("Checkpoint store is closed")]
    StoreClosed,
    #[error("Position {0} can't be stored as a timestamp")]
    PositionOutOfRange(Position),
    #[error("Checkpoint for {0} not found")]
    CheckpointNotFound(String),
    #[error("Checkpoint for {0} already exists")]
    CheckpointExists(String),
    #[error("Checkpoint for {namespace} at {current} can't move to {requested}")]
    CheckpointNotAdvanced {
        namespace: String,
        current: Position,
        requested: Position,
    },

    #[error("No namespace finished bootstrap, nothing to sync")]
    NothingToSync,
    #[error("No transformation registered for namespace {0}")]
    UnknownNamespace(String),
    #[error("{op} oplog for {namespace} at {position} has no filter")]
    MissingFilter {
        namespace: String,
        op: &'static str,
        position: Position,
    },
    #[error("Unknown oplog operation {op:?} for {namespace} at {position}")]
    UnknownOperation {
        namespace: String,
        op: String,
        position: Position,
    },
}

pub type Result<T> = StdResult<T, SyncError>;
