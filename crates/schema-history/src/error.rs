#![forbid(unsafe_code)]

//! Error types for the operation log and the model contract.

use thiserror::Error;

use crate::object::ObjectType;
use crate::oplog::pool::PoolSlot;

pub type HistoryResult<T> = std::result::Result<T, HistoryError>;

/// Errors raised by a [`SchemaModel`](crate::model::SchemaModel) primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("object not found in model: {name}")]
    ObjectNotFound { name: String },

    #[error("parent object not found in model: {name}")]
    ParentNotFound { name: String },

    #[error("object already present in model: {name}")]
    AlreadyPresent { name: String },

    #[error("child index {index} out of bounds (length {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("operation not supported by model: {0}")]
    Unsupported(&'static str),

    #[error("invalid object definition: {0}")]
    Definition(String),
}

/// Errors raised by the operation log.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("no operation chain is open")]
    InvalidChainState,

    #[error("operation index {index} out of range (length {len})")]
    InvalidIndex { index: usize, len: usize },

    #[error("pool slot {slot} holds no object")]
    ObjectNotInPool { slot: PoolSlot },

    #[error("nothing to undo")]
    UndoUnavailable,

    #[error("nothing to redo")]
    RedoUnavailable,

    #[error("{object_type} objects must be registered with a parent")]
    MissingParent { object_type: ObjectType },

    #[error("{parent_type} objects cannot own child objects")]
    InvalidParent { parent_type: ObjectType },

    #[error("invalid history configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "toml-config")]
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HistoryError {
    /// Whether the error reflects a caller precondition violation rather
    /// than a model failure.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidChainState
                | Self::InvalidIndex { .. }
                | Self::UndoUnavailable
                | Self::RedoUnavailable
                | Self::MissingParent { .. }
                | Self::InvalidParent { .. }
        )
    }
}
