#![forbid(unsafe_code)]

//! Undo/redo history for in-memory database schema models.
//!
//! # Key Components
//!
//! - [`OperationList`] - Bounded, chain-aware operation log
//! - [`ObjectPool`] - Owned snapshots plus deferred deletion
//! - [`SchemaModel`] - Contract the log uses to drive the live model
//! - [`SchemaObject`] / [`ObjectHandle`] - What the log needs from an object
//! - [`MemoryModel`] - In-memory reference model
//!
//! # Threading
//!
//! Everything here is single-threaded. Handles are `Rc`-based and the log
//! has no internal locking; one editor session owns the model and its log.

pub mod config;
pub mod error;
pub mod memory;
pub mod model;
pub mod object;
pub mod oplog;

pub use config::{DEFAULT_MAX_SIZE, HistoryConfig};
pub use error::{HistoryError, HistoryResult, ModelError};
pub use memory::{MemoryModel, MemoryObject};
pub use model::SchemaModel;
pub use object::{ObjectHandle, ObjectType, SchemaObject};
pub use oplog::{
    ChainRole, Disposal, ObjectPool, Operation, OperationInfo, OperationKind, OperationList,
    PoolSlot, ProgressEvent, ProgressListener,
};
