#![forbid(unsafe_code)]

//! Operation log for schema model edits.
//!
//! Callers register every change BEFORE applying it to the model; the log
//! pools what it needs to put the object back and later drives the model
//! backward and forward through [`SchemaModel`](crate::model::SchemaModel).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        OperationList                             │
//! │  ┌──────────────────────────────┐     ┌──────────────────────┐  │
//! │  │ operations (oldest → newest) │     │ ObjectPool           │  │
//! │  │  [op0][op1][op2][op3][op4]   │────►│  slot → object       │  │
//! │  │              ▲               │     │  deferred: [..]      │  │
//! │  │           cursor             │     └──────────────────────┘  │
//! │  └──────────────────────────────┘                               │
//! └─────────────────────────────────────────────────────────────────┘
//!          undo ◄── cursor moves left      cursor moves right ──► redo
//! ```
//!
//! # Restore policy
//!
//! | kind     | undo                         | redo                       |
//! |----------|------------------------------|----------------------------|
//! | Created  | detach object from model     | reinsert at parent/index   |
//! | Removed  | reinsert at parent/index     | detach again               |
//! | Modified | swap live and pooled state   | swap live and pooled state |
//! | Moved    | as Modified, no revalidation | as Modified, no revalidation |
//!
//! Every step except `Moved` is followed by a relationship revalidation.
//!
//! # Chains
//!
//! Operations registered between [`OperationList::start_chain`] and
//! [`OperationList::finish_chain`] undo and redo as one unit. Chains do not
//! nest.

pub mod list;
pub mod operation;
pub mod pool;
pub mod progress;

pub use list::OperationList;
pub use operation::{ChainRole, Operation, OperationInfo, OperationKind};
pub use pool::{Disposal, ObjectPool, PoolSlot};
pub use progress::{ProgressEvent, ProgressListener};
