#![forbid(unsafe_code)]

//! A single recorded change to the schema model.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::object::{ObjectHandle, ObjectType, SchemaObject};

use super::pool::PoolSlot;

/// Nature of a recorded change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Object state changed in place.
    Modified,
    /// Object was added to the model.
    Created,
    /// Object was detached from the model.
    Removed,
    /// Position-only change. Behaves like `Modified` but never triggers
    /// relationship revalidation.
    Moved,
}

impl OperationKind {
    /// Whether executing this kind requires a relationship revalidation pass.
    #[must_use]
    pub const fn revalidates(self) -> bool {
        !matches!(self, Self::Moved)
    }

    /// Whether registration stores a deep copy of the object.
    #[must_use]
    pub const fn snapshots_state(self) -> bool {
        matches!(self, Self::Modified | Self::Moved)
    }

    /// Whether registration asks the model for a definition payload. A
    /// removed object is reinserted from it, so removals capture one too.
    #[must_use]
    pub const fn captures_definition(self) -> bool {
        !matches!(self, Self::Created)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Modified => "modified",
            Self::Created => "created",
            Self::Removed => "removed",
            Self::Moved => "moved",
        })
    }
}

/// Position of an operation within an atomic chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainRole {
    #[default]
    None,
    ChainStart,
    ChainMiddle,
    ChainEnd,
}

impl ChainRole {
    /// Whether the operation belongs to a chain.
    #[must_use]
    pub const fn is_chained(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Undo must continue to the predecessor after this role.
    #[must_use]
    pub const fn continues_backward(self) -> bool {
        matches!(self, Self::ChainMiddle | Self::ChainEnd)
    }

    /// Redo must continue to the successor after this role.
    #[must_use]
    pub const fn continues_forward(self) -> bool {
        matches!(self, Self::ChainStart | Self::ChainMiddle)
    }
}

/// A recorded change.
///
/// Only the log mutates an operation after construction: `child_index`
/// through [`OperationList::update_object_index`](super::OperationList::update_object_index),
/// `chain_role` when chains are closed or repaired, and the snapshot payload
/// when state is exchanged during undo/redo.
pub struct Operation<O> {
    pub(crate) kind: OperationKind,
    pub(crate) chain_role: ChainRole,
    pub(crate) parent: Option<ObjectHandle<O>>,
    pub(crate) pool_slot: PoolSlot,
    pub(crate) original: ObjectHandle<O>,
    pub(crate) snapshot_payload: Option<String>,
    pub(crate) child_index: Option<usize>,
}

impl<O> Operation<O> {
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.kind
    }

    #[must_use]
    pub const fn chain_role(&self) -> ChainRole {
        self.chain_role
    }

    #[must_use]
    pub const fn pool_slot(&self) -> PoolSlot {
        self.pool_slot
    }

    /// Live object this operation concerns.
    #[must_use]
    pub const fn original(&self) -> &ObjectHandle<O> {
        &self.original
    }

    #[must_use]
    pub const fn parent(&self) -> Option<&ObjectHandle<O>> {
        self.parent.as_ref()
    }

    #[must_use]
    pub const fn child_index(&self) -> Option<usize> {
        self.child_index
    }

    #[must_use]
    pub fn snapshot_payload(&self) -> Option<&str> {
        self.snapshot_payload.as_deref()
    }

    /// Whether this operation concerns `object` (by identity).
    #[must_use]
    pub fn concerns(&self, object: &ObjectHandle<O>) -> bool {
        self.original.ptr_eq(object)
    }
}

impl<O: SchemaObject> Operation<O> {
    /// Summary for history listings.
    #[must_use]
    pub fn info(&self) -> OperationInfo {
        let object = self.original.borrow();
        OperationInfo {
            kind: self.kind,
            chain_role: self.chain_role,
            object_name: object.name().to_owned(),
            object_type: object.object_type(),
            child_index: self.child_index,
        }
    }
}

impl<O> fmt::Debug for Operation<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("kind", &self.kind)
            .field("chain_role", &self.chain_role)
            .field("pool_slot", &self.pool_slot)
            .field("has_parent", &self.parent.is_some())
            .field("has_payload", &self.snapshot_payload.is_some())
            .field("child_index", &self.child_index)
            .finish()
    }
}

/// Owned summary of an operation, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationInfo {
    pub kind: OperationKind,
    pub chain_role: ChainRole,
    pub object_name: String,
    pub object_type: ObjectType,
    pub child_index: Option<usize>,
}
