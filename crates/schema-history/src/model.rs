#![forbid(unsafe_code)]

//! The contract between the operation log and a live schema model.
//!
//! The log drives the model through three primitive mutations
//! ([`insert_object`](SchemaModel::insert_object),
//! [`remove_object`](SchemaModel::remove_object),
//! [`adopt_state`](SchemaModel::adopt_state)) plus a relationship
//! revalidation pass. It asks one lifetime question,
//! [`is_reachable`](SchemaModel::is_reachable), before dropping a pooled
//! object. Nothing else about the model is visible to the log.

use crate::error::ModelError;
use crate::object::{ObjectHandle, SchemaObject};

/// Live schema model driven by undo/redo.
pub trait SchemaModel {
    /// Concrete object type stored in the model.
    type Object: SchemaObject;

    /// Whether `object` (by identity) is still held anywhere in the model,
    /// including by relationship-generated structures.
    fn is_reachable(&self, object: &ObjectHandle<Self::Object>) -> bool;

    /// Insert `object` into the model.
    ///
    /// Child objects are inserted into `parent`'s ordered child list at
    /// `index`, or appended when `index` is `None`.
    fn insert_object(
        &mut self,
        object: &ObjectHandle<Self::Object>,
        parent: Option<&ObjectHandle<Self::Object>>,
        index: Option<usize>,
    ) -> Result<(), ModelError>;

    /// Detach `object` from the model (or from `parent`'s child list).
    fn remove_object(
        &mut self,
        object: &ObjectHandle<Self::Object>,
        parent: Option<&ObjectHandle<Self::Object>>,
    ) -> Result<(), ModelError>;

    /// Make the live `target` take on `source`'s state.
    fn adopt_state(
        &mut self,
        target: &ObjectHandle<Self::Object>,
        source: &Self::Object,
    ) -> Result<(), ModelError> {
        target.borrow_mut().adopt_state(source);
        Ok(())
    }

    /// Recompute derived relationship state after a structural change.
    fn revalidate_relationships(&mut self) -> Result<(), ModelError>;

    /// Position of a child object inside `parent`'s child list.
    fn object_index(
        &self,
        _object: &ObjectHandle<Self::Object>,
        _parent: &ObjectHandle<Self::Object>,
    ) -> Option<usize> {
        None
    }

    /// Serialized definition for objects a plain copy cannot restore,
    /// typically objects referencing relationship-generated columns.
    ///
    /// Returning `None` means the pooled copy is sufficient.
    fn object_definition(&self, _object: &ObjectHandle<Self::Object>) -> Option<String> {
        None
    }

    /// Rebuild an object from a definition produced by
    /// [`object_definition`](Self::object_definition).
    fn object_from_definition(
        &self,
        _definition: &str,
        _parent: Option<&ObjectHandle<Self::Object>>,
    ) -> Result<Self::Object, ModelError> {
        Err(ModelError::Unsupported("object_from_definition"))
    }
}
