#![forbid(unsafe_code)]

//! In-memory reference implementation of [`SchemaModel`].
//!
//! [`MemoryModel`] keeps top-level objects in insertion order and child
//! objects in per-container ordered lists. It also models
//! relationship-generated references: [`MemoryModel::hold_generated`] makes
//! the model retain an object outside the normal containment tree, which is
//! exactly the situation the pool's deferred-deletion rule exists for.
//!
//! Objects flagged with [`REFERENCES_GENERATED`] are restored from a JSON
//! definition rather than from a pooled copy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::SchemaModel;
use crate::object::{ObjectHandle, ObjectType, SchemaObject};

/// Attribute marking an object that references relationship-generated
/// columns.
pub const REFERENCES_GENERATED: &str = "references_generated";

/// Generic schema object: a type tag, a name, and string attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryObject {
    pub object_type: ObjectType,
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl MemoryObject {
    #[must_use]
    pub fn new(object_type: ObjectType, name: impl Into<String>) -> Self {
        Self {
            object_type,
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn table(name: impl Into<String>) -> Self {
        Self::new(ObjectType::Table, name)
    }

    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self::new(ObjectType::Column, name)
    }

    #[must_use]
    pub fn role(name: impl Into<String>) -> Self {
        Self::new(ObjectType::Role, name)
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    fn references_generated(&self) -> bool {
        self.attribute(REFERENCES_GENERATED) == Some("true")
    }
}

impl SchemaObject for MemoryObject {
    fn object_type(&self) -> ObjectType {
        self.object_type
    }

    fn name(&self) -> &str {
        &self.name
    }
}

type Handle = ObjectHandle<MemoryObject>;

struct ChildList {
    parent: Handle,
    children: Vec<Handle>,
}

/// Structural dump used for state comparisons: each top-level object with
/// its children, in order.
pub type ModelState = Vec<(MemoryObject, Vec<MemoryObject>)>;

/// In-memory schema model.
#[derive(Default)]
pub struct MemoryModel {
    objects: Vec<Handle>,
    child_lists: Vec<ChildList>,
    generated: Vec<Handle>,
    revalidations: usize,
}

impl std::fmt::Debug for MemoryModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryModel")
            .field("objects", &self.objects.len())
            .field("containers", &self.child_lists.len())
            .field("generated", &self.generated.len())
            .field("revalidations", &self.revalidations)
            .finish()
    }
}

impl MemoryModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a top-level object directly, bypassing history.
    pub fn add_object(&mut self, object: MemoryObject) -> Handle {
        let handle = ObjectHandle::new(object);
        self.objects.push(handle.clone());
        handle
    }

    pub fn add_table(&mut self, name: &str) -> Handle {
        self.add_object(MemoryObject::table(name))
    }

    /// Append a child object to `parent`, bypassing history.
    pub fn add_child(
        &mut self,
        parent: &Handle,
        object: MemoryObject,
    ) -> Result<Handle, ModelError> {
        let handle = ObjectHandle::new(object);
        self.insert_object(&handle, Some(parent), None)?;
        Ok(handle)
    }

    /// Children of `parent`, in order.
    #[must_use]
    pub fn children(&self, parent: &Handle) -> Vec<Handle> {
        self.child_list(parent)
            .map(|list| list.children.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn child_names(&self, parent: &Handle) -> Vec<String> {
        self.children(parent).iter().map(ObjectHandle::name).collect()
    }

    /// Names of top-level objects, in order.
    #[must_use]
    pub fn object_names(&self) -> Vec<String> {
        self.objects.iter().map(ObjectHandle::name).collect()
    }

    /// First top-level object named `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Handle> {
        self.objects
            .iter()
            .find(|h| h.borrow().name == name)
            .cloned()
    }

    /// Reorder a child inside `parent`.
    pub fn move_child(
        &mut self,
        parent: &Handle,
        from: usize,
        to: usize,
    ) -> Result<(), ModelError> {
        let list = self
            .child_list_mut(parent)
            .ok_or_else(|| ModelError::ParentNotFound { name: parent.name() })?;
        let len = list.children.len();
        if from >= len {
            return Err(ModelError::IndexOutOfBounds { index: from, len });
        }
        if to >= len {
            return Err(ModelError::IndexOutOfBounds { index: to, len });
        }
        let child = list.children.remove(from);
        list.children.insert(to, child);
        Ok(())
    }

    /// Retain `object` as a relationship-generated reference.
    pub fn hold_generated(&mut self, object: &Handle) {
        if !self.generated.iter().any(|h| h.ptr_eq(object)) {
            self.generated.push(object.clone());
        }
    }

    /// Drop a relationship-generated reference.
    pub fn release_generated(&mut self, object: &Handle) {
        self.generated.retain(|h| !h.ptr_eq(object));
    }

    /// Number of relationship revalidation passes run so far.
    #[must_use]
    pub const fn revalidation_count(&self) -> usize {
        self.revalidations
    }

    /// Whether `object` is part of the containment tree.
    #[must_use]
    pub fn contains(&self, object: &Handle) -> bool {
        self.objects.iter().any(|h| h.ptr_eq(object))
            || self.child_lists.iter().any(|list| {
                self.objects.iter().any(|h| h.ptr_eq(&list.parent))
                    && list.children.iter().any(|c| c.ptr_eq(object))
            })
    }

    /// Structural dump of the model.
    #[must_use]
    pub fn state(&self) -> ModelState {
        self.objects
            .iter()
            .map(|h| {
                let children = self
                    .children(h)
                    .iter()
                    .map(|c| c.borrow().clone())
                    .collect();
                (h.borrow().clone(), children)
            })
            .collect()
    }

    fn child_list(&self, parent: &Handle) -> Option<&ChildList> {
        self.child_lists.iter().find(|l| l.parent.ptr_eq(parent))
    }

    fn child_list_mut(&mut self, parent: &Handle) -> Option<&mut ChildList> {
        self.child_lists.iter_mut().find(|l| l.parent.ptr_eq(parent))
    }
}

fn insert_at(
    list: &mut Vec<Handle>,
    object: &Handle,
    index: Option<usize>,
) -> Result<(), ModelError> {
    let len = list.len();
    match index {
        Some(index) if index > len => Err(ModelError::IndexOutOfBounds { index, len }),
        Some(index) => {
            list.insert(index, object.clone());
            Ok(())
        }
        None => {
            list.push(object.clone());
            Ok(())
        }
    }
}

impl SchemaModel for MemoryModel {
    type Object = MemoryObject;

    fn is_reachable(&self, object: &Handle) -> bool {
        self.contains(object) || self.generated.iter().any(|h| h.ptr_eq(object))
    }

    fn insert_object(
        &mut self,
        object: &Handle,
        parent: Option<&Handle>,
        index: Option<usize>,
    ) -> Result<(), ModelError> {
        match parent {
            Some(parent) => {
                if !self.contains(parent) {
                    return Err(ModelError::ParentNotFound { name: parent.name() });
                }
                if self.child_list(parent).is_none() {
                    self.child_lists.push(ChildList {
                        parent: parent.clone(),
                        children: Vec::new(),
                    });
                }
                let list = self
                    .child_list_mut(parent)
                    .ok_or_else(|| ModelError::ParentNotFound { name: parent.name() })?;
                if list.children.iter().any(|c| c.ptr_eq(object)) {
                    return Err(ModelError::AlreadyPresent { name: object.name() });
                }
                insert_at(&mut list.children, object, index)
            }
            None => {
                if self.objects.iter().any(|h| h.ptr_eq(object)) {
                    return Err(ModelError::AlreadyPresent { name: object.name() });
                }
                insert_at(&mut self.objects, object, index)
            }
        }
    }

    fn remove_object(
        &mut self,
        object: &Handle,
        parent: Option<&Handle>,
    ) -> Result<(), ModelError> {
        let list = match parent {
            Some(parent) => {
                &mut self
                    .child_list_mut(parent)
                    .ok_or_else(|| ModelError::ParentNotFound { name: parent.name() })?
                    .children
            }
            None => &mut self.objects,
        };
        let pos = list
            .iter()
            .position(|h| h.ptr_eq(object))
            .ok_or_else(|| ModelError::ObjectNotFound { name: object.name() })?;
        list.remove(pos);
        Ok(())
    }

    fn revalidate_relationships(&mut self) -> Result<(), ModelError> {
        self.revalidations += 1;
        Ok(())
    }

    fn object_index(&self, object: &Handle, parent: &Handle) -> Option<usize> {
        self.child_list(parent)?
            .children
            .iter()
            .position(|c| c.ptr_eq(object))
    }

    fn object_definition(&self, object: &Handle) -> Option<String> {
        let object = object.borrow();
        if !object.references_generated() {
            return None;
        }
        serde_json::to_string(&*object).ok()
    }

    fn object_from_definition(
        &self,
        definition: &str,
        _parent: Option<&Handle>,
    ) -> Result<MemoryObject, ModelError> {
        serde_json::from_str(definition).map_err(|e| ModelError::Definition(e.to_string()))
    }
}
