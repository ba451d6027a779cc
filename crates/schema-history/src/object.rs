#![forbid(unsafe_code)]

//! Schema objects as seen by the operation log.
//!
//! The log never inspects the concrete object hierarchy. It needs exactly
//! three things from an object: its [`ObjectType`] tag, a display name, and
//! the ability to adopt another instance's state. Everything else lives in
//! the host model.
//!
//! Live objects are shared through [`ObjectHandle`], a single-threaded
//! shared-identity handle. Two handles are "the same object" when
//! [`ObjectHandle::ptr_eq`] holds; a [`deep_copy`](ObjectHandle::deep_copy)
//! is always a distinct object.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Type tag carried by every schema object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Column,
    Constraint,
    Function,
    Trigger,
    Index,
    Rule,
    Policy,
    Table,
    View,
    Domain,
    Schema,
    Aggregate,
    Operator,
    Sequence,
    Role,
    Conversion,
    Cast,
    Language,
    Type,
    Tablespace,
    OperatorFamily,
    OperatorClass,
    Database,
    Relationship,
    Textbox,
    Permission,
}

impl ObjectType {
    /// Whether objects of this type only exist inside a container object.
    #[must_use]
    pub const fn is_child(self) -> bool {
        matches!(
            self,
            Self::Column
                | Self::Constraint
                | Self::Trigger
                | Self::Index
                | Self::Rule
                | Self::Policy
        )
    }

    /// Whether objects of this type own an ordered list of child objects.
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Table | Self::View | Self::Relationship)
    }

    /// Icon identifier used by progress notifications.
    #[must_use]
    pub const fn icon_name(self) -> &'static str {
        match self {
            Self::Column => "column",
            Self::Constraint => "constraint",
            Self::Function => "function",
            Self::Trigger => "trigger",
            Self::Index => "index",
            Self::Rule => "rule",
            Self::Policy => "policy",
            Self::Table => "table",
            Self::View => "view",
            Self::Domain => "domain",
            Self::Schema => "schema",
            Self::Aggregate => "aggregate",
            Self::Operator => "operator",
            Self::Sequence => "sequence",
            Self::Role => "role",
            Self::Conversion => "conversion",
            Self::Cast => "cast",
            Self::Language => "language",
            Self::Type => "type",
            Self::Tablespace => "tablespace",
            Self::OperatorFamily => "opfamily",
            Self::OperatorClass => "opclass",
            Self::Database => "database",
            Self::Relationship => "relationship",
            Self::Textbox => "textbox",
            Self::Permission => "permission",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.icon_name())
    }
}

/// Minimal capability set the operation log requires from a schema object.
pub trait SchemaObject: Clone {
    /// Type tag of this object.
    fn object_type(&self) -> ObjectType;

    /// Display name, used in progress notifications and history listings.
    fn name(&self) -> &str;

    /// Replace this object's state with `source`'s state.
    ///
    /// Identity is preserved: whoever holds this object keeps holding it.
    fn adopt_state(&mut self, source: &Self) {
        self.clone_from(source);
    }
}

/// Shared-identity handle to a schema object.
///
/// Cloning the handle shares the object. Use [`deep_copy`](Self::deep_copy)
/// for an independent snapshot.
pub struct ObjectHandle<O>(Rc<RefCell<O>>);

impl<O> ObjectHandle<O> {
    /// Wrap a fresh object.
    #[must_use]
    pub fn new(object: O) -> Self {
        Self(Rc::new(RefCell::new(object)))
    }

    /// Identity comparison.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Borrow the object.
    ///
    /// # Panics
    ///
    /// Panics if the object is currently mutably borrowed.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, O> {
        self.0.borrow()
    }

    /// Mutably borrow the object.
    ///
    /// # Panics
    ///
    /// Panics if the object is currently borrowed.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, O> {
        self.0.borrow_mut()
    }

    /// Number of handles sharing this object.
    #[must_use]
    pub fn share_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl<O: Clone> ObjectHandle<O> {
    /// Independent copy of the object's current state.
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        Self::new(self.0.borrow().clone())
    }
}

impl<O: SchemaObject> ObjectHandle<O> {
    /// Type tag of the referenced object.
    #[must_use]
    pub fn object_type(&self) -> ObjectType {
        self.0.borrow().object_type()
    }

    /// Owned copy of the referenced object's name.
    #[must_use]
    pub fn name(&self) -> String {
        self.0.borrow().name().to_owned()
    }
}

impl<O> Clone for ObjectHandle<O> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<O: fmt::Debug> fmt::Debug for ObjectHandle<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(object) => f.debug_tuple("ObjectHandle").field(&*object).finish(),
            Err(_) => f.write_str("ObjectHandle(<borrowed>)"),
        }
    }
}
