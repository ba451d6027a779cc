#![forbid(unsafe_code)]

//! Per-step progress notifications emitted during undo/redo.
//!
//! Notifications are purely observational. A listener cannot influence the
//! operation being executed.

use crate::object::ObjectType;

/// Emitted once for every executed undo/redo step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Completion of the current undo/redo call, 0..=100.
    pub progress: u8,
    /// Name of the object the step touched.
    pub object_name: String,
    /// Type of that object; doubles as its icon identifier.
    pub object_type: ObjectType,
}

impl ProgressEvent {
    /// Build the event for step `step` (1-based) of `total`.
    #[must_use]
    pub fn for_step(
        step: usize,
        total: usize,
        object_name: String,
        object_type: ObjectType,
    ) -> Self {
        let progress = if total == 0 {
            100
        } else {
            (step.min(total) * 100 / total) as u8
        };
        Self {
            progress,
            object_name,
            object_type,
        }
    }

    /// Icon identifier for the touched object.
    #[must_use]
    pub const fn icon_name(&self) -> &'static str {
        self.object_type.icon_name()
    }
}

/// Callback receiving progress notifications.
pub type ProgressListener = Box<dyn FnMut(&ProgressEvent)>;
