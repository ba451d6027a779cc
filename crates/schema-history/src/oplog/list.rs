#![forbid(unsafe_code)]

//! The operation log: a bounded, chain-aware undo/redo history.
//!
//! # Cursor
//!
//! ```text
//! operations: [op0, op1, op2, op3, op4]
//!                         ▲
//!                    current_index = Some(2)
//!
//! op0..=op2 are applied (undoable), op3..=op4 are undone (redoable).
//! current_index = None means nothing is applied.
//! ```
//!
//! # Invariants
//!
//! 1. `applied <= operations.len() <= config.max_size` after every call.
//! 2. Chain roles always form `None*` runs or `ChainStart, ChainMiddle*,
//!    ChainEnd` groups (an open chain may lack its `ChainEnd`).
//! 3. Every operation's pool slot is live, or the operation is dropped by
//!    [`validate_operations`](OperationList::validate_operations) before the
//!    next undo/redo.
//! 4. Registering a new operation discards everything after the cursor.
//!
//! # Usage
//!
//! ```rust,ignore
//! list.register_object(&model, &table, OperationKind::Modified, None, None)?;
//! table.borrow_mut().set_attribute("comment", "audit log");
//!
//! list.undo_operation(&mut model)?; // comment restored
//! ```

use std::collections::VecDeque;
use std::fmt;

use web_time::Instant;

use crate::config::HistoryConfig;
use crate::error::{HistoryError, HistoryResult};
use crate::model::SchemaModel;
use crate::object::{ObjectHandle, SchemaObject};

use super::operation::{ChainRole, Operation, OperationInfo, OperationKind};
use super::pool::ObjectPool;
use super::progress::{ProgressEvent, ProgressListener};

const TARGET: &str = "schema_history.oplog";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

impl Direction {
    const fn reverse(self) -> Self {
        match self {
            Self::Undo => Self::Redo,
            Self::Redo => Self::Undo,
        }
    }
}

/// Bounded undo/redo history over a [`SchemaModel`].
pub struct OperationList<O> {
    operations: VecDeque<Operation<O>>,
    pool: ObjectPool<O>,
    config: HistoryConfig,
    /// Number of applied operations; the cursor is `applied - 1`.
    applied: usize,
    chain_open: bool,
    ignore_chain: bool,
    listener: Option<ProgressListener>,
}

impl<O> fmt::Debug for OperationList<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationList")
            .field("len", &self.operations.len())
            .field("applied", &self.applied)
            .field("chain_open", &self.chain_open)
            .field("ignore_chain", &self.ignore_chain)
            .field("pool", &self.pool)
            .field("config", &self.config)
            .finish()
    }
}

impl<O: SchemaObject> Default for OperationList<O> {
    fn default() -> Self {
        Self::with_valid_config(HistoryConfig::default())
    }
}

impl<O: SchemaObject> OperationList<O> {
    /// Create an empty log. Fails if `config` does not validate.
    pub fn new(config: HistoryConfig) -> HistoryResult<Self> {
        config.ensure_valid()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: HistoryConfig) -> Self {
        Self {
            operations: VecDeque::new(),
            pool: ObjectPool::new(),
            config,
            applied: 0,
            chain_open: false,
            ignore_chain: false,
            listener: None,
        }
    }

    /// Install the callback receiving one [`ProgressEvent`] per executed step.
    pub fn set_progress_listener(&mut self, listener: impl FnMut(&ProgressEvent) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn clear_progress_listener(&mut self) {
        self.listener = None;
    }

    // ========================================================================
    // Chaining
    // ========================================================================

    /// Open a chain. Operations registered until [`finish_chain`](Self::finish_chain)
    /// undo and redo as one unit.
    ///
    /// Chains do not nest; calling this while a chain is open does nothing.
    pub fn start_chain(&mut self) {
        if self.chain_open {
            tracing::warn!(target: TARGET, "start_chain called with a chain already open");
            return;
        }
        self.chain_open = true;
        tracing::debug!(target: TARGET, "operation chain started");
    }

    /// Close the open chain, marking its last member as `ChainEnd`.
    ///
    /// A chain with a single member is downgraded to an unchained operation.
    /// While chaining is ignored the chain stays open; call
    /// [`ignore_chain(false)`](Self::ignore_chain) first.
    pub fn finish_chain(&mut self) -> HistoryResult<()> {
        if !self.chain_open {
            return Err(HistoryError::InvalidChainState);
        }
        if self.ignore_chain {
            tracing::warn!(
                target: TARGET,
                "finish_chain called while chaining is ignored; chain left open"
            );
            return Ok(());
        }

        self.close_trailing_chain();
        self.chain_open = false;
        tracing::debug!(target: TARGET, "operation chain finished");
        Ok(())
    }

    /// Temporarily register operations unchained while a chain is open.
    pub fn ignore_chain(&mut self, ignore: bool) {
        self.ignore_chain = ignore;
    }

    #[must_use]
    pub const fn is_chain_open(&self) -> bool {
        self.chain_open
    }

    #[must_use]
    pub const fn is_chain_ignored(&self) -> bool {
        self.ignore_chain
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Record that `object` is about to change.
    ///
    /// Must be called BEFORE the caller mutates the model: the pooled copy
    /// taken here is the only record of the prior state. Child objects
    /// (columns, constraints, ...) require `parent`; when `index` is `None`
    /// the position is read from the model.
    ///
    /// Any redoable operations are discarded. If the log grows past its
    /// maximum size the oldest operation is evicted.
    pub fn register_object<M>(
        &mut self,
        model: &M,
        object: &ObjectHandle<O>,
        kind: OperationKind,
        index: Option<usize>,
        parent: Option<&ObjectHandle<O>>,
    ) -> HistoryResult<()>
    where
        M: SchemaModel<Object = O>,
    {
        let object_type = object.object_type();
        if object_type.is_child() && parent.is_none() {
            return Err(HistoryError::MissingParent { object_type });
        }
        if let Some(parent) = parent {
            let parent_type = parent.object_type();
            if !parent_type.is_container() {
                return Err(HistoryError::InvalidParent { parent_type });
            }
        }

        let child_index = index.or_else(|| parent.and_then(|p| model.object_index(object, p)));

        self.discard_redo(model);

        let chain_role = self.next_chain_role();
        let pooled = if kind.snapshots_state() {
            object.deep_copy()
        } else {
            object.clone()
        };
        let snapshot_payload = kind
            .captures_definition()
            .then(|| model.object_definition(object))
            .flatten();
        let pool_slot = self.pool.add(pooled, kind);

        tracing::debug!(
            target: TARGET,
            kind = %kind,
            chain_role = ?chain_role,
            object_type = %object_type,
            object = %object.name(),
            child_index = ?child_index,
            slot = pool_slot.raw(),
            "operation registered"
        );

        self.operations.push_back(Operation {
            kind,
            chain_role,
            parent: parent.cloned(),
            pool_slot,
            original: object.clone(),
            snapshot_payload,
            child_index,
        });
        self.applied = self.operations.len();
        self.enforce_limit(model);
        Ok(())
    }

    fn next_chain_role(&self) -> ChainRole {
        if !self.chain_open || self.ignore_chain {
            return ChainRole::None;
        }
        match self
            .last_chained_before(self.operations.len())
            .map(|idx| self.operations[idx].chain_role)
        {
            Some(ChainRole::ChainStart | ChainRole::ChainMiddle) => ChainRole::ChainMiddle,
            _ => ChainRole::ChainStart,
        }
    }

    fn discard_redo<M>(&mut self, model: &M)
    where
        M: SchemaModel<Object = O>,
    {
        let cut = self.applied;
        let discarded = self.operations.len() - cut;
        if discarded == 0 {
            return;
        }
        let splits_chain = self.splits_closed_chain(cut);
        while self.operations.len() > cut {
            if let Some(op) = self.operations.pop_back() {
                self.pool.remove(op.pool_slot, model);
            }
        }
        if splits_chain {
            self.close_trailing_chain();
        }
        tracing::debug!(target: TARGET, discarded, splits_chain, "redo history discarded");
    }

    /// Whether truncating at `cut` separates a closed chain from its
    /// `ChainEnd`. The cursor lands inside a chain after ignored undos.
    fn splits_closed_chain(&self, cut: usize) -> bool {
        let inside = self
            .last_chained_before(cut)
            .is_some_and(|idx| self.operations[idx].chain_role.continues_forward());
        inside
            && self
                .operations
                .range(cut..)
                .map(|op| op.chain_role)
                .find(|role| matches!(role, ChainRole::ChainStart | ChainRole::ChainEnd))
                == Some(ChainRole::ChainEnd)
    }

    /// Terminate the newest chain at its last surviving member.
    fn close_trailing_chain(&mut self) {
        if let Some(idx) = self.last_chained_before(self.operations.len()) {
            let op = &mut self.operations[idx];
            op.chain_role = match op.chain_role {
                ChainRole::ChainStart => ChainRole::None,
                ChainRole::ChainMiddle => ChainRole::ChainEnd,
                role => role,
            };
        }
    }

    fn enforce_limit<M>(&mut self, model: &M)
    where
        M: SchemaModel<Object = O>,
    {
        while self.operations.len() > self.config.max_size {
            let Some(op) = self.operations.pop_front() else {
                break;
            };
            self.applied = self.applied.saturating_sub(1);
            self.repair_chain(0, op.chain_role);
            let disposal = self.pool.remove(op.pool_slot, model);
            tracing::debug!(
                target: TARGET,
                kind = %op.kind,
                object = %op.original.name(),
                disposal = ?disposal,
                "oldest operation evicted"
            );
        }
    }

    // ========================================================================
    // Undo / Redo
    // ========================================================================

    /// Undo the newest applied operation, or its whole chain.
    pub fn undo_operation<M>(&mut self, model: &mut M) -> HistoryResult<()>
    where
        M: SchemaModel<Object = O>,
    {
        self.validate_operations();
        if !self.is_undo_available() {
            return Err(HistoryError::UndoUnavailable);
        }
        let total = self.steps_backward(self.applied - 1, !self.ignore_chain);
        self.run(Direction::Undo, total, model)
    }

    /// Redo the next undone operation, or its whole chain.
    pub fn redo_operation<M>(&mut self, model: &mut M) -> HistoryResult<()>
    where
        M: SchemaModel<Object = O>,
    {
        self.validate_operations();
        if !self.is_redo_available() {
            return Err(HistoryError::RedoUnavailable);
        }
        let total = self.steps_forward(self.applied);
        self.run(Direction::Redo, total, model)
    }

    fn run<M>(&mut self, direction: Direction, total: usize, model: &mut M) -> HistoryResult<()>
    where
        M: SchemaModel<Object = O>,
    {
        let start = Instant::now();
        let span = match direction {
            Direction::Undo => tracing::debug_span!(
                "oplog.undo",
                steps = total,
                duration_us = tracing::field::Empty,
            ),
            Direction::Redo => tracing::debug_span!(
                "oplog.redo",
                steps = total,
                duration_us = tracing::field::Empty,
            ),
        };
        let _guard = span.enter();

        for step in 1..=total {
            let idx = match direction {
                Direction::Undo => self.applied - 1,
                Direction::Redo => self.applied,
            };
            if let Err(err) = self.execute(idx, direction, model) {
                tracing::warn!(
                    target: TARGET,
                    direction = ?direction,
                    step,
                    error = %err,
                    "step failed; rolling back"
                );
                self.roll_back(direction, step - 1, model);
                return Err(err);
            }
            match direction {
                Direction::Undo => self.applied -= 1,
                Direction::Redo => self.applied += 1,
            }
            self.notify(idx, step, total);
        }

        span.record("duration_us", start.elapsed().as_micros() as u64);
        Ok(())
    }

    /// Replay `executed` steps in the opposite direction, restoring the
    /// cursor to where it stood before the failed call.
    fn roll_back<M>(&mut self, failed: Direction, executed: usize, model: &mut M)
    where
        M: SchemaModel<Object = O>,
    {
        let mut revalidate = false;
        for _ in 0..executed {
            let idx = match failed {
                Direction::Undo => self.applied,
                Direction::Redo => self.applied - 1,
            };
            match self.apply_step(idx, failed.reverse(), model) {
                Ok(kind) => revalidate |= kind.revalidates(),
                Err(err) => tracing::error!(target: TARGET, error = %err, "rollback step failed"),
            }
            match failed {
                Direction::Undo => self.applied += 1,
                Direction::Redo => self.applied -= 1,
            }
        }
        if revalidate && let Err(err) = model.revalidate_relationships() {
            tracing::error!(target: TARGET, error = %err, "revalidation after rollback failed");
        }
    }

    /// Run one step including relationship revalidation. A step whose
    /// revalidation fails is reverted before the error is returned.
    fn execute<M>(&mut self, idx: usize, direction: Direction, model: &mut M) -> HistoryResult<()>
    where
        M: SchemaModel<Object = O>,
    {
        let kind = self.apply_step(idx, direction, model)?;
        if !kind.revalidates() {
            return Ok(());
        }
        if let Err(err) = model.revalidate_relationships() {
            if let Err(revert_err) = self.apply_step(idx, direction.reverse(), model) {
                tracing::error!(
                    target: TARGET,
                    error = %revert_err,
                    "reverting step after failed revalidation failed"
                );
            }
            return Err(err.into());
        }
        Ok(())
    }

    /// Apply the model primitive for one step, without revalidation.
    fn apply_step<M>(
        &mut self,
        idx: usize,
        direction: Direction,
        model: &mut M,
    ) -> HistoryResult<OperationKind>
    where
        M: SchemaModel<Object = O>,
    {
        let len = self.operations.len();
        let op = self
            .operations
            .get(idx)
            .ok_or(HistoryError::InvalidIndex { index: idx, len })?;
        let kind = op.kind;
        let pooled = self
            .pool
            .get(op.pool_slot)
            .cloned()
            .ok_or(HistoryError::ObjectNotInPool { slot: op.pool_slot })?;

        match (kind, direction) {
            (OperationKind::Created, Direction::Undo)
            | (OperationKind::Removed, Direction::Redo) => self.detach(idx, model)?,
            (OperationKind::Created, Direction::Redo)
            | (OperationKind::Removed, Direction::Undo) => self.attach(idx, &pooled, model)?,
            (OperationKind::Modified | OperationKind::Moved, _) => {
                self.exchange_state(idx, &pooled, model)?;
            }
        }
        Ok(kind)
    }

    /// Take the object out of the model, refreshing the definition payload
    /// so a later reinsertion rebuilds the state it had when detached.
    fn detach<M>(&mut self, idx: usize, model: &mut M) -> HistoryResult<()>
    where
        M: SchemaModel<Object = O>,
    {
        let op = &self.operations[idx];
        let definition = op
            .snapshot_payload
            .as_ref()
            .and_then(|_| model.object_definition(&op.original));
        model.remove_object(&op.original, op.parent.as_ref())?;
        if let Some(definition) = definition {
            self.operations[idx].snapshot_payload = Some(definition);
        }
        Ok(())
    }

    /// Put the pooled object back, rebuilt from its definition payload when
    /// one was captured.
    fn attach<M>(&self, idx: usize, pooled: &ObjectHandle<O>, model: &mut M) -> HistoryResult<()>
    where
        M: SchemaModel<Object = O>,
    {
        let op = &self.operations[idx];
        if let Some(definition) = op.snapshot_payload.as_deref() {
            let rebuilt = model.object_from_definition(definition, op.parent.as_ref())?;
            model.adopt_state(pooled, &rebuilt)?;
        }
        model.insert_object(pooled, op.parent.as_ref(), op.child_index)?;
        Ok(())
    }

    /// Swap the live object's state with the pooled state. The same
    /// exchange serves undo and redo.
    fn exchange_state<M>(
        &mut self,
        idx: usize,
        pooled: &ObjectHandle<O>,
        model: &mut M,
    ) -> HistoryResult<()>
    where
        M: SchemaModel<Object = O>,
    {
        let op = &self.operations[idx];
        let source = match op.snapshot_payload.as_deref() {
            Some(definition) => model.object_from_definition(definition, op.parent.as_ref())?,
            None => pooled.borrow().clone(),
        };
        let replaced_definition = op
            .snapshot_payload
            .as_ref()
            .and_then(|_| model.object_definition(&op.original));
        let replaced_state = op.original.deep_copy();

        model.adopt_state(&op.original, &source)?;

        let slot = op.pool_slot;
        let had_payload = op.snapshot_payload.is_some();
        self.pool.replace(slot, replaced_state);
        if had_payload {
            self.operations[idx].snapshot_payload = replaced_definition;
        }
        Ok(())
    }

    fn notify(&mut self, idx: usize, step: usize, total: usize) {
        let Some(listener) = self.listener.as_mut() else {
            return;
        };
        let op = &self.operations[idx];
        let event = ProgressEvent::for_step(
            step,
            total,
            op.original.name(),
            op.original.object_type(),
        );
        listener(&event);
    }

    // ========================================================================
    // Chain geometry
    // ========================================================================

    /// Number of operations an undo executes when `from` is the newest
    /// applied operation.
    fn steps_backward(&self, from: usize, chained: bool) -> usize {
        if !chained {
            return 1;
        }
        let mut steps = 0;
        let mut in_chain = false;
        for idx in (0..=from).rev() {
            steps += 1;
            match self.operations[idx].chain_role {
                ChainRole::ChainStart => break,
                role if role.continues_backward() => in_chain = true,
                _ if in_chain => {}
                _ => break,
            }
        }
        steps
    }

    /// Number of operations a redo executes when `from` is the next
    /// undone operation.
    fn steps_forward(&self, from: usize) -> usize {
        if self.ignore_chain {
            return 1;
        }
        let mut steps = 0;
        let mut in_chain = false;
        for idx in from..self.operations.len() {
            steps += 1;
            match self.operations[idx].chain_role {
                ChainRole::ChainEnd => break,
                role if role.continues_forward() => in_chain = true,
                _ if in_chain => {}
                _ => break,
            }
        }
        steps
    }

    fn last_chained_before(&self, end: usize) -> Option<usize> {
        (0..end)
            .rev()
            .find(|&idx| self.operations[idx].chain_role.is_chained())
    }

    fn first_chained_from(&self, start: usize) -> Option<usize> {
        (start..self.operations.len()).find(|&idx| self.operations[idx].chain_role.is_chained())
    }

    /// Keep chain roles legal after the operation with `removed` role left
    /// position `at`.
    fn repair_chain(&mut self, at: usize, removed: ChainRole) {
        match removed {
            ChainRole::ChainStart => {
                if let Some(idx) = self.first_chained_from(at) {
                    let op = &mut self.operations[idx];
                    op.chain_role = match op.chain_role {
                        ChainRole::ChainMiddle => ChainRole::ChainStart,
                        ChainRole::ChainEnd => ChainRole::None,
                        role => role,
                    };
                }
            }
            ChainRole::ChainEnd => {
                if let Some(idx) = self.last_chained_before(at) {
                    let op = &mut self.operations[idx];
                    op.chain_role = match op.chain_role {
                        ChainRole::ChainMiddle => ChainRole::ChainEnd,
                        ChainRole::ChainStart => ChainRole::None,
                        role => role,
                    };
                }
            }
            ChainRole::ChainMiddle | ChainRole::None => {}
        }
    }

    /// Steps the next [`undo_operation`](Self::undo_operation) will execute.
    pub fn undo_chain_size(&self) -> HistoryResult<usize> {
        if !self.is_undo_available() {
            return Err(HistoryError::UndoUnavailable);
        }
        Ok(self.steps_backward(self.applied - 1, !self.ignore_chain))
    }

    /// Steps the next [`redo_operation`](Self::redo_operation) will execute.
    pub fn redo_chain_size(&self) -> HistoryResult<usize> {
        if !self.is_redo_available() {
            return Err(HistoryError::RedoUnavailable);
        }
        Ok(self.steps_forward(self.applied))
    }

    /// Number of operations undone together when `index` is the newest
    /// applied operation.
    pub fn chain_size(&self, index: usize) -> HistoryResult<usize> {
        if index >= self.operations.len() {
            return Err(HistoryError::InvalidIndex {
                index,
                len: self.operations.len(),
            });
        }
        Ok(self.steps_backward(index, !self.ignore_chain))
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Drop the newest operation (or its whole chain) without restoring
    /// any state. Returns the number of operations removed.
    ///
    /// Meant for discarding a registration whose mutation then failed.
    pub fn remove_last_operation<M>(&mut self, model: &M) -> usize
    where
        M: SchemaModel<Object = O>,
    {
        let Some(last) = self.operations.len().checked_sub(1) else {
            return 0;
        };
        let count = self.steps_backward(last, true);
        for _ in 0..count {
            if let Some(op) = self.operations.pop_back() {
                self.pool.remove(op.pool_slot, model);
            }
        }
        self.applied = self.applied.min(self.operations.len());
        tracing::debug!(target: TARGET, removed = count, "last operation removed");
        count
    }

    /// Remove every operation and pooled object. Deferred objects stay
    /// alive until the log is dropped.
    pub fn remove_operations<M>(&mut self, model: &M)
    where
        M: SchemaModel<Object = O>,
    {
        self.operations.clear();
        self.pool.clear(model);
        self.applied = 0;
        tracing::debug!(target: TARGET, "all operations removed");
    }

    /// Point every operation concerning `object` at `new_index`.
    ///
    /// Call after reordering child objects outside undo/redo so later
    /// restores reinsert at the right position. Returns the number of
    /// operations updated.
    pub fn update_object_index(&mut self, object: &ObjectHandle<O>, new_index: usize) -> usize {
        let mut updated = 0;
        for op in self.operations.iter_mut().filter(|op| op.concerns(object)) {
            op.child_index = Some(new_index);
            updated += 1;
        }
        updated
    }

    /// Drop every operation whose pool slot is gone. Returns the number of
    /// operations dropped.
    pub fn validate_operations(&mut self) -> usize {
        let mut dropped = 0;
        let mut idx = self.operations.len();
        while idx > 0 {
            idx -= 1;
            let slot = self.operations[idx].pool_slot;
            if self.pool.has_slot(slot) {
                continue;
            }
            if let Some(op) = self.operations.remove(idx) {
                if idx < self.applied {
                    self.applied -= 1;
                }
                self.repair_chain(idx, op.chain_role);
                tracing::warn!(
                    target: TARGET,
                    slot = slot.raw(),
                    kind = %op.kind,
                    "operation without pooled object dropped"
                );
                dropped += 1;
            }
        }
        dropped
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[must_use]
    pub fn current_size(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub const fn maximum_size(&self) -> usize {
        self.config.max_size
    }

    /// Index of the newest applied operation; `None` at the start of history.
    #[must_use]
    pub const fn current_index(&self) -> Option<usize> {
        self.applied.checked_sub(1)
    }

    #[must_use]
    pub const fn is_undo_available(&self) -> bool {
        self.applied > 0
    }

    #[must_use]
    pub fn is_redo_available(&self) -> bool {
        self.applied < self.operations.len()
    }

    /// Summary of the operation at `index` (oldest is 0).
    pub fn operation_info(&self, index: usize) -> HistoryResult<OperationInfo> {
        self.operations
            .get(index)
            .map(Operation::info)
            .ok_or(HistoryError::InvalidIndex {
                index,
                len: self.operations.len(),
            })
    }

    /// Summaries of all operations, oldest first.
    pub fn operations(&self) -> impl Iterator<Item = OperationInfo> + '_ {
        self.operations.iter().map(Operation::info)
    }

    /// Number of live pool entries.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Number of pooled objects awaiting destruction with the log.
    #[must_use]
    pub fn deferred_count(&self) -> usize {
        self.pool.deferred().len()
    }

    #[must_use]
    pub const fn config(&self) -> &HistoryConfig {
        &self.config
    }
}
