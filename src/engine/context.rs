//! engine::context
//!
//! The execution context shared between a root instance and its nested
//! instances.
//!
//! # Design
//!
//! One context scopes one logical unit of execution (e.g., one inbound
//! request). The instance that creates the context is its root; instances
//! constructed with an existing context join it as non-root. The context is
//! an explicit, cheaply clonable handle - never process-global state - so
//! nothing can leak into an unrelated execution.
//!
//! # Invariants
//!
//! - At most one root per context, fixed at construction
//! - Only the root may enable partial success, and only before any nested
//!   instance joins
//! - The context-level checkpoint is the root's local checkpoint; it is
//!   cleared (with the policy flag) when the context is torn down

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::error::ValidationError;
use crate::core::types::InstanceId;
use crate::store::traits::CheckpointHandle;

#[derive(Debug)]
struct ContextState {
    root: InstanceId,
    checkpoint: Option<CheckpointHandle>,
    partial_success: bool,
    joined: usize,
}

/// Shared transaction state for one logical execution.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Rc<RefCell<ContextState>>,
}

impl ExecutionContext {
    /// Create a fresh context rooted at the given instance.
    ///
    /// Partial success always starts disabled in a fresh context.
    pub(crate) fn new(root: InstanceId) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ContextState {
                root,
                checkpoint: None,
                partial_success: false,
                joined: 0,
            })),
        }
    }

    /// Record a nested instance joining this context.
    pub(crate) fn join(&self) {
        self.inner.borrow_mut().joined += 1;
    }

    /// Whether the given instance is this context's root.
    pub fn is_root(&self, instance: &InstanceId) -> bool {
        self.inner.borrow().root == *instance
    }

    /// Number of nested instances that have joined.
    pub fn joined_count(&self) -> usize {
        self.inner.borrow().joined
    }

    /// Whether partial success is enabled.
    pub fn partial_success(&self) -> bool {
        self.inner.borrow().partial_success
    }

    /// Enable partial success on behalf of `caller`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::PartialSuccessNotRoot` if `caller` is not
    /// the root, or `ValidationError::PartialSuccessAfterJoin` if a nested
    /// instance already joined.
    pub(crate) fn allow_partial_success(
        &self,
        caller: &InstanceId,
    ) -> Result<(), ValidationError> {
        let mut state = self.inner.borrow_mut();
        if state.root != *caller {
            return Err(ValidationError::PartialSuccessNotRoot);
        }
        if state.joined > 0 {
            return Err(ValidationError::PartialSuccessAfterJoin);
        }
        state.partial_success = true;
        Ok(())
    }

    /// The context-level checkpoint, if one is active.
    pub(crate) fn checkpoint(&self) -> Option<CheckpointHandle> {
        self.inner.borrow().checkpoint.clone()
    }

    /// Whether a context-level checkpoint is active.
    pub fn has_active_checkpoint(&self) -> bool {
        self.inner.borrow().checkpoint.is_some()
    }

    /// Install the context-level checkpoint (the root's local checkpoint).
    pub(crate) fn set_checkpoint(&self, checkpoint: CheckpointHandle) {
        self.inner.borrow_mut().checkpoint = Some(checkpoint);
    }

    /// Tear the context down: drop the checkpoint reference and reset the
    /// policy flag. Any instance still pending in this context will fail if
    /// it later tries to commit.
    pub(crate) fn clear(&self) {
        let mut state = self.inner.borrow_mut();
        state.checkpoint = None;
        state.partial_success = false;
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("ExecutionContext")
            .field("root", &state.root)
            .field("active", &state.checkpoint.is_some())
            .field("partial_success", &state.partial_success)
            .field("joined", &state.joined)
            .finish()
    }
}
