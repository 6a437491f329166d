//! engine::error
//!
//! The engine's error taxonomy.
//!
//! # Propagation policy
//!
//! - [`ValidationError`] and the already-committed refusal fail fast and stop
//!   the current call immediately.
//! - [`DependencyError::Cycle`] fails fast during order resolution, before
//!   any write.
//! - [`PersistenceError`]s never fail fast: every phase is attempted, and the
//!   collected failures are raised once at the end of the commit attempt as a
//!   single [`AggregateError`].
//!
//! Rollback (local, plus the context checkpoint unless partial success is
//! enabled) always happens before an error is raised to the caller.

use thiserror::Error;

use crate::core::graph::CycleError;
use crate::core::tree::ErrorNode;
use crate::core::types::{EntityType, OpTag};
use crate::store::traits::StoreError;

/// A registration or policy call was invalid. Fails fast.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// register-new was called for a type the descriptor service rejects.
    #[error("entity type {0} is not createable")]
    NotCreateable(EntityType),

    /// register-dirty or register-deleted on an entity with no identifier.
    #[error("cannot stage a {entity_type} record for {operation} without an identifier")]
    MissingId {
        /// The entity's type.
        entity_type: EntityType,
        /// The registration that required an identifier ("update"/"delete").
        operation: &'static str,
    },

    /// allow-partial-success called on a non-root instance.
    #[error("only the root may allow partial success")]
    PartialSuccessNotRoot,

    /// allow-partial-success called after a nested instance joined.
    #[error("partial success must be enabled before nested instances join the context")]
    PartialSuccessAfterJoin,

    /// A nested instance committed while its context has no live checkpoint:
    /// either the root has not begun committing, or the context was cleared
    /// by an earlier failure.
    #[error("execution context has no active checkpoint")]
    InactiveContext,

    /// The injected pre-commit check returned false.
    #[error("pre-commit check rejected the commit")]
    PreCommitRejected,
}

/// An ordering problem in the staged work.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DependencyError {
    /// The staged types form a dependency cycle. Detected before any write.
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// A pending relationship's parent had no identifier when the child's
    /// type was processed. Aborts that type's insert only.
    #[error("cannot resolve relationship for {child_type}: parent {parent_type} has no identifier")]
    UnresolvedParent {
        /// The type of the parent entity.
        parent_type: EntityType,
        /// The type whose insert was aborted.
        child_type: EntityType,
    },
}

/// One failed record within a grouped write call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Position within that call's batch. Indices are phase-local: they
    /// restart for every type's insert batch and for the update and delete
    /// batches.
    pub index: usize,
    /// Error descriptions the store returned for the record, in order.
    pub messages: Vec<String>,
}

impl ItemFailure {
    /// The indexed message recorded in the error tree.
    pub fn message(&self) -> String {
        let detail = if self.messages.is_empty() {
            "unknown error".to_string()
        } else {
            self.messages.join("; ")
        };
        format!("Record {}: {}", self.index, detail)
    }
}

/// One or more records failed in a backend batch call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{op}: {} record(s) failed", .failures.len())]
pub struct PersistenceError {
    /// The phase whose batch failed.
    pub op: OpTag,
    /// The failed records, in batch order.
    pub failures: Vec<ItemFailure>,
}

/// The single structured error raised when failures were collected during a
/// commit attempt. Its children enumerate every failure encountered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("multiple errors occurred during transaction")]
pub struct AggregateError {
    tree: ErrorNode,
}

impl AggregateError {
    /// The fixed root message of every aggregate tree.
    pub const MESSAGE: &'static str = "multiple errors occurred during transaction";

    /// Build the aggregate from the collected child nodes, in order.
    pub fn new(children: Vec<ErrorNode>) -> Self {
        Self {
            tree: ErrorNode::with_children(Self::MESSAGE, children),
        }
    }

    /// The full error tree, rooted at the fixed message.
    pub fn tree(&self) -> &ErrorNode {
        &self.tree
    }

    /// The collected failures, in collection order.
    pub fn children(&self) -> &[ErrorNode] {
        self.tree.children()
    }

    /// Indented text rendering of the tree.
    pub fn render(&self) -> String {
        self.tree.render_indented()
    }

    /// JSON wire encoding of the tree.
    pub fn to_json_string(&self) -> String {
        self.tree.to_json_string()
    }
}

/// What `commit` returns on failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitError {
    /// Commit was called on an instance that already ran (to completion or
    /// failure). No writes are performed.
    #[error("commit has already been executed")]
    AlreadyCommitted,

    /// A fail-fast validation problem.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A fail-fast ordering problem (dependency cycle).
    #[error(transparent)]
    Dependency(#[from] DependencyError),

    /// Failures collected across the phases, raised once at the end.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// The checkpoint service failed while establishing a restore point.
    #[error("checkpoint service failed: {0}")]
    Checkpoint(#[from] StoreError),
}
