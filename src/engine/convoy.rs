//! engine::convoy
//!
//! The orchestration instance and its commit state machine.
//!
//! # Architecture
//!
//! A [`Convoy`] is one unit of staged work: callers register entities and
//! relationships, then call [`Convoy::commit`] exactly once. The commit
//! lifecycle is:
//!
//! ```text
//! pre-commit check -> checkpoint -> resolve -> execute -> hooks -> committed
//!                                      |           |         |
//!                                      +-----------+---------+--> rollback -> failed
//! ```
//!
//! # Transaction coordination
//!
//! The instance that creates its [`ExecutionContext`] is the context's root;
//! instances constructed over an existing context join it as nested. The
//! root's local checkpoint doubles as the context-level checkpoint. On
//! failure an instance rolls back its local checkpoint first; unless partial
//! success was enabled on the root, it then rolls back the context checkpoint
//! and clears the context, so every other instance still pending in the
//! context loses its checkpoint reference and fails if it later commits.
//! When the root finishes - either way - the context is cleared
//! unconditionally as a final step, so nothing leaks into the next logical
//! execution.
//!
//! # Invariants
//!
//! - A convoy commits at most once; later attempts are refused
//! - Registration never touches the backing store; only commit writes
//! - Every phase is attempted before any collected failure is raised
//! - Rollback always precedes the raise

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::context::ExecutionContext;
use super::error::{AggregateError, CommitError, ValidationError};
use super::exec::{self, OperationResult};
use super::hooks::{CommittedObserver, Hooks, PostCommitHook, PreCommitCheck};
use super::registry::EntityRegistry;
use super::relations::RelationshipBook;
use crate::core::entity::Entity;
use crate::core::tree::ErrorNode;
use crate::core::types::{EntityType, FieldName, InstanceId, OpTag, UtcTimestamp};
use crate::store::traits::{CheckpointHandle, Services};

/// Lifecycle state of one orchestration instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvoyState {
    /// Registrations accepted; commit not yet called.
    Pending,
    /// Commit in progress.
    Committing,
    /// Commit finished successfully. Terminal.
    Committed,
    /// Commit failed and was rolled back. Terminal.
    Failed,
}

/// Summary of a successful commit.
#[derive(Debug, Clone)]
pub struct CommitReport {
    /// When the commit attempt started.
    pub started_at: UtcTimestamp,
    /// When the commit attempt finished.
    pub finished_at: UtcTimestamp,
    /// Records inserted across all types.
    pub inserted: usize,
    /// Records updated.
    pub updated: usize,
    /// Records deleted.
    pub deleted: usize,
}

impl Default for CommitReport {
    fn default() -> Self {
        let now = UtcTimestamp::now();
        Self {
            started_at: now.clone(),
            finished_at: now,
            inserted: 0,
            updated: 0,
            deleted: 0,
        }
    }
}

/// One orchestration instance.
///
/// See the [module docs](self) for the lifecycle and coordination rules.
#[derive(Debug)]
pub struct Convoy {
    id: InstanceId,
    services: Services,
    context: ExecutionContext,
    is_root: bool,
    registry: EntityRegistry,
    relationships: RelationshipBook,
    hooks: Hooks,
    results: BTreeMap<OpTag, Vec<OperationResult>>,
    state: ConvoyState,
}

impl Convoy {
    /// Create an instance with a fresh execution context, becoming its root.
    pub fn new(services: Services) -> Self {
        let id = InstanceId::new();
        let context = ExecutionContext::new(id.clone());
        Self {
            id,
            services,
            context,
            is_root: true,
            registry: EntityRegistry::new(),
            relationships: RelationshipBook::new(),
            hooks: Hooks::default(),
            results: BTreeMap::new(),
            state: ConvoyState::Pending,
        }
    }

    /// Create an instance joining an existing execution context as non-root.
    pub fn with_context(services: Services, context: &ExecutionContext) -> Self {
        context.join();
        Self {
            id: InstanceId::new(),
            services,
            context: context.clone(),
            is_root: false,
            registry: EntityRegistry::new(),
            relationships: RelationshipBook::new(),
            hooks: Hooks::default(),
            results: BTreeMap::new(),
            state: ConvoyState::Pending,
        }
    }

    /// This instance's id.
    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    /// Handle to this instance's execution context, for nesting.
    pub fn context(&self) -> ExecutionContext {
        self.context.clone()
    }

    /// Whether this instance is its context's root.
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConvoyState {
        self.state
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Stage an entity for insertion.
    pub fn register_new(&mut self, entity: &Entity) -> Result<(), ValidationError> {
        self.registry
            .stage_new(entity, self.services.descriptors.as_ref())
    }

    /// Stage a batch of entities for insertion.
    pub fn register_new_many(&mut self, entities: &[Entity]) -> Result<(), ValidationError> {
        for entity in entities {
            self.register_new(entity)?;
        }
        Ok(())
    }

    /// Stage an entity for update. A no-op if the same handle is already
    /// staged as new.
    pub fn register_dirty(&mut self, entity: &Entity) -> Result<(), ValidationError> {
        self.registry.stage_dirty(entity)
    }

    /// Stage a batch of entities for update.
    pub fn register_dirty_many(&mut self, entities: &[Entity]) -> Result<(), ValidationError> {
        for entity in entities {
            self.register_dirty(entity)?;
        }
        Ok(())
    }

    /// Stage an entity for deletion.
    pub fn register_deleted(&mut self, entity: &Entity) -> Result<(), ValidationError> {
        self.registry.stage_deleted(entity)
    }

    /// Stage a batch of entities for deletion.
    pub fn register_deleted_many(&mut self, entities: &[Entity]) -> Result<(), ValidationError> {
        for entity in entities {
            self.register_deleted(entity)?;
        }
        Ok(())
    }

    /// Record a pending foreign-key relationship: `child.field` will receive
    /// `parent`'s identifier during commit.
    pub fn register_relationship(&mut self, child: &Entity, field: FieldName, parent: &Entity) {
        self.relationships.register(child, field, parent);
    }

    /// Register a junction between `source` and `target`.
    ///
    /// Creates a fresh entity of `junction_type` when `existing` is `None`
    /// (staging it as new), or reuses the supplied one without re-staging.
    /// Returns the junction handle so further relationships can be chained
    /// onto it.
    pub fn register_junction(
        &mut self,
        junction_type: &EntityType,
        source_field: FieldName,
        target_field: FieldName,
        source: &Entity,
        target: &Entity,
        existing: Option<Entity>,
    ) -> Result<Entity, ValidationError> {
        let junction = match existing {
            Some(junction) => junction,
            None => {
                let junction = Entity::new(junction_type.clone());
                self.register_new(&junction)?;
                junction
            }
        };
        self.register_relationship(&junction, source_field, source);
        self.register_relationship(&junction, target_field, target);
        Ok(junction)
    }

    // ------------------------------------------------------------------
    // Policy and hooks
    // ------------------------------------------------------------------

    /// Allow nested failures to roll back only their own work instead of the
    /// whole context.
    ///
    /// # Errors
    ///
    /// Only the root may call this, and only before any nested instance has
    /// joined the context.
    pub fn allow_partial_success(&self) -> Result<(), ValidationError> {
        if !self.is_root {
            return Err(ValidationError::PartialSuccessNotRoot);
        }
        self.context.allow_partial_success(&self.id)
    }

    /// Install the pre-commit check.
    pub fn set_pre_commit_check(&mut self, check: impl FnMut() -> bool + 'static) {
        self.hooks.pre_commit = Some(Box::new(check) as PreCommitCheck);
    }

    /// Install the post-commit hook.
    pub fn set_post_commit_hook(
        &mut self,
        hook: impl FnMut() -> Result<(), CommitError> + 'static,
    ) {
        self.hooks.post_commit = Some(Box::new(hook) as PostCommitHook);
    }

    /// Install the committed observer (fire-and-forget).
    pub fn set_committed_observer(&mut self, observer: impl FnMut(&CommitReport) + 'static) {
        self.hooks.committed = Some(Box::new(observer) as CommittedObserver);
    }

    // ------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------

    /// Per-phase results of the commit attempt, keyed by operation tag.
    pub fn results(&self) -> &BTreeMap<OpTag, Vec<OperationResult>> {
        &self.results
    }

    /// Commit all staged work.
    ///
    /// Either returns normally with every registered write durably applied,
    /// or rolls back (this instance's work, plus the whole context unless
    /// partial success was enabled on the root) and returns the error.
    ///
    /// # Errors
    ///
    /// - [`CommitError::AlreadyCommitted`] on any instance past pending
    /// - [`CommitError::Validation`] for a rejected pre-commit check or a
    ///   nested commit without an active context checkpoint
    /// - [`CommitError::Dependency`] for a cycle, before any write
    /// - [`CommitError::Aggregate`] enumerating every collected failure
    pub fn commit(&mut self) -> Result<CommitReport, CommitError> {
        if self.state != ConvoyState::Pending {
            return Err(CommitError::AlreadyCommitted);
        }
        self.state = ConvoyState::Committing;
        let started_at = UtcTimestamp::now();
        debug!(instance = %self.id, root = self.is_root, "commit starting");

        let result = self.run_commit(started_at);

        match &result {
            Ok(_) => self.state = ConvoyState::Committed,
            Err(error) => {
                debug!(instance = %self.id, %error, "commit failed");
                self.state = ConvoyState::Failed;
            }
        }

        // Registration data is scoped to one commit attempt; only the
        // per-phase results outlive it.
        self.registry = EntityRegistry::new();
        self.relationships = RelationshipBook::new();

        // Final step: a finishing root always tears its context down, even on
        // paths that already cleared it.
        if self.is_root {
            self.context.clear();
        }

        if let Ok(report) = &result {
            self.hooks.notify_committed(report);
        }

        result
    }

    fn run_commit(&mut self, started_at: UtcTimestamp) -> Result<CommitReport, CommitError> {
        if !self.hooks.run_pre_commit() {
            return Err(ValidationError::PreCommitRejected.into());
        }

        let local_checkpoint = self.establish_checkpoints()?;

        let outcome = match exec::execute(
            &self.registry,
            &self.relationships,
            self.services.writes.as_ref(),
        ) {
            Ok(outcome) => outcome,
            Err(dependency) => {
                // Cycle detection fired before any write; roll back per
                // policy and re-raise as-is.
                self.roll_back(&local_checkpoint);
                return Err(dependency.into());
            }
        };

        self.results = outcome.results;

        if !outcome.failures.is_empty() {
            let children: Vec<ErrorNode> = outcome
                .failures
                .iter()
                .flat_map(|failure| failure.nodes())
                .collect();
            let aggregate = AggregateError::new(children);
            self.roll_back(&local_checkpoint);
            return Err(aggregate.into());
        }

        if let Err(error) = self.hooks.run_post_commit() {
            self.roll_back(&local_checkpoint);
            return Err(error);
        }

        Ok(self.report(started_at))
    }

    /// Establish the local checkpoint; for the root it doubles as the
    /// context-level checkpoint.
    fn establish_checkpoints(&mut self) -> Result<CheckpointHandle, CommitError> {
        if self.is_root {
            let checkpoint = self.services.checkpoints.create()?;
            self.context.set_checkpoint(checkpoint.clone());
            Ok(checkpoint)
        } else {
            if !self.context.has_active_checkpoint() {
                return Err(ValidationError::InactiveContext.into());
            }
            Ok(self.services.checkpoints.create()?)
        }
    }

    /// Roll back after a failure: local checkpoint first, then the context
    /// checkpoint (and context teardown) unless partial success is enabled.
    ///
    /// Rollback problems are logged rather than raised so they never mask
    /// the triggering error.
    fn roll_back(&mut self, local_checkpoint: &CheckpointHandle) {
        let context_checkpoint = self.context.checkpoint();

        // If a nested failure already rolled the context back, the root's
        // local checkpoint (== the context checkpoint) is spent.
        let local_already_spent = self.is_root && context_checkpoint.is_none();
        if local_already_spent {
            debug!(instance = %self.id, "local checkpoint already rolled back with the context");
        } else if let Err(error) = self.services.checkpoints.rollback(local_checkpoint) {
            warn!(instance = %self.id, %error, "local rollback failed");
        }

        if self.context.partial_success() {
            debug!(instance = %self.id, "partial success enabled; context survives");
            return;
        }

        if let Some(context_checkpoint) = context_checkpoint {
            if context_checkpoint != *local_checkpoint {
                if let Err(error) = self.services.checkpoints.rollback(&context_checkpoint) {
                    warn!(instance = %self.id, %error, "context rollback failed");
                }
            }
        }
        self.context.clear();
    }

    fn report(&self, started_at: UtcTimestamp) -> CommitReport {
        let update = OpTag::update();
        let delete = OpTag::delete();

        let mut inserted = 0;
        let mut updated = 0;
        let mut deleted = 0;
        for (tag, results) in &self.results {
            let successes = results.iter().filter(|result| result.success).count();
            if *tag == update {
                updated = successes;
            } else if *tag == delete {
                deleted = successes;
            } else {
                inserted += successes;
            }
        }

        CommitReport {
            started_at,
            finished_at: UtcTimestamp::now(),
            inserted,
            updated,
            deleted,
        }
    }
}
