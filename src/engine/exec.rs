//! engine::exec
//!
//! The batch executor.
//!
//! # Architecture
//!
//! The executor walks the staged work in three strictly ordered phases:
//!
//! 1. For each type in resolver order: backfill foreign keys, then one
//!    grouped insert call
//! 2. One grouped update call for the dirty set
//! 3. One grouped delete call for the deleted set, last
//!
//! # Failure handling
//!
//! Nothing in the executor fails fast except cycle detection, which happens
//! during order resolution before any write. Everything else is collected:
//!
//! - a backfill problem (parent without identifier) aborts only that type's
//!   insert and records a dependency failure
//! - a failed record becomes an indexed message, `Record {index}: {detail}`,
//!   with indices local to that type/phase batch
//! - an unexpected store-level failure in a phase is caught and folded in
//!   with a phase-scoped message
//!
//! The executor visits every phase regardless of earlier failures; the
//! coordinator raises the collected set once, at the end.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::error::{DependencyError, ItemFailure, PersistenceError};
use super::registry::EntityRegistry;
use super::relations::RelationshipBook;
use crate::core::entity::Entity;
use crate::core::tree::ErrorNode;
use crate::core::types::{EntityId, EntityType, FieldName, OpTag};
use crate::store::traits::{
    BatchWriteService, DeleteRecord, InsertRecord, StoreError, UpdateRecord, WriteOptions,
    WriteOutcome,
};

/// Per-entity result of one batch call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// The record's identifier, if any.
    pub id: Option<EntityId>,
    /// Whether the record was applied.
    pub success: bool,
    /// Error descriptions for a failed record, in store order.
    pub errors: Vec<String>,
}

impl From<&WriteOutcome> for OperationResult {
    fn from(outcome: &WriteOutcome) -> Self {
        Self {
            id: outcome.id.clone(),
            success: outcome.success,
            errors: outcome.errors.clone(),
        }
    }
}

/// One failure collected while the phases ran.
#[derive(Debug, Clone)]
pub(crate) enum CollectedFailure {
    /// A backfill problem that aborted one type's insert.
    Dependency(DependencyError),
    /// Failed records within one batch call.
    Persistence(PersistenceError),
    /// A whole phase failed in the store.
    Phase {
        /// The phase that failed.
        op: OpTag,
        /// The store's error.
        error: StoreError,
    },
}

impl CollectedFailure {
    /// The error tree nodes this failure contributes, in order.
    pub(crate) fn nodes(&self) -> Vec<ErrorNode> {
        match self {
            CollectedFailure::Dependency(err) => vec![ErrorNode::leaf(err.to_string())],
            CollectedFailure::Persistence(err) => err
                .failures
                .iter()
                .map(|failure| ErrorNode::leaf(failure.message()))
                .collect(),
            CollectedFailure::Phase { op, error } => {
                vec![ErrorNode::leaf(format!("{} failed: {}", op, error))]
            }
        }
    }
}

/// Everything the executor produced: per-phase results plus the collected
/// failures.
#[derive(Debug, Default)]
pub(crate) struct ExecutionOutcome {
    /// Per-phase results keyed by operation tag.
    pub results: BTreeMap<OpTag, Vec<OperationResult>>,
    /// Failures in collection order.
    pub failures: Vec<CollectedFailure>,
}

impl ExecutionOutcome {
    fn record_batch(
        &mut self,
        op: OpTag,
        entities: Option<&[Entity]>,
        outcomes: &[WriteOutcome],
    ) {
        let mut failures = Vec::new();
        let mut results = Vec::with_capacity(outcomes.len());

        for (index, outcome) in outcomes.iter().enumerate() {
            results.push(OperationResult::from(outcome));

            if outcome.success {
                // A successful insert hands the new identifier back to the
                // entity so later phases (and the caller) can see it.
                if let (Some(entities), Some(id)) = (entities, &outcome.id) {
                    if let Some(entity) = entities.get(index) {
                        entity.assign_id(id.clone());
                    }
                }
            } else {
                failures.push(ItemFailure {
                    index,
                    messages: outcome.errors.clone(),
                });
            }
        }

        self.results.insert(op.clone(), results);
        if !failures.is_empty() {
            self.failures
                .push(CollectedFailure::Persistence(PersistenceError { op, failures }));
        }
    }
}

/// Run all phases of the staged work against the write service.
///
/// Returns `Err` only for a dependency cycle, which is detected before any
/// write; every other failure is collected into the outcome.
pub(crate) fn execute(
    registry: &EntityRegistry,
    relationships: &RelationshipBook,
    writes: &dyn BatchWriteService,
) -> Result<ExecutionOutcome, DependencyError> {
    let order = relationships
        .graph()
        .insertion_order(registry.staged_types())?;

    let mut outcome = ExecutionOutcome::default();
    // Never stop on the first failure: the full error set is worth more than
    // an early exit, so the backend is always asked to keep going too.
    let options = WriteOptions { all_or_none: false };

    for entity_type in &order {
        insert_type(registry, relationships, writes, entity_type, &options, &mut outcome);
    }

    update_phase(registry, writes, &options, &mut outcome);
    delete_phase(registry, writes, &mut outcome);

    Ok(outcome)
}

/// Backfill and insert all staged entities of one type.
fn insert_type(
    registry: &EntityRegistry,
    relationships: &RelationshipBook,
    writes: &dyn BatchWriteService,
    entity_type: &EntityType,
    options: &WriteOptions,
    outcome: &mut ExecutionOutcome,
) {
    let entities = registry.staged_new_of(entity_type);
    let op = OpTag::insert_of(entity_type);
    debug!(%op, count = entities.len(), "insert phase");

    // Validate every pending relationship for this type before writing any
    // foreign key: a parent without an identifier aborts the whole type.
    let mut assignments: Vec<(&Entity, &FieldName, EntityId)> = Vec::new();
    for relationship in relationships.pending_for(entity_type) {
        match relationship.parent.id() {
            Some(parent_id) => {
                assignments.push((&relationship.child, &relationship.field, parent_id));
            }
            None => {
                outcome
                    .failures
                    .push(CollectedFailure::Dependency(DependencyError::UnresolvedParent {
                        parent_type: relationship.parent.entity_type(),
                        child_type: entity_type.clone(),
                    }));
                return;
            }
        }
    }

    for (child, field, parent_id) in assignments {
        child.set(field.clone(), Value::String(parent_id.as_str().to_string()));
    }

    let records: Vec<InsertRecord> = entities
        .iter()
        .map(|entity| InsertRecord {
            entity_type: entity_type.clone(),
            fields: entity.fields(),
        })
        .collect();

    match writes.insert(records, options) {
        Ok(outcomes) if outcomes.len() == entities.len() => {
            outcome.record_batch(op, Some(entities), &outcomes);
        }
        Ok(outcomes) => {
            outcome.failures.push(CollectedFailure::Phase {
                op,
                error: StoreError::Backend(format!(
                    "backend returned {} results for {} records",
                    outcomes.len(),
                    entities.len()
                )),
            });
        }
        Err(error) => {
            outcome.failures.push(CollectedFailure::Phase { op, error });
        }
    }
}

/// One grouped update call for the whole dirty set.
fn update_phase(
    registry: &EntityRegistry,
    writes: &dyn BatchWriteService,
    options: &WriteOptions,
    outcome: &mut ExecutionOutcome,
) {
    if registry.dirty().is_empty() {
        return;
    }
    let op = OpTag::update();
    debug!(%op, count = registry.dirty().len(), "update phase");

    let records: Vec<UpdateRecord> = registry
        .dirty()
        .iter()
        .map(|(id, entity)| UpdateRecord {
            id: id.clone(),
            entity_type: entity.entity_type(),
            fields: entity.fields(),
        })
        .collect();
    let count = records.len();

    match writes.update(records, options) {
        Ok(outcomes) if outcomes.len() == count => {
            outcome.record_batch(op, None, &outcomes);
        }
        Ok(outcomes) => {
            outcome.failures.push(CollectedFailure::Phase {
                op,
                error: StoreError::Backend(format!(
                    "backend returned {} results for {} records",
                    outcomes.len(),
                    count
                )),
            });
        }
        Err(error) => {
            outcome.failures.push(CollectedFailure::Phase { op, error });
        }
    }
}

/// One grouped delete call for the whole deleted set, last.
fn delete_phase(
    registry: &EntityRegistry,
    writes: &dyn BatchWriteService,
    outcome: &mut ExecutionOutcome,
) {
    if registry.deleted().is_empty() {
        return;
    }
    let op = OpTag::delete();
    debug!(%op, count = registry.deleted().len(), "delete phase");

    let records: Vec<DeleteRecord> = registry
        .deleted()
        .iter()
        .map(|(id, entity)| DeleteRecord {
            id: id.clone(),
            entity_type: entity.entity_type(),
        })
        .collect();
    let count = records.len();

    match writes.delete(records) {
        Ok(outcomes) if outcomes.len() == count => {
            outcome.record_batch(op, None, &outcomes);
        }
        Ok(outcomes) => {
            outcome.failures.push(CollectedFailure::Phase {
                op,
                error: StoreError::Backend(format!(
                    "backend returned {} results for {} records",
                    outcomes.len(),
                    count
                )),
            });
        }
        Err(error) => {
            outcome.failures.push(CollectedFailure::Phase { op, error });
        }
    }
}
