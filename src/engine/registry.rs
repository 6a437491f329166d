//! engine::registry
//!
//! Bookkeeping for entities staged within one orchestration instance.
//!
//! # Design
//!
//! Three collections, per the data model:
//!
//! - staged-new: per-type ordered buckets, with the types themselves kept in
//!   first-staged order (the tie-break for result ordering and for the
//!   resolver's root order)
//! - dirty: identifier -> entity, awaiting update
//! - deleted: identifier -> entity, awaiting delete
//!
//! Registration validates and records; it never touches the backing store.
//!
//! # Invariants
//!
//! - Every dirty/deleted entry carries an identifier
//! - An unsaved entity staged as new is never also dirty: its field changes
//!   ride along with the pending insert
//! - Re-staging the same handle as new is a no-op (reference identity)

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::error::ValidationError;
use crate::core::entity::Entity;
use crate::core::types::{EntityId, EntityType};
use crate::store::traits::TypeDescriptorService;

/// The sets of entities staged for insert, update and delete.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    /// Types with staged-new entities, in first-staged order.
    type_order: Vec<EntityType>,
    /// Staged-new entities per type, in registration order.
    staged_new: HashMap<EntityType, Vec<Entity>>,
    /// Entities awaiting update, keyed by identifier.
    dirty: BTreeMap<EntityId, Entity>,
    /// Entities awaiting deletion, keyed by identifier.
    deleted: BTreeMap<EntityId, Entity>,
}

impl EntityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an entity for insertion.
    ///
    /// Validates the type against the descriptor service. Staging the same
    /// handle twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::NotCreateable` if the descriptor service
    /// rejects the entity's type.
    pub fn stage_new(
        &mut self,
        entity: &Entity,
        descriptors: &dyn TypeDescriptorService,
    ) -> Result<(), ValidationError> {
        let entity_type = entity.entity_type();
        if !descriptors.is_createable(&entity_type) {
            return Err(ValidationError::NotCreateable(entity_type));
        }

        if self.is_staged_new(entity) {
            debug!(%entity_type, "entity already staged as new; ignoring");
            return Ok(());
        }

        if !self.staged_new.contains_key(&entity_type) {
            self.type_order.push(entity_type.clone());
        }
        self.staged_new
            .entry(entity_type)
            .or_default()
            .push(entity.clone());
        Ok(())
    }

    /// Stage an entity for update.
    ///
    /// If the same handle is already staged as new (by reference identity),
    /// this is a no-op: its field changes will be written by the pending
    /// insert.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingId` if the entity has no identifier
    /// and is not staged as new.
    pub fn stage_dirty(&mut self, entity: &Entity) -> Result<(), ValidationError> {
        if self.is_staged_new(entity) {
            debug!(entity_type = %entity.entity_type(), "dirty entity rides along with its pending insert");
            return Ok(());
        }

        let id = entity.id().ok_or_else(|| ValidationError::MissingId {
            entity_type: entity.entity_type(),
            operation: "update",
        })?;
        self.dirty.insert(id, entity.clone());
        Ok(())
    }

    /// Stage an entity for deletion.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingId` if the entity has no identifier.
    pub fn stage_deleted(&mut self, entity: &Entity) -> Result<(), ValidationError> {
        let id = entity.id().ok_or_else(|| ValidationError::MissingId {
            entity_type: entity.entity_type(),
            operation: "delete",
        })?;
        self.deleted.insert(id, entity.clone());
        Ok(())
    }

    /// Whether this exact handle is staged as new, by reference identity.
    pub fn is_staged_new(&self, entity: &Entity) -> bool {
        self.staged_new
            .get(&entity.entity_type())
            .is_some_and(|bucket| bucket.iter().any(|staged| Entity::same(staged, entity)))
    }

    /// Types with staged-new entities, in first-staged order.
    pub fn staged_types(&self) -> &[EntityType] {
        &self.type_order
    }

    /// Staged-new entities of one type, in registration order.
    pub fn staged_new_of(&self, entity_type: &EntityType) -> &[Entity] {
        self.staged_new
            .get(entity_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Entities awaiting update.
    pub fn dirty(&self) -> &BTreeMap<EntityId, Entity> {
        &self.dirty
    }

    /// Entities awaiting deletion.
    pub fn deleted(&self) -> &BTreeMap<EntityId, Entity> {
        &self.deleted
    }

    /// Whether nothing at all is staged.
    pub fn is_empty(&self) -> bool {
        self.staged_new.is_empty() && self.dirty.is_empty() && self.deleted.is_empty()
    }
}
