//! core::entity
//!
//! The shared entity handle.
//!
//! # Design
//!
//! An [`Entity`] is a cheaply clonable handle to one staged domain record: a
//! type tag, an optional store-assigned identifier, and a mutable field map.
//! Clones share the same underlying record, so an identifier assigned during
//! commit is visible through every clone the caller kept.
//!
//! Two identity notions coexist:
//!
//! - *Reference identity* ([`Entity::same`]) - whether two handles point at
//!   the same staged record. This is what "already staged as new" means.
//! - *Store identity* ([`Entity::id`]) - the persisted identifier, used for
//!   update and delete bookkeeping.
//!
//! The engine is single-threaded within one logical execution, so the handle
//! is `Rc`-based and intentionally not `Send`.
//!
//! # Example
//!
//! ```
//! use convoy::core::entity::Entity;
//! use convoy::core::types::{EntityType, FieldName};
//! use serde_json::json;
//!
//! let account = Entity::new(EntityType::new("Account").unwrap());
//! account.set(FieldName::new("Name").unwrap(), json!("Edge Communications"));
//!
//! assert!(account.id().is_none());
//! assert_eq!(account.get(&FieldName::new("Name").unwrap()), Some(json!("Edge Communications")));
//!
//! let alias = account.clone();
//! assert!(Entity::same(&account, &alias));
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use super::types::{EntityId, EntityType, FieldName};

/// The record behind an entity handle.
#[derive(Debug)]
struct EntityData {
    entity_type: EntityType,
    id: Option<EntityId>,
    fields: BTreeMap<FieldName, Value>,
}

/// A handle to one domain record staged for a write.
///
/// See the [module docs](self) for identity semantics.
#[derive(Clone)]
pub struct Entity {
    inner: Rc<RefCell<EntityData>>,
}

impl Entity {
    /// Create a new, unsaved entity of the given type.
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            inner: Rc::new(RefCell::new(EntityData {
                entity_type,
                id: None,
                fields: BTreeMap::new(),
            })),
        }
    }

    /// Create an entity handle for an already-persisted record.
    pub fn with_id(entity_type: EntityType, id: EntityId) -> Self {
        Self {
            inner: Rc::new(RefCell::new(EntityData {
                entity_type,
                id: Some(id),
                fields: BTreeMap::new(),
            })),
        }
    }

    /// The entity's type descriptor.
    pub fn entity_type(&self) -> EntityType {
        self.inner.borrow().entity_type.clone()
    }

    /// The store identifier, if the record has been persisted.
    pub fn id(&self) -> Option<EntityId> {
        self.inner.borrow().id.clone()
    }

    /// Assign the store identifier after a successful insert.
    pub(crate) fn assign_id(&self, id: EntityId) {
        self.inner.borrow_mut().id = Some(id);
    }

    /// Set a field value, replacing any previous value.
    pub fn set(&self, field: FieldName, value: Value) {
        self.inner.borrow_mut().fields.insert(field, value);
    }

    /// Read a field value.
    pub fn get(&self, field: &FieldName) -> Option<Value> {
        self.inner.borrow().fields.get(field).cloned()
    }

    /// Snapshot of the current field map.
    pub fn fields(&self) -> BTreeMap<FieldName, Value> {
        self.inner.borrow().fields.clone()
    }

    /// Number of fields currently set.
    pub fn field_count(&self) -> usize {
        self.inner.borrow().fields.len()
    }

    /// Reference identity: do two handles point at the same staged record?
    pub fn same(a: &Entity, b: &Entity) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.inner.borrow();
        f.debug_struct("Entity")
            .field("entity_type", &data.entity_type)
            .field("id", &data.id)
            .field("fields", &data.fields.len())
            .finish()
    }
}
