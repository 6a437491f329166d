//! store::traits
//!
//! The backing-store boundary.
//!
//! # Design
//!
//! The engine consumes the store through three narrow services, each a plain
//! trait with blocking methods (the engine is synchronous within one logical
//! execution, per the concurrency model):
//!
//! - [`TypeDescriptorService`] - answers whether a type is createable
//! - [`CheckpointService`] - restore points in the backing transaction
//! - [`BatchWriteService`] - grouped insert/update/delete calls
//!
//! Only plain data crosses the boundary: [`InsertRecord`], [`UpdateRecord`]
//! and [`DeleteRecord`] going in, one ordered [`WriteOutcome`] per record
//! coming back. The engine always requests non-stop-on-first-failure
//! behavior (`all_or_none = false`) so it can build a complete error tree.
//!
//! # Example
//!
//! ```
//! use convoy::store::{MemoryStore, StoreSchema, TypeSchema, TypeDescriptorService};
//! use convoy::core::types::EntityType;
//!
//! let schema = StoreSchema::new()
//!     .with_type(TypeSchema::new(EntityType::new("Account").unwrap()));
//! let store = MemoryStore::new(schema);
//!
//! assert!(store.is_createable(&EntityType::new("Account").unwrap()));
//! assert!(!store.is_createable(&EntityType::new("Unknown").unwrap()));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::core::types::{EntityId, EntityType, FieldName};

/// Errors from store services.
///
/// These are whole-call failures; per-record problems are reported through
/// [`WriteOutcome`] instead, so one bad record never hides the rest.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The checkpoint handle does not name a live restore point.
    #[error("unknown checkpoint: {0}")]
    UnknownCheckpoint(CheckpointHandle),

    /// The store backend failed outside of any single record.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// A handle to one restore point in the backing transaction.
///
/// Fresh per [`CheckpointService::create`] call; rolling back undoes all
/// writes since the handle was created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointHandle(String);

impl CheckpointHandle {
    /// Generate a new unique handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the handle as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CheckpointHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CheckpointHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options for a grouped write call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    /// When true the store must apply either every record or none.
    /// The engine always passes `false`: every record is attempted so the
    /// full failure set can be reported.
    pub all_or_none: bool,
}

/// One record to insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertRecord {
    /// The record's type.
    pub entity_type: EntityType,
    /// Field values to persist.
    pub fields: BTreeMap<FieldName, Value>,
}

/// One record to update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// Identifier of the persisted record.
    pub id: EntityId,
    /// The record's type.
    pub entity_type: EntityType,
    /// Field values to write over the stored record.
    pub fields: BTreeMap<FieldName, Value>,
}

/// One record to delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRecord {
    /// Identifier of the persisted record.
    pub id: EntityId,
    /// The record's type.
    pub entity_type: EntityType,
}

/// Per-record result of a grouped write call, in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOutcome {
    /// The record's identifier: newly assigned on insert success, echoed on
    /// update/delete.
    pub id: Option<EntityId>,
    /// Whether the record was applied.
    pub success: bool,
    /// Error descriptions for a failed record, in store order.
    pub errors: Vec<String>,
}

impl WriteOutcome {
    /// A successful outcome carrying the record's identifier.
    pub fn applied(id: EntityId) -> Self {
        Self {
            id: Some(id),
            success: true,
            errors: Vec::new(),
        }
    }

    /// A failed outcome with one or more error descriptions.
    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            id: None,
            success: false,
            errors,
        }
    }
}

/// Answers type-level capability questions.
pub trait TypeDescriptorService {
    /// Whether records of this type may currently be created.
    fn is_createable(&self, entity_type: &EntityType) -> bool;
}

/// Restore points in the backing transaction.
///
/// Must support one call per execution context (the root) plus additional
/// calls by nested instances, each returning a fresh handle.
pub trait CheckpointService {
    /// Create a restore point capturing the current store state.
    fn create(&self) -> Result<CheckpointHandle, StoreError>;

    /// Undo all writes since the handle was created.
    fn rollback(&self, checkpoint: &CheckpointHandle) -> Result<(), StoreError>;
}

/// Grouped persistence calls.
///
/// Each call returns exactly one [`WriteOutcome`] per input record, in input
/// order.
pub trait BatchWriteService {
    /// Insert a group of records.
    fn insert(
        &self,
        records: Vec<InsertRecord>,
        options: &WriteOptions,
    ) -> Result<Vec<WriteOutcome>, StoreError>;

    /// Update a group of persisted records.
    fn update(
        &self,
        records: Vec<UpdateRecord>,
        options: &WriteOptions,
    ) -> Result<Vec<WriteOutcome>, StoreError>;

    /// Delete a group of persisted records.
    fn delete(&self, records: Vec<DeleteRecord>) -> Result<Vec<WriteOutcome>, StoreError>;
}

/// The bundle of store-facing services handed to an orchestration instance.
///
/// Service handles are reference-counted so nested instances can share one
/// backend; the engine is single-threaded, so no `Send`/`Sync` bounds.
#[derive(Clone)]
pub struct Services {
    /// Type capability checks.
    pub descriptors: Rc<dyn TypeDescriptorService>,
    /// Checkpoint protocol.
    pub checkpoints: Rc<dyn CheckpointService>,
    /// Grouped writes.
    pub writes: Rc<dyn BatchWriteService>,
}

impl Services {
    /// Bundle three independent service implementations.
    pub fn from_parts(
        descriptors: Rc<dyn TypeDescriptorService>,
        checkpoints: Rc<dyn CheckpointService>,
        writes: Rc<dyn BatchWriteService>,
    ) -> Self {
        Self {
            descriptors,
            checkpoints,
            writes,
        }
    }

    /// Bundle one backend that implements all three services.
    pub fn from_backend<B>(backend: Rc<B>) -> Self
    where
        B: TypeDescriptorService + CheckpointService + BatchWriteService + 'static,
    {
        Self {
            descriptors: backend.clone(),
            checkpoints: backend.clone(),
            writes: backend,
        }
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
