//! engine
//!
//! The orchestration engine: registration, ordering, batch execution, and
//! transaction coordination.
//!
//! # Architecture
//!
//! One commit flows through the components in a fixed order:
//!
//! 1. **Registry** ([`registry`]): entities staged for insert/update/delete
//! 2. **Relationships** ([`relations`]): pending foreign-key assignments,
//!    which derive the type dependency graph
//! 3. **Resolution** ([`crate::core::graph`]): dependency-correct insertion
//!    order; cycles abort before any write
//! 4. **Execution** ([`exec`]): backfill + grouped writes, phase by phase,
//!    collecting failures instead of stopping
//! 5. **Coordination** ([`convoy`]): the commit state machine, the
//!    checkpoint/rollback protocol across the [`context`], and the final
//!    aggregate raise
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use convoy::core::entity::Entity;
//! use convoy::core::types::{EntityType, FieldName};
//! use convoy::engine::Convoy;
//! use convoy::store::{MemoryStore, Services, StoreSchema, TypeSchema};
//! use serde_json::json;
//!
//! let account_type = EntityType::new("Account").unwrap();
//! let contact_type = EntityType::new("Contact").unwrap();
//! let store = Rc::new(MemoryStore::new(
//!     StoreSchema::new()
//!         .with_type(TypeSchema::new(account_type.clone()))
//!         .with_type(TypeSchema::new(contact_type.clone())),
//! ));
//!
//! let mut convoy = Convoy::new(Services::from_backend(store.clone()));
//! let account = Entity::new(account_type);
//! account.set(FieldName::new("Name").unwrap(), json!("Acme"));
//! let contact = Entity::new(contact_type);
//! convoy.register_new(&account).unwrap();
//! convoy.register_new(&contact).unwrap();
//! convoy.register_relationship(&contact, FieldName::new("AccountId").unwrap(), &account);
//!
//! let report = convoy.commit().unwrap();
//! assert_eq!(report.inserted, 2);
//! // The contact's foreign key now carries the account's generated id.
//! assert_eq!(
//!     contact.get(&FieldName::new("AccountId").unwrap()),
//!     Some(json!(account.id().unwrap().as_str())),
//! );
//! ```

pub mod context;
pub mod convoy;
pub mod error;
pub mod exec;
pub mod hooks;
pub mod registry;
pub mod relations;

pub use context::ExecutionContext;
pub use convoy::{CommitReport, Convoy, ConvoyState};
pub use error::{
    AggregateError, CommitError, DependencyError, ItemFailure, PersistenceError, ValidationError,
};
pub use exec::OperationResult;
pub use hooks::{CommittedObserver, Hooks, PostCommitHook, PreCommitCheck};
pub use registry::EntityRegistry;
pub use relations::{PendingRelationship, RelationshipBook};
