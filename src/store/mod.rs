//! store
//!
//! The backing-store boundary and its in-memory reference implementation.
//!
//! The engine never talks to a concrete store: it consumes the three service
//! traits in [`traits`] and exchanges only plain record/outcome data. Any
//! transactional backend can sit behind them; [`memory`] provides the
//! deterministic one used by tests and demos, configured by [`schema`].

pub mod memory;
pub mod schema;
pub mod traits;

pub use memory::{FailOn, MemoryStore};
pub use schema::{SchemaError, StoreSchema, TypeSchema, SCHEMA_VERSION};
pub use traits::{
    BatchWriteService, CheckpointHandle, CheckpointService, DeleteRecord, InsertRecord, Services,
    StoreError, TypeDescriptorService, UpdateRecord, WriteOptions, WriteOutcome,
};
