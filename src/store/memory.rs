//! store::memory
//!
//! Deterministic in-memory store.
//!
//! # Design
//!
//! `MemoryStore` implements all three store services against plain maps. It
//! exists for tests and demos, so determinism beats sophistication:
//!
//! - identifiers are sequential (`account-1`, `contact-2`, ...), assigned in
//!   request order from one store-wide counter
//! - checkpoints are full snapshots of the table map; rollback restores the
//!   snapshot (including the id counter) and consumes the handle
//! - failure scenarios are scriptable per call kind via [`FailOn`]
//!
//! Insert validation is schema-driven: unknown types fail the record, and
//! missing required fields fail it with
//! `required fields are missing: [A, B]` listing the fields in schema order.
//!
//! Interior mutability keeps the service traits `&self`-based; the engine is
//! single-threaded, so a `RefCell` suffices.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use super::schema::StoreSchema;
use super::traits::{
    BatchWriteService, CheckpointHandle, CheckpointService, DeleteRecord, InsertRecord,
    StoreError, TypeDescriptorService, UpdateRecord, WriteOptions, WriteOutcome,
};
use crate::core::types::{EntityId, EntityType, FieldName};

type Fields = BTreeMap<FieldName, Value>;
type Tables = BTreeMap<EntityType, BTreeMap<EntityId, Fields>>;

/// Configuration for which call kind should fail wholesale.
///
/// The configured call returns `StoreError::Backend` until cleared, which is
/// how tests exercise the engine's phase-scoped failure handling.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail insert calls with the given message.
    Insert(String),
    /// Fail update calls with the given message.
    Update(String),
    /// Fail delete calls with the given message.
    Delete(String),
}

#[derive(Debug, Default)]
struct MemoryInner {
    tables: Tables,
    snapshots: HashMap<CheckpointHandle, (Tables, u64)>,
    next_id: u64,
    fail_on: Option<FailOn>,
}

/// Deterministic in-memory implementation of the store services.
#[derive(Debug)]
pub struct MemoryStore {
    schema: StoreSchema,
    inner: RefCell<MemoryInner>,
}

impl MemoryStore {
    /// Create an empty store over the given schema.
    pub fn new(schema: StoreSchema) -> Self {
        Self {
            schema,
            inner: RefCell::new(MemoryInner::default()),
        }
    }

    /// The schema this store enforces.
    pub fn schema(&self) -> &StoreSchema {
        &self.schema
    }

    /// Script the next calls of one kind to fail wholesale.
    pub fn set_fail_on(&self, fail_on: FailOn) {
        self.inner.borrow_mut().fail_on = Some(fail_on);
    }

    /// Clear any scripted failure.
    pub fn clear_fail_on(&self) {
        self.inner.borrow_mut().fail_on = None;
    }

    /// Number of stored records of a type.
    pub fn count(&self, entity_type: &EntityType) -> usize {
        self.inner
            .borrow()
            .tables
            .get(entity_type)
            .map_or(0, BTreeMap::len)
    }

    /// Total number of stored records across all types.
    pub fn total_records(&self) -> usize {
        self.inner
            .borrow()
            .tables
            .values()
            .map(BTreeMap::len)
            .sum()
    }

    /// Snapshot of one stored record's fields.
    pub fn record(&self, entity_type: &EntityType, id: &EntityId) -> Option<Fields> {
        self.inner
            .borrow()
            .tables
            .get(entity_type)
            .and_then(|table| table.get(id))
            .cloned()
    }

    /// One field of one stored record.
    pub fn field(&self, entity_type: &EntityType, id: &EntityId, field: &FieldName) -> Option<Value> {
        self.record(entity_type, id)
            .and_then(|fields| fields.get(field).cloned())
    }

    fn generate_id(inner: &mut MemoryInner, entity_type: &EntityType) -> EntityId {
        inner.next_id += 1;
        let raw = format!("{}-{}", entity_type.as_str().to_ascii_lowercase(), inner.next_id);
        EntityId::new(raw).expect("generated ids are always valid")
    }

    /// Validate one insert record; `Err` carries the record's error messages.
    fn validate_insert(&self, record: &InsertRecord) -> Result<(), Vec<String>> {
        let Some(type_schema) = self.schema.type_schema(&record.entity_type) else {
            return Err(vec![format!("unknown entity type: {}", record.entity_type)]);
        };

        let missing: Vec<&str> = type_schema
            .required
            .iter()
            .filter(|field| {
                matches!(record.fields.get(*field), None | Some(Value::Null))
            })
            .map(FieldName::as_str)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(vec![format!(
                "required fields are missing: [{}]",
                missing.join(", ")
            )])
        }
    }
}

const ALL_OR_NONE_ROLLBACK: &str = "transaction rolled back because all-or-none was specified";

impl TypeDescriptorService for MemoryStore {
    fn is_createable(&self, entity_type: &EntityType) -> bool {
        self.schema
            .type_schema(entity_type)
            .is_some_and(|t| t.createable)
    }
}

impl CheckpointService for MemoryStore {
    fn create(&self) -> Result<CheckpointHandle, StoreError> {
        let mut inner = self.inner.borrow_mut();
        let handle = CheckpointHandle::new();
        let snapshot = (inner.tables.clone(), inner.next_id);
        inner.snapshots.insert(handle.clone(), snapshot);
        Ok(handle)
    }

    fn rollback(&self, checkpoint: &CheckpointHandle) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        let (tables, next_id) = inner
            .snapshots
            .remove(checkpoint)
            .ok_or_else(|| StoreError::UnknownCheckpoint(checkpoint.clone()))?;
        inner.tables = tables;
        inner.next_id = next_id;
        Ok(())
    }
}

impl BatchWriteService for MemoryStore {
    fn insert(
        &self,
        records: Vec<InsertRecord>,
        options: &WriteOptions,
    ) -> Result<Vec<WriteOutcome>, StoreError> {
        if let Some(FailOn::Insert(message)) = &self.inner.borrow().fail_on {
            return Err(StoreError::Backend(message.clone()));
        }

        let validations: Vec<Result<(), Vec<String>>> =
            records.iter().map(|r| self.validate_insert(r)).collect();

        if options.all_or_none && validations.iter().any(Result::is_err) {
            return Ok(validations
                .into_iter()
                .map(|v| match v {
                    Ok(()) => WriteOutcome::failed(vec![ALL_OR_NONE_ROLLBACK.to_string()]),
                    Err(errors) => WriteOutcome::failed(errors),
                })
                .collect());
        }

        let mut inner = self.inner.borrow_mut();
        let outcomes = records
            .into_iter()
            .zip(validations)
            .map(|(record, validation)| match validation {
                Ok(()) => {
                    let id = Self::generate_id(&mut inner, &record.entity_type);
                    inner
                        .tables
                        .entry(record.entity_type)
                        .or_default()
                        .insert(id.clone(), record.fields);
                    WriteOutcome::applied(id)
                }
                Err(errors) => WriteOutcome::failed(errors),
            })
            .collect();

        Ok(outcomes)
    }

    fn update(
        &self,
        records: Vec<UpdateRecord>,
        options: &WriteOptions,
    ) -> Result<Vec<WriteOutcome>, StoreError> {
        if let Some(FailOn::Update(message)) = &self.inner.borrow().fail_on {
            return Err(StoreError::Backend(message.clone()));
        }

        let mut inner = self.inner.borrow_mut();

        let exists = |inner: &MemoryInner, record: &UpdateRecord| {
            inner
                .tables
                .get(&record.entity_type)
                .is_some_and(|table| table.contains_key(&record.id))
        };

        if options.all_or_none && !records.iter().all(|r| exists(&inner, r)) {
            return Ok(records
                .iter()
                .map(|record| {
                    if exists(&inner, record) {
                        WriteOutcome::failed(vec![ALL_OR_NONE_ROLLBACK.to_string()])
                    } else {
                        WriteOutcome::failed(vec![format!("record not found: {}", record.id)])
                    }
                })
                .collect());
        }

        let outcomes = records
            .into_iter()
            .map(|record| {
                if !exists(&inner, &record) {
                    return WriteOutcome::failed(vec![format!("record not found: {}", record.id)]);
                }
                let stored = inner
                    .tables
                    .get_mut(&record.entity_type)
                    .and_then(|table| table.get_mut(&record.id))
                    .expect("existence checked above");
                stored.extend(record.fields);
                WriteOutcome::applied(record.id)
            })
            .collect();

        Ok(outcomes)
    }

    fn delete(&self, records: Vec<DeleteRecord>) -> Result<Vec<WriteOutcome>, StoreError> {
        if let Some(FailOn::Delete(message)) = &self.inner.borrow().fail_on {
            return Err(StoreError::Backend(message.clone()));
        }

        let mut inner = self.inner.borrow_mut();
        let outcomes = records
            .into_iter()
            .map(|record| {
                let removed = inner
                    .tables
                    .get_mut(&record.entity_type)
                    .and_then(|table| table.remove(&record.id));
                match removed {
                    Some(_) => WriteOutcome::applied(record.id),
                    None => WriteOutcome::failed(vec![format!("record not found: {}", record.id)]),
                }
            })
            .collect();

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::TypeSchema;
    use serde_json::json;

    fn t(name: &str) -> EntityType {
        EntityType::new(name).unwrap()
    }

    fn f(name: &str) -> FieldName {
        FieldName::new(name).unwrap()
    }

    fn store() -> MemoryStore {
        MemoryStore::new(
            StoreSchema::new()
                .with_type(TypeSchema::new(t("Account")).require(f("Name")))
                .with_type(TypeSchema::new(t("Contact")))
                .with_type(TypeSchema::new(t("AuditEntry")).not_createable()),
        )
    }

    fn insert_account(store: &MemoryStore, name: &str) -> EntityId {
        let outcomes = store
            .insert(
                vec![InsertRecord {
                    entity_type: t("Account"),
                    fields: BTreeMap::from([(f("Name"), json!(name))]),
                }],
                &WriteOptions::default(),
            )
            .unwrap();
        outcomes[0].id.clone().unwrap()
    }

    mod descriptors {
        use super::*;

        #[test]
        fn createable_follows_schema() {
            let store = store();
            assert!(store.is_createable(&t("Account")));
            assert!(!store.is_createable(&t("AuditEntry")));
            assert!(!store.is_createable(&t("Unknown")));
        }
    }

    mod insert {
        use super::*;

        #[test]
        fn assigns_sequential_typed_ids() {
            let store = store();
            let a = insert_account(&store, "First");
            let b = insert_account(&store, "Second");

            assert_eq!(a.as_str(), "account-1");
            assert_eq!(b.as_str(), "account-2");
            assert_eq!(store.count(&t("Account")), 2);
        }

        #[test]
        fn missing_required_field_fails_the_record() {
            let store = store();
            let outcomes = store
                .insert(
                    vec![InsertRecord {
                        entity_type: t("Account"),
                        fields: BTreeMap::new(),
                    }],
                    &WriteOptions::default(),
                )
                .unwrap();

            assert!(!outcomes[0].success);
            assert_eq!(
                outcomes[0].errors,
                vec!["required fields are missing: [Name]".to_string()]
            );
            assert_eq!(store.count(&t("Account")), 0);
        }

        #[test]
        fn null_counts_as_missing() {
            let store = store();
            let outcomes = store
                .insert(
                    vec![InsertRecord {
                        entity_type: t("Account"),
                        fields: BTreeMap::from([(f("Name"), Value::Null)]),
                    }],
                    &WriteOptions::default(),
                )
                .unwrap();
            assert!(!outcomes[0].success);
        }

        #[test]
        fn unknown_type_fails_the_record() {
            let store = store();
            let outcomes = store
                .insert(
                    vec![InsertRecord {
                        entity_type: t("Mystery"),
                        fields: BTreeMap::new(),
                    }],
                    &WriteOptions::default(),
                )
                .unwrap();
            assert!(!outcomes[0].success);
            assert_eq!(outcomes[0].errors, vec!["unknown entity type: Mystery".to_string()]);
        }

        #[test]
        fn bad_record_does_not_stop_the_rest() {
            let store = store();
            let outcomes = store
                .insert(
                    vec![
                        InsertRecord {
                            entity_type: t("Account"),
                            fields: BTreeMap::new(),
                        },
                        InsertRecord {
                            entity_type: t("Account"),
                            fields: BTreeMap::from([(f("Name"), json!("Good"))]),
                        },
                    ],
                    &WriteOptions::default(),
                )
                .unwrap();

            assert!(!outcomes[0].success);
            assert!(outcomes[1].success);
            assert_eq!(store.count(&t("Account")), 1);
        }

        #[test]
        fn all_or_none_applies_nothing_on_any_failure() {
            let store = store();
            let outcomes = store
                .insert(
                    vec![
                        InsertRecord {
                            entity_type: t("Account"),
                            fields: BTreeMap::from([(f("Name"), json!("Good"))]),
                        },
                        InsertRecord {
                            entity_type: t("Account"),
                            fields: BTreeMap::new(),
                        },
                    ],
                    &WriteOptions { all_or_none: true },
                )
                .unwrap();

            assert!(outcomes.iter().all(|o| !o.success));
            assert_eq!(store.count(&t("Account")), 0);
        }

        #[test]
        fn scripted_failure_fails_the_whole_call() {
            let store = store();
            store.set_fail_on(FailOn::Insert("backend offline".to_string()));
            let err = store
                .insert(Vec::new(), &WriteOptions::default())
                .unwrap_err();
            assert!(matches!(err, StoreError::Backend(_)));

            store.clear_fail_on();
            assert!(store.insert(Vec::new(), &WriteOptions::default()).is_ok());
        }
    }

    mod update {
        use super::*;

        #[test]
        fn merges_fields_into_stored_record() {
            let store = store();
            let id = insert_account(&store, "Before");

            let outcomes = store
                .update(
                    vec![UpdateRecord {
                        id: id.clone(),
                        entity_type: t("Account"),
                        fields: BTreeMap::from([(f("Rating"), json!("Hot"))]),
                    }],
                    &WriteOptions::default(),
                )
                .unwrap();

            assert!(outcomes[0].success);
            assert_eq!(store.field(&t("Account"), &id, &f("Name")), Some(json!("Before")));
            assert_eq!(store.field(&t("Account"), &id, &f("Rating")), Some(json!("Hot")));
        }

        #[test]
        fn unknown_record_fails_with_not_found() {
            let store = store();
            let outcomes = store
                .update(
                    vec![UpdateRecord {
                        id: EntityId::new("account-99").unwrap(),
                        entity_type: t("Account"),
                        fields: BTreeMap::new(),
                    }],
                    &WriteOptions::default(),
                )
                .unwrap();
            assert!(!outcomes[0].success);
            assert_eq!(outcomes[0].errors, vec!["record not found: account-99".to_string()]);
        }
    }

    mod delete {
        use super::*;

        #[test]
        fn removes_the_record() {
            let store = store();
            let id = insert_account(&store, "Doomed");

            let outcomes = store
                .delete(vec![DeleteRecord {
                    id: id.clone(),
                    entity_type: t("Account"),
                }])
                .unwrap();

            assert!(outcomes[0].success);
            assert_eq!(store.count(&t("Account")), 0);
        }

        #[test]
        fn unknown_record_fails_with_not_found() {
            let store = store();
            let outcomes = store
                .delete(vec![DeleteRecord {
                    id: EntityId::new("account-1").unwrap(),
                    entity_type: t("Account"),
                }])
                .unwrap();
            assert!(!outcomes[0].success);
        }
    }

    mod checkpoints {
        use super::*;

        #[test]
        fn rollback_restores_tables_and_ids() {
            let store = store();
            insert_account(&store, "Kept");
            let checkpoint = store.create().unwrap();
            insert_account(&store, "Discarded");
            assert_eq!(store.count(&t("Account")), 2);

            store.rollback(&checkpoint).unwrap();
            assert_eq!(store.count(&t("Account")), 1);

            // The id counter rewinds with the snapshot.
            let id = insert_account(&store, "Again");
            assert_eq!(id.as_str(), "account-2");
        }

        #[test]
        fn handles_are_single_use() {
            let store = store();
            let checkpoint = store.create().unwrap();
            store.rollback(&checkpoint).unwrap();
            let err = store.rollback(&checkpoint).unwrap_err();
            assert!(matches!(err, StoreError::UnknownCheckpoint(_)));
        }

        #[test]
        fn nested_checkpoints_rollback_independently() {
            let store = store();
            let outer = store.create().unwrap();
            insert_account(&store, "First");
            let inner = store.create().unwrap();
            insert_account(&store, "Second");

            store.rollback(&inner).unwrap();
            assert_eq!(store.count(&t("Account")), 1);

            store.rollback(&outer).unwrap();
            assert_eq!(store.count(&t("Account")), 0);
        }
    }
}
