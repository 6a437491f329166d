//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`EntityType`] - Validated entity type name
//! - [`FieldName`] - Validated field name
//! - [`EntityId`] - Store-assigned record identifier
//! - [`OpTag`] - Tag identifying one persistence phase of a commit
//! - [`InstanceId`] - Unique identifier for one orchestration instance
//! - [`UtcTimestamp`] - RFC3339 timestamp
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use convoy::core::types::{EntityType, FieldName, OpTag};
//!
//! let account = EntityType::new("Account").unwrap();
//! let name = FieldName::new("Name").unwrap();
//! assert_eq!(OpTag::insert_of(&account).as_str(), "insert-of-type-Account");
//!
//! // Invalid constructions fail at creation time
//! assert!(EntityType::new("").is_err());
//! assert!(FieldName::new("has space").is_err());
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from type validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid entity type: {0}")]
    InvalidEntityType(String),

    #[error("invalid field name: {0}")]
    InvalidFieldName(String),

    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),
}

/// Shared rules for entity type and field names: non-empty, leading
/// alphabetic character, remaining characters alphanumeric or underscore.
fn validate_identifier(value: &str) -> Result<(), String> {
    let mut chars = value.chars();
    let first = match chars.next() {
        Some(first) => first,
        None => return Err("cannot be empty".into()),
    };
    if !first.is_ascii_alphabetic() {
        return Err(format!("must start with a letter, got '{}'", first));
    }
    if let Some(bad) = chars.find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(format!("contains invalid character '{}'", bad));
    }
    Ok(())
}

/// A validated entity type name.
///
/// Identifies a record's schema/type at runtime. Every entity handle and
/// every record crossing the store boundary carries one.
///
/// # Example
///
/// ```
/// use convoy::core::types::EntityType;
///
/// let account = EntityType::new("Account").unwrap();
/// assert_eq!(account.as_str(), "Account");
///
/// assert!(EntityType::new("").is_err());
/// assert!(EntityType::new("9Lives").is_err());
/// assert!(EntityType::new("bad type").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityType(String);

impl EntityType {
    /// Create a new validated entity type name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidEntityType` if the name is empty, does not
    /// start with a letter, or contains characters outside `[A-Za-z0-9_]`.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        validate_identifier(&name).map_err(TypeError::InvalidEntityType)?;
        Ok(Self(name))
    }

    /// Get the type name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EntityType {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.0
    }
}

/// A validated field name.
///
/// Same rules as [`EntityType`]: non-empty, leading letter, then
/// alphanumerics and underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldName(String);

impl FieldName {
    /// Create a new validated field name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidFieldName` if the name violates the
    /// identifier rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        validate_identifier(&name).map_err(TypeError::InvalidFieldName)?;
        Ok(Self(name))
    }

    /// Get the field name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for FieldName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FieldName> for String {
    fn from(value: FieldName) -> Self {
        value.0
    }
}

/// A store-assigned record identifier.
///
/// Absent on an entity until the store persists it. The store owns the
/// format; the engine only requires identifiers to be non-empty and free of
/// whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Create a new validated entity id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidEntityId` if the id is empty or contains
    /// whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::InvalidEntityId("cannot be empty".into()));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidEntityId(format!(
                "cannot contain whitespace: '{}'",
                id
            )));
        }
        Ok(Self(id))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EntityId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityId> for String {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

/// Tag identifying one persistence phase of a commit.
///
/// Per-phase operation results are retained keyed by this tag:
/// one `insert-of-type-{T}` tag per staged type, plus `update` and `delete`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpTag(String);

impl OpTag {
    /// Tag for the grouped insert of one entity type.
    pub fn insert_of(entity_type: &EntityType) -> Self {
        Self(format!("insert-of-type-{}", entity_type))
    }

    /// Tag for the grouped update batch.
    pub fn update() -> Self {
        Self("update".to_string())
    }

    /// Tag for the grouped delete batch.
    pub fn delete() -> Self {
        Self("delete".to_string())
    }

    /// Get the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for one orchestration instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(String);

impl InstanceId {
    /// Generate a new unique instance id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An RFC3339 UTC timestamp.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtcTimestamp(DateTime<Utc>);

impl UtcTimestamp {
    /// Capture the current time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Render as an RFC3339 string.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}
