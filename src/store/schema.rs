//! store::schema
//!
//! Schema configuration for the in-memory store.
//!
//! # Format
//!
//! The schema is a versioned TOML document describing the types the store
//! accepts:
//!
//! ```toml
//! version = 1
//!
//! [[types]]
//! name = "Account"
//! required = ["Name"]
//!
//! [[types]]
//! name = "AuditEntry"
//! createable = false
//! ```
//!
//! # Validation
//!
//! Schemas are validated after parsing: the version must be supported and
//! type names must be unique. Unknown keys are rejected at parse time.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{EntityType, FieldName};

/// The schema format version this build reads and writes.
pub const SCHEMA_VERSION: u32 = 1;

fn default_version() -> u32 {
    SCHEMA_VERSION
}

fn default_createable() -> bool {
    true
}

/// Errors from loading or validating a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema file could not be read.
    #[error("schema i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The schema document could not be parsed.
    #[error("schema parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The schema declares an unsupported format version.
    #[error("unsupported schema version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the document.
        found: u32,
        /// Version this build supports.
        supported: u32,
    },

    /// Two type entries share a name.
    #[error("duplicate type in schema: {0}")]
    DuplicateType(EntityType),
}

/// Description of one entity type the store accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeSchema {
    /// The type's name.
    pub name: EntityType,

    /// Whether new records of this type may be created.
    #[serde(default = "default_createable")]
    pub createable: bool,

    /// Fields that must be present and non-null on insert.
    #[serde(default)]
    pub required: Vec<FieldName>,
}

impl TypeSchema {
    /// Describe a createable type with no required fields.
    pub fn new(name: EntityType) -> Self {
        Self {
            name,
            createable: true,
            required: Vec::new(),
        }
    }

    /// Add a required field.
    pub fn require(mut self, field: FieldName) -> Self {
        self.required.push(field);
        self
    }

    /// Mark the type as not createable.
    pub fn not_createable(mut self) -> Self {
        self.createable = false;
        self
    }
}

/// The store's full schema: a set of type descriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSchema {
    /// Schema format version.
    #[serde(default = "default_version")]
    pub version: u32,

    /// The types the store accepts.
    #[serde(default)]
    pub types: Vec<TypeSchema>,
}

impl StoreSchema {
    /// Create an empty schema at the current version.
    pub fn new() -> Self {
        Self {
            version: SCHEMA_VERSION,
            types: Vec::new(),
        }
    }

    /// Add a type description.
    pub fn with_type(mut self, type_schema: TypeSchema) -> Self {
        self.types.push(type_schema);
        self
    }

    /// Parse and validate a schema from a TOML string.
    pub fn from_toml_str(input: &str) -> Result<Self, SchemaError> {
        let schema: StoreSchema = toml::from_str(input)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load and validate a schema from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Validate the schema: supported version, unique type names.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.version != SCHEMA_VERSION {
            return Err(SchemaError::UnsupportedVersion {
                found: self.version,
                supported: SCHEMA_VERSION,
            });
        }

        let mut seen = HashSet::new();
        for type_schema in &self.types {
            if !seen.insert(&type_schema.name) {
                return Err(SchemaError::DuplicateType(type_schema.name.clone()));
            }
        }
        Ok(())
    }

    /// Look up the description of a type.
    pub fn type_schema(&self, entity_type: &EntityType) -> Option<&TypeSchema> {
        self.types.iter().find(|t| &t.name == entity_type)
    }
}

impl Default for StoreSchema {
    fn default() -> Self {
        Self::new()
    }
}
