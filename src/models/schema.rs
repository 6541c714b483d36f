// src/models/schema.rs
//! Published claim schemas ("CTypes") and the registry over them.
//!
//! A schema is identified by a content-hash-derived id of the form
//! `kilt:ctype:0x…`. Schemas are immutable and loaded once at process start
//! from JSON embedded in the binary, so their ids match what the attester
//! has published. The registry is pure: no I/O happens after startup.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Prefix joining a schema id to the raw content hash carried in claims.
pub const CTYPE_ID_PREFIX: &str = "kilt:ctype:";

/// Type and optional format of a single declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySpec {
    /// JSON-schema primitive type, `"string"` or `"number"`.
    #[serde(rename = "type")]
    pub type_: String,

    /// Optional format hint, e.g. `"date"`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub format: Option<String>,
}

impl PropertySpec {
    /// Whether values of this field must be numerically coerced before
    /// they are bound into a claim.
    pub fn is_number(&self) -> bool {
        self.type_ == "number"
    }
}

/// A published, content-addressed schema constraining a claim's field
/// names and types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// Content-hash-derived identifier, `kilt:ctype:0x…`.
    #[serde(rename = "$id")]
    pub id: String,

    /// Meta-schema the descriptor itself conforms to.
    #[serde(rename = "$schema")]
    pub meta_schema: String,

    /// Human-readable document type, e.g. "DIVE Anlagezertifikat".
    pub title: String,

    #[serde(rename = "type")]
    pub type_: String,

    /// Declared fields. A claim's content keys must be a subset of these.
    pub properties: BTreeMap<String, PropertySpec>,

    /// Always `false` for published schemas: undeclared keys are rejected.
    #[serde(rename = "additionalProperties")]
    pub additional_properties: bool,
}

impl SchemaDescriptor {
    /// The raw content hash without the `kilt:ctype:` prefix, as carried
    /// in a claim's `cTypeHash` field.
    pub fn ctype_hash(&self) -> &str {
        self.id.strip_prefix(CTYPE_ID_PREFIX).unwrap_or(&self.id)
    }
}

/// Lookup table over all schemas this device knows how to claim against.
pub struct SchemaRegistry {
    schemas: Vec<SchemaDescriptor>,
}

impl SchemaRegistry {
    fn from_embedded() -> Self {
        let sources = [
            include_str!("../schemas/installation_certificate.json"),
            include_str!("../schemas/self_declaration.json"),
        ];
        let schemas = sources
            .iter()
            .map(|raw| serde_json::from_str(raw).expect("embedded schema must be valid JSON"))
            .collect();
        SchemaRegistry { schemas }
    }

    /// Resolves a schema by its full `kilt:ctype:…` id.
    ///
    /// An unknown id is a caller misconfiguration and surfaces as
    /// [`Error::UnknownSchema`]; it is never retryable.
    pub fn lookup(&self, schema_id: &str) -> Result<&SchemaDescriptor> {
        self.schemas
            .iter()
            .find(|schema| schema.id == schema_id)
            .ok_or_else(|| Error::UnknownSchema(schema_id.to_string()))
    }

    /// The installation-certificate schema, attested by the external attester.
    pub fn installation_certificate(&self) -> &SchemaDescriptor {
        &self.schemas[0]
    }

    /// The self-declaration schema, issued through the operator's wallet.
    pub fn self_declaration(&self) -> &SchemaDescriptor {
        &self.schemas[1]
    }

    /// All known schemas.
    pub fn all(&self) -> &[SchemaDescriptor] {
        &self.schemas
    }
}

static REGISTRY: Lazy<SchemaRegistry> = Lazy::new(SchemaRegistry::from_embedded);

/// Process-wide schema registry, built on first use.
pub fn registry() -> &'static SchemaRegistry {
    &REGISTRY
}
