// src/models/mod.rs
//! Data structures of the issuance protocol: published schemas, claims,
//! credentials and attester records.

pub mod attestation;
pub mod claim;
pub mod credential;
pub mod schema;

pub use attestation::{AttestationRecord, AttestationStatus};
pub use claim::Claim;
pub use credential::Credential;
pub use schema::{registry, PropertySpec, SchemaDescriptor, SchemaRegistry};
