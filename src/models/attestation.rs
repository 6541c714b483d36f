// src/models/attestation.rs
//! Attestation records as owned and mutated by the external attester.
//!
//! The core only ever reads these. A record is created unapproved when a
//! claim is submitted, may become approved at any later point (or never),
//! and may be revoked only after approval. Pending duration is unbounded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::credential::Credential;
use crate::models::schema::CTYPE_ID_PREFIX;

/// One attestation record, as returned by `GET /credential`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationRecord {
    pub id: String,
    pub approved: bool,
    pub revoked: bool,

    /// Operator-side "will approve" marker, informational only.
    #[serde(default)]
    pub marked_approve: bool,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub ctype_hash: Option<String>,

    pub credential: Credential,

    /// DID of the claimer the attester recorded.
    #[serde(default)]
    pub claimer: Option<String>,

    /// Ledger transaction state, attester-internal.
    #[serde(default)]
    pub tx_state: Option<i64>,
}

impl AttestationRecord {
    /// Full schema id of the credential inside this record, in the
    /// `kilt:ctype:0x…` form used for matching against a target schema.
    pub fn schema_id(&self) -> String {
        format!("{}{}", CTYPE_ID_PREFIX, self.credential.claim.ctype_hash)
    }
}

/// Three-state attestation status per schema, derived from the records
/// of the last poll and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationStatus {
    /// No approved record exists yet; the wait is unbounded.
    Pending,
    /// An approved, non-revoked record exists.
    Attested,
    /// The approved record was revoked after approval.
    Revoked,
}

impl std::fmt::Display for AttestationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AttestationStatus::Pending => "pending",
            AttestationStatus::Attested => "attested",
            AttestationStatus::Revoked => "revoked",
        };
        f.write_str(label)
    }
}
