// src/models/credential.rs
//! Credentials: hashed, selectively-disclosable commitments to a claim.
//!
//! A credential is derived deterministically and one-way from a claim.
//! Every field value receives its own commitment hash, salted with a
//! fresh random nonce, so individual fields can later be disclosed (value
//! plus nonce) without revealing the rest. The root hash commits to the
//! ordered set of field hashes and nothing else.
//!
//! Reproducibility is the load-bearing invariant: recomputing a field
//! hash from `(value, nonce, schema hash)` or the root hash from the
//! field hashes must reproduce the stored value bit for bit, since the
//! attester performs exactly that recomputation.

use std::collections::BTreeMap;

use rand::RngCore;
use ring::digest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::claim::Claim;

/// A hashed, selectively-disclosable commitment to a [`Claim`], in the
/// wire shape the attester consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub claim: Claim,

    /// Per-field salt, keyed by field name. Fresh for every construction;
    /// nonces are never reused across credentials.
    pub claim_nonce_map: BTreeMap<String, String>,

    /// Per-field commitment hashes, ordered by field name.
    pub claim_hashes: Vec<String>,

    /// Commitment over `claim_hashes` alone.
    pub root_hash: String,

    /// Credentials legitimating this one. Always empty for this device.
    pub legitimations: Vec<Credential>,

    /// Delegation node, unused by this device.
    pub delegation_id: Option<String>,
}

impl Credential {
    /// Derives a credential from a claim, drawing a fresh nonce per field.
    ///
    /// Constructing twice from the same claim intentionally yields two
    /// different credentials; idempotence exists at the claim level only.
    pub fn from_claim(claim: Claim) -> Credential {
        let claim_nonce_map: BTreeMap<String, String> = claim
            .contents
            .keys()
            .map(|field| (field.clone(), fresh_nonce()))
            .collect();

        let claim_hashes: Vec<String> = claim
            .contents
            .iter()
            .map(|(field, value)| {
                field_hash(&claim.ctype_hash, field, value, &claim_nonce_map[field])
            })
            .collect();

        let root_hash = root_hash(&claim_hashes);

        Credential {
            claim,
            claim_nonce_map,
            claim_hashes,
            root_hash,
            legitimations: Vec::new(),
            delegation_id: None,
        }
    }

    /// Recomputes every commitment from the stored claim and nonce map and
    /// checks the result against the stored hashes. Used by tests and by
    /// callers that cache credentials across restarts.
    pub fn verify_integrity(&self) -> bool {
        let recomputed: Vec<String> = self
            .claim
            .contents
            .iter()
            .filter_map(|(field, value)| {
                let nonce = self.claim_nonce_map.get(field)?;
                Some(field_hash(&self.claim.ctype_hash, field, value, nonce))
            })
            .collect();

        recomputed == self.claim_hashes && root_hash(&self.claim_hashes) == self.root_hash
    }
}

/// Commitment hash of a single field: SHA-256 over the nonce and the
/// canonical JSON statement `{"cTypeHash":…,"field":…,"value":…}`.
/// Canonical means object keys in lexicographic order, which
/// `serde_json`'s default map representation already guarantees.
pub fn field_hash(ctype_hash: &str, field: &str, value: &Value, nonce: &str) -> String {
    let statement = serde_json::json!({
        "cTypeHash": ctype_hash,
        "field": field,
        "value": value,
    });
    let canonical = statement.to_string();

    let mut context = digest::Context::new(&digest::SHA256);
    context.update(nonce.as_bytes());
    context.update(canonical.as_bytes());
    prefixed_hex(context.finish().as_ref())
}

/// Root commitment: SHA-256 over the concatenated field-hash bytes, in
/// order. A function of the field hashes only.
///
/// [`field_hash`] only ever produces hex; a non-hex entry means the hash
/// list was tampered with or corrupted in transit. Such an entry is
/// hashed as its raw bytes, so the resulting root cannot collide with
/// the root of the list without it.
pub fn root_hash(claim_hashes: &[String]) -> String {
    let mut context = digest::Context::new(&digest::SHA256);
    for hash in claim_hashes {
        match hex::decode(hash.trim_start_matches("0x")) {
            Ok(bytes) => context.update(&bytes),
            Err(_) => {
                log::warn!("claim hash {:?} is not hex", hash);
                context.update(hash.as_bytes());
            }
        }
    }
    prefixed_hex(context.finish().as_ref())
}

fn prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// 128-bit random nonce, hex-encoded.
fn fresh_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
