// src/services/tracker.rs
//! Attestation status polling and classification.
//!
//! Status is observed by polling only. Classification is a pure function
//! of the last poll's records and the target schema id; the tracker keeps
//! no state beyond the last result and re-evaluates from scratch on every
//! poll. The attester is expected to hold at most one approved,
//! non-revoked record per schema; if it ever returns more, the selection
//! is governed by the configured tie-break and the duplicate is logged
//! rather than silently masked.

use crate::api::BackendClient;
use crate::error::Result;
use crate::models::attestation::{AttestationRecord, AttestationStatus};

/// Which approved record wins when the attester returns several for the
/// same schema (e.g. after a re-issuance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// First approved match in response order. Mirrors the attester's
    /// historical contract.
    #[default]
    FirstApproved,
    /// Last approved match in response order.
    LastApproved,
}

/// Pure classification of attestation records against a target schema.
///
/// A record matches when its schema id (`kilt:ctype:<hash>`) equals the
/// target and it is approved. No match is `Pending`; a match is
/// `Attested` or `Revoked` according to its revocation flag.
pub fn classify(
    records: &[AttestationRecord],
    target_schema_id: &str,
    tie_break: TieBreak,
) -> AttestationStatus {
    let matches: Vec<&AttestationRecord> = records
        .iter()
        .filter(|record| record.approved && record.schema_id() == target_schema_id)
        .collect();

    if matches.len() > 1 {
        log::warn!(
            "{} approved attestations for schema {}; applying {:?}",
            matches.len(),
            target_schema_id,
            tie_break
        );
    }

    let selected = match tie_break {
        TieBreak::FirstApproved => matches.first(),
        TieBreak::LastApproved => matches.last(),
    };

    match selected {
        None => AttestationStatus::Pending,
        Some(record) if record.revoked => AttestationStatus::Revoked,
        Some(_) => AttestationStatus::Attested,
    }
}

/// Polls the attester and classifies the result for one schema.
pub struct AttestationTracker<'a> {
    client: &'a BackendClient,
    target_schema_id: String,
    tie_break: TieBreak,
    last: Option<AttestationStatus>,
}

impl<'a> AttestationTracker<'a> {
    pub fn new(client: &'a BackendClient, target_schema_id: impl Into<String>) -> Self {
        AttestationTracker {
            client,
            target_schema_id: target_schema_id.into(),
            tie_break: TieBreak::default(),
            last: None,
        }
    }

    /// Overrides the duplicate-match tie-break.
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Fetches the current records and re-classifies. Absent records (404
    /// or empty body) classify as `Pending`; pending may last arbitrarily
    /// long, and no bound on poll attempts is assumed. The interval
    /// between polls is the caller's.
    pub async fn poll(&mut self) -> Result<AttestationStatus> {
        let records = self.client.get_attestations().await?;
        let status = classify(&records, &self.target_schema_id, self.tie_break);
        log::debug!(
            "attestation status for {}: {} ({} record(s))",
            self.target_schema_id,
            status,
            records.len()
        );
        self.last = Some(status);
        Ok(status)
    }

    /// Result of the most recent poll, if any.
    pub fn last(&self) -> Option<AttestationStatus> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::models::claim::Claim;
    use crate::models::credential::Credential;
    use crate::models::schema::registry;

    fn record(schema_index: usize, approved: bool, revoked: bool) -> AttestationRecord {
        let schema = &registry().all()[schema_index];
        let claim =
            Claim::from_schema_and_contents(schema, [("name", "Alice")], "did:kilt:4abc")
                .or_else(|_| {
                    Claim::from_schema_and_contents(
                        schema,
                        [("Standort", "Musterstadt")],
                        "did:kilt:4abc",
                    )
                })
                .unwrap();
        AttestationRecord {
            id: format!("rec-{}", schema_index),
            approved,
            revoked,
            marked_approve: false,
            created_at: None,
            approved_at: None,
            revoked_at: None,
            deleted_at: None,
            ctype_hash: Some(schema.ctype_hash().to_string()),
            credential: Credential::from_claim(claim),
            claimer: None,
            tx_state: None,
        }
    }

    #[test]
    fn empty_records_classify_as_pending() {
        let target = &registry().self_declaration().id;
        assert_eq!(
            classify(&[], target, TieBreak::default()),
            AttestationStatus::Pending
        );
    }

    #[test]
    fn approved_match_classifies_as_attested() {
        let target = &registry().self_declaration().id;
        let records = vec![record(1, true, false)];
        assert_eq!(
            classify(&records, target, TieBreak::default()),
            AttestationStatus::Attested
        );
    }

    #[test]
    fn revoked_match_classifies_as_revoked() {
        let target = &registry().self_declaration().id;
        let records = vec![record(1, true, true)];
        assert_eq!(
            classify(&records, target, TieBreak::default()),
            AttestationStatus::Revoked
        );
    }

    #[test]
    fn unapproved_or_foreign_records_do_not_match() {
        let target = &registry().self_declaration().id;
        // Unapproved record for the target schema, approved record for
        // the other schema: still pending.
        let records = vec![record(1, false, false), record(0, true, false)];
        assert_eq!(
            classify(&records, target, TieBreak::default()),
            AttestationStatus::Pending
        );
    }

    #[test]
    fn tie_break_selects_among_duplicate_approvals() {
        let target = &registry().self_declaration().id;
        let records = vec![record(1, true, true), record(1, true, false)];

        // First approved match in response order is the revoked one.
        assert_eq!(
            classify(&records, target, TieBreak::FirstApproved),
            AttestationStatus::Revoked
        );
        // The configurable alternative picks the re-issued record.
        assert_eq!(
            classify(&records, target, TieBreak::LastApproved),
            AttestationStatus::Attested
        );
    }

    #[tokio::test]
    async fn tracker_reevaluates_on_every_poll() {
        let mut server = mockito::Server::new_async().await;
        let config = ClientConfig {
            base_url: format!("{}/api/v1", server.url()),
            ..ClientConfig::default()
        };
        let client = BackendClient::new(&config).unwrap();
        let schema = registry().self_declaration();
        let mut tracker = AttestationTracker::new(&client, schema.id.clone());

        let pending = server
            .mock("GET", "/api/v1/credential")
            .with_status(404)
            .create_async()
            .await;
        assert_eq!(tracker.poll().await.unwrap(), AttestationStatus::Pending);
        assert_eq!(tracker.last(), Some(AttestationStatus::Pending));
        drop(pending);

        let body = serde_json::to_string(&vec![record(1, true, false)]).unwrap();
        let _approved = server
            .mock("GET", "/api/v1/credential")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(&body)
            .create_async()
            .await;
        assert_eq!(tracker.poll().await.unwrap(), AttestationStatus::Attested);
        assert_eq!(tracker.last(), Some(AttestationStatus::Attested));
    }
}
