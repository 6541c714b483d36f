// src/services/issuance.rs
//! The two claim submission paths.
//!
//! *Device-attested*: the credential goes straight to the attester via
//! `POST /claim`; approval happens out of band and is observed by the
//! attestation tracker.
//!
//! *Self-issued*: the claim's issuance terms come from the attester, are
//! delivered to the operator's wallet over a negotiated session channel,
//! and the extension's reply finalizes the issuance. The three steps are
//! strictly ordered; a failed terms request never reaches the extension.

use crate::api::BackendClient;
use crate::error::Result;
use crate::extension::WalletChannel;
use crate::models::claim::Claim;
use crate::models::credential::Credential;

/// Drives claim submission against the attester.
pub struct IssuanceClient<'a> {
    client: &'a BackendClient,
}

impl<'a> IssuanceClient<'a> {
    pub fn new(client: &'a BackendClient) -> Self {
        IssuanceClient { client }
    }

    /// Submits a credential for attester approval and returns the stored,
    /// still-unapproved claim for local display.
    pub async fn submit_device_claim(&self, credential: &Credential) -> Result<Claim> {
        let stored = self.client.post_claim(credential).await?;
        log::info!(
            "claim registered for schema 0x…{}, awaiting approval",
            tail(&stored.ctype_hash)
        );
        Ok(stored)
    }

    /// Runs the self-issued exchange over an already negotiated channel.
    ///
    /// Waits for exactly one reply from the extension; the first message
    /// wins. The wait has no client-enforced timeout. Abandoning the
    /// surrounding flow cancels the wait by dropping this future; the
    /// protocol defines no cancellation message to the extension.
    pub async fn request_self_issued(
        &self,
        channel: &dyn WalletChannel,
        claim: &Claim,
    ) -> Result<()> {
        let terms = self.client.request_terms(claim).await?;
        log::debug!("issuance terms received, delivering to extension");

        // The first reply wins. A reply landing before the wait below
        // begins must be buffered by the channel (see
        // [`WalletChannel::listen`]).
        let reply_future = channel.listen();
        channel.send(terms).await?;
        let reply = reply_future.await?;
        log::debug!("extension replied, finalizing issuance");

        self.client.submit_credential_request(&reply).await
    }
}

/// Last six characters of a hash for log lines. The hash comes from the
/// attester's response, so char boundaries are not assumed.
fn tail(hash: &str) -> &str {
    let stripped = hash.trim_start_matches("0x");
    match stripped.char_indices().nth_back(5) {
        Some((index, _)) => &stripped[index..],
        None => stripped,
    }
}
