// src/api/client.rs
//! Typed client over the issuer service's HTTP JSON API.
//!
//! Two response conventions coexist and are kept strictly apart:
//! - absent state: 404 (and, for the payment address, any non-200) means
//!   "nothing there yet" and resolves to `None` or an empty vector;
//! - protocol violations: unexpected statuses on the challenge, terms and
//!   finalization endpoints are fatal to the current operation and carry
//!   the response body as context.
//!
//! DID creation, extrinsic submission and issuance finalization block
//! until ledger confirmation, which legitimately exceeds any sane HTTP
//! timeout; those calls run on a dedicated client with no timeout at all.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::attestation::AttestationRecord;
use crate::models::claim::Claim;
use crate::models::credential::Credential;

/// Challenge triple handed to the extension provider during the session
/// handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    #[serde(rename = "dAppName")]
    pub dapp_name: String,
    #[serde(rename = "dAppEncryptionKeyUri")]
    pub dapp_encryption_key_uri: String,
    pub challenge: String,
}

/// Assignment of the device to an external use case. At most one use case
/// is active at a time, enforced server-side by a conflict token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseCaseConfig {
    pub use_case_did_url: String,
    pub use_case_url: String,
    /// Update the conflict token before registering; skipping this is
    /// expected to make the registration fail.
    pub update_service_endpoint: bool,
    pub notify_use_case: bool,
}

impl UseCaseConfig {
    /// The configuration that clears the active use case.
    pub fn deregistration() -> Self {
        UseCaseConfig {
            use_case_did_url: "deregistration".into(),
            use_case_url: String::new(),
            update_service_endpoint: true,
            notify_use_case: false,
        }
    }
}

#[derive(Deserialize)]
struct DidAddress {
    did: String,
}

#[derive(Deserialize)]
struct PayerAddress {
    address: String,
}

#[derive(Deserialize)]
struct StoredClaim {
    claim: Claim,
}

#[derive(Deserialize)]
struct ActiveUseCase {
    #[serde(rename = "useCase")]
    use_case: String,
}

/// Client over the issuer service API, rooted at a configurable base URL.
pub struct BackendClient {
    base_url: String,
    /// Client for ordinary request/response calls, with a timeout.
    http: reqwest::Client,
    /// Client for ledger-bound calls; explicitly no timeout.
    http_no_timeout: reqwest::Client,
}

impl BackendClient {
    /// Builds a client from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::transport("client construction", e))?;
        let http_no_timeout = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::transport("client construction", e))?;
        Ok(BackendClient {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            http_no_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    // =====================
    // Identity & payment
    // =====================

    /// `GET /payment`: the funded address backing ledger transactions.
    /// Any non-200 means no address is available yet.
    pub async fn get_payment_address(&self) -> Result<Option<String>> {
        let response = self
            .http
            .get(self.url("payment"))
            .send()
            .await
            .map_err(|e| Error::transport("payment address fetch", e))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let payer: PayerAddress = response
            .json()
            .await
            .map_err(|e| Error::Decode { context: "payment address fetch", source: e })?;
        Ok(Some(payer.address))
    }

    /// `GET /did`: the device's identity, or `None` while it does not
    /// exist yet. A 404 is absent state, never an error.
    pub async fn get_existing_did(&self) -> Result<Option<String>> {
        let response = self
            .http
            .get(self.url("did"))
            .send()
            .await
            .map_err(|e| Error::transport("device DID fetch", e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::from_response("device DID fetch", response).await);
        }

        let address: DidAddress = response
            .json()
            .await
            .map_err(|e| Error::Decode { context: "device DID fetch", source: e })?;
        Ok(Some(address.did))
    }

    /// `POST /did`: creates the device identity. Blocks until the ledger
    /// confirms; no timeout.
    pub async fn create_device_did(&self) -> Result<String> {
        let response = self
            .http_no_timeout
            .post(self.url("did"))
            .send()
            .await
            .map_err(|e| Error::transport("device DID creation", e))?;

        if !response.status().is_success() {
            return Err(Error::from_response("device DID creation", response).await);
        }

        let address: DidAddress = response
            .json()
            .await
            .map_err(|e| Error::Decode { context: "device DID creation", source: e })?;
        log::info!("device DID created: {}", address.did);
        Ok(address.did)
    }

    /// `DELETE /did`: administrative reset. Destroys the device identity
    /// and all dependent claims and credentials server-side.
    pub async fn reset_device_identity(&self) -> Result<()> {
        let response = self
            .http
            .delete(self.url("did"))
            .send()
            .await
            .map_err(|e| Error::transport("device identity reset", e))?;

        if !response.status().is_success() {
            return Err(Error::from_response("device identity reset", response).await);
        }
        log::warn!("device identity reset requested");
        Ok(())
    }

    /// `POST /payment`: submits the signed DID-creation extrinsic for
    /// the operator. Blocks until ledger confirmation; no timeout.
    pub async fn submit_signed_extrinsic(&self, signed_extrinsic: &str) -> Result<()> {
        let response = self
            .http_no_timeout
            .post(self.url("payment"))
            .body(signed_extrinsic.to_string())
            .send()
            .await
            .map_err(|e| Error::transport("extrinsic submission", e))?;

        if !response.status().is_success() {
            return Err(Error::from_response("extrinsic submission", response).await);
        }
        Ok(())
    }

    // =====================
    // Claims & attestations
    // =====================

    /// `GET /claim`: the locally registered claim, if any.
    pub async fn get_claim(&self) -> Result<Option<Claim>> {
        let response = self
            .http
            .get(self.url("claim"))
            .send()
            .await
            .map_err(|e| Error::transport("claim fetch", e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::from_response("claim fetch", response).await);
        }

        let stored: StoredClaim = response
            .json()
            .await
            .map_err(|e| Error::Decode { context: "claim fetch", source: e })?;
        Ok(Some(stored.claim))
    }

    /// `POST /claim`: registers a credential for attester approval. The
    /// response carries the stored, still-unapproved claim, which becomes
    /// the locally displayed one. Approval happens out of band and is
    /// observed only by polling.
    pub async fn post_claim(&self, credential: &Credential) -> Result<Claim> {
        let response = self
            .http
            .post(self.url("claim"))
            .json(credential)
            .send()
            .await
            .map_err(|e| Error::transport("claim registration", e))?;

        if !response.status().is_success() {
            return Err(Error::from_response("claim registration", response).await);
        }

        let stored: StoredClaim = response
            .json()
            .await
            .map_err(|e| Error::Decode { context: "claim registration", source: e })?;
        Ok(stored.claim)
    }

    /// `GET /credential`: all attestation records for this device.
    /// A 404 or empty body means no attestations exist yet and resolves
    /// to an empty collection.
    pub async fn get_attestations(&self) -> Result<Vec<AttestationRecord>> {
        let response = self
            .http
            .get(self.url("credential"))
            .send()
            .await
            .map_err(|e| Error::transport("attestation fetch", e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Error::from_response("attestation fetch", response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::transport("attestation fetch", e))?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&body).map_err(|e| Error::Protocol {
            context: "attestation fetch",
            status: 200,
            body: format!("undecodable record list: {}", e),
        })
    }

    // =====================
    // Issuance exchange
    // =====================

    /// `POST /credential/terms`: requests issuance terms for a claim.
    /// Non-200 is fatal; the terms are treated as opaque and forwarded to
    /// the extension unmodified.
    pub async fn request_terms(&self, claim: &Claim) -> Result<Value> {
        let response = self
            .http
            .post(self.url("credential/terms"))
            .json(claim)
            .send()
            .await
            .map_err(|e| Error::transport("terms request", e))?;

        if !response.status().is_success() {
            return Err(Error::from_response("terms request", response).await);
        }

        response
            .json()
            .await
            .map_err(|e| Error::Decode { context: "terms request", source: e })
    }

    /// `POST /credential`: finalizes issuance with the extension's reply.
    /// Blocks until the attester anchors the attestation; no timeout. The
    /// record's approval remains whatever the attester decides, later.
    pub async fn submit_credential_request(&self, extension_reply: &Value) -> Result<()> {
        let response = self
            .http_no_timeout
            .post(self.url("credential"))
            .json(extension_reply)
            .send()
            .await
            .map_err(|e| Error::transport("issuance finalization", e))?;

        if !response.status().is_success() {
            let error = Error::from_response("issuance finalization", response).await;
            log::error!("issuance finalization rejected: {}", error);
            return Err(error);
        }
        Ok(())
    }

    // =====================
    // Session handshake
    // =====================

    /// `GET /challenge`: the triple handed to the extension provider.
    pub async fn get_challenge(&self) -> Result<ChallengeResponse> {
        let response = self
            .http
            .get(self.url("challenge"))
            .send()
            .await
            .map_err(|e| Error::transport("challenge request", e))?;

        if !response.status().is_success() {
            return Err(Error::InvalidChallenge {
                status: response.status().as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| Error::Decode { context: "challenge request", source: e })
    }

    /// `POST /challenge`: server-side verification of the session the
    /// provider returned. This is the authentication step of the
    /// handshake; any non-200 invalidates the whole session.
    pub async fn verify_session(&self, session: &Value) -> Result<()> {
        let response = self
            .http
            .post(self.url("challenge"))
            .json(session)
            .send()
            .await
            .map_err(|e| Error::transport("session verification", e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::InvalidSession { status, body });
        }
        Ok(())
    }

    // =====================
    // Use cases
    // =====================

    /// `GET /use-case`: the currently active use case, or `None`.
    pub async fn get_use_case(&self) -> Result<Option<String>> {
        let response = self
            .http
            .get(self.url("use-case"))
            .send()
            .await
            .map_err(|e| Error::transport("use case fetch", e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::from_response("use case fetch", response).await);
        }

        let active: ActiveUseCase = response
            .json()
            .await
            .map_err(|e| Error::Decode { context: "use case fetch", source: e })?;
        Ok(Some(active.use_case))
    }

    /// `POST /use-case`: registers the device with a use case (or clears
    /// the registration via the deregistration config). Returns the
    /// opaque identifier of the now-active use case.
    pub async fn register_use_case(&self, config: &UseCaseConfig) -> Result<String> {
        let response = self
            .http
            .post(self.url("use-case"))
            .json(config)
            .send()
            .await
            .map_err(|e| Error::transport("use case registration", e))?;

        if !response.status().is_success() {
            return Err(Error::from_response("use case registration", response).await);
        }

        response
            .json()
            .await
            .map_err(|e| Error::Decode { context: "use case registration", source: e })
    }
}
