// src/services/bootstrap.rs
//! Identity bootstrap sequencing.
//!
//! Two independent state machines gate the rest of the protocol:
//!
//! - the device: `NoDid → Creating → Ready`, driven by a single
//!   fire-and-forget `POST /did` with no timeout. Failure returns to
//!   `NoDid` and surfaces the error; there is no automatic retry.
//! - the operator: `NoAddress → AddressKnown`, then on explicit user
//!   action `Signing → AwaitingLedger → Ready | Failed`. The operator's
//!   DID is created by the wallet extension and funded by the
//!   device-controlled payment address; the device never holds the
//!   operator's key material.
//!
//! The box's own DID creation never depends on the operator's. Both
//! pending flags are exposed so a UI can gate buttons, but that gating is
//! a presentation concern, not a correctness one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::api::BackendClient;
use crate::error::{Error, Result};
use crate::extension::ExtensionProvider;

/// Device identity lifecycle. No reversal without external reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceDidState {
    NoDid,
    Creating,
    Ready(String),
}

/// Operator identity lifecycle, independent of the device's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorDidState {
    NoAddress,
    AddressKnown,
    Signing,
    AwaitingLedger,
    Ready,
    Failed(String),
}

/// Sequences device- and operator-DID creation.
pub struct BootstrapCoordinator<'a> {
    client: &'a BackendClient,
    device: DeviceDidState,
    operator: OperatorDidState,
    payment_address: Option<String>,
}

impl<'a> BootstrapCoordinator<'a> {
    pub fn new(client: &'a BackendClient) -> Self {
        BootstrapCoordinator {
            client,
            device: DeviceDidState::NoDid,
            operator: OperatorDidState::NoAddress,
            payment_address: None,
        }
    }

    /// Fetches the payment address and any existing device identity.
    ///
    /// The two fetches are causally independent and run concurrently.
    /// Absent values leave the respective machine in its initial state.
    pub async fn refresh(&mut self) -> Result<()> {
        let (address, did) = tokio::join!(
            self.client.get_payment_address(),
            self.client.get_existing_did()
        );

        self.payment_address = address?;
        if self.payment_address.is_some()
            && matches!(self.operator, OperatorDidState::NoAddress)
        {
            self.operator = OperatorDidState::AddressKnown;
        }

        if let Some(did) = did? {
            self.device = DeviceDidState::Ready(did);
        }
        Ok(())
    }

    /// Creates the device identity. Blocks until the ledger confirms (no
    /// timeout); callers should display a [`ProgressTicker`] meanwhile.
    pub async fn create_device_did(&mut self) -> Result<String> {
        if let DeviceDidState::Ready(did) = &self.device {
            return Ok(did.clone());
        }

        self.device = DeviceDidState::Creating;
        match self.client.create_device_did().await {
            Ok(did) => {
                self.device = DeviceDidState::Ready(did.clone());
                Ok(did)
            }
            Err(error) => {
                // Back to square one; retrying is the caller's decision.
                self.device = DeviceDidState::NoDid;
                Err(error)
            }
        }
    }

    /// Creates the operator identity through the wallet extension:
    /// obtain the signed DID-creation extrinsic funded by the payment
    /// address, then submit it and block until ledger confirmation.
    pub async fn create_operator_did(&mut self, provider: &dyn ExtensionProvider) -> Result<()> {
        let address = self
            .payment_address
            .clone()
            .ok_or(Error::InvalidState("no payment address known"))?;

        self.operator = OperatorDidState::Signing;
        let signed = match provider.get_signed_did_creation_extrinsic(&address).await {
            Ok(signed) => signed,
            Err(error) => {
                self.operator = OperatorDidState::Failed(error.to_string());
                return Err(error);
            }
        };

        self.operator = OperatorDidState::AwaitingLedger;
        match self
            .client
            .submit_signed_extrinsic(&signed.signed_extrinsic)
            .await
        {
            Ok(()) => {
                self.operator = OperatorDidState::Ready;
                log::info!("operator DID anchored on the ledger");
                Ok(())
            }
            Err(error) => {
                self.operator = OperatorDidState::Failed(error.to_string());
                Err(error)
            }
        }
    }

    /// The device identity, once created.
    pub fn device_identity(&self) -> Option<&str> {
        match &self.device {
            DeviceDidState::Ready(did) => Some(did),
            _ => None,
        }
    }

    pub fn device_state(&self) -> &DeviceDidState {
        &self.device
    }

    pub fn operator_state(&self) -> &OperatorDidState {
        &self.operator
    }

    /// Whether device-DID creation is in flight.
    pub fn device_pending(&self) -> bool {
        matches!(self.device, DeviceDidState::Creating)
    }

    /// Whether operator-DID creation is in flight.
    pub fn operator_pending(&self) -> bool {
        matches!(
            self.operator,
            OperatorDidState::Signing | OperatorDidState::AwaitingLedger
        )
    }

    pub fn payment_address(&self) -> Option<&str> {
        self.payment_address.as_deref()
    }
}

/// Client-visible progress indicator for the no-timeout ledger calls: a
/// counter incrementing on a fixed interval, nothing inferred from the
/// network. Dropping the ticker stops it.
pub struct ProgressTicker {
    counter: Arc<AtomicU64>,
    handle: tokio::task::JoinHandle<()>,
}

impl ProgressTicker {
    pub fn start(interval: Duration) -> Self {
        let counter = Arc::new(AtomicU64::new(0));
        let ticking = counter.clone();
        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            // The first tick fires immediately; skip it.
            timer.tick().await;
            loop {
                timer.tick().await;
                ticking.fetch_add(1, Ordering::Relaxed);
            }
        });
        ProgressTicker { counter, handle }
    }

    /// Ticks elapsed since start.
    pub fn value(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::extension::testing::ScriptedProvider;

    fn client_for(server: &mockito::ServerGuard) -> BackendClient {
        let config = ClientConfig {
            base_url: format!("{}/api/v1", server.url()),
            ..ClientConfig::default()
        };
        BackendClient::new(&config).expect("client")
    }

    #[tokio::test]
    async fn refresh_populates_both_machines_concurrently() {
        let mut server = mockito::Server::new_async().await;
        let _payment = server
            .mock("GET", "/api/v1/payment")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"address":"4tTFsj531ZFqyhdYnWmzKU3gWGN68qYPBSKkB7UJ5XZWCAyg"}"#)
            .create_async()
            .await;
        let _did = server
            .mock("GET", "/api/v1/did")
            .with_status(404)
            .create_async()
            .await;

        let client = client_for(&server);
        let mut coordinator = BootstrapCoordinator::new(&client);
        coordinator.refresh().await.unwrap();

        assert_eq!(coordinator.device_state(), &DeviceDidState::NoDid);
        assert_eq!(coordinator.operator_state(), &OperatorDidState::AddressKnown);
        assert!(coordinator.payment_address().is_some());
        assert!(!coordinator.device_pending());
        assert!(!coordinator.operator_pending());
    }

    #[tokio::test]
    async fn device_did_creation_round_trips_and_owner_matches() {
        let mut server = mockito::Server::new_async().await;
        let _post = server
            .mock("POST", "/api/v1/did")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"did":"did:example:123"}"#)
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/api/v1/did")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"did":"did:example:123"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let mut coordinator = BootstrapCoordinator::new(&client);

        let did = coordinator.create_device_did().await.unwrap();
        assert_eq!(did, "did:example:123");
        assert_eq!(coordinator.device_identity(), Some("did:example:123"));

        // A later fetch returns the same identity.
        assert_eq!(
            client.get_existing_did().await.unwrap().as_deref(),
            Some("did:example:123")
        );

        // The identity flows verbatim into claims built for this device.
        let claim = crate::models::Claim::from_schema_and_contents(
            crate::models::registry().self_declaration(),
            [("name", "box")],
            &did,
        )
        .unwrap();
        assert_eq!(claim.owner, "did:example:123");
    }

    #[tokio::test]
    async fn failed_device_creation_returns_to_no_did() {
        let mut server = mockito::Server::new_async().await;
        let _post = server
            .mock("POST", "/api/v1/did")
            .with_status(500)
            .with_body("chain unreachable")
            .create_async()
            .await;

        let client = client_for(&server);
        let mut coordinator = BootstrapCoordinator::new(&client);

        let error = coordinator.create_device_did().await.unwrap_err();
        assert!(error.to_string().contains("chain unreachable"));
        assert_eq!(coordinator.device_state(), &DeviceDidState::NoDid);
    }

    #[tokio::test]
    async fn operator_flow_requires_a_known_address() {
        let server = mockito::Server::new_async().await;
        let client = client_for(&server);
        let mut coordinator = BootstrapCoordinator::new(&client);
        let provider = ScriptedProvider::new("Sporran");

        let error = coordinator.create_operator_did(&provider).await.unwrap_err();
        assert!(matches!(error, Error::InvalidState(_)));
        assert_eq!(coordinator.operator_state(), &OperatorDidState::NoAddress);
    }

    #[tokio::test]
    async fn operator_flow_signs_then_submits() {
        let mut server = mockito::Server::new_async().await;
        let _payment_get = server
            .mock("GET", "/api/v1/payment")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"address":"4payer"}"#)
            .create_async()
            .await;
        let _did_get = server
            .mock("GET", "/api/v1/did")
            .with_status(404)
            .create_async()
            .await;
        let payment_post = server
            .mock("POST", "/api/v1/payment")
            .match_body("0xsigned")
            .with_status(200)
            .create_async()
            .await;

        let client = client_for(&server);
        let mut coordinator = BootstrapCoordinator::new(&client);
        coordinator.refresh().await.unwrap();

        let provider = ScriptedProvider::new("Sporran");
        coordinator.create_operator_did(&provider).await.unwrap();

        assert_eq!(coordinator.operator_state(), &OperatorDidState::Ready);
        payment_post.assert_async().await;
    }

    #[tokio::test]
    async fn ledger_rejection_marks_operator_failed() {
        let mut server = mockito::Server::new_async().await;
        let _payment_get = server
            .mock("GET", "/api/v1/payment")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"address":"4payer"}"#)
            .create_async()
            .await;
        let _did_get = server
            .mock("GET", "/api/v1/did")
            .with_status(404)
            .create_async()
            .await;
        let _payment_post = server
            .mock("POST", "/api/v1/payment")
            .with_status(500)
            .with_body("extrinsic failed")
            .create_async()
            .await;

        let client = client_for(&server);
        let mut coordinator = BootstrapCoordinator::new(&client);
        coordinator.refresh().await.unwrap();

        let provider = ScriptedProvider::new("Sporran");
        let error = coordinator.create_operator_did(&provider).await.unwrap_err();
        assert!(error.to_string().contains("extrinsic failed"));
        assert!(matches!(
            coordinator.operator_state(),
            OperatorDidState::Failed(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn progress_ticker_counts_fixed_intervals() {
        let ticker = ProgressTicker::start(Duration::from_secs(1));
        assert_eq!(ticker.value(), 0);

        // Let the ticker task register its timer before time moves.
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(3)).await;
        // Let the ticker task run its due ticks.
        tokio::task::yield_now().await;
        assert!(ticker.value() >= 2);
    }
}
