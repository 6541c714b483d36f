// src/extension/mod.rs
//! Wallet-extension capability surface.
//!
//! The browser exposes installed wallet providers as a process-wide
//! registry that changes asynchronously after startup. That ambient state
//! is modeled here as an injected [`ExtensionRegistry`] with an explicit
//! enumeration operation and a subscription for provider-appeared events,
//! so the core never reads globals.
//!
//! Two incompatible session wire versions exist concurrently in the
//! field, so the negotiated channel is a capability: anything supporting
//! `send` and `listen` qualifies, and nothing else about it is assumed.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::{Error, Result};

/// A signed DID-creation transaction produced by the extension, funded by
/// the device-controlled payment address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedExtrinsic {
    pub signed_extrinsic: String,
}

/// One entry of the operator's DID list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DidEntry {
    pub did: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
}

/// The encrypted channel negotiated with one provider instance, scoped to
/// a single credential-request exchange and discarded afterwards.
///
/// `listen` resolves with the *first* reply and never again; there is no
/// protocol-level cancellation message, so abandoning the exchange means
/// dropping the future. Implementations must buffer a reply that arrives
/// between `send` and the `listen` await point.
#[async_trait]
pub trait WalletChannel: Send + Sync {
    /// Fires a message to the extension.
    async fn send(&self, message: Value) -> Result<()>;

    /// Waits for the extension's next reply. First message wins; no
    /// client-side timeout is enforced.
    async fn listen(&self) -> Result<Value>;
}

/// A freshly negotiated session: the opaque JSON the server verifies,
/// plus the channel used for the rest of the exchange.
pub struct NegotiatedSession {
    /// Session object to post back for server-side verification. Treated
    /// as opaque; its shape differs between wire versions.
    pub verification_payload: Value,
    pub channel: Box<dyn WalletChannel>,
}

/// One installed wallet-extension provider.
#[async_trait]
pub trait ExtensionProvider: Send + Sync {
    /// Human-readable provider name, e.g. "Sporran".
    fn name(&self) -> &str;

    /// Runs the provider side of the challenge handshake. The provider is
    /// trusted to prove possession of the operator's decryption key by
    /// responding to the challenge; the core only forwards the result and
    /// checks the server's verdict.
    async fn start_session(
        &self,
        dapp_name: &str,
        dapp_encryption_key_uri: &str,
        challenge: &str,
    ) -> Result<NegotiatedSession>;

    /// Asks the extension to sign a DID-creation extrinsic funded by the
    /// given payment address. The device never holds the signing key.
    async fn get_signed_did_creation_extrinsic(
        &self,
        payment_address: &str,
    ) -> Result<SignedExtrinsic>;

    /// Enumerates the operator's DIDs known to this extension.
    async fn get_did_list(&self) -> Result<Vec<DidEntry>>;
}

/// Injected registry of wallet providers.
///
/// Providers appear asynchronously (the operator may install a wallet
/// after the page loads); `subscribe` delivers the name of each provider
/// as it registers.
pub struct ExtensionRegistry {
    providers: RwLock<Vec<Arc<dyn ExtensionProvider>>>,
    events: broadcast::Sender<String>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        ExtensionRegistry {
            providers: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Registers a provider and announces it to subscribers.
    pub fn register(&self, provider: Arc<dyn ExtensionProvider>) {
        let name = provider.name().to_string();
        self.providers
            .write()
            .expect("provider registry lock poisoned")
            .push(provider);
        log::debug!("wallet provider appeared: {}", name);
        // Nobody listening is fine.
        let _ = self.events.send(name);
    }

    /// Snapshot of the currently installed providers.
    pub fn providers(&self) -> Vec<Arc<dyn ExtensionProvider>> {
        self.providers
            .read()
            .expect("provider registry lock poisoned")
            .clone()
    }

    /// Finds a provider by name.
    pub fn find(&self, name: &str) -> Option<Arc<dyn ExtensionProvider>> {
        self.providers()
            .into_iter()
            .find(|provider| provider.name() == name)
    }

    /// Like [`find`](Self::find), but a missing provider is an error the
    /// flows can surface directly.
    pub fn require(&self, name: &str) -> Result<Arc<dyn ExtensionProvider>> {
        self.find(name).ok_or(Error::NoProvider)
    }

    /// Subscribes to provider-appeared events.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.events.subscribe()
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
