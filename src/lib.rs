// src/lib.rs

//! # Box Credential Client
//!
//! Client-side protocol logic for a physical device ("the box") and its
//! operator to obtain cryptographically anchored attestations about
//! structured facts, issued by an external attester, with a wallet
//! browser-extension acting as the operator's signing agent.
//!
//! ## Architecture Overview
//! 1. **Models**: published schemas (CTypes), claims, credentials and
//!    attestation records
//! 2. **API Layer**: typed `reqwest` client over the issuer service
//! 3. **Extension Layer**: capability traits and registry for wallet
//!    providers
//! 4. **Services Layer**: session handshake, claim issuance, attestation
//!    polling and identity bootstrap sequencing
//!
//! The crate performs no rendering and holds no signing keys; it drives
//! the session and issuance protocol and exposes the state a UI needs.

pub mod api;
pub mod config;
pub mod error;
pub mod extension;
pub mod models;
pub mod services;

pub use api::{BackendClient, ChallengeResponse, UseCaseConfig};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use extension::{
    DidEntry, ExtensionProvider, ExtensionRegistry, NegotiatedSession, SignedExtrinsic,
    WalletChannel,
};
pub use models::{
    registry, AttestationRecord, AttestationStatus, Claim, Credential, SchemaDescriptor,
};
pub use services::{
    classify, AttestationTracker, BootstrapCoordinator, DeviceDidState, IssuanceClient,
    OperatorDidState, ProgressTicker, SessionNegotiator, SessionState, TieBreak,
};

/// Initializes the `env_logger` sink for binaries and tests that want
/// crate logging. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env().try_init();
}
