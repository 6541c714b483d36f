// src/services/mod.rs
//! Protocol drivers: session negotiation, issuance, attestation tracking
//! and the identity bootstrap sequencing that gates claim construction.

pub mod bootstrap;
pub mod issuance;
pub mod session;
pub mod tracker;

pub use bootstrap::{BootstrapCoordinator, DeviceDidState, OperatorDidState, ProgressTicker};
pub use issuance::IssuanceClient;
pub use session::{SessionNegotiator, SessionState};
pub use tracker::{classify, AttestationTracker, TieBreak};
