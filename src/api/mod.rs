// src/api/mod.rs
//! HTTP surface of the issuer service, as consumed by the device.

mod client;

pub use client::{BackendClient, ChallengeResponse, UseCaseConfig};
