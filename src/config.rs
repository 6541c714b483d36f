// src/config.rs
//! Client configuration.
//!
//! Layered the usual way: built-in defaults, then an optional
//! `box-client.toml` next to the process, then `BOX_CLIENT_*` environment
//! variables. Only the base URL is required in practice; everything else
//! has a sensible default.

use serde::Deserialize;

/// Runtime configuration of the protocol client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the issuer service, e.g. `http://localhost:3333/api/v1`.
    pub base_url: String,

    /// Attestation polling interval in seconds. Polling is the only way
    /// status is observed; there are no push notifications.
    pub poll_interval_secs: u64,

    /// Timeout applied to ordinary request/response calls. The ledger-bound
    /// calls (DID creation, extrinsic submission, issuance finalization)
    /// always run without any timeout and ignore this value.
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: "http://localhost:3333/api/v1".into(),
            poll_interval_secs: 5,
            request_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from defaults, `box-client.toml` (optional) and
    /// `BOX_CLIENT_*` environment variables, in increasing precedence.
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = ClientConfig::default();
        config::Config::builder()
            .set_default("base_url", defaults.base_url)?
            .set_default("poll_interval_secs", defaults.poll_interval_secs as i64)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs as i64)?
            .add_source(config::File::with_name("box-client").required(false))
            .add_source(config::Environment::with_prefix("BOX_CLIENT"))
            .build()?
            .try_deserialize()
    }
}
