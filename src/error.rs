// src/error.rs
//! Error taxonomy for the client protocol.
//!
//! Four families of failures exist, and they are deliberately kept apart:
//! - Absent state (404 on did/claim/credential/use-case) is *not* an error
//!   and never appears here; the API layer maps it to `Option`/empty vectors.
//! - Protocol violations (unexpected status on challenge/terms/finalize)
//!   are fatal to the current operation and carry the response body.
//! - Transport failures (connection refused, DNS, configured timeouts).
//! - Validation failures, which are local and never sent over the wire.
//!
//! No operation retries automatically; several of the underlying effects
//! (ledger submission, claim creation) are not safely idempotent, so all
//! retries are caller-initiated.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed failure surfaced by session, issuance and bootstrap operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The network layer failed before a response was obtained.
    #[error("transport failure during {context}: {source}")]
    Transport {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered, but outside the contract for this operation.
    #[error("{context} failed with status {status}: {body}")]
    Protocol {
        context: &'static str,
        status: u16,
        body: String,
    },

    /// The challenge endpoint did not produce a usable challenge.
    #[error("no valid challenge received (status {status})")]
    InvalidChallenge { status: u16 },

    /// Server-side verification of the extension session failed.
    #[error("no valid session: verification rejected with status {status}: {body}")]
    InvalidSession { status: u16, body: String },

    /// Claim contents referenced a field the schema does not declare.
    #[error("claim field {field:?} is not declared by schema {schema:?}")]
    UndeclaredField { schema: String, field: String },

    /// A schema id was requested that the registry does not know.
    /// This is a caller misconfiguration, not a retryable condition.
    #[error("unknown schema id: {0}")]
    UnknownSchema(String),

    /// No wallet extension provider is available to drive the flow.
    #[error("no wallet extension provider available")]
    NoProvider,

    /// The wallet extension reported a failure of its own.
    #[error("wallet extension error: {0}")]
    Extension(String),

    /// An operation was invoked from a state that does not permit it,
    /// e.g. operator DID creation without a known payment address.
    #[error("invalid state for operation: {0}")]
    InvalidState(&'static str),

    /// A response body could not be decoded as the expected JSON shape.
    #[error("malformed response during {context}: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl Error {
    /// Wraps a reqwest error that occurred while performing `context`.
    pub(crate) fn transport(context: &'static str, source: reqwest::Error) -> Self {
        Error::Transport { context, source }
    }

    /// Builds a protocol violation from a non-success response.
    pub(crate) async fn from_response(context: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Error::Protocol {
            context,
            status,
            body,
        }
    }
}
