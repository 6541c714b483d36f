// src/services/session.rs
//! Challenge/response handshake with a wallet-extension provider.
//!
//! The handshake establishes the authenticated, encrypted channel used
//! for exactly one credential-request exchange:
//!
//! 1. fetch the challenge triple from the issuer service;
//! 2. hand it to the provider, which proves possession of the operator's
//!    decryption key by answering the challenge;
//! 3. post the resulting session object back for server-side
//!    verification.
//!
//! Any step's failure aborts the whole handshake; there is no partial
//! retry. Callers retry by starting a new handshake.

use crate::api::BackendClient;
use crate::error::Result;
use crate::extension::{ExtensionProvider, WalletChannel};

/// Observable progress of one handshake attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    ChallengeRequested,
    ChallengeReceived,
    SessionStarted,
    /// Terminal success; the channel has been handed to the caller.
    Verified,
    /// Terminal failure; start a new negotiator to retry.
    Failed,
}

/// Drives one handshake against one provider instance.
pub struct SessionNegotiator<'a> {
    client: &'a BackendClient,
    state: SessionState,
}

impl<'a> SessionNegotiator<'a> {
    pub fn new(client: &'a BackendClient) -> Self {
        SessionNegotiator {
            client,
            state: SessionState::Idle,
        }
    }

    /// Current handshake state, for UI gating.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the full handshake and returns the verified channel.
    ///
    /// The causally dependent steps (challenge, provider session, server
    /// verification) execute strictly in order; step N+1 never begins
    /// before step N's result is known.
    pub async fn negotiate(
        &mut self,
        provider: &dyn ExtensionProvider,
    ) -> Result<Box<dyn WalletChannel>> {
        match self.run(provider).await {
            Ok(channel) => {
                self.state = SessionState::Verified;
                Ok(channel)
            }
            Err(error) => {
                self.state = SessionState::Failed;
                log::error!("session handshake failed: {}", error);
                Err(error)
            }
        }
    }

    async fn run(&mut self, provider: &dyn ExtensionProvider) -> Result<Box<dyn WalletChannel>> {
        self.state = SessionState::ChallengeRequested;
        let challenge = self.client.get_challenge().await?;
        self.state = SessionState::ChallengeReceived;
        log::debug!(
            "challenge received from {:?} for key {}",
            challenge.dapp_name,
            challenge.dapp_encryption_key_uri
        );

        let session = provider
            .start_session(
                &challenge.dapp_name,
                &challenge.dapp_encryption_key_uri,
                &challenge.challenge,
            )
            .await?;
        self.state = SessionState::SessionStarted;

        self.client
            .verify_session(&session.verification_payload)
            .await?;

        Ok(session.channel)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::config::ClientConfig;
    use crate::error::Error;
    use crate::extension::testing::ScriptedProvider;

    fn client_for(server: &mockito::ServerGuard) -> BackendClient {
        let config = ClientConfig {
            base_url: format!("{}/api/v1", server.url()),
            ..ClientConfig::default()
        };
        BackendClient::new(&config).expect("client")
    }

    const CHALLENGE_BODY: &str =
        r#"{"dAppName":"OLI","dAppEncryptionKeyUri":"did:x#key1","challenge":"abc"}"#;

    #[tokio::test]
    async fn successful_handshake_ends_verified() {
        let mut server = mockito::Server::new_async().await;
        let _get = server
            .mock("GET", "/api/v1/challenge")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(CHALLENGE_BODY)
            .create_async()
            .await;
        let _post = server
            .mock("POST", "/api/v1/challenge")
            .with_status(200)
            .create_async()
            .await;

        let client = client_for(&server);
        let provider = ScriptedProvider::new("Sporran");
        let mut negotiator = SessionNegotiator::new(&client);

        let channel = negotiator.negotiate(&provider).await.expect("handshake");
        assert_eq!(negotiator.state(), SessionState::Verified);
        assert!(provider.session_started.load(Ordering::SeqCst));

        // The verified channel is live.
        channel.send(serde_json::json!({"hello": 1})).await.unwrap();
    }

    #[tokio::test]
    async fn failed_challenge_aborts_before_the_provider_runs() {
        let mut server = mockito::Server::new_async().await;
        let _get = server
            .mock("GET", "/api/v1/challenge")
            .with_status(500)
            .create_async()
            .await;

        let client = client_for(&server);
        let provider = ScriptedProvider::new("Sporran");
        let mut negotiator = SessionNegotiator::new(&client);

        let error = negotiator.negotiate(&provider).await.err().unwrap();
        assert!(matches!(error, Error::InvalidChallenge { status: 500 }));
        assert_eq!(negotiator.state(), SessionState::Failed);
        assert!(!provider.session_started.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn rejected_verification_fails_the_whole_handshake() {
        let mut server = mockito::Server::new_async().await;
        let _get = server
            .mock("GET", "/api/v1/challenge")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(CHALLENGE_BODY)
            .create_async()
            .await;
        let _post = server
            .mock("POST", "/api/v1/challenge")
            .with_status(401)
            .with_body("bad proof")
            .create_async()
            .await;

        let client = client_for(&server);
        let provider = ScriptedProvider::new("Sporran");
        let mut negotiator = SessionNegotiator::new(&client);

        let error = negotiator.negotiate(&provider).await.err().unwrap();
        assert!(error.to_string().contains("no valid session"));
        assert_eq!(negotiator.state(), SessionState::Failed);
        // No channel was handed out, so no send/listen can occur.
    }
}
