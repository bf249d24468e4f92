//! Credential bootstrap against the external auth service.
//!
//! Creates an account by signing a random challenge with an Ed25519 key
//! derived from a fresh 32-byte secret, then persists the resulting
//! `{secret, token}` pair (plus a settings record with a machine id) under
//! the tether home directory. The agent only ever consumes that output; it
//! never verifies signatures itself.

use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::Signature;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use rand::RngCore;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use tether_core::CredentialsError;
use tether_core::credentials::Credentials;
use tether_core::credentials::Settings;
use thiserror::Error;
use tracing::info;
use tracing::warn;

pub const AUTH_ENDPOINT: &str = "/v1/auth";

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Base URL of the auth service, e.g. `http://server:3005`.
    pub server_url: String,
    /// Directory to write `access.key`, `settings.json` and `logs/` into.
    pub home: PathBuf,
    /// How many times to probe an unreachable server before giving up.
    pub probe_attempts: u32,
    /// Fixed pause between probes.
    pub probe_backoff: Duration,
}

impl BootstrapConfig {
    pub fn new(server_url: String, home: PathBuf) -> Self {
        Self {
            server_url,
            home,
            probe_attempts: 30,
            probe_backoff: Duration::from_secs(1),
        }
    }

    fn auth_url(&self) -> String {
        format!("{}{AUTH_ENDPOINT}", self.server_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The server never became reachable. Fatal; surfaced to the operator.
    #[error("auth service not reachable after {attempts} attempts")]
    ServerUnavailable { attempts: u32 },
    #[error("auth request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("auth service rejected the account request with status {status}")]
    AuthRejected { status: StatusCode },
    #[error("auth service responded without a token")]
    MissingToken,
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
    #[error("failed to prepare home directory: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct AuthRequest {
    challenge: String,
    #[serde(rename = "publicKey")]
    public_key: String,
    signature: String,
}

#[derive(Deserialize)]
struct AuthResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Runs the whole flow: wait for the server, create an account, persist the
/// credential records. Returns the credentials it wrote.
pub async fn bootstrap(config: &BootstrapConfig) -> Result<Credentials, BootstrapError> {
    let client = reqwest::Client::new();

    wait_for_server(&client, config).await?;
    info!("auth service is available");

    let credentials = create_account(&client, config).await?;
    info!("account created, token {}…", truncate(&credentials.token, 8));

    persist(&credentials, config)?;
    info!("credentials written to {}", config.home.display());
    Ok(credentials)
}

/// Probes the auth endpoint with throwaway material until it responds at
/// all; any HTTP status counts as reachable. Bounded attempts, fixed
/// backoff, fatal when exhausted.
async fn wait_for_server(
    client: &reqwest::Client,
    config: &BootstrapConfig,
) -> Result<(), BootstrapError> {
    let url = config.auth_url();
    for attempt in 1..=config.probe_attempts {
        let probe = AuthRequest {
            challenge: BASE64.encode(random_bytes::<32>()),
            public_key: BASE64.encode(random_bytes::<32>()),
            signature: BASE64.encode(random_bytes::<64>()),
        };
        match client.post(&url).json(&probe).send().await {
            Ok(_) => return Ok(()),
            Err(err) => {
                warn!(
                    "waiting for auth service ({attempt}/{}): {err}",
                    config.probe_attempts
                );
                tokio::time::sleep(config.probe_backoff).await;
            }
        }
    }
    Err(BootstrapError::ServerUnavailable {
        attempts: config.probe_attempts,
    })
}

async fn create_account(
    client: &reqwest::Client,
    config: &BootstrapConfig,
) -> Result<Credentials, BootstrapError> {
    let secret = random_bytes::<32>();
    let challenge = random_bytes::<32>();
    let (request, _) = signed_auth_request(&secret, &challenge);

    let response = client
        .post(config.auth_url())
        .json(&request)
        .send()
        .await?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(BootstrapError::AuthRejected { status });
    }
    let body: AuthResponse = response.json().await?;
    let token = body.token.ok_or(BootstrapError::MissingToken)?;

    Ok(Credentials { secret, token })
}

/// Derives the Ed25519 keypair from the secret and signs the challenge,
/// producing the wire-ready base64 request body.
fn signed_auth_request(secret: &[u8; 32], challenge: &[u8; 32]) -> (AuthRequest, Signature) {
    let signing_key = SigningKey::from_bytes(secret);
    let signature = signing_key.sign(challenge);
    let request = AuthRequest {
        challenge: BASE64.encode(challenge),
        public_key: BASE64.encode(signing_key.verifying_key().to_bytes()),
        signature: BASE64.encode(signature.to_bytes()),
    };
    (request, signature)
}

fn persist(credentials: &Credentials, config: &BootstrapConfig) -> Result<(), BootstrapError> {
    credentials.write(&config.home)?;
    let settings = Settings::new(uuid::Uuid::new_v4().to_string());
    settings.write(&config.home)?;
    std::fs::create_dir_all(config.home.join("logs"))?;
    Ok(())
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
