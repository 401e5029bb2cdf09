use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::IdentityConfig;
use crate::services::error::GatewayError;

/// The verified identity of a caller, for the duration of one request.
///
/// Built fresh on every request by token verification; attached to request
/// extensions; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub account_id: String,
    pub email: String,
    pub email_verified: bool,
    pub claims: HashMap<String, serde_json::Value>,
}

/// The single trust boundary of the gateway: exchanges a bearer token for a
/// verified claim set. No other component re-derives trust.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Principal, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    email_verified: bool,
    #[serde(flatten)]
    extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    #[serde(default)]
    n: String,
    #[serde(default)]
    e: String,
}

/// Verifies RS256 bearer tokens against the identity provider's published
/// signing keys (JWKS), checking signature, issuer, audience, and expiry.
///
/// Keys are cached and refreshed when an unknown `kid` shows up; verification
/// results themselves are never cached, and the cache never extends a token's
/// own expiry. The JWKS fetch is the gateway's only outbound call and carries
/// a timeout; on timeout or an unreachable provider the request fails
/// closed.
pub struct JwksIdentityProvider {
    http: reqwest::Client,
    jwks_url: String,
    issuer: String,
    audience: String,
    keys: RwLock<HashMap<String, DecodingKey>>,
}

impl JwksIdentityProvider {
    pub fn new(config: &IdentityConfig) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.verify_timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build identity provider client: {}", e))?;

        tracing::info!(
            issuer = %config.issuer,
            jwks_url = %config.jwks_url,
            "Identity provider verification initialized"
        );

        Ok(Self {
            http,
            jwks_url: config.jwks_url.clone(),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            keys: RwLock::new(HashMap::new()),
        })
    }

    async fn signing_key(&self, kid: &str) -> Result<DecodingKey, GatewayError> {
        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(key.clone());
        }

        self.refresh_keys().await?;

        match self.keys.read().await.get(kid) {
            Some(key) => Ok(key.clone()),
            None => {
                // The provider does not know this key id either; the token
                // was not signed by it.
                tracing::warn!(kid = %kid, "Token signed with unknown key id");
                Err(GatewayError::TokenInvalid)
            }
        }
    }

    async fn refresh_keys(&self) -> Result<(), GatewayError> {
        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| GatewayError::UpstreamUnavailable(e.into()))?;

        let jwks: JwksResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::UpstreamUnavailable(e.into()))?;

        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys.insert(jwk.kid, key);
                }
                Err(e) => {
                    tracing::warn!(kid = %jwk.kid, error = %e, "Skipping malformed JWK");
                }
            }
        }

        tracing::debug!(key_count = keys.len(), "Refreshed identity provider signing keys");
        *self.keys.write().await = keys;
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for JwksIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Principal, GatewayError> {
        if token.is_empty() {
            return Err(GatewayError::TokenMissing);
        }

        let header = decode_header(token).map_err(|_| GatewayError::TokenInvalid)?;
        let kid = header.kid.ok_or(GatewayError::TokenInvalid)?;
        let key = self.signing_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = true;

        let data = decode::<IdTokenClaims>(token, &key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => GatewayError::TokenExpired,
                _ => GatewayError::TokenInvalid,
            }
        })?;

        Ok(Principal {
            account_id: data.claims.sub,
            email: data.claims.email,
            email_verified: data.claims.email_verified,
            claims: data.claims.extra,
        })
    }
}

/// In-memory provider for tests: tokens are granted explicitly, and the
/// provider can be flipped to "unreachable" to exercise fail-closed paths.
#[derive(Default)]
pub struct MockIdentityProvider {
    tokens: Mutex<HashMap<String, Principal>>,
    unavailable: AtomicBool,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, token: &str, principal: Principal) {
        self.tokens
            .lock()
            .expect("mock token table poisoned")
            .insert(token.to_string(), principal);
    }

    pub fn grant_account(&self, token: &str, account_id: &str, email: &str) {
        self.grant(
            token,
            Principal {
                account_id: account_id.to_string(),
                email: email.to_string(),
                email_verified: true,
                claims: HashMap::new(),
            },
        );
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Principal, GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::UpstreamUnavailable(anyhow::anyhow!(
                "mock provider offline"
            )));
        }
        if token.is_empty() {
            return Err(GatewayError::TokenMissing);
        }
        if token == "expired" {
            return Err(GatewayError::TokenExpired);
        }
        self.tokens
            .lock()
            .expect("mock token table poisoned")
            .get(token)
            .cloned()
            .ok_or(GatewayError::TokenInvalid)
    }
}
