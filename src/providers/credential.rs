//! Azure AD client-secret credential.

use crate::config::Config;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

/// Tokens are refreshed this long before they expire.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Lifetime assumed when the token response omits `expires_in`.
const DEFAULT_LIFETIME_SECS: i64 = 3600;

/// Upper bound on the lifetime taken from a token response.
const MAX_LIFETIME_SECS: i64 = 86_400;

/// OAuth2 client-credentials grant against Azure AD.
pub struct ClientSecretCredential {
    client: reqwest::Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cached: Mutex<Option<AccessToken>>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl ClientSecretCredential {
    /// Create a new credential.
    pub fn new(
        authority_host: String,
        tenant_id: String,
        client_id: String,
        client_secret: String,
        scope: String,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            authority_host,
            tenant_id,
            client_id,
            client_secret,
            scope,
            cached: Mutex::new(None),
        })
    }

    /// Credential for the Resource Manager endpoint named in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.authority_host.clone(),
            config.tenant_id.clone(),
            config.client_id.clone(),
            config.resolved_client_secret(),
            format!("{}/.default", config.management_endpoint.trim_end_matches('/')),
        )
    }

    /// Return a bearer token, requesting a new one when the cached token is near expiry.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(EXPIRY_SKEW_SECS) > Utc::now() {
                return Ok(token.token.clone());
            }
        }

        let token = self.request_token().await?;
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Drop the cached token so the next call requests a fresh one.
    pub async fn invalidate(&self) {
        if self.cached.lock().await.take().is_some() {
            tracing::debug!(tenant = %self.tenant_id, "Discarded cached access token");
        }
    }

    async fn request_token(&self) -> Result<AccessToken> {
        if self.tenant_id.is_empty() || self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(Error::Authorization(
                "tenant id, client id and secret are required".to_string(),
            ));
        }

        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        );

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Authorization(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error: std::result::Result<TokenError, _> = response.json().await;
            let msg = error
                .map(|e| match e.error_description {
                    Some(description) => format!("{}: {}", e.error, description),
                    None => e.error,
                })
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(Error::Authorization(msg));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Authorization(format!("invalid token response: {}", e)))?;

        tracing::debug!(tenant = %self.tenant_id, "Acquired access token");

        Ok(AccessToken {
            token: body.access_token,
            expires_at: expires_at(Utc::now(), body.expires_in),
        })
    }
}

fn expires_at(now: DateTime<Utc>, expires_in: Option<i64>) -> DateTime<Utc> {
    let lifetime = expires_in
        .unwrap_or(DEFAULT_LIFETIME_SECS)
        .clamp(0, MAX_LIFETIME_SECS);
    now + Duration::seconds(lifetime)
}

impl std::fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("authority_host", &self.authority_host)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
