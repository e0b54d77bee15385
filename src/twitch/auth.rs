//! App access token cache (OAuth client-credentials grant).

use crate::error::TwitchError;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

/// A cached token is reused only while it stays valid for at least this much
/// longer; inside the margin it is replaced wholesale.
const EXPIRY_MARGIN_SECS: i64 = 600;

/// A bearer credential with its expiry.
#[derive(Debug, Clone)]
pub struct AppToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Obtains and caches the application bearer token.
///
/// Two tasks racing past the margin both refresh; the last writer wins and
/// the extra grant is harmless, so no lock is held across the request.
pub struct AppTokenCache {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    cached: RwLock<Option<AppToken>>,
}

impl AppTokenCache {
    pub fn new(http: reqwest::Client, client_id: String, client_secret: String) -> Self {
        Self::with_token_url(http, client_id, client_secret, TOKEN_URL.to_string())
    }

    /// Create a cache with a custom token endpoint (for testing with a mock
    /// server).
    pub fn with_token_url(
        http: reqwest::Client,
        client_id: String,
        client_secret: String,
        token_url: String,
    ) -> Self {
        Self {
            http,
            client_id,
            client_secret,
            token_url,
            cached: RwLock::new(None),
        }
    }

    /// The configured application client id (sent as `Client-Id` on every
    /// Helix request).
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the cached token, refreshing it first when it is missing or
    /// inside the expiry margin.
    pub async fn get(&self) -> Result<AppToken, TwitchError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(TwitchError::MissingCredentials);
        }

        let margin = Duration::seconds(EXPIRY_MARGIN_SECS);
        if let Some(token) = self.cached.read().await.as_ref() {
            if Utc::now() + margin < token.expires_at {
                return Ok(token.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        *self.cached.write().await = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drops the cached token so the next `get` fetches a fresh one. Used
    /// when the upstream rejects a token before its reported expiry.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    async fn fetch_token(&self) -> Result<AppToken, TwitchError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self.http.post(&self.token_url).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(TwitchError::Request { status, body });
        }

        let body = response.text().await?;
        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            warn!(body = %body, error = %e, "Token response decode failed");
            TwitchError::Deserialize {
                context: "token response",
                source: e,
            }
        })?;

        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        info!(expires_at = %expires_at, "Obtained app access token");

        Ok(AppToken {
            access_token: token.access_token,
            expires_at,
        })
    }
}
