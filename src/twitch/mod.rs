//! Twitch Helix client.
//!
//! Batched typed queries over the Helix REST API. Batch inputs are chunked
//! (≤100 identifiers per request, repeated query parameters) and merged into
//! maps keyed by normalized lowercase identifier; identifiers the upstream
//! does not resolve are simply absent. Chunk failures propagate, except for
//! designated best-effort lookups.

pub mod auth;
pub mod models;
pub mod page;

use crate::error::TwitchError;
use auth::AppTokenCache;
use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const API_BASE_URL: &str = "https://api.twitch.tv/helix";

/// Maximum identifiers per batched Helix request.
const BATCH_LIMIT: usize = 100;

/// Segments requested per schedule page.
const SCHEDULE_PAGE_SIZE: &str = "25";

/// Typed Helix client sharing one HTTP connection pool and token cache.
pub struct TwitchClient {
    http: reqwest::Client,
    tokens: Arc<AppTokenCache>,
    base_url: String,
}

impl TwitchClient {
    pub fn new(http: reqwest::Client, tokens: Arc<AppTokenCache>) -> Self {
        Self::with_base_url(http, tokens, API_BASE_URL.to_string())
    }

    /// Create a client with a custom API base URL (for testing with a mock
    /// server).
    pub fn with_base_url(http: reqwest::Client, tokens: Arc<AppTokenCache>, base_url: String) -> Self {
        Self {
            http,
            tokens,
            base_url,
        }
    }

    /// Users by login name, keyed by lowercase login.
    pub async fn users_by_login(
        &self,
        logins: &[String],
    ) -> Result<HashMap<String, models::User>, TwitchError> {
        self.batched("/users", "login", logins, "users response", |u: &models::User| {
            u.login.clone()
        })
        .await
    }

    /// Live streams by login name, keyed by lowercase login. Logins absent
    /// from the result are offline.
    pub async fn streams_by_login(
        &self,
        logins: &[String],
    ) -> Result<HashMap<String, models::Stream>, TwitchError> {
        self.batched(
            "/streams",
            "user_login",
            logins,
            "streams response",
            |s: &models::Stream| s.user_login.clone(),
        )
        .await
    }

    /// Games by id, keyed by id.
    pub async fn games_by_id(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, models::Game>, TwitchError> {
        self.batched("/games", "id", ids, "games response", |g: &models::Game| {
            g.id.clone()
        })
        .await
    }

    /// Channel metadata by broadcaster id, keyed by broadcaster id.
    pub async fn channels_by_broadcaster(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, models::ChannelInfo>, TwitchError> {
        self.batched(
            "/channels",
            "broadcaster_id",
            ids,
            "channels response",
            |c: &models::ChannelInfo| c.broadcaster_id.clone(),
        )
        .await
    }

    /// The broadcaster's most recent archived broadcast. Best effort:
    /// upstream failures are swallowed and reported as "no archive".
    pub async fn last_broadcast(&self, user_id: &str) -> Option<models::Video> {
        let query = [("user_id", user_id), ("type", "archive"), ("first", "1")];
        match self
            .get_envelope::<models::Video>("/videos", &query, "videos response")
            .await
        {
            Ok(envelope) => envelope.data.into_iter().next(),
            Err(e) => {
                debug!(user_id = %user_id, error = %e, "Last broadcast lookup failed");
                None
            }
        }
    }

    /// The broadcaster's upcoming schedule as a lazy segment stream.
    ///
    /// Wraps the pagination driver; segments overlapping the broadcaster's
    /// vacation window are annotated cancelled-until-vacation-end but stay
    /// in the sequence. A failed page fetch is logged here and ends the
    /// stream.
    pub fn schedule<'a>(
        &'a self,
        broadcaster_id: &str,
    ) -> impl Stream<Item = models::Segment> + 'a {
        let broadcaster_id = broadcaster_id.to_string();
        page::paged(move |cursor| {
            let broadcaster_id = broadcaster_id.clone();
            async move {
                match self.schedule_page(&broadcaster_id, cursor.as_deref()).await {
                    Ok(page) => Some(page),
                    Err(e) => {
                        warn!(broadcaster_id = %broadcaster_id, error = %e, "Schedule page fetch failed");
                        None
                    }
                }
            }
        })
        .flat_map(|page| stream::iter(page.items))
    }

    async fn schedule_page(
        &self,
        broadcaster_id: &str,
        cursor: Option<&str>,
    ) -> Result<page::Page<models::Segment>, TwitchError> {
        let mut query = vec![
            ("broadcaster_id", broadcaster_id),
            ("first", SCHEDULE_PAGE_SIZE),
        ];
        if let Some(cursor) = cursor {
            query.push(("after", cursor));
        }

        let body = self.get("/schedule", &query).await?;
        let envelope: models::ScheduleEnvelope = decode("schedule response", &body)?;

        let mut segments = envelope.data.segments.unwrap_or_default();
        if let Some(vacation) = &envelope.data.vacation {
            for segment in segments.iter_mut() {
                if segment.canceled_until.is_none() && vacation.covers(segment) {
                    segment.canceled_until = Some(vacation.end_time);
                }
            }
        }

        Ok(page::Page {
            items: segments,
            cursor: envelope.pagination.cursor,
        })
    }

    /// Runs one batched lookup: chunks of ≤100 identifiers, one request per
    /// chunk, merged into a map keyed by the lowercased `key` of each item.
    async fn batched<T, K>(
        &self,
        path: &str,
        param: &'static str,
        ids: &[String],
        context: &'static str,
        key: K,
    ) -> Result<HashMap<String, T>, TwitchError>
    where
        T: DeserializeOwned,
        K: Fn(&T) -> String,
    {
        let mut merged = HashMap::new();
        for chunk in ids.chunks(BATCH_LIMIT) {
            let query: Vec<(&str, &str)> = chunk.iter().map(|id| (param, id.as_str())).collect();
            let envelope: models::Envelope<T> = self.get_envelope(path, &query, context).await?;
            for item in envelope.data {
                merged.insert(key(&item).to_lowercase(), item);
            }
        }
        Ok(merged)
    }

    async fn get_envelope<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        context: &'static str,
    ) -> Result<models::Envelope<T>, TwitchError> {
        let body = self.get(path, query).await?;
        decode(context, &body)
    }

    /// One authenticated GET against Helix, returning the raw body.
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<String, TwitchError> {
        let token = self.tokens.get().await?;
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .get(&url)
            .query(query)
            .bearer_auth(&token.access_token)
            .header("Client-Id", self.tokens.client_id())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // A rejected token before its reported expiry: drop it so the
            // next call starts from a fresh grant.
            if status.as_u16() == 401 {
                self.tokens.invalidate().await;
            }
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(TwitchError::Request {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.text().await?)
    }
}

fn decode<T: DeserializeOwned>(context: &'static str, body: &str) -> Result<T, TwitchError> {
    serde_json::from_str(body).map_err(|e| {
        warn!(context = context, body = %body, error = %e, "Helix response decode failed");
        TwitchError::Deserialize { context, source: e }
    })
}
