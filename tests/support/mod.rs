//! Shared fakes and Helix mocks for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use herald::error::GatewayError;
use herald::gateway::{
    ChannelId, EventId, EventStatus, Gateway, GuildId, Message, MessageId, NewMessage,
    NewScheduledEvent, ScheduledEvent, Webhook,
};
use herald::store::{ConfigStore, Watchlist};
use herald::twitch::auth::AppTokenCache;
use herald::twitch::TwitchClient;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// The managed webhook identity every fake channel hands out.
pub const WEBHOOK_ID: u64 = 9000;

/// Author id used for plain (non-webhook) sends.
pub const BOT_USER_ID: u64 = 1;

#[derive(Debug, Default, Clone, Copy)]
pub struct Counters {
    pub sends: u64,
    pub edits: u64,
    pub deletes: u64,
    pub events_created: u64,
    pub events_deleted: u64,
}

/// In-memory chat platform with scripted failures.
pub struct FakeGateway {
    guilds: Vec<GuildId>,
    next_id: AtomicU64,
    pub messages: Mutex<HashMap<ChannelId, Vec<Message>>>,
    pub events: Mutex<HashMap<GuildId, Vec<ScheduledEvent>>>,
    pub presence: Mutex<Option<String>>,
    pub counters: Mutex<Counters>,
    /// Channels scripted to fail every message operation with a permission
    /// error.
    pub broken_channels: Mutex<HashSet<ChannelId>>,
    pub fail_presence: Mutex<bool>,
}

impl FakeGateway {
    pub fn new(guilds: Vec<GuildId>) -> Arc<Self> {
        Arc::new(Self {
            guilds,
            next_id: AtomicU64::new(100),
            messages: Mutex::new(HashMap::new()),
            events: Mutex::new(HashMap::new()),
            presence: Mutex::new(None),
            counters: Mutex::new(Counters::default()),
            broken_channels: Mutex::new(HashSet::new()),
            fail_presence: Mutex::new(false),
        })
    }

    fn check(&self, channel: ChannelId) -> Result<(), GatewayError> {
        if self.broken_channels.lock().unwrap().contains(&channel) {
            Err(GatewayError::Permission("missing channel access".to_string()))
        } else {
            Ok(())
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn counters(&self) -> Counters {
        *self.counters.lock().unwrap()
    }

    pub fn message_count(&self, channel: ChannelId) -> usize {
        self.messages
            .lock()
            .unwrap()
            .get(&channel)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn first_message(&self, channel: ChannelId) -> Message {
        self.messages.lock().unwrap()[&channel][0].clone()
    }

    /// Drops a message as if a moderator deleted it out from under us.
    pub fn remove_message(&self, channel: ChannelId, message: MessageId) {
        if let Some(list) = self.messages.lock().unwrap().get_mut(&channel) {
            list.retain(|m| m.id != message);
        }
    }

    /// Places a webhook-authored message into history without touching the
    /// counters, as if it survived from an earlier process.
    pub fn seed_webhook_message(&self, channel: ChannelId, content: NewMessage) -> MessageId {
        let id = self.next_id();
        self.messages.lock().unwrap().entry(channel).or_default().push(Message {
            id,
            channel_id: channel,
            author_id: WEBHOOK_ID,
            content: content.content,
            embed: content.embed,
        });
        id
    }

    pub fn event_count(&self, guild: GuildId) -> usize {
        self.events
            .lock()
            .unwrap()
            .get(&guild)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn guild_events(&self, guild: GuildId) -> Vec<ScheduledEvent> {
        self.events
            .lock()
            .unwrap()
            .get(&guild)
            .cloned()
            .unwrap_or_default()
    }

    /// Seeds a scheduled event directly, bypassing the counters.
    pub fn seed_event(&self, guild: GuildId, description: &str) -> EventId {
        let id = self.next_id();
        self.events.lock().unwrap().entry(guild).or_default().push(ScheduledEvent {
            id,
            name: "seeded".to_string(),
            description: description.to_string(),
            start_time: chrono::Utc::now() + chrono::Duration::hours(1),
            end_time: Some(chrono::Utc::now() + chrono::Duration::hours(2)),
            status: EventStatus::Scheduled,
        });
        id
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn list_guilds(&self) -> Result<Vec<GuildId>, GatewayError> {
        Ok(self.guilds.clone())
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        message: NewMessage,
    ) -> Result<Message, GatewayError> {
        self.check(channel)?;
        let sent = Message {
            id: self.next_id(),
            channel_id: channel,
            author_id: BOT_USER_ID,
            content: message.content,
            embed: message.embed,
        };
        self.messages.lock().unwrap().entry(channel).or_default().push(sent.clone());
        self.counters.lock().unwrap().sends += 1;
        Ok(sent)
    }

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: NewMessage,
    ) -> Result<(), GatewayError> {
        self.check(channel)?;
        let mut messages = self.messages.lock().unwrap();
        let found = messages
            .get_mut(&channel)
            .and_then(|list| list.iter_mut().find(|m| m.id == message));
        match found {
            Some(existing) => {
                existing.content = content.content;
                existing.embed = content.embed;
                self.counters.lock().unwrap().edits += 1;
                Ok(())
            }
            None => Err(GatewayError::NotFound),
        }
    }

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), GatewayError> {
        self.check(channel)?;
        let mut messages = self.messages.lock().unwrap();
        let list = messages.get_mut(&channel).ok_or(GatewayError::NotFound)?;
        let before = list.len();
        list.retain(|m| m.id != message);
        if list.len() == before {
            return Err(GatewayError::NotFound);
        }
        self.counters.lock().unwrap().deletes += 1;
        Ok(())
    }

    async fn get_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<Option<Message>, GatewayError> {
        self.check(channel)?;
        Ok(self
            .messages
            .lock()
            .unwrap()
            .get(&channel)
            .and_then(|list| list.iter().find(|m| m.id == message).cloned()))
    }

    async fn list_recent_messages(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<Message>, GatewayError> {
        self.check(channel)?;
        let messages = self.messages.lock().unwrap();
        let list = messages.get(&channel).cloned().unwrap_or_default();
        Ok(list.into_iter().rev().take(limit).collect())
    }

    async fn get_or_create_webhook(&self, channel: ChannelId) -> Result<Webhook, GatewayError> {
        self.check(channel)?;
        Ok(Webhook {
            id: WEBHOOK_ID,
            token: "hook-token".to_string(),
        })
    }

    async fn execute_webhook(
        &self,
        webhook: &Webhook,
        channel: ChannelId,
        message: NewMessage,
    ) -> Result<Message, GatewayError> {
        self.check(channel)?;
        let sent = Message {
            id: self.next_id(),
            channel_id: channel,
            author_id: webhook.id,
            content: message.content,
            embed: message.embed,
        };
        self.messages.lock().unwrap().entry(channel).or_default().push(sent.clone());
        self.counters.lock().unwrap().sends += 1;
        Ok(sent)
    }

    async fn publish_message(
        &self,
        _channel: ChannelId,
        _message: MessageId,
    ) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn create_scheduled_event(
        &self,
        guild: GuildId,
        event: NewScheduledEvent,
    ) -> Result<ScheduledEvent, GatewayError> {
        let created = ScheduledEvent {
            id: self.next_id(),
            name: event.name,
            description: event.description,
            start_time: event.start_time,
            end_time: Some(event.end_time),
            status: EventStatus::Scheduled,
        };
        self.events.lock().unwrap().entry(guild).or_default().push(created.clone());
        self.counters.lock().unwrap().events_created += 1;
        Ok(created)
    }

    async fn delete_scheduled_event(
        &self,
        guild: GuildId,
        event: EventId,
    ) -> Result<(), GatewayError> {
        let mut events = self.events.lock().unwrap();
        let list = events.get_mut(&guild).ok_or(GatewayError::NotFound)?;
        let before = list.len();
        list.retain(|e| e.id != event);
        if list.len() == before {
            return Err(GatewayError::NotFound);
        }
        self.counters.lock().unwrap().events_deleted += 1;
        Ok(())
    }

    async fn list_scheduled_events(
        &self,
        guild: GuildId,
    ) -> Result<Vec<ScheduledEvent>, GatewayError> {
        Ok(self.guild_events(guild))
    }

    async fn set_presence(&self, text: &str) -> Result<(), GatewayError> {
        if *self.fail_presence.lock().unwrap() {
            return Err(GatewayError::Transient("presence gateway down".to_string()));
        }
        *self.presence.lock().unwrap() = Some(text.to_string());
        Ok(())
    }
}

/// In-memory watchlist store.
#[derive(Default)]
pub struct MemoryStore {
    pub data: Mutex<HashMap<GuildId, Watchlist>>,
    pub saves: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, guild: GuildId, watchlist: Watchlist) {
        self.data.lock().unwrap().insert(guild, watchlist);
    }

    pub fn watchlist(&self, guild: GuildId) -> Watchlist {
        self.data.lock().unwrap().get(&guild).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn load(&self, guild: GuildId) -> anyhow::Result<Watchlist> {
        Ok(self.watchlist(guild))
    }

    async fn save(&self, guild: GuildId, watchlist: &Watchlist) -> anyhow::Result<()> {
        self.data.lock().unwrap().insert(guild, watchlist.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A mockito-backed Helix upstream plus a client wired to it.
///
/// Dropping a mockito mock handle deregisters it, so permanently mounted
/// mocks are parked in `keep`; scenario tests that swap upstream state
/// between ticks use the scoped variants and manage the handles themselves.
pub struct Helix {
    pub server: mockito::ServerGuard,
    keep: Vec<mockito::Mock>,
}

impl Helix {
    /// Starts the mock upstream with a permanently valid token endpoint.
    pub async fn start() -> Self {
        let mut server = mockito::Server::new_async().await;
        let token = server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok","expires_in":3600,"token_type":"bearer"}"#)
            .create_async()
            .await;
        Self {
            server,
            keep: vec![token],
        }
    }

    pub fn client(&self) -> Arc<TwitchClient> {
        let http = reqwest::Client::new();
        let tokens = Arc::new(AppTokenCache::with_token_url(
            http.clone(),
            "id".to_string(),
            "secret".to_string(),
            format!("{}/oauth2/token", self.server.url()),
        ));
        Arc::new(TwitchClient::with_base_url(http, tokens, self.server.url()))
    }

    /// Mounts a GET mock for `path` answering any query and keeps it alive
    /// for the server's lifetime.
    pub async fn mock_get(&mut self, path: &str, body: String) {
        let mock = self.mock_get_scoped(path, body).await;
        self.keep.push(mock);
    }

    pub async fn mock_empty(&mut self, path: &str) {
        self.mock_get(path, r#"{"data":[]}"#.to_string()).await;
    }

    /// Mounts a GET mock whose handle the caller owns; dropping or removing
    /// it takes the mock down again, which scenario tests use to change
    /// upstream state between ticks.
    pub async fn mock_get_scoped(&mut self, path: &str, body: String) -> mockito::Mock {
        self.server
            .mock("GET", path)
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }
}

pub fn user_json(id: &str, login: &str) -> String {
    format!(
        r#"{{"id":"{id}","login":"{login}","display_name":"{login}","profile_image_url":""}}"#
    )
}

pub fn stream_json(login: &str, title: &str, game_id: &str) -> String {
    format!(
        r#"{{"user_id":"1","user_login":"{login}","user_name":"{login}",
            "game_id":"{game_id}","title":"{title}","started_at":"2026-08-01T10:00:00Z"}}"#
    )
}

pub fn game_json(id: &str, name: &str) -> String {
    format!(r#"{{"id":"{id}","name":"{name}"}}"#)
}

pub fn data_body(items: &[String]) -> String {
    format!(r#"{{"data":[{}]}}"#, items.join(","))
}

/// An archive uploaded three days ago, well inside the recency window.
pub fn video_json(url: &str) -> String {
    let created = (chrono::Utc::now() - chrono::Duration::days(3))
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    format!(r#"{{"id":"v1","title":"vod","url":"{url}","created_at":"{created}"}}"#)
}

pub fn segment_json(
    id: &str,
    title: &str,
    start: chrono::DateTime<chrono::Utc>,
    end: chrono::DateTime<chrono::Utc>,
    canceled: bool,
) -> String {
    let canceled_until = if canceled {
        format!(r#""{}""#, end.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
    } else {
        "null".to_string()
    };
    format!(
        r#"{{"id":"{id}","title":"{title}",
            "start_time":"{}","end_time":"{}",
            "canceled_until":{canceled_until},"category":null}}"#,
        start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        end.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    )
}

/// A parsed stream model for building expected announcement content.
pub fn stream_model(login: &str, title: &str, game_id: &str) -> herald::twitch::models::Stream {
    serde_json::from_str(&stream_json(login, title, game_id)).unwrap()
}
