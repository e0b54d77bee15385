//! Chat-platform gateway contract.
//!
//! Herald reaches the chat platform exclusively through this trait; the
//! transport crate supplies the implementation. Only the message fields that
//! drive reconciliation decisions are modeled; everything else about
//! rendering is the transport's business.

use crate::error::GatewayError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type GuildId = u64;
pub type ChannelId = u64;
pub type MessageId = u64;
pub type RoleId = u64;
pub type WebhookId = u64;
pub type EventId = u64;

/// A message as the gateway reports it.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    /// The posting identity; webhook-delivered messages carry the webhook id.
    pub author_id: u64,
    pub content: String,
    pub embed: Option<Embed>,
}

/// The announcement-relevant slice of a message embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    pub url: Option<String>,
    pub category: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Content for a message to be sent or edited.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub content: String,
    pub embed: Option<Embed>,
}

/// A webhook handle: the stable managed sender identity for announcements.
#[derive(Debug, Clone)]
pub struct Webhook {
    pub id: WebhookId,
    pub token: String,
}

/// Lifecycle status of a platform scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Scheduled,
    Active,
    Completed,
    Canceled,
}

/// A platform scheduled event. Managed events embed their originating
/// segment's correlation id in the description.
#[derive(Debug, Clone)]
pub struct ScheduledEvent {
    pub id: EventId,
    pub name: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: EventStatus,
}

/// A scheduled event to be created.
#[derive(Debug, Clone)]
pub struct NewScheduledEvent {
    pub name: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Asynchronous chat-platform operations. All calls may fail with transient
/// network or permission errors; callers isolate failures per target.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Every guild this process serves.
    async fn list_guilds(&self) -> Result<Vec<GuildId>, GatewayError>;

    async fn send_message(
        &self,
        channel: ChannelId,
        message: NewMessage,
    ) -> Result<Message, GatewayError>;

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: NewMessage,
    ) -> Result<(), GatewayError>;

    async fn delete_message(&self, channel: ChannelId, message: MessageId)
        -> Result<(), GatewayError>;

    /// `Ok(None)` when the message no longer exists (deleted externally).
    async fn get_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<Option<Message>, GatewayError>;

    /// Most recent messages first, at most `limit`.
    async fn list_recent_messages(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<Message>, GatewayError>;

    /// Returns the managed webhook for a channel, creating it on first use.
    /// Creation is idempotent from the platform's perspective.
    async fn get_or_create_webhook(&self, channel: ChannelId) -> Result<Webhook, GatewayError>;

    /// Posts through the managed webhook identity.
    async fn execute_webhook(
        &self,
        webhook: &Webhook,
        channel: ChannelId,
        message: NewMessage,
    ) -> Result<Message, GatewayError>;

    /// Crossposts to followers. No-op for channel kinds without the
    /// capability.
    async fn publish_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), GatewayError>;

    async fn create_scheduled_event(
        &self,
        guild: GuildId,
        event: NewScheduledEvent,
    ) -> Result<ScheduledEvent, GatewayError>;

    async fn delete_scheduled_event(
        &self,
        guild: GuildId,
        event: EventId,
    ) -> Result<(), GatewayError>;

    async fn list_scheduled_events(
        &self,
        guild: GuildId,
    ) -> Result<Vec<ScheduledEvent>, GatewayError>;

    /// Best-effort presence line ("3 streams live").
    async fn set_presence(&self, text: &str) -> Result<(), GatewayError>;
}
