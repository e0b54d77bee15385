//! Watchlist persistence.
//!
//! Each guild owns one watchlist document. Stores replace the whole document
//! on save (last-writer-wins); there is no partial update, which keeps a
//! concurrent tick and an operator command from interleaving half-written
//! state.

use crate::gateway::{ChannelId, GuildId, MessageId, RoleId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

/// One monitored broadcaster for one guild + destination channel pair.
///
/// Identity within a guild is (destination channel, normalized login);
/// `last_message_id` is the only field the reconciler mutates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredChannel {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    /// Normalized (lowercase) Twitch login.
    pub twitch_login: String,
    pub ping_role_id: Option<RoleId>,
    pub last_message_id: Option<MessageId>,
}

impl MonitoredChannel {
    pub fn key(&self) -> (ChannelId, &str) {
        (self.channel_id, self.twitch_login.as_str())
    }
}

/// Whole-document watchlist for one guild.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Watchlist {
    pub channels: Vec<MonitoredChannel>,
}

impl Watchlist {
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn find(&self, channel_id: ChannelId, login: &str) -> Option<&MonitoredChannel> {
        self.channels
            .iter()
            .find(|c| c.key() == (channel_id, login))
    }

    /// Adds a monitored channel; rejects duplicates of the same identity.
    pub fn add(&mut self, channel: MonitoredChannel) -> bool {
        if self.find(channel.channel_id, &channel.twitch_login).is_some() {
            return false;
        }
        self.channels.push(channel);
        true
    }

    /// Removes by identity; returns the removed entry.
    pub fn remove(&mut self, channel_id: ChannelId, login: &str) -> Option<MonitoredChannel> {
        let index = self
            .channels
            .iter()
            .position(|c| c.key() == (channel_id, login))?;
        Some(self.channels.remove(index))
    }
}

/// Per-guild watchlist storage.
///
/// `save` is an atomic whole-document replace; `load` of an unknown guild
/// yields an empty watchlist.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self, guild: GuildId) -> Result<Watchlist>;
    async fn save(&self, guild: GuildId, watchlist: &Watchlist) -> Result<()>;
}

/// Watchlist storage backed by SQLite: one row per guild holding the whole
/// serialized document. SQLite's ACID guarantees make the row replace
/// atomic; the connection sits behind a mutex for concurrent access.
pub struct SqliteConfigStore {
    conn: Mutex<Connection>,
}

impl SqliteConfigStore {
    /// Creates or opens a store. `:memory:` works for tests.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open watchlist database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS watchlists (
                guild_id INTEGER PRIMARY KEY,
                document TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create watchlists table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn load(&self, guild: GuildId) -> Result<Watchlist> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT document FROM watchlists WHERE guild_id = ?1")
            .context("Failed to prepare watchlist query")?;

        let mut rows = stmt
            .query(params![guild as i64])
            .context("Failed to query watchlist")?;

        match rows.next().context("Failed to read watchlist row")? {
            Some(row) => {
                let document: String = row.get(0)?;
                serde_json::from_str(&document).context("Failed to decode watchlist document")
            }
            None => Ok(Watchlist::default()),
        }
    }

    async fn save(&self, guild: GuildId, watchlist: &Watchlist) -> Result<()> {
        let document =
            serde_json::to_string(watchlist).context("Failed to encode watchlist document")?;
        let now = Utc::now().to_rfc3339();

        self.conn
            .lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO watchlists (guild_id, document, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(guild_id) DO UPDATE SET
                    document = excluded.document,
                    updated_at = excluded.updated_at
                "#,
                params![guild as i64, document, now],
            )
            .context("Failed to save watchlist")?;

        Ok(())
    }
}
