//! Operator command surface.
//!
//! The chat front end parses operator input and calls these; each returns a
//! short outcome string for relay, or `CommandError::User` with a message to
//! show verbatim.

use crate::announce::Poller;
use crate::error::CommandError;
use crate::gateway::{ChannelId, Gateway, GuildId, RoleId};
use crate::schedule::ScheduleSync;
use crate::store::{ConfigStore, MonitoredChannel};
use crate::twitch::TwitchClient;
use std::sync::Arc;
use tracing::{debug, info};

/// Poller state reported to the front end.
#[derive(Debug, Clone, Copy)]
pub struct Status {
    pub running: bool,
}

pub struct Commands {
    twitch: Arc<TwitchClient>,
    gateway: Arc<dyn Gateway>,
    store: Arc<dyn ConfigStore>,
    poller: Arc<Poller>,
    schedule: ScheduleSync,
}

impl Commands {
    pub fn new(
        twitch: Arc<TwitchClient>,
        gateway: Arc<dyn Gateway>,
        store: Arc<dyn ConfigStore>,
        poller: Arc<Poller>,
        schedule: ScheduleSync,
    ) -> Self {
        Self {
            twitch,
            gateway,
            store,
            poller,
            schedule,
        }
    }

    /// Starts monitoring a broadcaster in a destination channel.
    pub async fn add(
        &self,
        guild: GuildId,
        channel: ChannelId,
        login: &str,
        ping_role: Option<RoleId>,
    ) -> Result<String, CommandError> {
        let login = normalize_login(login);
        if login.is_empty() {
            return Err(CommandError::User("A Twitch channel name is required.".to_string()));
        }

        let users = self.twitch.users_by_login(std::slice::from_ref(&login)).await?;
        if !users.contains_key(&login) {
            return Err(CommandError::User(format!(
                "No Twitch channel named '{}'.",
                login
            )));
        }

        let mut watchlist = self.store.load(guild).await?;
        let added = watchlist.add(MonitoredChannel {
            guild_id: guild,
            channel_id: channel,
            twitch_login: login.clone(),
            ping_role_id: ping_role,
            last_message_id: None,
        });
        if !added {
            return Err(CommandError::User(format!(
                "'{}' is already monitored in <#{}>.",
                login, channel
            )));
        }
        self.store.save(guild, &watchlist).await?;

        info!(guild_id = guild, channel_id = channel, login = %login, "Monitored channel added");
        Ok(format!("Now monitoring twitch.tv/{} in <#{}>.", login, channel))
    }

    /// Stops monitoring a broadcaster; its announcement message is removed
    /// best-effort.
    pub async fn remove(
        &self,
        guild: GuildId,
        channel: ChannelId,
        login: &str,
    ) -> Result<String, CommandError> {
        let login = normalize_login(login);

        let mut watchlist = self.store.load(guild).await?;
        let removed = watchlist.remove(channel, &login).ok_or_else(|| {
            CommandError::User(format!("'{}' is not monitored in <#{}>.", login, channel))
        })?;
        self.store.save(guild, &watchlist).await?;

        if let Some(message_id) = removed.last_message_id {
            if let Err(e) = self.gateway.delete_message(channel, message_id).await {
                debug!(channel_id = channel, message_id = message_id, error = %e, "Failed to delete announcement on remove");
            }
        }

        info!(guild_id = guild, channel_id = channel, login = %login, "Monitored channel removed");
        Ok(format!("Stopped monitoring twitch.tv/{}.", login))
    }

    /// Lists the guild's monitored channels.
    pub async fn list(&self, guild: GuildId) -> Result<String, CommandError> {
        let watchlist = self.store.load(guild).await?;
        if watchlist.is_empty() {
            return Ok("Nothing is monitored in this guild.".to_string());
        }

        let lines: Vec<String> = watchlist
            .channels
            .iter()
            .map(|entry| {
                let ping = match entry.ping_role_id {
                    Some(role) => format!(" (pings <@&{}>)", role),
                    None => String::new(),
                };
                format!("<#{}>: twitch.tv/{}{}", entry.channel_id, entry.twitch_login, ping)
            })
            .collect();
        Ok(lines.join("\n"))
    }

    /// Reports whether the reconciliation loop is running.
    pub fn status(&self) -> Status {
        Status {
            running: self.poller.is_running(),
        }
    }

    /// Deletes every stored announcement message in the guild and clears the
    /// bookkeeping; the next tick recreates messages for live channels.
    pub async fn cleanup(&self, guild: GuildId) -> Result<String, CommandError> {
        let mut watchlist = self.store.load(guild).await?;

        let mut removed = 0;
        for entry in watchlist.channels.iter_mut() {
            if let Some(message_id) = entry.last_message_id.take() {
                match self.gateway.delete_message(entry.channel_id, message_id).await {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        debug!(channel_id = entry.channel_id, message_id = message_id, error = %e, "Cleanup delete failed")
                    }
                }
            }
        }
        self.store.save(guild, &watchlist).await?;

        Ok(format!("Removed {} announcement messages.", removed))
    }

    /// Mirrors a broadcaster's schedule into the guild's scheduled events.
    pub async fn schedule_sync(
        &self,
        guild: GuildId,
        reply_channel: ChannelId,
        login: &str,
    ) -> Result<String, CommandError> {
        self.schedule.sync(guild, reply_channel, login).await
    }

    /// Deletes managed scheduled events, optionally for one broadcaster.
    pub async fn schedule_delete(
        &self,
        guild: GuildId,
        login: Option<&str>,
    ) -> Result<String, CommandError> {
        self.schedule.delete(guild, login).await
    }

    /// Lists managed scheduled events, optionally for one broadcaster.
    pub async fn schedule_list(
        &self,
        guild: GuildId,
        login: Option<&str>,
    ) -> Result<String, CommandError> {
        self.schedule.list(guild, login).await
    }
}

/// Normalizes operator input to a bare lowercase login: trims whitespace,
/// a leading `@`, and any pasted URL prefix.
fn normalize_login(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('@');
    let bare = trimmed.rsplit('/').next().unwrap_or(trimmed);
    bare.to_lowercase()
}
