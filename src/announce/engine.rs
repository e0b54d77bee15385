//! Live-announcement reconciliation.
//!
//! One tick gathers batched Twitch state for every monitored channel across
//! every guild, then converges each target's announcement message with the
//! minimal create/edit/delete. Targets fail independently: a timeout or
//! gateway error skips that target alone and the next tick retries it.

use super::message;
use crate::config::PollConfig;
use crate::error::GatewayError;
use crate::gateway::{ChannelId, Gateway, GuildId, Message, MessageId, Webhook};
use crate::store::{ConfigStore, MonitoredChannel, Watchlist};
use crate::twitch::{models, TwitchClient};
use anyhow::{Context, Result};
use chrono::Utc;
use dashmap::DashMap;
use futures::future;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Recent-history window scanned when a stored message id stops resolving.
const RECOVERY_WINDOW: usize = 30;

/// Reconciles announcement messages against live Twitch state.
pub struct AnnounceEngine {
    twitch: Arc<TwitchClient>,
    gateway: Arc<dyn Gateway>,
    store: Arc<dyn ConfigStore>,
    /// Webhook handle per destination channel, get-or-create memoized.
    webhooks: DashMap<ChannelId, Webhook>,
    target_timeout: Duration,
    guild_concurrency: usize,
}

/// What one tick did, for the poller's log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TickSummary {
    pub guilds: usize,
    pub targets: usize,
    pub live: usize,
    pub skipped: usize,
}

/// Batched Twitch state shared by every target in a tick.
struct TickState {
    streams: HashMap<String, models::Stream>,
    games: HashMap<String, models::Game>,
    users: HashMap<String, models::User>,
    channels: HashMap<String, models::ChannelInfo>,
}

impl AnnounceEngine {
    pub fn new(
        twitch: Arc<TwitchClient>,
        gateway: Arc<dyn Gateway>,
        store: Arc<dyn ConfigStore>,
        poll: &PollConfig,
    ) -> Self {
        Self {
            twitch,
            gateway,
            store,
            webhooks: DashMap::new(),
            target_timeout: Duration::from_secs(poll.target_timeout_secs),
            guild_concurrency: poll.guild_concurrency.max(1),
        }
    }

    /// One reconciliation pass over every guild.
    pub async fn run_tick(&self) -> Result<TickSummary> {
        let guilds = self
            .gateway
            .list_guilds()
            .await
            .context("Failed to list guilds")?;

        let mut watchlists: Vec<(GuildId, Watchlist)> = Vec::new();
        for guild in guilds {
            match self.store.load(guild).await {
                Ok(watchlist) if !watchlist.is_empty() => watchlists.push((guild, watchlist)),
                Ok(_) => {}
                Err(e) => {
                    warn!(guild_id = guild, error = %e, "Failed to load watchlist, skipping guild")
                }
            }
        }

        let logins: Vec<String> = watchlists
            .iter()
            .flat_map(|(_, w)| w.channels.iter().map(|c| c.twitch_login.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut summary = TickSummary {
            guilds: watchlists.len(),
            ..Default::default()
        };
        if logins.is_empty() {
            return Ok(summary);
        }

        let state = self.gather(&logins).await?;
        summary.live = logins
            .iter()
            .filter(|login| state.streams.contains_key(login.as_str()))
            .count();

        let outcomes: Vec<(usize, usize)> = stream::iter(watchlists)
            .map(|(guild, watchlist)| self.reconcile_guild(guild, watchlist, &state))
            .buffer_unordered(self.guild_concurrency)
            .collect()
            .await;
        for (targets, skipped) in outcomes {
            summary.targets += targets;
            summary.skipped += skipped;
        }

        // Best-effort presence line; failures never fail the tick.
        let presence = match summary.live {
            0 => "no streams live".to_string(),
            1 => "1 stream live".to_string(),
            n => format!("{} streams live", n),
        };
        if let Err(e) = self.gateway.set_presence(&presence).await {
            debug!(error = %e, "Presence update failed");
        }

        Ok(summary)
    }

    /// Batched Twitch lookups for a tick. Stream state is load-bearing and
    /// aborts the tick on failure; the joins (games, users, channel info)
    /// are cosmetic and degrade to empty maps.
    async fn gather(&self, logins: &[String]) -> Result<TickState> {
        let streams = self
            .twitch
            .streams_by_login(logins)
            .await
            .context("Failed to fetch stream state")?;

        let game_ids: Vec<String> = streams
            .values()
            .map(|s| s.game_id.clone())
            .filter(|id| !id.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let games = match self.twitch.games_by_id(&game_ids).await {
            Ok(games) => games,
            Err(e) => {
                warn!(error = %e, "Game lookup failed, continuing without category labels");
                HashMap::new()
            }
        };

        let users = match self.twitch.users_by_login(logins).await {
            Ok(users) => users,
            Err(e) => {
                warn!(error = %e, "User lookup failed, continuing without profiles");
                HashMap::new()
            }
        };

        let offline_ids: Vec<String> = users
            .values()
            .filter(|user| !streams.contains_key(&user.login.to_lowercase()))
            .map(|user| user.id.clone())
            .collect();
        let channels = match self.twitch.channels_by_broadcaster(&offline_ids).await {
            Ok(channels) => channels,
            Err(e) => {
                warn!(error = %e, "Channel info lookup failed");
                HashMap::new()
            }
        };

        Ok(TickState {
            streams,
            games,
            users,
            channels,
        })
    }

    /// Reconciles every target in one guild concurrently, then persists the
    /// guild's bookkeeping once. Returns (targets, skipped).
    async fn reconcile_guild(
        &self,
        guild: GuildId,
        mut watchlist: Watchlist,
        state: &TickState,
    ) -> (usize, usize) {
        let updates = future::join_all(watchlist.channels.iter().cloned().map(|target| {
            async move {
                let result = tokio::time::timeout(
                    self.target_timeout,
                    self.reconcile_target(&target, state),
                )
                .await;
                match result {
                    Ok(Ok(last_message_id)) => {
                        Some((target.channel_id, target.twitch_login, last_message_id))
                    }
                    Ok(Err(e)) => {
                        warn!(
                            guild_id = guild,
                            channel_id = target.channel_id,
                            login = %target.twitch_login,
                            error = %e,
                            "Target update failed, skipping"
                        );
                        None
                    }
                    Err(_) => {
                        warn!(
                            guild_id = guild,
                            channel_id = target.channel_id,
                            login = %target.twitch_login,
                            "Target update timed out, skipping"
                        );
                        None
                    }
                }
            }
        }))
        .await;

        let targets = updates.len();
        let mut skipped = 0;
        let mut dirty = false;
        for update in updates {
            match update {
                Some((channel_id, login, last_message_id)) => {
                    if let Some(entry) = watchlist
                        .channels
                        .iter_mut()
                        .find(|c| c.key() == (channel_id, login.as_str()))
                    {
                        if entry.last_message_id != last_message_id {
                            entry.last_message_id = last_message_id;
                            dirty = true;
                        }
                    }
                }
                None => skipped += 1,
            }
        }

        if dirty {
            if let Err(e) = self.store.save(guild, &watchlist).await {
                warn!(guild_id = guild, error = %e, "Failed to persist watchlist bookkeeping");
            }
        }

        (targets, skipped)
    }

    /// Applies the transition rules for one target; returns the message id
    /// to keep in the bookkeeping (None when no announcement exists).
    async fn reconcile_target(
        &self,
        target: &MonitoredChannel,
        state: &TickState,
    ) -> Result<Option<MessageId>> {
        let login = target.twitch_login.as_str();
        let stream = state.streams.get(login);

        // Resolve the stored message; a dangling id triggers the bounded
        // history-scan recovery.
        let current = match target.last_message_id {
            Some(id) => match self.gateway.get_message(target.channel_id, id).await? {
                Some(current) => Some(current),
                None => self.recover(target).await?,
            },
            None => None,
        };

        match (stream, current) {
            (None, None) => Ok(None),

            (None, Some(current)) => {
                if !message::is_live_styled(&current) {
                    // Already rewritten on an earlier tick
                    return Ok(Some(current.id));
                }
                let user = state.users.get(login);
                let archive = match user {
                    Some(user) => self.twitch.last_broadcast(&user.id).await,
                    None => None,
                };
                let channel_info = user.and_then(|u| state.channels.get(&u.id));
                let display = user.map(|u| u.display_name.as_str()).unwrap_or(login);
                let desired = message::offline(display, channel_info, archive.as_ref(), Utc::now());
                self.gateway
                    .edit_message(target.channel_id, current.id, desired)
                    .await?;
                debug!(channel_id = target.channel_id, login = %login, "Rewrote announcement to offline");
                Ok(Some(current.id))
            }

            (Some(stream), current) => {
                let game_name = state.games.get(&stream.game_id).map(|g| g.name.as_str());
                let desired = message::live(stream, game_name, target.ping_role_id);

                match current {
                    Some(current) if message::is_live_styled(&current) => {
                        if message::needs_edit(&current, &desired) {
                            self.gateway
                                .edit_message(target.channel_id, current.id, desired)
                                .await?;
                            debug!(channel_id = target.channel_id, login = %login, "Edited live announcement");
                        }
                        Ok(Some(current.id))
                    }
                    stale => {
                        // A stale offline-styled message cannot be upgraded
                        // in place, so replace it and let the announcement ping.
                        if let Some(stale) = stale {
                            if let Err(e) = self
                                .gateway
                                .delete_message(target.channel_id, stale.id)
                                .await
                            {
                                debug!(channel_id = target.channel_id, error = %e, "Failed to delete stale announcement");
                            }
                        }
                        let webhook = self.webhook_for(target.channel_id).await?;
                        let sent = self
                            .gateway
                            .execute_webhook(&webhook, target.channel_id, desired)
                            .await?;
                        if let Err(e) = self
                            .gateway
                            .publish_message(target.channel_id, sent.id)
                            .await
                        {
                            debug!(channel_id = target.channel_id, error = %e, "Crosspost failed");
                        }
                        info!(channel_id = target.channel_id, login = %login, "Announced live stream");
                        Ok(Some(sent.id))
                    }
                }
            }
        }
    }

    /// The stored id no longer resolves (deleted externally). Scan a bounded
    /// window of recent channel history for a message from the managed
    /// webhook identity and adopt it.
    async fn recover(&self, target: &MonitoredChannel) -> Result<Option<Message>, GatewayError> {
        let webhook = self.webhook_for(target.channel_id).await?;
        let recent = self
            .gateway
            .list_recent_messages(target.channel_id, RECOVERY_WINDOW)
            .await?;
        let adopted = recent.into_iter().find(|m| m.author_id == webhook.id);
        if let Some(adopted) = &adopted {
            debug!(
                channel_id = target.channel_id,
                message_id = adopted.id,
                "Adopted announcement from channel history"
            );
        }
        Ok(adopted)
    }

    async fn webhook_for(&self, channel: ChannelId) -> Result<Webhook, GatewayError> {
        if let Some(webhook) = self.webhooks.get(&channel) {
            return Ok(webhook.value().clone());
        }
        let webhook = self.gateway.get_or_create_webhook(channel).await?;
        // Concurrent targets sharing a channel can race here; upstream
        // creation is idempotent, so the last writer wins with an
        // equivalent handle.
        self.webhooks.insert(channel, webhook.clone());
        Ok(webhook)
    }
}
