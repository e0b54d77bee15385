//! Twitch broadcast schedule → platform scheduled events.
//!
//! Full reconciliation per sync request, never incremental: the upcoming
//! segments are authoritative and managed events are always re-derivable.
//! Correlation between an event and its originating segment is established
//! only through the tag embedded in the event description, because start
//! times shift too often to be an identity.

use crate::error::CommandError;
use crate::gateway::{
    ChannelId, EventId, EventStatus, Gateway, GuildId, NewMessage, NewScheduledEvent,
    ScheduledEvent,
};
use crate::twitch::models::Segment;
use crate::twitch::TwitchClient;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Marker embedded in managed event descriptions, followed by
/// `<login>:<segment id>`.
const CORRELATION_TAG: &str = "twitch-segment:";

/// Upcoming segments mirrored per sync request.
const SYNC_LIMIT: usize = 10;

/// Mirrors one broadcaster's schedule into a guild's scheduled events.
pub struct ScheduleSync {
    twitch: Arc<TwitchClient>,
    gateway: Arc<dyn Gateway>,
}

/// Outcome of diffing segments against existing managed events.
#[derive(Debug, Default)]
struct SyncPlan {
    create: Vec<Segment>,
    delete: Vec<EventId>,
    matched: usize,
}

impl ScheduleSync {
    pub fn new(twitch: Arc<TwitchClient>, gateway: Arc<dyn Gateway>) -> Self {
        Self { twitch, gateway }
    }

    /// Reconciles the broadcaster's upcoming schedule into the guild.
    ///
    /// Stale events are removed inline; creation runs out-of-band (upstream
    /// rate limits make it slow) and reports back through `reply_channel`.
    pub async fn sync(
        &self,
        guild: GuildId,
        reply_channel: ChannelId,
        login: &str,
    ) -> Result<String, CommandError> {
        let login = login.to_lowercase();
        let users = self.twitch.users_by_login(std::slice::from_ref(&login)).await?;
        let user = users
            .get(&login)
            .ok_or_else(|| CommandError::User(format!("No Twitch channel named '{}'.", login)))?;

        let now = Utc::now();
        let segments: Vec<Segment> = self
            .twitch
            .schedule(&user.id)
            .filter(|segment| {
                let keep = !segment.is_canceled();
                async move { keep }
            })
            .take(SYNC_LIMIT)
            .collect()
            .await;

        let events = self.gateway.list_scheduled_events(guild).await?;
        let plan = plan(&login, &segments, &events, now);

        let mut deleted = 0;
        for event_id in &plan.delete {
            match self.gateway.delete_scheduled_event(guild, *event_id).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    warn!(guild_id = guild, event_id = event_id, error = %e, "Failed to delete stale scheduled event")
                }
            }
        }

        let creating = plan.create.len();
        if creating > 0 {
            let gateway = Arc::clone(&self.gateway);
            let to_create: Vec<NewScheduledEvent> = plan
                .create
                .iter()
                .map(|segment| to_event(&login, segment))
                .collect();
            let login = login.clone();

            tokio::spawn(async move {
                let mut created = 0;
                for event in to_create {
                    match gateway.create_scheduled_event(guild, event).await {
                        Ok(_) => created += 1,
                        Err(e) => {
                            warn!(guild_id = guild, error = %e, "Failed to create scheduled event")
                        }
                    }
                }
                info!(guild_id = guild, login = %login, created = created, "Schedule sync finished");
                let report = format!(
                    "Schedule sync for {}: created {} of {} events.",
                    login, created, creating
                );
                let reply = NewMessage {
                    content: report,
                    embed: None,
                };
                if let Err(e) = gateway.send_message(reply_channel, reply).await {
                    warn!(guild_id = guild, error = %e, "Failed to report schedule sync result");
                }
            });
        }

        Ok(format!(
            "Syncing schedule for {}: {} matched, {} queued for creation, {} removed.",
            login, plan.matched, creating, deleted
        ))
    }

    /// Deletes every managed event in the guild, optionally for one
    /// broadcaster only. Direct projection, no diffing.
    pub async fn delete(&self, guild: GuildId, login: Option<&str>) -> Result<String, CommandError> {
        let login = login.map(str::to_lowercase);
        let events = self.gateway.list_scheduled_events(guild).await?;

        let mut deleted = 0;
        for event in managed(&events, login.as_deref()) {
            match self.gateway.delete_scheduled_event(guild, event.id).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    warn!(guild_id = guild, event_id = event.id, error = %e, "Failed to delete scheduled event")
                }
            }
        }

        Ok(format!("Removed {} scheduled events.", deleted))
    }

    /// Lists managed events in the guild. Direct projection, no diffing.
    pub async fn list(&self, guild: GuildId, login: Option<&str>) -> Result<String, CommandError> {
        let login = login.map(str::to_lowercase);
        let events = self.gateway.list_scheduled_events(guild).await?;

        let lines: Vec<String> = managed(&events, login.as_deref())
            .map(|event| {
                format!(
                    "{} - {} ({:?})",
                    event.start_time.format("%Y-%m-%d %H:%M UTC"),
                    event.name,
                    event.status
                )
            })
            .collect();

        if lines.is_empty() {
            Ok("No managed scheduled events.".to_string())
        } else {
            Ok(lines.join("\n"))
        }
    }
}

/// Managed events, optionally restricted to one broadcaster.
fn managed<'a>(
    events: &'a [ScheduledEvent],
    login: Option<&'a str>,
) -> impl Iterator<Item = &'a ScheduledEvent> {
    events.iter().filter(move |event| {
        match correlation(&event.description) {
            Some((event_login, _)) => login.map(|l| l == event_login).unwrap_or(true),
            None => false,
        }
    })
}

/// Extracts `(login, segment id)` from a managed event description.
fn correlation(description: &str) -> Option<(&str, &str)> {
    let tail = description
        .lines()
        .find_map(|line| line.trim().strip_prefix(CORRELATION_TAG))?;
    tail.split_once(':')
}

fn event_description(login: &str, segment_id: &str) -> String {
    format!(
        "Planned broadcast by twitch.tv/{}.\n\n{}{}:{}",
        login, CORRELATION_TAG, login, segment_id
    )
}

fn to_event(login: &str, segment: &Segment) -> NewScheduledEvent {
    let name = if segment.title.is_empty() {
        format!("{} live", login)
    } else {
        segment.title.clone()
    };
    let mut description = event_description(login, &segment.id);
    if let Some(category) = &segment.category {
        description = format!("{}\nCategory: {}", description, category.name);
    }
    NewScheduledEvent {
        name,
        description,
        start_time: segment.start_time,
        end_time: segment.end_time,
    }
}

/// Matches segments to existing events and derives the create/delete sets.
///
/// A segment matches at most one event: correlation id, equal end time, and
/// a status/time-window compatibility check (an Active event must have
/// started; a Scheduled event must still start exactly when the segment
/// does). Unmatched not-yet-ended segments are created; managed events for
/// this broadcaster matching no segment are deleted.
fn plan(login: &str, segments: &[Segment], events: &[ScheduledEvent], now: DateTime<Utc>) -> SyncPlan {
    let candidates: Vec<&ScheduledEvent> = managed(events, Some(login)).collect();

    let mut matched: HashSet<EventId> = HashSet::new();
    let mut create = Vec::new();

    for segment in segments {
        let hit = candidates.iter().find(|event| {
            !matched.contains(&event.id) && matches_segment(event, login, segment, now)
        });
        match hit {
            Some(event) => {
                matched.insert(event.id);
            }
            None => {
                if segment.end_time > now {
                    create.push(segment.clone());
                }
            }
        }
    }

    let delete = candidates
        .iter()
        .filter(|event| !matched.contains(&event.id))
        .map(|event| event.id)
        .collect();

    SyncPlan {
        create,
        delete,
        matched: matched.len(),
    }
}

fn matches_segment(
    event: &ScheduledEvent,
    login: &str,
    segment: &Segment,
    now: DateTime<Utc>,
) -> bool {
    match correlation(&event.description) {
        Some((event_login, segment_id))
            if event_login == login && segment_id == segment.id => {}
        _ => return false,
    }

    if event.end_time != Some(segment.end_time) {
        return false;
    }

    match event.status {
        EventStatus::Active => event.start_time <= now,
        EventStatus::Scheduled => event.start_time == segment.start_time,
        _ => false,
    }
}
