//! Announcement content.
//!
//! What a live or offline announcement looks like, which messages count as
//! live-styled, and which fields force an in-place edit. All pure functions;
//! the engine owns the side effects.

use crate::gateway::{Embed, Message, NewMessage, RoleId};
use crate::twitch::models::{ChannelInfo, Stream, Video};
use chrono::{DateTime, Duration, Utc};

/// Archive links older than this are not worth advertising.
const ARCHIVE_MAX_AGE_DAYS: i64 = 90;

/// Renders the live announcement for a stream. The role mention lives in the
/// content so the platform actually pings; everything else rides the embed.
pub fn live(stream: &Stream, game_name: Option<&str>, ping_role: Option<RoleId>) -> NewMessage {
    let content = match ping_role {
        Some(role) => format!("<@&{}> **{}** is live on Twitch!", role, stream.user_name),
        None => format!("**{}** is live on Twitch!", stream.user_name),
    };

    NewMessage {
        content,
        embed: Some(Embed {
            title: stream.title.clone(),
            url: Some(format!("https://www.twitch.tv/{}", stream.user_login)),
            category: game_name.map(str::to_string),
            started_at: Some(stream.started_at),
        }),
    }
}

/// Renders the offline summary: plain content, no embed, no mention. Includes
/// an archive link when the latest broadcast is recent enough.
pub fn offline(
    display_name: &str,
    channel: Option<&ChannelInfo>,
    archive: Option<&Video>,
    now: DateTime<Utc>,
) -> NewMessage {
    let mut content = format!("**{}** is offline.", display_name);

    if let Some(channel) = channel {
        if !channel.game_name.is_empty() {
            content.push_str(&format!(" Last seen playing {}.", channel.game_name));
        }
    }

    if let Some(url) = archive.and_then(|video| recent_archive_url(video, now)) {
        content.push_str(&format!("\nCatch the last broadcast: {}", url));
    }

    NewMessage {
        content,
        embed: None,
    }
}

/// Live announcements always carry an embed; offline rewrites never do.
pub fn is_live_styled(message: &Message) -> bool {
    message.embed.is_some()
}

/// True when any tracked field (content, title, category, start timestamp)
/// differs between the message as posted and the desired content. Untracked
/// embed fields never force an edit.
pub fn needs_edit(current: &Message, desired: &NewMessage) -> bool {
    if current.content != desired.content {
        return true;
    }

    let tracked = |embed: &Embed| {
        (
            embed.title.clone(),
            embed.category.clone(),
            embed.started_at,
        )
    };

    current.embed.as_ref().map(tracked) != desired.embed.as_ref().map(tracked)
}

fn recent_archive_url(video: &Video, now: DateTime<Utc>) -> Option<&str> {
    if now - video.created_at <= Duration::days(ARCHIVE_MAX_AGE_DAYS) {
        Some(video.url.as_str())
    } else {
        None
    }
}
