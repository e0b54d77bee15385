//! Helix wire types.
//!
//! Only the fields that drive reconciliation decisions are kept; everything
//! else in the upstream payloads is ignored by serde.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Standard Helix list envelope: `{"data": [...], "pagination": {"cursor"}}`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub cursor: Option<String>,
}

/// A Twitch user (`GET /users`).
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub login: String,
    pub display_name: String,
    #[serde(default)]
    pub profile_image_url: String,
}

/// A live broadcast (`GET /streams`). Helix only returns currently-live
/// streams, so presence in a result set means "live".
#[derive(Debug, Clone, Deserialize)]
pub struct Stream {
    pub user_id: String,
    pub user_login: String,
    pub user_name: String,
    #[serde(default)]
    pub game_id: String,
    pub title: String,
    pub started_at: DateTime<Utc>,
}

/// A game/category (`GET /games`), joined onto streams by id.
#[derive(Debug, Clone, Deserialize)]
pub struct Game {
    pub id: String,
    pub name: String,
}

/// Channel metadata (`GET /channels`), used for offline summaries.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelInfo {
    pub broadcaster_id: String,
    pub broadcaster_login: String,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub title: String,
}

/// An archived broadcast (`GET /videos?type=archive`).
#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Schedule envelope (`GET /schedule`): the data member is an object, not a
/// list, and carries the broadcaster's vacation window alongside segments.
#[derive(Debug, Deserialize)]
pub struct ScheduleEnvelope {
    pub data: SchedulePayload,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct SchedulePayload {
    /// Explicitly nullable upstream when the schedule is empty.
    pub segments: Option<Vec<Segment>>,
    pub vacation: Option<Vacation>,
}

/// One planned broadcast segment.
#[derive(Debug, Clone, Deserialize)]
pub struct Segment {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub title: String,
    /// Set upstream for individually-cancelled segments; also set locally
    /// for segments falling inside the vacation window.
    pub canceled_until: Option<DateTime<Utc>>,
    pub category: Option<Category>,
}

impl Segment {
    pub fn is_canceled(&self) -> bool {
        self.canceled_until.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// Broadcaster vacation window; overlapping segments are suppressed.
#[derive(Debug, Clone, Deserialize)]
pub struct Vacation {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Vacation {
    /// True when the segment starts or ends inside the window.
    pub fn covers(&self, segment: &Segment) -> bool {
        let inside = |t: DateTime<Utc>| t >= self.start_time && t <= self.end_time;
        inside(segment.start_time) || inside(segment.end_time)
    }
}
