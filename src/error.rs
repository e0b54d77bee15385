//! Error taxonomy.
//!
//! Typed variants exist where callers branch on them: batch lookups degrade,
//! best-effort queries swallow, per-target gateway failures skip one target,
//! operator mistakes are relayed verbatim. Orchestration code that only
//! propagates wraps these in `anyhow` with context.

use thiserror::Error;

/// Errors from the Helix client and the app token cache.
#[derive(Debug, Error)]
pub enum TwitchError {
    /// Client id/secret are not configured. Fatal per call.
    #[error("twitch credentials not configured")]
    MissingCredentials,

    /// Upstream rejected the request.
    #[error("twitch api returned HTTP {status}: {body}")]
    Request { status: u16, body: String },

    /// Transport-level failure (connect, TLS, body read).
    #[error("twitch request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Payload did not match the expected wire shape. The raw body is logged
    /// at the call site before this is returned.
    #[error("twitch {context} decode failed")]
    Deserialize {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors reported by the chat-platform gateway.
///
/// All of these are per-target: the reconciler logs them and skips the
/// affected target, never the whole tick.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The referenced entity no longer exists.
    #[error("not found")]
    NotFound,

    /// The bot lacks a permission in the target channel or guild.
    #[error("missing permission: {0}")]
    Permission(String),

    /// Transient transport or server failure; the next tick retries.
    #[error("gateway error: {0}")]
    Transient(String),
}

/// Errors surfaced to the command front end.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Operator mistake. Relayed verbatim, never logged as a failure.
    #[error("{0}")]
    User(String),

    /// Everything else.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<TwitchError> for CommandError {
    fn from(err: TwitchError) -> Self {
        CommandError::Internal(err.into())
    }
}

impl From<GatewayError> for CommandError {
    fn from(err: GatewayError) -> Self {
        CommandError::Internal(err.into())
    }
}
