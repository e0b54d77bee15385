// Twitch Helix client: token cache, pagination driver, batched queries
pub mod twitch;

// Chat-platform gateway contract
pub mod gateway;

// Watchlist persistence
pub mod store;

// Live-announcement reconciliation and the poller driving it
pub mod announce;

// Broadcast schedule → scheduled-events sync
pub mod schedule;

// Operator command surface
pub mod commands;

pub mod config;
pub mod error;

pub use config::HeraldConfig;
pub use error::{CommandError, GatewayError, TwitchError};

use announce::{AnnounceEngine, Poller};
use commands::Commands;
use gateway::Gateway;
use schedule::ScheduleSync;
use std::sync::Arc;
use std::time::Duration;
use store::SqliteConfigStore;
use twitch::auth::AppTokenCache;
use twitch::TwitchClient;

/// Wires the full stack over a gateway implementation and starts the
/// poller. The chat transport calls this once it is connected and keeps the
/// returned command surface for the front end.
pub fn bootstrap(config: &HeraldConfig, gateway: Arc<dyn Gateway>) -> anyhow::Result<Commands> {
    let http = reqwest::Client::new();
    let tokens = Arc::new(AppTokenCache::new(
        http.clone(),
        config.twitch.client_id.clone(),
        config.twitch.client_secret.clone(),
    ));
    let twitch = Arc::new(TwitchClient::new(http, tokens));
    let store = Arc::new(SqliteConfigStore::new(&config.store.db_path)?);

    let engine = Arc::new(AnnounceEngine::new(
        Arc::clone(&twitch),
        Arc::clone(&gateway),
        store.clone() as Arc<dyn store::ConfigStore>,
        &config.poll,
    ));
    let poller = Arc::new(Poller::new(
        engine,
        Duration::from_secs(config.poll.tick_delay_secs),
    ));
    poller.start();

    let schedule = ScheduleSync::new(Arc::clone(&twitch), Arc::clone(&gateway));

    Ok(Commands::new(twitch, gateway, store, poller, schedule))
}
