use anyhow::Result;
use herald::config::HeraldConfig;
use herald::store::SqliteConfigStore;
use herald::twitch::auth::AppTokenCache;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald=info".into()),
        )
        .init();

    let config = HeraldConfig::load()?;
    info!(db_path = %config.store.db_path, "Herald starting...");

    // Open the watchlist store so schema problems surface at startup
    let _store = SqliteConfigStore::new(&config.store.db_path)?;

    // Verify Twitch credentials early; a missing or rejected secret would
    // otherwise only show up on the first tick
    let tokens = AppTokenCache::new(
        reqwest::Client::new(),
        config.twitch.client_id.clone(),
        config.twitch.client_secret.clone(),
    );
    match tokens.get().await {
        Ok(token) => info!(expires_at = %token.expires_at, "Twitch credentials verified"),
        Err(e) => warn!(error = %e, "Twitch credentials unavailable; polling will fail until configured"),
    }

    // The chat transport owns the Gateway implementation; it calls
    // herald::bootstrap with it to start the poller and command surface.
    info!("Herald core ready");

    Ok(())
}
