use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use tokio::net::TcpListener;

use flowchess::api::{self, AppState};
use flowchess::config::Config;
use flowchess::player_registry::SqlitePlayerRegistry;
use flowchess::registry::Registry;
use flowchess::session::SessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::load();

    let options = SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    let players = SqlitePlayerRegistry::new(pool);
    players.migrate().await?;

    let registry = Arc::new(Registry::new());
    let state = AppState {
        registry: registry.clone(),
        players: Arc::new(players),
        sessions: Arc::new(SessionStore::new()),
        debug_route_enabled: config.enable_debug_route,
    };

    tokio::spawn(reap_loop(registry, config.reap_interval_seconds));

    let app = api::router(state);
    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "flowchess listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Background sweep dropping matches whose `MATCH_TTL_SECONDS` has
/// elapsed (§4.5). Never runs from a request handler.
async fn reap_loop(registry: Arc<Registry>, interval_seconds: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
    loop {
        ticker.tick().await;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock is after the epoch")
            .as_secs_f64();
        registry.reap(now);
        tracing::debug!(matches = registry.len(), "reap sweep complete");
    }
}
