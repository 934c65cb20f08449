//! Runtime configuration (§6 addition): CLI flags via `clap`, layered
//! over `.env`/environment variables via `dotenvy`, grounded in the
//! teacher's `dotenv::dotenv().ok()` call at the top of `main.rs`.

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "flowchess-server", about = "Real-time simultaneous chess match server")]
pub struct Config {
    /// Address the HTTP/WebSocket server binds to.
    #[arg(long, env = "FLOWCHESS_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    /// SQLite connection string for the Player Registry.
    #[arg(long, env = "FLOWCHESS_DATABASE_URL", default_value = "sqlite://flowchess.db?mode=rwc")]
    pub database_url: String,

    /// Seconds between background `Registry::reap` sweeps.
    #[arg(long, env = "FLOWCHESS_REAP_INTERVAL_SECONDS", default_value_t = 300)]
    pub reap_interval_seconds: u64,

    /// Enables the `/games/:key/debug` route (debugNoTime toggle). Off by
    /// default outside debug builds; an explicit flag still wins either way.
    #[arg(long, env = "FLOWCHESS_ENABLE_DEBUG_ROUTE", default_value_t = cfg!(debug_assertions))]
    pub enable_debug_route: bool,
}

impl Config {
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Config::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_with_no_arguments() {
        let config = Config::parse_from(["flowchess-server"]);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.reap_interval_seconds, 300);
    }

    #[test]
    fn cli_flags_override_defaults() {
        let config = Config::parse_from(["flowchess-server", "--bind-addr", "127.0.0.1:9000"]);
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
    }
}
