use std::time::Duration;

use clap::Args;
use tracing_subscriber::EnvFilter;

use crate::sync;

/// Connection settings shared by every command.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// SQLite URL of the local match cache
    #[arg(
        long,
        global = true,
        env = "SCOUT_CACHE_URL",
        default_value = "sqlite://scouting_cache.db?mode=rwc"
    )]
    pub cache_url: String,

    /// Host or IP of the bridge (scheme and port are ignored)
    #[arg(long, global = true, env = "SCOUT_BRIDGE_HOST", default_value = "localhost")]
    pub bridge_host: String,

    #[arg(long, global = true, env = "SCOUT_BRIDGE_TIMEOUT_SECS", default_value_t = 5)]
    pub bridge_timeout_secs: u64,

    /// Print query results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

impl Settings {
    pub fn bridge_url(&self) -> String {
        sync::bridge_url(&self.bridge_host)
    }

    pub fn bridge_timeout(&self) -> Duration {
        Duration::from_secs(self.bridge_timeout_secs.max(1))
    }
}

/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        settings: Settings,
    }

    #[test]
    fn bridge_settings_normalize_host() {
        let harness = Harness::parse_from([
            "scout",
            "--bridge-host",
            "http://10.0.0.5:9000",
            "--bridge-timeout-secs",
            "0",
        ]);
        assert_eq!(harness.settings.bridge_url(), "http://10.0.0.5:8000");
        assert_eq!(harness.settings.bridge_timeout(), Duration::from_secs(1));
        assert!(!harness.settings.json);
    }
}
