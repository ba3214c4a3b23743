use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use tracing::info;

/// Engine configuration, read from `stockhawk.toml` in the data
/// directory. Every field has a default so a missing file is a valid
/// configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub hunt: HuntConfig,

    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub alerts: AlertConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Polling cadence for stock monitors. The error backoff must stay longer
/// than the steady-state interval so a struggling storefront sees less
/// traffic, not more.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_monitor_backoff_secs")]
    pub error_backoff_secs: u64,
}

/// Cadence for checkout hunts (watch until in stock, then buy through to
/// the payment step). Errors back off harder here because a hunt hits the
/// storefront with cart and checkout traffic, not just feed reads.
#[derive(Debug, Clone, Deserialize)]
pub struct HuntConfig {
    #[serde(default = "default_hunt_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_hunt_backoff_secs")]
    pub error_backoff_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Minimum spacing between fetches of the same product URL.
    #[serde(default = "default_tracker_spacing_ms")]
    pub min_spacing_ms: u64,

    /// Cooldown observed after the storefront answers 429.
    #[serde(default = "default_tracker_cooldown_secs")]
    pub cooldown_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_alert_interval_secs")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotifyConfig {
    /// Discord-compatible webhook URL. When unset, notifications go to
    /// the log stream.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_timeout_secs() -> u64 {
    15
}
fn default_monitor_interval_secs() -> u64 {
    10
}
fn default_monitor_backoff_secs() -> u64 {
    20
}
fn default_hunt_interval_secs() -> u64 {
    5
}
fn default_hunt_backoff_secs() -> u64 {
    10
}
fn default_tracker_spacing_ms() -> u64 {
    1000
}
fn default_tracker_cooldown_secs() -> u64 {
    5
}
fn default_alert_interval_secs() -> u64 {
    60
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_monitor_interval_secs(),
            error_backoff_secs: default_monitor_backoff_secs(),
        }
    }
}

impl Default for HuntConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_hunt_interval_secs(),
            error_backoff_secs: default_hunt_backoff_secs(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_spacing_ms: default_tracker_spacing_ms(),
            cooldown_secs: default_tracker_cooldown_secs(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_alert_interval_secs(),
        }
    }
}

impl Config {
    pub async fn load<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let config_path = data_dir.as_ref().join("stockhawk.toml");
        if !config_path.exists() {
            info!("No stockhawk.toml found, using defaults.");
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(&config_path).await?;
        let config: Config = toml::from_str(&content)?;
        info!(
            "Loaded config: monitor every {}s, hunt every {}s, webhook={}",
            config.monitor.poll_interval_secs,
            config.hunt.poll_interval_secs,
            config.notify.webhook_url.is_some()
        );
        Ok(config)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs.max(1))
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.poll_interval_secs.max(1))
    }

    pub fn monitor_backoff(&self) -> Duration {
        Duration::from_secs(self.monitor.error_backoff_secs.max(1))
    }

    pub fn hunt_interval(&self) -> Duration {
        Duration::from_secs(self.hunt.poll_interval_secs.max(1))
    }

    pub fn hunt_backoff(&self) -> Duration {
        Duration::from_secs(self.hunt.error_backoff_secs.max(1))
    }

    pub fn tracker_spacing(&self) -> Duration {
        Duration::from_millis(self.tracker.min_spacing_ms)
    }

    pub fn tracker_cooldown(&self) -> Duration {
        Duration::from_secs(self.tracker.cooldown_secs)
    }

    pub fn alert_interval(&self) -> Duration {
        Duration::from_secs(self.alerts.poll_interval_secs.max(1))
    }
}

/// Where task records, the database, and `stockhawk.toml` live.
/// `STOCKHAWK_DATA_DIR` overrides the default for tests and multi-profile
/// setups.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("STOCKHAWK_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".stockhawk")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_cadence() {
        let config = Config::default();
        assert_eq!(config.monitor_interval(), Duration::from_secs(10));
        assert_eq!(config.monitor_backoff(), Duration::from_secs(20));
        assert_eq!(config.hunt_interval(), Duration::from_secs(5));
        assert_eq!(config.hunt_backoff(), Duration::from_secs(10));
        assert_eq!(config.tracker_spacing(), Duration::from_millis(1000));
        assert_eq!(config.tracker_cooldown(), Duration::from_secs(5));
        assert_eq!(config.alert_interval(), Duration::from_secs(60));
        assert!(config.notify.webhook_url.is_none());
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let config: Config = toml::from_str(
            r#"
[monitor]
poll_interval_secs = 0
error_backoff_secs = 0
"#,
        )
        .unwrap();
        assert_eq!(config.monitor_interval(), Duration::from_secs(1));
        assert_eq!(config.monitor_backoff(), Duration::from_secs(1));
    }

    #[test]
    fn parse_full_config() {
        let content = r#"
[http]
timeout_secs = 30

[monitor]
poll_interval_secs = 20
error_backoff_secs = 8

[hunt]
poll_interval_secs = 3

[tracker]
min_spacing_ms = 500
cooldown_secs = 10

[notify]
webhook_url = "https://discord.com/api/webhooks/1/abc"
"#;
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
        assert_eq!(config.monitor_interval(), Duration::from_secs(20));
        assert_eq!(config.monitor_backoff(), Duration::from_secs(8));
        assert_eq!(config.hunt_interval(), Duration::from_secs(3));
        // Unset hunt backoff keeps its default.
        assert_eq!(config.hunt_backoff(), Duration::from_secs(10));
        assert_eq!(config.tracker_spacing(), Duration::from_millis(500));
        assert_eq!(
            config.notify.webhook_url.as_deref(),
            Some("https://discord.com/api/webhooks/1/abc")
        );
    }

    #[tokio::test]
    async fn load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).await.unwrap();
        assert_eq!(config.monitor_interval(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn load_reads_file_from_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("stockhawk.toml"),
            "[monitor]\npoll_interval_secs = 42\n",
        )
        .unwrap();
        let config = Config::load(dir.path()).await.unwrap();
        assert_eq!(config.monitor_interval(), Duration::from_secs(42));
    }
}
