use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SinkFormat {
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "text")]
    Text,
}

impl Default for SinkFormat {
    fn default() -> Self {
        SinkFormat::Json
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Directory holding `definitions.json`.
    pub cache_dir: PathBuf,
    pub stacks_dir: PathBuf,
    pub common_services_dir: PathBuf,
    pub host_scripts_dir: PathBuf,
    /// Overrides the detected host name.
    pub hostname: Option<String>,
    /// Interpreter used for `.py` alert scripts.
    pub python: String,
    /// Definition intervals are minutes; when false they are read as seconds.
    pub interval_in_minutes: bool,
}

/// Default timeouts, in seconds, used when a definition does not carry its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub connect_secs: f64,
    pub web_secs: f64,
    pub script_secs: f64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        seconds_or_default(self.connect_secs, Self::default().connect_secs)
    }

    pub fn web(&self) -> Duration {
        seconds_or_default(self.web_secs, Self::default().web_secs)
    }

    pub fn script(&self) -> Duration {
        seconds_or_default(self.script_secs, Self::default().script_secs)
    }

    fn validate(&self) -> crate::Result<()> {
        for (name, value) in [
            ("connect", self.connect_secs),
            ("web", self.web_secs),
            ("script", self.script_secs),
        ] {
            if !value.is_finite() || value <= 0.0 || Duration::try_from_secs_f64(value).is_err() {
                return Err(crate::Error::Config(format!(
                    "{} timeout must be a positive number of seconds, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

// Values that skipped validation fall back to the default.
fn seconds_or_default(value: f64, default: f64) -> Duration {
    match Duration::try_from_secs_f64(value) {
        Ok(duration) if !duration.is_zero() => duration,
        _ => Duration::from_secs_f64(default),
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5.0,
            web_secs: 10.0,
            script_secs: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    pub interval_secs: u64,
    #[serde(default)]
    pub format: SinkFormat,
    #[serde(default)]
    pub pretty: bool,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            format: SinkFormat::Json,
            pretty: false,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let defaults = Config::default();

        let config = Config {
            server: ServerConfig {
                addr: env_or("SERVER_ADDR", &defaults.server.addr),
            },
            alerts: AlertsConfig {
                cache_dir: std::env::var("ALERT_CACHE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.alerts.cache_dir),
                stacks_dir: std::env::var("ALERT_STACKS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.alerts.stacks_dir),
                common_services_dir: std::env::var("ALERT_COMMON_SERVICES_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.alerts.common_services_dir),
                host_scripts_dir: std::env::var("ALERT_HOST_SCRIPTS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.alerts.host_scripts_dir),
                hostname: std::env::var("AGENT_HOSTNAME")
                    .ok()
                    .filter(|h| !h.trim().is_empty()),
                python: env_or("ALERT_PYTHON", &defaults.alerts.python),
                interval_in_minutes: parse_env("ALERT_INTERVAL_IN_MINUTES", true),
            },
            timeouts: TimeoutConfig {
                connect_secs: parse_env("ALERT_CONNECT_TIMEOUT_SECS", defaults.timeouts.connect_secs),
                web_secs: parse_env("ALERT_WEB_TIMEOUT_SECS", defaults.timeouts.web_secs),
                script_secs: parse_env("ALERT_SCRIPT_TIMEOUT_SECS", defaults.timeouts.script_secs),
            },
            heartbeat: HeartbeatConfig {
                interval_secs: parse_env("HEARTBEAT_INTERVAL_SECS", defaults.heartbeat.interval_secs),
                format: match env_or("SINK_FORMAT", "json").to_lowercase().as_str() {
                    "text" => SinkFormat::Text,
                    _ => SinkFormat::Json,
                },
                pretty: parse_env("SINK_PRETTY", false),
            },
            log_level: env_or("LOG_LEVEL", &defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.timeouts.validate()?;

        if self.heartbeat.interval_secs == 0 {
            return Err(crate::Error::Config(
                "HEARTBEAT_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        if self.alerts.python.trim().is_empty() {
            return Err(crate::Error::Config("ALERT_PYTHON must not be empty".to_string()));
        }

        if !self.alerts.cache_dir.exists() {
            tracing::warn!(
                "Alert cache directory {} does not exist yet; it will be created on first write",
                self.alerts.cache_dir.display()
            );
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8670".to_string(),
            },
            alerts: AlertsConfig {
                cache_dir: PathBuf::from("data/alerts"),
                stacks_dir: PathBuf::from("data/cache/stacks"),
                common_services_dir: PathBuf::from("data/cache/common-services"),
                host_scripts_dir: PathBuf::from("data/cache/host_scripts"),
                hostname: None,
                python: "python3".to_string(),
                interval_in_minutes: true,
            },
            timeouts: TimeoutConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.timeouts.validate().is_ok());
        assert_eq!(config.timeouts.connect(), Duration::from_secs(5));
        assert!(config.alerts.interval_in_minutes);
    }

    #[test]
    fn rejects_non_positive_timeouts() {
        let mut config = Config::default();
        config.timeouts.script_secs = 0.0;
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));

        config.timeouts.script_secs = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_timeouts_too_large_for_a_duration() {
        let mut config = Config::default();
        config.timeouts.web_secs = 1e30;
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));

        // accessors never panic even without validation
        assert_eq!(config.timeouts.web(), Duration::from_secs(10));
        config.timeouts.connect_secs = -1.0;
        assert_eq!(config.timeouts.connect(), Duration::from_secs(5));
    }

    #[test]
    fn rejects_zero_heartbeat_interval() {
        let mut config = Config::default();
        config.heartbeat.interval_secs = 0;
        assert!(config.validate().is_err());
    }
}
