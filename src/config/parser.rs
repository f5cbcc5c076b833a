use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of Actix Web workers
pub const DEFAULT_WORKERS: usize = 4;

fn default_servers_dir() -> PathBuf {
    PathBuf::from("servers")
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_shutdown_timeout_secs() -> u64 {
    5
}

fn default_grace_period_secs() -> u64 {
    10
}

fn default_settle_delay_secs() -> u64 {
    2
}

fn default_java_path() -> String {
    "java".to_string()
}

fn default_console_buffer() -> usize {
    256
}

fn default_backlog_lines() -> usize {
    100
}

/// Settings for the HTTP front end.
///
/// # Examples
///
/// ```
/// use craft_runner::config::HttpConfig;
///
/// let http = HttpConfig::default();
/// assert_eq!(http.port, 8000);
/// assert_eq!(http.address, "0.0.0.0");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    /// Address to bind to.
    #[serde(default = "default_address")]
    pub address: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of Actix Web workers. Defaults to [`DEFAULT_WORKERS`].
    #[serde(default)]
    pub workers: Option<usize>,

    /// Seconds a graceful shutdown waits for open connections, such as
    /// console streams, before closing them.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            workers: None,
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

/// Settings for process supervision and console streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorConfig {
    /// Seconds to wait after the graceful signal before killing the process.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// Seconds to wait between the stop and start halves of a restart.
    ///
    /// Some server binaries release their world lock and port only after
    /// the process is gone, so an immediate start can fail to bind.
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,

    /// Runtime used to launch Java servers.
    #[serde(default = "default_java_path")]
    pub java_path: String,

    /// Lines buffered per console subscriber before it is considered too slow
    /// and detached.
    #[serde(default = "default_console_buffer")]
    pub console_buffer: usize,

    /// Recent console lines replayed to a newly attached subscriber.
    #[serde(default = "default_backlog_lines")]
    pub backlog_lines: usize,
}

impl SupervisorConfig {
    /// Grace period as a [`Duration`].
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// Settle delay as a [`Duration`].
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period_secs(),
            settle_delay_secs: default_settle_delay_secs(),
            java_path: default_java_path(),
            console_buffer: default_console_buffer(),
            backlog_lines: default_backlog_lines(),
        }
    }
}

/// Main configuration for craft-runner.
///
/// # JSON Schema
///
/// Every field is optional:
///
/// ```json
/// {
///   "serversDir": "servers",
///   "http": { "address": "0.0.0.0", "port": 8000, "workers": 4 },
///   "supervisor": {
///     "gracePeriodSecs": 10,
///     "settleDelaySecs": 2,
///     "javaPath": "java",
///     "consoleBuffer": 256,
///     "backlogLines": 100
///   }
/// }
/// ```
///
/// # Examples
///
/// ```
/// use craft_runner::config::Config;
///
/// let config = Config::parse_from_str(r#"{ "serversDir": "/srv/minecraft" }"#).unwrap();
/// assert_eq!(config.servers_dir.to_str(), Some("/srv/minecraft"));
/// assert_eq!(config.supervisor.grace_period_secs, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory holding one subdirectory per managed server.
    #[serde(default = "default_servers_dir")]
    pub servers_dir: PathBuf,

    /// HTTP front end settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Process supervision settings.
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            servers_dir: default_servers_dir(),
            http: HttpConfig::default(),
            supervisor: SupervisorConfig::default(),
        }
    }
}

impl Config {
    /// Loads a configuration from a file path.
    ///
    /// Files ending in `.yaml` or `.yml` are parsed as YAML, everything else
    /// as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The file cannot be read
    /// * The file contents are not valid JSON or YAML
    /// * The document does not conform to the expected schema
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigParse(format!("Failed to read config file: {}", e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::parse_from_yaml_str(&content),
            _ => Self::parse_from_str(&content),
        }
    }

    /// Parses a configuration from a JSON string.
    pub fn parse_from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse JSON config: {}", e)))
    }

    /// Parses a configuration from a YAML string.
    pub fn parse_from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse YAML config: {}", e)))
    }
}
