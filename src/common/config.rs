//! Configuration loading for broker connection, editor and monitor settings.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the configuration file when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Broker connection parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BrokerConfig {
    /// Host name or address of the MQTT broker connected at startup
    pub host: String,
    /// Further hosts offered in the server selector, same port and credentials
    pub servers: Vec<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Wrap the connection in TLS using the platform's root certificates
    pub use_tls: bool,
    pub keep_alive_secs: u64,
    /// Pause between reconnect attempts after a connection error
    pub reconnect_interval_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            servers: Vec::new(),
            port: 1883,
            username: Some("test".to_string()),
            password: Some("test".to_string()),
            use_tls: false,
            keep_alive_secs: 30,
            reconnect_interval_ms: 1000,
        }
    }
}

impl BrokerConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(5))
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// Hosts for the server selector, `host` first and without duplicates.
    pub fn server_choices(&self) -> Vec<String> {
        let mut choices: Vec<String> = Vec::with_capacity(self.servers.len() + 1);
        for host in std::iter::once(&self.host).chain(&self.servers) {
            let host = host.trim();
            if !host.is_empty() && !choices.iter().any(|c| c == host) {
                choices.push(host.to_string());
            }
        }
        choices
    }

    /// Same settings against another host.
    pub fn for_host(&self, host: &str) -> Self {
        Self {
            host: host.to_string(),
            ..self.clone()
        }
    }
}

/// Sketch editor settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EditorConfig {
    /// Name of the sketch opened at startup (without the `.ino` suffix)
    pub sketch: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self { sketch: "blinky".to_string() }
    }
}

/// Sensor monitor settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MonitorConfig {
    /// Topic filters to subscribe to, MQTT wildcards allowed
    pub topics: Vec<String>,
    /// Maximum number of readings kept in the UI
    pub history: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            topics: vec!["sensors/#".to_string()],
            history: 1000,
        }
    }
}

/// Root of `config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub editor: EditorConfig,
    pub monitor: MonitorConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `config_path` - Path to the config.toml file
    ///
    /// # Returns
    /// * `Ok(AppConfig)` if the file was successfully loaded and parsed
    /// * `Err` with the failing step in its context otherwise
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(config_path).with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    ///
    /// A file that exists but cannot be parsed is reported and replaced by defaults too,
    /// so the UI can still start and show the connection state.
    pub fn load_or_default(config_path: &Path) -> Self {
        if !config_path.exists() {
            log::warn!("Config file {} not found, using defaults", config_path.display());
            return Self::default();
        }
        match Self::load(config_path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{:#}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Config path from the first command line argument, or [`DEFAULT_CONFIG_PATH`].
    pub fn path_from_args(mut args: impl Iterator<Item = String>) -> PathBuf {
        args.nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.broker.host.trim().is_empty() {
            anyhow::bail!("broker.host must not be empty");
        }
        let sketch = &self.editor.sketch;
        if sketch.is_empty() || sketch.contains(['/', '+', '#']) {
            anyhow::bail!("editor.sketch '{}' is not usable as a topic segment", sketch);
        }
        if self.monitor.history == 0 {
            anyhow::bail!("monitor.history must be at least 1");
        }
        Ok(())
    }
}
