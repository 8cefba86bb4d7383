//! Configuration loading and validation.
//!
//! recwatch reads a required `default.yml` and an optional `local.yml` from
//! the config directory. Top-level keys in `local.yml` replace the matching
//! keys of `default.yml` wholesale. All optional fields carry serde defaults
//! so a minimal file only needs the devices it watches.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};

/// Environment variable that overrides the config directory.
pub const CONFIG_DIR_ENV: &str = "RECWATCH_CONFIG_DIR";

/// Top-level process configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Seconds to sleep between poll cycles.
    #[serde(default = "default_interval")]
    pub interval: f64,

    /// Log level name (`DEBUG`, `INFO`, `WARNING`, ...).
    #[serde(default = "default_logging_level")]
    pub logging_level: String,

    /// Optional directory for rotated JSON log files.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// MQTT broker hostname.
    #[serde(default)]
    pub mqtt_host: Option<String>,

    /// MQTT broker port.
    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,

    /// MQTT client identifier.
    #[serde(default)]
    pub mqtt_client_name: Option<String>,

    /// MQTT username; credentials are only sent when this is set.
    #[serde(default)]
    pub mqtt_username: Option<String>,

    /// MQTT password.
    #[serde(default)]
    pub mqtt_password: Option<String>,

    /// Monitored devices, polled in declaration order.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// One monitored FTP endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Device name used in logs.
    pub name: String,

    /// FTP server hostname.
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// FTP server port.
    #[serde(default = "default_ftp_port")]
    pub port: u16,

    /// FTP login user. Anonymous login when absent.
    #[serde(default)]
    pub user: Option<String>,

    /// FTP login password.
    #[serde(default)]
    pub password: String,

    /// Remote directory holding the recordings.
    #[serde(default = "default_path")]
    pub path: String,

    /// Filename patterns, evaluated in declaration order.
    #[serde(default)]
    pub patterns: Vec<PatternConfig>,
}

/// A filename rule and the actions it triggers.
#[derive(Debug, Clone, Deserialize)]
pub struct PatternConfig {
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Regular expression matched from the start of the filename.
    pub file_pattern: String,

    /// Actions run in declaration order on a match.
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

/// Raw action entry.
///
/// Kept loose on purpose: an unrecognized `action` value must not fail the
/// whole file, so the type is resolved later in [`crate::action::Action::from_config`].
#[derive(Debug, Clone, Deserialize)]
pub struct ActionConfig {
    /// Action type: `download`, `mqtt` or `wait`.
    #[serde(default)]
    pub action: String,

    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Download: target directory template.
    #[serde(default)]
    pub download_path: Option<String>,

    /// Download: target filename template.
    #[serde(default = "default_filename_template")]
    pub download_filename: String,

    /// Mqtt: topic template.
    #[serde(default)]
    pub topic: Option<String>,

    /// Mqtt: payload template.
    #[serde(default = "default_filename_template")]
    pub payload: String,

    /// Wait: pause length in seconds.
    #[serde(default = "default_wait_duration")]
    pub duration: f64,
}

/// Process-wide MQTT connection settings.
#[derive(Clone, Default)]
pub struct MqttSettings {
    /// Broker hostname.
    pub host: Option<String>,
    /// Broker port.
    pub port: u16,
    /// Client identifier.
    pub client_name: Option<String>,
    /// Username, if the broker requires authentication.
    pub username: Option<String>,
    /// Password paired with `username`.
    pub password: Option<String>,
}

impl std::fmt::Debug for MqttSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_name", &self.client_name)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Config {
    /// MQTT settings shared by every publish action.
    pub fn mqtt_settings(&self) -> MqttSettings {
        MqttSettings {
            host: self.mqtt_host.clone(),
            port: self.mqtt_port,
            client_name: self.mqtt_client_name.clone(),
            username: self.mqtt_username.clone(),
            password: self.mqtt_password.clone(),
        }
    }

    /// Validate that configuration values are within sane bounds.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending value.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.interval.is_finite() && self.interval > 0.0,
            "interval must be a positive number of seconds"
        );
        crate::logging::level_filter(&self.logging_level)?;

        for device in &self.devices {
            anyhow::ensure!(!device.name.is_empty(), "device name must not be empty");
            for pattern in &device.patterns {
                for action in &pattern.actions {
                    if action.action == "wait" {
                        anyhow::ensure!(
                            action.duration.is_finite() && action.duration >= 0.0,
                            "device '{}': wait duration must be a non-negative number",
                            device.name
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

/// Configuration after loading, plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Merged and validated configuration.
    pub config: Config,
    /// Base file that was read.
    pub base_path: PathBuf,
    /// Override file, if one was found.
    pub local_path: Option<PathBuf>,
}

/// Resolve the config directory from `RECWATCH_CONFIG_DIR`, defaulting to `./config`.
pub fn config_dir() -> PathBuf {
    std::env::var_os(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config"))
}

/// Load `default.yml` and the optional `local.yml` from a directory.
///
/// # Errors
///
/// Returns an error if `default.yml` is missing, either file is not valid
/// YAML, or the merged configuration fails validation.
pub fn load_from_dir(dir: &Path) -> anyhow::Result<LoadedConfig> {
    let base_path = dir.join("default.yml");
    let local_path = dir.join("local.yml");
    let local = local_path.is_file().then_some(local_path);
    let config = load_config(&base_path, local.as_deref())?;
    Ok(LoadedConfig {
        config,
        base_path,
        local_path: local,
    })
}

/// Load a base file, apply an optional override file, and validate.
///
/// # Errors
///
/// Returns an error if a file cannot be read or parsed, or if validation fails.
pub fn load_config(base: &Path, local: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = read_mapping(base)?;
    if let Some(local) = local {
        merge_top_level(&mut merged, read_mapping(local)?);
    }
    let config: Config = serde_yaml_ng::from_value(Value::Mapping(merged)).with_context(|| match local {
        Some(local) => format!(
            "invalid configuration in {} merged with {}",
            base.display(),
            local.display()
        ),
        None => format!("invalid configuration in {}", base.display()),
    })?;
    config.validate()?;
    Ok(config)
}

/// Parse a YAML string into a validated [`Config`] without touching the filesystem.
///
/// # Errors
///
/// Returns an error if the YAML is invalid or validation fails.
pub fn parse_config(yaml: &str) -> anyhow::Result<Config> {
    let config: Config = serde_yaml_ng::from_str(yaml).context("invalid configuration")?;
    config.validate()?;
    Ok(config)
}

/// Replace every top-level key of `base` that appears in `overrides`.
pub fn merge_top_level(base: &mut Mapping, overrides: Mapping) {
    for (key, value) in overrides {
        base.insert(key, value);
    }
}

fn read_mapping(path: &Path) -> anyhow::Result<Mapping> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    let value: Value = serde_yaml_ng::from_str(&contents)
        .with_context(|| format!("failed to parse config at {}", path.display()))?;
    match value {
        Value::Mapping(mapping) => Ok(mapping),
        // An empty file parses as null.
        Value::Null => Ok(Mapping::new()),
        _ => anyhow::bail!("config at {} must be a mapping", path.display()),
    }
}

// Default value functions for serde.

fn default_interval() -> f64 {
    10.0
}

fn default_logging_level() -> String {
    "WARNING".to_owned()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_hostname() -> String {
    "127.1".to_owned()
}

fn default_ftp_port() -> u16 {
    21
}

fn default_path() -> String {
    "/mnt/sdcard/RecFiles".to_owned()
}

fn default_filename_template() -> String {
    "{filename}".to_owned()
}

fn default_wait_duration() -> f64 {
    1.0
}
