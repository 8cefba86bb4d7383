//! recwatch entry point.
//!
//! Loads `default.yml` (and `local.yml` when present) from the config
//! directory, sets up logging, connects every device, and polls forever.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use recwatch::config;
use recwatch::logging;
use recwatch::monitor::Monitor;
use recwatch::publisher::mqtt::MqttConnector;
use recwatch::store::ftp::FtpConnector;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_dir = config::config_dir();
    let loaded = config::load_from_dir(&config_dir)
        .with_context(|| format!("failed to load configuration from {}", config_dir.display()))?;

    let _logging_guard = logging::init(
        &loaded.config.logging_level,
        loaded.config.log_dir.as_deref(),
    )?;

    match &loaded.local_path {
        Some(path) => info!(base = %loaded.base_path.display(), local = %path.display(), "configuration loaded"),
        None => info!(base = %loaded.base_path.display(), "no local config file found"),
    }

    let mut monitor = Monitor::from_config(
        &loaded.config,
        Arc::new(FtpConnector),
        Arc::new(MqttConnector),
    )
    .context("invalid device configuration")?;

    monitor.connect_all().await;
    monitor.run().await;
    Ok(())
}
