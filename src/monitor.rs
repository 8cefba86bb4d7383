//! The poll loop.
//!
//! One cycle polls every device strictly in declaration order and routes
//! each new file before moving to the next device, then the loop sleeps for
//! the configured interval. Nothing runs concurrently: a slow download or a
//! wait action holds up every device behind it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info};

use crate::config::Config;
use crate::device::Device;
use crate::publisher::{PublisherConnector, PublisherHandle};
use crate::store::StoreConnector;

/// Summary of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Devices polled.
    pub devices: usize,
    /// New files found across all devices.
    pub new_files: usize,
}

/// Owns every device and the process-wide publisher.
pub struct Monitor {
    devices: Vec<Device>,
    publisher: PublisherHandle,
    interval: Duration,
}

impl Monitor {
    /// Assemble a monitor from already-built parts.
    pub fn new(devices: Vec<Device>, publisher: PublisherHandle, interval: Duration) -> Self {
        Self {
            devices,
            publisher,
            interval,
        }
    }

    /// Build every device and the publisher handle from configuration.
    ///
    /// Devices start unconnected; call [`Monitor::connect_all`] before polling.
    ///
    /// # Errors
    ///
    /// Returns an error if a device's patterns or actions are invalid.
    pub fn from_config(
        config: &Config,
        stores: Arc<dyn StoreConnector>,
        publishers: Arc<dyn PublisherConnector>,
    ) -> anyhow::Result<Self> {
        let devices = config
            .devices
            .iter()
            .map(|device| Device::from_config(device, Arc::clone(&stores)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let interval = Duration::try_from_secs_f64(config.interval)
            .with_context(|| format!("invalid interval {}", config.interval))?;
        let publisher = PublisherHandle::new(config.mqtt_settings(), publishers);
        Ok(Self::new(devices, publisher, interval))
    }

    /// Devices in polling order.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// The process-wide publisher.
    pub fn publisher(&self) -> &PublisherHandle {
        &self.publisher
    }

    /// Sleep between cycles.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Connect every device in order, recording its initial listing.
    ///
    /// Returns how many devices connected. Failures are logged and retried
    /// by later polls.
    pub async fn connect_all(&mut self) -> usize {
        let mut connected = 0usize;
        for device in &mut self.devices {
            if device.connect().await {
                connected = connected.saturating_add(1);
            }
        }
        info!(connected, total = self.devices.len(), "devices connected");
        connected
    }

    /// Poll every device once and dispatch its new files.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        for device in &mut self.devices {
            let new_files = device.process(&mut self.publisher).await;
            report.devices = report.devices.saturating_add(1);
            report.new_files = report.new_files.saturating_add(new_files);
        }
        debug!(devices = report.devices, new_files = report.new_files, "cycle complete");
        report
    }

    /// Alternate between polling and sleeping until the process is killed.
    pub async fn run(mut self) {
        info!(
            devices = self.devices.len(),
            interval_secs = self.interval.as_secs_f64(),
            "monitor started"
        );
        loop {
            self.run_cycle().await;
            tokio::time::sleep(self.interval).await;
        }
    }
}
