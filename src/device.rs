//! Monitored devices: connection lifecycle, new-file detection, dispatch.
//!
//! A device keeps the full listing from its most recent successful poll as
//! its seen-set. Each poll lists again, reports names absent from the
//! seen-set (in listing order), and replaces the seen-set wholesale.
//!
//! Recovery is reactive: a missing connection counts as a failed listing, and
//! each failed listing is followed by a full reconnect and another listing,
//! up to [`LIST_RETRIES`] extra attempts per poll.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use crate::action::ActionContext;
use crate::config::DeviceConfig;
use crate::pattern::Pattern;
use crate::publisher::PublisherHandle;
use crate::store::{RemoteStore, StoreConnector, StoreEndpoint, StoreError};

/// Extra listing attempts (each preceded by a reconnect) after a failure.
pub const LIST_RETRIES: u32 = 2;

/// One remote store being watched.
pub struct Device {
    name: String,
    endpoint: StoreEndpoint,
    connector: Arc<dyn StoreConnector>,
    store: Option<Box<dyn RemoteStore>>,
    seen: HashSet<String>,
    patterns: Vec<Pattern>,
}

impl Device {
    /// Create an unconnected device.
    pub fn new(
        name: impl Into<String>,
        endpoint: StoreEndpoint,
        connector: Arc<dyn StoreConnector>,
        patterns: Vec<Pattern>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint,
            connector,
            store: None,
            seen: HashSet::new(),
            patterns,
        }
    }

    /// Build an unconnected device and compile its patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern fails to compile.
    pub fn from_config(config: &DeviceConfig, connector: Arc<dyn StoreConnector>) -> anyhow::Result<Self> {
        let patterns = config
            .patterns
            .iter()
            .map(Pattern::from_config)
            .collect::<anyhow::Result<Vec<_>>>()
            .with_context(|| format!("device '{}'", config.name))?;
        if patterns.is_empty() {
            warn!(device = %config.name, "device has no patterns, new files will be ignored");
        }
        Ok(Self::new(
            config.name.clone(),
            StoreEndpoint::from_device(config),
            connector,
            patterns,
        ))
    }

    /// Device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connection parameters.
    pub fn endpoint(&self) -> &StoreEndpoint {
        &self.endpoint
    }

    /// Patterns in evaluation order.
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Whether a live connection exists.
    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    /// Filenames recorded by the most recent successful listing.
    pub fn seen_files(&self) -> &HashSet<String> {
        &self.seen
    }

    /// Open a fresh connection and record the initial listing as the seen-set.
    ///
    /// Never fails: on error the device is left without a connection and the
    /// failure is logged. Returns whether a connection is now live.
    pub async fn connect(&mut self) -> bool {
        self.store = None;
        match self.open().await {
            Ok((store, names)) => {
                debug!(device = %self.name, host = %self.endpoint.host, "connected");
                debug!(device = %self.name, files = names.len(), "initial listing");
                self.seen = names.into_iter().collect();
                self.store = Some(store);
                true
            }
            Err(e) => {
                warn!(
                    device = %self.name,
                    host = %self.endpoint.host,
                    port = self.endpoint.port,
                    error = %e,
                    "connect failed"
                );
                false
            }
        }
    }

    async fn open(&self) -> Result<(Box<dyn RemoteStore>, Vec<String>), StoreError> {
        let mut store = self.connector.connect(&self.endpoint).await?;
        let names = store.list_names().await?;
        Ok((store, names))
    }

    /// Return the names that appeared since the previous successful listing.
    ///
    /// Yields an empty list when every attempt in the retry budget fails.
    pub async fn poll(&mut self) -> Vec<String> {
        let mut retries_left = LIST_RETRIES;
        loop {
            match self.list().await {
                Ok(names) => return self.record_listing(names),
                Err(e) => {
                    self.store = None;
                    let Some(remaining) = retries_left.checked_sub(1) else {
                        error!(
                            device = %self.name,
                            error = %e,
                            attempts = LIST_RETRIES.saturating_add(1),
                            "listing failed, giving up for this cycle"
                        );
                        return Vec::new();
                    };
                    retries_left = remaining;
                    warn!(device = %self.name, error = %e, "listing failed, reconnecting");
                    self.connect().await;
                }
            }
        }
    }

    async fn list(&mut self) -> Result<Vec<String>, StoreError> {
        let store = self.store.as_mut().ok_or(StoreError::NotConnected)?;
        store.list_names().await
    }

    fn record_listing(&mut self, names: Vec<String>) -> Vec<String> {
        debug!(device = %self.name, files = names.len(), "listing");
        let new_files: Vec<String> = names
            .iter()
            .filter(|name| !self.seen.contains(name.as_str()))
            .cloned()
            .collect();
        for name in &new_files {
            info!(device = %self.name, file = %name, "new file found");
        }
        self.seen = names.into_iter().collect();
        new_files
    }

    /// Route `filename` through every matching pattern in declaration order.
    ///
    /// Returns how many patterns matched.
    pub async fn dispatch(&mut self, filename: &str, publisher: &mut PublisherHandle) -> usize {
        let mut matched = 0usize;
        for pattern in &self.patterns {
            let mut ctx = ActionContext {
                device: &self.name,
                store: self.store.as_mut(),
                publisher: &mut *publisher,
            };
            if pattern.process(&mut ctx, filename).await {
                matched = matched.saturating_add(1);
            }
        }
        matched
    }

    /// Poll once and dispatch every new file. Returns the number of new files.
    pub async fn process(&mut self, publisher: &mut PublisherHandle) -> usize {
        let new_files = self.poll().await;
        for filename in &new_files {
            self.dispatch(filename, publisher).await;
        }
        new_files.len()
    }
}
