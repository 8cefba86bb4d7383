//! Notification channel abstractions and the process-wide publisher handle.
//!
//! The [`PublisherHandle`] is owned by the monitor and lent mutably to each
//! action, so exactly one writer can ever drive the lazy connect. A failed
//! connect is final: the handle stays [`PublisherState::Failed`] for the rest
//! of the process and every later publish is refused.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::config::MqttSettings;

pub mod mqtt;

/// Errors produced by publisher operations.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Settings are incomplete (e.g. no broker host).
    #[error("publisher not configured: {0}")]
    NotConfigured(String),
    /// Connecting to the broker failed.
    #[error("publisher connect failed: {0}")]
    Connect(String),
    /// An earlier connect failed; publishing is disabled for this process.
    #[error("publisher disabled after failed connect")]
    Disabled,
    /// The publish call itself failed.
    #[error("publish to '{topic}' failed: {reason}")]
    Publish {
        /// Destination topic.
        topic: String,
        /// Client-provided reason.
        reason: String,
    },
}

/// A connected notification channel.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a non-retained message without waiting for acknowledgement.
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError>;
}

/// Establishes a [`Publisher`] from process-wide settings.
#[async_trait]
pub trait PublisherConnector: Send + Sync {
    /// Connect to the broker described by `settings`.
    async fn connect(&self, settings: &MqttSettings) -> Result<Box<dyn Publisher>, PublishError>;
}

/// Connection state of the process-wide publisher.
pub enum PublisherState {
    /// No publish has been attempted yet.
    Unconnected,
    /// Live connection reused by every publish action.
    Connected(Box<dyn Publisher>),
    /// The first connect failed; publishing stays disabled.
    Failed,
}

/// Lazily connected, process-wide publisher.
pub struct PublisherHandle {
    settings: MqttSettings,
    connector: Arc<dyn PublisherConnector>,
    state: PublisherState,
}

impl PublisherHandle {
    /// Create an unconnected handle.
    pub fn new(settings: MqttSettings, connector: Arc<dyn PublisherConnector>) -> Self {
        Self {
            settings,
            connector,
            state: PublisherState::Unconnected,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> &PublisherState {
        &self.state
    }

    /// Whether a live connection exists.
    pub fn is_connected(&self) -> bool {
        matches!(self.state, PublisherState::Connected(_))
    }

    /// Whether the connect attempt failed and publishing is disabled.
    pub fn is_failed(&self) -> bool {
        matches!(self.state, PublisherState::Failed)
    }

    /// Publish `payload` to `topic`, connecting first if this is the first use.
    ///
    /// # Errors
    ///
    /// Returns the connect error on a failed first connect,
    /// [`PublishError::Disabled`] on every call after that, or the publish error.
    pub async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError> {
        let publisher = self.ensure_connected().await?;
        publisher.publish(topic, payload).await
    }

    async fn ensure_connected(&mut self) -> Result<&dyn Publisher, PublishError> {
        if matches!(self.state, PublisherState::Unconnected) {
            match self.connector.connect(&self.settings).await {
                Ok(publisher) => {
                    info!(host = ?self.settings.host, port = self.settings.port, "publisher connected");
                    self.state = PublisherState::Connected(publisher);
                }
                Err(e) => {
                    error!(error = %e, "publisher connect failed, publishing disabled");
                    self.state = PublisherState::Failed;
                    return Err(e);
                }
            }
        }

        match &self.state {
            PublisherState::Connected(publisher) => Ok(publisher.as_ref()),
            PublisherState::Unconnected | PublisherState::Failed => Err(PublishError::Disabled),
        }
    }
}
