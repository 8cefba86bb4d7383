//! Remote file store abstractions.
//!
//! A [`StoreConnector`] opens [`RemoteStore`] sessions against a
//! [`StoreEndpoint`]. Each device owns at most one live session.

use async_trait::async_trait;

use crate::config::DeviceConfig;

pub mod ftp;

/// Login used when a device has no `user` configured.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Where and how to reach one remote store.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreEndpoint {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Directory entered right after login.
    pub path: String,
}

impl StoreEndpoint {
    /// Build an endpoint from a device entry.
    pub fn from_device(device: &DeviceConfig) -> Self {
        Self {
            host: device.hostname.clone(),
            port: device.port,
            user: device
                .user
                .clone()
                .unwrap_or_else(|| ANONYMOUS_USER.to_owned()),
            password: device.password.clone(),
            path: device.path.clone(),
        }
    }
}

impl std::fmt::Debug for StoreEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("path", &self.path)
            .finish()
    }
}

/// Errors produced by remote store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No live session exists.
    #[error("not connected")]
    NotConnected,
    /// Network or protocol failure.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The server rejected the login.
    #[error("login rejected: {0}")]
    Login(String),
    /// The remote directory could not be entered or read.
    #[error("remote path '{path}' unavailable: {reason}")]
    Path {
        /// Remote directory.
        path: String,
        /// Server-provided reason.
        reason: String,
    },
}

/// A live session with a remote file store, positioned in the endpoint path.
#[async_trait]
pub trait RemoteStore: Send {
    /// List the names of all files in the current directory.
    async fn list_names(&mut self) -> Result<Vec<String>, StoreError>;
    /// Fetch the full contents of a file in the current directory.
    async fn fetch(&mut self, name: &str) -> Result<Vec<u8>, StoreError>;
}

/// Opens sessions against an endpoint.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Connect, log in, and change into `endpoint.path`.
    async fn connect(&self, endpoint: &StoreEndpoint) -> Result<Box<dyn RemoteStore>, StoreError>;
}
