//! FTP-backed remote store using the blocking `suppaftp` client.
//!
//! Every FTP command runs on tokio's blocking pool. The stream is moved into
//! the blocking task and handed back afterwards, so a session never needs a lock.

use async_trait::async_trait;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::debug;

use super::{RemoteStore, StoreConnector, StoreEndpoint, StoreError};

/// Connector producing [`FtpStore`] sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct FtpConnector;

#[async_trait]
impl StoreConnector for FtpConnector {
    async fn connect(&self, endpoint: &StoreEndpoint) -> Result<Box<dyn RemoteStore>, StoreError> {
        let endpoint = endpoint.clone();
        let stream = tokio::task::spawn_blocking(move || open_session(&endpoint))
            .await
            .map_err(|e| StoreError::Transport(format!("connect task failed: {e}")))??;
        Ok(Box::new(FtpStore {
            stream: Some(stream),
        }))
    }
}

fn open_session(endpoint: &StoreEndpoint) -> Result<FtpStream, StoreError> {
    let mut stream = FtpStream::connect((endpoint.host.as_str(), endpoint.port))
        .map_err(transport)?;
    debug!(host = %endpoint.host, port = endpoint.port, "ftp control connection open");

    stream
        .login(&endpoint.user, &endpoint.password)
        .map_err(|e| StoreError::Login(e.to_string()))?;
    stream.transfer_type(FileType::Binary).map_err(transport)?;
    stream.cwd(&endpoint.path).map_err(|e| StoreError::Path {
        path: endpoint.path.clone(),
        reason: e.to_string(),
    })?;
    Ok(stream)
}

fn transport(e: FtpError) -> StoreError {
    StoreError::Transport(e.to_string())
}

/// A logged-in FTP session.
pub struct FtpStore {
    // `None` only while a command is running on the blocking pool, or after
    // that task died and took the stream with it.
    stream: Option<FtpStream>,
}

impl FtpStore {
    async fn run<T, F>(&mut self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream) -> Result<T, FtpError> + Send + 'static,
    {
        let mut stream = self.stream.take().ok_or(StoreError::NotConnected)?;
        let (stream, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut stream);
            (stream, result)
        })
        .await
        .map_err(|e| StoreError::Transport(format!("ftp task failed: {e}")))?;
        self.stream = Some(stream);
        result.map_err(transport)
    }
}

#[async_trait]
impl RemoteStore for FtpStore {
    async fn list_names(&mut self) -> Result<Vec<String>, StoreError> {
        self.run(|stream| stream.nlst(None)).await
    }

    async fn fetch(&mut self, name: &str) -> Result<Vec<u8>, StoreError> {
        let name = name.to_owned();
        self.run(move |stream| stream.retr_as_buffer(&name).map(|cursor| cursor.into_inner()))
            .await
    }
}
