//! Actions triggered by a filename match.
//!
//! [`Action`] is a closed set of variants dispatched by a single `match` in
//! [`Action::execute`]. Failures are returned to the caller, which logs them
//! and moves on to the next action.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::ActionConfig;
use crate::publisher::{PublishError, PublisherHandle};
use crate::store::{RemoteStore, StoreError};
use crate::template::{self, TemplateError};

/// Errors produced while executing an action.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// A template could not be rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// The owning device has no live connection.
    #[error("device has no live connection")]
    NotConnected,
    /// Fetching the remote file failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] StoreError),
    /// Writing the local file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Local target path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Publishing failed.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Everything an action may touch while it runs.
pub struct ActionContext<'a> {
    /// Name of the device that saw the file.
    pub device: &'a str,
    /// The device's live connection, if any.
    pub store: Option<&'a mut Box<dyn RemoteStore>>,
    /// Process-wide publisher.
    pub publisher: &'a mut PublisherHandle,
}

/// Download the triggering file to a local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadAction {
    /// Directory template.
    pub download_path: String,
    /// Filename template.
    pub download_filename: String,
}

impl DownloadAction {
    /// Local target path for `filename`.
    ///
    /// # Errors
    ///
    /// Returns an error if either template fails to render.
    pub fn target(&self, filename: &str) -> Result<(PathBuf, PathBuf), TemplateError> {
        let dir = PathBuf::from(template::render(&self.download_path, filename)?);
        let file = template::render(&self.download_filename, filename)?;
        let path = dir.join(file);
        Ok((dir, path))
    }

    async fn execute(&self, ctx: &mut ActionContext<'_>, filename: &str) -> Result<(), ActionError> {
        let (dir, path) = self.target(filename)?;
        let store = ctx.store.as_mut().ok_or(ActionError::NotConnected)?;
        let bytes = store.fetch(filename).await?;

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| ActionError::Write {
                path: dir.clone(),
                source,
            })?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| ActionError::Write {
                path: path.clone(),
                source,
            })?;

        info!(
            device = %ctx.device,
            file = %filename,
            target = %path.display(),
            bytes = bytes.len(),
            "downloaded"
        );
        Ok(())
    }
}

/// Publish a notification about the triggering file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAction {
    /// Topic template.
    pub topic: String,
    /// Payload template.
    pub payload: String,
}

impl PublishAction {
    /// Rendered `(topic, payload)` for `filename`.
    ///
    /// # Errors
    ///
    /// Returns an error if either template fails to render.
    pub fn message(&self, filename: &str) -> Result<(String, String), TemplateError> {
        Ok((
            template::render(&self.topic, filename)?,
            template::render(&self.payload, filename)?,
        ))
    }

    async fn execute(&self, ctx: &mut ActionContext<'_>, filename: &str) -> Result<(), ActionError> {
        let (topic, payload) = self.message(filename)?;
        ctx.publisher.publish(&topic, &payload).await?;
        info!(device = %ctx.device, file = %filename, topic = %topic, "published");
        Ok(())
    }
}

/// A unit of work bound to a pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Fetch the file and write it locally.
    Download(DownloadAction),
    /// Publish a message to the notification channel.
    Publish(PublishAction),
    /// Pause the whole monitor loop.
    Wait(Duration),
    /// Inert action; only logs a warning when run.
    Unknown {
        /// The unrecognised type name.
        kind: String,
    },
}

impl Action {
    /// Build an action from its configuration entry.
    ///
    /// Unrecognised `action` values yield [`Action::Unknown`]; callers decide
    /// whether to keep it.
    ///
    /// # Errors
    ///
    /// Returns an error when a recognised action is missing a required field
    /// or carries an invalid duration.
    pub fn from_config(config: &ActionConfig) -> anyhow::Result<Self> {
        let action = match config.action.as_str() {
            "download" => {
                let download_path = config
                    .download_path
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("download action requires download_path"))?;
                Self::Download(DownloadAction {
                    download_path,
                    download_filename: config.download_filename.clone(),
                })
            }
            "mqtt" => {
                let topic = config
                    .topic
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("mqtt action requires topic"))?;
                Self::Publish(PublishAction {
                    topic,
                    payload: config.payload.clone(),
                })
            }
            "wait" => {
                let duration = Duration::try_from_secs_f64(config.duration).map_err(|e| {
                    anyhow::anyhow!("invalid wait duration {}: {e}", config.duration)
                })?;
                Self::Wait(duration)
            }
            other => Self::Unknown {
                kind: other.to_owned(),
            },
        };
        Ok(action)
    }

    /// Short type name used in logs.
    pub fn kind(&self) -> &str {
        match self {
            Self::Download(_) => "download",
            Self::Publish(_) => "mqtt",
            Self::Wait(_) => "wait",
            Self::Unknown { kind } => kind.as_str(),
        }
    }

    /// Run the action for `filename`.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] describing why the effect was skipped.
    pub async fn execute(&self, ctx: &mut ActionContext<'_>, filename: &str) -> Result<(), ActionError> {
        match self {
            Self::Download(download) => download.execute(ctx, filename).await,
            Self::Publish(publish) => publish.execute(ctx, filename).await,
            Self::Wait(duration) => {
                info!(device = %ctx.device, file = %filename, secs = duration.as_secs_f64(), "waiting");
                tokio::time::sleep(*duration).await;
                Ok(())
            }
            Self::Unknown { kind } => {
                warn!(device = %ctx.device, file = %filename, action = %kind, "action has no effect");
                Ok(())
            }
        }
    }
}
