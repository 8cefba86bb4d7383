//! Filename patterns and their action chains.

use anyhow::Context;
use regex::Regex;
use tracing::{debug, error, warn};

use crate::action::{Action, ActionContext};
use crate::config::PatternConfig;

/// A compiled filename rule bound to an ordered list of actions.
#[derive(Debug, Clone)]
pub struct Pattern {
    name: Option<String>,
    source: String,
    regex: Regex,
    actions: Vec<Action>,
}

impl Pattern {
    /// Compile `file_pattern` so it only matches from the start of a filename.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression is not a valid regex.
    pub fn new(name: Option<String>, file_pattern: &str, actions: Vec<Action>) -> anyhow::Result<Self> {
        // Validate the user's expression on its own first so the error points at it.
        Regex::new(file_pattern).with_context(|| format!("invalid file_pattern '{file_pattern}'"))?;
        let regex = Regex::new(&format!("^(?:{file_pattern})"))
            .with_context(|| format!("invalid file_pattern '{file_pattern}'"))?;
        Ok(Self {
            name,
            source: file_pattern.to_owned(),
            regex,
            actions,
        })
    }

    /// Build a pattern from config, dropping actions of unrecognised type.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid regex or a malformed recognised action.
    pub fn from_config(config: &PatternConfig) -> anyhow::Result<Self> {
        let mut actions = Vec::with_capacity(config.actions.len());
        for raw in &config.actions {
            match Action::from_config(raw)? {
                Action::Unknown { kind } => {
                    warn!(action = %kind, pattern = %config.file_pattern, "ignoring unknown action");
                }
                action => actions.push(action),
            }
        }
        Self::new(config.name.clone(), &config.file_pattern, actions)
    }

    /// Display name, falling back to the expression.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.source)
    }

    /// The expression as written in the config.
    pub fn file_pattern(&self) -> &str {
        &self.source
    }

    /// Actions in execution order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Whether the expression matches `filename` starting at position 0.
    pub fn matches(&self, filename: &str) -> bool {
        self.regex.is_match(filename)
    }

    /// Run every action in order if `filename` matches.
    ///
    /// A failing action is logged and the remaining actions still run.
    /// Returns whether the pattern matched.
    pub async fn process(&self, ctx: &mut ActionContext<'_>, filename: &str) -> bool {
        if !self.matches(filename) {
            return false;
        }
        debug!(device = %ctx.device, pattern = %self.name(), file = %filename, "pattern matched");

        for action in &self.actions {
            if let Err(e) = action.execute(ctx, filename).await {
                error!(
                    device = %ctx.device,
                    pattern = %self.name(),
                    file = %filename,
                    action = %action.kind(),
                    error = %e,
                    "action failed"
                );
            }
        }
        true
    }
}
