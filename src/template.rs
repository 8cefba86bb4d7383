//! `{filename}` substitution for action templates.
//!
//! Templates use brace placeholders: `{filename}` expands to the triggering
//! remote file name, `{{` and `}}` produce literal braces.

use thiserror::Error;

/// Placeholder name recognised inside templates.
pub const FILENAME_PLACEHOLDER: &str = "filename";

/// Error type for template rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A placeholder other than `{filename}` was used.
    #[error("unknown placeholder '{{{0}}}' in template '{1}'")]
    UnknownPlaceholder(String, String),
    /// A `{` without a closing `}`, or a lone `}`.
    #[error("unbalanced brace in template '{0}'")]
    Unbalanced(String),
}

/// Render `template`, replacing every `{filename}` with `filename`.
///
/// # Errors
///
/// Returns [`TemplateError`] for unknown placeholders or unbalanced braces.
pub fn render(template: &str, filename: &str) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len().saturating_add(filename.len()));
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => return Err(TemplateError::Unbalanced(template.to_owned())),
                        Some(ch) => name.push(ch),
                    }
                }
                if name != FILENAME_PLACEHOLDER {
                    return Err(TemplateError::UnknownPlaceholder(name, template.to_owned()));
                }
                out.push_str(filename);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(TemplateError::Unbalanced(template.to_owned())),
            other => out.push(other),
        }
    }

    Ok(out)
}
