use serde_json::Value;

use crate::subprocess::ProcessError;

#[derive(Debug, thiserror::Error)]
pub enum SfCliError {
    #[error("Empty command line")]
    EmptyCommand,

    #[error("Invalid command line: {0}")]
    Parse(#[from] shell_words::ParseError),

    /// The CLI returned a machine-readable error envelope. The message is
    /// preserved verbatim; callers branch on `name`/`message` substrings
    /// for known recoverable conditions.
    #[error("{name}: {message}")]
    Structured {
        status: i64,
        name: String,
        message: String,
        payload: Value,
    },

    /// The process failed without producing a parseable envelope. The raw
    /// captured text is all there is; callers must not assume JSON shape.
    #[error("Command `{command}` failed: {message}")]
    Unstructured { command: String, message: String },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl SfCliError {
    pub fn error_name(&self) -> Option<&str> {
        match self {
            SfCliError::Structured { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Substring match against the preserved error name and message.
    pub fn mentions(&self, needle: &str) -> bool {
        match self {
            SfCliError::Structured { name, message, .. } => {
                name.contains(needle) || message.contains(needle)
            }
            SfCliError::Unstructured { message, .. } => message.contains(needle),
            other => other.to_string().contains(needle),
        }
    }
}
