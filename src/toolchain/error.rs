//! Command failure types

use thiserror::Error;

/// Error types for external command execution
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code}: {stderr}")]
    Failed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("`{command}` timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },

    #[error("`{command}` produced undecodable output: {reason}")]
    Decode { command: String, reason: String },

    #[error("`{command}` returned unexpected output: {reason}")]
    UnexpectedOutput { command: String, reason: String },
}

impl CommandError {
    /// Exit code of the failed command, if it ran to completion
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandError::Failed { code, .. } => Some(*code),
            _ => None,
        }
    }
}
