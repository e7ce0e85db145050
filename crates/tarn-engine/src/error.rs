//! Engine error types

use thiserror::Error;

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors produced while loading or running a script.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The source text could not be parsed. The chunk name is whatever
    /// the loader passed in, typically a file path.
    #[error("parse error: {chunk}:{line}: {message}")]
    Parse {
        chunk: String,
        line: u32,
        message: String,
    },

    /// A fault raised while executing guest code. Carries the message
    /// text only; the engine does not attach stack traces.
    #[error("{0}")]
    Runtime(String),
}

impl EngineError {
    pub fn runtime(message: impl Into<String>) -> Self {
        EngineError::Runtime(message.into())
    }

    pub(crate) fn parse(line: u32, message: impl Into<String>) -> Self {
        EngineError::Parse {
            chunk: "source".to_string(),
            line,
            message: message.into(),
        }
    }

    /// Stamp a parse error with the chunk name it came from.
    pub fn with_chunk(self, chunk: &str) -> Self {
        match self {
            EngineError::Parse { line, message, .. } => EngineError::Parse {
                chunk: chunk.to_string(),
                line,
                message,
            },
            other => other,
        }
    }
}
