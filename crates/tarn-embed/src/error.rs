//! Interop error taxonomy.

use thiserror::Error;

use tarn_engine::EngineError;

pub type InteropResult<T> = Result<T, InteropError>;

/// Errors crossing the host/guest boundary in either direction.
#[derive(Debug, Error)]
pub enum InteropError {
    /// The guest raised a fault; carries the guest's message text.
    #[error("script error: {0}")]
    Script(String),

    #[error("global '{0}' not found")]
    GlobalNotFound(String),

    /// A handle whose entry is no longer in the store.
    #[error("handle {0} not found")]
    StaleHandle(u64),

    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("'{0}' is not callable")]
    NotCallable(String),

    #[error("field '{0}' not found")]
    FieldNotFound(String),

    #[error("index {0} out of range")]
    IndexOutOfRange(i64),

    /// The owning context was destroyed while a captured function or
    /// bound function still referenced it.
    #[error("context has been destroyed")]
    ContextGone,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl InteropError {
    pub fn type_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        InteropError::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

impl From<EngineError> for InteropError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Parse {
                chunk,
                line,
                message,
            } => InteropError::Script(format!("parse error: {}:{}: {}", chunk, line, message)),
            EngineError::Runtime(message) => InteropError::Script(message),
        }
    }
}

/// Surface an interop failure inside the guest as a plain runtime fault.
pub(crate) fn to_engine_error(err: InteropError) -> EngineError {
    EngineError::runtime(err.to_string())
}
