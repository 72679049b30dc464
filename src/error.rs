use thiserror::Error;

/// Errors raised by the single-flight coordinator.
///
/// None of these are fatal: the coordinator always returns to IDLE after
/// reporting them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    /// Another application holds the lock. Retry later.
    #[error("application already in progress for {item_id}")]
    AlreadyInProgress { item_id: String },

    #[error("no application in progress")]
    NotInProgress,

    /// The health check forced the application back to IDLE.
    #[error("application for {item_id} timed out after {elapsed_ms}ms")]
    Timeout { item_id: String, elapsed_ms: u64 },

    /// The apply action reported a failure. The item stays processed.
    #[error("application for {item_id} failed: {reason}")]
    ActionFailed { item_id: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read job file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid job file: {0}")]
    Parse(String),

    #[error("unsupported job file format: {0}")]
    UnsupportedFormat(String),

    #[error("job entry {index} has an empty id")]
    EmptyId { index: usize },
}

/// Falhas ao ler ou gravar o snapshot do coordenador.
#[derive(Debug, Error)]
pub enum AutoApplyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
