use logeye_core::StoreError;
use logeye_notify::NotifyError;
use logeye_rules::RuleError;

/// Errors surfaced by the engine and its control surface.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Rule corpus failed to load; fatal at startup, returned by `reload`.
    #[error("rule error: {0}")]
    Rules(#[from] RuleError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("notify error: {0}")]
    Notify(#[from] NotifyError),

    /// A stage queue is closed because the engine is shutting down.
    #[error("engine is shutting down")]
    Closed,

    #[error("task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(e: tokio::task::JoinError) -> Self {
        EngineError::Task(e.to_string())
    }
}
