use thiserror::Error;
use tokio::task::JoinError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine has already been started")]
    AlreadyStarted,
    #[error("engine must be started from within a Tokio runtime")]
    NoRuntime,
    #[error("{task} task failed: {source}")]
    TaskFailed {
        task: &'static str,
        source: JoinError,
    },
}
