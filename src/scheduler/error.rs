#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Scheduler already started")]
    AlreadyStarted,
    #[error("Scheduler is shut down")]
    ShutDown,
    #[error("Task failed: {0}")]
    TaskFailed(String),
    #[error("Task panicked: {0}")]
    TaskPanicked(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
