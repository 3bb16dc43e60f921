use sources::SourceError;

/// Errors surfaced to manager callers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("job queue is full")]
    QueueFull,
    #[error("search did not complete in time")]
    ExecutionTimeout,
    #[error("service is shutting down")]
    ServiceShutdown,
    #[error("no worker slot became available")]
    Overloaded,
    #[error("no sources available for search")]
    NoSources,
    #[error("every source failed")]
    AllSourcesFailed,
    #[error("service temporarily unavailable, try again later")]
    ServiceUnavailable,
    #[error("vacancy {id} not found at {name}")]
    NotFound { name: String, id: String },
    #[error("unknown source: {0}")]
    UnknownSource(String),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl breaker::Classify for Error {
    /// The global breaker counts whole-fan-out collapses and upstream-health
    /// failures; caller mistakes and lookup misses stay neutral.
    fn counts_as_failure(&self) -> bool {
        match self {
            Error::NoSources | Error::AllSourcesFailed => true,
            Error::Source(err) => err.counts_as_failure(),
            _ => false,
        }
    }
}
