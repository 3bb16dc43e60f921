/// Errors surfaced by a source adapter. Serializable so that a failed
/// per-source entry can ride inside a cached `SearchResult` batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceError {
    /// The adapter's circuit breaker is open.
    #[error("{name} is temporarily unavailable")]
    Unavailable { name: String },
    /// The adapter's breaker is half-open and its trial budget is spent.
    #[error("{name} is busy, try again later")]
    Busy { name: String },
    #[error("timed out waiting for a request slot")]
    SemaphoreTimeout,
    #[error("rate limiter stopped")]
    LimiterStopped,
    #[error("search timed out")]
    Timeout,
    #[error("upstream returned status {status}: {body}")]
    Server { status: u16, body: String },
    #[error("request rejected with status {status}: {body}")]
    Client { status: u16, body: String },
    #[error("failed to decode upstream response: {message}")]
    Decode { message: String },
    #[error("http request failed: {message}")]
    Http { message: String },
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl breaker::Classify for SourceError {
    /// 4xx responses and malformed requests reflect the caller, not upstream
    /// health, and must not trip the breaker. Breaker-produced rejections
    /// never re-enter it.
    fn counts_as_failure(&self) -> bool {
        match self {
            SourceError::SemaphoreTimeout
            | SourceError::LimiterStopped
            | SourceError::Timeout
            | SourceError::Server { .. }
            | SourceError::Decode { .. }
            | SourceError::Http { .. } => true,
            SourceError::Unavailable { .. }
            | SourceError::Busy { .. }
            | SourceError::Client { .. }
            | SourceError::InvalidRequest { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SourceError;
    use breaker::Classify;

    #[test]
    fn client_errors_are_not_breaker_failures() {
        assert!(!SourceError::Client {
            status: 403,
            body: "captcha required".to_string()
        }
        .counts_as_failure());
        assert!(SourceError::Server {
            status: 502,
            body: String::new()
        }
        .counts_as_failure());
        assert!(SourceError::Decode {
            message: "eof".to_string()
        }
        .counts_as_failure());
    }

    #[test]
    fn round_trips_through_json() {
        let err = SourceError::Server {
            status: 503,
            body: "overloaded".to_string(),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(serde_json::from_str::<SourceError>(&json).unwrap(), err);
    }
}
