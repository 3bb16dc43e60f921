use chrono::{DateTime, Utc};
use std::time::Duration;

/// Point-in-time health snapshot of one source adapter, as tracked by the
/// health-status manager. `error_count` and `success_count` are mutually
/// resetting: a success zeroes the error streak and vice versa.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SourceStatus {
    pub name: String,
    pub last_check: DateTime<Utc>,
    #[serde(default)]
    pub last_success: Option<DateTime<Utc>>,
    pub error_count: u32,
    pub success_count: u32,
    pub is_healthy: bool,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Mirror of the adapter's circuit breaker: "closed", "open" or
    /// "half-open".
    pub circuit_state: String,
    /// False until the first probe or real request has been observed.
    pub initialized: bool,
    pub health_endpoint: String,
    #[serde(default, with = "humantime_serde")]
    pub response_time: Option<Duration>,
}

impl SourceStatus {
    /// Fresh entry for a just-registered source, before any observation.
    pub fn unobserved(name: &str, health_endpoint: &str) -> Self {
        Self {
            name: name.to_string(),
            last_check: Utc::now(),
            last_success: None,
            error_count: 0,
            success_count: 0,
            is_healthy: false,
            last_error: None,
            circuit_state: "closed".to_string(),
            initialized: false,
            health_endpoint: health_endpoint.to_string(),
            response_time: None,
        }
    }
}
