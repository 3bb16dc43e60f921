use std::time::Duration;
use url::Url;

/// Per-upstream wiring: endpoint, credentials, transport tuning, and the
/// adapter-local breaker. Deserialized from the application config with
/// every field optional.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub enabled: bool,
    pub base_url: Url,
    pub api_key: String,
    /// Total budget for one upstream request.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Minimum spacing between requests to this upstream.
    #[serde(with = "humantime_serde")]
    pub rate_limit: Duration,
    /// In-flight request cap (the per-source semaphore capacity).
    pub max_concurrent: usize,
    pub max_idle_conns: usize,
    #[serde(with = "humantime_serde")]
    pub idle_conn_timeout: Duration,
    /// Covers TCP connect and the TLS handshake.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    pub circuit_breaker: breaker::Config,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: Url::parse("https://localhost").unwrap(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
            rate_limit: Duration::from_secs(2),
            max_concurrent: 10,
            max_idle_conns: 5,
            idle_conn_timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(10),
            circuit_breaker: breaker::Config::default(),
        }
    }
}
