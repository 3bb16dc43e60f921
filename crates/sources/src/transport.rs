use crate::{SourceConfig, SourceError};
use anyhow::Context;
use std::time::Duration;
use url::Url;

/// How long a request may wait for a free in-flight slot before giving up.
const SLOT_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest upstream body fragment carried inside an error.
const BODY_SNIPPET: usize = 256;

/// Transport is the guarded request pipeline shared by the concrete
/// adapters: circuit breaker outermost, then the in-flight semaphore, then
/// the rate limiter, then the HTTP call. A tripped breaker short-circuits
/// without consuming a slot or a token.
pub struct Transport {
    name: &'static str,
    base_url: Url,
    http: reqwest::Client,
    limiter: limiter::RateLimiter,
    semaphore: tokio::sync::Semaphore,
    breaker: breaker::Breaker,
}

impl Transport {
    pub fn new(name: &'static str, config: &SourceConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.max_idle_conns)
            .pool_idle_timeout(config.idle_conn_timeout)
            .build()
            .with_context(|| format!("building http client for source {name}"))?;

        Ok(Self {
            name,
            base_url: config.base_url.clone(),
            http,
            limiter: limiter::RateLimiter::new(config.rate_limit),
            semaphore: tokio::sync::Semaphore::new(config.max_concurrent),
            breaker: breaker::Breaker::new(config.circuit_breaker.clone()),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn circuit_state(&self) -> breaker::State {
        self.breaker.state()
    }

    /// GET `url` through the guarded pipeline and decode its JSON body.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        headers: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let outcome = self.breaker.execute(|| self.fetch(url, headers)).await;

        match outcome {
            Ok(value) => Ok(value),
            Err(breaker::Error::Open) => Err(SourceError::Unavailable {
                name: self.name.to_string(),
            }),
            Err(breaker::Error::TooManyRequests) => Err(SourceError::Busy {
                name: self.name.to_string(),
            }),
            Err(breaker::Error::Inner(err)) => Err(err),
        }
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        headers: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let _permit = match tokio::time::timeout(SLOT_TIMEOUT, self.semaphore.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) | Err(_) => return Err(SourceError::SemaphoreTimeout),
        };

        self.limiter
            .wait()
            .await
            .map_err(|_| SourceError::LimiterStopped)?;

        let mut request = self.http.get(url.clone());
        for (key, value) in headers {
            request = request.header(*key, value.as_str());
        }

        tracing::debug!(source = self.name, %url, "requesting upstream");

        let response = request
            .send()
            .await
            .map_err(|err| SourceError::Http { message: err.to_string() })?;

        let status = response.status();
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Server {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Client {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|err| SourceError::Decode { message: err.to_string() })
    }

    /// Stop the rate limiter's feeder task.
    pub async fn shutdown(&self) {
        self.limiter.stop().await;
    }
}

fn snippet(body: &str) -> String {
    match body.char_indices().nth(BODY_SNIPPET) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::snippet;

    #[test]
    fn snippet_bounds_error_bodies() {
        assert_eq!(snippet("short"), "short");
        let long = "x".repeat(1000);
        let cut = snippet(&long);
        assert_eq!(cut.len(), 256 + 3);
        assert!(cut.ends_with("..."));
    }
}
