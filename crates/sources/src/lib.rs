use models::{SearchParams, Vacancy};

mod error;
pub use error::SourceError;

mod result;
pub use result::SearchResult;

mod config;
pub use config::SourceConfig;

mod transport;
pub use transport::Transport;

mod factory;
pub use factory::{Constructor, Registry, RegistryError};

pub mod hh;
pub mod superjob;

/// Source is the trait implemented by every upstream job-board adapter.
///
/// An adapter owns its full request pipeline (rate limiter, in-flight
/// semaphore, circuit breaker, tuned HTTP client) and yields only normalized
/// `Vacancy` records; upstream JSON schemas never cross this boundary.
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    /// Stable adapter name; becomes `Vacancy::seeker`.
    fn name(&self) -> &str;

    /// URL probed by the health-status manager.
    fn health_endpoint(&self) -> String;

    /// Current state of the adapter's circuit breaker.
    fn circuit_state(&self) -> breaker::State {
        breaker::State::Closed
    }

    async fn search(&self, params: &SearchParams) -> Result<Vec<Vacancy>, SourceError>;

    /// Fetch one vacancy with its full description.
    async fn fetch_details(&self, id: &str) -> Result<Vacancy, SourceError>;

    /// Release background resources (the rate limiter's feeder task).
    async fn shutdown(&self) {}
}
