use crate::SourceError;
use models::Vacancy;
use std::time::Duration;

/// Outcome of one adapter within a fan-out. A batch holds one entry per
/// queried adapter; a failed entry coexists with successful ones.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchResult {
    pub source: String,
    pub search_hash: String,
    #[serde(default)]
    pub vacancies: Vec<Vacancy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SourceError>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

impl SearchResult {
    /// Successful entries are the ones eligible for caching and reverse
    /// indexing: no error and at least one vacancy.
    pub fn is_successful(&self) -> bool {
        self.error.is_none() && !self.vacancies.is_empty()
    }

    pub fn failed(source: &str, search_hash: &str, error: SourceError, elapsed: Duration) -> Self {
        Self {
            source: source.to_string(),
            search_hash: search_hash.to_string(),
            vacancies: Vec::new(),
            error: Some(error),
            elapsed,
        }
    }
}
