use crate::Inner;
use models::SearchParams;
use sources::{SearchResult, Source, SourceError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// How long one fan-out task may wait for a parallelism slot.
const SLOT_TIMEOUT: Duration = Duration::from_secs(2);

impl Inner {
    /// Query the selected sources in parallel, at most
    /// `max_concurrent_parsers` in flight, the whole pass bounded by
    /// `concurrent_search_timeout`. Produces one entry per selected source,
    /// in completion order, and feeds each outcome to the health manager.
    pub(crate) async fn fan_out(
        &self,
        params: &SearchParams,
        search_hash: &str,
        selected: &[String],
    ) -> Vec<SearchResult> {
        let deadline =
            tokio::time::Instant::now() + self.config.concurrent_search_timeout;
        let gate = Arc::new(tokio::sync::Semaphore::new(
            self.config.max_concurrent_parsers.max(1),
        ));

        let mut tasks = JoinSet::new();
        for name in selected {
            let Some(source) = self.source_by_name(name) else {
                tracing::warn!(source = %name, "selected source is not registered");
                continue;
            };

            let gate = gate.clone();
            let params = params.clone();
            let search_hash = search_hash.to_string();
            let health = self.health.clone();

            tasks.spawn(async move {
                let started = tokio::time::Instant::now();

                let outcome =
                    match tokio::time::timeout_at(deadline, guarded_search(gate, &source, &params))
                        .await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => Err(SourceError::Timeout),
                    };
                let elapsed = started.elapsed();

                health.update_status(
                    source.name(),
                    outcome.is_ok(),
                    outcome.as_ref().err().map(|err| err.to_string()),
                );

                let result = match outcome {
                    Ok(vacancies) => SearchResult {
                        source: source.name().to_string(),
                        search_hash,
                        vacancies,
                        error: None,
                        elapsed,
                    },
                    Err(error) => {
                        SearchResult::failed(source.name(), &search_hash, error, elapsed)
                    }
                };
                tracing::debug!(
                    source = source.name(),
                    ?elapsed,
                    found = result.vacancies.len(),
                    error = ?result.error,
                    "source search finished"
                );
                result
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(err) => tracing::error!(error = %err, "fan-out task failed to join"),
            }
        }
        results
    }

    pub(crate) fn source_by_name(&self, name: &str) -> Option<Arc<dyn Source>> {
        self.sources
            .iter()
            .find(|source| source.name() == name)
            .cloned()
    }
}

async fn guarded_search(
    gate: Arc<tokio::sync::Semaphore>,
    source: &Arc<dyn Source>,
    params: &SearchParams,
) -> Result<Vec<models::Vacancy>, SourceError> {
    let _slot = match tokio::time::timeout(SLOT_TIMEOUT, gate.acquire_owned()).await {
        Ok(Ok(slot)) => slot,
        Ok(Err(_)) | Err(_) => return Err(SourceError::SemaphoreTimeout),
    };
    source.search(params).await
}
