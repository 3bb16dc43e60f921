use crate::{Error, Inner};
use models::{Vacancy, VacancyIndex};
use sources::{SearchResult, SourceError};

impl Inner {
    /// Resolve one vacancy by `(source, id)`: the details cache first, then
    /// the reverse index into a cached batch, then a direct upstream fetch
    /// under the global breaker. A reverse-index entry whose batch has
    /// expired is deleted on discovery.
    pub(crate) async fn process_details(
        &self,
        source_name: &str,
        vacancy_id: &str,
    ) -> Result<Vacancy, Error> {
        self.with_slot(|| async move {
            if let Some(vacancy) = self.details.get(vacancy_id) {
                tracing::debug!(vacancy_id, "details cache hit");
                return Ok(vacancy);
            }

            let key = models::composite_id(source_name, vacancy_id);
            if let Some(index) = self.index.get(&key) {
                match self.results.get(&index.search_hash) {
                    Some(batch) => {
                        if let Some(vacancy) = locate(&batch, &index, source_name, vacancy_id) {
                            tracing::debug!(vacancy_id, "resolved through the reverse index");
                            return Ok(vacancy);
                        }
                        // The batch no longer holds this vacancy; the index
                        // entry is stale either way.
                        self.index.remove(&key);
                    }
                    None => {
                        tracing::debug!(%key, "reverse index points at an expired batch");
                        self.index.remove(&key);
                    }
                }
            }

            self.fetch_details_upstream(source_name, vacancy_id).await
        })
        .await
    }

    async fn fetch_details_upstream(
        &self,
        source_name: &str,
        vacancy_id: &str,
    ) -> Result<Vacancy, Error> {
        let source = self
            .source_by_name(source_name)
            .ok_or_else(|| Error::UnknownSource(source_name.to_string()))?;

        let outcome = self
            .breaker
            .execute(|| async move {
                source
                    .fetch_details(vacancy_id)
                    .await
                    .map_err(Error::Source)
            })
            .await;

        match outcome {
            Ok(vacancy) => {
                self.health.update_status(source_name, true, None);
                self.details
                    .insert(vacancy_id, vacancy.clone(), self.config.vacancy_ttl);
                Ok(vacancy)
            }
            Err(breaker::Error::Open) | Err(breaker::Error::TooManyRequests) => {
                Err(Error::ServiceUnavailable)
            }
            Err(breaker::Error::Inner(err)) => {
                self.health
                    .update_status(source_name, false, Some(err.to_string()));
                match err {
                    // An upstream 404 means the id, not the source, is bad.
                    Error::Source(SourceError::Client { status: 404, .. }) => {
                        Err(Error::NotFound {
                            name: source_name.to_string(),
                            id: vacancy_id.to_string(),
                        })
                    }
                    err => Err(err),
                }
            }
        }
    }
}

/// Find the indexed vacancy inside its batch: the recorded position first,
/// then a scan in case the batch was rewritten since the index was taken.
fn locate(
    batch: &[SearchResult],
    index: &VacancyIndex,
    source_name: &str,
    vacancy_id: &str,
) -> Option<Vacancy> {
    let entry = batch.iter().find(|result| result.source == source_name)?;

    if let Some(vacancy) = entry.vacancies.get(index.position) {
        if vacancy.id == vacancy_id {
            return Some(vacancy.clone());
        }
    }
    entry
        .vacancies
        .iter()
        .find(|vacancy| vacancy.id == vacancy_id)
        .cloned()
}
