use crate::{Error, Inner};
use models::{SearchParams, VacancyIndex};
use sources::SearchResult;

impl Inner {
    /// Full search path of one dequeued job: global semaphore slot, then the
    /// global breaker around cache probe / source selection / fan-out, with
    /// the fallback chain when the breaker is open.
    pub(crate) async fn process_search(
        &self,
        params: &SearchParams,
    ) -> Result<Vec<SearchResult>, Error> {
        self.with_slot(|| async move {
            let outcome = self.breaker.execute(|| self.execute_search(params)).await;

            match outcome {
                Ok(results) => Ok(results),
                Err(breaker::Error::Open) | Err(breaker::Error::TooManyRequests) => {
                    tracing::warn!("global circuit breaker rejected the search; trying fallbacks");
                    self.try_fallbacks(params).ok_or(Error::ServiceUnavailable)
                }
                Err(breaker::Error::Inner(err)) => Err(err),
            }
        })
        .await
    }

    async fn execute_search(&self, params: &SearchParams) -> Result<Vec<SearchResult>, Error> {
        let search_hash = params.fingerprint();

        // A cache hit exercised no source, so source statuses stay untouched.
        if let Some(batch) = self.results.get(&search_hash) {
            tracing::debug!(%search_hash, "result cache hit");
            return Ok(batch);
        }

        let selected = self.select_sources();
        if selected.is_empty() {
            return Err(Error::NoSources);
        }

        let results = self.fan_out(params, &search_hash, &selected).await;

        for source in &self.sources {
            self.health
                .record_circuit_state(source.name(), source.circuit_state().name());
        }

        let successful = results.iter().filter(|r| r.is_successful()).count();
        tracing::info!(
            %search_hash,
            queried = results.len(),
            successful,
            "fan-out finished"
        );

        if successful == 0 {
            // Nothing worth caching; the next request probes upstreams again.
            return Err(Error::AllSourcesFailed);
        }

        self.cache_results(params, &search_hash, &results);
        Ok(results)
    }

    /// Healthy sources first; when everything looks unhealthy, probe the
    /// full set as a last resort.
    fn select_sources(&self) -> Vec<String> {
        let healthy = self.health.healthy_sources();
        if !healthy.is_empty() {
            return healthy;
        }

        tracing::warn!("no healthy sources; falling back to the full set");
        self.sources
            .iter()
            .map(|source| source.name().to_string())
            .collect()
    }

    fn cache_results(&self, params: &SearchParams, search_hash: &str, results: &[SearchResult]) {
        self.results
            .insert(search_hash, results.to_vec(), self.config.search_ttl);

        // The general-text key feeds the breaker-open fallback chain.
        if !params.text.is_empty() {
            self.results.insert(
                &fallback_key(&params.text),
                results.to_vec(),
                self.config.search_ttl,
            );
        }

        let index_ttl = self.config.index_ttl();
        for result in results.iter().filter(|r| r.is_successful()) {
            for (position, vacancy) in result.vacancies.iter().enumerate() {
                let key = models::composite_id(&result.source, &vacancy.id);
                self.index.insert(
                    &key,
                    VacancyIndex {
                        search_hash: search_hash.to_string(),
                        source: result.source.clone(),
                        position,
                    },
                    index_ttl,
                );
            }
        }
    }

    /// Fallback strategies once the global breaker is open, tried in order.
    fn try_fallbacks(&self, params: &SearchParams) -> Option<Vec<SearchResult>> {
        if let Some(results) = self.try_general_key(params) {
            tracing::info!("serving fallback results from the general-key cache");
            return Some(results);
        }
        if let Some(results) = self.try_similar_queries(params) {
            return Some(results);
        }
        self.try_static_defaults(params)
    }

    fn try_general_key(&self, params: &SearchParams) -> Option<Vec<SearchResult>> {
        if params.text.is_empty() {
            return None;
        }
        self.results.get(&fallback_key(&params.text))
    }

    /// Hook for a nearest-query lookup; not wired to anything yet.
    fn try_similar_queries(&self, _params: &SearchParams) -> Option<Vec<SearchResult>> {
        None
    }

    /// Hook for static default listings; not wired to anything yet.
    fn try_static_defaults(&self, _params: &SearchParams) -> Option<Vec<SearchResult>> {
        None
    }
}

fn fallback_key(text: &str) -> String {
    format!("fallback:{text}")
}
