use std::time::Duration;

/// Tuning of the aggregation manager: worker pool, bounded queue, global
/// semaphore, fan-out bounds, cache TTLs, and the global circuit breaker.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker tasks draining the job queue.
    pub workers: usize,
    /// Bounded job queue capacity.
    pub queue_capacity: usize,
    /// Global semaphore capacity; 0 means one slot per CPU.
    pub max_parallel_jobs: usize,
    /// Parallelism cap within a single fan-out.
    pub max_concurrent_parsers: usize,
    /// How long a worker waits for a global semaphore slot.
    #[serde(with = "humantime_serde")]
    pub semaphore_wait: Duration,
    /// How long a submitter retries enqueueing before `QueueFull`.
    #[serde(with = "humantime_serde")]
    pub enqueue_timeout: Duration,
    /// Total budget a submitter waits for its reply.
    #[serde(with = "humantime_serde")]
    pub execution_timeout: Duration,
    /// Wall-clock budget of one fan-out.
    #[serde(with = "humantime_serde")]
    pub concurrent_search_timeout: Duration,
    /// Result-cache entry lifetime.
    #[serde(with = "humantime_serde")]
    pub search_ttl: Duration,
    /// Details-cache entry lifetime; also bounds reverse-index entries.
    #[serde(with = "humantime_serde")]
    pub vacancy_ttl: Duration,
    pub circuit_breaker: breaker::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 64,
            max_parallel_jobs: 0,
            max_concurrent_parsers: 2,
            semaphore_wait: Duration::from_secs(5),
            enqueue_timeout: Duration::from_secs(5),
            execution_timeout: Duration::from_secs(30),
            concurrent_search_timeout: Duration::from_secs(15),
            search_ttl: Duration::from_secs(60),
            vacancy_ttl: Duration::from_secs(60),
            circuit_breaker: breaker::Config::default(),
        }
    }
}

impl Config {
    pub(crate) fn semaphore_capacity(&self) -> usize {
        match self.max_parallel_jobs {
            0 => num_cpus::get(),
            n => n,
        }
    }

    /// The reverse index must never outlive the batches it points into.
    pub(crate) fn index_ttl(&self) -> Duration {
        self.vacancy_ttl.min(self.search_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use std::time::Duration;

    #[test]
    fn zero_parallel_jobs_means_one_slot_per_cpu() {
        let config = Config::default();
        assert!(config.semaphore_capacity() >= 1);

        let config = Config {
            max_parallel_jobs: 3,
            ..Config::default()
        };
        assert_eq!(config.semaphore_capacity(), 3);
    }

    #[test]
    fn index_ttl_never_exceeds_either_cache_ttl() {
        let config = Config {
            search_ttl: Duration::from_secs(30),
            vacancy_ttl: Duration::from_secs(120),
            ..Config::default()
        };
        assert_eq!(config.index_ttl(), Duration::from_secs(30));

        let config = Config {
            search_ttl: Duration::from_secs(300),
            vacancy_ttl: Duration::from_secs(60),
            ..Config::default()
        };
        assert_eq!(config.index_ttl(), Duration::from_secs(60));
    }
}
