use cache::Cache;
use futures::FutureExt;
use health::HealthManager;
use models::{SearchParams, SourceStatus, Vacancy, VacancyIndex};
use sources::{SearchResult, Source};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod config;
pub use config::Config;

mod error;
pub use error::Error;

pub mod queue;
use queue::JobQueue;

mod jobs;
use jobs::{DetailsJob, Job, SearchJob};

mod details;
mod fanout;
mod search;

/// Pause between enqueue attempts while the job queue is full.
const ENQUEUE_BACKOFF: Duration = Duration::from_millis(50);

/// How long `shutdown` waits for in-flight workers.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Manager coordinates the whole aggregation pipeline: callers submit jobs
/// into a bounded queue; a worker pool drains it and answers each job from
/// the caches or through a bounded parallel fan-out over the healthy
/// sources, all under a global circuit breaker.
pub struct Manager {
    inner: Arc<Inner>,
    workers: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

pub(crate) struct Inner {
    pub(crate) sources: Vec<Arc<dyn Source>>,
    pub(crate) config: Config,
    pub(crate) results: Cache<Vec<SearchResult>>,
    pub(crate) index: Cache<VacancyIndex>,
    pub(crate) details: Cache<Vacancy>,
    pub(crate) health: Arc<HealthManager>,
    pub(crate) breaker: breaker::Breaker,
    pub(crate) queue: JobQueue<Job>,
    pub(crate) semaphore: Arc<tokio::sync::Semaphore>,
    pub(crate) stop: CancellationToken,
}

impl Manager {
    /// Wire the manager and start its worker pool. The three caches are
    /// owned by the manager from here on; `shutdown` stops their sweepers.
    pub fn new(
        config: Config,
        sources: Vec<Arc<dyn Source>>,
        results: Cache<Vec<SearchResult>>,
        index: Cache<VacancyIndex>,
        details: Cache<Vacancy>,
        health: Arc<HealthManager>,
    ) -> Self {
        let inner = Arc::new(Inner {
            breaker: breaker::Breaker::new(config.circuit_breaker.clone()),
            queue: JobQueue::new(config.queue_capacity),
            semaphore: Arc::new(tokio::sync::Semaphore::new(config.semaphore_capacity())),
            stop: CancellationToken::new(),
            sources,
            config,
            results,
            index,
            details,
            health,
        });

        let workers = (0..inner.config.workers.max(1))
            .map(|id| tokio::spawn(worker_loop(inner.clone(), id)))
            .collect();

        Self {
            inner,
            workers: Mutex::new(workers),
        }
    }

    /// Fan a search out to every healthy source, returning one entry per
    /// queried source. Cached batches are returned without touching any
    /// upstream.
    pub async fn multi_search(&self, params: SearchParams) -> Result<Vec<SearchResult>, Error> {
        if self.inner.stop.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        let (job, reply) = SearchJob::new(params);
        tracing::debug!(job = %job.id, "submitting search job");

        self.enqueue(Job::Search(job)).await?;
        self.await_reply(reply).await
    }

    /// Resolve one vacancy by `(source, id)`, preferring the caches and
    /// falling back to a direct upstream fetch.
    pub async fn vacancy_details(&self, source: &str, vacancy_id: &str) -> Result<Vacancy, Error> {
        if self.inner.stop.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        let (job, reply) = DetailsJob::new(source, vacancy_id);
        tracing::debug!(job = %job.id, source, vacancy_id, "submitting details job");

        self.enqueue(Job::Details(job)).await?;
        self.await_reply(reply).await
    }

    pub fn source_names(&self) -> Vec<String> {
        self.inner
            .sources
            .iter()
            .map(|source| source.name().to_string())
            .collect()
    }

    pub fn statuses(&self) -> Vec<SourceStatus> {
        self.inner.health.all_statuses()
    }

    pub fn global_breaker_state(&self) -> breaker::State {
        self.inner.breaker.state()
    }

    pub fn global_breaker_stats(&self) -> breaker::Stats {
        self.inner.breaker.stats()
    }

    pub fn queue_depth(&self) -> usize {
        self.inner.queue.len()
    }

    /// Stop accepting work, drain the workers (bounded wait), then stop the
    /// health manager, the cache sweepers, and every source's rate limiter.
    /// Idempotent; pending queued jobs are dropped and their submitters
    /// observe `ServiceShutdown`.
    pub async fn shutdown(&self) {
        tracing::info!("manager shutting down");
        self.inner.stop.cancel();

        let workers: Vec<_> = std::mem::take(&mut *self.workers.lock().unwrap());
        let drain = futures::future::join_all(workers);
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
            tracing::warn!("shutdown timed out waiting for workers");
        }

        self.inner.health.stop().await;
        for source in &self.inner.sources {
            source.shutdown().await;
        }
        self.inner.results.stop().await;
        self.inner.index.stop().await;
        self.inner.details.stop().await;
        tracing::info!("manager stopped");
    }

    async fn enqueue(&self, job: Job) -> Result<(), Error> {
        let started = tokio::time::Instant::now();
        let mut job = job;

        loop {
            match self.inner.queue.try_enqueue(job) {
                Ok(()) => return Ok(()),
                Err(returned) => job = returned,
            }
            if started.elapsed() >= self.inner.config.enqueue_timeout {
                return Err(Error::QueueFull);
            }
            tokio::select! {
                _ = self.inner.stop.cancelled() => return Err(Error::ServiceShutdown),
                _ = tokio::time::sleep(ENQUEUE_BACKOFF) => (),
            }
        }
    }

    async fn await_reply<T>(
        &self,
        reply: tokio::sync::oneshot::Receiver<Result<T, Error>>,
    ) -> Result<T, Error> {
        tokio::select! {
            biased;
            outcome = reply => outcome.unwrap_or(Err(Error::ServiceShutdown)),
            _ = self.inner.stop.cancelled() => Err(Error::ServiceShutdown),
            _ = tokio::time::sleep(self.inner.config.execution_timeout) => Err(Error::ExecutionTimeout),
        }
    }
}

async fn worker_loop(inner: Arc<Inner>, id: usize) {
    tracing::debug!(worker = id, "worker started");
    loop {
        tokio::select! {
            _ = inner.stop.cancelled() => {
                tracing::debug!(worker = id, "worker received stop signal");
                return;
            }
            job = inner.queue.recv() => {
                let Some(job) = job else { return };
                handle_job(&inner, job).await;
            }
        }
    }
}

/// Dispatch one job, converting a panic into an `Internal` reply so the
/// worker survives.
async fn handle_job(inner: &Arc<Inner>, job: Job) {
    match job {
        Job::Search(SearchJob {
            id,
            params,
            reply,
            created_at,
        }) => {
            let queued_for = (chrono::Utc::now() - created_at).num_milliseconds();
            tracing::debug!(job = %id, queued_for_ms = queued_for, "processing search job");
            let outcome = AssertUnwindSafe(inner.process_search(&params))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    tracing::error!(job = %id, "search job panicked");
                    Err(Error::Internal(panic_message(panic)))
                });
            let _ = reply.send(outcome);
        }
        Job::Details(DetailsJob {
            id,
            source,
            vacancy_id,
            reply,
            created_at,
        }) => {
            let queued_for = (chrono::Utc::now() - created_at).num_milliseconds();
            tracing::debug!(job = %id, queued_for_ms = queued_for, "processing details job");
            let outcome = AssertUnwindSafe(inner.process_details(&source, &vacancy_id))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    tracing::error!(job = %id, "details job panicked");
                    Err(Error::Internal(panic_message(panic)))
                });
            let _ = reply.send(outcome);
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

impl Inner {
    /// Hold a global semaphore slot for the duration of `op`.
    pub(crate) async fn with_slot<T, F, Fut>(&self, op: F) -> Result<T, Error>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, Error>>,
    {
        let acquired =
            tokio::time::timeout(self.config.semaphore_wait, self.semaphore.acquire()).await;
        let _permit = match acquired {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(Error::ServiceShutdown),
            Err(_) => {
                tracing::warn!("no global semaphore slot within the wait budget");
                return Err(Error::Overloaded);
            }
        };
        op().await
    }
}
