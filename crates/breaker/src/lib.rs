use std::future::Future;
use std::sync::RwLock;
use std::time::Duration;
use tokio::time::Instant;

/// Classify lets the breaker distinguish errors that indicate an unhealthy
/// upstream from errors that reflect the caller (for example an HTTP 4xx).
/// Only the former move the state machine.
pub trait Classify {
    fn counts_as_failure(&self) -> bool;
}

/// Circuit state. Closed admits everything; Open rejects everything until
/// `reset_timeout` has elapsed; HalfOpen admits a bounded number of trial
/// requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half-open",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Consecutive failures in Closed before tripping to Open.
    pub failure_threshold: u32,
    /// Consecutive successes in HalfOpen before returning to Closed.
    pub success_threshold: u32,
    /// Trial requests admitted while HalfOpen.
    pub half_open_max_requests: u32,
    /// How long Open rejects before the first trial request.
    #[serde(with = "humantime_serde")]
    pub reset_timeout: Duration,
    /// Reserved for a rolling failure window; accepted but not yet applied.
    #[serde(with = "humantime_serde")]
    pub window_duration: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            half_open_max_requests: 2,
            reset_timeout: Duration::from_secs(10),
            window_duration: Duration::from_secs(10),
        }
    }
}

/// Errors produced by the breaker itself, or forwarded from the operation.
#[derive(Debug, thiserror::Error)]
pub enum Error<E: std::error::Error> {
    #[error("circuit breaker is open")]
    Open,
    #[error("too many requests in half-open state")]
    TooManyRequests,
    #[error(transparent)]
    Inner(E),
}

/// Cumulative request counters, independent of state transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Stats {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
}

/// Three-state circuit breaker. `execute` is the sole mutation entry point;
/// the internal lock is never held across the awaited operation.
pub struct Breaker {
    config: Config,
    gate: RwLock<Gate>,
}

#[derive(Debug)]
struct Gate {
    state: State,
    failures: u32,
    successes: u32,
    half_open_attempts: u32,
    last_failure: Option<Instant>,
    stats: Stats,
}

impl Breaker {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            gate: RwLock::new(Gate {
                state: State::Closed,
                failures: 0,
                successes: 0,
                half_open_attempts: 0,
                last_failure: None,
                stats: Stats::default(),
            }),
        }
    }

    /// Run `op` if the current state admits it.
    ///
    /// In Open, rejects with `Error::Open` until `reset_timeout` has elapsed
    /// since the last failure, then transitions to HalfOpen and admits the
    /// call. In HalfOpen, admits up to `half_open_max_requests` trials and
    /// rejects the rest with `Error::TooManyRequests`.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, Error<E>>
    where
        E: Classify + std::error::Error,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let mut gate = self.gate.write().unwrap();

            match gate.state {
                State::Open => {
                    let waited_out = gate
                        .last_failure
                        .map(|at| at.elapsed() >= self.config.reset_timeout)
                        .unwrap_or(true);
                    if !waited_out {
                        return Err(Error::Open);
                    }
                    gate.state = State::HalfOpen;
                    gate.half_open_attempts = 0;
                    gate.successes = 0;
                }
                State::HalfOpen => {
                    if gate.half_open_attempts >= self.config.half_open_max_requests {
                        return Err(Error::TooManyRequests);
                    }
                    gate.half_open_attempts += 1;
                }
                State::Closed => (),
            }
            gate.stats.requests += 1;
        }

        let result = op().await;

        let mut gate = self.gate.write().unwrap();
        match result {
            Ok(value) => {
                gate.stats.successes += 1;
                gate.on_success(&self.config);
                Ok(value)
            }
            Err(err) => {
                gate.stats.failures += 1;
                if err.counts_as_failure() {
                    gate.on_failure(&self.config);
                }
                Err(Error::Inner(err))
            }
        }
    }

    pub fn state(&self) -> State {
        self.gate.read().unwrap().state
    }

    pub fn stats(&self) -> Stats {
        self.gate.read().unwrap().stats
    }
}

impl Gate {
    fn on_success(&mut self, config: &Config) {
        match self.state {
            State::Closed => self.failures = 0,
            State::HalfOpen => {
                self.successes += 1;
                if self.successes >= config.success_threshold {
                    self.state = State::Closed;
                    self.failures = 0;
                    self.successes = 0;
                    self.half_open_attempts = 0;
                }
            }
            State::Open => (),
        }
    }

    fn on_failure(&mut self, config: &Config) {
        match self.state {
            State::Closed => {
                self.failures += 1;
                if self.failures >= config.failure_threshold {
                    self.state = State::Open;
                    self.last_failure = Some(Instant::now());
                }
            }
            State::HalfOpen => {
                self.state = State::Open;
                self.last_failure = Some(Instant::now());
                self.half_open_attempts = 0;
            }
            State::Open => (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Breaker, Classify, Config, Error, State};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("upstream exploded")]
        Upstream,
        #[error("bad request")]
        BadRequest,
    }

    impl Classify for TestError {
        fn counts_as_failure(&self) -> bool {
            matches!(self, TestError::Upstream)
        }
    }

    fn config() -> Config {
        Config {
            failure_threshold: 3,
            success_threshold: 2,
            half_open_max_requests: 2,
            reset_timeout: Duration::from_secs(10),
            ..Config::default()
        }
    }

    async fn fail(breaker: &Breaker) {
        let result: Result<(), _> = breaker.execute(|| async move { Err(TestError::Upstream) }).await;
        assert!(matches!(result, Err(Error::Inner(TestError::Upstream))));
    }

    async fn succeed(breaker: &Breaker) {
        breaker
            .execute(|| async move { Ok::<_, TestError>(()) })
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn trips_open_after_consecutive_failures() {
        let breaker = Breaker::new(config());
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            fail(&breaker).await;
        }
        assert_eq!(breaker.state(), State::Open);

        // Within reset_timeout the operation must not be invoked.
        let calls_ref = &calls;
        let rejected: Result<(), _> = breaker
            .execute(|| async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(())
            })
            .await;
        assert!(matches!(rejected, Err(Error::Open)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_the_failure_streak() {
        let breaker = Breaker::new(config());

        fail(&breaker).await;
        fail(&breaker).await;
        succeed(&breaker).await;
        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), State::Closed);

        fail(&breaker).await;
        assert_eq!(breaker.state(), State::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_through_half_open() {
        let breaker = Breaker::new(config());

        for _ in 0..3 {
            fail(&breaker).await;
        }
        assert_eq!(breaker.state(), State::Open);

        tokio::time::advance(Duration::from_secs(11)).await;

        // First admitted call performs the Open -> HalfOpen transition.
        succeed(&breaker).await;
        assert_eq!(breaker.state(), State::HalfOpen);
        succeed(&breaker).await;
        assert_eq!(breaker.state(), State::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens() {
        let breaker = Breaker::new(config());

        for _ in 0..3 {
            fail(&breaker).await;
        }
        tokio::time::advance(Duration::from_secs(11)).await;

        fail(&breaker).await;
        assert_eq!(breaker.state(), State::Open);

        let rejected: Result<(), _> = breaker.execute(|| async move { Ok::<_, TestError>(()) }).await;
        assert!(matches!(rejected, Err(Error::Open)));
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_bounds_trial_requests() {
        let breaker = Breaker::new(Config {
            success_threshold: 10,
            ..config()
        });

        for _ in 0..3 {
            fail(&breaker).await;
        }
        tokio::time::advance(Duration::from_secs(11)).await;

        succeed(&breaker).await; // transition call
        succeed(&breaker).await; // trial 1
        succeed(&breaker).await; // trial 2

        let rejected: Result<(), _> = breaker.execute(|| async move { Ok::<_, TestError>(()) }).await;
        assert!(matches!(rejected, Err(Error::TooManyRequests)));
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_do_not_move_the_state_machine() {
        let breaker = Breaker::new(config());

        for _ in 0..10 {
            let result: Result<(), _> =
                breaker.execute(|| async move { Err(TestError::BadRequest) }).await;
            assert!(matches!(result, Err(Error::Inner(TestError::BadRequest))));
        }
        assert_eq!(breaker.state(), State::Closed);
        assert_eq!(breaker.stats().failures, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_accumulate_across_transitions() {
        let breaker = Breaker::new(config());

        succeed(&breaker).await;
        for _ in 0..3 {
            fail(&breaker).await;
        }

        let stats = breaker.stats();
        assert_eq!(stats.requests, 4);
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.failures, 3);
    }
}
