use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Error returned by `wait` once the limiter has been stopped. Callers must
/// treat it as non-retryable upstream unavailability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rate limiter stopped")]
pub struct Stopped;

/// RateLimiter paces calls to one upstream: successive grants are separated
/// by at least `rate`.
///
/// A background task drips one token per `rate` into a capacity-1 buffer.
/// When nobody is waiting the buffer caps at a single token, so an idle
/// period never accumulates a burst debt.
pub struct RateLimiter {
    tokens: tokio::sync::Mutex<mpsc::Receiver<()>>,
    stop: CancellationToken,
    feeder: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl RateLimiter {
    /// Start a limiter granting one token per `rate`. The first token
    /// becomes available `rate` after construction. Must be called within a
    /// tokio runtime.
    pub fn new(rate: Duration) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let stop = CancellationToken::new();

        let feeder = tokio::spawn(feed(tx, rate, stop.clone()));

        Self {
            tokens: tokio::sync::Mutex::new(rx),
            stop,
            feeder: Mutex::new(Some(feeder)),
        }
    }

    /// Block until a token is available, or until the limiter stops.
    pub async fn wait(&self) -> Result<(), Stopped> {
        if self.stop.is_cancelled() {
            return Err(Stopped);
        }

        let mut tokens = self.tokens.lock().await;
        tokio::select! {
            _ = self.stop.cancelled() => Err(Stopped),
            token = tokens.recv() => token.map(|_| ()).ok_or(Stopped),
        }
    }

    /// Stop the limiter, waking every waiter with `Stopped`. Idempotent.
    pub async fn stop(&self) {
        self.stop.cancel();
        let feeder = self.feeder.lock().unwrap().take();
        if let Some(feeder) = feeder {
            let _ = feeder.await;
        }
    }
}

async fn feed(tx: mpsc::Sender<()>, rate: Duration, stop: CancellationToken) {
    let mut ticker = tokio::time::interval(rate);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // An interval's first tick completes immediately; swallow it so that the
    // first grant lands a full `rate` from now.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = ticker.tick() => {
                // Full buffer means the previous token was never claimed;
                // the tick is dropped rather than queued.
                let _ = tx.try_send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RateLimiter, Stopped};
    use futures::FutureExt;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn grants_are_paced() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(1)));
        let granted = Arc::new(AtomicU32::new(0));

        let consumer = {
            let limiter = limiter.clone();
            let granted = granted.clone();
            tokio::spawn(async move {
                while limiter.wait().await.is_ok() {
                    granted.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        let k = 5;
        for _ in 0..k {
            tokio::time::advance(Duration::from_secs(1)).await;
            tokio::task::yield_now().await;
        }

        // At most k + 1 grants in any window of k ticks; here, exactly k.
        assert_eq!(granted.load(Ordering::SeqCst), k);

        limiter.stop().await;
        consumer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn idle_ticks_do_not_accumulate() {
        let limiter = RateLimiter::new(Duration::from_secs(1));

        // Ten ticks pass with nobody waiting; the buffer caps at one token.
        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;

        assert_eq!(limiter.wait().now_or_never(), Some(Ok(())));
        assert_eq!(limiter.wait().now_or_never(), None);

        limiter.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_wakes_waiters() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(3600)));

        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.wait().await })
        };
        tokio::task::yield_now().await;

        limiter.stop().await;
        assert_eq!(waiter.await.unwrap(), Err(Stopped));

        // Post-stop waits fail fast, and stopping again is fine.
        assert_eq!(limiter.wait().await, Err(Stopped));
        limiter.stop().await;
    }
}
