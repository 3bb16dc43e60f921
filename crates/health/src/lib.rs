use anyhow::Context;
use chrono::{DateTime, Utc};
use models::SourceStatus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A source whose last check is older than this is no longer considered
/// healthy, regardless of its last observed outcome.
const HEALTHY_WINDOW_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cadence of the background probe cycle.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Budget for one probe request.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(5),
        }
    }
}

/// HealthManager tracks one `SourceStatus` per adapter.
///
/// Two feeds update the table: a background task probing each adapter's
/// health endpoint on an interval, and the aggregation manager reporting the
/// outcome of real traffic through `update_status`. Probe work happens
/// outside the lock; outcomes are applied in one short write pass.
pub struct HealthManager {
    inner: Arc<Inner>,
    prober: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

struct Inner {
    statuses: RwLock<HashMap<String, SourceStatus>>,
    http: reqwest::Client,
    probe_timeout: Duration,
    stop: CancellationToken,
    init_tx: tokio::sync::watch::Sender<bool>,
}

struct ProbeOutcome {
    name: String,
    error: Option<String>,
    response_time: Duration,
}

impl HealthManager {
    /// Seed the table with one unobserved entry per `(name, health_endpoint)`
    /// pair and start the probe loop. The first probe cycle runs immediately.
    pub fn new(config: Config, endpoints: Vec<(String, String)>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("building health probe http client")?;

        let statuses = endpoints
            .iter()
            .map(|(name, endpoint)| (name.clone(), SourceStatus::unobserved(name, endpoint)))
            .collect();

        let (init_tx, _) = tokio::sync::watch::channel(false);
        let inner = Arc::new(Inner {
            statuses: RwLock::new(statuses),
            http,
            probe_timeout: config.timeout,
            stop: CancellationToken::new(),
            init_tx,
        });

        let prober = tokio::spawn(probe_loop(inner.clone(), config.interval));

        Ok(Self {
            inner,
            prober: Mutex::new(Some(prober)),
        })
    }

    /// Record the outcome of a real adapter call. A success zeroes the error
    /// streak and marks the source healthy; a failure does the opposite.
    pub fn update_status(&self, name: &str, success: bool, error: Option<String>) {
        let mut statuses = self.inner.statuses.write().unwrap();
        let status = statuses
            .entry(name.to_string())
            .or_insert_with(|| SourceStatus::unobserved(name, ""));

        apply_observation(status, success, error, None);
    }

    /// Mirror an adapter's circuit breaker state into its status row.
    pub fn record_circuit_state(&self, name: &str, state: &str) {
        let mut statuses = self.inner.statuses.write().unwrap();
        if let Some(status) = statuses.get_mut(name) {
            status.circuit_state = state.to_string();
        }
    }

    /// Names whose latest observation is a success no older than five
    /// minutes.
    pub fn healthy_sources(&self) -> Vec<String> {
        let now = Utc::now();
        let statuses = self.inner.statuses.read().unwrap();
        let mut healthy: Vec<String> = statuses
            .values()
            .filter(|status| healthy_at(status, now))
            .map(|status| status.name.clone())
            .collect();
        healthy.sort();
        healthy
    }

    pub fn status(&self, name: &str) -> Option<SourceStatus> {
        self.inner.statuses.read().unwrap().get(name).cloned()
    }

    pub fn all_statuses(&self) -> Vec<SourceStatus> {
        let statuses = self.inner.statuses.read().unwrap();
        let mut all: Vec<SourceStatus> = statuses.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Resolves once the first probe cycle has completed.
    pub async fn wait_initialized(&self) {
        let mut init = self.inner.init_tx.subscribe();
        while !*init.borrow_and_update() {
            if init.changed().await.is_err() {
                return;
            }
        }
    }

    /// Stop the probe loop and wait for it to exit. Idempotent.
    pub async fn stop(&self) {
        self.inner.stop.cancel();
        let prober = self.prober.lock().unwrap().take();
        if let Some(prober) = prober {
            let _ = prober.await;
        }
    }
}

fn healthy_at(status: &SourceStatus, now: DateTime<Utc>) -> bool {
    status.is_healthy && now - status.last_check < chrono::Duration::seconds(HEALTHY_WINDOW_SECS)
}

fn apply_observation(
    status: &mut SourceStatus,
    success: bool,
    error: Option<String>,
    response_time: Option<Duration>,
) {
    let now = Utc::now();
    status.last_check = now;
    status.initialized = true;
    if let Some(response_time) = response_time {
        status.response_time = Some(response_time);
    }

    if success {
        status.success_count += 1;
        status.error_count = 0;
        status.is_healthy = true;
        status.last_error = None;
        status.last_success = Some(now);
    } else {
        status.error_count += 1;
        status.success_count = 0;
        status.is_healthy = false;
        status.last_error = error;
    }
}

async fn probe_loop(inner: Arc<Inner>, interval: Duration) {
    probe_cycle(&inner).await;
    let _ = inner.init_tx.send(true);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await; // the immediate tick; the first cycle already ran

    loop {
        tokio::select! {
            _ = inner.stop.cancelled() => return,
            _ = ticker.tick() => probe_cycle(&inner).await,
        }
    }
}

async fn probe_cycle(inner: &Arc<Inner>) {
    let targets: Vec<(String, String)> = {
        let statuses = inner.statuses.read().unwrap();
        statuses
            .values()
            .map(|status| (status.name.clone(), status.health_endpoint.clone()))
            .collect()
    };

    let probes = targets
        .into_iter()
        .map(|(name, endpoint)| probe_one(inner, name, endpoint));
    let outcomes = futures::future::join_all(probes).await;

    let mut statuses = inner.statuses.write().unwrap();
    for outcome in outcomes {
        if let Some(status) = statuses.get_mut(&outcome.name) {
            let success = outcome.error.is_none();
            if !success {
                tracing::warn!(
                    source = %outcome.name,
                    error = outcome.error.as_deref().unwrap_or(""),
                    "health probe failed"
                );
            }
            apply_observation(status, success, outcome.error, Some(outcome.response_time));
        }
    }
}

async fn probe_one(inner: &Inner, name: String, endpoint: String) -> ProbeOutcome {
    let started = tokio::time::Instant::now();

    let error = if endpoint.is_empty() {
        Some("no health endpoint configured".to_string())
    } else {
        let request = inner.http.get(&endpoint).timeout(inner.probe_timeout);
        match request.send().await {
            Ok(response) if response.status().is_success() => None,
            Ok(response) => Some(format!("probe returned status {}", response.status())),
            Err(err) => Some(err.to_string()),
        }
    };

    ProbeOutcome {
        name,
        error,
        response_time: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> HealthManager {
        HealthManager::new(
            Config {
                interval: Duration::from_secs(3600),
                timeout: Duration::from_secs(1),
            },
            vec![
                ("hh".to_string(), String::new()),
                ("superjob".to_string(), String::new()),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn starts_unhealthy_and_uninitialized() {
        let manager = manager();

        let status = manager.status("hh").unwrap();
        assert!(!status.is_healthy);
        assert_eq!(status.circuit_state, "closed");

        manager.stop().await;
    }

    #[tokio::test]
    async fn traffic_updates_flip_health() {
        let manager = manager();

        manager.update_status("hh", true, None);
        manager.update_status("hh", true, None);
        manager.update_status("superjob", false, Some("boom".to_string()));

        let hh = manager.status("hh").unwrap();
        assert!(hh.is_healthy && hh.initialized);
        assert_eq!(hh.success_count, 2);
        assert_eq!(hh.error_count, 0);
        assert!(hh.last_success.is_some());

        let sj = manager.status("superjob").unwrap();
        assert!(!sj.is_healthy);
        assert_eq!(sj.last_error.as_deref(), Some("boom"));

        assert_eq!(manager.healthy_sources(), vec!["hh".to_string()]);

        // Counters are mutually resetting.
        manager.update_status("hh", false, Some("late failure".to_string()));
        let hh = manager.status("hh").unwrap();
        assert_eq!(hh.success_count, 0);
        assert_eq!(hh.error_count, 1);

        manager.stop().await;
    }

    #[tokio::test]
    async fn circuit_state_is_mirrored() {
        let manager = manager();

        manager.record_circuit_state("hh", "open");
        assert_eq!(manager.status("hh").unwrap().circuit_state, "open");
        // Unknown names are ignored rather than invented.
        manager.record_circuit_state("linkedin", "open");
        assert!(manager.status("linkedin").is_none());

        manager.stop().await;
    }

    #[test]
    fn freshness_window_bounds_health() {
        let mut status = SourceStatus::unobserved("hh", "");
        apply_observation(&mut status, true, None, None);

        let now = Utc::now();
        assert!(healthy_at(&status, now));
        assert!(healthy_at(&status, now + chrono::Duration::minutes(4)));
        assert!(!healthy_at(&status, now + chrono::Duration::minutes(6)));
    }

    #[tokio::test]
    async fn init_signal_fires_after_first_cycle() {
        let manager = manager();
        manager.wait_initialized().await;
        manager.stop().await;
    }
}
