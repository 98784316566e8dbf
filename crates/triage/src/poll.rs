//! The classification polling loop
//!
//! One background worker thread runs cycles forever: validate the
//! credential, list unread inbox messages, and for each one sequentially
//! fetch, extract, classify, and relabel. Per-message processing is
//! strictly sequential to keep the remote call pattern simple and avoid
//! rate-limit bursts.
//!
//! The loop owns no hidden global state: everything it needs (gateway,
//! classifier, interval) is handed to it once at startup. A stop flag is
//! checked between messages and during the sleep, so the worker exits
//! promptly when asked even mid-cycle.

use log::{error, info, warn};
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::classify::Classifier;
use crate::gateway::{MailGateway, RemoteServiceError};
use crate::models::Verdict;

/// Coarse status of the filter loop, readable from outside the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStatus {
    /// The loop has not been started
    NotStarted,
    /// The loop is polling (including through transient failures)
    Running,
    /// The credential is broken and repeated attempts to use it failed;
    /// the loop keeps retrying with backoff
    AuthFailed,
}

impl std::fmt::Display for FilterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotStarted => "Not started",
            Self::Running => "Running",
            Self::AuthFailed => "Auth failed",
        };
        f.write_str(s)
    }
}

/// Statistics from one polling cycle
#[derive(Debug, Default, Clone)]
pub struct CycleStats {
    /// Unread messages returned by the listing
    pub listed: usize,
    /// Messages classified as spam
    pub spam: usize,
    /// Messages classified as ham
    pub ham: usize,
    /// Label mutations pushed to the server
    pub relabeled: usize,
    /// Per-message failures (fetch or relabel)
    pub errors: usize,
    /// Duration of the cycle's work, excluding the sleep
    pub duration_ms: u64,
}

/// Consecutive credential failures before the status flips to AuthFailed
const AUTH_FAILURE_THRESHOLD: u32 = 3;

/// Cap on the credential-failure backoff
const MAX_AUTH_BACKOFF: Duration = Duration::from_secs(900);

/// Granularity of the interruptible sleep
const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// Run a single polling cycle.
///
/// Per-message failures are logged and counted but never abort the cycle;
/// a listing failure does, since there is nothing to iterate. The stop flag
/// is honored between messages so cancellation never waits on a full batch.
pub fn run_cycle(
    gateway: &dyn MailGateway,
    classifier: &Classifier,
    stop: &AtomicBool,
) -> Result<CycleStats, RemoteServiceError> {
    let start = Instant::now();
    let mut stats = CycleStats::default();

    let refs = gateway.list_unread()?;
    stats.listed = refs.len();

    for msg_ref in &refs {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        let outcome = gateway
            .fetch_content(msg_ref)
            .and_then(|content| {
                let verdict = classifier.classify(content.text());
                gateway.apply_verdict(msg_ref, verdict).map(|()| verdict)
            });

        match outcome {
            Ok(Verdict::Spam) => {
                stats.spam += 1;
                stats.relabeled += 1;
                info!("Message {} classified as spam; relabeled", msg_ref.id);
            }
            Ok(Verdict::Ham) => {
                stats.ham += 1;
            }
            Err(e) => {
                stats.errors += 1;
                warn!("Skipping message {}: {}", msg_ref.id, e);
            }
        }
    }

    stats.duration_ms = start.elapsed().as_millis() as u64;
    Ok(stats)
}

/// The polling loop, ready to be started.
///
/// `start` consumes the loop, so a second concurrent start of the same
/// loop is unrepresentable.
pub struct FilterLoop {
    gateway: Arc<dyn MailGateway>,
    classifier: Arc<Classifier>,
    interval: Duration,
}

impl FilterLoop {
    /// Create a polling loop over the given gateway and classifier
    pub fn new(
        gateway: Arc<dyn MailGateway>,
        classifier: Arc<Classifier>,
        interval: Duration,
    ) -> Self {
        Self {
            gateway,
            classifier,
            interval,
        }
    }

    /// Start the loop on a background worker thread
    pub fn start(self) -> FilterHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let status = Arc::new(RwLock::new(FilterStatus::Running));

        let worker = {
            let stop = Arc::clone(&stop);
            let status = Arc::clone(&status);
            std::thread::spawn(move || self.run(&stop, &status))
        };

        FilterHandle {
            stop,
            status,
            worker,
        }
    }

    fn run(self, stop: &AtomicBool, status: &RwLock<FilterStatus>) {
        info!(
            "Polling loop started; interval {}s",
            self.interval.as_secs()
        );
        let mut auth_failures: u32 = 0;

        while !stop.load(Ordering::Relaxed) {
            match run_cycle(self.gateway.as_ref(), &self.classifier, stop) {
                Ok(stats) => {
                    auth_failures = 0;
                    set_status(status, FilterStatus::Running);
                    info!(
                        "Cycle done: {} unread, {} spam, {} ham, {} errors in {}ms",
                        stats.listed, stats.spam, stats.ham, stats.errors, stats.duration_ms
                    );
                    sleep_interruptibly(stop, self.interval);
                }
                Err(e) if e.is_auth() => {
                    auth_failures += 1;
                    if auth_failures >= AUTH_FAILURE_THRESHOLD {
                        set_status(status, FilterStatus::AuthFailed);
                    }
                    let backoff = auth_backoff(self.interval, auth_failures);
                    error!(
                        "Cycle aborted, credential failure #{}: {}; backing off {}s",
                        auth_failures,
                        e,
                        backoff.as_secs()
                    );
                    sleep_interruptibly(stop, backoff);
                }
                Err(e) => {
                    error!("Cycle aborted: {}; waiting for next interval", e);
                    sleep_interruptibly(stop, self.interval);
                }
            }
        }

        info!("Polling loop stopped");
    }
}

/// Handle to a running filter loop
pub struct FilterHandle {
    stop: Arc<AtomicBool>,
    status: Arc<RwLock<FilterStatus>>,
    worker: JoinHandle<()>,
}

impl FilterHandle {
    /// Current status readout
    pub fn status(&self) -> FilterStatus {
        *self.status.read().unwrap()
    }

    /// Ask the worker to stop and wait for it to finish
    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.worker.join();
    }

    /// Block until the worker exits (normally: never)
    pub fn join(self) {
        let _ = self.worker.join();
    }
}

fn set_status(status: &RwLock<FilterStatus>, value: FilterStatus) {
    *status.write().unwrap() = value;
}

/// Doubling backoff for credential failures, capped
fn auth_backoff(interval: Duration, failures: u32) -> Duration {
    let factor = 2u32.saturating_pow(failures.saturating_sub(1).min(16));
    (interval * factor).min(MAX_AUTH_BACKOFF)
}

/// Sleep in small slices so a raised stop flag cuts the wait short
fn sleep_interruptibly(stop: &AtomicBool, duration: Duration) {
    let mut remaining = duration;
    while !stop.load(Ordering::Relaxed) && remaining > Duration::ZERO {
        let step = remaining.min(SLEEP_SLICE);
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_backoff_doubles_and_caps() {
        let interval = Duration::from_secs(60);
        assert_eq!(auth_backoff(interval, 1), Duration::from_secs(60));
        assert_eq!(auth_backoff(interval, 2), Duration::from_secs(120));
        assert_eq!(auth_backoff(interval, 3), Duration::from_secs(240));
        assert_eq!(auth_backoff(interval, 10), MAX_AUTH_BACKOFF);
    }

    #[test]
    fn test_sleep_interruptibly_returns_early() {
        let stop = AtomicBool::new(true);
        let start = Instant::now();
        sleep_interruptibly(&stop, Duration::from_secs(60));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(FilterStatus::NotStarted.to_string(), "Not started");
        assert_eq!(FilterStatus::Running.to_string(), "Running");
        assert_eq!(FilterStatus::AuthFailed.to_string(), "Auth failed");
    }
}
