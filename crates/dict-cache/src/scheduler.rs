//! Refresh scheduler: periodic and on-demand fetch-parse-swap cycles.
//!
//! ```text
//!            tick / manual                 ok: swap, failures = 0
//!   Idle ───────────────────> Refreshing ───────────────────────────> Idle
//!     ^                            │ err: failures += 1 (table kept)
//!     │ enable()                   v
//!   Suspended <──────────── failures >= suspend_threshold
//! ```
//!
//! At most one cycle runs at a time. A refresh trigger that finds a cycle
//! running is dropped, not queued; [`RefreshScheduler::load_now`] waits for
//! the running cycle instead, so its table is always the last one swapped
//! in. Background failures are absorbed here and never reach the caller;
//! only `load_now` propagates.

use crate::loader::DictLoader;
use crate::{parse_schema, CacheStore, DictError, ErrorKind, Result};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

#[derive(Debug, Clone, Copy)]
pub struct RefreshPolicy {
    pub interval: Duration,
    pub initial_delay: Duration,
    pub fetch_timeout: Duration,
    pub degraded_threshold: u32,
    pub suspend_threshold: u32,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
            initial_delay: Duration::from_secs(20),
            fetch_timeout: Duration::from_secs(60),
            degraded_threshold: 5,
            suspend_threshold: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPhase {
    Idle,
    Refreshing,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Tick,
    Manual,
}

impl RefreshTrigger {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Tick => "tick",
            Self::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another cycle holds the in-progress flag
    InFlight,
    /// Refresh is latched off until re-enabled
    Suspended,
    /// Timer tick before the first successful load
    Uninitialized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed {
        previous: usize,
        current: usize,
        duration_ms: u64,
    },
    Skipped(SkipReason),
    Failed {
        kind: ErrorKind,
        message: String,
        consecutive_failures: u32,
    },
}

/// Result of a successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub previous: usize,
    pub current: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshStatus {
    pub phase: RefreshPhase,
    pub enabled: bool,
    pub in_progress: bool,
    pub last_success_unix_ms: Option<u64>,
    pub last_duration_ms: Option<u64>,
    pub consecutive_failures: u32,
    pub degraded: bool,
    pub last_error_kind: Option<ErrorKind>,
    pub last_error: Option<String>,
    pub interval_ms: u64,
}

/// Scheduler-owned state. Only the scheduler's own methods mutate it.
struct RefreshState {
    in_progress: AtomicBool,
    enabled: AtomicBool,
    consecutive_failures: AtomicU32,
    // 0 = never
    last_success_unix_ms: AtomicU64,
    last_duration_ms: AtomicU64,
    last_error: Mutex<Option<(ErrorKind, String)>>,
}

impl RefreshState {
    fn new() -> Self {
        Self {
            in_progress: AtomicBool::new(false),
            enabled: AtomicBool::new(true),
            consecutive_failures: AtomicU32::new(0),
            last_success_unix_ms: AtomicU64::new(0),
            last_duration_ms: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    fn set_last_error(&self, value: Option<(ErrorKind, String)>) {
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = value;
        }
    }

    fn last_error(&self) -> Option<(ErrorKind, String)> {
        self.last_error.lock().ok().and_then(|guard| guard.clone())
    }
}

/// Clears the in-progress flag however the cycle ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    loader: Arc<dyn DictLoader>,
    store: Arc<CacheStore>,
    policy: RefreshPolicy,
    state: RefreshState,
    // Held for the whole fetch-parse-swap of every cycle
    cycle_gate: tokio::sync::Mutex<()>,
}

impl RefreshScheduler {
    pub fn new(loader: Arc<dyn DictLoader>, store: Arc<CacheStore>, policy: RefreshPolicy) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                loader,
                store,
                policy,
                state: RefreshState::new(),
                cycle_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.inner.policy
    }

    /// Run one cycle now and propagate failure. Used for the first load and
    /// for explicit source switches. A cycle already running is waited for,
    /// never overtaken.
    pub async fn load_now(&self) -> Result<LoadReport> {
        let _cycle = self.inner.cycle_gate.lock().await;
        let state = &self.inner.state;
        state.in_progress.store(true, Ordering::Release);
        let _guard = InFlightGuard(&state.in_progress);

        info!("Loading dictionary ({})", self.inner.loader.describe());
        match self.run_cycle().await {
            Ok(report) => {
                self.record_success(&report);
                Ok(report)
            }
            Err(err) => {
                error!("Dictionary load failed [{}]: {err}", err.kind());
                self.inner
                    .state
                    .set_last_error(Some((err.kind(), err.to_string())));
                Err(err)
            }
        }
    }

    /// Run one guarded cycle. Failures are absorbed into the outcome.
    pub async fn refresh(&self, trigger: RefreshTrigger) -> RefreshOutcome {
        let state = &self.inner.state;
        if !state.enabled.load(Ordering::Acquire) {
            debug!("Dictionary refresh suspended; {} trigger ignored", trigger.as_str());
            return RefreshOutcome::Skipped(SkipReason::Suspended);
        }
        if trigger == RefreshTrigger::Tick && !self.inner.store.is_initialized() {
            debug!("Dictionary not loaded yet; tick ignored");
            return RefreshOutcome::Skipped(SkipReason::Uninitialized);
        }
        let Ok(_cycle) = self.inner.cycle_gate.try_lock() else {
            debug!("Dictionary refresh in flight; {} trigger dropped", trigger.as_str());
            return RefreshOutcome::Skipped(SkipReason::InFlight);
        };
        state.in_progress.store(true, Ordering::Release);
        let _guard = InFlightGuard(&state.in_progress);

        info!("Refreshing dictionary ({})", trigger.as_str());
        match self.run_cycle().await {
            Ok(report) => {
                self.record_success(&report);
                RefreshOutcome::Refreshed {
                    previous: report.previous,
                    current: report.current,
                    duration_ms: report.duration_ms,
                }
            }
            Err(err) => {
                let consecutive_failures = self.record_failure(&err);
                RefreshOutcome::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                    consecutive_failures,
                }
            }
        }
    }

    /// Explicit operator re-enable: clears the failure count and the latch.
    pub fn enable(&self) {
        let state = &self.inner.state;
        state.consecutive_failures.store(0, Ordering::Release);
        state.enabled.store(true, Ordering::Release);
        info!("Dictionary refresh re-enabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.state.enabled.load(Ordering::Acquire)
    }

    pub fn status(&self) -> RefreshStatus {
        let state = &self.inner.state;
        let enabled = state.enabled.load(Ordering::Acquire);
        let in_progress = state.in_progress.load(Ordering::Acquire);
        let consecutive_failures = state.consecutive_failures.load(Ordering::Acquire);
        let phase = if !enabled {
            RefreshPhase::Suspended
        } else if in_progress {
            RefreshPhase::Refreshing
        } else {
            RefreshPhase::Idle
        };
        let last_error = state.last_error();
        RefreshStatus {
            phase,
            enabled,
            in_progress,
            last_success_unix_ms: non_zero(state.last_success_unix_ms.load(Ordering::Acquire)),
            last_duration_ms: non_zero(state.last_duration_ms.load(Ordering::Acquire)),
            consecutive_failures,
            degraded: consecutive_failures >= self.inner.policy.degraded_threshold,
            last_error_kind: last_error.as_ref().map(|(kind, _)| *kind),
            last_error: last_error.map(|(_, message)| message),
            interval_ms: u64::try_from(self.inner.policy.interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Start the periodic timer. Ticks that arrive while a cycle is running
    /// are skipped.
    pub fn spawn_timer(&self) -> RefreshTimer {
        let (command_tx, mut command_rx) = mpsc::channel(4);
        let scheduler = self.clone();
        let policy = self.inner.policy;

        let handle = tokio::spawn(async move {
            let start = time::Instant::now() + policy.initial_delay;
            let mut ticker = time::interval_at(start, policy.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(
                "Dictionary refresh timer started (interval {} ms)",
                policy.interval.as_millis()
            );

            loop {
                tokio::select! {
                    cmd = command_rx.recv() => match cmd {
                        Some(TimerCommand::Shutdown) | None => break,
                    },
                    _ = ticker.tick() => {
                        scheduler.refresh(RefreshTrigger::Tick).await;
                    }
                }
            }
            info!("Dictionary refresh timer stopped");
        });

        RefreshTimer {
            command_tx,
            handle: Some(handle),
        }
    }

    async fn run_cycle(&self) -> Result<LoadReport> {
        let started = Instant::now();
        let loader = Arc::clone(&self.inner.loader);
        let task = tokio::task::spawn_blocking(move || {
            let raw = loader.fetch_raw()?;
            parse_schema(&raw)
        });

        let table = match time::timeout(self.inner.policy.fetch_timeout, task).await {
            Err(_) => {
                return Err(DictError::Network(format!(
                    "dictionary fetch timed out after {} ms",
                    self.inner.policy.fetch_timeout.as_millis()
                )))
            }
            Ok(Err(join)) => {
                return Err(DictError::Io(std::io::Error::other(format!(
                    "dictionary fetch task failed: {join}"
                ))))
            }
            Ok(Ok(result)) => result?,
        };

        let current = table.len();
        let previous = self.inner.store.swap(table);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!("Dictionary refreshed in {duration_ms} ms, fields: {previous} -> {current}");
        Ok(LoadReport {
            previous,
            current,
            duration_ms,
        })
    }

    fn record_success(&self, report: &LoadReport) {
        let state = &self.inner.state;
        state.consecutive_failures.store(0, Ordering::Release);
        state
            .last_success_unix_ms
            .store(unix_ms(SystemTime::now()), Ordering::Release);
        state
            .last_duration_ms
            .store(report.duration_ms.max(1), Ordering::Release);
        state.set_last_error(None);
    }

    fn record_failure(&self, err: &DictError) -> u32 {
        let state = &self.inner.state;
        let policy = &self.inner.policy;
        let failures = state.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        state.set_last_error(Some((err.kind(), err.to_string())));
        error!(
            "Dictionary refresh failed [{}] (consecutive failures: {failures}): {err}",
            err.kind()
        );

        if failures >= policy.degraded_threshold {
            warn!(
                "Dictionary refresh degraded: {failures} consecutive failures, last [{}]; check the source connection",
                err.kind()
            );
        }
        if failures >= policy.suspend_threshold {
            error!(
                "Dictionary refresh suspended after {failures} consecutive failures; re-enable once the configuration is fixed"
            );
            state.enabled.store(false, Ordering::Release);
        }
        failures
    }
}

enum TimerCommand {
    Shutdown,
}

/// Handle to a running refresh timer. Dropping it stops the timer.
pub struct RefreshTimer {
    command_tx: mpsc::Sender<TimerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshTimer {
    /// Stop the timer and wait for an in-flight cycle to finish.
    pub async fn shutdown(mut self) {
        let _ = self.command_tx.send(TimerCommand::Shutdown).await;
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!("Refresh timer task ended abnormally: {err}");
            }
        }
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.command_tx.try_send(TimerCommand::Shutdown);
        }
    }
}

fn unix_ms(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn non_zero(value: u64) -> Option<u64> {
    (value != 0).then_some(value)
}
