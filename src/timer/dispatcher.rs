//! Single-active-timer dispatch loop.
//!
//! One background task owns the loop. It always waits on the single
//! nearest-expiring record: fetch `nearest()`, sleep until due, fire,
//! repeat. Inserts and skips on caller tasks never touch the loop's state
//! directly; they set a wake signal and the loop re-derives truth from the
//! store. A lost wake only delays a firing, it never loses or duplicates
//! one.
//!
//! Firing order matters: the schedule shift is persisted BEFORE the event
//! is emitted. A crash between the two steps loses at most one
//! notification; it can never deliver one twice.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::gateway::{HandlerRegistry, SendError};

use super::error::{Result, TimerError};
use super::fire_log::{FireLog, FireLogEntry};
use super::record::{TimerDraft, TimerId, TimerPayload, TimerRecord};
use super::store::TimerStore;

/// Configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Lookahead window when polling for the nearest record. Records
    /// further out stay in the store until the loop's next idle poll.
    pub horizon: Duration,
    /// Pause before restarting the loop after a connectivity-class failure.
    pub restart_delay: StdDuration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            horizon: Duration::days(40),
            restart_delay: StdDuration::from_secs(5),
        }
    }
}

/// The record the loop is currently sleeping on.
///
/// Purely advisory: the loop re-validates against the store's nearest
/// record before trusting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Awaited {
    pub id: TimerId,
    pub expires: DateTime<Utc>,
}

/// Outcome of a shift-and-reinsert.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReport {
    /// Schedule advanced; the record was reinserted with the same id.
    Skipped(TimerRecord),
    /// No instants remained; the record is gone.
    Exhausted(TimerId),
    /// No such record.
    NotFound(TimerId),
}

/// Handle to the dispatch loop, shared with caller tasks.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

struct Shared {
    store: TimerStore,
    registry: HandlerRegistry,
    fire_log: FireLog,
    config: DispatcherConfig,
    /// Wake signal; one permit is buffered, so a wake raced against a loop
    /// restart is never lost.
    wake: Notify,
    /// Advisory cache of what the loop is waiting on.
    current: RwLock<Option<Awaited>>,
}

impl Dispatcher {
    /// Create a dispatcher over a store and handler registry.
    pub fn new(store: TimerStore, registry: HandlerRegistry, config: DispatcherConfig) -> Self {
        let fire_log = FireLog::new(store.path().join("fires"));
        Self {
            shared: Arc::new(Shared {
                store,
                registry,
                fire_log,
                config,
                wake: Notify::new(),
                current: RwLock::new(None),
            }),
        }
    }

    /// Spawn the background dispatch task.
    ///
    /// The task runs until aborted; connectivity-class failures inside the
    /// loop are logged and the loop restarts from idle.
    pub fn spawn(&self) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.supervise().await })
    }

    /// The store backing this dispatcher.
    pub fn store(&self) -> &TimerStore {
        &self.shared.store
    }

    /// The firing log backing this dispatcher.
    pub fn fire_log(&self) -> &FireLog {
        &self.shared.fire_log
    }

    /// The record the loop is currently waiting on, if any.
    pub async fn current(&self) -> Option<Awaited> {
        *self.shared.current.read().await
    }

    /// Persist a new record and wake the loop if it changes what is nearest.
    pub async fn create(&self, draft: TimerDraft) -> Result<TimerRecord> {
        let record = self.shared.store.create(draft).await?;
        self.wake_for(&record).await;
        Ok(record)
    }

    /// Shift-and-reinsert: advance a record's schedule by `times` firings.
    ///
    /// Always delete-then-maybe-reinsert, never update-in-place, so the id
    /// survives the shift at row level. `times == 0` cancels the whole
    /// schedule; that requires the `delete` flag. The `delete` flag also
    /// marks external mutations: only those wake the loop when they touch
    /// the awaited record (the firing path advances the loop by itself).
    pub async fn skip(&self, id: TimerId, times: u32, delete: bool) -> Result<SkipReport> {
        if !delete && times < 1 {
            return Err(TimerError::InvalidSkip(times));
        }

        let Some(old) = self.shared.store.delete(id).await? else {
            return Ok(SkipReport::NotFound(id));
        };

        let report = match old.shifted(times) {
            Some(next) => {
                self.shared.store.reinsert(next.clone()).await?;
                debug!(timer_id = %id, times = times, expires = %next.expires, "Timer skipped");
                SkipReport::Skipped(next)
            }
            None => {
                debug!(timer_id = %id, "Timer exhausted");
                SkipReport::Exhausted(id)
            }
        };

        if delete {
            if matches!(report, SkipReport::Exhausted(_)) {
                let _ = self.shared.fire_log.delete(id).await;
            }
            if self.awaiting(id).await {
                self.shared.wake.notify_one();
            }
        }

        Ok(report)
    }

    /// Cascade-delete every record targeting a destination.
    pub async fn delete_destination(&self, channel_id: u64) -> Result<Vec<TimerRecord>> {
        let removed = self
            .shared
            .store
            .delete_where(|p: &TimerPayload| p.channel_id == channel_id)
            .await?;

        if !removed.is_empty() {
            info!(channel_id = channel_id, removed = removed.len(), "Cascade-deleted timers");
        }

        let mut wake = false;
        for record in &removed {
            let _ = self.shared.fire_log.delete(record.id).await;
            if self.awaiting(record.id).await {
                wake = true;
            }
        }
        if wake {
            self.shared.wake.notify_one();
        }

        Ok(removed)
    }

    async fn awaiting(&self, id: TimerId) -> bool {
        matches!(*self.shared.current.read().await, Some(cur) if cur.id == id)
    }

    async fn wake_for(&self, record: &TimerRecord) {
        if record.expires - Utc::now() > self.shared.config.horizon {
            return;
        }
        // `current` can lag the store between a fire and the loop's next
        // turn, so it cannot gate this wake. A spurious wake costs one
        // extra loop turn; `Notify` buffers the permit if none is pending.
        self.shared.wake.notify_one();
    }

    async fn set_current(&self, awaited: Option<Awaited>) {
        *self.shared.current.write().await = awaited;
    }

    /// Restart-on-failure supervisor around the dispatch loop.
    async fn supervise(&self) {
        info!("Timer dispatch loop started");
        loop {
            if let Err(e) = self.dispatch_loop().await {
                warn!(error = %e, "Dispatch loop failed, restarting from idle");
                self.set_current(None).await;
                tokio::time::sleep(self.shared.config.restart_delay).await;
            }
        }
    }

    /// The dispatch loop proper. Returns only on connectivity-class errors.
    async fn dispatch_loop(&self) -> Result<()> {
        let horizon = self.shared.config.horizon;
        loop {
            // Idle until a record lies within the horizon.
            let Some(timer) = self.shared.store.nearest(horizon).await else {
                self.set_current(None).await;
                self.shared.wake.notified().await;
                continue;
            };

            self.set_current(Some(Awaited {
                id: timer.id,
                expires: timer.expires,
            }))
            .await;

            let now = Utc::now();
            if timer.expires > now {
                let delay = (timer.expires - now).to_std().unwrap_or(StdDuration::ZERO);
                debug!(timer_id = %timer.id, expires = %timer.expires, delay_secs = delay.as_secs(), "Waiting");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.shared.wake.notified() => {
                        // Something nearer appeared or the awaited record
                        // went away; re-derive from the store.
                        continue;
                    }
                }

                // The sleep elapsed, but the awaited record may have been
                // skipped or displaced while no wake was pending.
                match self.shared.store.nearest(horizon).await {
                    Some(t) if t.id == timer.id && t.expires == timer.expires => {
                        self.fire(t).await?;
                    }
                    _ => continue,
                }
            } else {
                self.fire(timer).await?;
            }
        }
    }

    /// Fire a due record: persist the schedule shift, then emit the event
    /// with the pre-shift record.
    async fn fire(&self, timer: TimerRecord) -> Result<()> {
        let report = self.skip(timer.id, 1, false).await?;

        let remaining = match &report {
            SkipReport::Skipped(next) => next.shots(),
            _ => 0,
        };
        info!(
            timer_id = %timer.id,
            event = %timer.event,
            scheduled = %timer.expires,
            remaining = remaining,
            "Timer fired"
        );

        self.shared
            .registry
            .emit(&timer)
            .await
            .map_err(|e| match e {
                SendError::Unreachable(s) | SendError::Rejected(s) => TimerError::Unreachable(s),
            })?;

        if matches!(report, SkipReport::Skipped(_)) {
            let entry = FireLogEntry {
                ts: Utc::now().timestamp_millis(),
                scheduled: timer.expires.timestamp_millis(),
                remaining,
            };
            if let Err(e) = self.shared.fire_log.append(timer.id, &entry).await {
                warn!(timer_id = %timer.id, error = %e, "Failed to append firing log");
            }
        } else {
            // The record is gone, so its history is unreachable too.
            let _ = self.shared.fire_log.delete(timer.id).await;
        }

        Ok(())
    }
}
