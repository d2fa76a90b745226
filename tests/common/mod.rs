//! Common test utilities.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use chime::gateway::{HandlerRegistry, SendError, TimerHandler};
use chime::timer::{
    Dispatcher, DispatcherConfig, TimerDraft, TimerId, TimerPayload, TimerRecord, TimerStore,
};

/// Handler that records every firing it receives.
#[derive(Default)]
pub struct RecordingHandler {
    fired: Mutex<Vec<(TimerId, DateTime<Utc>)>>,
}

impl RecordingHandler {
    /// The (id, scheduled instant) pairs seen so far, in arrival order.
    pub fn fired(&self) -> Vec<(TimerId, DateTime<Utc>)> {
        self.fired.lock().unwrap().clone()
    }
}

#[async_trait]
impl TimerHandler for RecordingHandler {
    async fn on_fire(&self, timer: &TimerRecord) -> Result<(), SendError> {
        self.fired.lock().unwrap().push((timer.id, timer.expires));
        Ok(())
    }
}

/// Dispatcher over a fresh store, with a recording handler on "blast".
pub async fn test_dispatcher(tmp: &TempDir) -> (Dispatcher, Arc<RecordingHandler>) {
    let store = TimerStore::new(tmp.path().join("timers"));
    let handler = Arc::new(RecordingHandler::default());
    let registry = HandlerRegistry::new();
    registry.register("blast", handler.clone()).await;
    let dispatcher = Dispatcher::new(store, registry, DispatcherConfig::default());
    (dispatcher, handler)
}

/// One-or-more-shot draft with expiries at millisecond offsets from now.
pub fn draft_in_millis(offsets: &[i64]) -> TimerDraft {
    let base = Utc::now();
    let times = offsets
        .iter()
        .map(|ms| base + Duration::milliseconds(*ms))
        .collect();
    TimerDraft::new(
        "blast",
        times,
        base,
        TimerPayload {
            message: "ping".to_string(),
            channel_id: 1,
            author_id: 1,
            origin_message_id: 1,
        },
    )
    .unwrap()
}
