//! Timer record data structures.
//!
//! A timer record is the persisted unit of work: one firing instant
//! (`expires`) plus the ascending tail of a multi-shot schedule
//! (`remaining`), an event tag and an opaque payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a timer record.
///
/// Assigned by the store on first insert and preserved across reschedules
/// of a repeating timer.
pub type TimerId = u64;

/// Opaque payload carried through storage to the event handler.
///
/// The scheduler never inspects it beyond ownership and destination
/// predicates; it must round-trip exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerPayload {
    /// Message text to deliver.
    pub message: String,
    /// Destination channel.
    pub channel_id: u64,
    /// User that created the timer.
    pub author_id: u64,
    /// Message that carried the originating command.
    pub origin_message_id: u64,
}

/// A persisted timer record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerRecord {
    /// Unique identifier.
    pub id: TimerId,
    /// Handler tag; which registered handler processes the firing.
    pub event: String,
    /// When the record was created (UTC).
    pub created_at: DateTime<Utc>,
    /// Next absolute instant at which this record fires.
    ///
    /// Always the minimum of the record's own timeline.
    pub expires: DateTime<Utc>,
    /// Ascending future instants still to fire, excluding `expires`.
    /// Empty for one-shot timers.
    #[serde(default)]
    pub remaining: Vec<DateTime<Utc>>,
    /// Opaque payload.
    pub payload: TimerPayload,
}

impl TimerRecord {
    /// Check if this record fires exactly once more.
    pub fn is_one_shot(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Number of firings still scheduled, including `expires`.
    pub fn shots(&self) -> usize {
        1 + self.remaining.len()
    }

    /// Advance the schedule by `times` firings.
    ///
    /// `times == 0` cancels the whole schedule. Otherwise `times - 1`
    /// entries are dropped from the tail's head and the next instant is
    /// promoted to `expires`. Returns `None` when nothing remains; the id
    /// is preserved otherwise.
    pub fn shifted(mut self, times: u32) -> Option<Self> {
        if times == 0 {
            return None;
        }
        let dropped = (times as usize - 1).min(self.remaining.len());
        self.remaining.drain(..dropped);
        if self.remaining.is_empty() {
            return None;
        }
        self.expires = self.remaining.remove(0);
        Some(self)
    }
}

/// A timer record without an id, the only way to create a new record.
///
/// Construction sorts the timeline and promotes its minimum to `expires`,
/// so the min-invariant holds for every record the store ever sees.
#[derive(Debug, Clone)]
pub struct TimerDraft {
    pub event: String,
    pub created_at: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    pub remaining: Vec<DateTime<Utc>>,
    pub payload: TimerPayload,
}

impl TimerDraft {
    /// Build a draft from a non-empty list of firing instants.
    ///
    /// Returns `None` if `times` is empty. Duplicate instants are kept;
    /// repeating at the same instant is legal, if wasteful.
    pub fn new(
        event: impl Into<String>,
        mut times: Vec<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        payload: TimerPayload,
    ) -> Option<Self> {
        if times.is_empty() {
            return None;
        }
        times.sort();
        let expires = times.remove(0);
        Some(Self {
            event: event.into(),
            created_at,
            expires,
            remaining: times,
            payload,
        })
    }

    /// Attach a store-assigned id.
    pub(crate) fn with_id(self, id: TimerId) -> TimerRecord {
        TimerRecord {
            id,
            event: self.event,
            created_at: self.created_at,
            expires: self.expires,
            remaining: self.remaining,
            payload: self.payload,
        }
    }
}
