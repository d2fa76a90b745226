//! Command surface over the dispatcher.
//!
//! Takes raw command text plus the invocation context (author, channel),
//! runs destination resolution and time parsing, and applies the ownership
//! rules before anything reaches the store. Unprivileged callers only ever
//! see their own records; someone else's id answers as if it did not exist.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::gateway::{Decision, Destination, DestinationResolver, Prompter, ResolveError};
use crate::parse::TimeParser;
use crate::timer::{
    Dispatcher, FireLogEntry, Result, SkipReport, TimerDraft, TimerError, TimerId, TimerPayload,
    TimerRecord,
};

/// Knobs for the command surface.
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    /// Event tag stamped on every record created here.
    pub event: String,
    /// Maximum rows a `list` answer shows.
    pub list_limit: usize,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            event: "blast".to_string(),
            list_limit: 10,
        }
    }
}

/// One `set` invocation: the raw text and where it came from.
#[derive(Debug, Clone)]
pub struct SetRequest {
    pub text: String,
    pub author_id: u64,
    pub channel_id: u64,
    pub origin_message_id: u64,
}

/// Identity of the caller for ownership-gated operations.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: u64,
    pub privileged: bool,
}

/// Outcome of a `clear` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearOutcome {
    /// Nothing to delete.
    Empty,
    /// Caller answered no.
    Declined,
    /// Prompt expired without an answer; treated as a decline.
    TimedOut,
    /// These records were deleted.
    Cleared(Vec<TimerId>),
}

/// A record together with its resolved destination, for `info` answers.
/// `destination` is `None` when the channel no longer resolves.
#[derive(Debug, Clone)]
pub struct TimerInfo {
    pub record: TimerRecord,
    pub destination: Option<Destination>,
}

pub struct Surface {
    dispatcher: Dispatcher,
    parser: TimeParser,
    resolver: Arc<dyn DestinationResolver>,
    prompter: Arc<dyn Prompter>,
    config: SurfaceConfig,
}

impl Surface {
    pub fn new(
        dispatcher: Dispatcher,
        parser: TimeParser,
        resolver: Arc<dyn DestinationResolver>,
        prompter: Arc<dyn Prompter>,
        config: SurfaceConfig,
    ) -> Self {
        Self {
            dispatcher,
            parser,
            resolver,
            prompter,
            config,
        }
    }

    /// Parse command text and persist a new record.
    ///
    /// Destination resolution and time extraction both run before any
    /// mutation, so a rejected command leaves the store untouched.
    pub async fn set(&self, req: SetRequest) -> Result<TimerRecord> {
        let (text, destination) = match self.parser.channel_override(&req.text) {
            Some(ov) => {
                let (destination, consumed) = self
                    .resolver
                    .resolve_override(&ov.tokens)
                    .await
                    .map_err(resolve_err)?;
                (
                    self.parser.strip_override(&req.text, &ov, consumed),
                    destination,
                )
            }
            None => {
                let destination = self
                    .resolver
                    .resolve(req.channel_id)
                    .await
                    .map_err(resolve_err)?;
                (req.text.clone(), destination)
            }
        };

        let parsed = self.parser.parse(&text);
        if parsed.times.is_empty() {
            return Err(TimerError::NoTimestamps);
        }

        let payload = TimerPayload {
            message: parsed.message,
            channel_id: destination.channel_id,
            author_id: req.author_id,
            origin_message_id: req.origin_message_id,
        };
        let draft = TimerDraft::new(&self.config.event, parsed.times, Utc::now(), payload)
            .ok_or(TimerError::NoTimestamps)?;

        let record = self.dispatcher.create(draft).await?;
        info!(
            timer_id = %record.id,
            author_id = req.author_id,
            channel_id = record.payload.channel_id,
            shots = record.shots(),
            "Timer set"
        );
        Ok(record)
    }

    /// Advance a record's schedule by `times` firings. Counts below one are
    /// clamped to one; cancellation goes through [`Surface::cancel`] only.
    pub async fn skip(&self, id: TimerId, times: u32, actor: Actor) -> Result<SkipReport> {
        if self.owned(id, actor).await.is_none() {
            return Ok(SkipReport::NotFound(id));
        }
        self.dispatcher.skip(id, times.max(1), true).await
    }

    /// Cancel a record outright. Returns the removed record, or `None` when
    /// it does not exist or the caller may not see it.
    pub async fn cancel(&self, id: TimerId, actor: Actor) -> Result<Option<TimerRecord>> {
        let Some(record) = self.owned(id, actor).await else {
            return Ok(None);
        };
        self.dispatcher.skip(id, 0, true).await?;
        info!(timer_id = %id, "Timer cancelled");
        Ok(Some(record))
    }

    /// The caller's pending records, ascending by expiry, truncated to the
    /// display limit.
    pub async fn list(&self, author_id: u64) -> Vec<TimerRecord> {
        self.dispatcher
            .store()
            .list_by(&self.config.event, author_id, self.config.list_limit)
            .await
    }

    /// How many pending records the caller has, unaffected by the display
    /// limit.
    pub async fn count(&self, author_id: u64) -> usize {
        self.dispatcher
            .store()
            .count_by(&self.config.event, author_id)
            .await
    }

    /// A record plus its resolved destination.
    pub async fn info(&self, id: TimerId, actor: Actor) -> Option<TimerInfo> {
        let record = self.owned(id, actor).await?;
        let destination = match self.resolver.resolve(record.payload.channel_id).await {
            Ok(destination) => Some(destination),
            Err(e) => {
                // Stale destination is an answerable anomaly, not a failure.
                warn!(timer_id = %id, error = %e, "Destination no longer resolves");
                None
            }
        };
        Some(TimerInfo { record, destination })
    }

    /// Recent firings of a record, oldest first.
    pub async fn fire_history(&self, id: TimerId, actor: Actor, limit: usize) -> Vec<FireLogEntry> {
        if self.owned(id, actor).await.is_none() {
            return Vec::new();
        }
        self.dispatcher
            .fire_log()
            .read_recent(id, limit)
            .await
            .unwrap_or_default()
    }

    /// Delete every record the caller owns, behind a confirmation prompt.
    pub async fn clear(&self, author_id: u64) -> Result<ClearOutcome> {
        let pending = self
            .dispatcher
            .store()
            .list_by(&self.config.event, author_id, usize::MAX)
            .await;
        if pending.is_empty() {
            return Ok(ClearOutcome::Empty);
        }

        let prompt = format!(
            "This will delete {} timer(s). Confirm? (yes/no)",
            pending.len()
        );
        match self.prompter.confirm(&prompt).await {
            Decision::No => return Ok(ClearOutcome::Declined),
            Decision::Timeout => return Ok(ClearOutcome::TimedOut),
            Decision::Yes => {}
        }

        let mut cleared = Vec::with_capacity(pending.len());
        for record in pending {
            if !matches!(
                self.dispatcher.skip(record.id, 0, true).await?,
                SkipReport::NotFound(_)
            ) {
                cleared.push(record.id);
            }
        }
        info!(author_id = author_id, cleared = cleared.len(), "Timers cleared");
        Ok(ClearOutcome::Cleared(cleared))
    }

    /// Cascade for a destination that disappeared out from under us.
    pub async fn channel_removed(&self, channel_id: u64) -> Result<Vec<TimerRecord>> {
        self.dispatcher.delete_destination(channel_id).await
    }

    /// Pending records targeting a channel, regardless of author.
    pub async fn channel_timers(&self, channel_id: u64) -> Vec<TimerRecord> {
        self.dispatcher
            .store()
            .list_by_channel(&self.config.event, channel_id)
            .await
    }

    /// Ownership gate: the record exists, carries this surface's event tag,
    /// and belongs to the actor (or the actor is privileged).
    async fn owned(&self, id: TimerId, actor: Actor) -> Option<TimerRecord> {
        let record = self.dispatcher.store().get(id).await?;
        if record.event != self.config.event {
            return None;
        }
        if !actor.privileged && record.payload.author_id != actor.id {
            return None;
        }
        Some(record)
    }
}

fn resolve_err(e: ResolveError) -> TimerError {
    match e {
        ResolveError::NotFound(s) => TimerError::DestinationNotFound(s),
        ResolveError::NoSendPermission(s) => TimerError::PermissionDenied(s),
    }
}
