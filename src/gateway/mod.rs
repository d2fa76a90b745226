//! External collaborators of the timer core.
//!
//! The scheduler does not know how messages reach users, how channel names
//! resolve, or how a confirmation prompt is shown. It talks to those
//! collaborators through the traits here; the chat-platform binding
//! implements them. A stdin/stdout implementation used by the demo binary
//! lives in [`console`].

pub mod console;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::timer::TimerRecord;

// ============================================================================
// Event handlers
// ============================================================================

/// Failure modes of an event handler, as seen by the dispatcher.
#[derive(Debug, Error)]
pub enum SendError {
    /// The transport is down; the scheduler loop restarts on this class.
    #[error("delivery unreachable: {0}")]
    Unreachable(String),

    /// The handler declined or failed for its own reasons; logged, ignored.
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Handler invoked when a timer record fires.
///
/// Invoked after the record's schedule shift has been persisted, so a
/// handler observes each scheduled instant at most once.
#[async_trait]
pub trait TimerHandler: Send + Sync {
    async fn on_fire(&self, timer: &TimerRecord) -> Result<(), SendError>;
}

/// Registry mapping event tags to handlers, resolved at startup.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<dyn TimerHandler>>>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an event tag. Replaces any previous handler.
    pub async fn register(&self, event: impl Into<String>, handler: Arc<dyn TimerHandler>) {
        let event = event.into();
        let mut inner = self.inner.write().await;
        debug!(event = %event, "Handler registered");
        inner.insert(event, handler);
    }

    /// Emit a firing to the handler registered for the record's event tag.
    ///
    /// Handler-level rejections are logged and swallowed; only transport
    /// unreachability propagates, so the dispatcher can restart its loop.
    pub async fn emit(&self, timer: &TimerRecord) -> Result<(), SendError> {
        let handler = {
            let inner = self.inner.read().await;
            inner.get(&timer.event).cloned()
        };

        let Some(handler) = handler else {
            warn!(event = %timer.event, timer_id = %timer.id, "No handler for event");
            return Ok(());
        };

        match handler.on_fire(timer).await {
            Ok(()) => Ok(()),
            Err(SendError::Rejected(reason)) => {
                warn!(event = %timer.event, timer_id = %timer.id, reason = %reason, "Handler rejected firing");
                Ok(())
            }
            Err(e @ SendError::Unreachable(_)) => Err(e),
        }
    }
}

// ============================================================================
// Destination resolution
// ============================================================================

/// A resolved delivery destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Channel to deliver into.
    pub channel_id: u64,
    /// Realm (guild/server) the channel belongs to, if any.
    pub realm_id: Option<u64>,
    /// Human-readable channel name.
    pub name: String,
}

/// Resolution failures.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Named guild/channel does not exist (or the id is gone).
    #[error("target not found: {0}")]
    NotFound(String),

    /// The bot or the invoking user cannot send messages there.
    #[error("missing send permission in: {0}")]
    NoSendPermission(String),
}

/// Name and id resolution, delegated to the platform binding.
#[async_trait]
pub trait DestinationResolver: Send + Sync {
    /// Resolve a stored channel id back to a destination.
    async fn resolve(&self, channel_id: u64) -> Result<Destination, ResolveError>;

    /// Resolve the one or two tokens following a `-c` override.
    ///
    /// `tokens` holds the candidates in order (`[channel]` or
    /// `[guild, channel]`; the resolver decides which reading applies).
    /// Returns the destination and how many tokens it consumed, so the
    /// caller can strip exactly those from the message text.
    async fn resolve_override(&self, tokens: &[String]) -> Result<(Destination, usize), ResolveError>;
}

// ============================================================================
// Confirmation prompt
// ============================================================================

/// Outcome of a confirmation prompt. A timeout is treated as a decline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Yes,
    No,
    Timeout,
}

/// Yes/no confirmation, delegated to the platform binding.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn confirm(&self, text: &str) -> Decision;
}
