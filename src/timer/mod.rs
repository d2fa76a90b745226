//! Persistent, recoverable timer scheduling.
//!
//! One background task always waits on the single nearest-expiring record;
//! everything else (set/skip/list/clear) runs on caller tasks and
//! coordinates with the loop through the store and a wake signal.
//!
//! # Usage
//!
//! ```ignore
//! let store = TimerStore::new(".chime/timers".into());
//! store.load().await?;
//!
//! let registry = HandlerRegistry::new();
//! registry.register("blast", handler).await;
//!
//! let dispatcher = Dispatcher::new(store, registry, DispatcherConfig::default());
//! let task = dispatcher.spawn();
//!
//! let record = dispatcher.create(draft).await?;
//! dispatcher.skip(record.id, 1, true).await?;
//! ```

pub mod dispatcher;
pub mod error;
pub mod fire_log;
pub mod record;
pub mod store;

pub use dispatcher::{Awaited, Dispatcher, DispatcherConfig, SkipReport};
pub use error::{Result, TimerError};
pub use fire_log::{FireLog, FireLogEntry};
pub use record::{TimerDraft, TimerId, TimerPayload, TimerRecord};
pub use store::{LoadResult, TimerStore};
