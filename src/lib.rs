//! Chime - persistent, recoverable timers and reminders for chat-bot command frameworks.

pub mod config;
pub mod gateway;
pub mod parse;
pub mod surface;
pub mod timer;
