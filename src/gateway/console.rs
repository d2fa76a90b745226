//! Console binding: delivery, resolution, and prompting over stdio.
//!
//! Stands in for a chat platform in the demo binary. Channels are plain
//! numbers, every id resolves, and firings print to stdout.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::timer::TimerRecord;

use super::{Decision, Destination, DestinationResolver, Prompter, ResolveError, SendError, TimerHandler};

pub struct ConsoleGateway {
    prompt_timeout: Duration,
}

impl ConsoleGateway {
    pub fn new(prompt_timeout: Duration) -> Self {
        Self { prompt_timeout }
    }
}

#[async_trait]
impl TimerHandler for ConsoleGateway {
    async fn on_fire(&self, timer: &TimerRecord) -> Result<(), SendError> {
        println!(
            "[#{}] {} (timer {}, set {})",
            timer.payload.channel_id,
            timer.payload.message,
            timer.id,
            timer.created_at.format("%Y-%m-%d %H:%M UTC"),
        );
        Ok(())
    }
}

#[async_trait]
impl DestinationResolver for ConsoleGateway {
    async fn resolve(&self, channel_id: u64) -> Result<Destination, ResolveError> {
        Ok(Destination {
            channel_id,
            realm_id: None,
            name: format!("#{channel_id}"),
        })
    }

    async fn resolve_override(
        &self,
        tokens: &[String],
    ) -> Result<(Destination, usize), ResolveError> {
        // Console channels are bare numbers, so one token is always enough.
        let token = tokens
            .first()
            .ok_or_else(|| ResolveError::NotFound(String::new()))?;
        let channel_id: u64 = token
            .parse()
            .map_err(|_| ResolveError::NotFound(token.clone()))?;
        Ok((
            Destination {
                channel_id,
                realm_id: None,
                name: format!("#{channel_id}"),
            },
            1,
        ))
    }
}

#[async_trait]
impl Prompter for ConsoleGateway {
    async fn confirm(&self, text: &str) -> Decision {
        println!("{text}");
        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        match tokio::time::timeout(self.prompt_timeout, reader.read_line(&mut line)).await {
            Err(_) => Decision::Timeout,
            Ok(Err(_)) | Ok(Ok(0)) => Decision::No,
            Ok(Ok(_)) => match line.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => Decision::Yes,
                _ => Decision::No,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn override_takes_one_numeric_token() {
        let gw = ConsoleGateway::new(Duration::from_secs(1));
        let (dest, consumed) = gw
            .resolve_override(&["500".to_string(), "rest".to_string()])
            .await
            .unwrap();
        assert_eq!(dest.channel_id, 500);
        assert_eq!(consumed, 1);
    }

    #[tokio::test]
    async fn non_numeric_override_is_not_found() {
        let gw = ConsoleGateway::new(Duration::from_secs(1));
        assert!(matches!(
            gw.resolve_override(&["general".to_string()]).await,
            Err(ResolveError::NotFound(_))
        ));
    }
}
