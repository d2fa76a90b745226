use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::Duration;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use chime::config::Config;
use chime::gateway::console::ConsoleGateway;
use chime::gateway::HandlerRegistry;
use chime::parse::{ParserConfig, TimeParser};
use chime::surface::{Actor, ClearOutcome, SetRequest, Surface, SurfaceConfig};
use chime::timer::{Dispatcher, DispatcherConfig, SkipReport, TimerStore};

// ============================================================================
// CLI Types
// ============================================================================

/// Chime - persistent timers and reminders over a console session
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "chime.json")]
    config: String,

    /// Timer data directory (overrides config file)
    #[arg(long)]
    data_dir: Option<std::path::PathBuf>,

    /// Channel number reminders default to
    #[arg(long, default_value_t = 1)]
    channel: u64,

    /// Author id commands run as
    #[arg(long, default_value_t = 1)]
    author: u64,

    /// Treat the author as privileged (sees everyone's timers)
    #[arg(long)]
    admin: bool,
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let store = TimerStore::new(config.data_dir.clone());
    let loaded = store.load().await?;
    if !loaded.errors.is_empty() {
        warn!(errors = loaded.errors.len(), "Some timer records failed to load");
    }
    println!("Loaded {} pending timer(s) from {}", loaded.loaded, config.data_dir.display());

    let gateway = Arc::new(ConsoleGateway::new(StdDuration::from_secs(
        config.surface.prompt_timeout_seconds,
    )));

    let registry = HandlerRegistry::new();
    registry.register(config.surface.event.clone(), gateway.clone()).await;

    let dispatcher = Dispatcher::new(
        store,
        registry,
        DispatcherConfig {
            horizon: Duration::days(config.scheduler.horizon_days),
            restart_delay: StdDuration::from_secs(config.scheduler.restart_delay_seconds),
        },
    );
    let loop_task = dispatcher.spawn();

    let surface = Surface::new(
        dispatcher,
        TimeParser::new(ParserConfig {
            adjacency_gap: config.parser.adjacency_gap,
            default_message: config.parser.default_message.clone(),
        }),
        gateway.clone(),
        gateway,
        SurfaceConfig {
            event: config.surface.event.clone(),
            list_limit: config.surface.list_limit,
        },
    );

    let actor = Actor {
        id: cli.author,
        privileged: cli.admin,
    };
    repl(&surface, actor, cli.channel).await?;

    loop_task.abort();
    Ok(())
}

// ============================================================================
// Console session
// ============================================================================

const HELP: &str = "\
commands:
  set <text>        schedule a reminder, e.g. set buy eggs in 5 minutes
  list              show your pending timers
  info <id>         show one timer in full
  skip <id> [n]     skip the next n firings (default 1)
  delete <id>       cancel a timer
  clear             delete all your timers
  quit";

async fn repl(surface: &Surface, actor: Actor, channel: u64) -> Result<()> {
    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut message_seq: u64 = 0;

    print!("> ");
    flush();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = match line.split_once(' ') {
            Some((c, r)) => (c, r.trim()),
            None => (line, ""),
        };

        match command {
            "" => {}
            "quit" | "exit" => break,
            "help" => println!("{HELP}"),
            "set" => {
                message_seq += 1;
                let req = SetRequest {
                    text: rest.to_string(),
                    author_id: actor.id,
                    channel_id: channel,
                    origin_message_id: message_seq,
                };
                match surface.set(req).await {
                    Ok(record) => println!(
                        "timer {} set: \"{}\", next firing {} ({} shot(s))",
                        record.id,
                        record.payload.message,
                        record.expires.format("%Y-%m-%d %H:%M:%S UTC"),
                        record.shots(),
                    ),
                    Err(e) => println!("error: {e}"),
                }
            }
            "list" => {
                let records = surface.list(actor.id).await;
                if records.is_empty() {
                    println!("no pending timers");
                }
                for record in records {
                    println!(
                        "  {}  {}  \"{}\"  ({} shot(s))",
                        record.id,
                        record.expires.format("%Y-%m-%d %H:%M:%S UTC"),
                        record.payload.message,
                        record.shots(),
                    );
                }
            }
            "info" => match parse_id(rest) {
                Some(id) => match surface.info(id, actor).await {
                    Some(info) => {
                        let record = info.record;
                        println!("timer {}", record.id);
                        println!("  message:  \"{}\"", record.payload.message);
                        println!("  created:  {}", record.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
                        println!("  next:     {}", record.expires.format("%Y-%m-%d %H:%M:%S UTC"));
                        for t in &record.remaining {
                            println!("  then:     {}", t.format("%Y-%m-%d %H:%M:%S UTC"));
                        }
                        match info.destination {
                            Some(dest) => println!("  channel:  {}", dest.name),
                            None => println!("  channel:  {} (no longer exists)", record.payload.channel_id),
                        }
                        let history = surface.fire_history(id, actor, 5).await;
                        if !history.is_empty() {
                            println!("  fired:    {} time(s) so far", history.len());
                        }
                    }
                    None => println!("no such timer"),
                },
                None => println!("usage: info <id>"),
            },
            "skip" => {
                let mut parts = rest.split_whitespace();
                let id = parts.next().and_then(|t| t.parse().ok());
                let times: u32 = parts.next().and_then(|t| t.parse().ok()).unwrap_or(1);
                match id {
                    Some(id) => match surface.skip(id, times, actor).await {
                        Ok(SkipReport::Skipped(next)) => println!(
                            "timer {} skipped, next firing {}",
                            next.id,
                            next.expires.format("%Y-%m-%d %H:%M:%S UTC"),
                        ),
                        Ok(SkipReport::Exhausted(id)) => {
                            println!("timer {id} had no firings left and was removed")
                        }
                        Ok(SkipReport::NotFound(id)) => println!("no timer {id}"),
                        Err(e) => println!("error: {e}"),
                    },
                    None => println!("usage: skip <id> [n]"),
                }
            }
            "delete" => match parse_id(rest) {
                Some(id) => match surface.cancel(id, actor).await {
                    Ok(Some(record)) => {
                        println!("timer {} deleted: \"{}\"", record.id, record.payload.message)
                    }
                    Ok(None) => println!("no such timer"),
                    Err(e) => println!("error: {e}"),
                },
                None => println!("usage: delete <id>"),
            },
            "clear" => match surface.clear(actor.id).await {
                Ok(ClearOutcome::Empty) => println!("nothing to clear"),
                Ok(ClearOutcome::Declined) | Ok(ClearOutcome::TimedOut) => println!("kept everything"),
                Ok(ClearOutcome::Cleared(ids)) => println!("deleted {} timer(s)", ids.len()),
                Err(e) => println!("error: {e}"),
            },
            other => println!("unknown command: {other} (try help)"),
        }

        print!("> ");
        flush();
    }

    Ok(())
}

fn parse_id(rest: &str) -> Option<u64> {
    rest.split_whitespace().next()?.parse().ok()
}

fn flush() {
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

// ============================================================================
// Initialization
// ============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
