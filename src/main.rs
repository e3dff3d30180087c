//! # Log Level Demo - Main Entry Point
//!
//! Small interactive driver for the logging utilities:
//!
//! 1. **Initialize logging**: one logger named after this binary, with a
//!    stdout sink and an optional rotating file sink
//! 2. **Start the listener**: subscribe a `BusLevelListener` to an in-memory bus
//! 3. **Heartbeat**: log one event at every severity on a fixed interval
//! 4. **Read stdin**: send each line to the listener as a level change request
//!    and print the reply
//!
//! Try `{"level": "DEBUG", "duration": 15}` to see DEBUG heartbeats for fifteen
//! seconds, or `{"level": "ERROR", "duration": 0}` to quiet the output until
//! the next request.

use anyhow::{Context, Result};
use clap::Parser;
use logging_utilities::cli::Args;
use logging_utilities::listener::Reply;
use logging_utilities::{
    critical, init_loggers, spawn_monitored, BusLevelListener, InMemoryBus, SlowPollThresholds,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, trace, warn};

const LOGGER_NAME: &str = env!("CARGO_CRATE_NAME");

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Dropping the handles flushes the file sink, so hold them until exit.
    let handles = init_loggers(&args.logger_config(LOGGER_NAME))
        .context("Failed to initialize logging")?;
    let logger = handles
        .logger(LOGGER_NAME)
        .context("Configured logger is missing")?
        .clone();

    info!("Starting Log Level Demo v{}", logging_utilities::VERSION);

    let bus = Arc::new(InMemoryBus::new());
    let listener_config = args.listener_config();
    let subject = listener_config.subject.clone();
    BusLevelListener::create(bus.clone(), logger, listener_config)
        .await
        .context("Failed to start log level listener")?;

    let heartbeat = spawn_monitored(
        "heartbeat",
        SlowPollThresholds::default(),
        run_heartbeat(args.heartbeat),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        send_request(&bus, &subject, line, args.reply_timeout).await;
    }

    heartbeat.abort();
    info!("Stdin closed, shutting down");
    Ok(())
}

async fn send_request(bus: &InMemoryBus, subject: &str, line: &str, timeout: Duration) {
    match bus.request(subject, line.as_bytes().to_vec(), timeout).await {
        Ok(message) => match Reply::from_bytes(&message.payload) {
            Ok(Reply::Result(text)) => println!("ok: {}", text),
            Ok(Reply::Error(text)) => println!("error: {}", text),
            Err(e) => error!("Unreadable reply: {}", e),
        },
        Err(e) => error!("Level change request failed: {}", e),
    }
}

async fn run_heartbeat(period: Duration) {
    let mut interval = tokio::time::interval(period);
    let mut beat: u64 = 0;
    loop {
        interval.tick().await;
        beat += 1;
        trace!(beat, "heartbeat");
        debug!(beat, "heartbeat");
        info!(beat, "heartbeat");
        warn!(beat, "heartbeat");
        error!(beat, "heartbeat");
        critical!(beat, "heartbeat");
    }
}
