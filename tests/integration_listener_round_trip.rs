mod common;

use anyhow::Result;
use common::TestWriter;
use logging_utilities::listener::Reply;
use logging_utilities::{
    build_subscriber, BusLevelListener, InMemoryBus, ListenerConfig, LogFileConfig, LoggerConfig,
    Severity,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const SUBJECT: &str = "levels.app";

async fn send(bus: &InMemoryBus, payload: &str) -> Result<Reply> {
    let message = bus
        .request(SUBJECT, payload.as_bytes().to_vec(), Duration::from_secs(5))
        .await?;
    Ok(Reply::from_bytes(&message.payload)?)
}

/// A request over the bus changes what the logger writes, the reply reports
/// the outcome, and the change is reverted once its duration elapses.
///
/// The test runtime is single-threaded, so every task sees the default
/// subscriber installed here.
#[tokio::test(start_paused = true)]
async fn level_change_round_trip() -> Result<()> {
    let writer = TestWriter::default();
    let config = LoggerConfig::new(["app"], Severity::Info).with_info_logger("app");
    let (subscriber, handles) = build_subscriber(&config, writer.clone())?;
    let _default = tracing::subscriber::set_default(subscriber);

    let logger = handles.logger("app").expect("app logger").clone();
    let bus = Arc::new(InMemoryBus::new());
    BusLevelListener::create(bus.clone(), logger.clone(), ListenerConfig::new(SUBJECT)).await?;

    info!(target: "app", "visible before");
    let reply = send(&bus, r#"{"level": "ERROR", "duration": 30}"#).await?;
    assert_eq!(reply, Reply::Result("Log level set to ERROR".to_string()));
    info!(target: "app", "hidden during");

    tokio::time::sleep(Duration::from_secs(31)).await;
    info!(target: "app", "visible after");

    let messages = writer.messages();
    assert_eq!(
        messages.iter().filter(|m| m.starts_with("visible")).count(),
        2
    );
    assert!(messages.contains(&"Setting log level to ERROR".to_string()));
    assert!(!messages.contains(&"hidden during".to_string()));
    assert_eq!(logger.sink("stdout").expect("stdout sink").level(), Severity::Info);
    Ok(())
}

/// Lowering the stdout sink only shows more output when the logger itself is
/// already that verbose, here because the file sink runs at DEBUG.
#[tokio::test(start_paused = true)]
async fn lowering_stdout_below_info() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let writer = TestWriter::default();
    let config = LoggerConfig::new(["app"], Severity::Info)
        .with_file(Severity::Debug, LogFileConfig::new(dir.path(), "app.log"))
        .with_info_logger("app");
    let (subscriber, handles) = build_subscriber(&config, writer.clone())?;
    let _default = tracing::subscriber::set_default(subscriber);

    let logger = handles.logger("app").expect("app logger").clone();
    let bus = Arc::new(InMemoryBus::new());
    BusLevelListener::create(bus.clone(), logger.clone(), ListenerConfig::new(SUBJECT)).await?;

    debug!(target: "app", "hidden before");
    send(&bus, r#"{"level": "DEBUG", "duration": 30}"#).await?;
    debug!(target: "app", "visible during");

    tokio::time::sleep(Duration::from_secs(31)).await;
    debug!(target: "app", "hidden after");

    let messages = writer.messages();
    assert!(messages.contains(&"Log level will be reset in 30 seconds".to_string()));
    assert!(messages.contains(&"Resetting log level to INFO".to_string()));
    assert!(messages.contains(&"visible during".to_string()));
    assert!(!messages.contains(&"hidden before".to_string()));
    assert!(!messages.contains(&"hidden after".to_string()));
    Ok(())
}

#[tokio::test]
async fn invalid_requests_get_error_replies() -> Result<()> {
    let config = LoggerConfig::new(["app"], Severity::Info);
    let (subscriber, handles) = build_subscriber(&config, TestWriter::default())?;
    let _default = tracing::subscriber::set_default(subscriber);

    let logger = handles.logger("app").expect("app logger").clone();
    let bus = Arc::new(InMemoryBus::new());
    BusLevelListener::create(bus.clone(), logger.clone(), ListenerConfig::new(SUBJECT)).await?;

    match send(&bus, r#"{"level": "LOUD", "duration": 1}"#).await? {
        Reply::Error(text) => assert!(text.contains("validation error")),
        other => panic!("expected error reply, got {:?}", other),
    }
    match send(&bus, "not json").await? {
        Reply::Error(text) => assert!(text.starts_with("Error when parsing JSON")),
        other => panic!("expected error reply, got {:?}", other),
    }

    assert_eq!(logger.sink("stdout").expect("stdout sink").level(), Severity::Info);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn zero_duration_change_is_kept() -> Result<()> {
    let config = LoggerConfig::new(["app"], Severity::Info);
    let (subscriber, handles) = build_subscriber(&config, TestWriter::default())?;
    let _default = tracing::subscriber::set_default(subscriber);

    let logger = handles.logger("app").expect("app logger").clone();
    let bus = Arc::new(InMemoryBus::new());
    let config = ListenerConfig::new(SUBJECT).with_fallback_level(Severity::Warning);
    BusLevelListener::create(bus.clone(), logger.clone(), config).await?;

    let reply = send(&bus, r#"{"level": "ERROR", "duration": 0}"#).await?;
    assert_eq!(reply, Reply::Result("Log level set to ERROR".to_string()));

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(logger.sink("stdout").expect("stdout sink").level(), Severity::Error);
    Ok(())
}
