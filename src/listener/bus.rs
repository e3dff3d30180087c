use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Stream of messages delivered to one subscription.
pub type Subscription = mpsc::Receiver<BusMessage>;

/// A message received from (or sent through) a publish/subscribe bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub subject: String,
    pub payload: Vec<u8>,
    /// Subject the sender expects a reply on, if any.
    pub reply: Option<String>,
}

impl BusMessage {
    pub fn new(subject: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
            reply: None,
        }
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }
}

/// Reply sent back for a level change request.
///
/// Serializes as `{"result": "..."}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reply {
    Result(String),
    Error(String),
}

impl Reply {
    pub fn to_bytes(&self) -> Result<Vec<u8>, BusError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BusError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("subscription to '{0}' is closed")]
    Closed(String),

    #[error("timed out waiting for a reply on '{0}'")]
    Timeout(String),

    #[error("failed to encode or decode message: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Generic publish/subscribe transport interface.
///
/// Implement this for a real broker client; [`InMemoryBus`](super::InMemoryBus)
/// is the process-local implementation.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Start receiving messages published to `subject`.
    async fn subscribe(&self, subject: &str) -> Result<Subscription, BusError>;

    /// Publish a payload to `subject`.
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Get transport name for identification
    fn name(&self) -> &'static str;
}
