use super::bus::{BusError, BusMessage, MessageBus, Reply, Subscription};
use super::{LevelListener, ListenerConfig};
use crate::init::Logger;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Listens on a bus subject and applies level change requests to a logger.
///
/// Each inbound message is handled on its own task. When a message carries
/// a reply subject the outcome is published there as a [`Reply`].
pub struct BusLevelListener<B: MessageBus> {
    bus: Arc<B>,
    listener: Arc<LevelListener>,
}

impl<B: MessageBus> Clone for BusLevelListener<B> {
    fn clone(&self) -> Self {
        Self {
            bus: Arc::clone(&self.bus),
            listener: Arc::clone(&self.listener),
        }
    }
}

impl<B: MessageBus + 'static> BusLevelListener<B> {
    /// Subscribe to `config.subject` and start handling requests in the
    /// background. Must be called from within a tokio runtime.
    pub async fn create(
        bus: Arc<B>,
        logger: Logger,
        config: ListenerConfig,
    ) -> Result<Self, BusError> {
        info!(
            logger = %logger.name(),
            subject = %config.subject,
            fallback_level = %config.fallback_level,
            supersede_pending = config.supersede_pending,
            transport = bus.name(),
            "Starting log level listener"
        );

        let this = Self {
            bus,
            listener: Arc::new(LevelListener::new(logger, config)),
        };

        info!(subject = %this.config().subject, "Subscribing to subject");
        let subscription = this.bus.subscribe(&this.config().subject).await?;
        tokio::spawn(this.clone().dispatch(subscription));

        Ok(this)
    }

    pub fn config(&self) -> &ListenerConfig {
        self.listener.config()
    }

    pub fn level_listener(&self) -> &LevelListener {
        &self.listener
    }

    async fn dispatch(self, mut subscription: Subscription) {
        while let Some(message) = subscription.recv().await {
            let this = self.clone();
            tokio::spawn(async move {
                if let Err(e) = this.handle_message(message).await {
                    error!("Failed to reply to level change request: {}", e);
                }
            });
        }
        warn!(subject = %self.config().subject, "Level change subscription closed");
    }

    /// Apply one inbound message and reply if the sender asked for it.
    pub async fn handle_message(&self, message: BusMessage) -> Result<(), BusError> {
        let reply = match self.listener.handle_payload(&message.payload) {
            Ok(request) => Reply::Result(format!("Log level set to {}", request.level())),
            Err(e) => {
                debug!(subject = %message.subject, "Rejected level change request: {}", e);
                Reply::Error(e.to_string())
            }
        };

        match message.reply {
            Some(reply_to) => self.bus.publish(&reply_to, reply.to_bytes()?).await,
            None => Ok(()),
        }
    }
}
