//! Signalling bus
//!
//! Publish, Reload and Rollback events travel from the release handlers to
//! every connection server over a [`SignallingBus`]. Delivery is at-most-once:
//! a subscriber that lags or is down misses events, and sidecars catch up by
//! pulling.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use bscp_api::Signalling;
use bscp_common::BscpResult;

/// Receiver of signalling envelopes delivered by a bus.
///
/// `handle` runs on the bus's receive loop and should return promptly.
#[async_trait]
pub trait SignallingHandler: Send + Sync {
    async fn handle(&self, signalling: Signalling);
}

#[async_trait]
pub trait SignallingBus: Send + Sync {
    /// Hand an envelope to the bus. Returns once the bus accepted it.
    async fn publish(&self, signalling: &Signalling) -> BscpResult<()>;

    /// Deliver every later envelope to `handler` on a background task.
    async fn subscribe(&self, handler: Arc<dyn SignallingHandler>) -> BscpResult<()>;
}

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// In-process bus over a tokio broadcast channel.
pub struct ChannelSignallingBus {
    sender: broadcast::Sender<Signalling>,
}

impl Default for ChannelSignallingBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelSignallingBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl SignallingBus for ChannelSignallingBus {
    async fn publish(&self, signalling: &Signalling) -> BscpResult<()> {
        match self.sender.send(signalling.clone()) {
            Ok(receivers) => {
                debug!(
                    signalling_type = %signalling.signalling_type,
                    release_id = signalling.publishing.release_id,
                    receivers,
                    "Signalling published"
                );
            }
            // No subscriber yet: nobody is connected to push to.
            Err(_) => {
                debug!(
                    release_id = signalling.publishing.release_id,
                    "Signalling published with no subscribers"
                );
            }
        }
        Ok(())
    }

    async fn subscribe(&self, handler: Arc<dyn SignallingHandler>) -> BscpResult<()> {
        let mut receiver = self.sender.subscribe();

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(signalling) => handler.handle(signalling).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        error!(skipped, "Signalling subscriber lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Signalling channel closed, subscriber exiting");
                        break;
                    }
                }
            }
        });

        Ok(())
    }
}

#[cfg(feature = "redis")]
pub use redis_bus::RedisSignallingBus;

#[cfg(feature = "redis")]
mod redis_bus {
    use super::*;

    use bscp_common::BscpError;
    use futures::StreamExt;
    use redis::{
        AsyncCommands, Client,
        aio::{ConnectionManager, PubSub},
    };
    use std::time::Duration;
    use tracing::warn;

    const INITIAL_BACKOFF: Duration = Duration::from_millis(200);
    const MAX_BACKOFF: Duration = Duration::from_secs(30);

    fn bus_error(e: redis::RedisError) -> BscpError {
        BscpError::DownstreamError(format!("redis: {}", e))
    }

    /// Bus over Redis PUBLISH/SUBSCRIBE on a single topic, shared by every
    /// connection server replica.
    pub struct RedisSignallingBus {
        client: Client,
        conn: ConnectionManager,
        topic: String,
    }

    impl RedisSignallingBus {
        pub async fn connect(url: &str, topic: &str) -> BscpResult<Self> {
            let client = Client::open(url).map_err(bus_error)?;
            let conn = ConnectionManager::new(client.clone())
                .await
                .map_err(bus_error)?;

            info!(topic = %topic, "Connected signalling bus to redis");
            Ok(Self {
                client,
                conn,
                topic: topic.to_string(),
            })
        }
    }

    #[async_trait]
    impl SignallingBus for RedisSignallingBus {
        async fn publish(&self, signalling: &Signalling) -> BscpResult<()> {
            let body = serde_json::to_string(signalling)
                .map_err(|e| BscpError::InternalError(e.to_string()))?;

            let mut conn = self.conn.clone();
            let receivers: i64 = conn.publish(&self.topic, body).await.map_err(bus_error)?;

            debug!(
                topic = %self.topic,
                release_id = signalling.publishing.release_id,
                receivers,
                "Signalling published"
            );
            Ok(())
        }

        async fn subscribe(&self, handler: Arc<dyn SignallingHandler>) -> BscpResult<()> {
            let first = open_pubsub(&self.client, &self.topic).await?;
            let client = self.client.clone();
            let topic = self.topic.clone();

            tokio::spawn(async move {
                let mut pubsub = Some(first);
                let mut backoff = INITIAL_BACKOFF;
                loop {
                    let current = match pubsub.take() {
                        Some(current) => current,
                        None => {
                            tokio::time::sleep(backoff).await;
                            match open_pubsub(&client, &topic).await {
                                Ok(current) => {
                                    info!(topic = %topic, "Resubscribed to redis signalling topic");
                                    current
                                }
                                Err(e) => {
                                    backoff = next_backoff(backoff);
                                    warn!(
                                        topic = %topic,
                                        error = %e,
                                        retry_in_ms = backoff.as_millis() as u64,
                                        "Failed to resubscribe to redis signalling topic"
                                    );
                                    continue;
                                }
                            }
                        }
                    };

                    if relay(current, &topic, handler.as_ref()).await > 0 {
                        backoff = INITIAL_BACKOFF;
                    }
                    warn!(topic = %topic, "Redis signalling subscription dropped, reconnecting");
                }
            });

            Ok(())
        }
    }

    fn next_backoff(current: Duration) -> Duration {
        (current * 2).min(MAX_BACKOFF)
    }

    async fn open_pubsub(client: &Client, topic: &str) -> BscpResult<PubSub> {
        let mut pubsub = client.get_async_pubsub().await.map_err(bus_error)?;
        pubsub.subscribe(topic).await.map_err(bus_error)?;
        Ok(pubsub)
    }

    /// Hand every message to `handler` until the subscription ends. Returns
    /// the number of envelopes handled.
    async fn relay(mut pubsub: PubSub, topic: &str, handler: &dyn SignallingHandler) -> usize {
        let mut handled = 0;
        let mut messages = pubsub.on_message();
        while let Some(msg) = messages.next().await {
            let body: String = match msg.get_payload() {
                Ok(body) => body,
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Unreadable signalling message");
                    continue;
                }
            };
            match serde_json::from_str::<Signalling>(&body) {
                Ok(signalling) => {
                    handler.handle(signalling).await;
                    handled += 1;
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Malformed signalling envelope");
                }
            }
        }
        handled
    }

}
