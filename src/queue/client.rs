//! AMQP client
//!
//! Thin wrapper over a lapin connection and channel:
//! - `connect` opens the connection and a single channel
//! - `declare_and_bind` sets up the durable exchange/queue topology
//! - `subscribe` starts a manual-ack consumer
//! - `close` tears everything down (idempotent)

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use lapin::options::{
    BasicConsumeOptions, BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use tracing::{debug, info, warn};

use super::envelope::{AmqpHandle, Envelope};
use crate::error::QueueError;

/// AMQP reply code for a normal shutdown
const REPLY_SUCCESS: u16 = 200;

pub struct QueueClient {
    url: String,
    connection: Option<Connection>,
    channel: Option<Channel>,
}

impl QueueClient {
    /// Create an unconnected client
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection: None,
            channel: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.channel
            .as_ref()
            .is_some_and(|channel| channel.status().connected())
    }

    /// Open the connection and a channel
    ///
    /// # Errors
    /// `QueueError::Connection` if the broker is unreachable or refuses
    /// the credentials.
    pub async fn connect(&mut self) -> Result<(), QueueError> {
        let connection = Connection::connect(&self.url, ConnectionProperties::default())
            .await
            .map_err(QueueError::Connection)?;
        let channel = connection
            .create_channel()
            .await
            .map_err(QueueError::Connection)?;

        info!(channel_id = channel.id(), "Connected to message broker");

        self.connection = Some(connection);
        self.channel = Some(channel);
        Ok(())
    }

    fn channel(&self) -> Result<&Channel, QueueError> {
        self.channel.as_ref().ok_or(QueueError::NotConnected)
    }

    /// Declare a durable topic exchange and queue, then bind every key
    ///
    /// If any bind fails, bindings created by this call are removed on a
    /// fresh channel before the error is returned.
    pub async fn declare_and_bind(
        &self,
        queue_name: &str,
        exchange: &str,
        routing_keys: &[String],
        prefetch_count: u16,
    ) -> Result<(), QueueError> {
        let channel = self.channel()?;

        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| QueueError::topology(format!("declare exchange {}", exchange), e))?;

        channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| QueueError::topology(format!("declare queue {}", queue_name), e))?;

        channel
            .basic_qos(prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| QueueError::topology("set prefetch", e))?;

        let bindings = AmqpBindings {
            connection: self.connection.as_ref().ok_or(QueueError::NotConnected)?,
            channel,
            queue_name,
            exchange,
        };
        bind_all(&bindings, routing_keys).await?;

        info!(
            queue = queue_name,
            exchange,
            keys = routing_keys.len(),
            "Queue topology ready"
        );
        Ok(())
    }

    /// Start consuming `queue_name` with manual acknowledgment
    pub async fn subscribe(
        &self,
        queue_name: &str,
        consumer_tag: &str,
    ) -> Result<Subscription, QueueError> {
        let consumer = self
            .channel()?
            .basic_consume(
                queue_name,
                consumer_tag,
                BasicConsumeOptions {
                    no_ack: false,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(QueueError::Consume)?;

        info!(queue = queue_name, consumer_tag, "Consumer subscribed");
        Ok(Subscription { consumer })
    }

    /// Close the channel and connection
    ///
    /// Safe to call more than once. Errors are logged, not returned, since
    /// the broker may already have dropped the connection.
    pub async fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            if let Err(e) = channel.close(REPLY_SUCCESS, "consumer closing").await {
                debug!(error = %e, "Channel close failed");
            }
        }
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close(REPLY_SUCCESS, "consumer closing").await {
                debug!(error = %e, "Connection close failed");
            }
            info!("Disconnected from message broker");
        }
    }
}

/// Bind/unbind operations for one queue and exchange
#[async_trait]
trait Bindings: Send + Sync {
    async fn bind(&self, routing_key: &str) -> Result<(), QueueError>;

    /// Remove bindings after a failed bind
    ///
    /// The broker closes the channel on which a bind failed, so this must
    /// not reuse it.
    async fn unbind(&self, routing_keys: &[&str]) -> Result<(), QueueError>;
}

/// Bind every key in order; on the first failure, unbind the keys this
/// call already bound and return that failure
async fn bind_all<B: Bindings>(bindings: &B, routing_keys: &[String]) -> Result<(), QueueError> {
    let mut bound: Vec<&str> = Vec::with_capacity(routing_keys.len());
    for key in routing_keys {
        if let Err(e) = bindings.bind(key).await {
            if !bound.is_empty() {
                match bindings.unbind(&bound).await {
                    Ok(()) => debug!(keys = bound.len(), "Rolled back partial bindings"),
                    Err(rollback) => {
                        warn!(error = %rollback, keys = bound.len(), "Failed to roll back bindings")
                    }
                }
            }
            return Err(e);
        }
        debug!(routing_key = %key, "Queue bound");
        bound.push(key.as_str());
    }
    Ok(())
}

struct AmqpBindings<'a> {
    connection: &'a Connection,
    channel: &'a Channel,
    queue_name: &'a str,
    exchange: &'a str,
}

#[async_trait]
impl Bindings for AmqpBindings<'_> {
    async fn bind(&self, routing_key: &str) -> Result<(), QueueError> {
        self.channel
            .queue_bind(
                self.queue_name,
                self.exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| QueueError::topology(format!("bind {}", routing_key), e))
    }

    async fn unbind(&self, routing_keys: &[&str]) -> Result<(), QueueError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| QueueError::topology("open rollback channel", e))?;

        let mut result = Ok(());
        for key in routing_keys {
            if let Err(e) = channel
                .queue_unbind(self.queue_name, self.exchange, key, FieldTable::default())
                .await
            {
                result = Err(QueueError::topology(format!("unbind {}", key), e));
                break;
            }
        }

        if let Err(e) = channel.close(REPLY_SUCCESS, "rollback complete").await {
            debug!(error = %e, "Rollback channel close failed");
        }
        result
    }
}

/// Stream of deliveries from an active consumer
pub struct Subscription {
    consumer: Consumer,
}

impl Stream for Subscription {
    type Item = Result<Envelope<AmqpHandle>, QueueError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.consumer.poll_next_unpin(cx).map(|item| {
            item.map(|delivery| delivery.map(Envelope::from).map_err(QueueError::Consume))
        })
    }
}
