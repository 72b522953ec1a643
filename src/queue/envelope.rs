//! Deliveries and their acknowledgment handles

use async_trait::async_trait;
use lapin::acker::Acker;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions};

use crate::error::QueueError;

/// How a delivery was settled with the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Ack,
    Nack { requeue: bool },
}

/// Broker-side handle for one delivery
///
/// `ack` and `nack` consume the handle, so a delivery can be settled at
/// most once.
#[async_trait]
pub trait DeliveryHandle: Send {
    fn delivery_tag(&self) -> u64;

    async fn ack(self) -> Result<(), QueueError>;

    async fn nack(self, requeue: bool) -> Result<(), QueueError>;
}

/// A received message: routing key, opaque payload and settle handle
pub struct Envelope<H> {
    routing_key: String,
    body: Vec<u8>,
    handle: H,
}

impl<H: DeliveryHandle> Envelope<H> {
    pub fn new(routing_key: impl Into<String>, body: Vec<u8>, handle: H) -> Self {
        Self {
            routing_key: routing_key.into(),
            body,
            handle,
        }
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn delivery_tag(&self) -> u64 {
        self.handle.delivery_tag()
    }

    /// Settle the delivery with the broker
    pub async fn settle(self, outcome: AckOutcome) -> Result<(), QueueError> {
        match outcome {
            AckOutcome::Ack => self.handle.ack().await,
            AckOutcome::Nack { requeue } => self.handle.nack(requeue).await,
        }
    }

    /// Drop the delivery without settling it
    ///
    /// The broker redelivers it once the channel closes.
    pub fn abandon(self) {}
}

/// Acknowledgment handle for an AMQP delivery
pub struct AmqpHandle {
    delivery_tag: u64,
    acker: Acker,
}

#[async_trait]
impl DeliveryHandle for AmqpHandle {
    fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    async fn ack(self) -> Result<(), QueueError> {
        self.acker
            .ack(BasicAckOptions { multiple: false })
            .await
            .map(|_| ())
            .map_err(|e| QueueError::Acknowledgment {
                delivery_tag: self.delivery_tag,
                reason: e.to_string(),
            })
    }

    async fn nack(self, requeue: bool) -> Result<(), QueueError> {
        self.acker
            .nack(BasicNackOptions {
                multiple: false,
                requeue,
            })
            .await
            .map(|_| ())
            .map_err(|e| QueueError::Acknowledgment {
                delivery_tag: self.delivery_tag,
                reason: e.to_string(),
            })
    }
}

impl From<Delivery> for Envelope<AmqpHandle> {
    fn from(delivery: Delivery) -> Self {
        Envelope::new(
            delivery.routing_key.as_str(),
            delivery.data,
            AmqpHandle {
                delivery_tag: delivery.delivery_tag,
                acker: delivery.acker,
            },
        )
    }
}
