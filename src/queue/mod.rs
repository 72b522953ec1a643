//! Message queue consumption
//!
//! Deliveries flow through three layers:
//! - `QueueClient`: AMQP connection, topology and subscription (lapin)
//! - `consume` / `Consumer`: the receive loop and reconnect supervisor
//! - `Dispatcher`: routing-key lookup, worker invocation and Ack/Nack

mod client;
mod consumer;
mod dispatcher;
mod envelope;
pub mod routing;

pub use client::{QueueClient, Subscription};
pub use consumer::{Backoff, ConsumeExit, Consumer, consume};
pub use dispatcher::{Dispatcher, Disposition};
pub use envelope::{AckOutcome, AmqpHandle, DeliveryHandle, Envelope};
