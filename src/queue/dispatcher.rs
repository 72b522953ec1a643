//! Routing of deliveries to workers
//!
//! The dispatcher owns the acknowledgment policy:
//! - worker success → Ack
//! - worker failure → Nack with requeue
//! - worker timeout → Nack without requeue (dead-letter if configured)
//! - unknown routing key → per `UnroutablePolicy`
//!
//! Every delivery handed to `dispatch` is settled at most once.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use super::envelope::{AckOutcome, DeliveryHandle, Envelope};
use super::routing;
use crate::config::UnroutablePolicy;
use crate::data::Repository;
use crate::error::QueueError;
use crate::metrics::{
    QUEUE_ACK_FAILURES_TOTAL, QUEUE_MESSAGES_TOTAL, QUEUE_PROCESSING_DURATION_SECONDS,
    QUEUE_PROCESSING_ERRORS_TOTAL,
};

/// What happened to a dispatched delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed and acknowledged
    Acked,
    /// Worker failed; returned to the queue
    Requeued,
    /// Discarded (timeout or unroutable with `reject`)
    Rejected,
    /// Left unsettled (unroutable with `ignore`)
    Unsettled,
}

impl Disposition {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Acked => "acked",
            Self::Requeued => "requeued",
            Self::Rejected => "rejected",
            Self::Unsettled => "unsettled",
        }
    }
}

pub struct Dispatcher {
    repository: Arc<dyn Repository>,
    processing_timeout: Duration,
    unroutable: UnroutablePolicy,
}

impl Dispatcher {
    pub fn new(
        repository: Arc<dyn Repository>,
        processing_timeout: Duration,
        unroutable: UnroutablePolicy,
    ) -> Self {
        Self {
            repository,
            processing_timeout,
            unroutable,
        }
    }

    /// Route one delivery to its worker and settle it
    ///
    /// Worker failures never surface here. The only error is a failed
    /// Ack/Nack, which the consumer loop counts toward reconnecting.
    pub async fn dispatch<H: DeliveryHandle>(
        &self,
        envelope: Envelope<H>,
    ) -> Result<Disposition, QueueError> {
        let Some(route) = routing::lookup(envelope.routing_key()) else {
            return self.handle_unroutable(envelope).await;
        };

        let delivery_tag = envelope.delivery_tag();
        let worker = (route.build)(self.repository.clone());

        let timer = QUEUE_PROCESSING_DURATION_SECONDS
            .with_label_values(&[route.key])
            .start_timer();
        let result =
            tokio::time::timeout(self.processing_timeout, worker.process(envelope.body())).await;
        timer.observe_duration();

        let (outcome, disposition) = match result {
            Ok(Ok(())) => {
                debug!(routing_key = route.key, delivery_tag, "Message processed");
                (AckOutcome::Ack, Disposition::Acked)
            }
            Ok(Err(e)) => {
                warn!(
                    routing_key = route.key,
                    delivery_tag,
                    kind = e.kind(),
                    error = %e,
                    "Message processing failed, requeueing"
                );
                QUEUE_PROCESSING_ERRORS_TOTAL
                    .with_label_values(&[e.kind()])
                    .inc();
                (AckOutcome::Nack { requeue: true }, Disposition::Requeued)
            }
            Err(_) => {
                error!(
                    routing_key = route.key,
                    delivery_tag,
                    timeout_secs = self.processing_timeout.as_secs_f64(),
                    "Message processing timed out, rejecting"
                );
                QUEUE_PROCESSING_ERRORS_TOTAL
                    .with_label_values(&["timeout"])
                    .inc();
                (AckOutcome::Nack { requeue: false }, Disposition::Rejected)
            }
        };

        settle(envelope, outcome).await?;
        QUEUE_MESSAGES_TOTAL
            .with_label_values(&[route.key, disposition.as_str()])
            .inc();
        Ok(disposition)
    }

    async fn handle_unroutable<H: DeliveryHandle>(
        &self,
        envelope: Envelope<H>,
    ) -> Result<Disposition, QueueError> {
        warn!(
            routing_key = %envelope.routing_key(),
            delivery_tag = envelope.delivery_tag(),
            policy = ?self.unroutable,
            "No worker registered for routing key"
        );

        let disposition = match self.unroutable {
            UnroutablePolicy::Ignore => {
                envelope.abandon();
                Disposition::Unsettled
            }
            UnroutablePolicy::Reject => {
                settle(envelope, AckOutcome::Nack { requeue: false }).await?;
                Disposition::Rejected
            }
            UnroutablePolicy::Requeue => {
                settle(envelope, AckOutcome::Nack { requeue: true }).await?;
                Disposition::Requeued
            }
        };

        QUEUE_MESSAGES_TOTAL
            .with_label_values(&["unroutable", disposition.as_str()])
            .inc();
        Ok(disposition)
    }
}

async fn settle<H: DeliveryHandle>(
    envelope: Envelope<H>,
    outcome: AckOutcome,
) -> Result<(), QueueError> {
    envelope.settle(outcome).await.inspect_err(|e| {
        QUEUE_ACK_FAILURES_TOTAL.inc();
        error!(error = %e, ?outcome, "Failed to settle delivery");
    })
}
