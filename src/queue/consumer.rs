//! Consumer loop and connection supervisor
//!
//! `consume` drains a delivery stream one message at a time until it is
//! cancelled, the stream ends or too many acknowledgments fail in a row.
//! `Consumer` owns the broker connection and reconnects with exponential
//! backoff whenever `consume` returns for any reason other than shutdown.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::client::{QueueClient, Subscription};
use super::dispatcher::Dispatcher;
use super::envelope::{DeliveryHandle, Envelope};
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::metrics::QUEUE_RECONNECTS_TOTAL;

/// Why `consume` returned
#[derive(Debug)]
pub enum ConsumeExit {
    /// Shutdown was requested
    Cancelled,
    /// The broker closed the consumer
    StreamEnded,
    /// The delivery stream yielded an error
    StreamError(QueueError),
    /// Ack/Nack failed `consecutive` times in a row
    AckFailures { consecutive: u32 },
}

/// Process deliveries until shutdown or a broker-level failure
///
/// Cancellation is only observed between messages: a delivery that has
/// been received is always dispatched and settled.
pub async fn consume<S, H>(
    deliveries: &mut S,
    dispatcher: &Dispatcher,
    max_ack_failures: u32,
    shutdown: &CancellationToken,
) -> ConsumeExit
where
    S: Stream<Item = Result<Envelope<H>, QueueError>> + Unpin,
    H: DeliveryHandle,
{
    let max_ack_failures = max_ack_failures.max(1);
    let mut consecutive_failures = 0u32;

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return ConsumeExit::Cancelled,
            next = deliveries.next() => next,
        };

        let envelope = match next {
            Some(Ok(envelope)) => envelope,
            Some(Err(e)) => return ConsumeExit::StreamError(e),
            None => return ConsumeExit::StreamEnded,
        };

        match dispatcher.dispatch(envelope).await {
            Ok(_) => consecutive_failures = 0,
            Err(e) => {
                consecutive_failures += 1;
                warn!(
                    error = %e,
                    consecutive_failures,
                    max_ack_failures,
                    "Acknowledgment failed"
                );
                if consecutive_failures >= max_ack_failures {
                    return ConsumeExit::AckFailures {
                        consecutive: consecutive_failures,
                    };
                }
            }
        }
    }
}

/// Capped exponential backoff
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay before the next attempt; doubles after each call up to `max`
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Long-running queue consumer
///
/// Start-up errors (unreachable broker, topology failure) are returned
/// from `start`. Once running, broker failures are retried until shutdown.
pub struct Consumer {
    config: QueueConfig,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
}

impl Consumer {
    pub fn new(
        config: QueueConfig,
        dispatcher: Arc<Dispatcher>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            dispatcher,
            shutdown,
        }
    }

    /// Connect, declare topology, subscribe, then spawn the consumer task
    pub async fn start(self) -> Result<JoinHandle<()>, QueueError> {
        let (client, subscription) = self.open().await?;
        Ok(tokio::spawn(self.run(client, subscription)))
    }

    async fn open(&self) -> Result<(QueueClient, Subscription), QueueError> {
        let mut client = QueueClient::new(&self.config.url);
        client.connect().await?;

        let subscription = match self.subscribe(&client).await {
            Ok(subscription) => subscription,
            Err(e) => {
                client.close().await;
                return Err(e);
            }
        };

        Ok((client, subscription))
    }

    async fn subscribe(&self, client: &QueueClient) -> Result<Subscription, QueueError> {
        client
            .declare_and_bind(
                &self.config.queue_name,
                &self.config.exchange,
                &self.config.routing_keys,
                self.config.prefetch_count,
            )
            .await?;
        client
            .subscribe(&self.config.queue_name, &self.config.consumer_tag)
            .await
    }

    async fn run(self, mut client: QueueClient, mut subscription: Subscription) {
        let mut backoff = Backoff::new(
            Duration::from_millis(self.config.reconnect_initial_backoff_ms),
            Duration::from_millis(self.config.reconnect_max_backoff_ms),
        );

        info!(queue = %self.config.queue_name, "Queue consumer started");

        loop {
            let exit = consume(
                &mut subscription,
                &self.dispatcher,
                self.config.max_ack_failures,
                &self.shutdown,
            )
            .await;
            client.close().await;

            match exit {
                ConsumeExit::Cancelled => break,
                ConsumeExit::StreamEnded => warn!("Broker closed the consumer, reconnecting"),
                ConsumeExit::StreamError(e) => {
                    error!(error = %e, "Consumer stream failed, reconnecting")
                }
                ConsumeExit::AckFailures { consecutive } => {
                    error!(consecutive, "Too many acknowledgment failures, reconnecting")
                }
            }

            match self.reconnect(&mut backoff).await {
                Some((new_client, new_subscription)) => {
                    client = new_client;
                    subscription = new_subscription;
                }
                None => break,
            }
        }

        info!("Queue consumer stopped");
    }

    /// Retry `open` until it succeeds or shutdown is requested
    async fn reconnect(&self, backoff: &mut Backoff) -> Option<(QueueClient, Subscription)> {
        loop {
            let delay = backoff.next_delay();
            tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            QUEUE_RECONNECTS_TOTAL.inc();
            match self.open().await {
                Ok(opened) => {
                    info!("Reconnected to message broker");
                    backoff.reset();
                    return Some(opened);
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_in_ms = backoff.current.as_millis() as u64,
                        "Reconnect failed"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnroutablePolicy;
    use crate::data::MockRepository;
    use crate::queue::envelope::testing::{RecordingHandle, SettleLog, envelope, failing_envelope};
    use crate::queue::envelope::AckOutcome;

    const POST: &str =
        r#"{"id": "42", "author_id": "7", "community_id": "rust", "title": "Hello"}"#;

    fn dispatcher(repository: MockRepository) -> Dispatcher {
        Dispatcher::new(
            Arc::new(repository),
            Duration::from_secs(5),
            UnroutablePolicy::Reject,
        )
    }

    fn stream(
        items: Vec<Envelope<RecordingHandle>>,
    ) -> impl Stream<Item = Result<Envelope<RecordingHandle>, QueueError>> + Unpin {
        futures::stream::iter(items.into_iter().map(Ok))
    }

    #[tokio::test]
    async fn drains_stream_and_reports_end() {
        let mut repository = MockRepository::new();
        repository.expect_upsert_post().times(2).returning(|_| Ok(()));
        let dispatcher = dispatcher(repository);
        let log = SettleLog::default();
        let mut deliveries = stream(vec![
            envelope(1, "post.created", POST, &log),
            envelope(2, "post.created", "not json", &log),
            envelope(3, "post.updated", POST, &log),
        ]);

        let exit = consume(&mut deliveries, &dispatcher, 3, &CancellationToken::new()).await;

        assert!(matches!(exit, ConsumeExit::StreamEnded));
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                (1, AckOutcome::Ack),
                (2, AckOutcome::Nack { requeue: true }),
                (3, AckOutcome::Ack)
            ]
        );
    }

    #[tokio::test]
    async fn stops_after_consecutive_ack_failures() {
        let mut repository = MockRepository::new();
        repository.expect_upsert_post().returning(|_| Ok(()));
        let dispatcher = dispatcher(repository);
        let log = SettleLog::default();
        let mut deliveries = stream(vec![
            failing_envelope(1, "post.created", POST),
            envelope(2, "post.created", POST, &log),
            failing_envelope(3, "post.created", POST),
            failing_envelope(4, "post.created", POST),
            envelope(5, "post.created", POST, &log),
        ]);

        let exit = consume(&mut deliveries, &dispatcher, 2, &CancellationToken::new()).await;

        assert!(matches!(exit, ConsumeExit::AckFailures { consecutive: 2 }));
        assert_eq!(*log.lock().unwrap(), vec![(2, AckOutcome::Ack)]);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_next_delivery() {
        let dispatcher = dispatcher(MockRepository::new());
        let log = SettleLog::default();
        let mut deliveries = stream(vec![envelope(1, "post.created", POST, &log)]);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let exit = consume(&mut deliveries, &dispatcher, 3, &shutdown).await;

        assert!(matches!(exit, ConsumeExit::Cancelled));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stream_error_ends_consumption() {
        let dispatcher = dispatcher(MockRepository::new());
        let mut deliveries = futures::stream::iter(vec![Err::<Envelope<RecordingHandle>, _>(
            QueueError::NotConnected,
        )]);

        let exit = consume(&mut deliveries, &dispatcher, 3, &CancellationToken::new()).await;

        assert!(matches!(exit, ConsumeExit::StreamError(QueueError::NotConnected)));
    }

    #[test]
    fn backoff_doubles_up_to_max_and_resets() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(350));

        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(350));
        assert_eq!(backoff.next_delay(), Duration::from_millis(350));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn start_fails_when_broker_is_unreachable() {
        let mut config = crate::config::tests::valid_config().queue;
        config.url = "amqp://127.0.0.1:1/%2f".to_string();
        let consumer = Consumer::new(
            config,
            Arc::new(dispatcher(MockRepository::new())),
            CancellationToken::new(),
        );

        let result = consumer.start().await;

        assert!(matches!(result, Err(QueueError::Connection(_))));
    }
}
