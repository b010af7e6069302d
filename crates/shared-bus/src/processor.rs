//! # Subscription Processor
//!
//! Concurrent message pump: receive a lease, deserialize, dispatch to the
//! registered handler and settle the lease from the handler's outcome.
//!
//! ## Settlement
//!
//! | Outcome | Settlement |
//! |---------|------------|
//! | `Ok(())` | ack |
//! | `HandlerError::Transient` | nack (redelivery) |
//! | `HandlerError::Permanent` | dead-letter |
//! | deserialization failure | dead-letter |
//! | `delivery_count > max_delivery_count` | dead-letter |
//!
//! ## Lifecycle
//!
//! `start()` spawns the pump and returns immediately. `shutdown(timeout)`
//! stops receiving, then waits up to `timeout` for in-flight handlers. Leases
//! held by handlers that do not finish expire and are redelivered elsewhere.

use crate::queue::{Lease, MessageQueue};
use crate::serializer::MessageSerializer;
use async_trait::async_trait;
use parking_lot::Mutex;
use pv_telemetry::metrics::HistogramTimer;
use pv_telemetry::{HANDLER_DURATION, MESSAGES_IN_FLIGHT, MESSAGES_RECEIVED, MESSAGES_SETTLED};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Error returned by a message handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Infrastructure failure. The message is redelivered.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// The message can never be processed. The message is dead-lettered.
    #[error("Permanent failure: {0}")]
    Permanent(String),
}

/// Handles one decoded message.
#[async_trait]
pub trait MessageHandler<T>: Send + Sync {
    async fn handle(&self, message: &T) -> Result<(), HandlerError>;
}

/// Processor errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("Processor already started")]
    AlreadyStarted,

    #[error("Processor has been shut down")]
    ShutDown,
}

/// Processor configuration.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Maximum handlers running at once.
    pub max_concurrent_calls: usize,
    /// How long one receive call waits for a message.
    pub receive_wait: Duration,
    /// Deliveries allowed before a message is dead-lettered unprocessed.
    pub max_delivery_count: u32,
    /// Pause after a failed receive.
    pub receive_error_backoff: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: num_cpus::get().max(1),
            receive_wait: Duration::from_secs(5),
            max_delivery_count: crate::DEFAULT_MAX_DELIVERY_COUNT,
            receive_error_backoff: Duration::from_secs(1),
        }
    }
}

struct ProcessorInner<T, Q, S, H> {
    queue: Arc<Q>,
    serializer: Arc<S>,
    handler: Arc<H>,
    config: ProcessorConfig,
    permits: Arc<Semaphore>,
    in_flight: AtomicUsize,
    drained: Notify,
    _message: PhantomData<fn() -> T>,
}

/// Counts a message as in flight for as long as it is alive.
struct InFlightGuard<T, Q, S, H> {
    inner: Arc<ProcessorInner<T, Q, S, H>>,
}

impl<T, Q, S, H> InFlightGuard<T, Q, S, H> {
    fn new(inner: Arc<ProcessorInner<T, Q, S, H>>) -> Self {
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        MESSAGES_IN_FLIGHT.inc();
        Self { inner }
    }
}

impl<T, Q, S, H> Drop for InFlightGuard<T, Q, S, H> {
    fn drop(&mut self) {
        MESSAGES_IN_FLIGHT.dec();
        if self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.drained.notify_waiters();
        }
    }
}

/// Pulls messages from a queue and dispatches them to a handler.
pub struct SubscriptionProcessor<T, Q, S, H> {
    inner: Arc<ProcessorInner<T, Q, S, H>>,
    shutdown_tx: watch::Sender<bool>,
    pump: Mutex<Option<JoinHandle<()>>>,
    started: Mutex<bool>,
}

impl<T, Q, S, H> SubscriptionProcessor<T, Q, S, H>
where
    T: Send + Sync + 'static,
    Q: MessageQueue + 'static,
    S: MessageSerializer<T> + 'static,
    H: MessageHandler<T> + 'static,
{
    pub fn new(queue: Arc<Q>, serializer: Arc<S>, handler: Arc<H>, config: ProcessorConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let permits = Arc::new(Semaphore::new(config.max_concurrent_calls.max(1)));
        Self {
            inner: Arc::new(ProcessorInner {
                queue,
                serializer,
                handler,
                config,
                permits,
                in_flight: AtomicUsize::new(0),
                drained: Notify::new(),
                _message: PhantomData,
            }),
            shutdown_tx,
            pump: Mutex::new(None),
            started: Mutex::new(false),
        }
    }

    /// Start pulling messages. Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), ProcessorError> {
        let mut started = self.started.lock();
        if *started {
            return Err(ProcessorError::AlreadyStarted);
        }
        if *self.shutdown_tx.borrow() {
            return Err(ProcessorError::ShutDown);
        }
        *started = true;

        let inner = self.inner.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        *self.pump.lock() = Some(tokio::spawn(run_pump(inner, shutdown_rx)));

        info!(
            max_concurrent_calls = self.inner.config.max_concurrent_calls,
            "Subscription processor started"
        );
        Ok(())
    }

    /// Stop receiving and wait up to `timeout` for in-flight handlers.
    ///
    /// Returns `true` if every handler finished within the deadline.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.shutdown_tx.send_replace(true);

        let pump = self.pump.lock().take();
        if let Some(pump) = pump {
            if tokio::time::timeout_at(deadline, pump).await.is_err() {
                warn!("Message pump did not stop before the shutdown deadline");
            }
        }

        loop {
            let drained = self.inner.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();

            if self.inner.in_flight.load(Ordering::SeqCst) == 0 {
                info!("Subscription processor drained");
                return true;
            }
            if tokio::time::timeout_at(deadline, drained).await.is_err() {
                let remaining = self.number_of_messages_in_progress();
                if remaining == 0 {
                    return true;
                }
                debug!(in_progress = remaining, "Shutdown deadline reached");
                return false;
            }
        }
    }

    /// Messages currently being handled.
    pub fn number_of_messages_in_progress(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        *self.started.lock() && !*self.shutdown_tx.borrow()
    }
}

async fn run_pump<T, Q, S, H>(
    inner: Arc<ProcessorInner<T, Q, S, H>>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    T: Send + Sync + 'static,
    Q: MessageQueue + 'static,
    S: MessageSerializer<T> + 'static,
    H: MessageHandler<T> + 'static,
{
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // Hold a permit before receiving so no lease waits on a busy pool
        let permit = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            permit = inner.permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let received = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            received = inner.queue.receive(inner.config.receive_wait) => received,
        };

        match received {
            Ok(Some(lease)) => {
                let guard = InFlightGuard::new(inner.clone());
                let inner = inner.clone();
                tokio::spawn(async move {
                    process_lease(&inner, lease).await;
                    drop(permit);
                    drop(guard);
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Failed to receive message");
                drop(permit);
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(inner.config.receive_error_backoff) => {}
                }
            }
        }
    }
    debug!("Message pump stopped");
}

async fn process_lease<T, Q, S, H>(inner: &ProcessorInner<T, Q, S, H>, lease: Lease)
where
    Q: MessageQueue,
    S: MessageSerializer<T>,
    H: MessageHandler<T>,
{
    let _timer = HistogramTimer::new(&HANDLER_DURATION);
    MESSAGES_RECEIVED.inc();

    let message_id = lease.message_id();
    let delivery_count = lease.delivery_count();

    if delivery_count > inner.config.max_delivery_count {
        let reason = format!(
            "delivery count {} exceeds maximum {}",
            delivery_count, inner.config.max_delivery_count
        );
        settle_dead_letter(inner, &lease, &reason).await;
        return;
    }

    let message = match inner.serializer.deserialize(lease.body()) {
        Ok(message) => message,
        Err(e) => {
            settle_dead_letter(inner, &lease, &e.to_string()).await;
            return;
        }
    };

    debug!(message_id = %message_id, delivery_count, "Dispatching message");

    match inner.handler.handle(&message).await {
        Ok(()) => match inner.queue.ack(&lease).await {
            Ok(()) => MESSAGES_SETTLED.with_label_values(&["completed"]).inc(),
            Err(e) => warn!(message_id = %message_id, error = %e, "Failed to acknowledge message"),
        },
        Err(HandlerError::Transient(reason)) => {
            warn!(
                message_id = %message_id,
                delivery_count,
                reason = %reason,
                "Transient handler failure, message will be redelivered"
            );
            match inner.queue.nack(&lease).await {
                Ok(()) => MESSAGES_SETTLED.with_label_values(&["retried"]).inc(),
                Err(e) => warn!(message_id = %message_id, error = %e, "Failed to release message"),
            }
        }
        Err(HandlerError::Permanent(reason)) => {
            error!(message_id = %message_id, reason = %reason, "Permanent handler failure");
            settle_dead_letter(inner, &lease, &reason).await;
        }
    }
}

async fn settle_dead_letter<T, Q, S, H>(
    inner: &ProcessorInner<T, Q, S, H>,
    lease: &Lease,
    reason: &str,
) where
    Q: MessageQueue,
{
    match inner.queue.dead_letter(lease, reason).await {
        Ok(()) => MESSAGES_SETTLED.with_label_values(&["dead_lettered"]).inc(),
        Err(e) => warn!(
            message_id = %lease.message_id(),
            error = %e,
            "Failed to dead-letter message"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryQueue;
    use crate::serializer::SerializationError;
    use std::sync::atomic::{AtomicBool, AtomicU32};

    /// Plain UTF-8 serializer for tests.
    struct TextSerializer;

    impl MessageSerializer<String> for TextSerializer {
        fn serialize(&self, message: &String) -> Result<Vec<u8>, SerializationError> {
            Ok(message.as_bytes().to_vec())
        }

        fn deserialize(&self, body: &[u8]) -> Result<String, SerializationError> {
            String::from_utf8(body.to_vec()).map_err(|e| SerializationError::Malformed(e.to_string()))
        }
    }

    /// Handler scripted by message text.
    #[derive(Default)]
    struct ScriptedHandler {
        seen: Mutex<Vec<String>>,
        calls: AtomicU32,
        released: AtomicBool,
    }

    #[async_trait]
    impl MessageHandler<String> for ScriptedHandler {
        async fn handle(&self, message: &String) -> Result<(), HandlerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(message.clone());
            match message.as_str() {
                "flaky" if call == 0 => Err(HandlerError::Transient("storage timeout".into())),
                "poison" => Err(HandlerError::Permanent("unsupported".into())),
                "stuck" => {
                    while !self.released.load(Ordering::SeqCst) {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                    Ok(())
                }
                _ => Ok(()),
            }
        }
    }

    fn processor(
        queue: Arc<InMemoryQueue>,
        handler: Arc<ScriptedHandler>,
        max_concurrent_calls: usize,
    ) -> SubscriptionProcessor<String, InMemoryQueue, TextSerializer, ScriptedHandler> {
        SubscriptionProcessor::new(
            queue,
            Arc::new(TextSerializer),
            handler,
            ProcessorConfig {
                max_concurrent_calls,
                receive_wait: Duration::from_millis(20),
                max_delivery_count: 3,
                receive_error_backoff: Duration::from_millis(10),
            },
        )
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    /// Test: Successful messages are acknowledged and the processor drains
    #[tokio::test]
    async fn test_processes_and_acks() {
        let queue = Arc::new(InMemoryQueue::new());
        let handler = Arc::new(ScriptedHandler::default());
        queue.send(b"a".to_vec()).await.unwrap();
        queue.send(b"b".to_vec()).await.unwrap();

        let processor = processor(queue.clone(), handler.clone(), 4);
        processor.start().unwrap();

        wait_until(|| handler.seen.lock().len() == 2).await;
        assert!(processor.shutdown(Duration::from_secs(1)).await);
        assert!(queue.is_empty());
        assert_eq!(queue.in_flight(), 0);
        assert!(queue.dead_letters().is_empty());
    }

    /// Test: Transient failure leads to redelivery and eventual success
    #[tokio::test]
    async fn test_transient_failure_redelivered() {
        let queue = Arc::new(InMemoryQueue::new());
        let handler = Arc::new(ScriptedHandler::default());
        queue.send(b"flaky".to_vec()).await.unwrap();

        let processor = processor(queue.clone(), handler.clone(), 1);
        processor.start().unwrap();

        wait_until(|| handler.calls.load(Ordering::SeqCst) == 2).await;
        assert!(processor.shutdown(Duration::from_secs(1)).await);
        assert!(queue.is_empty());
        assert!(queue.dead_letters().is_empty());
    }

    /// Test: Permanent failure dead-letters the message
    #[tokio::test]
    async fn test_permanent_failure_dead_lettered() {
        let queue = Arc::new(InMemoryQueue::new());
        let handler = Arc::new(ScriptedHandler::default());
        queue.send(b"poison".to_vec()).await.unwrap();

        let processor = processor(queue.clone(), handler.clone(), 1);
        processor.start().unwrap();

        wait_until(|| queue.dead_letters().len() == 1).await;
        assert!(processor.shutdown(Duration::from_secs(1)).await);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.dead_letters()[0].reason, "unsupported");
    }

    /// Test: Undecodable body is dead-lettered without reaching the handler
    #[tokio::test]
    async fn test_undecodable_dead_lettered() {
        let queue = Arc::new(InMemoryQueue::new());
        let handler = Arc::new(ScriptedHandler::default());
        queue.send(vec![0xff, 0xfe]).await.unwrap();

        let processor = processor(queue.clone(), handler.clone(), 1);
        processor.start().unwrap();

        wait_until(|| queue.dead_letters().len() == 1).await;
        assert!(processor.shutdown(Duration::from_secs(1)).await);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    /// Test: Message past the delivery limit is dead-lettered unprocessed
    #[tokio::test]
    async fn test_max_delivery_count() {
        let queue = Arc::new(InMemoryQueue::new());
        queue.send(b"a".to_vec()).await.unwrap();

        // Burn three deliveries
        for _ in 0..3 {
            let lease = queue
                .receive(Duration::from_millis(10))
                .await
                .unwrap()
                .unwrap();
            queue.nack(&lease).await.unwrap();
        }

        let handler = Arc::new(ScriptedHandler::default());
        let processor = processor(queue.clone(), handler.clone(), 1);
        processor.start().unwrap();

        wait_until(|| queue.dead_letters().len() == 1).await;
        assert!(processor.shutdown(Duration::from_secs(1)).await);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(queue.dead_letters()[0].delivery_count, 4);
    }

    /// Test: Shutdown with stuck handlers reports not drained and the in-flight count
    #[tokio::test]
    async fn test_shutdown_timeout_with_stuck_handlers() {
        let queue = Arc::new(InMemoryQueue::new());
        let handler = Arc::new(ScriptedHandler::default());
        for _ in 0..5 {
            queue.send(b"stuck".to_vec()).await.unwrap();
        }

        let processor = processor(queue.clone(), handler.clone(), 8);
        processor.start().unwrap();
        wait_until(|| processor.number_of_messages_in_progress() == 5).await;

        let drained = processor.shutdown(Duration::from_millis(200)).await;
        assert!(!drained);
        assert_eq!(processor.number_of_messages_in_progress(), 5);
        assert!(!processor.is_running());
    }

    /// Test: Concurrency never exceeds max_concurrent_calls
    #[tokio::test]
    async fn test_concurrency_bounded() {
        let queue = Arc::new(InMemoryQueue::new());
        let handler = Arc::new(ScriptedHandler::default());
        for _ in 0..4 {
            queue.send(b"stuck".to_vec()).await.unwrap();
        }

        let processor = processor(queue.clone(), handler.clone(), 2);
        processor.start().unwrap();
        wait_until(|| processor.number_of_messages_in_progress() == 2).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(processor.number_of_messages_in_progress(), 2);
        assert_eq!(queue.len(), 2);

        // Release the stuck handlers; the rest get processed
        handler.released.store(true, Ordering::SeqCst);
        wait_until(|| handler.calls.load(Ordering::SeqCst) == 4).await;
        wait_until(|| processor.number_of_messages_in_progress() == 0).await;
        assert!(processor.shutdown(Duration::from_secs(1)).await);
    }

    /// Test: Second start is rejected
    #[tokio::test]
    async fn test_start_twice() {
        let queue = Arc::new(InMemoryQueue::new());
        let processor = processor(queue, Arc::new(ScriptedHandler::default()), 1);
        processor.start().unwrap();
        assert_eq!(processor.start(), Err(ProcessorError::AlreadyStarted));
        assert!(processor.shutdown(Duration::from_secs(1)).await);
    }
}
