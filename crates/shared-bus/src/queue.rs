//! # Message Queue
//!
//! Minimal capability interface over a message broker: `send`, `receive` a
//! lease, then settle the lease with `ack`, `nack` or `dead_letter`.
//!
//! ## Delivery Contract
//!
//! - A received message is invisible to other receivers until its lease
//!   expires (`visibility_timeout`).
//! - An expired lease makes the message receivable again with
//!   `delivery_count + 1`. Settling an expired lease fails with
//!   [`QueueError::LeaseLost`].
//! - Delivery is at-least-once. Consumers must be idempotent.

use async_trait::async_trait;
use parking_lot::Mutex;
use pv_telemetry::QUEUE_DEAD_LETTERS;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default lease duration for received messages.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(300);

/// Queue errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The lease expired or was already settled.
    #[error("Lease lost for message {message_id}")]
    LeaseLost { message_id: Uuid },

    /// The broker could not be reached.
    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}

impl QueueError {
    pub fn is_transient(&self) -> bool {
        matches!(self, QueueError::Unavailable(_))
    }
}

/// A message as stored by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokeredMessage {
    pub message_id: Uuid,
    pub body: Vec<u8>,
}

/// Exclusive, time-limited right to settle one delivery of a message.
#[derive(Debug, Clone)]
pub struct Lease {
    lease_id: Uuid,
    message: BrokeredMessage,
    delivery_count: u32,
    locked_until: Instant,
}

impl Lease {
    pub fn new(
        lease_id: Uuid,
        message: BrokeredMessage,
        delivery_count: u32,
        locked_until: Instant,
    ) -> Self {
        Self {
            lease_id,
            message,
            delivery_count,
            locked_until,
        }
    }

    pub fn lease_id(&self) -> Uuid {
        self.lease_id
    }

    pub fn message_id(&self) -> Uuid {
        self.message.message_id
    }

    pub fn body(&self) -> &[u8] {
        &self.message.body
    }

    /// Number of times this message has been delivered, this delivery included.
    pub fn delivery_count(&self) -> u32 {
        self.delivery_count
    }

    pub fn locked_until(&self) -> Instant {
        self.locked_until
    }
}

/// A message moved to the dead-letter queue.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub message: BrokeredMessage,
    pub reason: String,
    pub delivery_count: u32,
}

/// Queue capability used by producers and the subscription processor.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Publish a message. Returns the broker-assigned message id.
    async fn send(&self, body: Vec<u8>) -> Result<Uuid, QueueError>;

    /// Wait up to `max_wait` for a message. `Ok(None)` on timeout.
    async fn receive(&self, max_wait: Duration) -> Result<Option<Lease>, QueueError>;

    /// Remove the message permanently.
    async fn ack(&self, lease: &Lease) -> Result<(), QueueError>;

    /// Release the lease so the message is redelivered.
    async fn nack(&self, lease: &Lease) -> Result<(), QueueError>;

    /// Move the message to the dead-letter queue.
    async fn dead_letter(&self, lease: &Lease, reason: &str) -> Result<(), QueueError>;
}

// =============================================================================
// IN-MEMORY QUEUE
// =============================================================================

struct LeasedEntry {
    lease_id: Uuid,
    message: BrokeredMessage,
    delivery_count: u32,
    locked_until: Instant,
}

#[derive(Default)]
struct QueueState {
    /// Messages waiting for delivery, with their delivery count so far.
    ready: VecDeque<(BrokeredMessage, u32)>,
    /// Messages currently leased, by message id.
    leased: HashMap<Uuid, LeasedEntry>,
    dead_letters: Vec<DeadLetter>,
}

impl QueueState {
    /// Return expired leases to the ready queue.
    fn reap_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<Uuid> = self
            .leased
            .iter()
            .filter(|(_, entry)| entry.locked_until <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            if let Some(entry) = self.leased.remove(id) {
                debug!(message_id = %id, delivery_count = entry.delivery_count, "Lease expired");
                self.ready.push_back((entry.message, entry.delivery_count));
            }
        }
        expired.len()
    }

    /// Remove the lease if it is still the current, unexpired one.
    fn take_lease(&mut self, lease: &Lease, now: Instant) -> Result<LeasedEntry, QueueError> {
        self.reap_expired(now);
        let message_id = lease.message_id();
        match self.leased.get(&message_id) {
            Some(entry) if entry.lease_id == lease.lease_id => {}
            _ => return Err(QueueError::LeaseLost { message_id }),
        }
        self.leased
            .remove(&message_id)
            .ok_or(QueueError::LeaseLost { message_id })
    }
}

/// Single-process queue with visibility-timeout leases.
///
/// Suitable for tests and single-node operation. A distributed deployment
/// implements [`MessageQueue`] over a durable broker.
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
    available: Notify,
    visibility_timeout: Duration,
    messages_sent: AtomicU64,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::with_visibility_timeout(DEFAULT_VISIBILITY_TIMEOUT)
    }

    pub fn with_visibility_timeout(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Notify::new(),
            visibility_timeout,
            messages_sent: AtomicU64::new(0),
        }
    }

    /// Messages waiting for delivery.
    pub fn len(&self) -> usize {
        self.state.lock().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages currently leased.
    pub fn in_flight(&self) -> usize {
        self.state.lock().leased.len()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().dead_letters.clone()
    }

    /// Remove and return every dead-lettered message.
    pub fn take_dead_letters(&self) -> Vec<DeadLetter> {
        let drained = std::mem::take(&mut self.state.lock().dead_letters);
        QUEUE_DEAD_LETTERS.sub(drained.len() as f64);
        drained
    }

    /// Total messages ever sent.
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    /// Snapshot of the bodies waiting for delivery.
    pub fn pending_bodies(&self) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .ready
            .iter()
            .map(|(message, _)| message.body.clone())
            .collect()
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn send(&self, body: Vec<u8>) -> Result<Uuid, QueueError> {
        let message_id = Uuid::new_v4();
        self.state
            .lock()
            .ready
            .push_back((BrokeredMessage { message_id, body }, 0));
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.available.notify_waiters();
        debug!(message_id = %message_id, "Message sent");
        Ok(message_id)
    }

    async fn receive(&self, max_wait: Duration) -> Result<Option<Lease>, QueueError> {
        let deadline = Instant::now() + max_wait;

        loop {
            // Register interest before inspecting state so a concurrent send
            // between the check and the wait is not missed.
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let now = Instant::now();
            let next_expiry = {
                let mut state = self.state.lock();
                state.reap_expired(now);

                if let Some((message, previous_deliveries)) = state.ready.pop_front() {
                    let lease = Lease {
                        lease_id: Uuid::new_v4(),
                        message: message.clone(),
                        delivery_count: previous_deliveries + 1,
                        locked_until: now + self.visibility_timeout,
                    };
                    state.leased.insert(
                        message.message_id,
                        LeasedEntry {
                            lease_id: lease.lease_id,
                            message,
                            delivery_count: lease.delivery_count,
                            locked_until: lease.locked_until,
                        },
                    );
                    return Ok(Some(lease));
                }

                state.leased.values().map(|entry| entry.locked_until).min()
            };

            if now >= deadline {
                return Ok(None);
            }

            let wake_at = next_expiry.map_or(deadline, |expiry| expiry.min(deadline));
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn ack(&self, lease: &Lease) -> Result<(), QueueError> {
        self.state.lock().take_lease(lease, Instant::now())?;
        debug!(message_id = %lease.message_id(), "Message acknowledged");
        Ok(())
    }

    async fn nack(&self, lease: &Lease) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock();
            let entry = state.take_lease(lease, Instant::now())?;
            state
                .ready
                .push_back((entry.message, entry.delivery_count));
        }
        self.available.notify_waiters();
        debug!(message_id = %lease.message_id(), "Message released for redelivery");
        Ok(())
    }

    async fn dead_letter(&self, lease: &Lease, reason: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock();
        let entry = state.take_lease(lease, Instant::now())?;
        warn!(
            message_id = %lease.message_id(),
            delivery_count = entry.delivery_count,
            reason,
            "Message dead-lettered"
        );
        state.dead_letters.push(DeadLetter {
            message: entry.message,
            reason: reason.to_string(),
            delivery_count: entry.delivery_count,
        });
        QUEUE_DEAD_LETTERS.inc();
        Ok(())
    }
}
