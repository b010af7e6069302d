//! # Queue Adapters
//!
//! [`KvMessageQueue`] keeps the verification queue in the job's key-value
//! store, so messages that are waiting or leased when the process exits are
//! delivered again after a restart. [`ConfiguredQueue`] picks the store-backed
//! or the in-memory queue from configuration.
//!
//! ## Layout
//!
//! - `queue:message:{message_id}` → JSON [`StoredMessage`]
//!
//! Message ids are UUIDv7, so a prefix scan returns messages in send order.
//! Every state change is a compare-and-swap on the message's own key. Lease
//! expiry is wall-clock time, so a lease held by a process that died expires
//! for its successor.
//!
//! ```text
//! send ──→ Ready ──receive──→ Leased ──ack──────────→ Acked (deleted)
//!            ▲                  │  └──dead_letter──→ DeadLettered
//!            └──nack / expiry───┘
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pv_01_validator_state::{KVStoreError, KeyValueStore, SystemTimeSource, TimeSource};
use pv_telemetry::QUEUE_DEAD_LETTERS;
use serde::{Deserialize, Serialize};
use shared_bus::{BrokeredMessage, DeadLetter, InMemoryQueue, Lease, MessageQueue, QueueError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

const MESSAGE_PREFIX: &str = "queue:message:";

fn message_key(message_id: Uuid) -> Vec<u8> {
    format!("{}{}", MESSAGE_PREFIX, message_id).into_bytes()
}

fn unavailable(error: KVStoreError) -> QueueError {
    QueueError::Unavailable(error.to_string())
}

/// Delivery state of a stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum Delivery {
    Ready,
    Leased {
        lease_id: Uuid,
        locked_until: DateTime<Utc>,
    },
    DeadLettered {
        reason: String,
    },
    /// Settled, awaiting deletion.
    Acked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredMessage {
    message_id: Uuid,
    body: Vec<u8>,
    /// Deliveries so far.
    delivery_count: u32,
    delivery: Delivery,
}

impl StoredMessage {
    fn is_receivable(&self, now: DateTime<Utc>) -> bool {
        match &self.delivery {
            Delivery::Ready => true,
            Delivery::Leased { locked_until, .. } => *locked_until <= now,
            Delivery::DeadLettered { .. } | Delivery::Acked => false,
        }
    }

    fn is_leased(&self, now: DateTime<Utc>) -> bool {
        matches!(&self.delivery, Delivery::Leased { locked_until, .. } if *locked_until > now)
    }
}

/// Outcome of one pass over the stored messages.
enum Poll {
    Leased(Lease),
    /// Nothing receivable. Carries the earliest expiry of a current lease.
    Idle(Option<DateTime<Utc>>),
}

/// One stored message with the exact bytes it was read from.
struct Entry {
    key: Vec<u8>,
    raw: Vec<u8>,
    message: StoredMessage,
}

// =============================================================================
// STORE-BACKED QUEUE
// =============================================================================

/// Durable [`MessageQueue`] over a [`KeyValueStore`].
pub struct KvMessageQueue<S: KeyValueStore> {
    store: Arc<S>,
    clock: Arc<dyn TimeSource>,
    available: Notify,
    visibility_timeout: Duration,
    lease_duration: chrono::Duration,
}

impl<S: KeyValueStore> KvMessageQueue<S> {
    pub fn new(store: Arc<S>, visibility_timeout: Duration) -> Self {
        Self {
            store,
            clock: Arc::new(SystemTimeSource),
            available: Notify::new(),
            visibility_timeout,
            lease_duration: chrono::Duration::from_std(visibility_timeout)
                .unwrap_or_else(|_| chrono::Duration::days(3650)),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Every stored message in send order. Undecodable records are skipped.
    fn scan(&self) -> Result<Vec<Entry>, QueueError> {
        let mut entries = Vec::new();
        for (key, raw) in self
            .store
            .prefix_scan(MESSAGE_PREFIX.as_bytes())
            .map_err(unavailable)?
        {
            match serde_json::from_slice::<StoredMessage>(&raw) {
                Ok(message) => entries.push(Entry { key, raw, message }),
                Err(e) => warn!(
                    key = %String::from_utf8_lossy(&key),
                    error = %e,
                    "Skipping undecodable queue record"
                ),
            }
        }
        Ok(entries)
    }

    fn encode(message: &StoredMessage) -> Result<Vec<u8>, QueueError> {
        serde_json::to_vec(message).map_err(|e| QueueError::Unavailable(e.to_string()))
    }

    /// Lease the oldest receivable message, or report when the earliest
    /// current lease expires.
    fn try_lease(&self) -> Result<Poll, QueueError> {
        let now = self.clock.now();
        let mut next_expiry: Option<DateTime<Utc>> = None;

        for entry in self.scan()? {
            let Entry { key, raw, message } = entry;
            match &message.delivery {
                Delivery::Acked => {
                    // Left behind by an ack whose delete failed.
                    let _ = self.store.delete(&key);
                    continue;
                }
                Delivery::Leased { locked_until, .. } if *locked_until > now => {
                    next_expiry = Some(next_expiry.map_or(*locked_until, |t| t.min(*locked_until)));
                    continue;
                }
                _ if !message.is_receivable(now) => continue,
                _ => {}
            }

            if matches!(message.delivery, Delivery::Leased { .. }) {
                debug!(
                    message_id = %message.message_id,
                    delivery_count = message.delivery_count,
                    "Lease expired"
                );
            }

            let lease_id = Uuid::new_v4();
            let next = StoredMessage {
                delivery_count: message.delivery_count + 1,
                delivery: Delivery::Leased {
                    lease_id,
                    locked_until: now + self.lease_duration,
                },
                ..message
            };
            if self
                .store
                .compare_and_swap(&key, Some(&raw), &Self::encode(&next)?)
                .map_err(unavailable)?
            {
                return Ok(Poll::Leased(Lease::new(
                    lease_id,
                    BrokeredMessage {
                        message_id: next.message_id,
                        body: next.body,
                    },
                    next.delivery_count,
                    Instant::now() + self.visibility_timeout,
                )));
            }
            debug!(message_id = %next.message_id, "Message leased concurrently, skipping");
        }

        Ok(Poll::Idle(next_expiry))
    }

    /// Move a message out of the lease `lease` holds. Fails with `LeaseLost`
    /// if the lease expired or was settled.
    fn settle(&self, lease: &Lease, delivery: Delivery) -> Result<StoredMessage, QueueError> {
        let message_id = lease.message_id();
        let key = message_key(message_id);
        let lost = || QueueError::LeaseLost { message_id };

        let raw = self.store.get(&key).map_err(unavailable)?.ok_or_else(lost)?;
        let current: StoredMessage = serde_json::from_slice(&raw)
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;

        let now = self.clock.now();
        match &current.delivery {
            Delivery::Leased {
                lease_id,
                locked_until,
            } if *lease_id == lease.lease_id() && *locked_until > now => {}
            _ => return Err(lost()),
        }

        let next = StoredMessage {
            delivery,
            ..current
        };
        if !self
            .store
            .compare_and_swap(&key, Some(&raw), &Self::encode(&next)?)
            .map_err(unavailable)?
        {
            return Err(lost());
        }
        Ok(next)
    }

    /// Messages waiting for delivery, expired leases included.
    pub fn len(&self) -> Result<usize, QueueError> {
        let now = self.clock.now();
        Ok(self
            .scan()?
            .iter()
            .filter(|entry| entry.message.is_receivable(now))
            .count())
    }

    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }

    /// Messages currently leased.
    pub fn in_flight(&self) -> Result<usize, QueueError> {
        let now = self.clock.now();
        Ok(self
            .scan()?
            .iter()
            .filter(|entry| entry.message.is_leased(now))
            .count())
    }

    pub fn pending_bodies(&self) -> Result<Vec<Vec<u8>>, QueueError> {
        let now = self.clock.now();
        Ok(self
            .scan()?
            .into_iter()
            .filter(|entry| entry.message.is_receivable(now))
            .map(|entry| entry.message.body)
            .collect())
    }

    pub fn dead_letters(&self) -> Result<Vec<DeadLetter>, QueueError> {
        Ok(self
            .scan()?
            .into_iter()
            .filter_map(|entry| Self::as_dead_letter(entry.message))
            .collect())
    }

    /// Remove and return every dead-lettered message.
    pub fn take_dead_letters(&self) -> Result<Vec<DeadLetter>, QueueError> {
        let mut drained = Vec::new();
        for entry in self.scan()? {
            if let Some(dead) = Self::as_dead_letter(entry.message) {
                self.store.delete(&entry.key).map_err(unavailable)?;
                QUEUE_DEAD_LETTERS.dec();
                drained.push(dead);
            }
        }
        Ok(drained)
    }

    fn as_dead_letter(message: StoredMessage) -> Option<DeadLetter> {
        match message.delivery {
            Delivery::DeadLettered { reason } => Some(DeadLetter {
                message: BrokeredMessage {
                    message_id: message.message_id,
                    body: message.body,
                },
                reason,
                delivery_count: message.delivery_count,
            }),
            _ => None,
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> MessageQueue for KvMessageQueue<S> {
    async fn send(&self, body: Vec<u8>) -> Result<Uuid, QueueError> {
        let message_id = Uuid::now_v7();
        let message = StoredMessage {
            message_id,
            body,
            delivery_count: 0,
            delivery: Delivery::Ready,
        };
        self.store
            .put(&message_key(message_id), &Self::encode(&message)?)
            .map_err(unavailable)?;
        self.available.notify_waiters();
        debug!(message_id = %message_id, "Message stored");
        Ok(message_id)
    }

    async fn receive(&self, max_wait: Duration) -> Result<Option<Lease>, QueueError> {
        let deadline = Instant::now() + max_wait;

        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next_expiry = match self.try_lease()? {
                Poll::Leased(lease) => return Ok(Some(lease)),
                Poll::Idle(next_expiry) => next_expiry,
            };

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let wake_at = next_expiry
                .map(|expiry| {
                    let wait = (expiry - self.clock.now()).to_std().unwrap_or(Duration::ZERO);
                    (now + wait).min(deadline)
                })
                .unwrap_or(deadline);
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn ack(&self, lease: &Lease) -> Result<(), QueueError> {
        self.settle(lease, Delivery::Acked)?;
        if let Err(e) = self.store.delete(&message_key(lease.message_id())) {
            warn!(message_id = %lease.message_id(), error = %e, "Acked message not deleted");
        }
        debug!(message_id = %lease.message_id(), "Message acknowledged");
        Ok(())
    }

    async fn nack(&self, lease: &Lease) -> Result<(), QueueError> {
        self.settle(lease, Delivery::Ready)?;
        self.available.notify_waiters();
        debug!(message_id = %lease.message_id(), "Message released for redelivery");
        Ok(())
    }

    async fn dead_letter(&self, lease: &Lease, reason: &str) -> Result<(), QueueError> {
        let settled = self.settle(
            lease,
            Delivery::DeadLettered {
                reason: reason.to_string(),
            },
        )?;
        QUEUE_DEAD_LETTERS.inc();
        warn!(
            message_id = %lease.message_id(),
            delivery_count = settled.delivery_count,
            reason,
            "Message dead-lettered"
        );
        Ok(())
    }
}

// =============================================================================
// CONFIGURED QUEUE
// =============================================================================

/// Queue chosen at startup.
pub enum ConfiguredQueue<S: KeyValueStore> {
    InMemory(InMemoryQueue),
    Store(KvMessageQueue<S>),
}

impl<S: KeyValueStore> ConfiguredQueue<S> {
    pub fn backend_name(&self) -> &'static str {
        match self {
            ConfiguredQueue::InMemory(_) => "memory",
            ConfiguredQueue::Store(_) => "store",
        }
    }

    fn inner(&self) -> &dyn MessageQueue {
        match self {
            ConfiguredQueue::InMemory(queue) => queue,
            ConfiguredQueue::Store(queue) => queue,
        }
    }

    pub fn len(&self) -> Result<usize, QueueError> {
        match self {
            ConfiguredQueue::InMemory(queue) => Ok(queue.len()),
            ConfiguredQueue::Store(queue) => queue.len(),
        }
    }

    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }

    pub fn in_flight(&self) -> Result<usize, QueueError> {
        match self {
            ConfiguredQueue::InMemory(queue) => Ok(queue.in_flight()),
            ConfiguredQueue::Store(queue) => queue.in_flight(),
        }
    }

    pub fn pending_bodies(&self) -> Result<Vec<Vec<u8>>, QueueError> {
        match self {
            ConfiguredQueue::InMemory(queue) => Ok(queue.pending_bodies()),
            ConfiguredQueue::Store(queue) => queue.pending_bodies(),
        }
    }

    pub fn dead_letters(&self) -> Result<Vec<DeadLetter>, QueueError> {
        match self {
            ConfiguredQueue::InMemory(queue) => Ok(queue.dead_letters()),
            ConfiguredQueue::Store(queue) => queue.dead_letters(),
        }
    }

    pub fn take_dead_letters(&self) -> Result<Vec<DeadLetter>, QueueError> {
        match self {
            ConfiguredQueue::InMemory(queue) => Ok(queue.take_dead_letters()),
            ConfiguredQueue::Store(queue) => queue.take_dead_letters(),
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> MessageQueue for ConfiguredQueue<S> {
    async fn send(&self, body: Vec<u8>) -> Result<Uuid, QueueError> {
        self.inner().send(body).await
    }

    async fn receive(&self, max_wait: Duration) -> Result<Option<Lease>, QueueError> {
        self.inner().receive(max_wait).await
    }

    async fn ack(&self, lease: &Lease) -> Result<(), QueueError> {
        self.inner().ack(lease).await
    }

    async fn nack(&self, lease: &Lease) -> Result<(), QueueError> {
        self.inner().nack(lease).await
    }

    async fn dead_letter(&self, lease: &Lease, reason: &str) -> Result<(), QueueError> {
        self.inner().dead_letter(lease, reason).await
    }
}
