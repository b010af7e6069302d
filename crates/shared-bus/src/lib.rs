//! # Shared Bus - Queue Plumbing for the Validation Pipeline
//!
//! The orchestrator and the verification workers never call each other
//! directly. The orchestrator publishes a verification trigger to a durable
//! queue and workers consume it.
//!
//! ```text
//! ┌──────────────┐    send()     ┌──────────────┐   receive()   ┌──────────────────────┐
//! │ Orchestrator │ ────────────▶ │ MessageQueue │ ────────────▶ │ SubscriptionProcessor│
//! └──────────────┘               └──────────────┘  ack / nack   │   └─ MessageHandler  │
//!                                        ▲         dead_letter  └──────────────────────┘
//!                                        └───────────────────────────────┘
//! ```
//!
//! ## Delivery
//!
//! - **At-least-once:** leases expire and messages are redelivered
//! - **Versioned envelope:** schema name + version wrap every body
//! - **Dead Letter Queue:** undecodable and permanently failing messages

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod processor;
pub mod queue;
pub mod serializer;

// Re-export main types
pub use processor::{
    HandlerError, MessageHandler, ProcessorConfig, ProcessorError, SubscriptionProcessor,
};
pub use queue::{
    BrokeredMessage, DeadLetter, InMemoryQueue, Lease, MessageQueue, QueueError,
    DEFAULT_VISIBILITY_TIMEOUT,
};
pub use serializer::{
    EnvelopeSerializer, MessageSerializer, SchemaMessage, SerializationError,
    SignatureValidationMessageSerializer,
};

/// Default number of deliveries before a message is dead-lettered.
pub const DEFAULT_MAX_DELIVERY_COUNT: u32 = 10;
