//! # Message Serializer
//!
//! Messages travel inside a JSON envelope that names the schema and its
//! version, so producers and consumers on different versions can interoperate:
//!
//! ```json
//! {"schema_name": "SignatureValidationMessageData", "schema_version": 1, "body": {...}}
//! ```
//!
//! Unknown body fields are ignored. A different schema name or a newer version
//! is a permanent failure and the message is dead-lettered by the processor.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_types::SignatureValidationMessage;
use std::marker::PhantomData;
use thiserror::Error;

/// Serialization errors. None of them are retryable.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Unknown schema '{found}', expected '{expected}'")]
    UnknownSchema { found: String, expected: String },

    #[error("Unsupported schema version {found}, newest supported is {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// A message type with a stable schema identity.
pub trait SchemaMessage: Serialize + DeserializeOwned + Send + Sync {
    const SCHEMA_NAME: &'static str;
    const SCHEMA_VERSION: u32;
}

impl SchemaMessage for SignatureValidationMessage {
    const SCHEMA_NAME: &'static str = SignatureValidationMessage::SCHEMA_NAME;
    const SCHEMA_VERSION: u32 = SignatureValidationMessage::SCHEMA_VERSION;
}

/// Converts messages to and from queue bodies.
pub trait MessageSerializer<T>: Send + Sync {
    fn serialize(&self, message: &T) -> Result<Vec<u8>, SerializationError>;
    fn deserialize(&self, body: &[u8]) -> Result<T, SerializationError>;
}

#[derive(Serialize, Deserialize)]
struct Envelope<B> {
    schema_name: String,
    schema_version: u32,
    body: B,
}

/// JSON envelope serializer for any [`SchemaMessage`].
pub struct EnvelopeSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> EnvelopeSerializer<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for EnvelopeSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SchemaMessage> MessageSerializer<T> for EnvelopeSerializer<T> {
    fn serialize(&self, message: &T) -> Result<Vec<u8>, SerializationError> {
        let envelope = Envelope {
            schema_name: T::SCHEMA_NAME.to_string(),
            schema_version: T::SCHEMA_VERSION,
            body: message,
        };
        serde_json::to_vec(&envelope).map_err(|e| SerializationError::Malformed(e.to_string()))
    }

    fn deserialize(&self, body: &[u8]) -> Result<T, SerializationError> {
        let envelope: Envelope<serde_json::Value> = serde_json::from_slice(body)
            .map_err(|e| SerializationError::Malformed(e.to_string()))?;

        if envelope.schema_name != T::SCHEMA_NAME {
            return Err(SerializationError::UnknownSchema {
                found: envelope.schema_name,
                expected: T::SCHEMA_NAME.to_string(),
            });
        }
        if envelope.schema_version > T::SCHEMA_VERSION {
            return Err(SerializationError::UnsupportedVersion {
                found: envelope.schema_version,
                supported: T::SCHEMA_VERSION,
            });
        }

        serde_json::from_value(envelope.body)
            .map_err(|e| SerializationError::Malformed(e.to_string()))
    }
}

/// Serializer for the verification trigger.
pub type SignatureValidationMessageSerializer = EnvelopeSerializer<SignatureValidationMessage>;
