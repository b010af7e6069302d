//! # Verification Message Handler
//!
//! Adapts [`SignatureValidation`] to the subscription processor. Transient
//! validator errors are nacked for redelivery; everything else is
//! dead-lettered.

use crate::ports::inbound::SignatureValidation;
use async_trait::async_trait;
use shared_bus::{HandlerError, MessageHandler};
use shared_types::SignatureValidationMessage;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct SignatureValidationMessageHandler<V: SignatureValidation> {
    validator: Arc<V>,
}

impl<V: SignatureValidation> SignatureValidationMessageHandler<V> {
    pub fn new(validator: Arc<V>) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl<V: SignatureValidation + 'static> MessageHandler<SignatureValidationMessage>
    for SignatureValidationMessageHandler<V>
{
    async fn handle(&self, message: &SignatureValidationMessage) -> Result<(), HandlerError> {
        match self.validator.validate(message).await {
            Ok(report) => {
                debug!(validation_id = %message.validation_id, ?report, "Message handled");
                Ok(())
            }
            Err(e) if e.is_transient() => {
                warn!(
                    validation_id = %message.validation_id,
                    error = %e,
                    "Transient failure, message will be redelivered"
                );
                Err(HandlerError::Transient(e.to_string()))
            }
            Err(e) => {
                error!(
                    validation_id = %message.validation_id,
                    error = %e,
                    "Permanent failure handling message"
                );
                Err(HandlerError::Permanent(e.to_string()))
            }
        }
    }
}
