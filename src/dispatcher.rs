use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::{
    error::{DispatchError, SendError},
    models::{
        message::{DeliveryReceipt, RenderedMessage},
        retry::RetryConfig,
    },
    renderer::Renderer,
    utils::{RetryError, retry_with_fixed_delay},
};

/// Outbound delivery of one rendered message.
///
/// Returns the provider's message id when it reports one.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &RenderedMessage) -> Result<Option<String>, SendError>;
}

pub struct Dispatcher {
    renderer: Renderer,
    sender: Arc<dyn EmailSender>,
    retry_config: RetryConfig,
}

impl Dispatcher {
    pub fn new(renderer: Renderer, sender: Arc<dyn EmailSender>, retry_config: RetryConfig) -> Self {
        info!(
            max_attempts = retry_config.max_attempts,
            delay_ms = retry_config.delay_ms,
            "Dispatcher initialized"
        );

        Self {
            renderer,
            sender,
            retry_config,
        }
    }

    pub async fn dispatch(
        &self,
        event_type: &str,
        payload: &HashMap<String, String>,
    ) -> Result<DeliveryReceipt, DispatchError> {
        let message = match self.renderer.render(event_type, payload) {
            Ok(message) => message,
            Err(e) => {
                error!(
                    event_type,
                    recipient = payload.get("email").map(String::as_str).unwrap_or("<none>"),
                    error_kind = e.kind(),
                    error = %e,
                    "Notification could not be rendered, nothing sent"
                );
                return Err(e);
            }
        };

        self.deliver(event_type, &message).await
    }

    /// Sends an already rendered message again, optionally to another address.
    pub async fn redispatch(
        &self,
        previous: &RenderedMessage,
        override_recipient: Option<&str>,
    ) -> Result<DeliveryReceipt, DispatchError> {
        let message = match override_recipient.map(str::trim).filter(|to| !to.is_empty()) {
            Some(to) => previous.clone().with_recipient(to),
            None => previous.clone(),
        };

        if message.recipient.trim().is_empty() {
            return Err(DispatchError::MissingRecipient);
        }

        self.deliver("redispatch", &message).await
    }

    /// `dispatch` bounded by a deadline; an in-flight attempt is dropped on expiry.
    pub async fn dispatch_with_timeout(
        &self,
        event_type: &str,
        payload: &HashMap<String, String>,
        limit: Duration,
    ) -> Result<DeliveryReceipt, DispatchError> {
        match timeout(limit, self.dispatch(event_type, payload)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(event_type, timeout_ms = limit.as_millis() as u64, "Dispatch timed out");
                Err(DispatchError::TimedOut(limit))
            }
        }
    }

    async fn deliver(
        &self,
        event_type: &str,
        message: &RenderedMessage,
    ) -> Result<DeliveryReceipt, DispatchError> {
        let sender = &self.sender;

        let result = retry_with_fixed_delay(&self.retry_config, |attempt| async move {
            let outcome = sender.send(message).await;
            match &outcome {
                Ok(_) => info!(
                    event_type,
                    recipient = %message.recipient,
                    attempt,
                    "Delivery attempt succeeded"
                ),
                Err(e) => warn!(
                    event_type,
                    recipient = %message.recipient,
                    attempt,
                    error = %e,
                    "Delivery attempt failed"
                ),
            }
            outcome
        })
        .await;

        match result {
            Ok(retried) => {
                let attempts = retried.trace.len() as u32;
                info!(
                    event_type,
                    recipient = %message.recipient,
                    attempts,
                    "Notification sent successfully"
                );
                Ok(DeliveryReceipt::success(
                    message.recipient.clone(),
                    attempts,
                    retried.value,
                ))
            }
            Err(RetryError::Exhausted { trace, last_error }) => {
                let attempts = trace.len() as u32;
                error!(
                    event_type,
                    recipient = %message.recipient,
                    subject = %message.subject,
                    attempts,
                    error = %last_error,
                    "Notification failed after exhausting all attempts"
                );
                Err(DispatchError::RetriesExhausted {
                    attempts,
                    last_error: last_error.to_string(),
                })
            }
            Err(RetryError::Fatal { trace, error: e }) => {
                let attempts = trace.len() as u32;
                error!(
                    event_type,
                    recipient = %message.recipient,
                    subject = %message.subject,
                    attempts,
                    error = %e,
                    "Notification rejected by delivery provider"
                );
                Err(DispatchError::DeliveryRejected {
                    attempts,
                    reason: e.to_string(),
                })
            }
        }
    }
}
