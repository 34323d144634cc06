use std::time::Duration;

use thiserror::Error;

/// Terminal outcome of a dispatch that did not deliver.
///
/// Only `RetriesExhausted` is produced after sends were attempted; every
/// other variant short-circuits before (or instead of) the retry loop.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unhandled notification event: {0}")]
    UnhandledEvent(String),

    #[error("Payload is missing the recipient address")]
    MissingRecipient,

    #[error("Payload is missing required field '{0}'")]
    MissingRequiredField(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Delivery rejected by provider on attempt {attempts}: {reason}")]
    DeliveryRejected { attempts: u32, reason: String },

    #[error("Delivery failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Dispatch timed out after {0:?}")]
    TimedOut(Duration),
}

impl DispatchError {
    /// Stable identifier used in logs and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::UnhandledEvent(_) => "unhandled_event",
            DispatchError::MissingRecipient => "missing_recipient",
            DispatchError::MissingRequiredField(_) => "missing_required_field",
            DispatchError::TemplateNotFound(_) => "template_not_found",
            DispatchError::DeliveryRejected { .. } => "delivery_rejected",
            DispatchError::RetriesExhausted { .. } => "retries_exhausted",
            DispatchError::TimedOut(_) => "timed_out",
        }
    }

    /// Number of send attempts made before this error, zero for render failures.
    pub fn attempts(&self) -> u32 {
        match self {
            DispatchError::DeliveryRejected { attempts, .. }
            | DispatchError::RetriesExhausted { attempts, .. } => *attempts,
            _ => 0,
        }
    }

    /// Render and validation failures: the event itself is malformed.
    pub fn is_render_error(&self) -> bool {
        matches!(
            self,
            DispatchError::UnhandledEvent(_)
                | DispatchError::MissingRecipient
                | DispatchError::MissingRequiredField(_)
                | DispatchError::TemplateNotFound(_)
        )
    }
}

/// Classification of a single failed send.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("{0}")]
    Transient(String),

    #[error("{0}")]
    Fatal(String),
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Lookup backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum HandleError {
    #[error("Failed to resolve event payload: {0}")]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
