use serde::{Deserialize, Serialize};

use crate::models::status::DeliveryStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Html,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub content_type: ContentType,
}

impl RenderedMessage {
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = recipient.into();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub recipient: String,
    pub status: DeliveryStatus,
    pub attempts: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl DeliveryReceipt {
    pub fn success(recipient: String, attempts: u32, message_id: Option<String>) -> Self {
        Self {
            recipient,
            status: DeliveryStatus::Success,
            attempts,
            message_id,
        }
    }
}
