use std::{
    collections::HashMap,
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    OrderPlaced,
    OrderShipmentCreated,
    OrderFulfillmentCreated,
    OrderCancelled,
    OrderCompleted,
    OrderPaymentCaptured,
    OrderUpdated,
    OrderInvoiceCreated,
    CustomerCreated,
    CustomerUpdated,
    UserPasswordReset,
    CustomerPasswordReset,
    InviteCreated,
}

impl EventType {
    pub const ALL: [EventType; 13] = [
        EventType::OrderPlaced,
        EventType::OrderShipmentCreated,
        EventType::OrderFulfillmentCreated,
        EventType::OrderCancelled,
        EventType::OrderCompleted,
        EventType::OrderPaymentCaptured,
        EventType::OrderUpdated,
        EventType::OrderInvoiceCreated,
        EventType::CustomerCreated,
        EventType::CustomerUpdated,
        EventType::UserPasswordReset,
        EventType::CustomerPasswordReset,
        EventType::InviteCreated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OrderPlaced => "order.placed",
            EventType::OrderShipmentCreated => "order.shipment_created",
            EventType::OrderFulfillmentCreated => "order.fulfillment_created",
            EventType::OrderCancelled => "order.cancelled",
            EventType::OrderCompleted => "order.completed",
            EventType::OrderPaymentCaptured => "order.payment_captured",
            EventType::OrderUpdated => "order.updated",
            EventType::OrderInvoiceCreated => "order.invoice_created",
            EventType::CustomerCreated => "customer.created",
            EventType::CustomerUpdated => "customer.updated",
            EventType::UserPasswordReset => "user.password_reset",
            EventType::CustomerPasswordReset => "customer.password_reset",
            EventType::InviteCreated => "invite.created",
        }
    }

    /// Order events carry an order id and may be muted with `no_notification`.
    pub fn is_order_event(&self) -> bool {
        self.as_str().starts_with("order.")
    }

    pub fn is_customer_event(&self) -> bool {
        matches!(self, EventType::CustomerCreated | EventType::CustomerUpdated)
    }
}

impl FromStr for EventType {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| DispatchError::UnhandledEvent(s.to_string()))
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// One occurrence of a domain event, already resolved to string fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventOccurrence {
    pub event_type: String,
    pub payload: HashMap<String, String>,
}

impl EventOccurrence {
    pub fn new(event_type: impl Into<String>, payload: HashMap<String, String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}

/// Raw event as emitted by the commerce platform's event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    #[serde(alias = "event")]
    pub event_name: String,

    #[serde(default)]
    pub data: serde_json::Value,
}
