use std::{collections::HashMap, str::FromStr, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::{
    dispatcher::Dispatcher,
    error::{HandleError, LookupError},
    models::{
        customer::{Customer, Order},
        event::{EventOccurrence, EventType, InboundEvent},
        message::DeliveryReceipt,
    },
    renderer::RECIPIENT_FIELD,
};

#[async_trait]
pub trait OrderLookup: Send + Sync {
    async fn retrieve_order(&self, order_id: &str) -> Result<Order, LookupError>;
}

#[async_trait]
pub trait CustomerLookup: Send + Sync {
    async fn retrieve_customer(&self, customer_id: &str) -> Result<Customer, LookupError>;
}

#[derive(Debug)]
pub enum HandleOutcome {
    Delivered(DeliveryReceipt),
    Skipped(&'static str),
}

/// Normalizes loosely shaped platform events into occurrences with a
/// resolved recipient before dispatching them.
pub struct EventSubscriber {
    dispatcher: Arc<Dispatcher>,
    orders: Option<Arc<dyn OrderLookup>>,
    customers: Option<Arc<dyn CustomerLookup>>,
}

impl EventSubscriber {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            orders: None,
            customers: None,
        }
    }

    pub fn with_lookups(
        mut self,
        orders: Arc<dyn OrderLookup>,
        customers: Arc<dyn CustomerLookup>,
    ) -> Self {
        self.orders = Some(orders);
        self.customers = Some(customers);
        self
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Resolves and dispatches one platform event. Failures are logged here
    /// and also returned so callers can report them; nothing is re-queued.
    pub async fn handle(&self, event: InboundEvent) -> Result<HandleOutcome, HandleError> {
        let trace_id = Uuid::new_v4();
        let span = info_span!("event", %trace_id, event_name = %event.event_name);

        async move {
            let occurrence = match self.resolve(&event).await {
                Ok(Some(occurrence)) => occurrence,
                Ok(None) => {
                    info!("Notification is disabled for this order, skipping");
                    return Ok(HandleOutcome::Skipped("no_notification"));
                }
                Err(e) => {
                    error!(error = %e, "Failed to resolve event payload, event dropped");
                    return Err(e);
                }
            };

            let receipt = self
                .dispatcher
                .dispatch(&occurrence.event_type, &occurrence.payload)
                .await?;

            Ok(HandleOutcome::Delivered(receipt))
        }
        .instrument(span)
        .await
    }

    /// Builds the occurrence for `event`, or `None` when the event opted out.
    pub async fn resolve(&self, event: &InboundEvent) -> Result<Option<EventOccurrence>, HandleError> {
        let kind = EventType::from_str(&event.event_name).ok();
        let mut payload = flatten_payload(&event.data);

        match kind {
            Some(kind) if kind.is_order_event() => {
                if event.data.get("no_notification").and_then(Value::as_bool) == Some(true) {
                    return Ok(None);
                }

                for alias in ["orderId", "id"] {
                    if payload.contains_key("order_id") {
                        break;
                    }
                    if let Some(value) = payload.get(alias).cloned() {
                        payload.insert("order_id".to_string(), value);
                    }
                }

                if !payload.contains_key(RECIPIENT_FIELD) {
                    if let Some(order_id) = payload.get("order_id").cloned() {
                        self.fill_from_order(&order_id, &mut payload).await?;
                    }
                }
            }
            Some(kind) if kind.is_customer_event() => {
                if !payload.contains_key(RECIPIENT_FIELD) {
                    if let Some(customer_id) = payload.get("id").cloned() {
                        self.fill_from_customer(&customer_id, &mut payload).await?;
                    }
                }
            }
            Some(EventType::InviteCreated) => {
                if !payload.contains_key(RECIPIENT_FIELD) {
                    if let Some(email) = payload.get("user_email").cloned() {
                        payload.insert(RECIPIENT_FIELD.to_string(), email);
                    }
                }
            }
            _ => {}
        }

        Ok(Some(EventOccurrence::new(event.event_name.clone(), payload)))
    }

    async fn fill_from_order(
        &self,
        order_id: &str,
        payload: &mut HashMap<String, String>,
    ) -> Result<(), HandleError> {
        let Some(orders) = &self.orders else {
            warn!(order_id, "No order lookup configured, cannot resolve recipient");
            return Ok(());
        };

        let order = orders.retrieve_order(order_id).await?;
        let customer_id = order.customer_id.ok_or_else(|| LookupError::NotFound {
            entity: "customer for order",
            id: order.id.clone(),
        })?;

        self.fill_from_customer(&customer_id, payload).await
    }

    async fn fill_from_customer(
        &self,
        customer_id: &str,
        payload: &mut HashMap<String, String>,
    ) -> Result<(), HandleError> {
        let Some(customers) = &self.customers else {
            warn!(customer_id, "No customer lookup configured, cannot resolve recipient");
            return Ok(());
        };

        let customer = customers.retrieve_customer(customer_id).await?;
        debug!(customer_id, email = %customer.email, "Retrieved customer");

        payload
            .entry(RECIPIENT_FIELD.to_string())
            .or_insert(customer.email);
        if let Some(first_name) = customer.first_name {
            payload.entry("first_name".to_string()).or_insert(first_name);
        }
        if let Some(last_name) = customer.last_name {
            payload.entry("last_name".to_string()).or_insert(last_name);
        }

        Ok(())
    }
}

/// Stringifies the scalar top-level fields of an event's data object.
pub fn flatten_payload(data: &Value) -> HashMap<String, String> {
    let Some(object) = data.as_object() else {
        return HashMap::new();
    };

    object
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null | Value::Array(_) | Value::Object(_) => return None,
            };
            Some((key.clone(), value))
        })
        .collect()
}
