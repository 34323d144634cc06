use std::{collections::HashMap, str::FromStr, sync::Arc};

use tracing::debug;

use crate::{
    clients::template::TemplateStore,
    config::Config,
    error::DispatchError,
    models::{
        event::EventType,
        message::{ContentType, RenderedMessage},
        template::Template,
    },
    utils::{escape_html, path_link, placeholders, substitute, token_link},
};

pub const RECIPIENT_FIELD: &str = "email";

enum BodySource {
    File(&'static str),
    Inline(&'static str),
}

#[derive(Clone, Copy)]
enum DeepLink {
    PasswordReset,
    Invite,
    Order,
}

struct NotificationSpec {
    subject: &'static str,
    body: BodySource,
    links: &'static [DeepLink],
}

const ORDER_FULFILLED_BODY: &str = "Hi,

Good news! Items from your order {{order_id}} have been fulfilled and are being prepared for shipment.

View your order: {{order_link}}

Unsubscribe: {{unsubscribe_link}}
";

const ORDER_CANCELLED_BODY: &str = "Hi,

Your order {{order_id}} has been cancelled. If you did not request this, please reply to this email.

View your order: {{order_link}}

Unsubscribe: {{unsubscribe_link}}
";

const ORDER_COMPLETED_BODY: &str = "Hi,

Your order {{order_id}} is complete. Thank you for shopping with Boujee Botanical!

View your order: {{order_link}}

Unsubscribe: {{unsubscribe_link}}
";

const PAYMENT_CAPTURED_BODY: &str = "Hi,

We have received your payment for order {{order_id}}.

View your order: {{order_link}}

Unsubscribe: {{unsubscribe_link}}
";

const ORDER_UPDATED_BODY: &str = "Hi,

Your order {{order_id}} has been updated. Review the latest details in your account.

View your order: {{order_link}}

Unsubscribe: {{unsubscribe_link}}
";

const CUSTOMER_CREATED_BODY: &str = "Hi {{first_name}},

Welcome to Boujee Botanical! Your account for {{email}} is ready.

Unsubscribe: {{unsubscribe_link}}
";

const CUSTOMER_UPDATED_BODY: &str = "Hi,

The account details for {{email}} were updated. If you did not make this change, reset your password right away.

Unsubscribe: {{unsubscribe_link}}
";

const INVITE_BODY: &str = "Hi,

You have been invited to join the Boujee Botanical team. Accept the invitation here:

{{invite_link}}
";

fn notification_spec(event: EventType) -> NotificationSpec {
    match event {
        EventType::OrderPlaced => NotificationSpec {
            subject: "Order Confirmation",
            body: BodySource::File("order-created"),
            links: &[],
        },
        EventType::OrderShipmentCreated => NotificationSpec {
            subject: "Your Order Has Shipped",
            body: BodySource::File("order-shipped"),
            links: &[DeepLink::Order],
        },
        EventType::OrderInvoiceCreated => NotificationSpec {
            subject: "Your Invoice",
            body: BodySource::File("order-invoice"),
            links: &[],
        },
        EventType::OrderFulfillmentCreated => NotificationSpec {
            subject: "Your Order Is Being Prepared",
            body: BodySource::Inline(ORDER_FULFILLED_BODY),
            links: &[DeepLink::Order],
        },
        EventType::OrderCancelled => NotificationSpec {
            subject: "Your Order Has Been Cancelled",
            body: BodySource::Inline(ORDER_CANCELLED_BODY),
            links: &[DeepLink::Order],
        },
        EventType::OrderCompleted => NotificationSpec {
            subject: "Your Order Is Complete",
            body: BodySource::Inline(ORDER_COMPLETED_BODY),
            links: &[DeepLink::Order],
        },
        EventType::OrderPaymentCaptured => NotificationSpec {
            subject: "Payment Received",
            body: BodySource::Inline(PAYMENT_CAPTURED_BODY),
            links: &[DeepLink::Order],
        },
        EventType::OrderUpdated => NotificationSpec {
            subject: "Your Order Has Been Updated",
            body: BodySource::Inline(ORDER_UPDATED_BODY),
            links: &[DeepLink::Order],
        },
        EventType::CustomerCreated => NotificationSpec {
            subject: "Welcome to Boujee Botanical",
            body: BodySource::Inline(CUSTOMER_CREATED_BODY),
            links: &[],
        },
        EventType::CustomerUpdated => NotificationSpec {
            subject: "Your Account Was Updated",
            body: BodySource::Inline(CUSTOMER_UPDATED_BODY),
            links: &[],
        },
        EventType::UserPasswordReset => NotificationSpec {
            subject: "Password Reset Request",
            body: BodySource::File("password-reset"),
            links: &[DeepLink::PasswordReset],
        },
        EventType::CustomerPasswordReset => NotificationSpec {
            subject: "Reset Your Password",
            body: BodySource::File("password-reset"),
            links: &[DeepLink::PasswordReset],
        },
        EventType::InviteCreated => NotificationSpec {
            subject: "You've Been Invited",
            body: BodySource::Inline(INVITE_BODY),
            links: &[DeepLink::Invite],
        },
    }
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub storefront_url: String,
    pub unsubscribe_url: String,
}

impl LinkConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            storefront_url: config.storefront_url.clone(),
            unsubscribe_url: config.unsubscribe_url.clone(),
        }
    }
}

/// Turns an event type and payload into a rendered email.
///
/// File templates render as HTML with payload values escaped; inline
/// skeletons render as plain text. Every `{{placeholder}}` must resolve.
#[derive(Debug, Clone)]
pub struct Renderer {
    templates: Arc<TemplateStore>,
    links: LinkConfig,
}

impl Renderer {
    pub fn new(templates: Arc<TemplateStore>, links: LinkConfig) -> Self {
        Self { templates, links }
    }

    /// File templates referenced by the mapping table but absent from the store.
    pub fn missing_templates(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        for event in EventType::ALL {
            if let BodySource::File(name) = notification_spec(event).body {
                if !self.templates.contains(name) && !missing.contains(&name) {
                    missing.push(name);
                }
            }
        }
        missing
    }

    pub fn template_for(&self, event: EventType) -> Result<Template, DispatchError> {
        let spec = notification_spec(event);

        let (name, body_pattern, content_type) = match spec.body {
            BodySource::File(name) => {
                let body = self
                    .templates
                    .get(name)
                    .ok_or_else(|| DispatchError::TemplateNotFound(format!("{}.html", name)))?;
                (name.to_string(), body.to_string(), ContentType::Html)
            }
            BodySource::Inline(body) => {
                (event.as_str().to_string(), body.to_string(), ContentType::Plain)
            }
        };

        Ok(Template {
            name,
            subject_pattern: spec.subject.to_string(),
            body_pattern,
            content_type,
        })
    }

    pub fn render(
        &self,
        event_type: &str,
        payload: &HashMap<String, String>,
    ) -> Result<RenderedMessage, DispatchError> {
        let event = EventType::from_str(event_type)?;

        let recipient = payload
            .get(RECIPIENT_FIELD)
            .map(|email| email.trim())
            .filter(|email| !email.is_empty())
            .ok_or(DispatchError::MissingRecipient)?
            .to_string();

        let template = self.template_for(event)?;
        let variables = self.variables_for(event, payload, template.content_type)?;

        for pattern in [&template.subject_pattern, &template.body_pattern] {
            if let Some(missing) = placeholders(pattern)
                .into_iter()
                .find(|name| !variables.contains_key(*name))
            {
                return Err(DispatchError::MissingRequiredField(missing.to_string()));
            }
        }

        debug!(
            event_type,
            template = %template.name,
            variable_count = variables.len(),
            "Rendering notification"
        );

        Ok(RenderedMessage {
            recipient,
            subject: substitute(&template.subject_pattern, &variables),
            body: substitute(&template.body_pattern, &variables),
            content_type: template.content_type,
        })
    }

    fn variables_for(
        &self,
        event: EventType,
        payload: &HashMap<String, String>,
        content_type: ContentType,
    ) -> Result<HashMap<String, String>, DispatchError> {
        // Links and the unsubscribe URL are inserted after escaping.
        let mut variables: HashMap<String, String> = match content_type {
            ContentType::Html => payload
                .iter()
                .map(|(name, value)| (name.clone(), escape_html(value)))
                .collect(),
            ContentType::Plain => payload.clone(),
        };
        variables.insert(
            "unsubscribe_link".to_string(),
            self.links.unsubscribe_url.clone(),
        );

        for link in notification_spec(event).links {
            let (name, value) = match link {
                DeepLink::PasswordReset => {
                    let token = required(payload, "token")?;
                    let url = token_link(&self.links.storefront_url, "/password", "token", token);
                    ("reset_link", url)
                }
                DeepLink::Invite => {
                    let token = required(payload, "token")?;
                    let url = token_link(&self.links.storefront_url, "/invite", "token", token);
                    ("invite_link", url)
                }
                DeepLink::Order => {
                    let order_id = required(payload, "order_id")?;
                    let url = path_link(&self.links.storefront_url, "/account/orders", order_id);
                    ("order_link", url)
                }
            };
            variables.insert(name.to_string(), value);
        }

        Ok(variables)
    }
}

fn required<'a>(payload: &'a HashMap<String, String>, field: &str) -> Result<&'a str, DispatchError> {
    payload
        .get(field)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| DispatchError::MissingRequiredField(field.to_string()))
}
