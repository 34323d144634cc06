use std::{collections::HashMap, sync::Arc};

use email_service::{
    clients::template::TemplateStore,
    error::DispatchError,
    models::{event::EventType, message::ContentType},
    renderer::Renderer,
    utils::{escape_html, placeholders, substitute},
};

use crate::common::{STOREFRONT_URL, UNSUBSCRIBE_URL, links, payload, renderer};

fn full_payload() -> HashMap<String, String> {
    payload(&[
        ("email", "jo@example.com"),
        ("order_id", "order_1001"),
        ("token", "tok_123"),
        ("first_name", "Jo"),
        ("last_name", "Doe"),
    ])
}

/// Test: Every supported event renders a complete message
#[tokio::test]
async fn test_every_event_type_renders_without_leftover_placeholders() {
    let renderer = renderer().await;
    let payload = full_payload();

    for event in EventType::ALL {
        let message = renderer
            .render(event.as_str(), &payload)
            .unwrap_or_else(|e| panic!("{} failed to render: {}", event, e));

        assert_eq!(message.recipient, "jo@example.com");
        assert!(!message.subject.is_empty(), "{} has empty subject", event);
        assert!(!message.body.is_empty(), "{} has empty body", event);
        assert!(
            !message.subject.contains("{{") && !message.body.contains("{{"),
            "{} left a placeholder: {}",
            event,
            message.body
        );
    }
}

/// Test: Unknown events are rejected
#[tokio::test]
async fn test_unknown_event_type_is_unhandled() {
    let renderer = renderer().await;

    let result = renderer.render("order.teleported", &full_payload());

    match result {
        Err(DispatchError::UnhandledEvent(event)) => assert_eq!(event, "order.teleported"),
        other => panic!("expected UnhandledEvent, got {:?}", other),
    }
}

/// Test: Missing or blank recipient is a caller error
#[tokio::test]
async fn test_missing_recipient() {
    let renderer = renderer().await;

    let missing = renderer.render("order.placed", &payload(&[("order_id", "1001")]));
    assert!(matches!(missing, Err(DispatchError::MissingRecipient)));

    let blank = renderer.render(
        "order.placed",
        &payload(&[("order_id", "1001"), ("email", "   ")]),
    );
    assert!(matches!(blank, Err(DispatchError::MissingRecipient)));
}

/// Test: Reset links percent-encode the raw token exactly once
#[tokio::test]
async fn test_password_reset_link_is_percent_encoded() {
    let renderer = renderer().await;

    let message = renderer
        .render(
            "user.password_reset",
            &payload(&[("email", "a@b.com"), ("token", "a b+c/=%")]),
        )
        .unwrap();

    let expected = format!("{}/password?token=a%20b%2Bc%2F%3D%25", STOREFRONT_URL);
    assert!(message.body.contains(&expected), "body: {}", message.body);
    assert!(!message.body.contains("%2520"), "token was double encoded");
    assert_eq!(message.subject, "Password Reset Request");
    assert_eq!(message.content_type, ContentType::Html);
}

/// Test: Both password reset events require a token
#[tokio::test]
async fn test_password_reset_without_token_fails_closed() {
    let renderer = renderer().await;

    for event in ["user.password_reset", "customer.password_reset"] {
        let result = renderer.render(event, &payload(&[("email", "a@b.com")]));
        match result {
            Err(DispatchError::MissingRequiredField(field)) => assert_eq!(field, "token"),
            other => panic!("expected MissingRequiredField for {}, got {:?}", event, other),
        }
    }
}

/// Test: Placeholders without a value fail the render
#[tokio::test]
async fn test_missing_template_field_fails_closed() {
    let renderer = renderer().await;

    let result = renderer.render("customer.created", &payload(&[("email", "a@b.com")]));

    match result {
        Err(DispatchError::MissingRequiredField(field)) => assert_eq!(field, "first_name"),
        other => panic!("expected MissingRequiredField, got {:?}", other),
    }
}

/// Test: Order links are built from the order id
#[tokio::test]
async fn test_order_link_and_unsubscribe_link() {
    let renderer = renderer().await;

    let message = renderer
        .render(
            "order.shipment_created",
            &payload(&[("email", "a@b.com"), ("order_id", "order 7")]),
        )
        .unwrap();

    assert!(
        message
            .body
            .contains(&format!("{}/account/orders/order%207", STOREFRONT_URL))
    );
    assert!(message.body.contains(UNSUBSCRIBE_URL));
    assert_eq!(message.subject, "Your Order Has Shipped");
}

/// Test: File templates are HTML, inline skeletons are plain text
#[tokio::test]
async fn test_content_type_follows_body_source() {
    let renderer = renderer().await;
    let payload = full_payload();

    let placed = renderer.render("order.placed", &payload).unwrap();
    assert_eq!(placed.content_type, ContentType::Html);
    assert!(placed.body.contains("order_1001"));

    let cancelled = renderer.render("order.cancelled", &payload).unwrap();
    assert_eq!(cancelled.content_type, ContentType::Plain);
    assert!(cancelled.body.contains("Your order order_1001 has been cancelled"));

    let invite = renderer.render("invite.created", &payload).unwrap();
    assert_eq!(invite.content_type, ContentType::Plain);
    assert!(invite.body.contains("/invite?token=tok_123"));
}

/// Test: A file template absent from the store is reported by name
#[tokio::test]
async fn test_template_not_found() {
    let renderer = Renderer::new(Arc::new(TemplateStore::default()), links());

    let result = renderer.render("order.placed", &full_payload());
    match result {
        Err(DispatchError::TemplateNotFound(name)) => assert_eq!(name, "order-created.html"),
        other => panic!("expected TemplateNotFound, got {:?}", other),
    }

    // Inline events do not need the store
    assert!(renderer.render("order.completed", &full_payload()).is_ok());
}

/// Test: Startup check lists each missing file template once
#[tokio::test]
async fn test_missing_templates_report() {
    let empty = Renderer::new(Arc::new(TemplateStore::default()), links());
    let mut missing = empty.missing_templates();
    missing.sort();
    assert_eq!(
        missing,
        vec!["order-created", "order-invoice", "order-shipped", "password-reset"]
    );

    assert!(renderer().await.missing_templates().is_empty());
}

/// Test: Templates injected from memory render the same way
#[tokio::test]
async fn test_in_memory_template_store() {
    let store = TemplateStore::from_entries([("order-created", "<p>Order {{ order_id }}</p>")]);
    let renderer = Renderer::new(Arc::new(store), links());

    let message = renderer.render("order.placed", &full_payload()).unwrap();

    assert_eq!(message.body, "<p>Order order_1001</p>");
}

/// Test: Payload markup is escaped in HTML bodies but links stay usable
#[tokio::test]
async fn test_html_body_escapes_payload_values() {
    let renderer = renderer().await;
    let injected = "<a href='https://evil.test'>pay here</a>";

    let message = renderer
        .render(
            "order.shipment_created",
            &payload(&[("email", "jo@example.com"), ("order_id", injected)]),
        )
        .unwrap();

    assert_eq!(message.content_type, ContentType::Html);
    assert!(!message.body.contains("<a href='https://evil.test'>"));
    assert!(
        message
            .body
            .contains("&lt;a href=&#x27;https://evil.test&#x27;&gt;pay here&lt;/a&gt;")
    );
    assert!(message.body.contains(&format!(
        "{}/account/orders/%3Ca%20href%3D%27https%3A%2F%2Fevil.test%27%3Epay%20here%3C%2Fa%3E",
        STOREFRONT_URL
    )));
    assert!(message.body.contains(UNSUBSCRIBE_URL));
}

/// Test: Plain text skeletons keep payload values as given
#[tokio::test]
async fn test_plain_body_is_not_escaped() {
    let renderer = renderer().await;

    let message = renderer
        .render(
            "order.cancelled",
            &payload(&[("email", "jo@example.com"), ("order_id", "A&B <1>")]),
        )
        .unwrap();

    assert!(message.body.contains("Your order A&B <1> has been cancelled"));
}

/// Test: All HTML-significant characters are escaped
#[test]
fn test_escape_html() {
    assert_eq!(
        escape_html(r#"Tom & "Jerry" <o'neil>"#),
        "Tom &amp; &quot;Jerry&quot; &lt;o&#x27;neil&gt;"
    );
    assert_eq!(escape_html("jo@example.com"), "jo@example.com");
}

/// Test: Substitution is literal and single pass
#[test]
fn test_substitute_is_literal() {
    let variables = payload(&[("name", "{{other}}"), ("other", "boom")]);

    assert_eq!(
        substitute("Hi {{name}}, {{unknown}} {{ other }}", &variables),
        "Hi {{other}}, {{unknown}} boom"
    );
    assert_eq!(substitute("no tokens", &variables), "no tokens");
    assert_eq!(substitute("dangling {{name", &variables), "dangling {{name");
}

/// Test: Placeholder discovery is ordered and de-duplicated
#[test]
fn test_placeholders() {
    assert_eq!(
        placeholders("{{a}} {{ b }} {{a}} {{}} {{c"),
        vec!["a", "b"]
    );
}
