use std::sync::Arc;

use anyhow::{Error, Result};
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    clients::health::HealthChecker,
    error::DispatchError,
    models::{
        event::InboundEvent,
        health::HealthStatus,
        message::{DeliveryReceipt, RenderedMessage},
        response::ApiResponse,
    },
    subscribers::EventSubscriber,
};

pub struct AppState {
    pub health_checker: HealthChecker,
    pub subscriber: Arc<EventSubscriber>,
    pub api_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendRequest {
    pub message: RenderedMessage,

    #[serde(default)]
    pub to: Option<String>,
}

/// Event intake and manual resends require the internal bearer token;
/// health and the provider webhook stay open.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/events", post(receive_event))
        .route("/notifications/resend", post(resend_notification))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_api_token,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/webhooks/resend", post(resend_webhook))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn extract_bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

async fn require_api_token(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let authorized = extract_bearer_token(&request).map(|token| token == state.api_token);

    match authorized {
        Some(true) => Ok(next.run(request).await),
        Some(false) => {
            warn!(path = %request.uri().path(), "Invalid API token provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            warn!(path = %request.uri().path(), "Missing API token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

pub async fn run_api_server(
    server_port: u16,
    state: Arc<AppState>,
) -> Result<(), Error> {
    let addr = format!("0.0.0.0:{}", server_port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "HTTP server started");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Accepts a platform event and handles it in the background.
async fn receive_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<InboundEvent>,
) -> impl IntoResponse {
    let event_name = event.event_name.clone();
    let subscriber = Arc::clone(&state.subscriber);

    tokio::spawn(async move {
        let _ = subscriber.handle(event).await;
    });

    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(
            json!({ "event_name": event_name }),
            "Event accepted",
        )),
    )
}

async fn resend_notification(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResendRequest>,
) -> impl IntoResponse {
    let result = state
        .subscriber
        .dispatcher()
        .redispatch(&request.message, request.to.as_deref())
        .await;

    match result {
        Ok(receipt) => (
            StatusCode::OK,
            Json(ApiResponse::success(receipt, "Notification sent")),
        ),
        Err(e) => {
            let status = match e {
                DispatchError::MissingRecipient => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::BAD_GATEWAY,
            };
            (
                status,
                Json(ApiResponse::<DeliveryReceipt>::dispatch_failure(&e)),
            )
        }
    }
}

async fn resend_webhook(Json(body): Json<Value>) -> impl IntoResponse {
    info!(payload = %body, "Resend webhook received");

    (
        StatusCode::OK,
        Json(json!({ "message": "Webhook received successfully" })),
    )
}
