use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info};

use crate::{
    config::Config,
    dispatcher::EmailSender,
    error::SendError,
    models::{
        message::{ContentType, RenderedMessage},
        resend::{ResendEmailRequest, ResendResponse},
    },
};

pub struct ResendClient {
    http_client: Client,
    api_url: String,
    api_key: String,
    sender_address: String,
    fail_fast_on_client_errors: bool,
}

impl ResendClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.delivery_timeout_seconds))
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(
            api_url = %config.resend_api_url,
            sender = %config.sender_address,
            "Resend client initialized"
        );

        Ok(Self {
            http_client,
            api_url: config.resend_api_url.clone(),
            api_key: config.resend_api_key.clone(),
            sender_address: config.sender_address.clone(),
            fail_fast_on_client_errors: config.fail_fast_on_client_errors,
        })
    }

    fn build_request(&self, message: &RenderedMessage) -> ResendEmailRequest {
        let (html, text) = match message.content_type {
            ContentType::Html => (Some(message.body.clone()), None),
            ContentType::Plain => (None, Some(message.body.clone())),
        };

        ResendEmailRequest {
            from: self.sender_address.clone(),
            to: vec![message.recipient.clone()],
            subject: message.subject.clone(),
            html,
            text,
        }
    }

    /// Maps a non-2xx status to a send error.
    ///
    /// Everything is transient unless fail-fast is enabled, in which case
    /// 4xx responses other than 408 and 429 end the retry loop.
    fn classify(&self, status: StatusCode, body: String) -> SendError {
        let reason = format!("Resend request failed with status {}: {}", status, body);

        let permanent = status.is_client_error()
            && status != StatusCode::REQUEST_TIMEOUT
            && status != StatusCode::TOO_MANY_REQUESTS;

        if self.fail_fast_on_client_errors && permanent {
            SendError::Fatal(reason)
        } else {
            SendError::Transient(reason)
        }
    }
}

#[async_trait]
impl EmailSender for ResendClient {
    async fn send(&self, message: &RenderedMessage) -> Result<Option<String>, SendError> {
        debug!(
            recipient = %message.recipient,
            subject = %message.subject,
            "Sending email via Resend"
        );

        let request = self.build_request(message);

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SendError::Transient(format!("Resend request error: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            let message_id = response
                .json::<ResendResponse>()
                .await
                .ok()
                .and_then(|body| body.id);

            info!(
                status = status.as_u16(),
                message_id = message_id.as_deref().unwrap_or("<none>"),
                recipient = %message.recipient,
                "Email accepted by Resend"
            );
            Ok(message_id)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(self.classify(status, error_text))
        }
    }
}
