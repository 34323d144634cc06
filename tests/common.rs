use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
};

use async_trait::async_trait;
use email_service::{
    clients::template::TemplateStore,
    dispatcher::{Dispatcher, EmailSender},
    error::SendError,
    models::{message::RenderedMessage, retry::RetryConfig},
    renderer::{LinkConfig, Renderer},
};

pub const STOREFRONT_URL: &str = "https://shop.example.com";
pub const UNSUBSCRIBE_URL: &str = "https://shop.example.com/unsubscribe";
pub const API_TOKEN: &str = "internal_test_token";

/// Send stub that fails a scripted number of times before succeeding, and
/// records every message it is asked to send.
pub struct ScriptedSender {
    failures_before_success: u32,
    error: SendError,
    calls: AtomicU32,
    sent: Mutex<Vec<RenderedMessage>>,
}

impl ScriptedSender {
    pub fn succeeding() -> Arc<Self> {
        Self::failing_times(0)
    }

    pub fn failing_times(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures_before_success: failures,
            error: SendError::Transient("provider unavailable".to_string()),
            calls: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn always_failing() -> Arc<Self> {
        Self::failing_times(u32::MAX)
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            failures_before_success: u32::MAX,
            error: SendError::Fatal("invalid recipient".to_string()),
            calls: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<RenderedMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for ScriptedSender {
    async fn send(&self, message: &RenderedMessage) -> Result<Option<String>, SendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(message.clone());

        if call < self.failures_before_success {
            Err(self.error.clone())
        } else {
            Ok(Some(format!("msg_{}", call + 1)))
        }
    }
}

pub fn links() -> LinkConfig {
    LinkConfig {
        storefront_url: STOREFRONT_URL.to_string(),
        unsubscribe_url: UNSUBSCRIBE_URL.to_string(),
    }
}

pub async fn bundled_templates() -> Arc<TemplateStore> {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/templates");
    Arc::new(TemplateStore::load(dir).await.unwrap())
}

pub async fn renderer() -> Renderer {
    Renderer::new(bundled_templates().await, links())
}

pub fn retry_config(delay_ms: u64) -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        delay_ms,
    }
}

pub async fn dispatcher_with(sender: Arc<ScriptedSender>, delay_ms: u64) -> Dispatcher {
    Dispatcher::new(renderer().await, sender, retry_config(delay_ms))
}

pub fn payload(fields: &[(&str, &str)]) -> HashMap<String, String> {
    fields
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

pub fn config_vars(extra: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut vars = vec![
        ("RESEND_API_KEY".to_string(), "re_test_key".to_string()),
        ("INTERNAL_API_TOKEN".to_string(), API_TOKEN.to_string()),
    ];
    vars.extend(
        extra
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string())),
    );
    vars
}
