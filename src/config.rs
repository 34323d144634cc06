use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::models::retry::RetryConfig;

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub resend_api_key: String,
    pub internal_api_token: String,
    #[serde(default = "default_resend_api_url")]
    pub resend_api_url: String,
    #[serde(default = "default_sender_address")]
    pub sender_address: String,
    #[serde(default = "default_delivery_timeout_seconds")]
    pub delivery_timeout_seconds: u64,
    #[serde(default)]
    pub fail_fast_on_client_errors: bool,

    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
    #[serde(default = "default_storefront_url")]
    pub storefront_url: String,
    #[serde(default = "default_unsubscribe_url")]
    pub unsubscribe_url: String,

    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    pub database_url: Option<String>,

    pub rabbitmq_url: Option<String>,
    #[serde(default = "default_event_queue_name")]
    pub event_queue_name: String,
    #[serde(default = "default_prefetch_count")]
    pub prefetch_count: u16,

    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_resend_api_url() -> String {
    "https://api.resend.com/emails".to_string()
}

fn default_sender_address() -> String {
    "no-reply@boujee-botanical.store".to_string()
}

fn default_delivery_timeout_seconds() -> u64 {
    10
}

fn default_templates_dir() -> String {
    "templates".to_string()
}

fn default_storefront_url() -> String {
    "https://localhost:8000".to_string()
}

fn default_unsubscribe_url() -> String {
    "https://boujee-botanical.store/unsubscribe".to_string()
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    3000
}

fn default_event_queue_name() -> String {
    "commerce_events".to_string()
}

fn default_prefetch_count() -> u16 {
    10
}

fn default_server_port() -> u16 {
    9000
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, Self>(vars)
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.resend_api_key.trim().is_empty() {
            return Err(anyhow!("Resend API key not configured"));
        }

        if self.internal_api_token.trim().is_empty() {
            return Err(anyhow!("Internal API token not configured"));
        }

        if self.delivery_timeout_seconds == 0 {
            return Err(anyhow!("DELIVERY_TIMEOUT_SECONDS must be at least 1"));
        }

        if self.max_retry_attempts == 0 {
            return Err(anyhow!("MAX_RETRY_ATTEMPTS must be at least 1"));
        }

        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retry_attempts,
            delay_ms: self.retry_delay_ms,
        }
    }
}
