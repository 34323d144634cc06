use std::{collections::HashMap, sync::Arc, time::Instant};

use chrono::Utc;
use tracing::{debug, warn};

use crate::{
    clients::{database::DatabaseClient, rbmq::RabbitMqClient},
    config::Config,
    models::health::{HealthCheckResponse, HealthStatus, ServiceHealth},
    renderer::Renderer,
};

pub struct HealthChecker {
    config: Config,
    renderer: Renderer,
    database: Option<Arc<DatabaseClient>>,
}

impl HealthChecker {
    pub fn new(config: Config, renderer: Renderer, database: Option<Arc<DatabaseClient>>) -> Self {
        Self {
            config,
            renderer,
            database,
        }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        checks.insert("templates".to_string(), self.check_templates());
        checks.insert("database".to_string(), self.check_database().await);
        checks.insert("message_broker".to_string(), self.check_rabbitmq().await);

        let overall_status = determine_overall_status(&checks);

        HealthCheckResponse {
            status: overall_status,
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            checks,
        }
    }

    fn check_templates(&self) -> ServiceHealth {
        let missing = self.renderer.missing_templates();

        if missing.is_empty() {
            ServiceHealth::healthy(0)
        } else {
            warn!(missing = ?missing, "Notification templates missing");
            ServiceHealth::degraded(format!("missing templates: {}", missing.join(", ")))
        }
    }

    async fn check_database(&self) -> ServiceHealth {
        let Some(database) = &self.database else {
            return ServiceHealth::disabled();
        };

        let start = Instant::now();

        match database.health_check().await {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "Database health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                ServiceHealth::unhealthy(format!("Health check query failed: {}", e))
            }
        }
    }

    async fn check_rabbitmq(&self) -> ServiceHealth {
        let Some(rabbitmq_url) = &self.config.rabbitmq_url else {
            return ServiceHealth::disabled();
        };

        let start = Instant::now();

        match RabbitMqClient::connect(
            rabbitmq_url,
            &self.config.event_queue_name,
            self.config.prefetch_count,
        )
        .await
        {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "RabbitMQ health check passed");
                ServiceHealth::healthy(elapsed)
                    .with_detail(format!("queue {}", self.config.event_queue_name))
            }
            Err(e) => {
                warn!(error = %e, "RabbitMQ connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }
}

/// Any unhealthy dependency makes the service unhealthy; degraded otherwise wins.
pub fn determine_overall_status(checks: &HashMap<String, ServiceHealth>) -> HealthStatus {
    let has_unhealthy = checks
        .values()
        .any(|health| health.status == HealthStatus::Unhealthy);

    let has_degraded = checks
        .values()
        .any(|health| health.status == HealthStatus::Degraded);

    if has_unhealthy {
        HealthStatus::Unhealthy
    } else if has_degraded {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}
