use std::sync::Arc;

use anyhow::{Error, Result};
use email_service::{
    api::{AppState, run_api_server},
    clients::{
        database::DatabaseClient,
        health::HealthChecker,
        rbmq::{RabbitMqClient, run_event_consumer},
        resend::ResendClient,
        template::TemplateStore,
    },
    config::Config,
    dispatcher::Dispatcher,
    renderer::{LinkConfig, Renderer},
    subscribers::EventSubscriber,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;

    init_tracing(&config.log_format);

    let templates = Arc::new(TemplateStore::load(&config.templates_dir).await?);
    let renderer = Renderer::new(templates, LinkConfig::from_config(&config));

    let missing = renderer.missing_templates();
    if !missing.is_empty() {
        warn!(missing = ?missing, "Some notification templates are missing");
    }

    let sender = Arc::new(ResendClient::new(&config)?);
    let dispatcher = Arc::new(Dispatcher::new(
        renderer.clone(),
        sender,
        config.retry_config(),
    ));

    let mut subscriber = EventSubscriber::new(Arc::clone(&dispatcher));
    let mut database = None;

    if let Some(database_url) = &config.database_url {
        let client = Arc::new(DatabaseClient::connect(database_url).await?);
        subscriber = subscriber.with_lookups(client.clone(), client.clone());
        database = Some(client);
    } else {
        info!("DATABASE_URL not set, order and customer lookups disabled");
    }

    let subscriber = Arc::new(subscriber);

    if let Some(rabbitmq_url) = &config.rabbitmq_url {
        let rabbitmq = Arc::new(
            RabbitMqClient::connect(
                rabbitmq_url,
                &config.event_queue_name,
                config.prefetch_count,
            )
            .await?,
        );
        let consumer_subscriber = Arc::clone(&subscriber);

        tokio::spawn(async move {
            if let Err(e) = run_event_consumer(rabbitmq, consumer_subscriber).await {
                error!(error = %e, "Event consumer stopped");
            }
        });
    } else {
        info!("RABBITMQ_URL not set, accepting events over HTTP only");
    }

    let state = Arc::new(AppState {
        health_checker: HealthChecker::new(config.clone(), renderer, database),
        subscriber,
        api_token: config.internal_api_token.clone(),
    });

    info!("Configuration validated. Dispatcher is ready to start.");

    run_api_server(config.server_port, state).await
}
