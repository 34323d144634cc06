use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use futures_util::StreamExt;
use lapin::{
    Channel, Connection, ConnectionProperties, Consumer,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicQosOptions, BasicRejectOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
};
use tracing::{error, info, warn};

use crate::{models::event::InboundEvent, subscribers::EventSubscriber};

pub struct RabbitMqClient {
    _connection: Connection,
    channel: Channel,
    event_queue_name: String,
}

impl RabbitMqClient {
    pub async fn connect(
        rabbitmq_url: &str,
        event_queue_name: &str,
        prefetch_count: u16,
    ) -> Result<Self, Error> {
        info!("Connecting to RabbitMQ");

        let connection = Connection::connect(rabbitmq_url, ConnectionProperties::default())
            .await
            .map_err(|_| anyhow!("Failed to connect to RabbitMQ"))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|_| anyhow!("RabbitMQ channel creation failed"))?;

        channel
            .basic_qos(prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|_| anyhow!("Failed to set up QoS"))?;

        channel
            .queue_declare(
                event_queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to declare event queue"))?;

        info!(queue = event_queue_name, prefetch_count, "RabbitMQ event queue declared");

        Ok(Self {
            _connection: connection,
            channel,
            event_queue_name: event_queue_name.to_string(),
        })
    }

    pub async fn create_consumer(&self) -> Result<Consumer, Error> {
        let consumer = self
            .channel
            .basic_consume(
                &self.event_queue_name,
                "email_dispatcher",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to create consumer"))?;

        info!(queue = %self.event_queue_name, "Consumer created for queue");

        Ok(consumer)
    }

    pub async fn acknowledge(&self, delivery_tag: u64) -> Result<(), Error> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|_| anyhow!("Failed to acknowledge message"))?;

        Ok(())
    }

    pub async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Error> {
        self.channel
            .basic_reject(delivery_tag, BasicRejectOptions { requeue })
            .await
            .map_err(|_| anyhow!("Failed to reject message"))?;

        Ok(())
    }
}

/// Consumes platform events until the consumer stream ends.
///
/// Every delivery is handled on its own task and acknowledged once handling
/// finishes, whatever the outcome. Undecodable payloads are rejected without
/// requeue.
pub async fn run_event_consumer(
    client: Arc<RabbitMqClient>,
    subscriber: Arc<EventSubscriber>,
) -> Result<(), Error> {
    let mut consumer = client.create_consumer().await?;

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                error!(error = %e, "Failed to receive delivery from RabbitMQ");
                continue;
            }
        };

        let delivery_tag = delivery.delivery_tag;

        let event = match serde_json::from_slice::<InboundEvent>(&delivery.data) {
            Ok(event) => event,
            Err(e) => {
                warn!(delivery_tag, error = %e, "Invalid event payload, rejecting");
                if let Err(e) = client.reject(delivery_tag, false).await {
                    error!(delivery_tag, error = %e, "Failed to reject delivery");
                }
                continue;
            }
        };

        let client = Arc::clone(&client);
        let subscriber = Arc::clone(&subscriber);

        tokio::spawn(async move {
            // Outcome is already logged by the subscriber.
            let _ = subscriber.handle(event).await;

            if let Err(e) = client.acknowledge(delivery_tag).await {
                error!(delivery_tag, error = %e, "Failed to acknowledge delivery");
            }
        });
    }

    warn!("RabbitMQ consumer stream ended");

    Ok(())
}
