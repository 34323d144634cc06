use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info};

use crate::{
    error::LookupError,
    models::customer::{Customer, Order},
    subscribers::{CustomerLookup, OrderLookup},
};

/// Read-only access to the commerce platform's order and customer tables.
pub struct DatabaseClient {
    client: Client,
}

impl DatabaseClient {
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        info!("Connecting to PostgreSQL database");

        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection closed with error");
            }
        });

        info!("PostgreSQL connection established");

        Ok(Self { client })
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        self.client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| anyhow!("Database health check failed: {}", e))?;

        Ok(())
    }
}

#[async_trait]
impl OrderLookup for DatabaseClient {
    async fn retrieve_order(&self, order_id: &str) -> Result<Order, LookupError> {
        let row = self
            .client
            .query_opt(
                r#"SELECT id, customer_id FROM "order" WHERE id = $1"#,
                &[&order_id],
            )
            .await
            .map_err(|e| LookupError::Backend(e.to_string()))?
            .ok_or_else(|| LookupError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })?;

        debug!(order_id, "Order retrieved");

        Ok(Order {
            id: row.get("id"),
            customer_id: row.get("customer_id"),
        })
    }
}

#[async_trait]
impl CustomerLookup for DatabaseClient {
    async fn retrieve_customer(&self, customer_id: &str) -> Result<Customer, LookupError> {
        let row = self
            .client
            .query_opt(
                r#"
                SELECT id, email, first_name, last_name
                FROM customer
                WHERE id = $1 AND deleted_at IS NULL
                "#,
                &[&customer_id],
            )
            .await
            .map_err(|e| LookupError::Backend(e.to_string()))?
            .ok_or_else(|| LookupError::NotFound {
                entity: "customer",
                id: customer_id.to_string(),
            })?;

        debug!(customer_id, "Customer retrieved");

        Ok(Customer {
            id: row.get("id"),
            email: row.get("email"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
        })
    }
}
