//! Broker transports
//!
//! The sink talks to the broker through [`AmqpTransport`] so connection
//! handling can be exercised without a running broker. [`LapinTransport`]
//! is the real implementation.

use async_trait::async_trait;
use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};

use crate::common::SinkError;

/// Reply code sent when closing normally
const REPLY_SUCCESS: u16 = 200;

/// Connection to a message broker
#[async_trait]
pub trait AmqpTransport: Send + Sync {
    /// Open a connection and a channel
    async fn connect(&mut self, url: &str) -> Result<(), SinkError>;

    /// Publish one message and wait for the broker to take it
    async fn publish(&mut self, exchange: &str, routing_key: &str, body: &[u8]) -> Result<(), SinkError>;

    /// Close channel and connection; safe when not connected
    async fn close(&mut self);
}

/// `lapin` backed transport
#[derive(Default)]
pub struct LapinTransport {
    connection: Option<Connection>,
    channel: Option<Channel>,
}

impl LapinTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AmqpTransport for LapinTransport {
    async fn connect(&mut self, url: &str) -> Result<(), SinkError> {
        self.close().await;

        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| SinkError::connection(e.to_string()))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| SinkError::connection(e.to_string()))?;

        self.connection = Some(connection);
        self.channel = Some(channel);
        Ok(())
    }

    async fn publish(&mut self, exchange: &str, routing_key: &str, body: &[u8]) -> Result<(), SinkError> {
        let channel = self
            .channel
            .as_ref()
            .ok_or_else(|| SinkError::connection("not connected"))?;

        let properties = BasicProperties::default().with_content_type("application/json".into());
        channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                body,
                properties,
            )
            .await
            .map_err(|e| SinkError::publish(e.to_string()))?
            .await
            .map_err(|e| SinkError::publish(e.to_string()))?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(channel) = self.channel.take()
            && let Err(e) = channel.close(REPLY_SUCCESS, "closing").await
        {
            tracing::debug!(error = %e, "amqp channel close failed");
        }
        if let Some(connection) = self.connection.take()
            && let Err(e) = connection.close(REPLY_SUCCESS, "closing").await
        {
            tracing::debug!(error = %e, "amqp connection close failed");
        }
    }
}
