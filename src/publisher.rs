// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Publisher
//!
//! The publish path: provision topology, serialize the application payload
//! to UTF-8 JSON, and transmit with the persistent-delivery flag so the
//! broker stores the message durably. Serialization failures are raised
//! before any broker interaction; there is no partial publish.
//!
//! The returned boolean is a local flow-control signal: `true` means the
//! frame was accepted into the send buffer, not that the broker durably
//! stored it. With publisher confirms enabled on the connection manager,
//! the broker verdict is awaited and a negative acknowledgment yields
//! `false`.

use crate::{
    connection::ConnectionManager,
    errors::AmqpError,
    exchange::ExchangeDefinition,
    otel,
    queue::QueueDefinition,
    topology::AmqpTopology,
};
use async_trait::async_trait;
use lapin::{
    options::BasicPublishOptions,
    types::{AMQPValue, FieldTable, ShortString},
    BasicProperties,
};
use opentelemetry::Context;
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{error, warn};
use uuid::Uuid;

/// Content type for JSON messages
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Delivery mode flag for messages that survive a broker restart
const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// Publishes application messages durably to an exchange.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `payload` to `exchange` under `routing_key`, provisioning
    /// the full topology for `queue` first.
    ///
    /// Returns `Ok(true)` once the message is accepted for delivery and
    /// `Ok(false)` when the broker negatively confirms it (confirm mode
    /// only).
    async fn publish<T>(
        &self,
        exchange: &ExchangeDefinition,
        queue: &QueueDefinition,
        routing_key: &str,
        payload: &T,
    ) -> Result<bool, AmqpError>
    where
        T: Serialize + Send + Sync;
}

/// AMQP implementation of the [`Publisher`] trait.
pub struct AmqpPublisher {
    manager: Arc<ConnectionManager>,
}

impl AmqpPublisher {
    pub fn new(manager: Arc<ConnectionManager>) -> Arc<AmqpPublisher> {
        Arc::new(AmqpPublisher { manager })
    }
}

#[async_trait]
impl Publisher for AmqpPublisher {
    async fn publish<T>(
        &self,
        exchange: &ExchangeDefinition,
        queue: &QueueDefinition,
        routing_key: &str,
        payload: &T,
    ) -> Result<bool, AmqpError>
    where
        T: Serialize + Send + Sync,
    {
        let channel = self.manager.channel().await?;

        AmqpTopology::new(channel.clone())
            .ensure(exchange, queue, routing_key)
            .await?;

        let body = serde_json::to_vec(payload).map_err(|err| {
            error!(error = %err, "failure to serialize the payload");
            AmqpError::SerializationError
        })?;

        let mut headers = BTreeMap::<ShortString, AMQPValue>::default();
        otel::inject_context(&Context::current(), &mut headers);

        let confirm = match channel
            .basic_publish(
                exchange.name(),
                routing_key,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                &body,
                BasicProperties::default()
                    .with_content_type(ShortString::from(JSON_CONTENT_TYPE))
                    .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
                    .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
                    .with_headers(FieldTable::from(headers)),
            )
            .await
        {
            Err(err) => {
                error!(error = %err, "error publishing message");
                return Err(AmqpError::PublishingError);
            }
            Ok(confirm) => confirm,
        };

        if self.manager.config().publisher_confirms {
            let confirmation = confirm.await.map_err(|err| {
                error!(error = %err, "error awaiting publisher confirm");
                AmqpError::ConfirmError
            })?;

            if confirmation.is_nack() {
                warn!(exchange = exchange.name(), "broker refused the publish");
                return Ok(false);
            }
        }

        Ok(true)
    }
}
