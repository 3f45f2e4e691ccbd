// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Topology Provisioning
//!
//! This module asserts exchanges, queues, and bindings against the broker.
//! Provisioning is idempotent: every declaration is a cheap broker no-op
//! when the entity already exists with identical parameters, so `ensure`
//! runs before every publish and every subscribe.
//!
//! Declaration order matters for dead-letter wiring: the dead-letter
//! exchange and queue must exist before the main queue is declared with its
//! `x-dead-letter-*` arguments, otherwise a reject on an unprovisioned
//! dead-letter path loses the message.

use crate::{
    errors::AmqpError,
    exchange::ExchangeDefinition,
    queue::QueueDefinition,
};
use lapin::{
    options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldTable, LongString, ShortString},
    Channel,
};
use std::collections::BTreeMap;
use tracing::{debug, error};

/// Queue argument naming the dead letter exchange
pub const AMQP_HEADERS_DEAD_LETTER_EXCHANGE: &str = "x-dead-letter-exchange";
/// Queue argument naming the dead letter routing key
pub const AMQP_HEADERS_DEAD_LETTER_ROUTING_KEY: &str = "x-dead-letter-routing-key";

/// Provisions topology over a channel.
pub struct AmqpTopology {
    channel: Channel,
}

impl AmqpTopology {
    pub fn new(channel: Channel) -> AmqpTopology {
        AmqpTopology { channel }
    }

    /// Asserts the full topology for one exchange/queue/routing-key triple,
    /// in order: the dead-letter exchange and queue (when the queue carries
    /// a dead-letter target), the main exchange, the main queue with its
    /// dead-letter arguments, and finally the main binding.
    ///
    /// Any failed assertion aborts the calling operation; the topology is
    /// never left partially provisioned and silently proceeded with.
    pub async fn ensure(
        &self,
        exchange: &ExchangeDefinition,
        queue: &QueueDefinition,
        routing_key: &str,
    ) -> Result<(), AmqpError> {
        if let Some(dead_letter) = queue.dead_letter() {
            self.declare_exchange(&dead_letter.exchange).await?;
            self.declare_dead_letter_queue(queue, dead_letter.queue_name()).await?;
            self.bind_queue(
                dead_letter.queue_name(),
                dead_letter.exchange.name(),
                &dead_letter.routing_key,
            )
            .await?;
        }

        self.declare_exchange(exchange).await?;
        self.declare_queue(queue).await?;
        self.bind_queue(queue.name(), exchange.name(), routing_key).await
    }

    async fn declare_exchange(&self, def: &ExchangeDefinition) -> Result<(), AmqpError> {
        debug!("declaring exchange: {}", def.name());

        match self
            .channel
            .exchange_declare(
                def.name(),
                def.kind.into(),
                ExchangeDeclareOptions {
                    passive: false,
                    durable: def.durable,
                    auto_delete: def.delete,
                    internal: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(
                    error = %err,
                    name = def.name(),
                    "error to declare the exchange"
                );
                Err(AmqpError::DeclareExchangeError(def.name().to_owned()))
            }
            _ => Ok(()),
        }
    }

    async fn declare_queue(&self, def: &QueueDefinition) -> Result<(), AmqpError> {
        debug!("declaring queue: {}", def.name());

        let mut queue_args = BTreeMap::new();
        if let Some(dead_letter) = def.dead_letter() {
            queue_args.insert(
                ShortString::from(AMQP_HEADERS_DEAD_LETTER_EXCHANGE),
                AMQPValue::LongString(LongString::from(dead_letter.exchange.name())),
            );
            queue_args.insert(
                ShortString::from(AMQP_HEADERS_DEAD_LETTER_ROUTING_KEY),
                AMQPValue::LongString(LongString::from(dead_letter.routing_key.clone())),
            );
        }

        match self
            .channel
            .queue_declare(
                def.name(),
                QueueDeclareOptions {
                    passive: false,
                    durable: def.durable,
                    exclusive: def.exclusive,
                    auto_delete: def.delete,
                    nowait: false,
                },
                FieldTable::from(queue_args),
            )
            .await
        {
            Err(err) => {
                error!(error = %err, name = def.name(), "error to declare the queue");
                Err(AmqpError::DeclareQueueError(def.name().to_owned()))
            }
            _ => Ok(()),
        }
    }

    /// The dead-letter queue itself is plain: no arguments, durability
    /// following the main queue.
    async fn declare_dead_letter_queue(
        &self,
        main: &QueueDefinition,
        name: &str,
    ) -> Result<(), AmqpError> {
        debug!("declaring dead-letter queue: {}", name);

        match self
            .channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    passive: false,
                    durable: main.durable,
                    exclusive: false,
                    auto_delete: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = %err, name, "error to declare the dead-letter queue");
                Err(AmqpError::DeclareQueueError(name.to_owned()))
            }
            _ => Ok(()),
        }
    }

    async fn bind_queue(
        &self,
        queue_name: &str,
        exchange_name: &str,
        routing_key: &str,
    ) -> Result<(), AmqpError> {
        debug!(
            "binding queue: {} to the exchange: {} with the key: {}",
            queue_name, exchange_name, routing_key
        );

        match self
            .channel
            .queue_bind(
                queue_name,
                exchange_name,
                routing_key,
                QueueBindOptions { nowait: false },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = %err, "error to bind queue to exchange");
                Err(AmqpError::BindQueueError(
                    queue_name.to_owned(),
                    exchange_name.to_owned(),
                ))
            }
            _ => Ok(()),
        }
    }
}
