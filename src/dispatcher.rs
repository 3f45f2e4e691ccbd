// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Dispatcher
//!
//! Subscription management for the consume path. Registrations associate an
//! exchange/queue/routing-key triple with an application handler; consuming
//! provisions the topology, applies the prefetch limit, and drives one
//! delivery stream per registration with manual acknowledgment.

use crate::{
    connection::ConnectionManager,
    consumer::consume,
    errors::AmqpError,
    exchange::ExchangeDefinition,
    handler::ConsumerHandler,
    queue::QueueDefinition,
    topology::AmqpTopology,
};
use futures_util::{future::join_all, StreamExt};
use lapin::{
    options::{BasicConsumeOptions, BasicQosOptions},
    types::FieldTable,
};
use opentelemetry::global;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

/// One registered subscription: the binding triple plus its handler.
#[derive(Clone)]
pub(crate) struct SubscriptionDefinition {
    pub(crate) exchange: ExchangeDefinition,
    pub(crate) queue: QueueDefinition,
    pub(crate) routing_key: String,
    pub(crate) handler: Arc<dyn ConsumerHandler>,
}

/// Dispatches deliveries from subscribed queues to their handlers.
pub struct AmqpDispatcher {
    manager: Arc<ConnectionManager>,
    pub(crate) subscriptions: Vec<SubscriptionDefinition>,
}

impl AmqpDispatcher {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        AmqpDispatcher {
            manager,
            subscriptions: vec![],
        }
    }

    /// Registers a handler for a queue bound to an exchange under a routing
    /// key.
    pub fn register(
        mut self,
        exchange: &ExchangeDefinition,
        queue: &QueueDefinition,
        routing_key: &str,
        handler: Arc<dyn ConsumerHandler>,
    ) -> Self {
        self.subscriptions.push(SubscriptionDefinition {
            exchange: exchange.clone(),
            queue: queue.clone(),
            routing_key: routing_key.to_owned(),
            handler,
        });
        self
    }

    /// Starts one consumer per registration and blocks until all of them
    /// finish (normally only when the broker cancels the subscriptions).
    pub async fn consume_blocking(&self) -> Result<(), AmqpError> {
        let mut spawns = vec![];
        for subscription in &self.subscriptions {
            spawns.push(self.start_subscription(subscription.clone()).await?);
        }

        for joined in join_all(spawns).await {
            if joined.is_err() {
                error!("consumer task error");
                return Err(AmqpError::InternalError);
            }
        }

        Ok(())
    }

    async fn start_subscription(
        &self,
        subscription: SubscriptionDefinition,
    ) -> Result<JoinHandle<()>, AmqpError> {
        let channel = self.manager.channel().await?;

        AmqpTopology::new(channel.clone())
            .ensure(
                &subscription.exchange,
                &subscription.queue,
                &subscription.routing_key,
            )
            .await?;

        // flow control: the broker will not hand this consumer more than
        // `prefetch` unacknowledged deliveries at once
        let prefetch = self.manager.config().prefetch;
        if let Err(err) = channel
            .basic_qos(prefetch, BasicQosOptions { global: false })
            .await
        {
            error!(error = %err, "error to configure qos");
            return Err(AmqpError::QosError(subscription.queue.name().to_owned()));
        }

        let consumer_tag = format!("{}-{}", subscription.queue.name(), Uuid::new_v4());
        let mut consumer = match channel
            .basic_consume(
                subscription.queue.name(),
                &consumer_tag,
                BasicConsumeOptions {
                    no_local: false,
                    no_ack: false,
                    exclusive: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = %err, "error to create the consumer");
                return Err(AmqpError::CreateConsumerError(
                    subscription.queue.name().to_owned(),
                ));
            }
            Ok(consumer) => consumer,
        };

        info!(
            queue = subscription.queue.name(),
            prefetch, "consuming queue"
        );

        Ok(tokio::spawn(async move {
            let tracer = global::tracer("amqp consumer");

            while let Some(result) = consumer.next().await {
                match result {
                    Ok(delivery) => {
                        if let Err(err) = consume(
                            &tracer,
                            &delivery,
                            &subscription.queue,
                            subscription.handler.as_ref(),
                        )
                        .await
                        {
                            error!(error = %err, "error consume msg");
                        }
                    }
                    Err(err) => error!(error = %err, "errors consume msg"),
                }
            }

            // stream end means the broker cancelled the subscription; this
            // is a no-op, not an error
            info!(
                queue = subscription.queue.name(),
                "subscription cancelled by the broker"
            );
        }))
    }
}
