// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Delivery Processing
//!
//! Per-delivery consume logic. Every delivery walks the same path:
//! deserialize, invoke the handler, convert the verdict into exactly one
//! terminal broker decision. Acknowledge removes the message permanently;
//! reject without requeue hands it to the queue's dead-letter target with
//! the original bytes intact. Malformed payloads are rejected without
//! invoking the handler. No path leaves a delivery undecided, and per
//! -message failures never abort the consume loop.

use crate::{
    errors::AmqpError,
    handler::{ConsumerHandler, ConsumerMessage, Outcome},
    otel,
    queue::QueueDefinition,
};
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicNackOptions},
};
use opentelemetry::{
    global::BoxedTracer,
    trace::{Span, Status},
};
use serde_json::Value;
use std::borrow::Cow;
use tracing::{debug, error, warn};

/// Terminal decision for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Accept,
    DeadLetter,
}

fn parse_payload(data: &[u8]) -> Result<Value, AmqpError> {
    serde_json::from_slice::<Value>(data).map_err(|_| AmqpError::DeserializationError)
}

/// Maps one delivery to its terminal decision. Broker-free: the caller
/// applies the decision with ack/nack.
pub(crate) async fn decide(
    queue: &str,
    routing_key: &str,
    data: &[u8],
    handler: &dyn ConsumerHandler,
) -> Decision {
    let payload = match parse_payload(data) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, queue, "malformed payload, routing to dead letter");
            return Decision::DeadLetter;
        }
    };

    let msg = ConsumerMessage::new(queue, routing_key, payload);

    match handler.handle(&msg).await {
        Ok(Outcome::Accepted) => Decision::Accept,
        Ok(Outcome::Rejected) => {
            warn!(queue, "handler rejected the delivery");
            Decision::DeadLetter
        }
        Err(err) => {
            error!(error = %err, queue, "handler failure");
            Decision::DeadLetter
        }
    }
}

/// Consumes a single delivery: opens the consumer span, computes the
/// decision, and applies it to the broker.
pub(crate) async fn consume(
    tracer: &BoxedTracer,
    delivery: &Delivery,
    queue: &QueueDefinition,
    handler: &dyn ConsumerHandler,
) -> Result<(), AmqpError> {
    let (_ctx, mut span) = otel::consumer_span(&delivery.properties, tracer, queue.name());

    debug!(
        "received delivery from exchange: {} with key: {}",
        delivery.exchange, delivery.routing_key
    );

    let decision = decide(
        queue.name(),
        delivery.routing_key.as_str(),
        &delivery.data,
        handler,
    )
    .await;

    match decision {
        Decision::Accept => {
            match delivery.ack(BasicAckOptions { multiple: false }).await {
                Err(err) => {
                    error!("error whiling ack msg");
                    span.record_error(&err);
                    span.set_status(Status::Error {
                        description: Cow::from("error to ack msg"),
                    });
                    Err(AmqpError::AckMessageError)
                }
                _ => {
                    span.set_status(Status::Ok);
                    Ok(())
                }
            }
        }
        Decision::DeadLetter => {
            match delivery
                .nack(BasicNackOptions {
                    multiple: false,
                    requeue: false,
                })
                .await
            {
                Err(err) => {
                    error!("error whiling nack msg");
                    span.record_error(&err);
                    span.set_status(Status::Error {
                        description: Cow::from("error to nack msg"),
                    });
                    Err(AmqpError::NackMessageError)
                }
                _ => {
                    span.set_status(Status::Ok);
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::MockConsumerHandler;
    use serde_json::json;

    fn order_payload() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "orderId": "ORD-001",
            "customerEmail": "c@example.com",
            "items": ["A", "B"],
            "total": 99.99
        }))
        .unwrap()
    }

    #[test]
    fn parse_payload_round_trips_json() {
        let bytes = order_payload();
        let value = parse_payload(&bytes).unwrap();

        assert_eq!(value["orderId"], "ORD-001");
        assert_eq!(value["items"], json!(["A", "B"]));
        assert_eq!(value["total"], json!(99.99));
    }

    #[test]
    fn parse_payload_rejects_malformed_bytes() {
        assert_eq!(
            parse_payload(b"{not json"),
            Err(AmqpError::DeserializationError)
        );
    }

    #[tokio::test]
    async fn accepted_outcome_maps_to_ack() {
        let mut handler = MockConsumerHandler::new();
        handler
            .expect_handle()
            .times(1)
            .returning(|_| Ok(Outcome::Accepted));

        let decision = decide("orders", "orders.confirmed", &order_payload(), &handler).await;

        assert_eq!(decision, Decision::Accept);
    }

    #[tokio::test]
    async fn rejected_outcome_maps_to_dead_letter() {
        let mut handler = MockConsumerHandler::new();
        handler
            .expect_handle()
            .times(1)
            .returning(|_| Ok(Outcome::Rejected));

        let decision = decide("orders", "orders.confirmed", &order_payload(), &handler).await;

        assert_eq!(decision, Decision::DeadLetter);
    }

    #[tokio::test]
    async fn handler_failure_maps_to_dead_letter() {
        let mut handler = MockConsumerHandler::new();
        handler
            .expect_handle()
            .times(1)
            .returning(|_| Err(AmqpError::HandlerError("smtp down".to_owned())));

        let decision = decide("orders", "orders.confirmed", &order_payload(), &handler).await;

        assert_eq!(decision, Decision::DeadLetter);
    }

    #[tokio::test]
    async fn malformed_payload_skips_the_handler() {
        let mut handler = MockConsumerHandler::new();
        handler.expect_handle().times(0);

        let decision = decide("orders", "orders.confirmed", b"{not json", &handler).await;

        assert_eq!(decision, Decision::DeadLetter);
    }

    #[tokio::test]
    async fn handler_sees_the_published_value() {
        let mut handler = MockConsumerHandler::new();
        handler
            .expect_handle()
            .times(1)
            .withf(|msg: &ConsumerMessage| {
                msg.queue == "orders"
                    && msg.routing_key == "orders.confirmed"
                    && msg.payload["customerEmail"] == "c@example.com"
            })
            .returning(|_| Ok(Outcome::Accepted));

        let decision = decide("orders", "orders.confirmed", &order_payload(), &handler).await;

        assert_eq!(decision, Decision::Accept);
    }
}
