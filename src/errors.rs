// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the AMQP Transport
//!
//! This module provides the error taxonomy for the messaging transport.
//! The `AmqpError` enum covers connection lifecycle, topology provisioning,
//! publish and consume failures. Connection-level faults are recovered
//! locally by the connection manager and only surface once recovery is
//! exhausted; per-message faults resolve to a terminal delivery decision
//! and never abort the consume loop.

use thiserror::Error;

/// Represents errors that can occur during AMQP/RabbitMQ operations.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Internal errors that don't fit into other categories
    #[error("internal error")]
    InternalError,

    /// Error establishing a connection to the broker
    #[error("failure to connect")]
    ConnectionError,

    /// Operation attempted with no live connection and no recovery in flight
    #[error("not connected to the broker")]
    NotConnectedError,

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding a queue to an exchange
    #[error("failure to bind queue `{0}` to exchange `{1}`")]
    BindQueueError(String, String),

    /// Error configuring Quality of Service parameters
    #[error("failure to configure qos `{0}`")]
    QosError(String),

    /// Error declaring a consumer on a queue
    #[error("failure to declare consumer `{0}`")]
    CreateConsumerError(String),

    /// Payload cannot be serialized; raised before any broker interaction
    #[error("failure to serialize payload")]
    SerializationError,

    /// Inbound payload cannot be parsed; the delivery is dead-lettered
    #[error("failure to deserialize payload")]
    DeserializationError,

    /// Error publishing a message
    #[error("failure to publish")]
    PublishingError,

    /// The broker refused to confirm a publish
    #[error("publish was not confirmed by the broker")]
    ConfirmError,

    /// Error acknowledging a delivery
    #[error("failure to ack message")]
    AckMessageError,

    /// Error negative-acknowledging a delivery
    #[error("failure to nack message")]
    NackMessageError,

    /// The application handler reported a failure
    #[error("handler failure `{0}`")]
    HandlerError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_entity_names() {
        assert_eq!(
            AmqpError::DeclareQueueError("orders".to_owned()).to_string(),
            "failure to declare a queue `orders`"
        );
        assert_eq!(
            AmqpError::BindQueueError("orders".to_owned(), "shop".to_owned()).to_string(),
            "failure to bind queue `orders` to exchange `shop`"
        );
    }

    #[test]
    fn variants_compare_by_value() {
        assert_eq!(AmqpError::NotConnectedError, AmqpError::NotConnectedError);
        assert_ne!(AmqpError::ConnectionError, AmqpError::ChannelError);
    }
}
