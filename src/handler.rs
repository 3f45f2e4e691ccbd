// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Consumer Handler Seam
//!
//! The application-facing contract of the consume path. The transport
//! deserializes each delivery, hands it to a [`ConsumerHandler`], and maps
//! the returned [`Outcome`] (or a handler error, treated the same as
//! [`Outcome::Rejected`]) to exactly one terminal broker decision.

use crate::errors::AmqpError;
use async_trait::async_trait;
use serde_json::Value;

/// Verdict of one handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The delivery was fully processed; acknowledge and remove it.
    Accepted,
    /// The delivery could not be processed; route it to the dead-letter
    /// target without requeue.
    Rejected,
}

/// A deserialized inbound delivery.
#[derive(Debug, Clone)]
pub struct ConsumerMessage {
    pub queue: String,
    pub routing_key: String,
    pub payload: Value,
}

impl ConsumerMessage {
    pub fn new(queue: &str, routing_key: &str, payload: Value) -> ConsumerMessage {
        ConsumerMessage {
            queue: queue.to_owned(),
            routing_key: routing_key.to_owned(),
            payload,
        }
    }
}

/// Processes deliveries from a subscribed queue.
///
/// Owned by the surrounding application; the transport only needs the
/// verdict. Returning `Err` is treated identically to `Ok(Rejected)`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConsumerHandler: Send + Sync {
    async fn handle(&self, msg: &ConsumerMessage) -> Result<Outcome, AmqpError>;
}
