// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Definitions
//!
//! Types for describing broker queues, including their dead-letter wiring.
//! A queue that carries a [`DeadLetterDefinition`] is the "main" queue for
//! some message class: deliveries rejected without requeue are redirected by
//! the broker to the referenced exchange under the dead-letter routing key,
//! landing in the dead-letter queue for later inspection.

use crate::exchange::ExchangeDefinition;

/// The dead-letter target of a queue: the exchange rejected messages are
/// redirected to, the queue bound to it, and the routing key between them.
#[derive(Debug, Clone)]
pub struct DeadLetterDefinition {
    pub(crate) exchange: ExchangeDefinition,
    pub(crate) queue_name: String,
    pub(crate) routing_key: String,
}

impl DeadLetterDefinition {
    /// Creates a dead-letter target from its three coordinates.
    pub fn new(exchange: ExchangeDefinition, queue_name: &str, routing_key: &str) -> Self {
        DeadLetterDefinition {
            exchange,
            queue_name: queue_name.to_owned(),
            routing_key: routing_key.to_owned(),
        }
    }

    /// Name of the dead-letter queue.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }
}

/// Definition of a broker queue.
///
/// Implements the builder pattern.
#[derive(Debug, Clone, Default)]
pub struct QueueDefinition {
    pub(crate) name: String,
    pub(crate) durable: bool,
    pub(crate) delete: bool,
    pub(crate) exclusive: bool,
    pub(crate) dead_letter: Option<DeadLetterDefinition>,
}

impl QueueDefinition {
    /// Creates a new queue definition with the given name.
    ///
    /// Defaults to a non-durable, non-exclusive queue without dead-letter
    /// wiring.
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            durable: false,
            delete: false,
            exclusive: false,
            dead_letter: None,
        }
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The dead-letter target, if one is configured.
    pub fn dead_letter(&self) -> Option<&DeadLetterDefinition> {
        self.dead_letter.as_ref()
    }

    /// Makes the queue durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Sets the queue to auto-delete when no longer used.
    pub fn delete(mut self) -> Self {
        self.delete = true;
        self
    }

    /// Makes the queue exclusive to the connection.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Sets an explicit dead-letter target.
    pub fn with_dead_letter(mut self, dead_letter: DeadLetterDefinition) -> Self {
        self.dead_letter = Some(dead_letter);
        self
    }

    /// Derives a conventional dead-letter target from the queue name: a
    /// direct `<name>-dlx` exchange routing into a `<name>-dlq` queue under
    /// the queue's own name. Durability follows the queue's current flag, so
    /// call after `durable()`.
    pub fn with_dlq(mut self) -> Self {
        let mut exchange = ExchangeDefinition::new(&format!("{}-dlx", self.name)).direct();
        if self.durable {
            exchange = exchange.durable();
        }

        self.dead_letter = Some(DeadLetterDefinition {
            exchange,
            queue_name: format!("{}-dlq", self.name),
            routing_key: self.name.clone(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeKind;

    #[test]
    fn builder_defaults() {
        let def = QueueDefinition::new("orders");

        assert_eq!(def.name(), "orders");
        assert!(!def.durable);
        assert!(!def.exclusive);
        assert!(def.dead_letter().is_none());
    }

    #[test]
    fn with_dlq_derives_conventional_names() {
        let def = QueueDefinition::new("orders").durable().with_dlq();

        let dl = def.dead_letter().expect("dead-letter target");
        assert_eq!(dl.exchange.name(), "orders-dlx");
        assert_eq!(dl.exchange.kind, ExchangeKind::Direct);
        assert!(dl.exchange.durable);
        assert_eq!(dl.queue_name(), "orders-dlq");
        assert_eq!(dl.routing_key, "orders");
    }

    #[test]
    fn with_dead_letter_keeps_explicit_target() {
        let target = DeadLetterDefinition::new(
            ExchangeDefinition::new("failed").fanout(),
            "failed-orders",
            "orders.failed",
        );
        let def = QueueDefinition::new("orders").with_dead_letter(target);

        let dl = def.dead_letter().expect("dead-letter target");
        assert_eq!(dl.exchange.name(), "failed");
        assert_eq!(dl.queue_name(), "failed-orders");
        assert_eq!(dl.routing_key, "orders.failed");
    }
}
