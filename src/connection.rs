// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Connection Management
//!
//! This module owns the shared connection and channel used by the publisher
//! and the dispatcher. The [`ConnectionManager`] is an explicitly
//! constructed instance (no process-wide global): it opens the connection,
//! creates the singleton channel, observes transport errors, and drives the
//! bounded recovery procedure when the connection is lost. Every other
//! component obtains a channel clone per call and never mutates the
//! connection state.

use crate::{config::AmqpConfig, errors::AmqpError};
use lapin::{
    options::ConfirmSelectOptions, types::LongString, Channel, Connection, ConnectionProperties,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, error, info, warn};

/// Lifecycle of the shared connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

struct Live {
    connection: Connection,
    channel: Channel,
}

/// Owns the shared connection/channel pair and its recovery procedure.
///
/// Created within a Tokio runtime; the manager spawns a background task
/// that reacts to transport errors by re-opening the connection, with a
/// bounded number of attempts and a fixed pause between them. Concurrent
/// triggers (a failed `connect` and an async transport error) collapse into
/// a single recovery loop.
pub struct ConnectionManager {
    config: AmqpConfig,
    live: RwLock<Option<Live>>,
    lifecycle: watch::Sender<ConnectionState>,
    recovery_tx: mpsc::UnboundedSender<()>,
    recovering: AtomicBool,
    gave_up: AtomicBool,
    closed: AtomicBool,
}

impl ConnectionManager {
    /// Creates a new manager and its recovery task.
    pub fn new(config: AmqpConfig) -> Arc<ConnectionManager> {
        let (recovery_tx, mut recovery_rx) = mpsc::unbounded_channel();
        let (lifecycle, _) = watch::channel(ConnectionState::Disconnected);

        let manager = Arc::new(ConnectionManager {
            config,
            live: RwLock::new(None),
            lifecycle,
            recovery_tx,
            recovering: AtomicBool::new(false),
            gave_up: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&manager);
        tokio::spawn(async move {
            while recovery_rx.recv().await.is_some() {
                let Some(manager) = weak.upgrade() else { break };
                manager.recover().await;
            }
        });

        manager
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &AmqpConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.lifecycle.borrow()
    }

    /// A watch receiver over lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.lifecycle.subscribe()
    }

    /// Opens the connection and channel. Idempotent: a no-op when already
    /// connected.
    ///
    /// On failure the recovery procedure is scheduled in the background and
    /// `ConnectionError` is returned to the caller; this is the only point
    /// where a connection failure surfaces directly.
    pub async fn connect(&self) -> Result<(), AmqpError> {
        if self.state() == ConnectionState::Connected && self.live.read().await.is_some() {
            return Ok(());
        }

        self.gave_up.store(false, Ordering::SeqCst);
        self.closed.store(false, Ordering::SeqCst);
        self.lifecycle.send_replace(ConnectionState::Connecting);

        match self.open().await {
            Ok(()) => Ok(()),
            Err(err) => {
                let _ = self.recovery_tx.send(());
                Err(err)
            }
        }
    }

    /// Returns a clone of the singleton channel.
    ///
    /// Fails fast with `NotConnectedError` when there is no live channel,
    /// whether because `connect` was never called, recovery is still in
    /// flight, or recovery has been exhausted.
    pub async fn channel(&self) -> Result<Channel, AmqpError> {
        match self.live.read().await.as_ref() {
            Some(live) => Ok(live.channel.clone()),
            None => Err(AmqpError::NotConnectedError),
        }
    }

    /// Ordered, best-effort teardown under the configured deadline: channel
    /// first, then connection, errors logged and swallowed.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);

        let teardown = async {
            if let Some(live) = self.live.write().await.take() {
                if let Err(err) = live.channel.close(200, "shutdown").await {
                    warn!(error = %err, "error closing channel");
                }
                if let Err(err) = live.connection.close(200, "shutdown").await {
                    warn!(error = %err, "error closing connection");
                }
            }
        };

        if tokio::time::timeout(self.config.shutdown_deadline, teardown)
            .await
            .is_err()
        {
            warn!("shutdown deadline exceeded, abandoning teardown");
        }

        self.lifecycle.send_replace(ConnectionState::Disconnected);
    }

    async fn open(&self) -> Result<(), AmqpError> {
        debug!("creating amqp connection...");
        let options = ConnectionProperties::default()
            .with_connection_name(LongString::from(self.config.app_name.clone()));

        let connection = match Connection::connect(&self.config.uri(), options).await {
            Ok(c) => c,
            Err(err) => {
                error!(error = %err, "failure to connect");
                return Err(AmqpError::ConnectionError);
            }
        };
        debug!("amqp connected");

        debug!("creating amqp channel...");
        let channel = match connection.create_channel().await {
            Ok(c) => c,
            Err(err) => {
                error!(error = %err, "error to create the channel");
                return Err(AmqpError::ChannelError);
            }
        };
        debug!("channel created");

        if self.config.publisher_confirms {
            if let Err(err) = channel
                .confirm_select(ConfirmSelectOptions { nowait: false })
                .await
            {
                error!(error = %err, "error to enable publisher confirms");
                return Err(AmqpError::ChannelError);
            }
        }

        let recovery_tx = self.recovery_tx.clone();
        connection.on_error(move |err| {
            error!(error = %err, "transport error, scheduling recovery");
            let _ = recovery_tx.send(());
        });

        *self.live.write().await = Some(Live { connection, channel });
        self.lifecycle.send_replace(ConnectionState::Connected);

        Ok(())
    }

    async fn recover(&self) {
        if self.closed.load(Ordering::SeqCst) || self.gave_up.load(Ordering::SeqCst) {
            return;
        }
        // stale wakeup: the connection already came back
        if let Some(live) = self.live.read().await.as_ref() {
            if live.connection.status().connected() {
                return;
            }
        }
        // single-flight: a failed connect and an async transport error must
        // not run two loops
        if self
            .recovering
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        self.live.write().await.take();
        self.lifecycle.send_replace(ConnectionState::Reconnecting);

        let max = self.config.reconnect_max_attempts;
        for attempt in 1..=max {
            tokio::time::sleep(self.config.reconnect_delay).await;

            if self.closed.load(Ordering::SeqCst) {
                self.recovering.store(false, Ordering::SeqCst);
                return;
            }

            match self.open().await {
                Ok(()) => {
                    info!(attempt, "connection recovered");
                    self.recovering.store(false, Ordering::SeqCst);
                    return;
                }
                Err(err) => {
                    warn!(error = %err, attempt, max, "recovery attempt failed");
                }
            }
        }

        error!("recovery attempts exhausted, transport is down");
        self.gave_up.store(true, Ordering::SeqCst);
        self.lifecycle.send_replace(ConnectionState::Disconnected);
        self.recovering.store(false, Ordering::SeqCst);
    }
}
