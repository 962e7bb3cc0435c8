//! Clustered fan-out over a Redis pub/sub backbone
//!
//! Every gateway process publishes delivery envelopes and membership
//! commands to two shared channels and subscribes to both, re-delivering to
//! its own sockets. Room membership itself stays process-local: each
//! process only tracks who is connected to it, the backbone is what lets a
//! publish on process A reach sockets on process B.
//!
//! Connection ownership (`conn:{id}` -> process id) lives in Redis with a
//! TTL so a crashed process's records disappear on their own.
//!
//! When Redis is unreachable the adapter flips to degraded mode: local
//! deliveries keep flowing, cross-process traffic is dropped, nothing
//! crashes and nothing is surfaced to clients.

use super::{
    apply_membership_local, deliver_local, DeliveryEnvelope, DeliveryTarget, FanoutAdapter,
    MemberTarget, MembershipCommand,
};
use crate::connection::ConnectionManager;
use async_trait::async_trait;
use beacon_cache::{
    FanoutChannel, Publisher, ReceivedMessage, RedisPool, Subscriber, SubscriberBuilder,
    SubscriberError,
};
use beacon_core::{ConnectionId, ProcessId};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Key prefix for the cross-process connection registry
const CONNECTION_KEY_PREFIX: &str = "conn:";

/// Configuration for the clustered adapter
#[derive(Debug, Clone)]
pub struct ClusterFanoutConfig {
    /// Redis URL for the subscriber connection
    pub redis_url: String,
    /// Broadcast buffer size for the subscriber
    pub broadcast_buffer: usize,
    /// Reconnection delay in milliseconds
    pub reconnect_delay_ms: u64,
    /// TTL of connection ownership records
    pub connection_ttl_seconds: u64,
}

impl Default for ClusterFanoutConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay_ms: 1000,
            connection_ttl_seconds: 86_400,
        }
    }
}

/// Redis-backed fan-out adapter
pub struct ClusterFanout {
    connections: Arc<ConnectionManager>,
    process_id: ProcessId,
    pool: RedisPool,
    publisher: Publisher,
    subscriber: Subscriber,
    connection_ttl: u64,
    degraded: AtomicBool,
    running: AtomicBool,
}

impl ClusterFanout {
    /// Create the adapter and subscribe to the fan-out channels.
    pub async fn new(
        config: ClusterFanoutConfig,
        pool: RedisPool,
        connections: Arc<ConnectionManager>,
        process_id: ProcessId,
    ) -> Result<Self, SubscriberError> {
        let subscriber = SubscriberBuilder::new()
            .redis_url(&config.redis_url)
            .broadcast_buffer(config.broadcast_buffer)
            .reconnect_delay_ms(config.reconnect_delay_ms)
            .subscribe(FanoutChannel::Deliveries)
            .subscribe(FanoutChannel::Membership)
            .build()
            .await?;

        Ok(Self {
            connections,
            process_id,
            publisher: Publisher::new(pool.clone()),
            pool,
            subscriber,
            connection_ttl: config.connection_ttl_seconds,
            degraded: AtomicBool::new(false),
            running: AtomicBool::new(false),
        })
    }

    /// Start the re-delivery loop.
    pub fn start(self: Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Cluster fan-out is already running");
            return;
        }

        tracing::info!(process_id = %self.process_id, "Cluster fan-out started");

        let adapter = self;
        tokio::spawn(async move {
            adapter.run().await;
        });
    }

    /// Stop the re-delivery loop.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.subscriber.shutdown().await.ok();
        tracing::info!("Cluster fan-out stopped");
    }

    async fn run(&self) {
        let mut receiver = self.subscriber.receiver();

        while self.running.load(Ordering::SeqCst) {
            match receiver.recv().await {
                Ok(msg) => {
                    self.handle_message(msg).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "Fan-out re-delivery lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::warn!("Fan-out subscriber channel closed");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Cluster fan-out loop ended");
    }

    /// Handle one message off the backbone.
    async fn handle_message(&self, msg: ReceivedMessage) {
        match msg.channel {
            FanoutChannel::Deliveries => match DeliveryEnvelope::from_json(&msg.payload) {
                Ok(envelope) => {
                    self.handle_delivery(envelope).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed delivery envelope");
                }
            },
            FanoutChannel::Membership => match MembershipCommand::from_json(&msg.payload) {
                Ok(command) => {
                    self.handle_membership(command).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed membership command");
                }
            },
            FanoutChannel::Custom(name) => {
                tracing::debug!(channel = %name, "Ignoring message on unknown channel");
            }
        }
    }

    /// Re-deliver an envelope published by another process.
    pub(crate) async fn handle_delivery(&self, envelope: DeliveryEnvelope) -> usize {
        // Local members already got this before we published it
        if envelope.origin == self.process_id {
            return 0;
        }

        let sent = deliver_local(
            &self.connections,
            &envelope.target,
            &envelope.event_name,
            envelope.payload,
        )
        .await;

        tracing::trace!(
            origin = %envelope.origin,
            event_name = %envelope.event_name,
            sent = sent,
            "Re-delivered remote envelope"
        );
        sent
    }

    /// Apply a membership command published by another process.
    pub(crate) async fn handle_membership(&self, command: MembershipCommand) -> usize {
        if command.origin == self.process_id {
            return 0;
        }
        apply_membership_local(&self.connections, &command).await
    }

    fn connection_key(connection_id: &ConnectionId) -> String {
        format!("{CONNECTION_KEY_PREFIX}{connection_id}")
    }

    /// Record the outcome of a backbone operation on the degraded flag.
    fn note_backbone<T, E: std::fmt::Display>(&self, what: &str, result: &Result<T, E>) {
        match result {
            Ok(_) => {
                if self.degraded.swap(false, Ordering::SeqCst) {
                    tracing::info!("Fan-out backbone recovered");
                }
            }
            Err(e) => {
                if !self.degraded.swap(true, Ordering::SeqCst) {
                    tracing::warn!(
                        error = %e,
                        operation = what,
                        "Fan-out backbone unreachable, degrading to local-only delivery"
                    );
                }
            }
        }
    }
}

#[async_trait]
impl FanoutAdapter for ClusterFanout {
    async fn publish(&self, target: DeliveryTarget, event_name: &str, payload: Value) -> usize {
        // Same-process members are served regardless of backbone health
        let sent = deliver_local(&self.connections, &target, event_name, payload.clone()).await;

        let envelope = DeliveryEnvelope {
            origin: self.process_id.clone(),
            target,
            event_name: event_name.to_string(),
            payload,
        };

        match envelope.to_json() {
            Ok(json) => {
                let result = self.publisher.publish(&FanoutChannel::Deliveries, &json).await;
                self.note_backbone("publish", &result);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize delivery envelope");
            }
        }

        sent
    }

    async fn announce_connection(&self, connection_id: &ConnectionId) {
        let result = self
            .pool
            .set_string(
                &Self::connection_key(connection_id),
                self.process_id.as_str(),
                self.connection_ttl,
            )
            .await;
        self.note_backbone("announce_connection", &result);
    }

    async fn refresh_connection(&self, connection_id: &ConnectionId) {
        let result = self
            .pool
            .expire(&Self::connection_key(connection_id), self.connection_ttl)
            .await;
        self.note_backbone("refresh_connection", &result);
    }

    async fn retire_connection(&self, connection_id: &ConnectionId) {
        let result = self.pool.delete(&Self::connection_key(connection_id)).await;
        self.note_backbone("retire_connection", &result);
    }

    async fn locate_connection(&self, connection_id: &ConnectionId) -> Option<ProcessId> {
        if self.connections.contains(connection_id) {
            return Some(self.process_id.clone());
        }

        match self.pool.get_string(&Self::connection_key(connection_id)).await {
            Ok(owner) => owner.map(ProcessId::new),
            Err(e) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "Connection registry lookup failed"
                );
                None
            }
        }
    }

    async fn forward_membership(&self, command: MembershipCommand) -> bool {
        let applied = apply_membership_local(&self.connections, &command).await;

        // A connection lives on exactly one process; if it was here there is
        // nothing to forward. Identity targets may span processes, so those
        // always go out.
        let needs_forward = match &command.target {
            MemberTarget::Connection { .. } => applied == 0,
            MemberTarget::Identity { .. } => true,
        };

        if !needs_forward {
            return true;
        }

        match command.to_json() {
            Ok(json) => {
                let result = self.publisher.publish(&FanoutChannel::Membership, &json).await;
                self.note_backbone("forward_membership", &result);
                result.is_ok() || applied > 0
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize membership command");
                applied > 0
            }
        }
    }

    fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    fn process_id(&self) -> &ProcessId {
        &self.process_id
    }
}

impl Drop for ClusterFanout {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
