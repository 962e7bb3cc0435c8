//! Gateway state
//!
//! The dependency-injection container for the server: verifier, membership,
//! dispatcher, presence, and relay are separate pieces composed here once
//! at startup.

use crate::admin::GatewayHandle;
use crate::auth::IdentityVerifier;
use crate::connection::ConnectionManager;
use crate::dispatch::MulticastDispatcher;
use crate::fanout::FanoutAdapter;
use crate::relay::ActionRelay;
use crate::rooms::RoomMembership;
use beacon_common::AppConfig;
use beacon_core::PresenceTracker;
use std::sync::Arc;

/// Gateway application state
#[derive(Clone)]
pub struct GatewayState {
    config: Arc<AppConfig>,
    connections: Arc<ConnectionManager>,
    membership: Arc<RoomMembership>,
    multicast: Arc<MulticastDispatcher>,
    verifier: Arc<IdentityVerifier>,
    relay: Arc<ActionRelay>,
    presence: Arc<dyn PresenceTracker>,
    fanout: Arc<dyn FanoutAdapter>,
}

impl GatewayState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AppConfig,
        connections: Arc<ConnectionManager>,
        membership: Arc<RoomMembership>,
        multicast: Arc<MulticastDispatcher>,
        verifier: Arc<IdentityVerifier>,
        relay: Arc<ActionRelay>,
        presence: Arc<dyn PresenceTracker>,
        fanout: Arc<dyn FanoutAdapter>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            connections,
            membership,
            multicast,
            verifier,
            relay,
            presence,
            fanout,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn membership(&self) -> &RoomMembership {
        &self.membership
    }

    pub fn multicast(&self) -> &MulticastDispatcher {
        &self.multicast
    }

    pub fn verifier(&self) -> &IdentityVerifier {
        &self.verifier
    }

    pub fn relay(&self) -> &ActionRelay {
        &self.relay
    }

    pub fn presence(&self) -> &Arc<dyn PresenceTracker> {
        &self.presence
    }

    pub fn fanout(&self) -> &Arc<dyn FanoutAdapter> {
        &self.fanout
    }

    /// Handle for backend services to drive the gateway.
    #[must_use]
    pub fn handle(&self) -> GatewayHandle {
        GatewayHandle::new(
            self.membership.clone(),
            self.multicast.clone(),
            self.presence.clone(),
            self.connections.clone(),
            self.fanout.clone(),
        )
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("connections", &self.connections)
            .field("process_id", &self.config.process_id)
            .finish()
    }
}
