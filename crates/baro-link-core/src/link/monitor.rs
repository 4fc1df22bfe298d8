use log::{debug, info};

use crate::ports::{NetworkLink, Transport};

/// Last observed status of both links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkState {
    pub network_associated: bool,
    pub broker_session_active: bool,
}

impl LinkState {
    pub const fn is_delivery_available(self) -> bool {
        self.network_associated && self.broker_session_active
    }
}

/// Tracks [`LinkState`] from non-blocking status checks.
///
/// The monitor never connects anything; it only records what the network
/// and transport report. A transport that still claims a session while the
/// network is gone is treated as stale, so `broker_session_active` always
/// implies `network_associated`.
#[derive(Debug, Default)]
pub struct LinkMonitor {
    state: LinkState,
}

impl LinkMonitor {
    pub const fn new() -> Self {
        Self {
            state: LinkState {
                network_associated: false,
                broker_session_active: false,
            },
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_delivery_available(&self) -> bool {
        self.state.is_delivery_available()
    }

    /// Re-check both layers and record the result.
    pub fn refresh<N: NetworkLink, T: Transport>(&mut self, network: &N, transport: &T) -> LinkState {
        let network_associated = network.is_associated();
        let transport_connected = transport.is_connected();

        if transport_connected && !network_associated {
            debug!("Transport reports a session without network, treating it as stale");
        }

        let next = LinkState {
            network_associated,
            broker_session_active: network_associated && transport_connected,
        };

        if next.network_associated != self.state.network_associated {
            info!(
                "Network {}",
                if next.network_associated { "associated" } else { "lost" }
            );
        }
        if next.broker_session_active != self.state.broker_session_active {
            info!(
                "Broker session {}",
                if next.broker_session_active { "up" } else { "down" }
            );
        }

        self.state = next;
        next
    }
}
