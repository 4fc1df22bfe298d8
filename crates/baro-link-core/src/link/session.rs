use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use log::{debug, info, warn};

use crate::config::BrokerConfig;
use crate::error::TransportError;
use crate::ports::{InboundMessage, NetworkLink, Transport};

use super::{LinkMonitor, LinkState};

/// The one live connection of the node.
///
/// Owns the network handle, the transport client and the [`LinkMonitor`]
/// that tracks them. Reconnect logic and publish logic both borrow this
/// object; there is no other path to the transport.
pub struct Session<N, T> {
    network: N,
    transport: T,
    monitor: LinkMonitor,
}

/// Session shared between the sampling task and the keep-alive task.
///
/// Whoever holds the lock is the single writer of the link state.
pub type SharedSession<N, T> = AsyncMutex<CriticalSectionRawMutex, Session<N, T>>;

impl<N, T> Session<N, T>
where
    N: NetworkLink,
    T: Transport,
{
    /// Build the session and point the transport at the configured broker.
    pub fn new(network: N, mut transport: T, broker: &BrokerConfig) -> Self {
        transport.set_server(&broker.host, broker.port);
        Self {
            network,
            transport,
            monitor: LinkMonitor::new(),
        }
    }

    pub fn into_shared(self) -> SharedSession<N, T> {
        AsyncMutex::new(self)
    }

    pub fn refresh(&mut self) -> LinkState {
        self.monitor.refresh(&self.network, &self.transport)
    }

    pub fn is_delivery_available(&self) -> bool {
        self.monitor.is_delivery_available()
    }

    pub fn link_state(&self) -> LinkState {
        self.monitor.state()
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Subscribe to `topic` if a broker session is up.
    pub async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if !self.transport.is_connected() {
            warn!("Subscription to {} failed, no broker session", topic);
            return Err(TransportError::NotConnected);
        }

        self.transport.subscribe(topic).await?;
        info!("Subscribed to {}", topic);
        Ok(())
    }

    /// Service the transport once and hand any inbound message to `on_message`.
    ///
    /// Returns `true` when a message was delivered to the handler.
    pub async fn service<F>(&mut self, on_message: F) -> bool
    where
        F: FnOnce(InboundMessage),
    {
        if !self.transport.is_connected() {
            return false;
        }

        match self.transport.poll().await {
            Some(message) => {
                debug!(
                    "Inbound message on {} ({} bytes)",
                    message.topic,
                    message.payload.len()
                );
                on_message(message);
                true
            }
            None => false,
        }
    }
}

/// One keep-alive pass over a shared session.
///
/// Intended to be called from its own task, frequently enough that the
/// broker's keep-alive timeout never expires. The lock is only held for the
/// duration of a single poll.
pub async fn keep_alive<N, T, F>(shared: &SharedSession<N, T>, on_message: F) -> bool
where
    N: NetworkLink,
    T: Transport,
    F: FnOnce(InboundMessage),
{
    let mut session = shared.lock().await;
    session.service(on_message).await
}
