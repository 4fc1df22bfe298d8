//! Transport port - the broker session used for publishing readings
//!
//! The wire protocol lives entirely in the adapter, and the MQTT and HTTP
//! adapters live in the board firmware, not in this crate. MQTT clients map
//! the operations one to one; an HTTP adapter treats `connect` as a
//! reachability check and the topic as the endpoint path.

use heapless::{String, Vec};

use crate::error::TransportError;

pub const MAX_TOPIC_LEN: usize = 64;
pub const MAX_INBOUND_PAYLOAD: usize = 256;

/// A message received on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String<MAX_TOPIC_LEN>,
    pub payload: Vec<u8, MAX_INBOUND_PAYLOAD>,
}

pub trait Transport {
    /// Configure the broker address. Called once when the session is built.
    fn set_server(&mut self, host: &str, port: u16);

    /// Attempt to open an authenticated session.
    ///
    /// A failure carries the client's status code for logging.
    fn connect(
        &mut self,
        client_id: &str,
        user: &str,
        password: &str,
    ) -> impl Future<Output = Result<(), TransportError>>;

    /// Non-blocking status read. May be stale when the network dropped underneath.
    fn is_connected(&self) -> bool;

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>>;

    fn subscribe(&mut self, topic: &str) -> impl Future<Output = Result<(), TransportError>>;

    /// Service the session (keep-alive, inbound traffic).
    ///
    /// Must be called often enough that the broker's keep-alive timeout never
    /// expires. Returns at most one inbound message per call.
    fn poll(&mut self) -> impl Future<Output = Option<InboundMessage>>;
}
