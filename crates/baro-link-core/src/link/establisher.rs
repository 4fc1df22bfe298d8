use embedded_hal_async::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::config::{BrokerConfig, Config, InternetConfig, RetryPolicy};
use crate::error::{LinkError, TransportError};
use crate::ports::{NetworkLink, Transport};

use super::Session;

/// Brings links back up with bounded, paced retries.
///
/// Each `ensure_*` call waits on the injected delay between attempts and
/// gives up with a typed [`LinkError`] once the [`RetryPolicy`] budget is
/// spent, so the caller can fall back to local backup instead of hanging.
pub struct ConnectionEstablisher<D> {
    policy: RetryPolicy,
    delay: D,
}

impl<D: DelayNs> ConnectionEstablisher<D> {
    pub fn new(policy: RetryPolicy, delay: D) -> Self {
        Self { policy, delay }
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Associate with the access point unless already associated.
    ///
    /// Issues a single `begin` and then polls the status every
    /// `network_poll_interval_ms`, at most `network_max_polls` times (at
    /// least once).
    pub async fn ensure_network<N: NetworkLink>(
        &mut self,
        network: &mut N,
        credentials: &InternetConfig,
    ) -> Result<(), LinkError> {
        if network.is_associated() {
            return Ok(());
        }

        info!("Connecting to SSID {}", credentials.ssid);
        network.begin(&credentials.ssid, &credentials.password);

        let max_polls = self.policy.network_max_polls.max(1);
        for poll in 1..=max_polls {
            self.delay
                .delay_ms(self.policy.network_poll_interval_ms)
                .await;

            if network.is_associated() {
                match network.local_address() {
                    Some(addr) => info!("Network associated after {} polls, address {}", poll, addr),
                    None => info!("Network associated after {} polls", poll),
                }
                return Ok(());
            }
            debug!("Waiting for association ({}/{})", poll, max_polls);
        }

        warn!("Network not associated after {} polls", max_polls);
        Err(LinkError::NetworkTimeout { polls: max_polls })
    }

    /// Open a broker session unless one is already active.
    ///
    /// Waits `broker_backoff_ms` between failed attempts, not after the last.
    pub async fn ensure_broker<T: Transport>(
        &mut self,
        transport: &mut T,
        credentials: &BrokerConfig,
    ) -> Result<(), LinkError> {
        if transport.is_connected() {
            return Ok(());
        }

        let attempts = self.policy.broker_max_attempts.max(1);
        let mut last = TransportError::NotConnected;

        for attempt in 1..=attempts {
            info!(
                "Connecting to broker {}:{} ({}/{})",
                credentials.host, credentials.port, attempt, attempts
            );

            match transport
                .connect(&credentials.client_id, &credentials.user, &credentials.password)
                .await
            {
                Ok(()) => {
                    info!("Connected to broker as {}", credentials.client_id);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Broker connect failed: {}", e);
                    last = e;
                }
            }

            if attempt < attempts {
                debug!("Retrying in {} ms", self.policy.broker_backoff_ms);
                self.delay.delay_ms(self.policy.broker_backoff_ms).await;
            }
        }

        error!("Broker unavailable after {} attempts", attempts);
        Err(LinkError::BrokerUnavailable { attempts, last })
    }

    /// Restore whichever link is down, network first.
    ///
    /// The broker is never attempted without network association. A fresh
    /// broker session re-subscribes to the configured command topic.
    pub async fn restore<N, T>(
        &mut self,
        session: &mut Session<N, T>,
        config: &Config,
    ) -> Result<(), LinkError>
    where
        N: NetworkLink,
        T: Transport,
    {
        self.ensure_network(session.network_mut(), &config.internet)
            .await?;

        if !session.network().is_associated() {
            return Err(LinkError::NetworkDown);
        }

        let was_connected = session.transport().is_connected();
        self.ensure_broker(session.transport_mut(), &config.broker)
            .await?;

        if !was_connected {
            if let Some(topic) = &config.delivery.subscribe_topic {
                // Subscription failure does not affect delivery.
                if let Err(e) = session.subscribe(topic).await {
                    warn!("Subscription to {} failed: {}", topic, e);
                }
            }
        }

        Ok(())
    }
}
