use embedded_hal_async::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::backup::BackupStore;
use crate::config::Config;
use crate::error::StorageError;
use crate::link::{ConnectionEstablisher, Session};
use crate::measurement::Measurement;
use crate::ports::{BackupVolume, NetworkLink, Transport};

/// Result of one end-to-end delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted by the transport
    Published,
    /// Persisted to the backup log for later delivery
    BackedUp,
    /// Lost: neither the live path nor the backup path worked
    Dropped,
}

/// Running totals since boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryStats {
    pub published: u32,
    pub backed_up: u32,
    pub dropped: u32,
}

impl DeliveryStats {
    fn record(&mut self, outcome: DeliveryOutcome) {
        let counter = match outcome {
            DeliveryOutcome::Published => &mut self.published,
            DeliveryOutcome::BackedUp => &mut self.backed_up,
            DeliveryOutcome::Dropped => &mut self.dropped,
        };
        *counter = counter.saturating_add(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayReport {
    pub republished: usize,
    pub remaining: usize,
}

/// Decides, per measurement, between publishing now and persisting locally.
///
/// Errors never escape [`deliver`](Self::deliver): link failures, publish
/// failures and storage failures are logged and folded into a
/// [`DeliveryOutcome`].
pub struct DeliveryCoordinator<V, D> {
    config: Config,
    establisher: ConnectionEstablisher<D>,
    backup: BackupStore<V>,
    stats: DeliveryStats,
}

impl<V, D> DeliveryCoordinator<V, D>
where
    V: BackupVolume,
    D: DelayNs,
{
    pub fn new(config: Config, volume: V, delay: D) -> Self {
        let establisher = ConnectionEstablisher::new(config.retry, delay);
        let backup = BackupStore::new(volume, &config.delivery.backup_file);
        Self {
            config,
            establisher,
            backup,
            stats: DeliveryStats::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> DeliveryStats {
        self.stats
    }

    pub fn establisher(&self) -> &ConnectionEstablisher<D> {
        &self.establisher
    }

    pub fn backup(&self) -> &BackupStore<V> {
        &self.backup
    }

    pub fn backup_mut(&mut self) -> &mut BackupStore<V> {
        &mut self.backup
    }

    /// Deliver one measurement.
    ///
    /// 1. Encode the payload
    /// 2. Refresh the link state, restoring the links if delivery is unavailable
    /// 3. Publish when both links are up
    /// 4. Otherwise, or when the publish is rejected, append to the backup log
    pub async fn deliver<N, T>(
        &mut self,
        session: &mut Session<N, T>,
        measurement: &Measurement,
    ) -> DeliveryOutcome
    where
        N: NetworkLink,
        T: Transport,
    {
        let payload = match measurement.encode() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Dropping measurement @{}: {}", measurement.timestamp(), e);
                return self.finish(DeliveryOutcome::Dropped);
            }
        };

        if !session.refresh().is_delivery_available() {
            if let Err(e) = self.establisher.restore(session, &self.config).await {
                warn!("Links not restored: {}", e);
            }
            session.refresh();
        }

        if session.is_delivery_available() {
            match session
                .transport_mut()
                .publish(&self.config.delivery.topic, payload.as_bytes())
                .await
            {
                Ok(()) => {
                    debug!("Published to {}: {}", self.config.delivery.topic, payload);
                    return self.finish(DeliveryOutcome::Published);
                }
                Err(e) => warn!("Publish failed, routing to backup: {}", e),
            }
        }

        match self.backup.append(&payload) {
            Ok(record) => {
                info!("Measurement backed up as record #{}", record.append_order);
                self.finish(DeliveryOutcome::BackedUp)
            }
            Err(e) => {
                error!("Measurement @{} lost: {}", measurement.timestamp(), e);
                self.finish(DeliveryOutcome::Dropped)
            }
        }
    }

    /// Republish backed-up records, oldest first.
    ///
    /// Only runs when delivery is available; stops at the first rejected
    /// publish and removes the republished prefix from the log. Never called
    /// implicitly by [`deliver`](Self::deliver).
    pub async fn replay_backlog<N, T>(
        &mut self,
        session: &mut Session<N, T>,
    ) -> Result<ReplayReport, StorageError>
    where
        N: NetworkLink,
        T: Transport,
    {
        let pending = self.backup.list_pending()?;

        if !session.refresh().is_delivery_available() {
            debug!("Replay skipped, delivery unavailable");
            return Ok(ReplayReport {
                republished: 0,
                remaining: pending.len(),
            });
        }

        let mut republished = 0;
        for record in &pending {
            match session
                .transport_mut()
                .publish(&self.config.delivery.topic, record.payload.as_bytes())
                .await
            {
                Ok(()) => republished += 1,
                Err(e) => {
                    warn!("Replay stopped at record #{}: {}", record.append_order, e);
                    break;
                }
            }
        }

        self.backup.discard_oldest(republished)?;

        let report = ReplayReport {
            republished,
            remaining: pending.len() - republished,
        };
        if report.republished > 0 {
            info!(
                "Replayed {} backed-up records, {} remaining",
                report.republished, report.remaining
            );
        }
        Ok(report)
    }

    fn finish(&mut self, outcome: DeliveryOutcome) -> DeliveryOutcome {
        self.stats.record(outcome);
        outcome
    }
}
