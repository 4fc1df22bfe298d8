//! Periodic sampling cycle of the sensor node

use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

use crate::delivery::{DeliveryCoordinator, DeliveryOutcome};
use crate::error::SensorError;
use crate::link::Session;
use crate::measurement::Measurement;
use crate::ports::{BackupVolume, Barometer, NetworkLink, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRunState {
    Uninitialized,
    SensorReady,
    Running,
    SensorFault,
}

/// Owns the sensor and the delivery coordinator; called once per sampling period.
pub struct TelemetryNode<S, V, D> {
    sensor: S,
    coordinator: DeliveryCoordinator<V, D>,
    run_state: NodeRunState,
}

impl<S, V, D> TelemetryNode<S, V, D>
where
    S: Barometer,
    V: BackupVolume,
    D: DelayNs,
{
    pub fn new(sensor: S, coordinator: DeliveryCoordinator<V, D>) -> Self {
        Self {
            sensor,
            coordinator,
            run_state: NodeRunState::Uninitialized,
        }
    }

    pub fn run_state(&self) -> NodeRunState {
        self.run_state
    }

    pub fn coordinator(&self) -> &DeliveryCoordinator<V, D> {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut DeliveryCoordinator<V, D> {
        &mut self.coordinator
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Initialize the sensor
    pub async fn init(&mut self) -> Result<(), SensorError> {
        match self.sensor.begin().await {
            Ok(()) => {
                info!("Barometer ready");
                self.run_state = NodeRunState::SensorReady;
                Ok(())
            }
            Err(e) => {
                error!("Barometer init failed: {}", e);
                self.run_state = NodeRunState::SensorFault;
                Err(e)
            }
        }
    }

    /// Run one sampling cycle.
    ///
    /// Returns `None` when no measurement could be taken; the cycle is
    /// skipped and the sensor is re-initialized on the next one.
    pub async fn tick<N, T>(
        &mut self,
        session: &mut Session<N, T>,
        timestamp: u32,
    ) -> Option<DeliveryOutcome>
    where
        N: NetworkLink,
        T: Transport,
    {
        if matches!(
            self.run_state,
            NodeRunState::Uninitialized | NodeRunState::SensorFault
        ) && self.init().await.is_err()
        {
            return None;
        }

        let measurement = match Measurement::sample(&mut self.sensor, timestamp).await {
            Ok(m) => m,
            Err(e) => {
                warn!("Skipping cycle @{}: {}", timestamp, e);
                self.run_state = NodeRunState::SensorFault;
                return None;
            }
        };
        self.run_state = NodeRunState::Running;

        let was_available = session.link_state().is_delivery_available();
        let outcome = self.coordinator.deliver(session, &measurement).await;

        if outcome == DeliveryOutcome::Published
            && !was_available
            && self.coordinator.config().delivery.replay_on_reconnect
        {
            if let Err(e) = self.coordinator.replay_backlog(session).await {
                warn!("Backlog replay failed: {}", e);
            }
        }

        Some(outcome)
    }
}
