//! Scripted stand-ins for the radio, the broker and the barometer
//!
//! All peers read the current cycle from a shared [`World`], so outages
//! configured in cycles line up across the network, the broker and the
//! sensor.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::rc::Rc;
use std::time::Duration;

use baro_link_core::ports::{Barometer, InboundMessage, NetworkLink, Transport};
use baro_link_core::{SensorError, TransportError};
use embedded_hal_async::delay::DelayNs;
use log::debug;

use crate::settings::{Outage, SimulationConfig};

/// Client state reported when the broker refuses a connection
const STATE_CONNECT_FAILED: i8 = -2;

/// Shared simulation clock and scripted events.
pub struct World {
    cycle: Cell<u32>,
    network_outages: Vec<Outage>,
    broker_outages: Vec<Outage>,
    sensor_faults: Vec<Outage>,
    commands: RefCell<VecDeque<(u32, String)>>,
}

impl World {
    pub fn new(simulation: &SimulationConfig) -> Rc<Self> {
        let mut commands: Vec<(u32, String)> = simulation
            .commands
            .iter()
            .map(|c| (c.cycle, c.payload.clone()))
            .collect();
        commands.sort_by_key(|(cycle, _)| *cycle);

        Rc::new(Self {
            cycle: Cell::new(0),
            network_outages: simulation.network_outages.clone(),
            broker_outages: simulation.broker_outages.clone(),
            sensor_faults: simulation.sensor_faults.clone(),
            commands: RefCell::new(commands.into()),
        })
    }

    pub fn cycle(&self) -> u32 {
        self.cycle.get()
    }

    pub fn advance_to(&self, cycle: u32) {
        self.cycle.set(cycle);
    }

    pub fn network_up(&self) -> bool {
        !self.network_outages.iter().any(|o| o.covers(self.cycle()))
    }

    pub fn broker_up(&self) -> bool {
        !self.broker_outages.iter().any(|o| o.covers(self.cycle()))
    }

    pub fn sensor_ok(&self) -> bool {
        !self.sensor_faults.iter().any(|o| o.covers(self.cycle()))
    }

    /// Next command due at or before the current cycle.
    fn take_command(&self) -> Option<String> {
        let mut commands = self.commands.borrow_mut();
        match commands.front() {
            Some((cycle, _)) if *cycle <= self.cycle() => commands.pop_front().map(|(_, p)| p),
            _ => None,
        }
    }
}

pub struct SimNetwork {
    world: Rc<World>,
    begun: bool,
}

impl SimNetwork {
    pub fn new(world: Rc<World>) -> Self {
        Self {
            world,
            begun: false,
        }
    }
}

impl NetworkLink for SimNetwork {
    fn begin(&mut self, ssid: &str, _password: &str) {
        debug!("SIM: radio associating with {}", ssid);
        self.begun = true;
    }

    fn is_associated(&self) -> bool {
        self.begun && self.world.network_up()
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.is_associated().then_some(Ipv4Addr::new(192, 168, 4, 2))
    }
}

/// Broker session over the simulated network.
///
/// The session flag is only cleared by a broker outage or a failed publish,
/// so during a network outage `is_connected` keeps reporting the old session
/// like a real client does until its next I/O.
pub struct SimBroker {
    world: Rc<World>,
    server: Option<(String, u16)>,
    connected: Cell<bool>,
    subscriptions: Vec<String>,
    published: u32,
}

impl SimBroker {
    pub fn new(world: Rc<World>) -> Self {
        Self {
            world,
            server: None,
            connected: Cell::new(false),
            subscriptions: Vec::new(),
            published: 0,
        }
    }

    pub fn published(&self) -> u32 {
        self.published
    }
}

impl Transport for SimBroker {
    fn set_server(&mut self, host: &str, port: u16) {
        self.server = Some((host.to_string(), port));
    }

    async fn connect(
        &mut self,
        client_id: &str,
        _user: &str,
        _password: &str,
    ) -> Result<(), TransportError> {
        if self.server.is_none() || !self.world.network_up() || !self.world.broker_up() {
            return Err(TransportError::ConnectFailed {
                state: STATE_CONNECT_FAILED,
            });
        }
        debug!("SIM: broker accepted {}", client_id);
        self.connected.set(true);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        if self.connected.get() && !self.world.broker_up() {
            self.connected.set(false);
        }
        self.connected.get()
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if !self.world.network_up() {
            self.connected.set(false);
            return Err(TransportError::PublishFailed);
        }
        debug!(
            "SIM: {} <- {}",
            topic,
            String::from_utf8_lossy(payload)
        );
        self.published += 1;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::SubscribeFailed);
        }
        if !self.subscriptions.iter().any(|t| t == topic) {
            self.subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    async fn poll(&mut self) -> Option<InboundMessage> {
        if !self.world.network_up() {
            return None;
        }
        let topic = self.subscriptions.first()?;
        let payload = self.world.take_command()?;

        let mut message = InboundMessage {
            topic: heapless::String::new(),
            payload: heapless::Vec::new(),
        };
        message.topic.push_str(topic).ok()?;
        message.payload.extend_from_slice(payload.as_bytes()).ok()?;
        Some(message)
    }
}

/// Barometer producing a slow synthetic weather pattern.
pub struct SimBarometer {
    world: Rc<World>,
}

impl SimBarometer {
    pub fn new(world: Rc<World>) -> Self {
        Self { world }
    }

    fn phase(&self) -> f64 {
        f64::from(self.world.cycle())
    }

    fn check(&self, operation: &'static str) -> Result<(), SensorError> {
        if self.world.sensor_ok() {
            Ok(())
        } else {
            Err(SensorError::ReadFailed {
                sensor: "sim-baro",
                operation,
            })
        }
    }
}

impl Barometer for SimBarometer {
    async fn begin(&mut self) -> Result<(), SensorError> {
        if self.world.sensor_ok() {
            Ok(())
        } else {
            Err(SensorError::InitializationFailed {
                sensor: "sim-baro",
                details: "no response on I2C",
            })
        }
    }

    async fn read_pressure(&mut self) -> Result<f32, SensorError> {
        self.check("read pressure")?;
        let t = self.phase();
        // 1003-1023 hPa with a slower drift on top
        let pressure = 101_325.0 + 1_000.0 * (t / 40.0).sin() + 150.0 * (t / 7.0).cos();
        Ok(pressure as f32)
    }

    async fn read_temperature(&mut self) -> Result<f32, SensorError> {
        self.check("read temperature")?;
        let t = self.phase();
        let temperature = 21.0 + 3.0 * (t / 25.0).sin() + 0.4 * (t / 5.0).cos();
        Ok(temperature as f32)
    }
}

/// Blocking delay scaled against wall-clock time.
pub struct StdDelay {
    scale: f64,
}

impl StdDelay {
    pub fn new(scale: f64) -> Self {
        Self {
            scale: scale.max(0.0),
        }
    }
}

impl DelayNs for StdDelay {
    async fn delay_ns(&mut self, ns: u32) {
        let scaled = (f64::from(ns) * self.scale) as u64;
        if scaled > 0 {
            std::thread::sleep(Duration::from_nanos(scaled));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ScriptedCommand;
    use embassy_futures::block_on;

    fn world() -> Rc<World> {
        World::new(&SimulationConfig {
            network_outages: vec![Outage { from: 2, until: 3 }],
            broker_outages: vec![Outage { from: 5, until: 5 }],
            sensor_faults: vec![Outage { from: 7, until: 7 }],
            commands: vec![ScriptedCommand {
                cycle: 1,
                payload: String::from("purge"),
            }],
            ..SimulationConfig::default()
        })
    }

    #[test]
    fn test_network_follows_outages() {
        let world = world();
        let mut network = SimNetwork::new(world.clone());
        assert!(!network.is_associated());

        network.begin("lab", "secret");
        assert!(network.is_associated());

        world.advance_to(2);
        assert!(!network.is_associated());
        assert_eq!(network.local_address(), None);
    }

    #[test]
    fn test_session_goes_stale_during_network_outage() {
        let world = world();
        let mut broker = SimBroker::new(world.clone());
        broker.set_server("localhost", 1883);
        assert_eq!(block_on(broker.connect("id", "", "")), Ok(()));

        world.advance_to(2);
        assert!(broker.is_connected());
        assert_eq!(
            block_on(broker.publish("t", b"x")),
            Err(TransportError::PublishFailed)
        );
        assert!(!broker.is_connected());
        assert_eq!(
            block_on(broker.connect("id", "", "")),
            Err(TransportError::ConnectFailed { state: -2 })
        );
    }

    #[test]
    fn test_broker_outage_drops_session() {
        let world = world();
        let mut broker = SimBroker::new(world.clone());
        broker.set_server("localhost", 1883);
        block_on(broker.connect("id", "", "")).unwrap();

        world.advance_to(5);
        assert!(!broker.is_connected());
        world.advance_to(6);
        assert!(!broker.is_connected());
        assert_eq!(block_on(broker.connect("id", "", "")), Ok(()));
        assert_eq!(block_on(broker.publish("t", b"x")), Ok(()));
        assert_eq!(broker.published(), 1);
    }

    #[test]
    fn test_commands_arrive_on_subscribed_topic() {
        let world = world();
        let mut broker = SimBroker::new(world.clone());
        broker.set_server("localhost", 1883);
        block_on(broker.connect("id", "", "")).unwrap();
        assert_eq!(block_on(broker.poll()), None);

        block_on(broker.subscribe("node/cmd")).unwrap();
        assert_eq!(block_on(broker.poll()), None);

        world.advance_to(1);
        let message = block_on(broker.poll()).unwrap();
        assert_eq!(message.topic.as_str(), "node/cmd");
        assert_eq!(message.payload.as_slice(), b"purge");
        assert_eq!(block_on(broker.poll()), None);
    }

    #[test]
    fn test_barometer_fault_window() {
        let world = world();
        let mut sensor = SimBarometer::new(world.clone());
        let pressure = block_on(sensor.read_pressure()).unwrap();
        assert!((100_000.0..103_000.0).contains(&pressure));

        world.advance_to(7);
        assert!(block_on(sensor.begin()).is_err());
        assert!(block_on(sensor.read_temperature()).is_err());
    }
}
