//! Scripted port implementations for unit tests

use core::cell::Cell;
use core::net::Ipv4Addr;
use std::collections::{BTreeMap, VecDeque};

use embedded_hal_async::delay::DelayNs;

use crate::config::FromTruncated;
use crate::error::{SensorError, StorageError, TransportError};
use crate::ports::{BackupVolume, Barometer, InboundMessage, NetworkLink, Transport};

/// Network that is up, down, or comes up after a number of status polls.
pub struct MockNetwork {
    associated: Cell<bool>,
    associate_after: Option<u32>,
    polls_since_begin: Cell<u32>,
    begin_calls: u32,
    last_ssid: Option<String>,
}

impl MockNetwork {
    fn with(associated: bool, associate_after: Option<u32>) -> Self {
        Self {
            associated: Cell::new(associated),
            associate_after,
            polls_since_begin: Cell::new(0),
            begin_calls: 0,
            last_ssid: None,
        }
    }

    pub fn associated() -> Self {
        Self::with(true, None)
    }

    pub fn down() -> Self {
        Self::with(false, None)
    }

    /// Associates on the `polls`-th status read after `begin`.
    pub fn associates_after(polls: u32) -> Self {
        Self::with(false, Some(polls))
    }

    pub fn begin_calls(&self) -> u32 {
        self.begin_calls
    }

    pub fn last_ssid(&self) -> Option<String> {
        self.last_ssid.clone()
    }
}

impl NetworkLink for MockNetwork {
    fn begin(&mut self, ssid: &str, _password: &str) {
        self.begin_calls += 1;
        self.last_ssid = Some(ssid.to_string());
    }

    fn is_associated(&self) -> bool {
        if self.associated.get() {
            return true;
        }
        if let (Some(after), true) = (self.associate_after, self.begin_calls > 0) {
            let polls = self.polls_since_begin.get() + 1;
            self.polls_since_begin.set(polls);
            if polls >= after {
                self.associated.set(true);
            }
        }
        self.associated.get()
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.associated
            .get()
            .then_some(Ipv4Addr::new(192, 168, 1, 50))
    }
}

#[derive(Default)]
pub struct MockTransport {
    connected: bool,
    server: Option<(String, u16)>,
    connect_failures: u32,
    failure_state: i8,
    connect_attempts: u32,
    last_client_id: Option<String>,
    publish_failures: u32,
    publish_budget: Option<u32>,
    published: Vec<(String, String)>,
    subscriptions: Vec<String>,
    fail_subscribes: bool,
    subscribe_attempts: u32,
    inbound: VecDeque<InboundMessage>,
    polls: u32,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Fail the next `count` connects with client state `state`.
    pub fn fail_connects(&mut self, count: u32, state: i8) {
        self.connect_failures = count;
        self.failure_state = state;
    }

    /// Reject the next `count` publishes.
    pub fn fail_publishes(&mut self, count: u32) {
        self.publish_failures = count;
    }

    /// Accept `count` publishes, then reject every one after.
    pub fn fail_publishes_after(&mut self, count: u32) {
        self.publish_budget = Some(count);
    }

    pub fn fail_subscribes(&mut self, fail: bool) {
        self.fail_subscribes = fail;
    }

    pub fn queue_inbound(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push_back(InboundMessage {
            topic: heapless::String::from_truncated(topic),
            payload: heapless::Vec::from_slice(payload).unwrap(),
        });
    }

    pub fn server(&self) -> Option<(&str, u16)> {
        self.server.as_ref().map(|(h, p)| (h.as_str(), *p))
    }

    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts
    }

    pub fn last_client_id(&self) -> Option<String> {
        self.last_client_id.clone()
    }

    pub fn published(&self) -> &Vec<(String, String)> {
        &self.published
    }

    pub fn subscriptions(&self) -> &Vec<String> {
        &self.subscriptions
    }

    pub fn subscribe_attempts(&self) -> u32 {
        self.subscribe_attempts
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }
}

impl Transport for MockTransport {
    fn set_server(&mut self, host: &str, port: u16) {
        self.server = Some((host.to_string(), port));
    }

    async fn connect(
        &mut self,
        client_id: &str,
        _user: &str,
        _password: &str,
    ) -> Result<(), TransportError> {
        self.connect_attempts += 1;
        self.last_client_id = Some(client_id.to_string());
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(TransportError::ConnectFailed {
                state: self.failure_state,
            });
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        if self.publish_failures > 0 {
            self.publish_failures -= 1;
            return Err(TransportError::PublishFailed);
        }
        if let Some(budget) = self.publish_budget.as_mut() {
            if *budget == 0 {
                return Err(TransportError::PublishFailed);
            }
            *budget -= 1;
        }
        self.published.push((
            topic.to_string(),
            String::from_utf8_lossy(payload).into_owned(),
        ));
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.subscribe_attempts += 1;
        if self.fail_subscribes {
            return Err(TransportError::SubscribeFailed);
        }
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    async fn poll(&mut self) -> Option<InboundMessage> {
        self.polls += 1;
        self.inbound.pop_front()
    }
}

/// Records requested waits instead of sleeping.
#[derive(Debug, Default)]
pub struct MockDelay {
    total_ns: u64,
}

impl MockDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }

    async fn delay_us(&mut self, us: u32) {
        self.total_ns += u64::from(us) * 1_000;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.total_ns += u64::from(ms) * 1_000_000;
    }
}

/// In-memory volume; `absent()` models a missing SD card.
pub struct MemoryVolume {
    files: BTreeMap<String, Vec<u8>>,
    present: bool,
    fail_appends: bool,
    tear_next_append: Option<usize>,
    mount_attempts: u32,
    append_calls: u32,
}

impl MemoryVolume {
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            present: true,
            fail_appends: false,
            tear_next_append: None,
            mount_attempts: 0,
            append_calls: 0,
        }
    }

    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::new()
        }
    }

    pub fn preload(&mut self, file: &str, bytes: &[u8]) {
        self.files.insert(file.to_string(), bytes.to_vec());
    }

    pub fn fail_appends(&mut self, fail: bool) {
        self.fail_appends = fail;
    }

    /// Write only the first `keep` bytes of the next append, then fail it.
    pub fn tear_next_append(&mut self, keep: usize) {
        self.tear_next_append = Some(keep);
    }

    pub fn contents(&self, file: &str) -> &[u8] {
        self.files.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn mount_attempts(&self) -> u32 {
        self.mount_attempts
    }

    pub fn append_calls(&self) -> u32 {
        self.append_calls
    }
}

impl BackupVolume for MemoryVolume {
    fn mount(&mut self) -> Result<(), StorageError> {
        self.mount_attempts += 1;
        if self.present {
            Ok(())
        } else {
            Err(StorageError::OpenFailed)
        }
    }

    fn append(&mut self, file: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.append_calls += 1;
        if !self.present || self.fail_appends {
            return Err(StorageError::WriteFailed);
        }
        let log = self.files.entry(file.to_string()).or_default();
        if let Some(keep) = self.tear_next_append.take() {
            log.extend_from_slice(&bytes[..keep.min(bytes.len())]);
            return Err(StorageError::WriteFailed);
        }
        log.extend_from_slice(bytes);
        Ok(())
    }

    fn write(&mut self, file: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if !self.present {
            return Err(StorageError::WriteFailed);
        }
        self.files.insert(file.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&mut self, file: &str) -> Result<Vec<u8>, StorageError> {
        if !self.present {
            return Err(StorageError::ReadFailed);
        }
        Ok(self.files.get(file).cloned().unwrap_or_default())
    }
}

pub struct MockBarometer {
    pressure: f32,
    temperature: f32,
    failing: bool,
    begin_calls: u32,
}

impl MockBarometer {
    pub fn new(pressure: f32, temperature: f32) -> Self {
        Self {
            pressure,
            temperature,
            failing: false,
            begin_calls: 0,
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new(0.0, 0.0)
        }
    }

    pub fn recover(&mut self) {
        self.failing = false;
    }

    pub fn begin_calls(&self) -> u32 {
        self.begin_calls
    }
}

impl Barometer for MockBarometer {
    async fn begin(&mut self) -> Result<(), SensorError> {
        self.begin_calls += 1;
        if self.failing {
            return Err(SensorError::InitializationFailed {
                sensor: "mock",
                details: "not responding",
            });
        }
        Ok(())
    }

    async fn read_pressure(&mut self) -> Result<f32, SensorError> {
        if self.failing {
            return Err(SensorError::ReadFailed {
                sensor: "mock",
                operation: "read pressure",
            });
        }
        Ok(self.pressure)
    }

    async fn read_temperature(&mut self) -> Result<f32, SensorError> {
        if self.failing {
            return Err(SensorError::ReadFailed {
                sensor: "mock",
                operation: "read temperature",
            });
        }
        Ok(self.temperature)
    }
}
