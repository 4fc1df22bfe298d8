//! Error types shared across the delivery path

use thiserror_no_std::Error;

/// Failure to bring a link up within the configured attempt budget.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    #[error("network not associated after {polls} status polls")]
    NetworkTimeout { polls: u32 },
    #[error("broker session not established after {attempts} attempts: {last}")]
    BrokerUnavailable {
        attempts: u32,
        last: TransportError,
    },
    #[error("network is down, broker connection not attempted")]
    NetworkDown,
}

/// Errors surfaced by a [`Transport`](crate::ports::Transport) adapter.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// `state` is the client's own status code, kept for diagnostics.
    #[error("connect failed with client state {state}")]
    ConnectFailed { state: i8 },
    #[error("no broker session")]
    NotConnected,
    #[error("publish was not accepted by the client")]
    PublishFailed,
    #[error("subscribe was not accepted by the client")]
    SubscribeFailed,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage device could not be mounted")]
    OpenFailed,
    #[error("backup log could not be opened or written")]
    WriteFailed,
    #[error("backup log could not be read")]
    ReadFailed,
    #[error("payload contains a record terminator")]
    InvalidPayload,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor} initialization failed: {details}")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor} failed to {operation}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
    },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("payload exceeds {capacity} bytes")]
    PayloadTooLarge { capacity: usize },
    #[error("measurement holds more than {max} readings")]
    TooManyFields { max: usize },
}
