//! Backup volume port - durable named files
//!
//! Every operation acquires and releases its own handles before returning;
//! no file stays open across calls. Adapters log their device-specific error
//! and report one of the [`StorageError`] kinds.

use alloc::vec::Vec;

use crate::error::StorageError;

pub trait BackupVolume {
    /// Initialize the underlying device.
    ///
    /// Fails with [`StorageError::OpenFailed`] when the device is absent.
    fn mount(&mut self) -> Result<(), StorageError>;

    /// Append `bytes` to `file`, creating it if needed.
    fn append(&mut self, file: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Replace the contents of `file` with `bytes`.
    fn write(&mut self, file: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Read the whole of `file`. A file that does not exist reads as empty.
    fn read(&mut self, file: &str) -> Result<Vec<u8>, StorageError>;
}
