//! Host directory standing in for the SD card

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use baro_link_core::StorageError;
use baro_link_core::ports::BackupVolume;
use log::warn;

pub struct FsVolume {
    root: PathBuf,
    present: bool,
}

impl FsVolume {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            present: true,
        }
    }

    /// Simulate pulling or inserting the card.
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    fn path(&self, file: &str) -> Result<PathBuf, StorageError> {
        if !self.present {
            warn!("FS: no card inserted");
            return Err(StorageError::OpenFailed);
        }
        Ok(self.root.join(file))
    }
}

impl BackupVolume for FsVolume {
    fn mount(&mut self) -> Result<(), StorageError> {
        if !self.present {
            warn!("FS: no card inserted");
            return Err(StorageError::OpenFailed);
        }
        fs::create_dir_all(&self.root).map_err(|e| {
            warn!("FS: Failed to create {}: {}", self.root.display(), e);
            StorageError::OpenFailed
        })
    }

    fn append(&mut self, file: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path(file).map_err(|_| StorageError::WriteFailed)?;
        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                warn!("FS: Failed to open {}: {}", path.display(), e);
                StorageError::OpenFailed
            })?;

        handle.write_all(bytes).map_err(|e| {
            warn!("FS: Failed to append to {}: {}", path.display(), e);
            StorageError::WriteFailed
        })
    }

    fn write(&mut self, file: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path(file).map_err(|_| StorageError::WriteFailed)?;
        fs::write(&path, bytes).map_err(|e| {
            warn!("FS: Failed to write {}: {}", path.display(), e);
            StorageError::WriteFailed
        })
    }

    fn read(&mut self, file: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path(file).map_err(|_| StorageError::ReadFailed)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => {
                warn!("FS: Failed to read {}: {}", path.display(), e);
                Err(StorageError::ReadFailed)
            }
        }
    }
}
