use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, error, info, warn};

use crate::config::{FromTruncated, LONG_STR};
use crate::error::StorageError;
use crate::ports::BackupVolume;

/// Record terminator written after every payload
const TERMINATOR: u8 = b'\n';

/// A payload that could not be delivered live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub payload: String,
    /// Sequence number assigned at append time, stored with the record
    pub append_order: u32,
}

/// Append-only log of undelivered payloads.
///
/// Each line is `<append_order> <payload>`. Lines without a numeric prefix
/// are read as bare payloads numbered after the previous record. The volume
/// is mounted lazily on first use; if mounting fails the next call tries
/// again. The next sequence number is learned from the log at mount time and
/// never goes backwards afterwards, whatever is discarded.
pub struct BackupStore<V> {
    volume: V,
    file: heapless::String<LONG_STR>,
    mounted: bool,
    next_order: u32,
    /// The last write may have left an unterminated line behind.
    torn_tail: bool,
}

impl<V: BackupVolume> BackupStore<V> {
    pub fn new(volume: V, file: &str) -> Self {
        Self {
            volume,
            file: heapless::String::from_truncated(file),
            mounted: false,
            next_order: 0,
            torn_tail: false,
        }
    }

    pub fn volume(&self) -> &V {
        &self.volume
    }

    fn ensure_mounted(&mut self) -> Result<(), StorageError> {
        if self.mounted {
            return Ok(());
        }

        self.volume.mount().map_err(|e| {
            error!("Backup volume mount failed: {}", e);
            StorageError::OpenFailed
        })?;
        self.mounted = true;

        // Continue numbering after whatever survived the last run.
        match self.read_log() {
            Ok(bytes) => {
                let records = parse_records(&bytes);
                self.next_order = records
                    .last()
                    .map_or(0, |r| r.append_order.saturating_add(1));
                self.torn_tail = bytes.last().is_some_and(|&b| b != TERMINATOR);
                info!(
                    "Backup volume mounted, {} pending records in {}",
                    records.len(),
                    self.file
                );
            }
            Err(e) => warn!("Could not scan existing backup log: {}", e),
        }
        Ok(())
    }

    /// Persist `payload` as the newest record.
    ///
    /// A sequence number is consumed even when the write fails, so a
    /// partially written line never shares its number with a later record.
    pub fn append(&mut self, payload: &str) -> Result<BackupRecord, StorageError> {
        if payload.as_bytes().contains(&TERMINATOR) {
            return Err(StorageError::InvalidPayload);
        }

        self.ensure_mounted()?;

        let order = self.next_order;
        self.next_order = order.saturating_add(1);

        // Close off a torn line so this record starts on its own.
        let lead = if self.torn_tail { "\n" } else { "" };
        let line = format!("{}{} {}\n", lead, order, payload);

        if let Err(e) = self.volume.append(&self.file, line.as_bytes()) {
            error!("Failed to append to {}: {}", self.file, e);
            self.torn_tail = true;
            return Err(StorageError::WriteFailed);
        }
        self.torn_tail = false;

        debug!("Backed up record #{}", order);
        Ok(BackupRecord {
            payload: String::from(payload),
            append_order: order,
        })
    }

    /// All records still in the log, oldest first.
    pub fn list_pending(&mut self) -> Result<Vec<BackupRecord>, StorageError> {
        self.ensure_mounted()?;
        let bytes = self.read_log()?;
        Ok(parse_records(&bytes))
    }

    /// Drop the `count` oldest records, keeping the rest in order and with
    /// their sequence numbers.
    pub fn discard_oldest(&mut self, count: usize) -> Result<(), StorageError> {
        if count == 0 {
            return Ok(());
        }

        let records = self.list_pending()?;
        let keep = records.get(count..).unwrap_or(&[]);

        let mut contents = String::new();
        for record in keep {
            contents.push_str(&format!("{} {}\n", record.append_order, record.payload));
        }

        self.volume.write(&self.file, contents.as_bytes()).map_err(|e| {
            error!("Failed to rewrite {}: {}", self.file, e);
            StorageError::WriteFailed
        })?;
        self.torn_tail = false;

        info!(
            "Discarded {} backup records, {} remain",
            records.len() - keep.len(),
            keep.len()
        );
        Ok(())
    }

    /// Empty the log. Sequence numbers keep counting from where they were.
    pub fn purge(&mut self) -> Result<(), StorageError> {
        self.ensure_mounted()?;
        self.volume.write(&self.file, &[]).map_err(|e| {
            error!("Failed to truncate {}: {}", self.file, e);
            StorageError::WriteFailed
        })?;
        self.torn_tail = false;
        Ok(())
    }

    fn read_log(&mut self) -> Result<Vec<u8>, StorageError> {
        self.volume.read(&self.file).map_err(|e| {
            error!("Failed to read {}: {}", self.file, e);
            StorageError::ReadFailed
        })
    }
}

fn parse_records(bytes: &[u8]) -> Vec<BackupRecord> {
    let mut records: Vec<BackupRecord> = Vec::new();
    for line in bytes.split(|&b| b == TERMINATOR) {
        // Tolerate CRLF terminators written by other tools.
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            continue;
        }

        let fallback = records
            .last()
            .map_or(0, |r| r.append_order.saturating_add(1));
        let text = String::from_utf8_lossy(line);
        let record = match text.split_once(' ') {
            Some((seq, payload)) => match seq.parse::<u32>() {
                Ok(order) => BackupRecord {
                    payload: String::from(payload),
                    append_order: order,
                },
                Err(_) => BackupRecord {
                    payload: text.clone().into_owned(),
                    append_order: fallback,
                },
            },
            None => BackupRecord {
                payload: text.clone().into_owned(),
                append_order: fallback,
            },
        };
        records.push(record);
    }
    records
}
