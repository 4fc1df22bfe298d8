use alloc::vec::Vec;

use embedded_sdmmc::{
    BlockDevice, Mode, SdCard, TimeSource, Timestamp, VolumeIdx, VolumeManager,
};
use log::error;

use crate::error::StorageError;
use crate::ports::BackupVolume;

type SdResult<T, D> = Result<T, embedded_sdmmc::Error<<D as BlockDevice>::Error>>;

/// [`BackupVolume`] on the first FAT partition of an SD card.
///
/// SD operations are blocking. Every call opens the volume, the root
/// directory and the file, and closes them again before returning, so
/// no handle survives between calls and a card pulled in between is only
/// noticed by the next operation.
pub struct SdCardVolume<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    volume_mgr: VolumeManager<D, T, 4, 4, 1>,
}

impl<D, T> SdCardVolume<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    pub fn new(block_device: D, time_source: T) -> Self {
        Self {
            volume_mgr: VolumeManager::new(block_device, time_source),
        }
    }

    fn open_root(&self) -> SdResult<(), D> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;
        root_dir.close()?;
        volume0.close()?;
        Ok(())
    }

    fn write_with_mode(&self, file_name: &str, bytes: &[u8], mode: Mode) -> SdResult<(), D> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;
        let file = root_dir.open_file_in_dir(file_name, mode)?;

        if !bytes.is_empty() {
            file.write(bytes)?;
        }

        // Handles close on drop as well; closing explicitly surfaces flush errors.
        file.close()?;
        root_dir.close()?;
        volume0.close()?;
        Ok(())
    }

    fn read_all(&self, file_name: &str) -> SdResult<Vec<u8>, D> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;

        let file = match root_dir.open_file_in_dir(file_name, Mode::ReadOnly) {
            Ok(file) => file,
            Err(embedded_sdmmc::Error::NotFound) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut contents = Vec::new();
        let mut buffer = [0u8; 512];
        while !file.is_eof() {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            contents.extend_from_slice(&buffer[..read]);
        }

        file.close()?;
        root_dir.close()?;
        volume0.close()?;
        Ok(contents)
    }
}

impl<S, Dl, T> SdCardVolume<SdCard<S, Dl>, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    Dl: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    /// Wrap an SPI-attached card. The card is initialized lazily on first access.
    pub fn from_spi(spi: S, delay: Dl, time_source: T) -> Self {
        Self::new(SdCard::new(spi, delay), time_source)
    }
}

impl<D, T> BackupVolume for SdCardVolume<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    fn mount(&mut self) -> Result<(), StorageError> {
        self.open_root().map_err(|e| {
            error!("SD card unavailable: {:?}", e);
            StorageError::OpenFailed
        })
    }

    fn append(&mut self, file: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.write_with_mode(file, bytes, Mode::ReadWriteCreateOrAppend)
            .map_err(|e| {
                error!("SD append to {} failed: {:?}", file, e);
                StorageError::WriteFailed
            })
    }

    fn write(&mut self, file: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.write_with_mode(file, bytes, Mode::ReadWriteCreateOrTruncate)
            .map_err(|e| {
                error!("SD write to {} failed: {:?}", file, e);
                StorageError::WriteFailed
            })
    }

    fn read(&mut self, file: &str) -> Result<Vec<u8>, StorageError> {
        self.read_all(file).map_err(|e| {
            error!("SD read of {} failed: {:?}", file, e);
            StorageError::ReadFailed
        })
    }
}

/// Time source for boards without a real-time clock.
///
/// Stamps every file with a fixed date; record order lives in the log itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedTimeSource;

impl TimeSource for FixedTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        // 2024-01-01 00:00:00
        Timestamp {
            year_since_1970: 54,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::spi::{ErrorKind, ErrorType, Operation, SpiDevice};
    use embedded_sdmmc::{Block, BlockCount, BlockIdx};

    /// Card that answers every request with an I/O error.
    struct DeadCard;

    impl BlockDevice for DeadCard {
        type Error = ();

        fn read(&self, _blocks: &mut [Block], _start: BlockIdx) -> Result<(), ()> {
            Err(())
        }

        fn write(&self, _blocks: &[Block], _start: BlockIdx) -> Result<(), ()> {
            Err(())
        }

        fn num_blocks(&self) -> Result<BlockCount, ()> {
            Err(())
        }
    }

    /// Readable card with no partition table.
    struct BlankCard;

    impl BlockDevice for BlankCard {
        type Error = ();

        fn read(&self, blocks: &mut [Block], _start: BlockIdx) -> Result<(), ()> {
            for block in blocks.iter_mut() {
                block.contents.fill(0);
            }
            Ok(())
        }

        fn write(&self, _blocks: &[Block], _start: BlockIdx) -> Result<(), ()> {
            Ok(())
        }

        fn num_blocks(&self) -> Result<BlockCount, ()> {
            Ok(BlockCount(64))
        }
    }

    /// SPI bus with nothing attached.
    struct FloatingBus;

    impl ErrorType for FloatingBus {
        type Error = ErrorKind;
    }

    impl SpiDevice<u8> for FloatingBus {
        fn transaction(&mut self, _operations: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
            Err(ErrorKind::Other)
        }
    }

    struct NoDelay;

    impl embedded_hal::delay::DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn test_dead_card_maps_to_storage_errors() {
        let mut volume = SdCardVolume::new(DeadCard, FixedTimeSource);

        assert_eq!(volume.mount(), Err(StorageError::OpenFailed));
        assert_eq!(
            volume.append("BACKUP.LOG", b"0 x\n"),
            Err(StorageError::WriteFailed)
        );
        assert_eq!(
            volume.write("BACKUP.LOG", b""),
            Err(StorageError::WriteFailed)
        );
        assert_eq!(volume.read("BACKUP.LOG"), Err(StorageError::ReadFailed));
    }

    #[test]
    fn test_unformatted_card_does_not_mount() {
        let mut volume = SdCardVolume::new(BlankCard, FixedTimeSource);
        assert_eq!(volume.mount(), Err(StorageError::OpenFailed));
        assert_eq!(volume.read("BACKUP.LOG"), Err(StorageError::ReadFailed));
    }

    #[test]
    fn test_missing_card_on_spi_does_not_mount() {
        let mut volume = SdCardVolume::from_spi(FloatingBus, NoDelay, FixedTimeSource);
        assert_eq!(volume.mount(), Err(StorageError::OpenFailed));
    }

    #[test]
    fn test_fixed_time_source_is_new_year_2024() {
        let ts = FixedTimeSource.get_timestamp();
        assert_eq!(ts.year_since_1970, 54);
        assert_eq!((ts.zero_indexed_month, ts.zero_indexed_day), (0, 0));
    }
}
