//! Firmware image upload
//!
//! The device pulls the image in pages of 16 blocks of 16 bytes. Every
//! `UploadReady` status poll lets the host push up to `speedup` pages before
//! polling again:
//! ```text
//! host                         device
//!  | INIT {header}               |
//!  | read status  ---------->    |
//!  |              <----------    | UploadReady
//!  | DATA_BLOCK x 16 x speedup   |
//!  | read status  ---------->    |
//!  |              ...            |
//!  | DATA_DONE                   |
//!  |              <----------    | UpdateReady
//!  | UPDATE                      |
//! ```
//! The image starts with a 16 byte header `[crc: u16][id: u16][pages: u16]..`
//! that doubles as the INIT payload.

use core::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use log::{info, warn};
use thiserror::Error;

use crate::client::{AttClient, RequestError};
use crate::config::firmware::{BLOCKS_PER_PAGE, BLOCK_SIZE, HEADER_ID, HEADER_SIZE, MAX_WRITE_RETRIES};
use crate::transport::Transport;
use crate::wed::{FirmwareCommand, FwErrorCode};

#[derive(Error, Debug)]
pub enum FirmwareError {
    #[error("firmware image not accessible: {0}")]
    Io(#[from] io::Error),

    #[error("firmware image too small ({size} bytes)")]
    TooSmall { size: u64 },

    #[error("firmware image invalid (header id {id:#06x})")]
    InvalidHeader { id: u16 },

    #[error("firmware image invalid size: {size} bytes, header says {expected}")]
    InvalidSize { size: u64, expected: u64 },

    #[error("unfinished previous update detected, reset CPU and try again")]
    Unfinished,

    #[error("device rejected the update: {0}")]
    Device(FwErrorCode),

    #[error("unknown firmware update state ({0})")]
    UnknownState(u8),

    #[error("update not ready: wrote {written} of {size} bytes")]
    Incomplete { written: u64, size: u64 },

    #[error("block write at offset {offset} failed {retries} times")]
    RetriesExhausted { offset: u64, retries: u32 },

    #[error("no firmware image loaded")]
    NoImage,

    #[error(transparent)]
    Request(#[from] RequestError),
}

/// Progress after one upload round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub written: u64,
    pub size: u64,
    pub page: u16,
    pub pages: u16,
    /// All data sent and DATA_DONE written
    pub finished: bool,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let percent = (self.written * 100).checked_div(self.size).unwrap_or(0);
        write!(
            f,
            "Updating ... {}/{}  page {}/{} ({}%)",
            self.written, self.size, self.page, self.pages, percent
        )
    }
}

/// Anything an image can be read from
pub trait ImageSource: Read + Seek {}

impl<R: Read + Seek> ImageSource for R {}

/// Read until `buf` is full or the image ends
fn read_block<R: Read>(image: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match image.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// One validated image and its upload cursor
pub struct FirmwareUpdate<R> {
    image: R,
    header: [u8; HEADER_SIZE],
    size: u64,
    pages: u16,
    written: u64,
    written_pages: u16,
    speedup: u32,
    retries: u32,
}

impl<R: Read + Seek> FirmwareUpdate<R> {
    /// Validate the image header and size before any device traffic
    pub fn new(mut image: R, speedup: u32) -> Result<Self, FirmwareError> {
        let size = image.seek(SeekFrom::End(0))?;
        if size < HEADER_SIZE as u64 {
            return Err(FirmwareError::TooSmall { size });
        }
        image.rewind()?;

        let mut header = [0u8; HEADER_SIZE];
        image.read_exact(&mut header)?;
        let id = u16::from_le_bytes([header[2], header[3]]);
        let pages = u16::from_le_bytes([header[4], header[5]]);

        if id != HEADER_ID {
            return Err(FirmwareError::InvalidHeader { id });
        }
        let expected = (BLOCK_SIZE * BLOCKS_PER_PAGE) as u64 * pages as u64;
        if expected != size {
            return Err(FirmwareError::InvalidSize { size, expected });
        }
        image.rewind()?;

        Ok(Self {
            image,
            header,
            size,
            pages,
            written: 0,
            written_pages: 0,
            speedup: speedup.max(1),
            retries: 0,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn pages(&self) -> u16 {
        self.pages
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    fn progress(&self, finished: bool) -> Progress {
        Progress {
            written: self.written,
            size: self.size,
            page: self.written_pages,
            pages: self.pages,
            finished,
        }
    }

    /// Send INIT with the image header and rewind the upload cursor
    pub async fn begin<T: Transport>(
        &mut self,
        client: &mut AttClient<T>,
        handle: u16,
    ) -> Result<(), FirmwareError> {
        client
            .write(handle, &FirmwareCommand::Init(self.header).encode())
            .await?;
        self.image.rewind()?;
        self.written = 0;
        self.written_pages = 0;
        self.retries = 0;
        info!("Firmware: sent header, {} pages to upload", self.pages);
        Ok(())
    }

    /// Push up to `speedup` pages of blocks
    ///
    /// A failed block write rewinds to the start of that block and ends the
    /// round without counting the page; the next round resends it. DATA_DONE
    /// follows the last block.
    pub async fn upload_round<T: Transport>(
        &mut self,
        client: &mut AttClient<T>,
        handle: u16,
    ) -> Result<Progress, FirmwareError> {
        let mut finished = false;
        let mut retry = false;

        for _ in 0..self.speedup {
            for _ in 0..BLOCKS_PER_PAGE {
                let offset = self.image.stream_position()?;
                let mut block = [0u8; BLOCK_SIZE];
                let len = read_block(&mut self.image, &mut block)?;
                if len < BLOCK_SIZE {
                    if len > 0 {
                        warn!("Firmware: uneven image size, {} trailing bytes", len);
                    }
                    finished = true;
                    break;
                }

                let command = FirmwareCommand::DataBlock(block).encode();
                if let Err(e) = client.write(handle, &command).await {
                    self.retries += 1;
                    if self.retries > MAX_WRITE_RETRIES {
                        return Err(FirmwareError::RetriesExhausted {
                            offset,
                            retries: self.retries,
                        });
                    }
                    warn!("Firmware: write retry at offset {} ({})", offset, e);
                    self.image.seek(SeekFrom::Start(offset))?;
                    retry = true;
                    break;
                }
                self.retries = 0;
                self.written += BLOCK_SIZE as u64;

                if self.written == self.size {
                    finished = true;
                    break;
                }
            }

            if retry {
                break;
            }
            self.written_pages = self.written_pages.saturating_add(1);
            if finished {
                break;
            }
        }

        if finished {
            client
                .write(handle, &FirmwareCommand::DataDone.encode())
                .await?;
            info!("Firmware: data done");
        }
        Ok(self.progress(finished))
    }

    /// Commit the upload once the device has checked it
    pub async fn commit<T: Transport>(
        &mut self,
        client: &mut AttClient<T>,
        handle: u16,
    ) -> Result<(), FirmwareError> {
        if self.written != self.size {
            return Err(FirmwareError::Incomplete {
                written: self.written,
                size: self.size,
            });
        }
        client
            .write(handle, &FirmwareCommand::Update.encode())
            .await?;
        info!("Firmware: update committed");
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use crate::transport::TransportError;
    use futures::executor::block_on;
    use std::io::Cursor;

    const HANDLE: u16 = 0x002C;

    /// Valid image of `pages` pages, each block filled with its index
    pub fn image(pages: u16) -> Vec<u8> {
        let size = BLOCK_SIZE * BLOCKS_PER_PAGE * pages as usize;
        let mut data: Vec<u8> = (0..size).map(|i| (i / BLOCK_SIZE) as u8).collect();
        data[0..2].copy_from_slice(&0xBEEFu16.to_le_bytes());
        data[2..4].copy_from_slice(&HEADER_ID.to_le_bytes());
        data[4..6].copy_from_slice(&pages.to_le_bytes());
        data
    }

    fn data_blocks(client: &AttClient<MockTransport>) -> Vec<Vec<u8>> {
        client
            .transport()
            .sent()
            .iter()
            .filter(|f| f.len() == 20 && f[3] == 1)
            .map(|f| f[4..].to_vec())
            .collect()
    }

    #[test]
    fn test_validate_image() {
        assert!(FirmwareUpdate::new(Cursor::new(image(2)), 1).is_ok());

        assert!(matches!(
            FirmwareUpdate::new(Cursor::new(vec![0u8; 8]), 1),
            Err(FirmwareError::TooSmall { size: 8 })
        ));

        let mut bad_id = image(1);
        bad_id[2] = 0x02;
        assert!(matches!(
            FirmwareUpdate::new(Cursor::new(bad_id), 1),
            Err(FirmwareError::InvalidHeader { id: 0x0102 })
        ));

        let mut truncated = image(2);
        truncated.truncate(300);
        assert!(matches!(
            FirmwareUpdate::new(Cursor::new(truncated), 1),
            Err(FirmwareError::InvalidSize {
                size: 300,
                expected: 512
            })
        ));
    }

    #[test]
    fn test_upload_with_speedup() {
        let mut update = FirmwareUpdate::new(Cursor::new(image(3)), 2).expect("Should validate");
        let mut client = AttClient::new(MockTransport::new());

        block_on(async {
            update.begin(&mut client, HANDLE).await.unwrap();
            let init = client.transport().last_sent().unwrap();
            assert_eq!(&init[..4], &[0x52, 0x2C, 0x00, 0]);
            assert_eq!(&init[6..8], &HEADER_ID.to_le_bytes());

            let first = update.upload_round(&mut client, HANDLE).await.unwrap();
            assert_eq!(first.page, 2);
            assert_eq!(first.written, 512);
            assert!(!first.finished);

            let second = update.upload_round(&mut client, HANDLE).await.unwrap();
            assert_eq!(second.page, 3);
            assert_eq!(second.written, 768);
            assert!(second.finished);

            // DATA_DONE closes the upload
            assert_eq!(client.transport().last_sent().unwrap()[3], 2);

            update.commit(&mut client, HANDLE).await.unwrap();
            assert_eq!(client.transport().last_sent().unwrap()[3], 3);
        });
        assert_eq!(data_blocks(&client).len(), 48);
    }

    #[test]
    fn test_retry_sends_block_once() {
        let mut update = FirmwareUpdate::new(Cursor::new(image(1)), 1).expect("Should validate");
        let mut client = AttClient::new(MockTransport::new());
        // Call 0 is INIT, so call 3 is block 2
        client.transport().fail_send_at(3, TransportError::Io);

        block_on(async {
            update.begin(&mut client, HANDLE).await.unwrap();

            let first = update.upload_round(&mut client, HANDLE).await.unwrap();
            assert_eq!(first.written, 32);
            assert_eq!(first.page, 0);
            assert!(!first.finished);

            let second = update.upload_round(&mut client, HANDLE).await.unwrap();
            assert_eq!(second.written, 256);
            assert_eq!(second.page, 1);
            assert!(second.finished);
        });

        let blocks = data_blocks(&client);
        assert_eq!(blocks.len(), 16);
        let source = image(1);
        for (i, block) in blocks.iter().enumerate() {
            assert_eq!(block.as_slice(), &source[i * BLOCK_SIZE..(i + 1) * BLOCK_SIZE]);
        }
    }

    #[test]
    fn test_retries_exhausted() {
        let mut update = FirmwareUpdate::new(Cursor::new(image(1)), 1).expect("Should validate");
        let mut client = AttClient::new(MockTransport::new());

        block_on(async {
            update.begin(&mut client, HANDLE).await.unwrap();
            for _ in 0..MAX_WRITE_RETRIES {
                client.transport().set_next_send_error(TransportError::Io);
                let progress = update.upload_round(&mut client, HANDLE).await.unwrap();
                assert_eq!(progress.written, 0);
            }
            client.transport().set_next_send_error(TransportError::Io);
            assert!(matches!(
                update.upload_round(&mut client, HANDLE).await,
                Err(FirmwareError::RetriesExhausted { offset: 0, .. })
            ));
        });
    }

    #[test]
    fn test_commit_requires_full_image() {
        let mut update = FirmwareUpdate::new(Cursor::new(image(1)), 1).expect("Should validate");
        let mut client = AttClient::new(MockTransport::new());

        block_on(async {
            assert!(matches!(
                update.commit(&mut client, HANDLE).await,
                Err(FirmwareError::Incomplete {
                    written: 0,
                    size: 256
                })
            ));
        });
        assert!(client.transport().sent().is_empty());
    }

    #[test]
    fn test_progress_line() {
        let progress = Progress {
            written: 512,
            size: 1024,
            page: 2,
            pages: 4,
            finished: false,
        };
        assert_eq!(progress.to_string(), "Updating ... 512/1024  page 2/4 (50%)");
    }
}
