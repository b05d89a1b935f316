//! Firmware characteristic: 17 byte commands out, 2 byte status in

use core::fmt;

use crate::config::firmware::{BLOCK_SIZE, COMMAND_SIZE};
use crate::wed::{require_len, PayloadError};

/// Firmware command written to the firmware characteristic
///
/// `[pkt_type: u8][header or data: 16 bytes]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareCommand {
    /// Start an update with the image header
    Init([u8; BLOCK_SIZE]),
    DataBlock([u8; BLOCK_SIZE]),
    DataDone,
    /// Commit the uploaded image
    Update,
}

impl FirmwareCommand {
    pub fn encode(&self) -> [u8; COMMAND_SIZE] {
        let mut out = [0u8; COMMAND_SIZE];
        match self {
            FirmwareCommand::Init(header) => {
                out[0] = 0;
                out[1..].copy_from_slice(header);
            }
            FirmwareCommand::DataBlock(data) => {
                out[0] = 1;
                out[1..].copy_from_slice(data);
            }
            FirmwareCommand::DataDone => out[0] = 2,
            FirmwareCommand::Update => out[0] = 3,
        }
        out
    }
}

/// Device side firmware error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FwErrorCode {
    Header,
    Size,
    Crc,
    Flash,
    Other,
    Unknown(u8),
}

impl FwErrorCode {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            1 => FwErrorCode::Header,
            2 => FwErrorCode::Size,
            3 => FwErrorCode::Crc,
            4 => FwErrorCode::Flash,
            5 => FwErrorCode::Other,
            other => FwErrorCode::Unknown(other),
        }
    }
}

impl fmt::Display for FwErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FwErrorCode::Header => f.write_str("invalid image header"),
            FwErrorCode::Size => f.write_str("image too large"),
            FwErrorCode::Crc => f.write_str("CRC mismatch"),
            FwErrorCode::Flash => f.write_str("flash fault"),
            FwErrorCode::Other => f.write_str("internal error"),
            FwErrorCode::Unknown(code) => write!(f, "unknown error ({})", code),
        }
    }
}

/// Update state reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareState {
    Idle,
    /// Busy, keep polling
    Wait,
    UploadReady,
    UpdateReady,
    Error(FwErrorCode),
    Unknown(u8),
}

/// `[status: u8][error_code: u8]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareStatus {
    pub state: FirmwareState,
}

impl FirmwareStatus {
    pub const SIZE: usize = 2;

    pub fn parse(data: &[u8]) -> Result<Self, PayloadError> {
        require_len("firmware status", data, Self::SIZE)?;
        let state = match data[0] {
            0 => FirmwareState::Idle,
            1 => FirmwareState::Wait,
            2 => FirmwareState::UploadReady,
            3 => FirmwareState::UpdateReady,
            4 => FirmwareState::Error(FwErrorCode::from_byte(data[1])),
            other => FirmwareState::Unknown(other),
        };
        Ok(Self { state })
    }
}
