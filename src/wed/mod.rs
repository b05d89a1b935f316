//! WED characteristic value layouts
//!
//! Every payload is a packed little-endian struct on the device. Each one is
//! modelled as a plain Rust type with hand-written fixed-offset codecs.

pub mod config;
pub mod debug;
pub mod firmware;
pub mod status;
pub mod version;

use thiserror::Error;

pub use config::{
    rate_param, AccelConfig, ConfigBytes, ConfigPayload, LsConfig, MaintCommand, Mode, TempConfig,
};
pub use debug::{I2cCommand, I2cResult};
pub use firmware::{FirmwareCommand, FirmwareState, FirmwareStatus, FwErrorCode};
pub use status::{Status, StatusFlags};
pub use version::Version;

/// Characteristic value could not be decoded
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    #[error("{what} payload too short: need {needed} bytes, got {len}")]
    TooShort {
        what: &'static str,
        needed: usize,
        len: usize,
    },
}

pub(crate) fn require_len(what: &'static str, data: &[u8], needed: usize) -> Result<(), PayloadError> {
    if data.len() < needed {
        return Err(PayloadError::TooShort {
            what,
            needed,
            len: data.len(),
        });
    }
    Ok(())
}
