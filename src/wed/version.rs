use core::fmt;

use crate::config::versions;
use crate::wed::{require_len, PayloadError};

/// Device firmware version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub build: u16,
}

impl Version {
    pub const SIZE: usize = 4;

    pub fn new(major: u8, minor: u8, build: u16) -> Self {
        Self { major, minor, build }
    }

    /// `[major][minor][build: u16 LE]`
    pub fn parse(data: &[u8]) -> Result<Self, PayloadError> {
        require_len("version", data, Self::SIZE)?;
        Ok(Self {
            major: data[0],
            minor: data[1],
            build: u16::from_le_bytes([data[2], data[3]]),
        })
    }

    /// Flattened form for ordered comparison
    pub fn flat(&self) -> u32 {
        versions::flat(self.major, self.minor, self.build)
    }

    /// Light samples carry per-channel flags
    pub fn has_ls_channel_flags(&self) -> bool {
        self.flat() >= versions::LS_CHANNEL_FLAGS
    }

    pub fn is_config_compatible(&self) -> bool {
        self.flat() >= versions::COMPATIBLE_CONFIG
    }

    /// Light-sensor config uses the per-rate duration layout
    pub fn has_ls_config_v2(&self) -> bool {
        self.flat() >= versions::LS_CONFIG_V2
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}
