//! Debug characteristic: direct I2C register access

use crate::wed::{require_len, PayloadError};

const DEBUG_TYPE_I2C: u8 = 0;

/// `[debug_type = 0][address][reg][write][data]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct I2cCommand {
    pub address: u8,
    pub reg: u8,
    /// Data to write, None for a read
    pub data: Option<u8>,
}

impl I2cCommand {
    pub const SIZE: usize = 5;

    pub fn read(address: u8, reg: u8) -> Self {
        Self {
            address,
            reg,
            data: None,
        }
    }

    pub fn write(address: u8, reg: u8, data: u8) -> Self {
        Self {
            address,
            reg,
            data: Some(data),
        }
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        [
            DEBUG_TYPE_I2C,
            self.address,
            self.reg,
            self.data.is_some() as u8,
            self.data.unwrap_or(0),
        ]
    }
}

/// `[status][data]`, status 0 means success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cResult {
    pub status: u8,
    pub data: u8,
}

impl I2cResult {
    pub const SIZE: usize = 2;

    pub fn parse(data: &[u8]) -> Result<Self, PayloadError> {
        require_len("i2c result", data, Self::SIZE)?;
        Ok(Self {
            status: data[0],
            data: data[1],
        })
    }

    pub fn is_ok(&self) -> bool {
        self.status == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i2c_command_layout() {
        assert_eq!(I2cCommand::read(0x1D, 0x0D).encode(), [0, 0x1D, 0x0D, 0, 0]);
        assert_eq!(I2cCommand::write(0x1D, 0x2A, 0x01).encode(), [0, 0x1D, 0x2A, 1, 1]);
    }

    #[test]
    fn test_i2c_result() {
        let ok = I2cResult::parse(&[0, 0x1A]).expect("Should parse");
        assert!(ok.is_ok());
        assert_eq!(ok.data, 0x1A);
        assert!(!I2cResult::parse(&[3, 0]).expect("Should parse").is_ok());
        assert!(I2cResult::parse(&[0]).is_err());
    }
}
