//! Config characteristic writes
//!
//! A config write is a one byte type tag followed by the selected union
//! member, zero padded to the size of the largest member:
//! ```text
//! [config_type: u8][member: 13 bytes]
//! ```
//!
//! Firmware before 1.8.117 uses a wider light-sensor member, so that write
//! is 19 bytes long.

use heapless::Vec;

use crate::config::wed::{CONFIG_SIZE, LEGACY_LS_CONFIG_SIZE, NAME_LEN, RATE_SCALE, TAG_SIZE};

/// Encoded config write
pub type ConfigBytes = Vec<u8, LEGACY_LS_CONFIG_SIZE>;

/// Config type tags
pub mod config_type {
    pub const GENERAL: u8 = 0;
    pub const ACCEL: u8 = 1;
    pub const LS: u8 = 2;
    pub const TEMP: u8 = 4;
    pub const MAINT: u8 = 5;
    pub const LOG: u8 = 6;
    pub const NAME: u8 = 8;
}

/// General config flags
pub mod general_flags {
    pub const FLUSH_LOG: u8 = 0x01;
    pub const WRITE_TAG: u8 = 0x02;
    pub const TIMEOUT_VALID: u8 = 0x04;
    pub const NEW_MODE: u8 = 0x08;
}

/// Log config flags
pub mod log_flags {
    /// Automatic log download via notifications
    pub const DL_EN: u8 = 0x01;
    /// Compressed accelerometer records
    pub const CMP_EN: u8 = 0x02;
    /// Bypass flash storage
    pub const LOOPBACK: u8 = 0x04;
}

/// Convert a logging interval in milliseconds to a rate parameter
///
/// 0 disables logging, anything else rounds up to the next 10 ms step.
pub fn rate_param(interval_ms: u32) -> u16 {
    if interval_ms == 0 {
        return 0;
    }
    ((interval_ms - 1) / RATE_SCALE + 1).min(u16::MAX as u32) as u16
}

/// Logging rate selected on the device
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Slow = 0,
    Fast = 1,
    Sleep = 2,
}

impl Mode {
    /// Case-insensitive mode name
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("slow") {
            Some(Mode::Slow)
        } else if name.eq_ignore_ascii_case("fast") {
            Some(Mode::Fast)
        } else if name.eq_ignore_ascii_case("sleep") {
            Some(Mode::Sleep)
        } else {
            None
        }
    }
}

/// Light-sensor sampling config
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LsConfig {
    pub fast_interval: u16,
    pub slow_interval: u16,
    pub sleep_interval: u16,
    pub manual_duration: u8,
    pub movement: u8,
    pub flags: u8,
    pub debug: u8,
    /// Per-rate capture durations, indexed slow, fast, sleep
    pub durations: [u8; 3],
}

/// Accelerometer config, rates already converted with [`rate_param`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccelConfig {
    pub slow_rate: u16,
    pub fast_rate: u16,
    pub sleep_rate: u16,
    pub hp_filter_cutoff: u8,
    pub ctrl_reg1: u8,
    pub ctrl_reg2: u8,
    pub off_x: u8,
    pub off_y: u8,
    pub off_z: u8,
}

/// Temperature logging rates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TempConfig {
    pub slow_rate: u16,
    pub fast_rate: u16,
    pub sleep_rate: u16,
}

/// Maintenance commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintCommand {
    ResetConfig,
    ClearLog,
    Reset,
    Tag([u8; TAG_SIZE]),
    BlinkLed { led: u8, speed: u8, duration: u8 },
    SystemLed { enable: bool },
    DeepSleep,
}

impl MaintCommand {
    fn code(&self) -> u8 {
        match self {
            MaintCommand::ResetConfig => 0,
            MaintCommand::ClearLog => 1,
            MaintCommand::Reset => 2,
            MaintCommand::Tag(_) => 3,
            MaintCommand::BlinkLed { .. } => 4,
            MaintCommand::SystemLed { .. } => 5,
            MaintCommand::DeepSleep => 6,
        }
    }
}

/// One config characteristic write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPayload {
    General {
        usemode: Mode,
        fast_mode_timeout: u16,
        flags: u8,
        tag: [u8; TAG_SIZE],
    },
    Accel(AccelConfig),
    LightSensor(LsConfig),
    /// Light-sensor layout for firmware before 1.8.117
    LegacyLightSensor(LsConfig),
    Temp(TempConfig),
    Maint(MaintCommand),
    Log { flags: u8 },
    Name([u8; NAME_LEN]),
}

impl ConfigPayload {
    /// Serialise to the exact bytes written to the config characteristic
    pub fn encode(&self) -> ConfigBytes {
        let mut out = ConfigBytes::new();

        match self {
            ConfigPayload::General {
                usemode,
                fast_mode_timeout,
                flags,
                tag,
            } => {
                let _ = out.push(config_type::GENERAL);
                let _ = out.push(*usemode as u8);
                let _ = out.extend_from_slice(&fast_mode_timeout.to_le_bytes());
                let _ = out.push(*flags);
                let _ = out.extend_from_slice(tag);
            }
            ConfigPayload::Accel(accel) => {
                let _ = out.push(config_type::ACCEL);
                let _ = out.extend_from_slice(&accel.slow_rate.to_le_bytes());
                let _ = out.extend_from_slice(&accel.fast_rate.to_le_bytes());
                let _ = out.extend_from_slice(&accel.sleep_rate.to_le_bytes());
                let _ = out.extend_from_slice(&[
                    accel.hp_filter_cutoff,
                    accel.ctrl_reg1,
                    accel.ctrl_reg2,
                    accel.off_x,
                    accel.off_y,
                    accel.off_z,
                ]);
            }
            ConfigPayload::LightSensor(ls) => {
                let _ = out.push(config_type::LS);
                let _ = out.extend_from_slice(&ls.fast_interval.to_le_bytes());
                let _ = out.extend_from_slice(&ls.slow_interval.to_le_bytes());
                let _ = out.extend_from_slice(&ls.sleep_interval.to_le_bytes());
                let _ = out.extend_from_slice(&[ls.manual_duration, ls.movement, ls.flags, ls.debug]);
                let _ = out.extend_from_slice(&ls.durations);
            }
            ConfigPayload::LegacyLightSensor(ls) => {
                let _ = out.extend_from_slice(&[config_type::LS, 0, 0]);
                let _ = out.extend_from_slice(&ls.fast_interval.to_le_bytes());
                let _ = out.extend_from_slice(&ls.slow_interval.to_le_bytes());
                let _ = out.extend_from_slice(&ls.sleep_interval.to_le_bytes());
                let _ = out.push(ls.manual_duration);
                let _ = out.extend_from_slice(&[0, 0, 0, 0]);
                let _ = out.push(ls.debug);
                let _ = out.extend_from_slice(&[0, 0]);
                let _ = out.push(ls.movement);
                let _ = out.push(ls.flags);
            }
            ConfigPayload::Temp(temp) => {
                let _ = out.push(config_type::TEMP);
                let _ = out.extend_from_slice(&temp.slow_rate.to_le_bytes());
                let _ = out.extend_from_slice(&temp.fast_rate.to_le_bytes());
                let _ = out.extend_from_slice(&temp.sleep_rate.to_le_bytes());
            }
            ConfigPayload::Maint(cmd) => {
                let _ = out.push(config_type::MAINT);
                let _ = out.push(cmd.code());
                match cmd {
                    MaintCommand::Tag(tag) => {
                        let _ = out.extend_from_slice(tag);
                    }
                    MaintCommand::BlinkLed { led, speed, duration } => {
                        let _ = out.extend_from_slice(&[*led, *speed, *duration]);
                    }
                    MaintCommand::SystemLed { enable } => {
                        let _ = out.push(*enable as u8);
                    }
                    _ => {}
                }
            }
            ConfigPayload::Log { flags } => {
                let _ = out.push(config_type::LOG);
                let _ = out.push(*flags);
            }
            ConfigPayload::Name(name) => {
                let _ = out.push(config_type::NAME);
                let _ = out.extend_from_slice(name);
            }
        }

        // Zero pad up to the union size
        if out.len() < CONFIG_SIZE {
            let _ = out.resize(CONFIG_SIZE, 0);
        }
        out
    }
}
