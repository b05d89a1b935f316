//! User commands and the device writes they turn into
//!
//! A command is picked once per run and dispatched to every device after its
//! status is known. Most commands are a single config characteristic write:
//! ```text
//! download      LOG    flags = DL_EN [| CMP_EN] [| LOOPBACK]
//! configls      LS     current or legacy layout, by device version
//! configaccel   ACCEL
//! configtemp    TEMP
//! blink         MAINT  BLINK_LED {led, speed, duration}
//! deepsleep     MAINT  DEEP_SLEEP
//! resetlogs     MAINT  CLEAR_LOG
//! resetcpu      MAINT  RESET
//! resetconfigs  MAINT  RESET_CONFIG
//! rename        NAME
//! tag           GENERAL {usemode, timeout, WRITE_TAG [| NEW_MODE], tag}
//! ```

use core::fmt;

use crate::config::wed::NAME_LEN;
use crate::wed::config::{general_flags, log_flags};
use crate::wed::{
    AccelConfig, ConfigPayload, I2cCommand, LsConfig, MaintCommand, Mode, TempConfig, Version,
};

/// Command names accepted on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommandName {
    #[default]
    Status,
    Download,
    ConfigLs,
    ConfigAccel,
    ConfigTemp,
    Blink,
    DeepSleep,
    ResetLogs,
    ResetCpu,
    ResetConfigs,
    Rename,
    Tag,
    ExtStatus,
    I2cRead,
    I2cWrite,
    FirmwareUpdate,
}

impl CommandName {
    /// Names selectable with `--command`; the rest are implied by options
    pub const SELECTABLE: [CommandName; 13] = [
        CommandName::Status,
        CommandName::Download,
        CommandName::ConfigLs,
        CommandName::ConfigAccel,
        CommandName::ConfigTemp,
        CommandName::Blink,
        CommandName::DeepSleep,
        CommandName::ResetLogs,
        CommandName::ResetCpu,
        CommandName::ResetConfigs,
        CommandName::Rename,
        CommandName::Tag,
        CommandName::ExtStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandName::Status => "status",
            CommandName::Download => "download",
            CommandName::ConfigLs => "configls",
            CommandName::ConfigAccel => "configaccel",
            CommandName::ConfigTemp => "configtemp",
            CommandName::Blink => "blink",
            CommandName::DeepSleep => "deepsleep",
            CommandName::ResetLogs => "resetlogs",
            CommandName::ResetCpu => "resetcpu",
            CommandName::ResetConfigs => "resetconfigs",
            CommandName::Rename => "rename",
            CommandName::Tag => "tag",
            CommandName::ExtStatus => "extstatus",
            CommandName::I2cRead => "i2c-read",
            CommandName::I2cWrite => "i2c-write",
            CommandName::FirmwareUpdate => "fwupdate",
        }
    }

    /// Case-insensitive lookup among the selectable names
    pub fn from_name(name: &str) -> Option<Self> {
        Self::SELECTABLE
            .iter()
            .copied()
            .find(|cmd| cmd.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log download flavour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadMode {
    /// Ask for uncompressed accelerometer records
    pub raw: bool,
    /// Stream live data, bypassing flash
    pub live: bool,
}

impl DownloadMode {
    pub fn log_flags(&self) -> u8 {
        let mut flags = log_flags::DL_EN;
        if !self.raw {
            flags |= log_flags::CMP_EN;
        }
        if self.live {
            flags |= log_flags::LOOPBACK;
        }
        flags
    }
}

/// Fully parameterised command, ready to dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status,
    ExtendedStatus,
    Download(DownloadMode),
    ConfigLs(LsConfig),
    ConfigAccel(AccelConfig),
    ConfigTemp(TempConfig),
    Maint(MaintCommand),
    Rename([u8; NAME_LEN]),
    Tag { tag: u32, mode: Option<Mode> },
    I2c(I2cCommand),
    /// Image is held by the session's firmware transfer
    FirmwareUpdate,
}

impl Command {
    pub fn name(&self) -> CommandName {
        match self {
            Command::Status => CommandName::Status,
            Command::ExtendedStatus => CommandName::ExtStatus,
            Command::Download(_) => CommandName::Download,
            Command::ConfigLs(_) => CommandName::ConfigLs,
            Command::ConfigAccel(_) => CommandName::ConfigAccel,
            Command::ConfigTemp(_) => CommandName::ConfigTemp,
            Command::Maint(MaintCommand::BlinkLed { .. }) => CommandName::Blink,
            Command::Maint(MaintCommand::DeepSleep) => CommandName::DeepSleep,
            Command::Maint(MaintCommand::ClearLog) => CommandName::ResetLogs,
            Command::Maint(MaintCommand::ResetConfig) => CommandName::ResetConfigs,
            Command::Maint(_) => CommandName::ResetCpu,
            Command::Rename(_) => CommandName::Rename,
            Command::Tag { .. } => CommandName::Tag,
            Command::I2c(cmd) if cmd.data.is_some() => CommandName::I2cWrite,
            Command::I2c(_) => CommandName::I2cRead,
            Command::FirmwareUpdate => CommandName::FirmwareUpdate,
        }
    }

    /// Config characteristic write for this command, if it is one
    ///
    /// The light-sensor layout depends on the device firmware; an unknown
    /// version gets the current layout.
    pub fn config_payload(&self, version: Option<&Version>) -> Option<ConfigPayload> {
        let payload = match self {
            Command::Download(mode) => ConfigPayload::Log {
                flags: mode.log_flags(),
            },
            Command::ConfigLs(ls) => match version {
                Some(version) if !version.has_ls_config_v2() => {
                    ConfigPayload::LegacyLightSensor(*ls)
                }
                _ => ConfigPayload::LightSensor(*ls),
            },
            Command::ConfigAccel(accel) => ConfigPayload::Accel(*accel),
            Command::ConfigTemp(temp) => ConfigPayload::Temp(*temp),
            Command::Maint(cmd) => ConfigPayload::Maint(*cmd),
            Command::Rename(name) => ConfigPayload::Name(*name),
            Command::Tag { tag, mode } => {
                let mut flags = general_flags::WRITE_TAG;
                if mode.is_some() {
                    flags |= general_flags::NEW_MODE;
                }
                ConfigPayload::General {
                    usemode: mode.unwrap_or_default(),
                    fast_mode_timeout: 0,
                    flags,
                    tag: tag.to_le_bytes(),
                }
            }
            Command::Status
            | Command::ExtendedStatus
            | Command::I2c(_)
            | Command::FirmwareUpdate => return None,
        };
        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names() {
        assert_eq!(CommandName::from_name("DownLoad"), Some(CommandName::Download));
        assert_eq!(CommandName::from_name("extstatus"), Some(CommandName::ExtStatus));
        assert_eq!(CommandName::from_name("test_seq"), None);
        // Implied by options only
        assert_eq!(CommandName::from_name("fwupdate"), None);
        assert_eq!(CommandName::default(), CommandName::Status);
    }

    #[test]
    fn test_download_flags() {
        let cases = [
            (false, false, &[6u8, 0x03][..]),
            (true, false, &[6, 0x01][..]),
            (false, true, &[6, 0x07][..]),
            (true, true, &[6, 0x05][..]),
        ];
        for (raw, live, expected) in cases {
            let bytes = Command::Download(DownloadMode { raw, live })
                .config_payload(None)
                .expect("Should be a config write")
                .encode();
            assert_eq!(&bytes[..2], expected);
            assert_eq!(bytes.len(), 14);
        }
    }

    #[test]
    fn test_light_sensor_layout_by_version() {
        let cmd = Command::ConfigLs(LsConfig::default());

        let old = cmd.config_payload(Some(&Version::new(1, 8, 116)));
        assert!(matches!(old, Some(ConfigPayload::LegacyLightSensor(_))));

        let new = cmd.config_payload(Some(&Version::new(1, 8, 117)));
        assert!(matches!(new, Some(ConfigPayload::LightSensor(_))));

        assert!(matches!(
            cmd.config_payload(None),
            Some(ConfigPayload::LightSensor(_))
        ));
    }

    #[test]
    fn test_tag_payload() {
        let bytes = Command::Tag {
            tag: 0x0102_0304,
            mode: None,
        }
        .config_payload(None)
        .expect("Should be a config write")
        .encode();
        assert_eq!(&bytes[..8], &[0, 0, 0, 0, 0x02, 0x04, 0x03, 0x02]);

        let bytes = Command::Tag {
            tag: 0,
            mode: Some(Mode::Sleep),
        }
        .config_payload(None)
        .expect("Should be a config write")
        .encode();
        assert_eq!(&bytes[..5], &[0, 2, 0, 0, 0x0A]);
    }

    #[test]
    fn test_reads_are_not_config_writes() {
        assert!(Command::Status.config_payload(None).is_none());
        assert!(Command::ExtendedStatus.config_payload(None).is_none());
        assert!(Command::FirmwareUpdate.config_payload(None).is_none());
        assert!(Command::I2c(I2cCommand::read(0x1D, 0x0F))
            .config_payload(None)
            .is_none());
    }

    #[test]
    fn test_name_of_maint_commands() {
        assert_eq!(
            Command::Maint(MaintCommand::Reset).name(),
            CommandName::ResetCpu
        );
        assert_eq!(
            Command::Maint(MaintCommand::ClearLog).name(),
            CommandName::ResetLogs
        );
        assert_eq!(
            Command::I2c(I2cCommand::write(1, 2, 3)).name(),
            CommandName::I2cWrite
        );
    }
}
