//! Command parameters from `key=value[,...]` lines and parameter files
//!
//! A parameter file holds one `key value` pair per line:
//! ```text
//! # light sensor every 10 minutes in slow mode
//! ls_slow_interval 600
//! ls_slow_duration 0x10
//! ```
//! Numbers take C-style bases: `0x` hex, a leading `0` octal, otherwise
//! decimal, with an optional sign.

use heapless::String;
use log::debug;
use thiserror::Error;

use crate::commands::types::{Command, CommandName, DownloadMode};
use crate::config::limits::MAX_PARAM_LEN;
use crate::config::wed::{BLINK_DURATION, BLINK_LED, BLINK_SPEED, NAME_LEN};
use crate::wed::{rate_param, AccelConfig, I2cCommand, LsConfig, MaintCommand, Mode, TempConfig};

/// Parameter text kept for error reports, truncated
pub type ParamText = String<48>;

fn text(s: &str) -> ParamText {
    let mut out = ParamText::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("configuration parameter {0} not recognized")]
    UnknownKey(ParamText),

    #[error("invalid number {value:?} for {key}")]
    InvalidNumber { key: ParamText, value: ParamText },

    #[error("name cannot be more than {max} characters", max = NAME_LEN)]
    NameTooLong,

    #[error("invalid mode ({0})")]
    InvalidMode(ParamText),

    #[error("line {line} not recognized")]
    BadLine { line: usize },

    #[error("invalid i2c {0} format")]
    InvalidI2c(&'static str),

    #[error("{0} needs a name")]
    MissingName(CommandName),

    #[error("{0} is selected by its own option")]
    NotSelectable(CommandName),

    #[error("configuration file {0} not accessible")]
    Unreadable(ParamText),
}

/// Parse an integer the way C's `strtol(s, NULL, 0)` picks its base
///
/// Unlike `strtol`, trailing garbage is an error.
pub fn parse_number(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, digits) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };

    // from_str_radix would accept a second sign
    if digits.is_empty() || !digits.bytes().all(|b| (b as char).is_digit(radix)) {
        return None;
    }
    let value = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { value.wrapping_neg() } else { value })
}

/// Parse `addr:reg` or `addr:reg:value`
pub fn parse_i2c(arg: &str, write: bool) -> Result<I2cCommand, ParamError> {
    let format = if write { "address:reg:value" } else { "address:reg" };
    let mut fields = arg.split(':').map(|f| parse_number(f).map(|v| v as u8));

    let mut next = || fields.next().flatten().ok_or(ParamError::InvalidI2c(format));
    let address = next()?;
    let reg = next()?;
    let cmd = if write {
        I2cCommand::write(address, reg, next()?)
    } else {
        I2cCommand::read(address, reg)
    };

    if arg.split(':').count() != if write { 3 } else { 2 } {
        return Err(ParamError::InvalidI2c(format));
    }
    Ok(cmd)
}

/// Values gathered from every parameter source, defaults included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Params {
    pub ls: LsConfig,
    pub accel: AccelConfig,
    pub temp: TempConfig,
    pub blink_led: u8,
    pub blink_speed: u8,
    pub blink_duration: u8,
    pub name: Option<[u8; NAME_LEN]>,
    pub mode: Option<Mode>,
    pub tag: u32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            ls: LsConfig::default(),
            accel: AccelConfig::default(),
            temp: TempConfig::default(),
            blink_led: BLINK_LED,
            blink_speed: BLINK_SPEED,
            blink_duration: BLINK_DURATION,
            name: None,
            mode: None,
            tag: 0,
        }
    }
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), ParamError> {
        if name.len() > NAME_LEN {
            return Err(ParamError::NameTooLong);
        }
        let mut bytes = [0u8; NAME_LEN];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        self.name = Some(bytes);
        Ok(())
    }

    pub fn set_mode(&mut self, name: &str) -> Result<(), ParamError> {
        let mode = Mode::from_name(name).ok_or_else(|| ParamError::InvalidMode(text(name)))?;
        self.mode = Some(mode);
        Ok(())
    }

    /// Apply one `key`/`value` pair
    ///
    /// An empty value makes `key` a bare token, which only `rename` takes.
    pub fn set(&mut self, key: &str, value: &str, command: CommandName) -> Result<(), ParamError> {
        if value.is_empty() || value.starts_with(char::is_whitespace) {
            return self.set_bare(key, command);
        }

        let key_lower = {
            let mut lower = ParamText::new();
            for c in key.chars() {
                let _ = lower.push(c.to_ascii_lowercase());
            }
            lower
        };

        // String valued keys first
        match key_lower.as_str() {
            "name" => return self.set_name(value),
            "mode" => return self.set_mode(value),
            _ => {}
        }

        let number = parse_number(value).ok_or_else(|| ParamError::InvalidNumber {
            key: text(key),
            value: text(value),
        })?;
        let ms = number as u32;

        match key_lower.as_str() {
            "ls_fast_interval" => self.ls.fast_interval = number as u16,
            "ls_slow_interval" => self.ls.slow_interval = number as u16,
            "ls_sleep_interval" => self.ls.sleep_interval = number as u16,
            "ls_duration" => self.ls.manual_duration = number as u8,
            "ls_slow_duration" => self.ls.durations[Mode::Slow as usize] = number as u8,
            "ls_fast_duration" => self.ls.durations[Mode::Fast as usize] = number as u8,
            "ls_sleep_duration" => self.ls.durations[Mode::Sleep as usize] = number as u8,
            "ls_debug" => self.ls.debug = number as u8,
            "ls_flags" => self.ls.flags = number as u8,
            "ls_movement" => self.ls.movement = number as u8,
            "blink_duration" => self.blink_duration = number as u8,
            "blink_led" => self.blink_led = number as u8,
            "blink_speed" => self.blink_speed = number as u8,
            "accel_slow_rate" => self.accel.slow_rate = rate_param(ms),
            "accel_fast_rate" => self.accel.fast_rate = rate_param(ms),
            "accel_sleep_rate" => self.accel.sleep_rate = rate_param(ms),
            "temp_slow_rate" => self.temp.slow_rate = rate_param(ms),
            "temp_fast_rate" => self.temp.fast_rate = rate_param(ms),
            "temp_sleep_rate" => self.temp.sleep_rate = rate_param(ms),
            "tag" => self.tag = ms,
            _ => return Err(ParamError::UnknownKey(text(key))),
        }
        Ok(())
    }

    fn set_bare(&mut self, token: &str, command: CommandName) -> Result<(), ParamError> {
        match command {
            CommandName::Rename => self.set_name(token),
            _ => Err(ParamError::UnknownKey(text(token))),
        }
    }

    /// Apply a `key=value[,...]` line
    pub fn parse_line(&mut self, line: &str, command: CommandName) -> Result<(), ParamError> {
        for pair in line.split(',').filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some((key, value)) => self.set(key.trim(), value, command)?,
                None => self.set_bare(pair.trim(), command)?,
            }
        }
        Ok(())
    }

    /// Apply the contents of a parameter file
    pub fn parse_file_text(&mut self, contents: &str, command: CommandName) -> Result<(), ParamError> {
        for (index, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.starts_with('#') {
                continue;
            }
            if line.len() >= MAX_PARAM_LEN {
                return Err(ParamError::BadLine { line: index + 1 });
            }

            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next(), fields.next()) {
                (Some(key), Some(value), None) => self.set(key, value, command)?,
                _ if line.len() <= 1 => continue,
                _ => return Err(ParamError::BadLine { line: index + 1 }),
            }
        }
        Ok(())
    }

    /// Build the command to dispatch
    pub fn command(&self, name: CommandName, download: DownloadMode) -> Result<Command, ParamError> {
        let command = match name {
            CommandName::Status => Command::Status,
            CommandName::ExtStatus => Command::ExtendedStatus,
            CommandName::Download => Command::Download(download),
            CommandName::ConfigLs => Command::ConfigLs(self.ls),
            CommandName::ConfigAccel => Command::ConfigAccel(self.accel),
            CommandName::ConfigTemp => Command::ConfigTemp(self.temp),
            CommandName::Blink => Command::Maint(MaintCommand::BlinkLed {
                led: self.blink_led,
                speed: self.blink_speed,
                duration: self.blink_duration,
            }),
            CommandName::DeepSleep => Command::Maint(MaintCommand::DeepSleep),
            CommandName::ResetLogs => Command::Maint(MaintCommand::ClearLog),
            CommandName::ResetCpu => Command::Maint(MaintCommand::Reset),
            CommandName::ResetConfigs => Command::Maint(MaintCommand::ResetConfig),
            CommandName::Rename => {
                Command::Rename(self.name.ok_or(ParamError::MissingName(name))?)
            }
            CommandName::Tag => Command::Tag {
                tag: self.tag,
                mode: self.mode,
            },
            CommandName::I2cRead | CommandName::I2cWrite | CommandName::FirmwareUpdate => {
                return Err(ParamError::NotSelectable(name))
            }
        };
        debug!("Params: built {} command", name);
        Ok(command)
    }
}

/// Input argument names a file rather than a parameter line
#[cfg(feature = "host")]
pub fn is_input_file(arg: &str) -> bool {
    std::path::Path::new(arg).exists() || (arg.contains(['.', '/']) && !arg.contains('='))
}

#[cfg(feature = "host")]
impl Params {
    /// Apply an input argument, reading it as a file when it looks like one
    pub fn load_input(&mut self, arg: &str, command: CommandName) -> Result<(), ParamError> {
        if !is_input_file(arg) {
            return self.parse_line(arg, command);
        }
        let contents =
            std::fs::read_to_string(arg).map_err(|_| ParamError::Unreadable(text(arg)))?;
        self.parse_file_text(&contents, command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_bases() {
        assert_eq!(parse_number("42"), Some(42));
        assert_eq!(parse_number("0x1F"), Some(31));
        assert_eq!(parse_number("0X1f"), Some(31));
        assert_eq!(parse_number("017"), Some(15));
        assert_eq!(parse_number("0"), Some(0));
        assert_eq!(parse_number("-5"), Some(-5));
        assert_eq!(parse_number("+7"), Some(7));
        assert_eq!(parse_number(" 12 "), Some(12));
    }

    #[test]
    fn test_number_rejects_garbage() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("0x"), None);
        assert_eq!(parse_number("12abc"), None);
        assert_eq!(parse_number("09"), None);
        assert_eq!(parse_number("--1"), None);
        assert_eq!(parse_number("fast"), None);
    }

    #[test]
    fn test_parse_line() {
        let mut params = Params::new();
        params
            .parse_line("LS_SLOW_INTERVAL=600,ls_fast_duration=0x10,blink_led=2", CommandName::ConfigLs)
            .expect("Should parse");

        assert_eq!(params.ls.slow_interval, 600);
        assert_eq!(params.ls.durations, [0, 16, 0]);
        assert_eq!(params.blink_led, 2);
        // Untouched defaults
        assert_eq!(params.blink_speed, 1);
        assert_eq!(params.blink_duration, 5);
    }

    #[test]
    fn test_rates_converted() {
        let mut params = Params::new();
        params
            .parse_line("accel_slow_rate=100,temp_fast_rate=11,temp_sleep_rate=0", CommandName::ConfigAccel)
            .expect("Should parse");
        assert_eq!(params.accel.slow_rate, 10);
        assert_eq!(params.temp.fast_rate, 2);
        assert_eq!(params.temp.sleep_rate, 0);
    }

    #[test]
    fn test_unknown_and_invalid() {
        let mut params = Params::new();
        assert!(matches!(
            params.parse_line("bogus=1", CommandName::ConfigLs),
            Err(ParamError::UnknownKey(_))
        ));
        assert!(matches!(
            params.parse_line("ls_debug=1x", CommandName::ConfigLs),
            Err(ParamError::InvalidNumber { .. })
        ));
        assert!(matches!(
            params.parse_line("mode=turbo", CommandName::Tag),
            Err(ParamError::InvalidMode(_))
        ));
    }

    #[test]
    fn test_bare_name_only_for_rename() {
        let mut params = Params::new();
        params
            .parse_line("kitchen", CommandName::Rename)
            .expect("Should parse");
        let name = params.name.expect("Should have a name");
        assert_eq!(&name[..7], b"kitchen");
        assert!(name[7..].iter().all(|&b| b == 0));

        let mut params = Params::new();
        assert!(params.parse_line("kitchen", CommandName::Blink).is_err());
    }

    #[test]
    fn test_name_length() {
        let mut params = Params::new();
        assert!(params.set_name("thirteen_char").is_ok());
        assert_eq!(params.set_name("fourteen_chars"), Err(ParamError::NameTooLong));
    }

    #[test]
    fn test_file_text() {
        let mut params = Params::new();
        let contents = "# light sensor\nls_slow_interval 600\n\n  ls_movement   3  \nx\nTAG 0x10\n";
        params
            .parse_file_text(contents, CommandName::ConfigLs)
            .expect("Should parse");
        assert_eq!(params.ls.slow_interval, 600);
        assert_eq!(params.ls.movement, 3);
        assert_eq!(params.tag, 16);
    }

    #[test]
    fn test_file_bad_line() {
        let mut params = Params::new();
        assert_eq!(
            params.parse_file_text("ls_debug 1\nls_flags\n", CommandName::ConfigLs),
            Err(ParamError::BadLine { line: 2 })
        );
        assert_eq!(
            params.parse_file_text("ls_debug 1 2\n", CommandName::ConfigLs),
            Err(ParamError::BadLine { line: 1 })
        );
    }

    #[test]
    fn test_i2c_args() {
        assert_eq!(parse_i2c("0x1D:0x0F", false), Ok(I2cCommand::read(0x1D, 0x0F)));
        assert_eq!(parse_i2c("29:32:7", true), Ok(I2cCommand::write(29, 32, 7)));
        assert!(parse_i2c("29", false).is_err());
        assert!(parse_i2c("29:32", true).is_err());
        assert!(parse_i2c("29:32:7", false).is_err());
        assert!(parse_i2c("29:zz", false).is_err());
    }

    #[test]
    fn test_build_commands() {
        let mut params = Params::new();
        params.set_mode("fast").expect("Should parse");
        params.tag = 9;

        assert_eq!(
            params.command(CommandName::Tag, DownloadMode::default()),
            Ok(Command::Tag {
                tag: 9,
                mode: Some(Mode::Fast)
            })
        );
        assert_eq!(
            params.command(CommandName::Blink, DownloadMode::default()),
            Ok(Command::Maint(MaintCommand::BlinkLed {
                led: 6,
                speed: 1,
                duration: 5
            }))
        );
        assert_eq!(
            params.command(CommandName::Rename, DownloadMode::default()),
            Err(ParamError::MissingName(CommandName::Rename))
        );
        assert!(params
            .command(CommandName::I2cRead, DownloadMode::default())
            .is_err());
    }

    #[cfg(feature = "host")]
    #[test]
    fn test_load_input_file_and_line() {
        use std::io::Write;

        let mut file = tempfile::Builder::new()
            .suffix(".cfg")
            .tempfile()
            .expect("Should create file");
        writeln!(file, "blink_speed 3").expect("Should write");

        let mut params = Params::new();
        let path = file.path().to_str().expect("Should be utf-8");
        params
            .load_input(path, CommandName::Blink)
            .expect("Should load");
        assert_eq!(params.blink_speed, 3);

        params
            .load_input("blink_speed=4", CommandName::Blink)
            .expect("Should parse");
        assert_eq!(params.blink_speed, 4);

        assert!(matches!(
            params.load_input("./missing.cfg", CommandName::Blink),
            Err(ParamError::Unreadable(_))
        ));
    }

    #[cfg(feature = "host")]
    #[test]
    fn test_input_file_detection() {
        assert!(is_input_file("params.txt"));
        assert!(is_input_file("dir/params"));
        assert!(!is_input_file("ls_debug=1"));
        assert!(!is_input_file("name=a.b"));
        assert!(!is_input_file("kitchen"));
    }
}
