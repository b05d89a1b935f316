//! Device status characteristic
//!
//! ```text
//! [num_log_entries: u32][battery: u8][status: u8][cur_time: u32][tag: [u8; 4]][reboot_count: u8]?
//! ```

use core::fmt;

use crate::config::wed::{STATUS_MIN_SIZE, STATUS_SIZE, TAG_SIZE, TICKS_PER_SEC};
use crate::wed::{require_len, PayloadError};

/// Status bit field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags(pub u8);

impl StatusFlags {
    pub const UPDATE: u8 = 0x01;
    pub const FAST_MODE: u8 = 0x02;
    pub const CHARGING: u8 = 0x04;
    pub const LIGHT_CAPTURE: u8 = 0x08;
    pub const SLEEP_MODE: u8 = 0x10;
    pub const WORN: u8 = 0x20;
    pub const RECORDING: u8 = 0x40;

    pub fn contains(&self, bit: u8) -> bool {
        self.0 & bit != 0
    }
}

/// One status snapshot; a later snapshot replaces the previous one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status {
    pub num_log_entries: u32,
    pub battery_level: u8,
    pub flags: StatusFlags,
    /// Device clock in ticks
    pub cur_time: u32,
    pub tag: [u8; TAG_SIZE],
    /// Absent on older firmware
    pub reboot_count: Option<u8>,
}

impl Status {
    pub fn parse(data: &[u8]) -> Result<Self, PayloadError> {
        require_len("status", data, STATUS_MIN_SIZE)?;
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&data[10..10 + TAG_SIZE]);
        Ok(Self {
            num_log_entries: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            battery_level: data[4],
            flags: StatusFlags(data[5]),
            cur_time: u32::from_le_bytes([data[6], data[7], data[8], data[9]]),
            tag,
            reboot_count: (data.len() >= STATUS_SIZE).then(|| data[STATUS_MIN_SIZE]),
        })
    }

    /// Clock in milliseconds
    pub fn time_ms(&self) -> u64 {
        self.cur_time as u64 * 1000 / TICKS_PER_SEC as u64
    }

    pub fn tag_value(&self) -> u32 {
        u32::from_le_bytes(self.tag)
    }

    /// Short report for the console
    pub fn report(&self) -> StatusReport<'_> {
        StatusReport(self)
    }
}

/// `Logs: 120, Battery: 80%, Time: 10.000s, Reboots: 2, (Worn)`
pub struct StatusReport<'a>(&'a Status);

impl fmt::Display for StatusReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.0;
        let ms = status.time_ms();
        write!(
            f,
            "Logs: {}, Battery: {}%, Time: {}.{:03}s",
            status.num_log_entries,
            status.battery_level,
            ms / 1000,
            ms % 1000
        )?;
        if let Some(reboots) = status.reboot_count {
            write!(f, ", Reboots: {}", reboots)?;
        }

        let flags = status.flags;
        if flags.contains(StatusFlags::UPDATE) {
            f.write_str(", (Updating)")?;
        }
        if flags.contains(StatusFlags::FAST_MODE) {
            f.write_str(", (Fast Mode)")?;
        } else if flags.contains(StatusFlags::SLEEP_MODE) {
            f.write_str(", (Sleep Mode)")?;
        }
        if flags.contains(StatusFlags::CHARGING) {
            f.write_str(", (Charging)")?;
        }
        if flags.contains(StatusFlags::LIGHT_CAPTURE) {
            f.write_str(", (Light Capture)")?;
        }
        if flags.contains(StatusFlags::WORN) {
            f.write_str(", (Worn)")?;
        }
        if flags.contains(StatusFlags::RECORDING) {
            f.write_str(", (Recording)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_bytes(entries: u32, battery: u8, flags: u8, ticks: u32, reboot: u8) -> [u8; 15] {
        let mut buf = [0u8; 15];
        buf[..4].copy_from_slice(&entries.to_le_bytes());
        buf[4] = battery;
        buf[5] = flags;
        buf[6..10].copy_from_slice(&ticks.to_le_bytes());
        buf[14] = reboot;
        buf
    }

    #[test]
    fn test_cold_status_report() {
        let buf = status_bytes(120, 80, 0x20, 1280, 2);
        let status = Status::parse(&buf).expect("Should parse");
        assert_eq!(status.num_log_entries, 120);
        assert_eq!(status.reboot_count, Some(2));
        assert_eq!(
            format!("{}", status.report()),
            "Logs: 120, Battery: 80%, Time: 10.000s, Reboots: 2, (Worn)"
        );
    }

    #[test]
    fn test_reboot_count_optional() {
        let buf = status_bytes(5, 50, 0x00, 64, 9);
        let status = Status::parse(&buf[..14]).expect("Should parse");
        assert_eq!(status.reboot_count, None);
        assert_eq!(format!("{}", status.report()), "Logs: 5, Battery: 50%, Time: 0.500s");
        assert!(Status::parse(&buf[..13]).is_err());
    }

    #[test]
    fn test_mode_flags() {
        let buf = status_bytes(0, 100, 0x02 | 0x10 | 0x04 | 0x01, 0, 0);
        let status = Status::parse(&buf).expect("Should parse");
        let text = format!("{}", status.report());
        assert!(text.contains("(Updating)"));
        assert!(text.contains("(Fast Mode)"));
        // Fast mode wins over sleep mode
        assert!(!text.contains("(Sleep Mode)"));
        assert!(text.contains("(Charging)"));
    }

    #[test]
    fn test_tag_value() {
        let mut buf = status_bytes(0, 0, 0, 0, 0);
        buf[10..14].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        let status = Status::parse(&buf).expect("Should parse");
        assert_eq!(status.tag_value(), 0xDEAD_BEEF);
    }
}
