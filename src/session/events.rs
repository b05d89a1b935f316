//! What a session reports back to the driver

use core::fmt;

use crate::chars::Characteristic;
use crate::firmware::Progress;
use crate::logs::RecordError;
use crate::wed::{I2cResult, Status, StatusFlags, Version};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Build(String),
    Version { version: Version, compatible: bool },
    /// Status read after discovery
    Status(Status),
    /// Status refreshed by a keep-alive
    KeepAlive(Status),
    /// Declaration seen during full discovery
    Characteristic(Characteristic),
    ExtendedStatus {
        status: Status,
        version: Option<Version>,
    },
    I2c(I2cResult),
    FirmwareProgress(Progress),
    FirmwareDone,
    /// Download finished with this many entries read of the announced total
    DownloadDone { read: u32, total: u32 },
    /// Nothing stored on the device
    NothingToDownload,
    /// Rest of a notification dropped
    Desync(RecordError),
    ConfigWritten,
    /// Raw PDU nobody handled
    Unhandled(Vec<u8>),
}

/// Every status field, for `extstatus`
pub struct ExtendedStatusReport<'a> {
    pub status: &'a Status,
    pub version: Option<&'a Version>,
}

impl fmt::Display for ExtendedStatusReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status;
        let flags = status.flags;
        let ms = status.time_ms();

        if let Some(version) = self.version {
            writeln!(f, "Version:        {}", version)?;
        }
        writeln!(f, "Log entries:    {}", status.num_log_entries)?;
        writeln!(f, "Battery:        {}%", status.battery_level)?;
        writeln!(f, "Status bits:    {:#04x}", flags.0)?;
        writeln!(f, "  update:        {}", flags.contains(StatusFlags::UPDATE))?;
        writeln!(f, "  fast mode:     {}", flags.contains(StatusFlags::FAST_MODE))?;
        writeln!(f, "  sleep mode:    {}", flags.contains(StatusFlags::SLEEP_MODE))?;
        writeln!(f, "  charging:      {}", flags.contains(StatusFlags::CHARGING))?;
        writeln!(f, "  light capture: {}", flags.contains(StatusFlags::LIGHT_CAPTURE))?;
        writeln!(f, "  worn:          {}", flags.contains(StatusFlags::WORN))?;
        writeln!(f, "  recording:     {}", flags.contains(StatusFlags::RECORDING))?;
        writeln!(
            f,
            "Time:           {}.{:03}s ({} ticks)",
            ms / 1000,
            ms % 1000,
            status.cur_time
        )?;
        write!(f, "Tag:            {:#010x}", status.tag_value())?;
        if let Some(reboots) = status.reboot_count {
            write!(f, "\nReboots:        {}", reboots)?;
        }
        Ok(())
    }
}
