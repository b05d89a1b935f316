//! Protocol constants for the WED attribute profile and the host tool

/// Attribute protocol constants
pub mod att {
    /// Fixed L2CAP channel carrying ATT on LE links
    pub const CID: u16 = 4;

    /// Default LE MTU before any exchange
    pub const DEFAULT_LE_MTU: usize = 23;

    /// Largest MTU the codec buffers are sized for
    pub const MAX_MTU: usize = 512;

    /// Receive buffer for one inbound PDU
    pub const RX_BUFFER_SIZE: usize = 1024;

    /// Characteristic declaration attribute type
    pub const GATT_CHARAC_UUID: u16 = 0x2803;

    /// Client characteristic configuration descriptor
    pub const GATT_CLIENT_CHARAC_CFG_UUID: u16 = 0x2902;

    /// Handle range scanned by full discovery
    pub const START_HANDLE: u16 = 0x0001;
    pub const END_HANDLE: u16 = 0xFFFF;
}

/// WED device constants
pub mod wed {
    /// Device clock rate for status and timestamp records
    pub const TICKS_PER_SEC: u32 = 128;

    pub const TAG_SIZE: usize = 4;

    /// Maximum device name length for rename
    pub const NAME_LEN: usize = 13;

    /// Config write: type tag plus the largest union member
    pub const CONFIG_SIZE: usize = 14;

    /// Legacy light-sensor config write (firmware before 1.8.117)
    pub const LEGACY_LS_CONFIG_SIZE: usize = 19;

    /// Millisecond scale of config rate parameters
    pub const RATE_SCALE: u32 = 10;

    /// Status payload length without and with the reboot count
    pub const STATUS_MIN_SIZE: usize = 14;
    pub const STATUS_SIZE: usize = 15;

    /// Default blink parameters
    pub const BLINK_LED: u8 = 6;
    pub const BLINK_SPEED: u8 = 1;
    pub const BLINK_DURATION: u8 = 5;
}

/// Firmware version thresholds
pub mod versions {
    /// Flatten a version for ordered comparison
    pub const fn flat(major: u8, minor: u8, build: u16) -> u32 {
        ((major as u32) << 24) | ((minor as u32) << 16) | build as u32
    }

    /// Light samples carry per-channel flags in the type byte from here on
    pub const LS_CHANNEL_FLAGS: u32 = flat(1, 8, 84);

    /// Older firmware uses an incompatible config layout
    pub const COMPATIBLE_CONFIG: u32 = flat(1, 8, 89);

    /// Light-sensor config switched to the per-rate duration layout
    pub const LS_CONFIG_V2: u32 = flat(1, 8, 117);
}

/// Default characteristic value handles
pub mod handles {
    pub const STATUS: u16 = 0x0025;
    pub const CONFIG: u16 = 0x0027;
    pub const LOG_BLOCK: u16 = 0x0029;
    pub const FIRMWARE: u16 = 0x002C;
    pub const DEBUG: u16 = 0x002E;
    pub const BUILD: u16 = 0x0030;
    pub const VERSION: u16 = 0x0032;
}

/// Firmware update constants
pub mod firmware {
    pub const BLOCK_SIZE: usize = 16;
    pub const BLOCKS_PER_PAGE: usize = 16;
    pub const HEADER_SIZE: usize = 16;
    pub const HEADER_ID: u16 = 0x0101;

    /// Command packet: type byte plus one block
    pub const COMMAND_SIZE: usize = 1 + BLOCK_SIZE;

    /// Consecutive block write failures tolerated before aborting
    pub const MAX_WRITE_RETRIES: u32 = 5;
}

/// Driver timing in milliseconds
pub mod timing {
    pub const KEEPALIVE_MS: u64 = 60_000;
    pub const DOWNLOAD_TIMEOUT_MS: u64 = 2_000;
    pub const POLL_MS: u64 = 20;
    pub const CONNECT_TIMEOUT_MS: u64 = 5_000;
}

/// Host limits
pub mod limits {
    /// Devices driven in one run
    pub const MAX_DEVICES: usize = 2;

    /// Longest accepted parameter line or file entry
    pub const MAX_PARAM_LEN: usize = 256;
}
