//! WED characteristic table
//!
//! The table starts with the well-known value handles and is overwritten by
//! full discovery. A value handle of 0 means the characteristic is not
//! resolved and must not be addressed.

use core::fmt;

use thiserror::Error;

use crate::config::{att, handles};
use crate::uuid::Uuid;

/// Build a WED characteristic UUID `cca3xxxx-78c6-4785-9e45-0887d451317c`
const fn wed_uuid(short: u16) -> Uuid {
    Uuid::from_u128(0xCCA3_0000_78C6_4785_9E45_0887_D451_317C | ((short as u128) << 96))
}

/// Known characteristic roles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    ClientConfig,
    Service,
    Status,
    Config,
    LogBlock,
    Firmware,
    Debug,
    Build,
    Version,
}

impl Role {
    pub const ALL: [Role; 9] = [
        Role::ClientConfig,
        Role::Service,
        Role::Status,
        Role::Config,
        Role::LogBlock,
        Role::Firmware,
        Role::Debug,
        Role::Build,
        Role::Version,
    ];

    pub fn uuid(self) -> Uuid {
        match self {
            Role::ClientConfig => Uuid::from_u16(att::GATT_CLIENT_CHARAC_CFG_UUID),
            Role::Service => wed_uuid(0x1000),
            Role::Status => wed_uuid(0x0001),
            Role::Config => wed_uuid(0x0002),
            Role::LogBlock => wed_uuid(0x0003),
            Role::Firmware => wed_uuid(0x0004),
            Role::Debug => wed_uuid(0x0005),
            Role::Build => wed_uuid(0x0006),
            Role::Version => wed_uuid(0x0007),
        }
    }

    fn default_handle(self) -> u16 {
        match self {
            Role::Status => handles::STATUS,
            Role::Config => handles::CONFIG,
            Role::LogBlock => handles::LOG_BLOCK,
            Role::Firmware => handles::FIRMWARE,
            Role::Debug => handles::DEBUG,
            Role::Build => handles::BUILD,
            Role::Version => handles::VERSION,
            Role::ClientConfig | Role::Service => 0,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::ClientConfig => "client config",
            Role::Service => "service",
            Role::Status => "status",
            Role::Config => "config",
            Role::LogBlock => "log block",
            Role::Firmware => "firmware",
            Role::Debug => "debug",
            Role::Build => "build",
            Role::Version => "version",
        };
        f.write_str(name)
    }
}

/// Addressed characteristic has no resolved value handle
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{0} characteristic not ready")]
pub struct NotReady(pub Role);

/// One characteristic declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Characteristic {
    pub uuid: Uuid,
    /// Declaration handle
    pub handle: u16,
    pub properties: u8,
    pub value_handle: u16,
}

impl Characteristic {
    /// Parse a read-by-type record for the characteristic declaration type
    ///
    /// `[decl handle][properties][value handle][uuid16 | uuid128]`, so the
    /// record is 7 or 21 bytes long. Anything else is not a declaration.
    pub fn from_declaration(record: &[u8]) -> Option<Self> {
        if record.len() != 7 && record.len() != 21 {
            return None;
        }
        Some(Self {
            handle: u16::from_le_bytes([record[0], record[1]]),
            properties: record[2],
            value_handle: u16::from_le_bytes([record[3], record[4]]),
            uuid: Uuid::from_wire(&record[5..])?,
        })
    }
}

/// Per-device characteristic table indexed by role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharTable {
    chars: [Characteristic; 9],
}

impl Default for CharTable {
    fn default() -> Self {
        Self {
            chars: Role::ALL.map(|role| Characteristic {
                uuid: role.uuid(),
                handle: 0,
                properties: 0,
                value_handle: role.default_handle(),
            }),
        }
    }
}

impl CharTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store every discovered declaration whose UUID matches a known role
    ///
    /// Returns the number of entries that matched.
    pub fn resolve<I>(&mut self, discovered: I) -> usize
    where
        I: IntoIterator<Item = Characteristic>,
    {
        let mut matched = 0;
        for entry in discovered {
            let Some(role) = Role::ALL.into_iter().find(|role| role.uuid() == entry.uuid) else {
                continue;
            };
            let slot = &mut self.chars[role.index()];
            slot.handle = entry.handle;
            slot.properties = entry.properties;
            slot.value_handle = entry.value_handle;
            matched += 1;
        }
        matched
    }

    /// Value handle of a role, None while unresolved
    pub fn handle_of(&self, role: Role) -> Option<u16> {
        match self.chars[role.index()].value_handle {
            0 => None,
            handle => Some(handle),
        }
    }

    /// Value handle of a role, or a not-ready failure
    pub fn require(&self, role: Role) -> Result<u16, NotReady> {
        self.handle_of(role).ok_or(NotReady(role))
    }

    pub fn get(&self, role: Role) -> &Characteristic {
        &self.chars[role.index()]
    }

    /// Mark a role unresolved, for tests of devices lacking it
    #[cfg(test)]
    pub(crate) fn clear(&mut self, role: Role) {
        self.chars[role.index()].value_handle = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_uuids() {
        assert_eq!(
            format!("{}", Role::Version.uuid()),
            "cca30007-78c6-4785-9e45-0887d451317c"
        );
        assert_eq!(
            format!("{}", Role::Service.uuid()),
            "cca31000-78c6-4785-9e45-0887d451317c"
        );
        assert_eq!(
            Role::ClientConfig.uuid(),
            Uuid::parse("00002902-0000-1000-8000-00805f9b34fb").expect("Should parse")
        );
    }

    #[test]
    fn test_default_handles() {
        let table = CharTable::new();
        assert_eq!(table.handle_of(Role::Status), Some(0x0025));
        assert_eq!(table.handle_of(Role::Version), Some(0x0032));
        assert_eq!(table.handle_of(Role::Service), None);
        assert_eq!(table.require(Role::ClientConfig), Err(NotReady(Role::ClientConfig)));
    }

    #[test]
    fn test_resolve_16_and_128_bit_entries() {
        let mut record = [0u8; 21];
        record[..5].copy_from_slice(&[0x40, 0x00, 0x12, 0x41, 0x00]);
        Role::Status.uuid().write_wire(&mut record[5..]);
        let status = Characteristic::from_declaration(&record).expect("Should parse");

        let short = [0x50, 0x00, 0x0A, 0x51, 0x00, 0x02, 0x29];
        let cccd = Characteristic::from_declaration(&short).expect("Should parse");

        let other = Characteristic::from_declaration(&[0x60, 0x00, 0x02, 0x61, 0x00, 0x00, 0x2A])
            .expect("Should parse");

        let mut table = CharTable::new();
        assert_eq!(table.resolve([status, cccd, other]), 2);
        assert_eq!(table.handle_of(Role::Status), Some(0x0041));
        assert_eq!(table.get(Role::Status).properties, 0x12);
        assert_eq!(table.get(Role::Status).handle, 0x0040);
        assert_eq!(table.handle_of(Role::ClientConfig), Some(0x0051));
        // Untouched roles keep their defaults
        assert_eq!(table.handle_of(Role::Config), Some(0x0027));
    }

    #[test]
    fn test_declaration_length() {
        assert!(Characteristic::from_declaration(&[0u8; 6]).is_none());
        assert!(Characteristic::from_declaration(&[0u8; 9]).is_none());
    }
}
