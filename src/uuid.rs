//! Bluetooth UUIDs in 16, 32 and 128-bit form
//!
//! Short UUIDs are aliases into the Bluetooth base UUID
//! `0000xxxx-0000-1000-8000-00805F9B34FB`. Every comparison goes through the
//! expanded 128-bit value, so `0x2902` equals
//! `00002902-0000-1000-8000-00805f9b34fb`.
//!
//! 128-bit values are stored in wire (little-endian) order.

use core::fmt;

use thiserror::Error;

/// Bluetooth base UUID in wire order
const BASE_UUID: [u8; 16] = [
    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Offset of the short value inside the wire-order base
const SHORT_OFFSET: usize = 12;

/// Canonical string length of a 128-bit UUID
const UUID128_STR_LEN: usize = 36;

/// Malformed UUID string
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid UUID format")]
pub struct UuidError;

/// Bluetooth UUID
#[derive(Debug, Clone, Copy)]
pub enum Uuid {
    Uuid16(u16),
    Uuid32(u32),
    /// Wire (little-endian) byte order
    Uuid128([u8; 16]),
}

impl Uuid {
    pub const fn from_u16(value: u16) -> Self {
        Uuid::Uuid16(value)
    }

    pub const fn from_u32(value: u32) -> Self {
        Uuid::Uuid32(value)
    }

    /// Create from a big-endian integer as written in the canonical string
    pub const fn from_u128(value: u128) -> Self {
        Uuid::Uuid128(value.to_le_bytes())
    }

    /// Create from 16 bytes in wire order
    pub const fn from_le_bytes(bytes: [u8; 16]) -> Self {
        Uuid::Uuid128(bytes)
    }

    /// Expand to 128 bits, wire order
    pub fn to_uuid128(&self) -> [u8; 16] {
        match *self {
            Uuid::Uuid16(v) => {
                let mut out = BASE_UUID;
                out[SHORT_OFFSET..SHORT_OFFSET + 2].copy_from_slice(&v.to_le_bytes());
                out
            }
            Uuid::Uuid32(v) => {
                let mut out = BASE_UUID;
                out[SHORT_OFFSET..SHORT_OFFSET + 4].copy_from_slice(&v.to_le_bytes());
                out
            }
            Uuid::Uuid128(bytes) => bytes,
        }
    }

    /// Number of bytes this UUID occupies in an ATT PDU
    ///
    /// 32-bit UUIDs are not carried by ATT and expand to 16 bytes.
    pub fn wire_len(&self) -> usize {
        match self {
            Uuid::Uuid16(_) => 2,
            _ => 16,
        }
    }

    /// Write the UUID in ATT wire form, returning bytes written or 0 if it does not fit
    pub fn write_wire(&self, out: &mut [u8]) -> usize {
        let len = self.wire_len();
        if out.len() < len {
            return 0;
        }
        match *self {
            Uuid::Uuid16(v) => out[..2].copy_from_slice(&v.to_le_bytes()),
            _ => out[..16].copy_from_slice(&self.to_uuid128()),
        }
        len
    }

    /// Read a 2 or 16 byte ATT wire UUID
    pub fn from_wire(bytes: &[u8]) -> Option<Self> {
        match bytes.len() {
            2 => Some(Uuid::Uuid16(u16::from_le_bytes([bytes[0], bytes[1]]))),
            16 => {
                let mut out = [0u8; 16];
                out.copy_from_slice(bytes);
                Some(Uuid::Uuid128(out))
            }
            _ => None,
        }
    }

    /// Parse a canonical UUID string
    ///
    /// - 36 characters with dashes at 8, 13, 18, 23: 128-bit
    /// - 8 or 10 (`0x` prefixed) hex characters: 32-bit
    /// - 4 or 6 (`0x` prefixed) hex characters: 16-bit
    pub fn parse(s: &str) -> Result<Self, UuidError> {
        let bytes = s.as_bytes();
        match bytes.len() {
            4 | 6 => {
                let digits = strip_hex_prefix(s, 4)?;
                u16::from_str_radix(digits, 16)
                    .map(Uuid::Uuid16)
                    .map_err(|_| UuidError)
            }
            8 | 10 => {
                let digits = strip_hex_prefix(s, 8)?;
                u32::from_str_radix(digits, 16)
                    .map(Uuid::Uuid32)
                    .map_err(|_| UuidError)
            }
            UUID128_STR_LEN => parse_uuid128(bytes).map(Uuid::Uuid128),
            _ => Err(UuidError),
        }
    }
}

/// Accept `digits` hex characters with an optional `0x` prefix
fn strip_hex_prefix(s: &str, digits: usize) -> Result<&str, UuidError> {
    let body = if s.len() == digits + 2 {
        s.strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or(UuidError)?
    } else {
        s
    };
    if body.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(body)
    } else {
        Err(UuidError)
    }
}

fn hex_value(b: u8) -> Result<u8, UuidError> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(UuidError),
    }
}

fn parse_uuid128(bytes: &[u8]) -> Result<[u8; 16], UuidError> {
    for (i, &b) in bytes.iter().enumerate() {
        let dash = matches!(i, 8 | 13 | 18 | 23);
        if dash != (b == b'-') {
            return Err(UuidError);
        }
    }

    // Big-endian as written, stored reversed
    let mut out = [0u8; 16];
    let mut idx = 15usize;
    let mut digits = bytes.iter().copied().filter(|&b| b != b'-');
    while let (Some(hi), Some(lo)) = (digits.next(), digits.next()) {
        out[idx] = (hex_value(hi)? << 4) | hex_value(lo)?;
        idx = idx.wrapping_sub(1);
    }
    Ok(out)
}

impl PartialEq for Uuid {
    fn eq(&self, other: &Self) -> bool {
        self.to_uuid128() == other.to_uuid128()
    }
}

impl Eq for Uuid {}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Uuid::Uuid16(v) => write!(f, "{:04x}", v),
            Uuid::Uuid32(v) => write!(f, "{:08x}", v),
            Uuid::Uuid128(bytes) => {
                for (pos, i) in (0..16).rev().enumerate() {
                    if matches!(pos, 4 | 6 | 8 | 10) {
                        f.write_str("-")?;
                    }
                    write!(f, "{:02x}", bytes[i])?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_16_matches_base() {
        let cfg = Uuid::from_u16(0x2902);
        let full = Uuid::parse("00002902-0000-1000-8000-00805f9b34fb").expect("Should parse");
        assert_eq!(cfg, full);
        assert_eq!(cfg.to_uuid128()[12], 0x02);
        assert_eq!(cfg.to_uuid128()[13], 0x29);
    }

    #[test]
    fn test_every_16_bit_equals_its_expansion() {
        for v in 0..=u16::MAX {
            let short = Uuid::from_u16(v);
            let long = Uuid::from_le_bytes(short.to_uuid128());
            assert_eq!(short, long);
        }
    }

    #[test]
    fn test_32_bit_equality_with_16_bit() {
        assert_eq!(Uuid::from_u32(0x0000_180F), Uuid::from_u16(0x180F));
        assert_ne!(Uuid::from_u32(0x0001_180F), Uuid::from_u16(0x180F));
    }

    #[test]
    fn test_parse_widths() {
        assert!(matches!(Uuid::parse("2803"), Ok(Uuid::Uuid16(0x2803))));
        assert!(matches!(Uuid::parse("0x2803"), Ok(Uuid::Uuid16(0x2803))));
        assert!(matches!(Uuid::parse("cca30001"), Ok(Uuid::Uuid32(0xCCA3_0001))));
        assert!(matches!(Uuid::parse("0xCCA30001"), Ok(Uuid::Uuid32(0xCCA3_0001))));
        assert!(matches!(
            Uuid::parse("cca30001-78c6-4785-9e45-0887d451317c"),
            Ok(Uuid::Uuid128(_))
        ));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(Uuid::parse(""), Err(UuidError));
        assert_eq!(Uuid::parse("28g3"), Err(UuidError));
        assert_eq!(Uuid::parse("0y2803"), Err(UuidError));
        assert_eq!(Uuid::parse("12345"), Err(UuidError));
        // Dash in the wrong place
        assert_eq!(
            Uuid::parse("cca3000-178c6-4785-9e45-0887d451317c"),
            Err(UuidError)
        );
        assert_eq!(
            Uuid::parse("cca30001-78c6-4785-9e45-0887d451317z"),
            Err(UuidError)
        );
    }

    #[test]
    fn test_128_bit_wire_order() {
        let uuid = Uuid::from_u128(0xCCA30001_78C6_4785_9E45_0887D451317C);
        let bytes = uuid.to_uuid128();
        assert_eq!(bytes[0], 0x7C);
        assert_eq!(bytes[15], 0xCC);
        assert_eq!(
            uuid,
            Uuid::parse("CCA30001-78C6-4785-9E45-0887D451317C").expect("Should parse")
        );
    }

    #[test]
    fn test_format_round_trip() {
        let inputs = [
            "2902",
            "0x180f",
            "cca31000",
            "0x0000ffff",
            "cca30007-78c6-4785-9e45-0887d451317c",
            "00002902-0000-1000-8000-00805F9B34FB",
        ];
        for input in inputs {
            let uuid = Uuid::parse(input).expect("Should parse");
            let text = format!("{}", uuid);
            let again = Uuid::parse(&text).expect("Formatted text should parse");
            assert_eq!(uuid, again, "round trip of {}", input);
        }
        assert_eq!(format!("{}", Uuid::from_u16(0x2a)), "002a");
        assert_eq!(format!("{}", Uuid::from_u32(0x2a)), "0000002a");
        assert_eq!(
            format!("{}", Uuid::from_u128(0xCCA31000_78C6_4785_9E45_0887D451317C)),
            "cca31000-78c6-4785-9e45-0887d451317c"
        );
    }

    #[test]
    fn test_wire_helpers() {
        let mut buf = [0u8; 16];
        assert_eq!(Uuid::from_u16(0x2803).write_wire(&mut buf), 2);
        assert_eq!(&buf[..2], &[0x03, 0x28]);
        assert_eq!(Uuid::from_wire(&buf[..2]), Some(Uuid::from_u16(0x2803)));

        let long = Uuid::from_u128(0xCCA30002_78C6_4785_9E45_0887D451317C);
        assert_eq!(long.write_wire(&mut buf[..15]), 0);
        assert_eq!(long.write_wire(&mut buf), 16);
        assert_eq!(Uuid::from_wire(&buf), Some(long));
        assert_eq!(Uuid::from_wire(&buf[..3]), None);
    }
}
