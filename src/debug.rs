//! Diagnostic dump helpers
//!
//! Formatting is lazy so dumps passed to `log` macros cost nothing when the
//! level is filtered out.

use core::fmt;

/// Space separated lower-case hex bytes, `0a 25 00`
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Unhandled PDU with its opcode name, `Unhandled (Read resp): 0b 01 02`
pub struct PduDump<'a>(pub &'a [u8]);

impl fmt::Display for PduDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .0
            .first()
            .map_or("Empty", |&op| crate::att::op_name(op));
        write!(f, "Unhandled ({}): {}", name, HexDump(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dump() {
        assert_eq!(format!("{}", HexDump(&[0x0A, 0x25, 0x00])), "0a 25 00");
        assert_eq!(format!("{}", HexDump(&[])), "");
    }

    #[test]
    fn test_pdu_dump() {
        assert_eq!(
            format!("{}", PduDump(&[0x0B, 0x01])),
            "Unhandled (Read resp): 0b 01"
        );
        assert_eq!(format!("{}", PduDump(&[0x99])), "Unhandled (Unknown): 99");
    }
}
