//! Log record wire formats
//!
//! A log block is a run of records packed back to back. The low nibble of
//! the first byte selects the record type and the length of every record
//! follows from its first one or two bytes:
//!
//! | Type | Record          | Layout                                              |
//! |------|-----------------|-----------------------------------------------------|
//! | 0    | Timestamp       | `[type][tick: u32][flags]`                          |
//! | 1    | Accel           | `[type][x: i8][y: i8][z: i8]`                       |
//! | 2    | LightConfig     | `[type][dac_on][reserved][level_led][gain][log_size]` |
//! | 3    | LightSample     | `[type \| channels << 5][value: u16]{1,3}`          |
//! | 4    | Temperature     | `[type][tenths: i16]`                               |
//! | 5    | Tag             | `[type][tag: u32]`                                  |
//! | 6    | AccelDelta      | `[type][count_bits][packed deltas]`                 |

use thiserror::Error;

/// Record type tags
pub mod record_type {
    pub const TIMESTAMP: u8 = 0;
    pub const ACCEL: u8 = 1;
    pub const LIGHT_CONFIG: u8 = 2;
    pub const LIGHT_SAMPLE: u8 = 3;
    pub const TEMPERATURE: u8 = 4;
    pub const TAG: u8 = 5;
    pub const ACCEL_DELTA: u8 = 6;

    pub const MASK: u8 = 0x0F;
}

/// Timestamp flag bits
pub mod timestamp_flags {
    pub const FAST: u8 = 0x01;
    pub const SLEEP: u8 = 0x02;
    pub const DBG: u8 = 0x10;
    pub const REBOOTED: u8 = 0x80;
}

/// Light sample channel bits
pub mod channel {
    pub const RED: u8 = 0x01;
    pub const IR: u8 = 0x02;
    pub const OFF: u8 = 0x04;
}

/// Largest payload a compressed accelerometer record may carry
const MAX_DELTA_BITS: usize = 144;

/// Width class marking a still run
const CLASS_STILL: u8 = 5;

const STILL_FLAG: u8 = 0x80;

/// Record could not be located in the block
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// Length unknown, later records cannot be found
    #[error("malformed compressed accelerometer header 0x{header:02x} at offset {offset}")]
    Desync { offset: usize, header: u8 },

    #[error("record at offset {offset} needs {needed} bytes, only {available} left")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

impl RecordError {
    /// Rebase an error raised on a sub-slice
    pub fn at(self, base: usize) -> Self {
        match self {
            RecordError::Desync { offset, header } => RecordError::Desync {
                offset: offset + base,
                header,
            },
            RecordError::Truncated {
                offset,
                needed,
                available,
            } => RecordError::Truncated {
                offset: offset + base,
                needed,
                available,
            },
        }
    }
}

/// Per-axis sample width of a compressed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaWidth {
    /// No payload, the previous sample repeats
    Still,
    Bits(u8),
}

impl DeltaWidth {
    fn from_count_bits(count_bits: u8) -> Option<Self> {
        let class = (count_bits >> 4) & 0x07;
        if count_bits & STILL_FLAG != 0 || class == CLASS_STILL {
            return Some(DeltaWidth::Still);
        }
        match class {
            0 => Some(DeltaWidth::Bits(3)),
            1 => Some(DeltaWidth::Bits(4)),
            2 => Some(DeltaWidth::Bits(5)),
            3 => Some(DeltaWidth::Bits(6)),
            4 => Some(DeltaWidth::Bits(8)),
            _ => None,
        }
    }
}

/// Compressed run of accelerometer samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelDelta<'a> {
    pub count_bits: u8,
    /// Packed deltas, X Y Z per sample, MSB first
    pub data: &'a [u8],
}

impl AccelDelta<'_> {
    /// Number of samples in the run
    pub fn count(&self) -> u32 {
        (self.count_bits & 0x0F) as u32 + 1
    }

    pub fn width(&self) -> DeltaWidth {
        // Only well formed headers get past size computation
        DeltaWidth::from_count_bits(self.count_bits).unwrap_or(DeltaWidth::Still)
    }
}

/// Start or end of a light-sensor capture interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightConfig {
    pub dac_on: u8,
    pub reserved: u8,
    pub level_led: u8,
    pub gain: u8,
    pub log_size: u8,
}

/// Up to three light readings in red, IR, off order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightSample {
    /// [`channel`] bits present in this sample
    pub channels: u8,
    pub values: [u16; 3],
}

impl LightSample {
    /// Present channels with their readings
    pub fn readings(&self) -> impl Iterator<Item = (&'static str, u16)> + '_ {
        [(channel::RED, "red"), (channel::IR, "ir"), (channel::OFF, "off")]
            .into_iter()
            .filter(move |(bit, _)| self.channels & bit != 0)
            .zip(self.values)
            .map(|((_, name), value)| (name, value))
    }
}

/// One decoded log record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRecord<'a> {
    Timestamp { tick: u32, flags: u8 },
    Accel([i8; 3]),
    AccelDelta(AccelDelta<'a>),
    LightConfig(LightConfig),
    LightSample(LightSample),
    /// Tenths of a degree Celsius
    Temperature(i16),
    Tag(u32),
    /// Record that was located but carries nothing usable
    Invalid { kind: &'static str },
    /// Unknown type, the rest of the block
    Unknown(&'a [u8]),
}

fn need(buf: &[u8], needed: usize) -> Result<(), RecordError> {
    if buf.len() < needed {
        return Err(RecordError::Truncated {
            offset: 0,
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

#[inline]
fn u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

#[inline]
fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Encoded length of a compressed accelerometer record from its header
pub fn accel_delta_size(count_bits: u8) -> Option<usize> {
    let width = DeltaWidth::from_count_bits(count_bits)?;
    let bits_per_axis = match width {
        DeltaWidth::Still => return Some(2),
        DeltaWidth::Bits(bits) => bits as usize,
    };
    let samples = (count_bits & 0x0F) as usize + 1;
    let bits = samples * 3 * bits_per_axis;
    if bits > MAX_DELTA_BITS {
        return None;
    }
    Some(2 + bits.div_ceil(8))
}

impl<'a> LogRecord<'a> {
    /// Parse the record at the start of `buf`
    ///
    /// `legacy_ls` selects the light sample layout of firmware before 1.8.84.
    /// Returns the record and the number of bytes it occupies.
    pub fn parse(buf: &'a [u8], legacy_ls: bool) -> Result<(Self, usize), RecordError> {
        need(buf, 1)?;
        let header = buf[0];

        match header & record_type::MASK {
            record_type::TIMESTAMP => {
                need(buf, 6)?;
                let record = LogRecord::Timestamp {
                    tick: u32_at(buf, 1),
                    flags: buf[5],
                };
                Ok((record, 6))
            }
            record_type::ACCEL => {
                need(buf, 4)?;
                let sample = [buf[1] as i8, buf[2] as i8, buf[3] as i8];
                Ok((LogRecord::Accel(sample), 4))
            }
            record_type::LIGHT_CONFIG => {
                need(buf, 6)?;
                let config = LightConfig {
                    dac_on: buf[1],
                    reserved: buf[2],
                    level_led: buf[3],
                    gain: buf[4],
                    log_size: buf[5],
                };
                Ok((LogRecord::LightConfig(config), 6))
            }
            record_type::LIGHT_SAMPLE if legacy_ls => Self::parse_legacy_light(buf),
            record_type::LIGHT_SAMPLE => {
                let channels = header >> 5;
                let count = channels.count_ones() as usize;
                let size = 1 + 2 * count;
                need(buf, size)?;
                let mut sample = LightSample {
                    channels,
                    values: [0; 3],
                };
                for i in 0..count {
                    sample.values[i] = u16_at(buf, 1 + 2 * i);
                }
                Ok((LogRecord::LightSample(sample), size))
            }
            record_type::TEMPERATURE => {
                need(buf, 3)?;
                Ok((LogRecord::Temperature(u16_at(buf, 1) as i16), 3))
            }
            record_type::TAG => {
                need(buf, 5)?;
                Ok((LogRecord::Tag(u32_at(buf, 1)), 5))
            }
            record_type::ACCEL_DELTA => {
                need(buf, 2)?;
                let count_bits = buf[1];
                let size = accel_delta_size(count_bits).ok_or(RecordError::Desync {
                    offset: 0,
                    header: count_bits,
                })?;
                need(buf, size)?;
                let delta = AccelDelta {
                    count_bits,
                    data: &buf[2..size],
                };
                Ok((LogRecord::AccelDelta(delta), size))
            }
            _ => Ok((LogRecord::Unknown(buf), buf.len())),
        }
    }

    /// Pre-1.8.84 light sample: channel count in the top two bits of the first value
    fn parse_legacy_light(buf: &'a [u8]) -> Result<(Self, usize), RecordError> {
        need(buf, 3)?;
        let v0 = u16_at(buf, 1);
        let extra = (v0 >> 14) as usize;
        let size = 3 + 2 * extra;
        need(buf, size)?;

        let channels = match extra + 1 {
            1 => channel::IR,
            2 => channel::IR | channel::OFF,
            3 => channel::RED | channel::IR | channel::OFF,
            _ => {
                return Ok((
                    LogRecord::Invalid {
                        kind: "light sample",
                    },
                    size,
                ))
            }
        };
        let mut sample = LightSample {
            channels,
            values: [v0 & 0x3FFF, 0, 0],
        };
        for i in 1..=extra {
            sample.values[i] = u16_at(buf, 1 + 2 * i);
        }
        Ok((LogRecord::LightSample(sample), size))
    }
}
