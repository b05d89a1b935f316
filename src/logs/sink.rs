//! Decoded log events and where they go

use core::fmt;

use crate::logs::record::{LightConfig, LightSample};

/// One output line worth of decoded log data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent<'a> {
    Timestamp { tick: u32, flags: u8 },
    Accel([i8; 3]),
    /// Compressed record left undecoded
    AccelCompressed { count_bits: u8, data: &'a [u8] },
    LightConfig(LightConfig),
    LightSample(LightSample),
    Temperature(i16),
    Tag(u32),
}

impl LogEvent<'_> {
    /// Accelerometer lines are the ones mirrored to the console
    pub fn is_accel(&self) -> bool {
        matches!(self, LogEvent::Accel(_))
    }
}

impl fmt::Display for LogEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEvent::Timestamp { tick, flags } => {
                write!(f, "[\"timestamp\",[{},{}]]", tick, flags)
            }
            LogEvent::Accel([x, y, z]) => write!(f, "[\"accelerometer\",[{},{},{}]]", x, y, z),
            LogEvent::AccelCompressed { count_bits, data } => {
                write!(
                    f,
                    "[\"accelerometer_compressed\",[\"count_bits\",{}],[\"data\",[",
                    count_bits
                )?;
                for (i, byte) in data.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", byte)?;
                }
                f.write_str("]]]")
            }
            LogEvent::LightConfig(config) => write!(
                f,
                "[\"lightsensor_config\",[\"dac_on\",{}],[\"level_led\",{}],[\"gain\",{}],[\"log_size\",{}]]",
                config.dac_on, config.level_led, config.gain, config.log_size
            ),
            LogEvent::LightSample(sample) => {
                f.write_str("[\"lightsensor\"")?;
                for (name, value) in sample.readings() {
                    write!(f, ",[\"{}\",{}]", name, value)?;
                }
                f.write_str("]")
            }
            LogEvent::Temperature(tenths) => write!(f, "[\"temperature\",{}]", tenths),
            LogEvent::Tag(tag) => write!(f, "[\"tag\",{}]", tag),
        }
    }
}

/// Receiver of decoded log events
///
/// Write failures are the sink's concern; decoding carries on regardless.
pub trait LogSink {
    fn emit(&mut self, event: &LogEvent<'_>);
}

impl<S: LogSink + ?Sized> LogSink for &mut S {
    fn emit(&mut self, event: &LogEvent<'_>) {
        (**self).emit(event)
    }
}

/// Sink that drops everything
pub struct NullSink;

impl LogSink for NullSink {
    fn emit(&mut self, _event: &LogEvent<'_>) {}
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::string::{String, ToString};
    use std::vec::Vec;

    /// Collects every event as its output line
    #[derive(Default)]
    pub struct CollectSink {
        pub lines: Vec<String>,
    }

    impl CollectSink {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl LogSink for CollectSink {
        fn emit(&mut self, event: &LogEvent<'_>) {
            self.lines.push(event.to_string());
        }
    }
}
