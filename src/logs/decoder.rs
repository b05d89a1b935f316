//! Log block decoder
//!
//! Turns log-block notifications into [`LogEvent`]s and keeps the download
//! counters. Compressed accelerometer runs are deltas against the last
//! sample, so the decoder holds a per-axis base that carries across
//! notifications.

use log::{debug, warn};

use crate::debug::HexDump;
use crate::logs::bits::BitReader;
use crate::logs::record::{timestamp_flags, AccelDelta, DeltaWidth, LogRecord, RecordError};
use crate::logs::sink::{LogEvent, LogSink};
use crate::wed::Version;

/// Decoder behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Expand compressed accelerometer runs, otherwise emit them raw
    pub decompress: bool,
    /// A tag record invalidates the delta base
    pub tag_resets_base: bool,
    /// Streaming without a stored-entry count, never completes on its own
    pub live: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            decompress: true,
            tag_resets_base: false,
            live: false,
        }
    }
}

/// Result of one notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Payload too short to hold a record, the device has no more data
    EndOfStream { handle: u16 },
    Decoded { handle: u16, records: usize },
}

/// Stateful log stream decoder, one per device
pub struct LogDecoder {
    options: DecoderOptions,
    legacy_ls: bool,
    base: [i8; 3],
    valid_accel: bool,
    read: u32,
    total: u32,
}

impl LogDecoder {
    pub fn new(options: DecoderOptions) -> Self {
        Self {
            options,
            legacy_ls: false,
            base: [0; 3],
            valid_accel: false,
            read: 0,
            total: 0,
        }
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    /// Select record layouts for the device firmware
    pub fn set_version(&mut self, version: &Version) {
        self.legacy_ls = !version.has_ls_channel_flags();
    }

    /// Reset the counters for a download of `total` stored entries
    pub fn start_download(&mut self, total: u32) {
        self.read = 0;
        self.total = total;
    }

    pub fn read_count(&self) -> u32 {
        self.read
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Download finished: everything announced was read or the device is empty
    pub fn is_complete(&self, remaining: u32) -> bool {
        !self.options.live && (self.read >= self.total || remaining == 0)
    }

    /// Decode a full handle-value notification PDU
    ///
    /// `[opcode][handle: u16][records...]`
    pub fn decode_notification<S: LogSink>(
        &mut self,
        pdu: &[u8],
        sink: &mut S,
    ) -> Result<BlockOutcome, RecordError> {
        let handle = match pdu {
            [_, lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
            _ => 0,
        };
        if pdu.len() < 4 {
            return Ok(BlockOutcome::EndOfStream { handle });
        }
        let records = self.decode_block(&pdu[3..], sink)?;
        Ok(BlockOutcome::Decoded { handle, records })
    }

    /// Decode concatenated records, returning how many were parsed
    ///
    /// Records before a malformed one are still delivered.
    pub fn decode_block<S: LogSink>(
        &mut self,
        block: &[u8],
        sink: &mut S,
    ) -> Result<usize, RecordError> {
        let mut offset = 0;
        let mut records = 0;
        while offset < block.len() {
            let (record, len) =
                LogRecord::parse(&block[offset..], self.legacy_ls).map_err(|e| e.at(offset))?;
            self.apply(record, sink);
            offset += len;
            records += 1;
        }
        Ok(records)
    }

    fn apply<S: LogSink>(&mut self, record: LogRecord<'_>, sink: &mut S) {
        if let LogRecord::AccelDelta(delta) = record {
            self.read = self.read.saturating_add(delta.count());
            self.apply_delta(delta, sink);
            return;
        }

        self.read = self.read.saturating_add(1);
        match record {
            LogRecord::Timestamp { tick, flags } => {
                if flags & timestamp_flags::REBOOTED != 0 {
                    warn!("Download: reboot detected, resuming at tick {}", tick);
                }
                sink.emit(&LogEvent::Timestamp { tick, flags });
            }
            LogRecord::Accel(sample) => {
                self.base = sample;
                self.valid_accel = true;
                sink.emit(&LogEvent::Accel(sample));
            }
            LogRecord::LightConfig(config) => sink.emit(&LogEvent::LightConfig(config)),
            LogRecord::LightSample(sample) => {
                if sample.channels != 0 {
                    sink.emit(&LogEvent::LightSample(sample));
                }
            }
            LogRecord::Temperature(tenths) => sink.emit(&LogEvent::Temperature(tenths)),
            LogRecord::Tag(tag) => {
                if self.options.tag_resets_base {
                    self.base = [0; 3];
                    self.valid_accel = false;
                }
                sink.emit(&LogEvent::Tag(tag));
            }
            LogRecord::Invalid { kind } => warn!("Download: invalid {} ignored", kind),
            LogRecord::Unknown(rest) => {
                warn!("Download: unknown record, dropping {}", HexDump(rest))
            }
            LogRecord::AccelDelta(_) => {}
        }
    }

    fn apply_delta<S: LogSink>(&mut self, delta: AccelDelta<'_>, sink: &mut S) {
        if !self.options.decompress {
            sink.emit(&LogEvent::AccelCompressed {
                count_bits: delta.count_bits,
                data: delta.data,
            });
            return;
        }
        if !self.valid_accel {
            debug!("Download: no base sample yet, skipping {} deltas", delta.count());
            return;
        }

        match delta.width() {
            DeltaWidth::Still => {
                for _ in 0..delta.count() {
                    sink.emit(&LogEvent::Accel(self.base));
                }
            }
            DeltaWidth::Bits(width) => {
                let mut reader = BitReader::new(delta.data);
                'samples: for _ in 0..delta.count() {
                    for axis in self.base.iter_mut() {
                        let Some(diff) = reader.read_signed(width) else {
                            break 'samples;
                        };
                        *axis = axis.wrapping_add(diff);
                    }
                    sink.emit(&LogEvent::Accel(self.base));
                }
            }
        }
    }
}
