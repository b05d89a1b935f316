pub mod bits;
pub mod decoder;
pub mod record;
pub mod sink;

pub use decoder::{BlockOutcome, DecoderOptions, LogDecoder};
pub use record::{LogRecord, RecordError};
pub use sink::{LogEvent, LogSink, NullSink};
