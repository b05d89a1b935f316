pub mod params;
pub mod types;

pub use params::{parse_i2c, parse_number, ParamError, Params};
pub use types::{Command, CommandName, DownloadMode};
