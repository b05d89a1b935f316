pub mod decoder;
pub mod encoder;
pub mod types;

pub use decoder::{decode, Pdu};
pub use types::{
    ecode_name, op_name, AttDataList, DecodeError, ErrorCode, ErrorResponse, HandleRange,
    HandleValue, Opcode,
};
