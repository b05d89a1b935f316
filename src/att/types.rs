//! Attribute protocol opcodes, error codes and decoded PDU types
//!
//! # PDU Format
//!
//! Every PDU starts with a one byte opcode followed by opcode specific
//! fields. All multi-byte integers are little-endian:
//! ```text
//! [opcode: u8][parameters...]
//! ```
//!
//! | Opcode | PDU                    | Parameters                                  |
//! |--------|------------------------|---------------------------------------------|
//! | 0x01   | Error                  | `[req_opcode][handle: u16][ecode]`          |
//! | 0x02   | MTU req                | `[mtu: u16]`                                |
//! | 0x08   | Read By Type req       | `[start: u16][end: u16][type: uuid16/128]`  |
//! | 0x09   | Read By Type resp      | `[stride][records: stride * n]`             |
//! | 0x0A   | Read req               | `[handle: u16]`                             |
//! | 0x0B   | Read resp              | `[value...]`                                |
//! | 0x12   | Write req              | `[handle: u16][value...]`                   |
//! | 0x52   | Write cmd              | `[handle: u16][value...]`                   |
//! | 0x1B   | Handle notify          | `[handle: u16][value...]`                   |
//! | 0x1D   | Handle indicate        | `[handle: u16][value...]`                   |
//! | 0x1E   | Handle confirm         | -                                           |

use thiserror::Error;

/// Attribute protocol opcodes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Error = 0x01,
    MtuReq = 0x02,
    MtuResp = 0x03,
    FindInfoReq = 0x04,
    FindInfoResp = 0x05,
    FindByTypeReq = 0x06,
    FindByTypeResp = 0x07,
    ReadByTypeReq = 0x08,
    ReadByTypeResp = 0x09,
    ReadReq = 0x0A,
    ReadResp = 0x0B,
    ReadBlobReq = 0x0C,
    ReadBlobResp = 0x0D,
    ReadMultiReq = 0x0E,
    ReadMultiResp = 0x0F,
    ReadByGroupReq = 0x10,
    ReadByGroupResp = 0x11,
    WriteReq = 0x12,
    WriteResp = 0x13,
    PrepWriteReq = 0x16,
    PrepWriteResp = 0x17,
    ExecWriteReq = 0x18,
    ExecWriteResp = 0x19,
    HandleNotify = 0x1B,
    HandleInd = 0x1D,
    HandleCnf = 0x1E,
    WriteCmd = 0x52,
    SignedWriteCmd = 0xD2,
}

impl Opcode {
    /// Try to convert a byte to an Opcode
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Error),
            0x02 => Some(Self::MtuReq),
            0x03 => Some(Self::MtuResp),
            0x04 => Some(Self::FindInfoReq),
            0x05 => Some(Self::FindInfoResp),
            0x06 => Some(Self::FindByTypeReq),
            0x07 => Some(Self::FindByTypeResp),
            0x08 => Some(Self::ReadByTypeReq),
            0x09 => Some(Self::ReadByTypeResp),
            0x0A => Some(Self::ReadReq),
            0x0B => Some(Self::ReadResp),
            0x0C => Some(Self::ReadBlobReq),
            0x0D => Some(Self::ReadBlobResp),
            0x0E => Some(Self::ReadMultiReq),
            0x0F => Some(Self::ReadMultiResp),
            0x10 => Some(Self::ReadByGroupReq),
            0x11 => Some(Self::ReadByGroupResp),
            0x12 => Some(Self::WriteReq),
            0x13 => Some(Self::WriteResp),
            0x16 => Some(Self::PrepWriteReq),
            0x17 => Some(Self::PrepWriteResp),
            0x18 => Some(Self::ExecWriteReq),
            0x19 => Some(Self::ExecWriteResp),
            0x1B => Some(Self::HandleNotify),
            0x1D => Some(Self::HandleInd),
            0x1E => Some(Self::HandleCnf),
            0x52 => Some(Self::WriteCmd),
            0xD2 => Some(Self::SignedWriteCmd),
            _ => None,
        }
    }

    /// True for PDUs a server sends in answer to a request
    pub fn is_response(self) -> bool {
        matches!(
            self,
            Self::Error
                | Self::MtuResp
                | Self::FindInfoResp
                | Self::FindByTypeResp
                | Self::ReadByTypeResp
                | Self::ReadResp
                | Self::ReadBlobResp
                | Self::ReadMultiResp
                | Self::ReadByGroupResp
                | Self::WriteResp
                | Self::PrepWriteResp
                | Self::ExecWriteResp
                | Self::HandleCnf
        )
    }

    /// Response opcode expected for a request, if the request has one
    pub fn expected_response(self) -> Option<Self> {
        match self {
            Self::MtuReq => Some(Self::MtuResp),
            Self::FindInfoReq => Some(Self::FindInfoResp),
            Self::FindByTypeReq => Some(Self::FindByTypeResp),
            Self::ReadByTypeReq => Some(Self::ReadByTypeResp),
            Self::ReadReq => Some(Self::ReadResp),
            Self::ReadBlobReq => Some(Self::ReadBlobResp),
            Self::ReadMultiReq => Some(Self::ReadMultiResp),
            Self::ReadByGroupReq => Some(Self::ReadByGroupResp),
            Self::WriteReq => Some(Self::WriteResp),
            Self::PrepWriteReq => Some(Self::PrepWriteResp),
            Self::ExecWriteReq => Some(Self::ExecWriteResp),
            Self::HandleInd => Some(Self::HandleCnf),
            _ => None,
        }
    }

    /// Human readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::MtuReq => "MTU req",
            Self::MtuResp => "MTU resp",
            Self::FindInfoReq => "Find Information req",
            Self::FindInfoResp => "Find Information resp",
            Self::FindByTypeReq => "Find By Type req",
            Self::FindByTypeResp => "Find By Type resp",
            Self::ReadByTypeReq => "Read By Type req",
            Self::ReadByTypeResp => "Read By Type resp",
            Self::ReadReq => "Read req",
            Self::ReadResp => "Read resp",
            Self::ReadBlobReq => "Read Blob req",
            Self::ReadBlobResp => "Read Blob resp",
            Self::ReadMultiReq => "Read Multi req",
            Self::ReadMultiResp => "Read Multi resp",
            Self::ReadByGroupReq => "Read By Group req",
            Self::ReadByGroupResp => "Read By Group resp",
            Self::WriteReq => "Write req",
            Self::WriteResp => "Write resp",
            Self::PrepWriteReq => "Prepare Write req",
            Self::PrepWriteResp => "Prepare Write resp",
            Self::ExecWriteReq => "Exec Write req",
            Self::ExecWriteResp => "Exec Write resp",
            Self::HandleNotify => "Handle notify",
            Self::HandleInd => "Handle indicate",
            Self::HandleCnf => "Handle CNF",
            Self::WriteCmd => "Write cmd",
            Self::SignedWriteCmd => "Signed Write Cmd",
        }
    }
}

/// Name of a raw opcode byte, "Unknown" if unassigned
pub fn op_name(op: u8) -> &'static str {
    Opcode::from_byte(op).map_or("Unknown", Opcode::name)
}

/// Error codes carried in an Error PDU
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidHandle = 0x01,
    ReadNotPermitted = 0x02,
    WriteNotPermitted = 0x03,
    InvalidPdu = 0x04,
    Authentication = 0x05,
    RequestNotSupported = 0x06,
    InvalidOffset = 0x07,
    Authorization = 0x08,
    PrepareQueueFull = 0x09,
    AttributeNotFound = 0x0A,
    AttributeNotLong = 0x0B,
    InsufficientKeySize = 0x0C,
    InvalidValueLength = 0x0D,
    Unlikely = 0x0E,
    InsufficientEncryption = 0x0F,
    UnsupportedGroupType = 0x10,
    InsufficientResources = 0x11,
    Io = 0x80,
    Timeout = 0x81,
    Aborted = 0x82,
}

impl ErrorCode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::InvalidHandle),
            0x02 => Some(Self::ReadNotPermitted),
            0x03 => Some(Self::WriteNotPermitted),
            0x04 => Some(Self::InvalidPdu),
            0x05 => Some(Self::Authentication),
            0x06 => Some(Self::RequestNotSupported),
            0x07 => Some(Self::InvalidOffset),
            0x08 => Some(Self::Authorization),
            0x09 => Some(Self::PrepareQueueFull),
            0x0A => Some(Self::AttributeNotFound),
            0x0B => Some(Self::AttributeNotLong),
            0x0C => Some(Self::InsufficientKeySize),
            0x0D => Some(Self::InvalidValueLength),
            0x0E => Some(Self::Unlikely),
            0x0F => Some(Self::InsufficientEncryption),
            0x10 => Some(Self::UnsupportedGroupType),
            0x11 => Some(Self::InsufficientResources),
            0x80 => Some(Self::Io),
            0x81 => Some(Self::Timeout),
            0x82 => Some(Self::Aborted),
            _ => None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::InvalidHandle => "Invalid handle",
            Self::ReadNotPermitted => "Attribute can't be read",
            Self::WriteNotPermitted => "Attribute can't be written",
            Self::InvalidPdu => "Attribute PDU was invalid",
            Self::Authentication => "Attribute requires authentication before read/write",
            Self::RequestNotSupported => "Server doesn't support the request received",
            Self::InvalidOffset => "Offset past the end of the attribute",
            Self::Authorization => "Attribute requires authorization before read/write",
            Self::PrepareQueueFull => "Too many prepare writes have been queued",
            Self::AttributeNotFound => "No attribute found within the given range",
            Self::AttributeNotLong => "Attribute can't be read/written using Read Blob Req",
            Self::InsufficientKeySize => "Encryption Key Size is insufficient",
            Self::InvalidValueLength => "Attribute value length is invalid",
            Self::Unlikely => "Request attribute has encountered an unlikely error",
            Self::InsufficientEncryption => "Encryption required before read/write",
            Self::UnsupportedGroupType => "Attribute type is not a supported grouping attribute",
            Self::InsufficientResources => "Insufficient Resources to complete the request",
            Self::Io => "Internal application error: I/O",
            Self::Timeout => "A timeout occurred",
            Self::Aborted => "The operation was aborted",
        }
    }
}

/// Description of a raw error code byte
pub fn ecode_name(code: u8) -> &'static str {
    ErrorCode::from_byte(code).map_or("Unexpected error code", ErrorCode::description)
}

/// Why a decoder rejected a PDU
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty PDU")]
    Empty,

    #[error("not a {expected:?} PDU (opcode 0x{found:02x})")]
    WrongOpcode { expected: Opcode, found: u8 },

    #[error("PDU too short: need {needed} bytes, got {len}")]
    TooShort { needed: usize, len: usize },

    #[error("invalid record length {0}")]
    InvalidStride(u8),
}

/// Error PDU contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorResponse {
    pub request: u8,
    pub handle: u16,
    pub code: u8,
}

impl ErrorResponse {
    /// True when the error is Attribute Not Found
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::AttributeNotFound as u8
    }
}

/// Inclusive start/end handle range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleRange {
    pub start: u16,
    pub end: u16,
}

/// Read By Type / Read By Group request contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeRequest {
    pub range: HandleRange,
    pub uuid: crate::uuid::Uuid,
}

/// Find By Type Value request contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindByTypeRequest<'a> {
    pub range: HandleRange,
    pub attr_type: u16,
    pub value: &'a [u8],
}

/// Handle and value borrowed from a PDU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleValue<'a> {
    pub handle: u16,
    pub value: &'a [u8],
}

/// Prepared write request/response contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareWrite<'a> {
    pub handle: u16,
    pub offset: u16,
    pub value: &'a [u8],
}

/// Fixed-stride record list borrowed from a list response
///
/// Trailing bytes that do not fill a whole record are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttDataList<'a> {
    stride: usize,
    data: &'a [u8],
}

impl<'a> AttDataList<'a> {
    pub fn new(stride: usize, data: &'a [u8]) -> Self {
        Self { stride, data }
    }

    /// Length of every record
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of whole records
    pub fn len(&self) -> usize {
        self.data.len().checked_div(self.stride).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&'a [u8]> {
        if index >= self.len() {
            return None;
        }
        let start = index * self.stride;
        Some(&self.data[start..start + self.stride])
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        let whole = self.len() * self.stride;
        self.data[..whole].chunks_exact(self.stride.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_round_trip() {
        for byte in 0..=u8::MAX {
            if let Some(op) = Opcode::from_byte(byte) {
                assert_eq!(op as u8, byte);
            }
        }
    }

    #[test]
    fn test_expected_response_is_response() {
        for byte in 0..=u8::MAX {
            let Some(op) = Opcode::from_byte(byte) else { continue };
            if let Some(resp) = op.expected_response() {
                assert!(resp.is_response(), "{:?} -> {:?}", op, resp);
                assert!(!op.is_response());
            }
        }
        assert_eq!(Opcode::ReadReq.expected_response(), Some(Opcode::ReadResp));
        assert_eq!(Opcode::WriteCmd.expected_response(), None);
        assert_eq!(Opcode::HandleNotify.expected_response(), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(op_name(0x0B), "Read resp");
        assert_eq!(op_name(0x1B), "Handle notify");
        assert_eq!(op_name(0x99), "Unknown");
        assert_eq!(ecode_name(0x0A), "No attribute found within the given range");
        assert_eq!(ecode_name(0x42), "Unexpected error code");
    }

    #[test]
    fn test_data_list_drops_partial_record() {
        let data = [1u8, 2, 3, 4, 5, 6, 7];
        let list = AttDataList::new(3, &data);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(1), Some(&data[3..6]));
        assert_eq!(list.get(2), None);
        assert_eq!(list.iter().count(), 2);
    }
}
