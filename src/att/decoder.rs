//! PDU decoders
//!
//! Decoders check the opcode and the minimum length before touching any
//! field, and borrow variable length payloads from the input.

use crate::att::types::{
    AttDataList, DecodeError, ErrorResponse, FindByTypeRequest, HandleRange, HandleValue, Opcode,
    PrepareWrite, TypeRequest,
};
use crate::uuid::Uuid;

/// Any PDU a client can receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pdu<'a> {
    Error(ErrorResponse),
    MtuResp(u16),
    FindInfoResp { format: u8, list: AttDataList<'a> },
    FindByTypeResp(AttDataList<'a>),
    ReadByTypeResp(AttDataList<'a>),
    ReadResp(&'a [u8]),
    ReadBlobResp(&'a [u8]),
    ReadByGroupResp(AttDataList<'a>),
    WriteResp,
    PrepWriteResp(PrepareWrite<'a>),
    ExecWriteResp,
    Notification(HandleValue<'a>),
    Indication(HandleValue<'a>),
    /// Valid opcode the client has no use for, or an unassigned one
    Other(u8),
}

/// Decode an inbound PDU by its opcode
pub fn decode(pdu: &[u8]) -> Result<Pdu<'_>, DecodeError> {
    let op = *pdu.first().ok_or(DecodeError::Empty)?;
    let Some(opcode) = Opcode::from_byte(op) else {
        return Ok(Pdu::Other(op));
    };
    Ok(match opcode {
        Opcode::Error => Pdu::Error(decode_error_resp(pdu)?),
        Opcode::MtuResp => Pdu::MtuResp(decode_mtu_resp(pdu)?),
        Opcode::FindInfoResp => {
            let (format, list) = decode_find_info_resp(pdu)?;
            Pdu::FindInfoResp { format, list }
        }
        Opcode::FindByTypeResp => Pdu::FindByTypeResp(decode_find_by_type_resp(pdu)?),
        Opcode::ReadByTypeResp => Pdu::ReadByTypeResp(decode_read_by_type_resp(pdu)?),
        Opcode::ReadResp => Pdu::ReadResp(decode_read_resp(pdu)?),
        Opcode::ReadBlobResp => Pdu::ReadBlobResp(decode_read_blob_resp(pdu)?),
        Opcode::ReadByGroupResp => Pdu::ReadByGroupResp(decode_read_by_group_resp(pdu)?),
        Opcode::WriteResp => {
            decode_write_resp(pdu)?;
            Pdu::WriteResp
        }
        Opcode::PrepWriteResp => Pdu::PrepWriteResp(decode_prep_write_resp(pdu)?),
        Opcode::ExecWriteResp => {
            decode_exec_write_resp(pdu)?;
            Pdu::ExecWriteResp
        }
        Opcode::HandleNotify => Pdu::Notification(decode_notification(pdu)?),
        Opcode::HandleInd => Pdu::Indication(decode_indication(pdu)?),
        _ => Pdu::Other(op),
    })
}

fn check(pdu: &[u8], expected: Opcode, min_len: usize) -> Result<(), DecodeError> {
    let found = *pdu.first().ok_or(DecodeError::Empty)?;
    if found != expected as u8 {
        return Err(DecodeError::WrongOpcode { expected, found });
    }
    if pdu.len() < min_len {
        return Err(DecodeError::TooShort {
            needed: min_len,
            len: pdu.len(),
        });
    }
    Ok(())
}

#[inline]
fn get_u16(pdu: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([pdu[at], pdu[at + 1]])
}

fn range(pdu: &[u8]) -> HandleRange {
    HandleRange {
        start: get_u16(pdu, 1),
        end: get_u16(pdu, 3),
    }
}

/// `[opcode][stride][records...]`, zero stride is rejected
fn record_list(pdu: &[u8], op: Opcode) -> Result<AttDataList<'_>, DecodeError> {
    check(pdu, op, 2)?;
    let stride = pdu[1];
    if stride == 0 {
        return Err(DecodeError::InvalidStride(stride));
    }
    Ok(AttDataList::new(stride as usize, &pdu[2..]))
}

fn type_request(pdu: &[u8], op: Opcode) -> Result<TypeRequest, DecodeError> {
    check(pdu, op, 7)?;
    let uuid = match pdu.len() {
        7 => Uuid::from_wire(&pdu[5..7]),
        len if len >= 21 => Uuid::from_wire(&pdu[5..21]),
        len => return Err(DecodeError::TooShort { needed: 21, len }),
    };
    // Both slices have a valid UUID width
    let uuid = uuid.ok_or(DecodeError::TooShort {
        needed: 7,
        len: pdu.len(),
    })?;
    Ok(TypeRequest {
        range: range(pdu),
        uuid,
    })
}

fn handle_value(pdu: &[u8], op: Opcode) -> Result<HandleValue<'_>, DecodeError> {
    check(pdu, op, 3)?;
    Ok(HandleValue {
        handle: get_u16(pdu, 1),
        value: &pdu[3..],
    })
}

fn prepare_write(pdu: &[u8], op: Opcode) -> Result<PrepareWrite<'_>, DecodeError> {
    check(pdu, op, 5)?;
    Ok(PrepareWrite {
        handle: get_u16(pdu, 1),
        offset: get_u16(pdu, 3),
        value: &pdu[5..],
    })
}

pub fn decode_error_resp(pdu: &[u8]) -> Result<ErrorResponse, DecodeError> {
    check(pdu, Opcode::Error, 5)?;
    Ok(ErrorResponse {
        request: pdu[1],
        handle: get_u16(pdu, 2),
        code: pdu[4],
    })
}

pub fn decode_mtu_req(pdu: &[u8]) -> Result<u16, DecodeError> {
    check(pdu, Opcode::MtuReq, 3)?;
    Ok(get_u16(pdu, 1))
}

pub fn decode_mtu_resp(pdu: &[u8]) -> Result<u16, DecodeError> {
    check(pdu, Opcode::MtuResp, 3)?;
    Ok(get_u16(pdu, 1))
}

pub fn decode_find_info_req(pdu: &[u8]) -> Result<HandleRange, DecodeError> {
    check(pdu, Opcode::FindInfoReq, 5)?;
    Ok(range(pdu))
}

/// Find information response as `(format, handle/uuid records)`
pub fn decode_find_info_resp(pdu: &[u8]) -> Result<(u8, AttDataList<'_>), DecodeError> {
    check(pdu, Opcode::FindInfoResp, 2)?;
    let format = pdu[1];
    let stride = match format {
        1 => 4,
        2 => 18,
        _ => return Err(DecodeError::InvalidStride(format)),
    };
    Ok((format, AttDataList::new(stride, &pdu[2..])))
}

pub fn decode_find_by_type_req(pdu: &[u8]) -> Result<FindByTypeRequest<'_>, DecodeError> {
    check(pdu, Opcode::FindByTypeReq, 7)?;
    Ok(FindByTypeRequest {
        range: range(pdu),
        attr_type: get_u16(pdu, 5),
        value: &pdu[7..],
    })
}

/// Found/group-end handle pairs
pub fn decode_find_by_type_resp(pdu: &[u8]) -> Result<AttDataList<'_>, DecodeError> {
    check(pdu, Opcode::FindByTypeResp, 5)?;
    Ok(AttDataList::new(4, &pdu[1..]))
}

pub fn decode_read_by_type_req(pdu: &[u8]) -> Result<TypeRequest, DecodeError> {
    type_request(pdu, Opcode::ReadByTypeReq)
}

pub fn decode_read_by_type_resp(pdu: &[u8]) -> Result<AttDataList<'_>, DecodeError> {
    record_list(pdu, Opcode::ReadByTypeResp)
}

pub fn decode_read_by_group_req(pdu: &[u8]) -> Result<TypeRequest, DecodeError> {
    type_request(pdu, Opcode::ReadByGroupReq)
}

pub fn decode_read_by_group_resp(pdu: &[u8]) -> Result<AttDataList<'_>, DecodeError> {
    record_list(pdu, Opcode::ReadByGroupResp)
}

pub fn decode_read_req(pdu: &[u8]) -> Result<u16, DecodeError> {
    check(pdu, Opcode::ReadReq, 3)?;
    Ok(get_u16(pdu, 1))
}

pub fn decode_read_resp(pdu: &[u8]) -> Result<&[u8], DecodeError> {
    check(pdu, Opcode::ReadResp, 1)?;
    Ok(&pdu[1..])
}

/// Read blob request as `(handle, offset)`
pub fn decode_read_blob_req(pdu: &[u8]) -> Result<(u16, u16), DecodeError> {
    check(pdu, Opcode::ReadBlobReq, 5)?;
    Ok((get_u16(pdu, 1), get_u16(pdu, 3)))
}

pub fn decode_read_blob_resp(pdu: &[u8]) -> Result<&[u8], DecodeError> {
    check(pdu, Opcode::ReadBlobResp, 1)?;
    Ok(&pdu[1..])
}

pub fn decode_write_cmd(pdu: &[u8]) -> Result<HandleValue<'_>, DecodeError> {
    handle_value(pdu, Opcode::WriteCmd)
}

pub fn decode_write_req(pdu: &[u8]) -> Result<HandleValue<'_>, DecodeError> {
    handle_value(pdu, Opcode::WriteReq)
}

pub fn decode_write_resp(pdu: &[u8]) -> Result<(), DecodeError> {
    check(pdu, Opcode::WriteResp, 1)
}

pub fn decode_prep_write_req(pdu: &[u8]) -> Result<PrepareWrite<'_>, DecodeError> {
    prepare_write(pdu, Opcode::PrepWriteReq)
}

pub fn decode_prep_write_resp(pdu: &[u8]) -> Result<PrepareWrite<'_>, DecodeError> {
    prepare_write(pdu, Opcode::PrepWriteResp)
}

pub fn decode_exec_write_req(pdu: &[u8]) -> Result<u8, DecodeError> {
    check(pdu, Opcode::ExecWriteReq, 2)?;
    Ok(pdu[1])
}

pub fn decode_exec_write_resp(pdu: &[u8]) -> Result<(), DecodeError> {
    check(pdu, Opcode::ExecWriteResp, 1)
}

pub fn decode_notification(pdu: &[u8]) -> Result<HandleValue<'_>, DecodeError> {
    handle_value(pdu, Opcode::HandleNotify)
}

pub fn decode_indication(pdu: &[u8]) -> Result<HandleValue<'_>, DecodeError> {
    handle_value(pdu, Opcode::HandleInd)
}

pub fn decode_confirmation(pdu: &[u8]) -> Result<(), DecodeError> {
    check(pdu, Opcode::HandleCnf, 1)
}
