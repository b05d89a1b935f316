//! PDU encoders
//!
//! Every encoder writes into a caller supplied buffer whose length is the
//! capacity available for the PDU (normally the connection MTU). Variable
//! length payloads are truncated to fit, fixed headers never are. The return
//! value is the number of bytes written, or 0 if the fixed header itself
//! does not fit.

use crate::att::types::{AttDataList, HandleRange, Opcode};
use crate::uuid::Uuid;

#[inline]
fn put_u16(out: &mut [u8], at: usize, value: u16) {
    out[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

/// Write `[opcode][handle]` followed by as much of `value` as fits
fn handle_value(op: Opcode, handle: u16, value: &[u8], out: &mut [u8]) -> usize {
    const MIN_LEN: usize = 3;
    if out.len() < MIN_LEN {
        return 0;
    }
    let vlen = value.len().min(out.len() - MIN_LEN);
    out[0] = op as u8;
    put_u16(out, 1, handle);
    out[MIN_LEN..MIN_LEN + vlen].copy_from_slice(&value[..vlen]);
    MIN_LEN + vlen
}

/// Write `[opcode][value...]` truncated to fit
fn opcode_value(op: Opcode, value: &[u8], out: &mut [u8]) -> usize {
    if out.is_empty() {
        return 0;
    }
    let vlen = value.len().min(out.len() - 1);
    out[0] = op as u8;
    out[1..1 + vlen].copy_from_slice(&value[..vlen]);
    1 + vlen
}

/// Write `[opcode][start][end][uuid]`
fn range_type(op: Opcode, range: HandleRange, uuid: &Uuid, out: &mut [u8]) -> usize {
    let len = 5 + uuid.wire_len();
    if out.len() < len {
        return 0;
    }
    out[0] = op as u8;
    put_u16(out, 1, range.start);
    put_u16(out, 3, range.end);
    uuid.write_wire(&mut out[5..]);
    len
}

/// Write `[opcode][stride][records...]`, whole records only
fn record_list(op: Opcode, list: &AttDataList<'_>, out: &mut [u8]) -> usize {
    let stride = list.stride();
    if stride == 0 || stride > u8::MAX as usize || out.len() < stride + 2 {
        return 0;
    }
    out[0] = op as u8;
    out[1] = stride as u8;
    let mut written = 2;
    for record in list.iter() {
        if written + stride > out.len() {
            break;
        }
        out[written..written + stride].copy_from_slice(record);
        written += stride;
    }
    written
}

/// Error response: `[0x01][request opcode][handle][ecode]`
pub fn encode_error_resp(request: u8, handle: u16, code: u8, out: &mut [u8]) -> usize {
    if out.len() < 5 {
        return 0;
    }
    out[0] = Opcode::Error as u8;
    out[1] = request;
    put_u16(out, 2, handle);
    out[4] = code;
    5
}

fn mtu(op: Opcode, mtu: u16, out: &mut [u8]) -> usize {
    if out.len() < 3 {
        return 0;
    }
    out[0] = op as u8;
    put_u16(out, 1, mtu);
    3
}

pub fn encode_mtu_req(client_mtu: u16, out: &mut [u8]) -> usize {
    mtu(Opcode::MtuReq, client_mtu, out)
}

pub fn encode_mtu_resp(server_mtu: u16, out: &mut [u8]) -> usize {
    mtu(Opcode::MtuResp, server_mtu, out)
}

pub fn encode_find_info_req(range: HandleRange, out: &mut [u8]) -> usize {
    if out.len() < 5 {
        return 0;
    }
    out[0] = Opcode::FindInfoReq as u8;
    put_u16(out, 1, range.start);
    put_u16(out, 3, range.end);
    5
}

/// Find information response; `format` 1 carries 16-bit UUIDs, 2 carries 128-bit
pub fn encode_find_info_resp(format: u8, list: &AttDataList<'_>, out: &mut [u8]) -> usize {
    let written = record_list(Opcode::FindInfoResp, list, out);
    if written > 0 {
        out[1] = format;
    }
    written
}

/// Find by type value request, attribute type is always a 16-bit UUID
pub fn encode_find_by_type_req(
    range: HandleRange,
    attr_type: u16,
    value: &[u8],
    out: &mut [u8],
) -> usize {
    const MIN_LEN: usize = 7;
    if out.len() < MIN_LEN {
        return 0;
    }
    let vlen = value.len().min(out.len() - MIN_LEN);
    out[0] = Opcode::FindByTypeReq as u8;
    put_u16(out, 1, range.start);
    put_u16(out, 3, range.end);
    put_u16(out, 5, attr_type);
    out[MIN_LEN..MIN_LEN + vlen].copy_from_slice(&value[..vlen]);
    MIN_LEN + vlen
}

/// Find by type value response: list of found/group-end handle pairs
pub fn encode_find_by_type_resp(ranges: &[HandleRange], out: &mut [u8]) -> usize {
    if out.len() < 5 {
        return 0;
    }
    out[0] = Opcode::FindByTypeResp as u8;
    let mut written = 1;
    for range in ranges {
        if written + 4 > out.len() {
            break;
        }
        put_u16(out, written, range.start);
        put_u16(out, written + 2, range.end);
        written += 4;
    }
    written
}

pub fn encode_read_by_type_req(range: HandleRange, uuid: &Uuid, out: &mut [u8]) -> usize {
    range_type(Opcode::ReadByTypeReq, range, uuid, out)
}

/// Read by type response; records that do not fit the buffer are dropped
pub fn encode_read_by_type_resp(list: &AttDataList<'_>, out: &mut [u8]) -> usize {
    record_list(Opcode::ReadByTypeResp, list, out)
}

pub fn encode_read_by_group_req(range: HandleRange, uuid: &Uuid, out: &mut [u8]) -> usize {
    range_type(Opcode::ReadByGroupReq, range, uuid, out)
}

pub fn encode_read_by_group_resp(list: &AttDataList<'_>, out: &mut [u8]) -> usize {
    record_list(Opcode::ReadByGroupResp, list, out)
}

pub fn encode_read_req(handle: u16, out: &mut [u8]) -> usize {
    if out.len() < 3 {
        return 0;
    }
    out[0] = Opcode::ReadReq as u8;
    put_u16(out, 1, handle);
    3
}

/// Read response, values longer than the buffer are cut (the rest needs Read Blob)
pub fn encode_read_resp(value: &[u8], out: &mut [u8]) -> usize {
    opcode_value(Opcode::ReadResp, value, out)
}

pub fn encode_read_blob_req(handle: u16, offset: u16, out: &mut [u8]) -> usize {
    if out.len() < 5 {
        return 0;
    }
    out[0] = Opcode::ReadBlobReq as u8;
    put_u16(out, 1, handle);
    put_u16(out, 3, offset);
    5
}

/// Read blob response carrying `value` from `offset` on
pub fn encode_read_blob_resp(value: &[u8], offset: u16, out: &mut [u8]) -> usize {
    let tail = value.get(offset as usize..).unwrap_or(&[]);
    opcode_value(Opcode::ReadBlobResp, tail, out)
}

pub fn encode_write_cmd(handle: u16, value: &[u8], out: &mut [u8]) -> usize {
    handle_value(Opcode::WriteCmd, handle, value, out)
}

pub fn encode_write_req(handle: u16, value: &[u8], out: &mut [u8]) -> usize {
    handle_value(Opcode::WriteReq, handle, value, out)
}

pub fn encode_write_resp(out: &mut [u8]) -> usize {
    opcode_value(Opcode::WriteResp, &[], out)
}

fn prepare_write(op: Opcode, handle: u16, offset: u16, value: &[u8], out: &mut [u8]) -> usize {
    const MIN_LEN: usize = 5;
    if out.len() < MIN_LEN {
        return 0;
    }
    let vlen = value.len().min(out.len() - MIN_LEN);
    out[0] = op as u8;
    put_u16(out, 1, handle);
    put_u16(out, 3, offset);
    out[MIN_LEN..MIN_LEN + vlen].copy_from_slice(&value[..vlen]);
    MIN_LEN + vlen
}

pub fn encode_prep_write_req(handle: u16, offset: u16, value: &[u8], out: &mut [u8]) -> usize {
    prepare_write(Opcode::PrepWriteReq, handle, offset, value, out)
}

pub fn encode_prep_write_resp(handle: u16, offset: u16, value: &[u8], out: &mut [u8]) -> usize {
    prepare_write(Opcode::PrepWriteResp, handle, offset, value, out)
}

/// Execute write request; flags 0 cancels all prepared writes, 1 writes them
pub fn encode_exec_write_req(flags: u8, out: &mut [u8]) -> usize {
    if out.len() < 2 {
        return 0;
    }
    out[0] = Opcode::ExecWriteReq as u8;
    out[1] = flags;
    2
}

pub fn encode_exec_write_resp(out: &mut [u8]) -> usize {
    opcode_value(Opcode::ExecWriteResp, &[], out)
}

pub fn encode_notification(handle: u16, value: &[u8], out: &mut [u8]) -> usize {
    handle_value(Opcode::HandleNotify, handle, value, out)
}

pub fn encode_indication(handle: u16, value: &[u8], out: &mut [u8]) -> usize {
    handle_value(Opcode::HandleInd, handle, value, out)
}

pub fn encode_confirmation(out: &mut [u8]) -> usize {
    opcode_value(Opcode::HandleCnf, &[], out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_req() {
        let mut buf = [0u8; 23];
        assert_eq!(encode_read_req(0x0025, &mut buf), 3);
        assert_eq!(&buf[..3], &[0x0A, 0x25, 0x00]);
        assert_eq!(encode_read_req(0x0025, &mut buf[..2]), 0);
    }

    #[test]
    fn test_write_cmd_truncates_value() {
        let value = [0xAAu8; 30];
        let mut buf = [0u8; 23];
        assert_eq!(encode_write_cmd(0x0027, &value, &mut buf), 23);
        assert_eq!(&buf[..3], &[0x52, 0x27, 0x00]);
        assert!(buf[3..].iter().all(|&b| b == 0xAA));

        // Header only
        assert_eq!(encode_write_cmd(0x0027, &value, &mut buf[..3]), 3);
        assert_eq!(encode_write_cmd(0x0027, &value, &mut buf[..2]), 0);
    }

    #[test]
    fn test_read_by_type_req_uuid_widths() {
        let mut buf = [0u8; 32];
        let range = HandleRange { start: 0x0001, end: 0xFFFF };
        let n = encode_read_by_type_req(range, &Uuid::from_u16(0x2803), &mut buf);
        assert_eq!(n, 7);
        assert_eq!(&buf[..7], &[0x08, 0x01, 0x00, 0xFF, 0xFF, 0x03, 0x28]);

        let long = Uuid::from_u128(0xCCA30001_78C6_4785_9E45_0887D451317C);
        assert_eq!(encode_read_by_type_req(range, &long, &mut buf), 21);
        assert_eq!(encode_read_by_type_req(range, &long, &mut buf[..20]), 0);
    }

    #[test]
    fn test_error_resp() {
        let mut buf = [0u8; 8];
        assert_eq!(encode_error_resp(0x0A, 0x0025, 0x0A, &mut buf), 5);
        assert_eq!(&buf[..5], &[0x01, 0x0A, 0x25, 0x00, 0x0A]);
        assert_eq!(encode_error_resp(0x0A, 0x0025, 0x0A, &mut buf[..4]), 0);
    }

    #[test]
    fn test_read_by_type_resp_drops_records_that_do_not_fit() {
        let records = [0u8; 21];
        let list = AttDataList::new(7, &records);
        let mut buf = [0u8; 20];
        // 2 header bytes + two records of 7
        assert_eq!(encode_read_by_type_resp(&list, &mut buf), 16);
        assert_eq!(buf[1], 7);
        assert_eq!(encode_read_by_type_resp(&list, &mut buf[..8]), 0);
    }

    #[test]
    fn test_read_blob_resp_offset() {
        let mut buf = [0u8; 8];
        assert_eq!(encode_read_blob_resp(b"hello", 2, &mut buf), 4);
        assert_eq!(&buf[..4], &[0x0D, b'l', b'l', b'o']);
        assert_eq!(encode_read_blob_resp(b"hello", 9, &mut buf), 1);
    }

    #[test]
    fn test_fixed_pdus() {
        let mut buf = [0u8; 4];
        assert_eq!(encode_write_resp(&mut buf), 1);
        assert_eq!(buf[0], 0x13);
        assert_eq!(encode_confirmation(&mut buf), 1);
        assert_eq!(buf[0], 0x1E);
        assert_eq!(encode_exec_write_req(1, &mut buf), 2);
        assert_eq!(&buf[..2], &[0x18, 0x01]);
        assert_eq!(encode_mtu_req(185, &mut buf), 3);
        assert_eq!(&buf[..3], &[0x02, 185, 0]);
        assert_eq!(encode_confirmation(&mut []), 0);
    }
}
