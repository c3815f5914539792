//! The packet framer (spec §4.2): assembles and disassembles the
//! `Header(1) | Command(i) | Payload(variable)` layout. HDLC framing, if
//! enabled, is applied outside this module by an external [`crate::transport::Framer`].

use crate::codec::{decode_varint, encode_varint};
use crate::error::{SpinelError, SpinelResult};

/// The two fixed high bits of every Spinel header byte.
const HEADER_FLAG_BITS: u8 = 0b10 << 6;

/// TID reserved for unsolicited/asynchronous frames (resets, stream pushes).
pub const TID_ASYNC: u8 = 0;

/// Default TID used by the host for ordinary requests.
pub const DEFAULT_HOST_TID: u8 = 1;

/// Builds a header byte from an Interface Identifier and Transaction
/// Identifier. Per spec §9 the IID is carried but never interpreted
/// elsewhere in this crate.
pub fn header_byte(iid: u8, tid: u8) -> u8 {
    HEADER_FLAG_BITS | ((iid & 0x3) << 4) | (tid & 0xF)
}

/// Extracts `(iid, tid)` from a header byte.
pub fn split_header(header: u8) -> (u8, u8) {
    ((header >> 4) & 0x3, header & 0xF)
}

/// Encodes a full Spinel packet: `header_byte(iid, tid) ++ encode_i(cmd_id) ++ payload`.
pub fn encode_packet(cmd_id: u32, payload: &[u8], tid: u8, iid: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 4 + payload.len());
    out.push(header_byte(iid, tid));
    out.extend_from_slice(&encode_varint(cmd_id));
    out.extend_from_slice(payload);
    out
}

/// Decodes a full Spinel packet into `(tid, cmd_id, payload)`. The IID is
/// parsed but discarded, matching the reference behavior (spec §9).
pub fn decode_packet(buf: &[u8]) -> SpinelResult<(u8, u32, Vec<u8>)> {
    let header = *buf.first().ok_or(SpinelError::Truncated { needed: 1, have: 0 })?;
    let (_iid, tid) = split_header(header);
    let (cmd_id, n) = decode_varint(&buf[1..])?;
    let payload = buf[1 + n..].to_vec();
    Ok((tid, cmd_id, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_prop_value_get_ncp_version() {
        // PROP_VALUE_GET(PROP_NCP_VERSION=2): cmd_id=2, payload=encode_i(2).
        let payload = encode_varint(2);
        let packet = encode_packet(2, &payload, DEFAULT_HOST_TID, 0);
        assert_eq!(packet, vec![0x81, 0x02, 0x02]);
    }

    #[test]
    fn decode_inbound_value_is_last_status() {
        let buf = [0x80, 0x06, 0x00, 0x00];
        let (tid, cmd, payload) = decode_packet(&buf).unwrap();
        assert_eq!(tid, 0);
        assert_eq!(cmd, 6);
        assert_eq!(payload, vec![0x00, 0x00]);
    }

    #[test]
    fn roundtrip_arbitrary_packet() {
        let payload = vec![9, 8, 7, 6, 5];
        let packet = encode_packet(42, &payload, 3, 1);
        let (tid, cmd, decoded_payload) = decode_packet(&packet).unwrap();
        assert_eq!(tid, 3);
        assert_eq!(cmd, 42);
        assert_eq!(decoded_payload, payload);
    }

    #[test]
    fn iid_is_parsed_but_ignored() {
        let header = header_byte(2, 5);
        let (iid, tid) = split_header(header);
        assert_eq!(iid, 2);
        assert_eq!(tid, 5);
    }

    #[test]
    fn truncated_empty_buffer() {
        assert!(decode_packet(&[]).is_err());
    }
}
