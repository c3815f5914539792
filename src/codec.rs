//! The Spinel `TypeCodec` (spec §4.1): pure functions that measure,
//! decode, and encode values against a parsed [`Format`].

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::{SpinelError, SpinelResult};
use crate::format::{Format, FormatElem};
use crate::value::Value;

/// Decodes a base-128 little-endian varint (`i`) from the head of `buf`.
///
/// Returns the decoded value and the number of bytes consumed. Caps at
/// 4 bytes per the reference implementation (spec §9): a 4th byte with
/// its continuation bit set is malformed, not merely large.
pub fn decode_varint(buf: &[u8]) -> SpinelResult<(u32, usize)> {
    let mut value: u32 = 0;
    for i in 0..4 {
        let byte = *buf.get(i).ok_or(SpinelError::Truncated {
            needed: i + 1,
            have: buf.len(),
        })?;
        value |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        if i == 3 {
            return Err(SpinelError::Malformed("varint exceeds 4-byte cap"));
        }
    }
    unreachable!("loop either returns or errors on the 4th iteration")
}

/// Encodes `value` as a base-128 little-endian varint (`i`). The result
/// never has a trailing all-zero continuation byte.
pub fn encode_varint(value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(4);
    let mut v = value;
    loop {
        let mut byte = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if v == 0 {
            break;
        }
    }
    out
}

/// Returns the number of bytes `elem` will consume from the head of
/// `buf`, without decoding it.
pub fn measure_elem(buf: &[u8], elem: &FormatElem) -> SpinelResult<usize> {
    let need = |n: usize| -> SpinelResult<usize> {
        if buf.len() < n {
            Err(SpinelError::Truncated {
                needed: n,
                have: buf.len(),
            })
        } else {
            Ok(n)
        }
    };
    match elem {
        FormatElem::Bool | FormatElem::U8 | FormatElem::I8 => need(1),
        FormatElem::U16 | FormatElem::I16 => need(2),
        FormatElem::U32 | FormatElem::I32 => need(4),
        FormatElem::U64 => need(8),
        FormatElem::Ipv6 => need(16),
        FormatElem::Eui64 => need(8),
        FormatElem::Eui48 => need(6),
        FormatElem::Varint => decode_varint(buf).map(|(_, n)| n),
        FormatElem::Utf8 => buf
            .iter()
            .position(|&b| b == 0)
            .map(|p| p + 1)
            .ok_or(SpinelError::Malformed("unterminated 'U' string")),
        FormatElem::Data => {
            need(2)?;
            let len = u16::from_le_bytes([buf[0], buf[1]]) as usize;
            need(2 + len)
        }
        FormatElem::Struct(_) => {
            need(2)?;
            let len = u16::from_le_bytes([buf[0], buf[1]]) as usize;
            need(2 + len)
        }
        FormatElem::Remainder | FormatElem::Array(_) => Ok(buf.len()),
    }
}

/// Returns the total number of bytes `seq` will consume from the head of
/// `buf`.
pub fn measure_seq(buf: &[u8], seq: &[FormatElem]) -> SpinelResult<usize> {
    let mut offset = 0usize;
    for elem in seq {
        let n = measure_elem(&buf[offset..], elem)?;
        offset += n;
    }
    Ok(offset)
}

/// Decodes one atomic (non-`t`/`A`) element from the head of `buf`.
/// Returns the decoded value and the number of bytes consumed.
fn decode_atom(buf: &[u8], elem: &FormatElem) -> SpinelResult<(Value, usize)> {
    match elem {
        FormatElem::Bool => {
            let n = measure_elem(buf, elem)?;
            match buf[0] {
                0x00 => Ok((Value::Bool(false), n)),
                0x01 => Ok((Value::Bool(true), n)),
                _ => Err(SpinelError::Malformed("boolean byte was neither 0x00 nor 0x01")),
            }
        }
        FormatElem::U8 => Ok((Value::U8(buf[0]), measure_elem(buf, elem)?)),
        FormatElem::I8 => Ok((Value::I8(buf[0] as i8), measure_elem(buf, elem)?)),
        FormatElem::U16 => {
            let n = measure_elem(buf, elem)?;
            Ok((Value::U16(u16::from_le_bytes([buf[0], buf[1]])), n))
        }
        FormatElem::I16 => {
            let n = measure_elem(buf, elem)?;
            Ok((Value::I16(i16::from_le_bytes([buf[0], buf[1]])), n))
        }
        FormatElem::U32 => {
            let n = measure_elem(buf, elem)?;
            Ok((Value::U32(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])), n))
        }
        FormatElem::I32 => {
            let n = measure_elem(buf, elem)?;
            Ok((Value::I32(i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])), n))
        }
        FormatElem::U64 => {
            let n = measure_elem(buf, elem)?;
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[..8]);
            Ok((Value::U64(u64::from_le_bytes(b)), n))
        }
        FormatElem::Varint => {
            let (v, n) = decode_varint(buf)?;
            Ok((Value::UInt(v), n))
        }
        FormatElem::Ipv6 => {
            let n = measure_elem(buf, elem)?;
            let mut b = [0u8; 16];
            b.copy_from_slice(&buf[..16]);
            Ok((Value::Ipv6(b), n))
        }
        FormatElem::Eui64 => {
            let n = measure_elem(buf, elem)?;
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[..8]);
            Ok((Value::Eui64(b), n))
        }
        FormatElem::Eui48 => {
            let n = measure_elem(buf, elem)?;
            let mut b = [0u8; 6];
            b.copy_from_slice(&buf[..6]);
            Ok((Value::Eui48(b), n))
        }
        FormatElem::Utf8 => {
            let n = measure_elem(buf, elem)?;
            let s = String::from_utf8(buf[..n - 1].to_vec())
                .map_err(|_| SpinelError::Malformed("'U' string was not valid UTF-8"))?;
            Ok((Value::Utf8(s), n))
        }
        FormatElem::Data => {
            let n = measure_elem(buf, elem)?;
            Ok((Value::Bytes(buf[2..n].to_vec()), n))
        }
        FormatElem::Remainder => Ok((Value::Bytes(buf.to_vec()), buf.len())),
        FormatElem::Struct(_) | FormatElem::Array(_) => {
            unreachable!("composite elements are handled by decode_seq")
        }
    }
}

/// Walks `seq` over `buf`, decoding each element in turn and advancing
/// past it, per spec §4.1.
pub fn decode_seq(buf: &[u8], seq: &[FormatElem]) -> SpinelResult<Vec<Value>> {
    let mut offset = 0usize;
    let mut out = Vec::with_capacity(seq.len());
    for elem in seq {
        match elem {
            FormatElem::Struct(inner) => {
                if buf.len() < offset + 2 {
                    return Err(SpinelError::Truncated {
                        needed: offset + 2,
                        have: buf.len(),
                    });
                }
                let len = u16::from_le_bytes([buf[offset], buf[offset + 1]]) as usize;
                let start = offset + 2;
                let end = start + len;
                if buf.len() < end {
                    return Err(SpinelError::Truncated {
                        needed: end,
                        have: buf.len(),
                    });
                }
                let fields = decode_seq(&buf[start..end], inner)?;
                out.push(Value::Struct(fields));
                offset = end;
            }
            FormatElem::Array(inner) => {
                let mut records = Vec::new();
                let mut rest = &buf[offset..];
                while !rest.is_empty() {
                    let n = measure_seq(rest, inner)?;
                    records.push(decode_seq(&rest[..n], inner)?);
                    rest = &rest[n..];
                }
                out.push(Value::Array(records));
                offset = buf.len();
            }
            other => {
                let (value, n) = decode_atom(&buf[offset..], other)?;
                out.push(value);
                offset += n;
            }
        }
    }
    Ok(out)
}

/// Encodes one atomic value against its matching format element.
fn encode_atom(elem: &FormatElem, value: &Value, out: &mut Vec<u8>) -> SpinelResult<()> {
    match (elem, value) {
        (FormatElem::Bool, Value::Bool(b)) => out.push(if *b { 0x01 } else { 0x00 }),
        (FormatElem::U8, Value::U8(v)) => out.push(*v),
        (FormatElem::I8, Value::I8(v)) => out.push(*v as u8),
        (FormatElem::U16, Value::U16(v)) => out.write_u16::<LittleEndian>(*v).expect("Vec write never fails"),
        (FormatElem::I16, Value::I16(v)) => out.write_i16::<LittleEndian>(*v).expect("Vec write never fails"),
        (FormatElem::U32, Value::U32(v)) => out.write_u32::<LittleEndian>(*v).expect("Vec write never fails"),
        (FormatElem::I32, Value::I32(v)) => out.write_i32::<LittleEndian>(*v).expect("Vec write never fails"),
        (FormatElem::U64, Value::U64(v)) => out.write_u64::<LittleEndian>(*v).expect("Vec write never fails"),
        (FormatElem::Varint, Value::UInt(v)) => out.extend_from_slice(&encode_varint(*v)),
        (FormatElem::Ipv6, Value::Ipv6(v)) => out.extend_from_slice(v),
        (FormatElem::Eui64, Value::Eui64(v)) => out.extend_from_slice(v),
        (FormatElem::Eui48, Value::Eui48(v)) => out.extend_from_slice(v),
        (FormatElem::Utf8, Value::Utf8(s)) => {
            out.extend_from_slice(s.as_bytes());
            out.push(0);
        }
        (FormatElem::Data, Value::Bytes(b)) => {
            out.write_u16::<LittleEndian>(b.len() as u16).expect("Vec write never fails");
            out.extend_from_slice(b);
        }
        (FormatElem::Remainder, Value::Bytes(b)) => out.extend_from_slice(b),
        _ => return Err(SpinelError::Malformed("value does not match its format element")),
    }
    Ok(())
}

/// Encodes `values` against `seq`, the dual of [`decode_seq`].
pub fn encode_seq(seq: &[FormatElem], values: &[Value]) -> SpinelResult<Vec<u8>> {
    if seq.len() != values.len() {
        return Err(SpinelError::Malformed("value count does not match format element count"));
    }
    let mut out = Vec::new();
    for (elem, value) in seq.iter().zip(values) {
        match (elem, value) {
            (FormatElem::Struct(inner), Value::Struct(fields)) => {
                let body = encode_seq(inner, fields)?;
                out.write_u16::<LittleEndian>(body.len() as u16).expect("Vec write never fails");
                out.extend_from_slice(&body);
            }
            (FormatElem::Array(inner), Value::Array(records)) => {
                for record in records {
                    out.extend_from_slice(&encode_seq(inner, record)?);
                }
            }
            (other_elem, other_value) => encode_atom(other_elem, other_value, &mut out)?,
        }
    }
    Ok(out)
}

/// Convenience wrapper: parse `fmt`, then decode `buf` against it.
pub fn decode_fields(buf: &[u8], fmt: &Format) -> SpinelResult<Vec<Value>> {
    decode_seq(buf, fmt)
}

/// Convenience wrapper: parse `fmt`, then encode `values` against it.
pub fn encode_fields(fmt: &Format, values: &[Value]) -> SpinelResult<Vec<u8>> {
    encode_seq(fmt, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatDescriptor;

    fn fmt(s: &str) -> Format {
        FormatDescriptor::parse(s).unwrap().elems().to_vec()
    }

    #[test]
    fn varint_roundtrip_128() {
        let enc = encode_varint(128);
        assert_eq!(enc, vec![0x80, 0x01]);
        assert_eq!(decode_varint(&enc).unwrap(), (128, 2));
    }

    #[test]
    fn varint_no_trailing_zero_continuation() {
        for n in [0u32, 1, 127, 128, 16384, (1 << 28) - 1] {
            let enc = encode_varint(n);
            assert_eq!(enc.last().copied().unwrap() & 0x80, 0);
            assert_eq!(decode_varint(&enc).unwrap(), (n, enc.len()));
        }
    }

    #[test]
    fn varint_four_byte_cap_rejects_continuation() {
        let buf = [0x80, 0x80, 0x80, 0x80];
        assert!(decode_varint(&buf).is_err());
    }

    #[test]
    fn varint_max_length_high_bit_clear_ok() {
        let buf = [0x80, 0x80, 0x80, 0x7f];
        let (v, n) = decode_varint(&buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(v, 0x7f << 21);
    }

    #[test]
    fn d_roundtrip_empty_payload() {
        let f = fmt("d");
        let enc = encode_seq(&f, &[Value::Bytes(vec![])]).unwrap();
        assert_eq!(enc, vec![0x00, 0x00]);
        assert_eq!(decode_seq(&enc, &f).unwrap(), vec![Value::Bytes(vec![])]);
    }

    #[test]
    fn d_truncated_when_declared_length_exceeds_payload() {
        let buf = [0x05, 0x00, 0x01, 0x02];
        assert!(matches!(decode_seq(&buf, &fmt("d")), Err(SpinelError::Truncated { .. })));
    }

    #[test]
    fn nested_struct_three_levels() {
        let f = fmt("t(t(t(C)))");
        let values = vec![Value::Struct(vec![Value::Struct(vec![Value::Struct(vec![Value::U8(42)])])])];
        let enc = encode_seq(&f, &values).unwrap();
        assert_eq!(decode_seq(&enc, &f).unwrap(), values);
    }

    #[test]
    fn array_of_struct_two_entries() {
        let f = fmt("A(t(EC))");
        let e1 = [0u8, 1, 2, 3, 4, 5, 6, 7];
        let e2 = [0x10u8, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17];
        let values = vec![Value::Array(vec![
            vec![Value::Struct(vec![Value::Eui64(e1), Value::U8(0x11)])],
            vec![Value::Struct(vec![Value::Eui64(e2), Value::U8(0x22)])],
        ])];
        let enc = encode_seq(&f, &values).unwrap();
        let mut expected = vec![0x09, 0x00];
        expected.extend_from_slice(&e1);
        expected.push(0x11);
        expected.extend_from_slice(&[0x09, 0x00]);
        expected.extend_from_slice(&e2);
        expected.push(0x22);
        assert_eq!(enc, expected);
        assert_eq!(decode_seq(&enc, &f).unwrap(), values);
    }

    #[test]
    fn array_of_struct_zero_length() {
        let f = fmt("A(t(EC))");
        assert_eq!(decode_seq(&[], &f).unwrap(), vec![Value::Array(vec![])]);
    }

    #[test]
    fn string_with_embedded_terminator_measures_to_first_nul() {
        let buf = [b'h', b'i', 0x00, b'X'];
        let n = measure_elem(&buf, &FormatElem::Utf8).unwrap();
        assert_eq!(n, 3);
        let (v, n2) = decode_atom(&buf, &FormatElem::Utf8).unwrap();
        assert_eq!(n2, 3);
        assert_eq!(v, Value::Utf8("hi".to_string()));
    }

    #[test]
    fn bad_boolean_byte_is_malformed() {
        assert!(matches!(decode_seq(&[0x02], &fmt("b")), Err(SpinelError::Malformed(_))));
    }
}
