//! Binary encoding of values and generator state.
//!
//! Every value starts with a tag byte equal to its [`Type`] id, followed by
//! a fixed-width big-endian payload for numbers and booleans or a `u32`
//! length and UTF-8 bytes for strings and error messages. Readers never
//! panic on short input: every read checks the remaining length first.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::GeneratorError;
use crate::value::{Type, Val};

type Result<T> = std::result::Result<T, GeneratorError>;

fn ensure<B: Buf>(buf: &B, len: usize) -> Result<()> {
    if buf.remaining() < len {
        return Err(GeneratorError::UnexpectedEof);
    }
    Ok(())
}

pub fn write_val(buf: &mut BytesMut, val: &Val) {
    buf.put_u8(val.type_of().id());
    match val {
        Val::Null => {}
        Val::Boolean(b) => buf.put_u8(u8::from(*b)),
        Val::Double(d) => buf.put_f64(*d),
        Val::Integer(n) => buf.put_i32(*n),
        Val::Long(n) | Val::Date(n) => buf.put_i64(*n),
        Val::String(s) | Val::Err(s) => write_str(buf, s),
    }
}

pub fn read_val<B: Buf>(buf: &mut B) -> Result<Val> {
    let tag = read_u8(buf)?;
    let ty = Type::from_id(tag).ok_or(GeneratorError::UnknownTypeTag(tag))?;
    let val = match ty {
        Type::Null => Val::Null,
        Type::Boolean => Val::Boolean(read_u8(buf)? != 0),
        Type::Double => Val::Double(read_f64(buf)?),
        Type::Integer => {
            ensure(buf, 4)?;
            Val::Integer(buf.get_i32())
        }
        Type::Long => Val::Long(read_i64(buf)?),
        Type::Date => Val::Date(read_i64(buf)?),
        Type::String => Val::String(read_str(buf)?),
        Type::Err => Val::Err(read_str(buf)?),
    };
    Ok(val)
}

/// A presence byte followed by the value when present.
pub fn write_optional_val(buf: &mut BytesMut, val: Option<&Val>) {
    match val {
        None => buf.put_u8(0),
        Some(v) => {
            buf.put_u8(1);
            write_val(buf, v);
        }
    }
}

pub fn read_optional_val<B: Buf>(buf: &mut B) -> Result<Option<Val>> {
    match read_u8(buf)? {
        0 => Ok(None),
        _ => read_val(buf).map(Some),
    }
}

/// Encode a single value into a standalone buffer.
pub fn val_to_bytes(val: &Val) -> Bytes {
    let mut buf = BytesMut::new();
    write_val(&mut buf, val);
    buf.freeze()
}

pub fn val_from_bytes(mut bytes: &[u8]) -> Result<Val> {
    read_val(&mut bytes)
}

pub(crate) fn write_str(buf: &mut BytesMut, s: &str) {
    write_bytes(buf, s.as_bytes());
}

pub(crate) fn read_str<B: Buf>(buf: &mut B) -> Result<String> {
    String::from_utf8(read_bytes(buf)?).map_err(|_| GeneratorError::InvalidUtf8)
}

pub(crate) fn write_optional_str(buf: &mut BytesMut, s: Option<&str>) {
    match s {
        None => buf.put_u8(0),
        Some(s) => {
            buf.put_u8(1);
            write_str(buf, s);
        }
    }
}

pub(crate) fn read_optional_str<B: Buf>(buf: &mut B) -> Result<Option<String>> {
    match read_u8(buf)? {
        0 => Ok(None),
        _ => read_str(buf).map(Some),
    }
}

pub(crate) fn write_bytes(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

pub(crate) fn read_bytes<B: Buf>(buf: &mut B) -> Result<Vec<u8>> {
    let len = read_u32(buf)? as usize;
    ensure(buf, len)?;
    let mut bytes = vec![0; len];
    buf.copy_to_slice(&mut bytes);
    Ok(bytes)
}

pub(crate) fn read_u8<B: Buf>(buf: &mut B) -> Result<u8> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

pub(crate) fn read_u32<B: Buf>(buf: &mut B) -> Result<u32> {
    ensure(buf, 4)?;
    Ok(buf.get_u32())
}

pub(crate) fn read_u64<B: Buf>(buf: &mut B) -> Result<u64> {
    ensure(buf, 8)?;
    Ok(buf.get_u64())
}

pub(crate) fn read_i64<B: Buf>(buf: &mut B) -> Result<i64> {
    ensure(buf, 8)?;
    Ok(buf.get_i64())
}

pub(crate) fn read_f64<B: Buf>(buf: &mut B) -> Result<f64> {
    ensure(buf, 8)?;
    Ok(buf.get_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(val_to_bytes(&Val::Integer(1)).as_ref(), &[4, 0, 0, 0, 1]);
        assert_eq!(val_to_bytes(&Val::string("ab")).as_ref(), &[7, 0, 0, 0, 2, b'a', b'b']);
        assert_eq!(val_to_bytes(&Val::Null).as_ref(), &[0]);
    }

    #[test]
    fn test_reserved_tags_rejected() {
        assert_eq!(val_from_bytes(&[2]), Err(GeneratorError::UnknownTypeTag(2)));
        assert_eq!(val_from_bytes(&[9]), Err(GeneratorError::UnknownTypeTag(9)));
    }

    #[test]
    fn test_truncated_input() {
        assert_eq!(val_from_bytes(&[5, 0, 0]), Err(GeneratorError::UnexpectedEof));
        assert_eq!(val_from_bytes(&[7, 0, 0, 0, 9, b'a']), Err(GeneratorError::UnexpectedEof));
        assert_eq!(val_from_bytes(&[]), Err(GeneratorError::UnexpectedEof));
    }
}
