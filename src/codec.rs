//! Primitive wire codec shared by the device runtime, the client layout and every
//! generated artifact.
//!
//! There is no framing beyond concatenation: fields are written back to back in
//! traversal order and only strings and byte arrays carry a length.
//!
//! | Type | Encoding |
//! |------|----------|
//! | `u8`, `i8` | one raw byte (two's complement for `i8`) |
//! | `u16`..`u128` | unsigned LEB128 ("varuint") |
//! | `i16`..`i128` | ZigZag, then unsigned LEB128 ("varint") |
//! | `bool` | one byte, `0` or `1` |
//! | `f32` | 4 bytes IEEE-754 little-endian |
//! | string | varuint byte length + UTF-8 bytes |
//! | byte array | varuint length + raw bytes |

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::{self, Cursor};

/// Worst-case length prefix (a `u32` length as varuint).
pub const MAX_LENGTH_PREFIX_LEN: usize = 5;
/// Worst-case enum discriminant (a `u32` as varuint).
pub const MAX_DISCRIMINANT_LEN: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("invalid UTF-8 in string: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("invalid boolean byte {0}")]
    InvalidBoolean(u8),
    #[error("varint does not fit in {0}")]
    Overflow(&'static str),
    #[error("string of {len} bytes exceeds capacity {max}")]
    StringTooLong { len: usize, max: usize },
    #[error("invalid enum discriminant {0}")]
    InvalidDiscriminant(u32),
    #[error("unknown leaf index {0}")]
    UnknownIndex(u32),
    #[error("{0} trailing byte(s) after payload")]
    TrailingBytes(usize),
    #[error("IO: {0}")]
    Io(io::Error),
}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::UnexpectedEof
        } else {
            CodecError::Io(e)
        }
    }
}

/// A value with a canonical wire form.
pub trait Wire: Sized {
    fn encode(&self, out: &mut Vec<u8>);
    fn decode(r: &mut Cursor<&[u8]>) -> Result<Self, CodecError>;
}

pub fn write_u8(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}

pub fn read_u8(r: &mut Cursor<&[u8]>) -> Result<u8, CodecError> {
    Ok(r.read_u8()?)
}

pub fn write_varuint(out: &mut Vec<u8>, mut v: u128) {
    loop {
        let low7 = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(low7);
            return;
        }
        out.push(low7 | 0x80);
    }
}

pub fn read_varuint(r: &mut Cursor<&[u8]>) -> Result<u128, CodecError> {
    let mut result: u128 = 0;
    let mut shift = 0u32;
    loop {
        let b = r.read_u8()?;
        let chunk = (b & 0x7f) as u128;
        // 18 full groups cover 126 bits; the 19th may only carry the top two.
        if shift >= 128 || (shift == 126 && chunk > 0b11) {
            return Err(CodecError::Overflow("u128"));
        }
        result |= chunk << shift;
        if b & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Number of bytes `write_varuint` produces for `v`.
pub fn varuint_len(mut v: u128) -> usize {
    let mut n = 1;
    while v >= 0x80 {
        v >>= 7;
        n += 1;
    }
    n
}

pub fn zigzag(v: i128) -> u128 {
    ((v << 1) ^ (v >> 127)) as u128
}

pub fn unzigzag(v: u128) -> i128 {
    ((v >> 1) as i128) ^ -((v & 1) as i128)
}

pub fn write_varint(out: &mut Vec<u8>, v: i128) {
    write_varuint(out, zigzag(v));
}

pub fn read_varint(r: &mut Cursor<&[u8]>) -> Result<i128, CodecError> {
    Ok(unzigzag(read_varuint(r)?))
}

pub fn write_bool(out: &mut Vec<u8>, v: bool) {
    out.push(u8::from(v));
}

pub fn read_bool(r: &mut Cursor<&[u8]>) -> Result<bool, CodecError> {
    match r.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        b => Err(CodecError::InvalidBoolean(b)),
    }
}

pub fn write_f32(out: &mut Vec<u8>, v: f32) {
    let mut buf = [0u8; 4];
    LittleEndian::write_f32(&mut buf, v);
    out.extend_from_slice(&buf);
}

pub fn read_f32(r: &mut Cursor<&[u8]>) -> Result<f32, CodecError> {
    Ok(r.read_f32::<LittleEndian>()?)
}

pub fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_varuint(out, bytes.len() as u128);
    out.extend_from_slice(bytes);
}

/// Read a length-prefixed byte array, borrowing from the cursor's buffer.
pub fn read_bytes<'a>(r: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], CodecError> {
    let len = usize::try_from(read_varuint(r)?).map_err(|_| CodecError::Overflow("usize"))?;
    let data: &'a [u8] = *r.get_ref();
    let start = usize::try_from(r.position()).map_err(|_| CodecError::UnexpectedEof)?;
    let end = start
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .ok_or(CodecError::UnexpectedEof)?;
    r.set_position(end as u64);
    Ok(&data[start..end])
}

pub fn write_str(out: &mut Vec<u8>, s: &str) {
    write_bytes(out, s.as_bytes());
}

/// Read a length-prefixed UTF-8 string, borrowing from the cursor's buffer.
pub fn read_str<'a>(r: &mut Cursor<&'a [u8]>) -> Result<&'a str, CodecError> {
    Ok(std::str::from_utf8(read_bytes(r)?)?)
}

/// Fail if the cursor has not consumed its whole buffer.
pub fn finish(r: &Cursor<&[u8]>) -> Result<(), CodecError> {
    let len = r.get_ref().len();
    let pos = usize::try_from(r.position()).unwrap_or(usize::MAX);
    match len.saturating_sub(pos) {
        0 => Ok(()),
        n => Err(CodecError::TrailingBytes(n)),
    }
}

/// Decode exactly one `T` from `bytes`; leftovers are an error.
pub fn decode_exact<T: Wire>(bytes: &[u8]) -> Result<T, CodecError> {
    let mut r = Cursor::new(bytes);
    let v = T::decode(&mut r)?;
    finish(&r)?;
    Ok(v)
}

pub fn encode_to_vec<T: Wire>(v: &T) -> Vec<u8> {
    let mut out = Vec::new();
    v.encode(&mut out);
    out
}

impl Wire for u8 {
    fn encode(&self, out: &mut Vec<u8>) {
        write_u8(out, *self);
    }
    fn decode(r: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        read_u8(r)
    }
}

impl Wire for i8 {
    fn encode(&self, out: &mut Vec<u8>) {
        write_u8(out, *self as u8);
    }
    fn decode(r: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(r.read_i8()?)
    }
}

macro_rules! varuint_wire {
    ($($t:ty),*) => {$(
        impl Wire for $t {
            fn encode(&self, out: &mut Vec<u8>) {
                write_varuint(out, *self as u128);
            }
            fn decode(r: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
                <$t>::try_from(read_varuint(r)?).map_err(|_| CodecError::Overflow(stringify!($t)))
            }
        }
    )*};
}

macro_rules! varint_wire {
    ($($t:ty),*) => {$(
        impl Wire for $t {
            fn encode(&self, out: &mut Vec<u8>) {
                write_varint(out, *self as i128);
            }
            fn decode(r: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
                <$t>::try_from(read_varint(r)?).map_err(|_| CodecError::Overflow(stringify!($t)))
            }
        }
    )*};
}

varuint_wire!(u16, u32, u64, u128);
varint_wire!(i16, i32, i64, i128);

impl Wire for bool {
    fn encode(&self, out: &mut Vec<u8>) {
        write_bool(out, *self);
    }
    fn decode(r: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        read_bool(r)
    }
}

impl Wire for f32 {
    fn encode(&self, out: &mut Vec<u8>) {
        write_f32(out, *self);
    }
    fn decode(r: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        read_f32(r)
    }
}

impl Wire for String {
    fn encode(&self, out: &mut Vec<u8>) {
        write_str(out, self);
    }
    fn decode(r: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(read_str(r)?.to_owned())
    }
}

impl<const N: usize> Wire for heapless::String<N> {
    fn encode(&self, out: &mut Vec<u8>) {
        write_str(out, self.as_str());
    }
    fn decode(r: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let s = read_str(r)?;
        let mut out = heapless::String::new();
        out.push_str(s)
            .map_err(|_| CodecError::StringTooLong { len: s.len(), max: N })?;
        Ok(out)
    }
}

impl Wire for Vec<u8> {
    fn encode(&self, out: &mut Vec<u8>) {
        write_bytes(out, self);
    }
    fn decode(r: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(read_bytes(r)?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varuint_groups_low_bits_first() {
        let mut out = Vec::new();
        write_varuint(&mut out, 300);
        assert_eq!(out, [0xac, 0x02]);
        let mut r = Cursor::new(&out[..]);
        assert_eq!(read_varuint(&mut r).unwrap(), 300);
    }

    #[test]
    fn zigzag_maps_small_magnitudes_to_small_codes() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(-2), 3);
        assert_eq!(zigzag(i128::MIN), u128::MAX);
        for v in [0, 1, -1, 63, -64, i128::MAX, i128::MIN] {
            assert_eq!(unzigzag(zigzag(v)), v);
        }
    }

    #[test]
    fn worst_case_lengths_match_static_accounting() {
        assert_eq!(varuint_len(u16::MAX as u128), 3);
        assert_eq!(varuint_len(u32::MAX as u128), MAX_LENGTH_PREFIX_LEN);
        assert_eq!(varuint_len(u64::MAX as u128), 10);
        assert_eq!(varuint_len(u128::MAX), 19);
        assert_eq!(varuint_len(zigzag(i16::MIN as i128)), 3);
        assert_eq!(varuint_len(zigzag(i64::MIN as i128)), 10);
    }

    #[test]
    fn u128_max_round_trips_and_wider_overflows() {
        let bytes = encode_to_vec(&u128::MAX);
        assert_eq!(decode_exact::<u128>(&bytes).unwrap(), u128::MAX);
        let mut too_wide = vec![0xff; 18];
        too_wide.push(0x7f);
        assert!(matches!(decode_exact::<u128>(&too_wide), Err(CodecError::Overflow(_))));
    }

    #[test]
    fn narrow_target_rejects_wide_value() {
        let bytes = encode_to_vec(&70_000u32);
        assert!(matches!(decode_exact::<u16>(&bytes), Err(CodecError::Overflow("u16"))));
    }

    #[test]
    fn boolean_accepts_only_zero_and_one() {
        assert!(!decode_exact::<bool>(&[0]).unwrap());
        assert!(decode_exact::<bool>(&[1]).unwrap());
        assert!(matches!(decode_exact::<bool>(&[2]), Err(CodecError::InvalidBoolean(2))));
    }

    #[test]
    fn bounded_string_checks_capacity() {
        let bytes = encode_to_vec(&"hello".to_string());
        assert_eq!(decode_exact::<heapless::String<5>>(&bytes).unwrap().as_str(), "hello");
        assert!(matches!(
            decode_exact::<heapless::String<4>>(&bytes),
            Err(CodecError::StringTooLong { len: 5, max: 4 })
        ));
    }

    #[test]
    fn truncated_input_is_unexpected_eof() {
        assert!(matches!(decode_exact::<u32>(&[0x80]), Err(CodecError::UnexpectedEof)));
        assert!(matches!(decode_exact::<String>(&[3, b'a']), Err(CodecError::UnexpectedEof)));
        assert!(matches!(decode_exact::<f32>(&[0, 0]), Err(CodecError::UnexpectedEof)));
    }

    #[test]
    fn trailing_bytes_are_reported() {
        assert!(matches!(decode_exact::<u8>(&[1, 2, 3]), Err(CodecError::TrailingBytes(2))));
    }
}
