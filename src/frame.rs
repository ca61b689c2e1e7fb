//! Framing around encoded configuration.
//!
//! - **Blob**: `[u32 little-endian version][payload]`. The version is checked before
//!   a single payload byte is looked at, so a wrong prefix always reports
//!   [`DeserializeError::WrongVersion`] no matter what follows.
//! - **Update message**: `[leaf index as varuint][value in that leaf's wire form]`.

use crate::codec::{self, CodecError};
use byteorder::{ByteOrder, LittleEndian};
use std::io::Cursor;

pub const VERSION_PREFIX_LEN: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("wrong version: expected {expected}, found {found}")]
    WrongVersion { expected: u32, found: u32 },
    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub fn write_version(out: &mut Vec<u8>, version: u32) {
    let mut buf = [0u8; VERSION_PREFIX_LEN];
    LittleEndian::write_u32(&mut buf, version);
    out.extend_from_slice(&buf);
}

/// Split a blob into its version and payload. Shorter than the prefix is a truncation.
pub fn split_version(bytes: &[u8]) -> Result<(u32, &[u8]), CodecError> {
    if bytes.len() < VERSION_PREFIX_LEN {
        return Err(CodecError::UnexpectedEof);
    }
    let (prefix, payload) = bytes.split_at(VERSION_PREFIX_LEN);
    Ok((LittleEndian::read_u32(prefix), payload))
}

/// Return the payload if the blob carries `expected`.
pub fn check_version(bytes: &[u8], expected: u32) -> Result<&[u8], DeserializeError> {
    let (found, payload) = split_version(bytes)?;
    if found != expected {
        return Err(DeserializeError::WrongVersion { expected, found });
    }
    Ok(payload)
}

/// Start an update message for leaf `index`; the caller appends the value.
pub fn begin_update(index: usize) -> Vec<u8> {
    let mut out = Vec::new();
    codec::write_varuint(&mut out, index as u128);
    out
}

/// Read the leaf index at the head of an update message.
pub fn read_update_index(r: &mut Cursor<&[u8]>) -> Result<u32, CodecError> {
    let raw = codec::read_varuint(r)?;
    u32::try_from(raw).map_err(|_| CodecError::Overflow("u32"))
}
