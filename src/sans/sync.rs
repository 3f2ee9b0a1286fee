//! Helpers for the synchronization schemes used by ID3v2 payloads and sizes.
//!
//! Both schemes exist to keep an MPEG frame sync (`0xFF` followed by a byte
//! with its top three bits set) from appearing inside tag data, where a
//! player unaware of the tag could mistake it for the start of audio.

use thiserror::Error;

/// Largest value representable by a 4-byte sync-safe integer.
pub const SYNC_SAFE_MAX: u32 = (1 << 28) - 1;

/// An error converting a sync-safe integer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    /// A byte of the integer had its reserved top bit set.
    #[error("Malformed sync-safe integer ({0:02x?}).")]
    MalformedInteger([u8; 4]),
    /// The value does not fit in 28 bits.
    #[error("Value {0} does not fit in a sync-safe integer.")]
    Overflow(u32),
}

/// Decode a 4-byte sync-safe integer.
///
/// Each byte contributes its low seven bits, most significant first.
pub fn decode_sync_safe_int(r: [u8; 4]) -> Result<u32, SyncError> {
    if r.iter().any(|b| b & 0x80 != 0) {
        Err(SyncError::MalformedInteger(r))?;
    }

    Ok(r.iter().fold(0, |acc, b| (acc << 7) | u32::from(*b)))
}

/// Encode a value of at most 28 bits as a 4-byte sync-safe integer.
pub fn encode_sync_safe_int(v: u32) -> Result<[u8; 4], SyncError> {
    if v > SYNC_SAFE_MAX {
        Err(SyncError::Overflow(v))?;
    }

    Ok([
        (v >> 21) as u8 & 0x7F,
        (v >> 14) as u8 & 0x7F,
        (v >> 7) as u8 & 0x7F,
        v as u8 & 0x7F,
    ])
}

/// Remove unsynchronization stuffing from a payload.
///
/// Every `0xFF 0x00` pair collapses to `0xFF`. A trailing `0xFF` passes
/// through unchanged. The input must be the complete payload as extracted
/// using the declared (stuffed) length.
pub fn decode_unsynchronized(r: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(r.len());
    let mut after_ff = false;

    for &b in r {
        if !(after_ff && b == 0x00) {
            out.push(b);
        }
        after_ff = b == 0xFF;
    }

    out
}

/// Apply unsynchronization stuffing to a payload.
///
/// A `0x00` is inserted after every `0xFF` that is followed by `0x00`, by a
/// byte of `0xE0` or above, or by the end of the buffer.
pub fn encode_unsynchronized(r: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(r.len() + r.len() / 8);

    for (i, &b) in r.iter().enumerate() {
        out.push(b);

        if b == 0xFF {
            match r.get(i + 1) {
                Some(&next) if next != 0x00 && next < 0xE0 => {}
                _ => out.push(0x00),
            }
        }
    }

    out
}
