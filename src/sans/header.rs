//! Parsing of the header shared by the ID3v2 family of tags.
//!
//! Every revision of ID3v2 begins with the same ten bytes:
//!
//! | Offset | Length | Content                                |
//! |--------|--------|----------------------------------------|
//! | 0      | 3      | `ID3`                                  |
//! | 3      | 1      | Major version                          |
//! | 4      | 1      | Revision                               |
//! | 5      | 1      | Flags, with version-dependent meanings |
//! | 6      | 4      | Sync-safe payload length               |
//!
//! [`validate_base_header`] accepts any major version. Callers for a
//! concrete version use [`validate_header`], which also decodes the flags
//! according to that version.

use tartan_bitfield::bitfield;
use zerocopy::FromBytes;

use super::sync::decode_sync_safe_int;

/// Marker at the start of every ID3v2 header.
pub const MAGIC: [u8; 3] = *b"ID3";

/// Length of the ID3v2 header, and of the ID3v2.4 footer.
pub const HEADER_LENGTH: usize = 10;

#[repr(C, packed)]
#[derive(FromBytes)]
struct RawHeader {
    magic: [u8; 3],
    major_version: u8,
    revision: u8,
    flags: u8,
    size: [u8; 4],
}

/// The version-independent content of an ID3v2 header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BaseHeader {
    pub major_version: u8,
    pub revision: u8,
    pub flags: u8,
    /// Number of payload bytes following the header, before any
    /// unsynchronization is removed.
    pub payload_length: u32,
}

/// Parse the shared ID3v2 header, regardless of major version.
///
/// Returns `None` if the magic marker is absent, or if the size is not a
/// valid sync-safe integer.
pub fn validate_base_header(r: &[u8]) -> Option<BaseHeader> {
    let r: [u8; HEADER_LENGTH] = r.get(..HEADER_LENGTH)?.try_into().ok()?;

    let RawHeader {
        magic,
        major_version,
        revision,
        flags,
        size,
    } = zerocopy::transmute!(r);

    if magic != MAGIC {
        return None;
    }

    let payload_length = match decode_sync_safe_int(size) {
        Ok(length) => length,
        Err(err) => {
            tracing::trace!(%err, "rejecting ID3v2 header");
            return None;
        }
    };

    Some(BaseHeader {
        major_version,
        revision,
        flags,
        payload_length,
    })
}

/// Header flags, named across all ID3v2 revisions.
///
/// A flag not defined by the revision in use is always `false`; any bit
/// set beyond those the revision defines is reported by `unknown`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags {
    pub unsynchronization: bool,
    /// ID3v2.2 only.
    pub compression: bool,
    /// ID3v2.3 and later.
    pub extended_header: bool,
    /// ID3v2.3 and later.
    pub experimental: bool,
    /// ID3v2.4 only.
    pub footer: bool,
    pub unknown: bool,
}

bitfield! {
    struct FlagsV22(u8) {
        [7] unsynchronization,
        [6] compression,
    }
}

bitfield! {
    struct FlagsV23(u8) {
        [7] unsynchronization,
        [6] extended_header,
        [5] experimental,
    }
}

bitfield! {
    struct FlagsV24(u8) {
        [7] unsynchronization,
        [6] extended_header,
        [5] experimental,
        [4] footer,
    }
}

impl Flags {
    /// Decode a flag byte according to a major version.
    ///
    /// Returns `None` for major versions this crate does not know.
    pub fn decode(major_version: u8, r: u8) -> Option<Self> {
        let flags = match major_version {
            2 => {
                let f = FlagsV22(r);
                Self {
                    unsynchronization: f.unsynchronization(),
                    compression: f.compression(),
                    unknown: r & 0b0011_1111 != 0,
                    ..Self::default()
                }
            }
            3 => {
                let f = FlagsV23(r);
                Self {
                    unsynchronization: f.unsynchronization(),
                    extended_header: f.extended_header(),
                    experimental: f.experimental(),
                    unknown: r & 0b0001_1111 != 0,
                    ..Self::default()
                }
            }
            4 => {
                let f = FlagsV24(r);
                Self {
                    unsynchronization: f.unsynchronization(),
                    extended_header: f.extended_header(),
                    experimental: f.experimental(),
                    footer: f.footer(),
                    unknown: r & 0b0000_1111 != 0,
                    ..Self::default()
                }
            }
            _ => return None,
        };

        Some(flags)
    }
}

/// Parse an ID3v2 header of a specific major version.
///
/// Returns `None` unless the base header is valid and its major version is
/// `major_version`.
pub fn validate_header(r: &[u8], major_version: u8) -> Option<(BaseHeader, Flags)> {
    let header = validate_base_header(r)?;

    if header.major_version != major_version {
        return None;
    }

    let flags = Flags::decode(major_version, header.flags)?;

    Some((header, flags))
}

#[cfg(test)]
mod tests {
    use super::*;

    const V22: [u8; 10] = [b'I', b'D', b'3', 0x02, 0x00, 0x00, 0x00, 0x00, 0x02, 0x01];

    #[test]
    fn base_header_parses_any_version() {
        for major in [2, 3, 4, 9] {
            let mut r = V22;
            r[3] = major;
            let header = validate_base_header(&r).unwrap();
            assert_eq!(header.major_version, major);
            assert_eq!(header.payload_length, 257);
        }
    }

    #[test]
    fn base_header_rejects_wrong_magic() {
        let mut r = V22;
        r[0] = b'X';
        assert_eq!(validate_base_header(&r), None);
    }

    #[test]
    fn base_header_rejects_malformed_size() {
        let mut r = V22;
        r[8] = 0x82;
        assert_eq!(validate_base_header(&r), None);
    }

    #[test]
    fn base_header_rejects_short_input() {
        assert_eq!(validate_base_header(&V22[..9]), None);
    }

    #[test]
    fn versioned_header_is_exclusive() {
        assert!(validate_header(&V22, 2).is_some());
        assert!(validate_header(&V22, 3).is_none());
        assert!(validate_header(&V22, 4).is_none());
    }

    #[test]
    fn flags_by_version() {
        let v22 = Flags::decode(2, 0b1100_0000).unwrap();
        assert!(v22.unsynchronization && v22.compression && !v22.unknown);

        let v22 = Flags::decode(2, 0b0010_0000).unwrap();
        assert!(v22.unknown && !v22.extended_header);

        let v23 = Flags::decode(3, 0b0110_0000).unwrap();
        assert!(v23.extended_header && v23.experimental && !v23.compression);

        let v24 = Flags::decode(4, 0b0001_0000).unwrap();
        assert!(v24.footer && !v24.unknown);

        let v24 = Flags::decode(4, 0b0000_0001).unwrap();
        assert!(v24.unknown);

        assert_eq!(Flags::decode(5, 0), None);
    }
}
