//! Built-in formats for ID3v2.2, ID3v2.3 and ID3v2.4 tags.
//!
//! These register through the same interface as any external format, and
//! are discovered by [`Registry::global`](crate::avec::Registry::global).
//!
//! Frames are recognised by their headers and kept as raw bytes. Compressed
//! ID3v2.2 tags are skipped without decoding, as that revision recommends.
//!
//! A tag with the unsynchronization flag set has the stuffing removed from
//! its whole payload before frames are split. ID3v2.4 writers that apply
//! unsynchronization per frame count the stuffed bytes in each frame size,
//! so frames of such tags may be split at the wrong offsets.

use zerocopy::FromBytes;

use crate::{
    avec::registry::{Format, FormatDescriptor, FormatSource},
    sans::{
        field::{FieldShell, FieldValidator},
        header::{BaseHeader, Flags, HEADER_LENGTH, validate_header},
        sync::decode_sync_safe_int,
        tag::TagShell,
    },
};

/// Registered name of ID3v2.2.
pub const V22: &str = "ID3v2.2";
/// Registered name of ID3v2.3.
pub const V23: &str = "ID3v2.3";
/// Registered name of ID3v2.4.
pub const V24: &str = "ID3v2.4";

/// All ID3v2 formats, as a source for [`Registry::discover`](crate::avec::Registry::discover).
#[derive(Clone, Copy, Debug)]
pub struct Id3v2;

impl FormatSource for Id3v2 {
    fn identity(&self) -> &str {
        "tagscan::id3v2"
    }

    fn descriptors(&self) -> Vec<FormatDescriptor> {
        vec![
            Id3v22::descriptor(),
            Id3v23::descriptor(),
            Id3v24::descriptor(),
        ]
    }
}

/// ID3v2.2, as described at <https://id3.org/id3v2-00>.
#[derive(Clone, Copy, Debug)]
pub struct Id3v22;

impl Format for Id3v22 {
    fn descriptor() -> FormatDescriptor {
        FormatDescriptor::new(V22, HEADER_LENGTH, validate_v22)
            .with_field_validator(FieldValidator::new(6, frame_header_v22))
    }
}

/// ID3v2.3.
#[derive(Clone, Copy, Debug)]
pub struct Id3v23;

impl Format for Id3v23 {
    fn descriptor() -> FormatDescriptor {
        FormatDescriptor::new(V23, HEADER_LENGTH, validate_v23)
            .with_field_validator(FieldValidator::new(10, frame_header_v23))
    }
}

/// ID3v2.4.
#[derive(Clone, Copy, Debug)]
pub struct Id3v24;

impl Format for Id3v24 {
    fn descriptor() -> FormatDescriptor {
        FormatDescriptor::new(V24, HEADER_LENGTH, validate_v24)
            .with_field_validator(FieldValidator::new(10, frame_header_v24))
    }
}

/// Validate an ID3v2.2 header.
pub fn validate_v22(r: &[u8]) -> Option<TagShell> {
    let (header, flags) = validate_header(r, 2)?;
    Some(new_shell(V22, header, flags, b"TT2"))
}

/// Validate an ID3v2.3 header.
pub fn validate_v23(r: &[u8]) -> Option<TagShell> {
    let (header, flags) = validate_header(r, 3)?;
    let mut shell = new_shell(V23, header, flags, b"TIT2");
    if flags.extended_header {
        shell.skip_preamble = Some(extended_header_v23);
    }
    Some(shell)
}

/// Validate an ID3v2.4 header.
pub fn validate_v24(r: &[u8]) -> Option<TagShell> {
    let (header, flags) = validate_header(r, 4)?;
    let mut shell = new_shell(V24, header, flags, b"TIT2");
    if flags.extended_header {
        shell.skip_preamble = Some(extended_header_v24);
    }
    if flags.footer {
        shell.trailer_length = HEADER_LENGTH as u32;
    }
    Some(shell)
}

fn new_shell(
    format: &'static str,
    header: BaseHeader,
    flags: Flags,
    title_field: &'static [u8],
) -> TagShell {
    if flags.unknown {
        tracing::warn!(
            format,
            flags = format_args!("{:#010b}", header.flags),
            "unknown header flags, tag may be mis-parsed"
        );
    }

    TagShell {
        version: Some((header.major_version, header.revision)),
        unsynchronized: flags.unsynchronization,
        opaque: flags.compression,
        has_unknown_flags: flags.unknown,
        title_field: Some(title_field),
        ..TagShell::new(format, header.payload_length)
    }
}

/// The ID3v2.3 extended header size excludes its own four bytes.
fn extended_header_v23(r: &[u8]) -> usize {
    match r.first_chunk::<4>() {
        Some(size) => (u32::from_be_bytes(*size) as usize).saturating_add(4),
        None => r.len(),
    }
}

/// The ID3v2.4 extended header size is sync-safe and includes itself.
fn extended_header_v24(r: &[u8]) -> usize {
    r.first_chunk::<4>()
        .and_then(|size| decode_sync_safe_int(*size).ok())
        .map_or(r.len(), |size| size as usize)
}

/// Frame identifiers are uppercase letters and digits, starting with a letter.
fn is_frame_id(id: &[u8]) -> bool {
    id.first().is_some_and(u8::is_ascii_uppercase)
        && id.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

fn frame_header_v22(r: &[u8]) -> Option<FieldShell> {
    #[repr(C, packed)]
    #[derive(FromBytes)]
    struct FrameHeaderV22 {
        id: [u8; 3],
        size: [u8; 3],
    }

    let r: [u8; 6] = r.try_into().ok()?;
    let FrameHeaderV22 { id, size } = zerocopy::transmute!(r);

    if !is_frame_id(&id) {
        return None;
    }

    let [a, b, c] = size;
    Some(FieldShell::passthrough(id, u32::from_be_bytes([0, a, b, c])))
}

#[repr(C, packed)]
#[derive(FromBytes)]
struct FrameHeader {
    id: [u8; 4],
    size: [u8; 4],
    _flags: [u8; 2],
}

fn frame_header_v23(r: &[u8]) -> Option<FieldShell> {
    let r: [u8; 10] = r.try_into().ok()?;
    let FrameHeader { id, size, .. } = zerocopy::transmute!(r);

    if !is_frame_id(&id) {
        return None;
    }

    Some(FieldShell::passthrough(id, u32::from_be_bytes(size)))
}

fn frame_header_v24(r: &[u8]) -> Option<FieldShell> {
    let r: [u8; 10] = r.try_into().ok()?;
    let FrameHeader { id, size, .. } = zerocopy::transmute!(r);

    if !is_frame_id(&id) {
        return None;
    }

    Some(FieldShell::passthrough(id, decode_sync_safe_int(size).ok()?))
}
