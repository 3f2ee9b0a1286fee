use std::{num::NonZeroUsize, sync::LazyLock};

use tagscan::{
    Registry, Value,
    avec::{CancelToken, ScanOptions, reader, slice},
    sans::{
        field::{FieldError, FieldShell, FieldValidator},
        tag::TagShell,
    },
};

fn id3v23(frames: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
    let mut payload = Vec::new();
    for (id, body) in frames {
        payload.extend_from_slice(*id);
        payload.extend_from_slice(&(body.len() as u32).to_be_bytes());
        payload.extend_from_slice(&[0, 0]);
        payload.extend_from_slice(body);
    }

    let size = tagscan::sans::sync::encode_sync_safe_int(payload.len() as u32).unwrap();
    let mut tag = vec![b'I', b'D', b'3', 3, 0, 0];
    tag.extend_from_slice(&size);
    tag.extend(payload);
    tag
}

#[test]
fn concatenated_tags_leave_no_residue() {
    let mut data = id3v23(&[(b"TIT2", b"one")]);
    data.extend(id3v23(&[(b"TIT2", b"two"), (b"TPE1", b"x")]));

    let (tags, rest) = tagscan::avec::scan_slice(&data).unwrap();
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[0].length(), 13);
    assert_eq!(tags[1].length(), 24);
    assert!(rest.is_empty());
}

#[test]
fn no_match_is_empty() {
    let data = b"not a tag at all";
    let (tags, rest) = tagscan::avec::scan_slice(data).unwrap();
    assert!(tags.is_empty());
    assert_eq!(rest, data);

    let tags = tagscan::avec::scan_reader(&mut &data[..]).unwrap();
    assert!(tags.is_empty());
}

#[test]
fn reader_loses_probed_bytes() {
    let mut data = id3v23(&[(b"TIT2", b"one")]);
    data.extend_from_slice(b"0123456789abcdef");

    let mut r = data.as_slice();
    let tags = tagscan::avec::scan_reader(&mut r).unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(r, b"abcdef");
}

#[test]
fn slice_returns_unmatched_tail() {
    let mut data = id3v23(&[(b"TIT2", b"one")]);
    data.extend_from_slice(b"\xFFtrailing audio");

    let (tags, rest) = tagscan::avec::scan_slice(&data).unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(rest, b"\xFFtrailing audio");
}

#[test]
fn compressed_v22_skips_payload() {
    let mut data = vec![b'I', b'D', b'3', 2, 0, 0b0100_0000, 0, 0, 0, 7];
    data.extend_from_slice(b"TT2\x00\x00\x01A");
    data.extend_from_slice(b"after");

    let (tags, rest) = tagscan::avec::scan_slice(&data).unwrap();
    assert_eq!(tags.len(), 1);
    assert!(tags[0].is_opaque());
    assert!(tags[0].fields().is_empty());
    assert_eq!(rest, b"after");
}

#[test]
fn truncated_payload_is_fatal() {
    let mut data = id3v23(&[(b"TIT2", b"complete")]);
    data.extend_from_slice(&id3v23(&[(b"TIT2", b"truncated")])[..14]);

    let err = tagscan::avec::scan_reader(&mut data.as_slice()).unwrap_err();
    assert!(matches!(
        err,
        reader::Error::UnexpectedEnd { expected: 19, found: 4, .. }
    ));

    let err = tagscan::avec::scan_slice(&data).unwrap_err();
    assert!(matches!(err, reader::Error::UnexpectedEnd { .. }));
}

#[test]
fn truncated_header_does_not_match() {
    let mut data = id3v23(&[(b"TIT2", b"complete")]);
    data.extend_from_slice(b"ID3\x03\x00");

    let (tags, rest) = tagscan::avec::scan_slice(&data).unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(rest, b"ID3\x03\x00");
}

#[test]
fn unknown_frame_is_passthrough() {
    let data = id3v23(&[(b"XYZ1", b"\x01\x02\x03"), (b"TIT2", b"t")]);

    let (tags, _) = tagscan::avec::scan_slice(&data).unwrap();
    let field = tags[0].field(b"XYZ1").unwrap();
    assert!(field.is_passthrough());
    assert_eq!(field.values(), [Value::Bytes(vec![1, 2, 3])]);
    assert_eq!(field.name(), "{ XYZ1 }");
}

#[test]
fn order_is_discovery_order() {
    let mut data = Vec::new();
    for i in 0..64u8 {
        let body = vec![i; usize::from(i) * 64];
        data.extend(id3v23(&[(b"TIT2", &body)]));
    }

    let options = ScanOptions::default().workers(NonZeroUsize::new(4).unwrap());
    let (tags, _) = slice::scan_with(&data, Registry::global(), &options).unwrap();

    assert_eq!(tags.len(), 64);
    for (i, tag) in tags.iter().enumerate() {
        assert_eq!(tag.fields()[0].byte_length() as usize, i * 64);
    }
}

#[test]
fn cancelled_scan_fails() {
    let data = id3v23(&[(b"TIT2", b"one")]);

    let cancel = CancelToken::default();
    cancel.cancel();
    let options = ScanOptions::default().cancel(cancel.clone());

    let err = reader::scan_with(&mut data.as_slice(), Registry::global(), &options).unwrap_err();
    assert!(matches!(err, reader::Error::Cancelled));
    assert!(cancel.is_cancelled());
}

#[test]
fn unknown_flags_are_reported() {
    let mut data = id3v23(&[(b"TIT2", b"t")]);
    data[5] = 0b0000_0001;
    data.extend(id3v23(&[(b"TIT2", b"u")]));

    let (tags, _) = tagscan::avec::scan_slice(&data).unwrap();
    assert_eq!(tags.len(), 2);
    assert!(tags[0].has_unknown_flags());
    assert!(!tags[1].has_unknown_flags());
    assert_eq!(tags[0].fields().len(), 1);
}

static CANCEL: LazyLock<CancelToken> = LazyLock::new(CancelToken::default);

/// `C` headers carry a payload length. Decoding any field raises [`CANCEL`].
fn cancelling_header(r: &[u8]) -> Option<TagShell> {
    (r[0] == b'C').then(|| TagShell::new("Cancelling", u32::from(r[1])))
}

fn cancelling_field(r: &[u8]) -> Option<FieldShell> {
    Some(FieldShell::passthrough([r[0]], 1).with_parser(cancel_on_parse))
}

fn cancel_on_parse(body: &[u8]) -> Result<Vec<Value>, FieldError> {
    CANCEL.cancel();
    Ok(vec![Value::Bytes(body.to_vec())])
}

#[test]
fn cancelled_while_decoding() {
    let registry = Registry::new();
    registry.register("Cancelling", 2, cancelling_header).unwrap();
    registry
        .register_field_validator("Cancelling", FieldValidator::new(1, cancelling_field))
        .unwrap();

    let data = b"C\x02a1C\x02b2C\x02c3C\x02d4".repeat(16);
    let options = ScanOptions::default()
        .workers(NonZeroUsize::new(2).unwrap())
        .cancel(CANCEL.clone());

    assert!(!CANCEL.is_cancelled());
    let err = slice::scan_with(&data, &registry, &options).unwrap_err();
    assert!(matches!(err, reader::Error::Cancelled));
    assert!(CANCEL.is_cancelled());
}

/// `LONG` headers are eight bytes, `S` headers two: a length byte and a
/// field count.
fn long_header(r: &[u8]) -> Option<TagShell> {
    (&r[..4] == b"LONG").then(|| TagShell::new("Long", u32::from(r[4])))
}

fn short_header(r: &[u8]) -> Option<TagShell> {
    (r[0] == b'S').then(|| TagShell::new("Short", u32::from(r[1])))
}

fn byte_field(r: &[u8]) -> Option<FieldShell> {
    Some(FieldShell::passthrough([r[0]], 1))
}

#[test]
fn probed_bytes_begin_the_payload() {
    let registry = Registry::new();
    registry.register("Long", 8, long_header).unwrap();
    registry.register("Short", 2, short_header).unwrap();
    registry
        .register_field_validator("Short", FieldValidator::new(1, byte_field))
        .unwrap();

    // The second tag lies wholly within the bytes probed for `Long`.
    let data = b"S\x04a1b2S\x00S\x02c3";

    let (tags, rest) = slice::scan_with(data, &registry, &ScanOptions::default()).unwrap();
    let ids = tags
        .iter()
        .map(|t| t.fields().iter().map(|f| f.identifier().to_vec()).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    assert_eq!(ids, [vec![b"a".to_vec(), b"b".to_vec()], vec![], vec![b"c".to_vec()]]);
    assert!(rest.is_empty());
}
