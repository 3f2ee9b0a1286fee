//! Decoding of fields from an extracted tag payload.

use std::borrow::Cow;

use super::{
    field::{Field, FieldValidator},
    sync::decode_unsynchronized,
    tag::{Tag, TagShell},
};

/// Decode the fields of a tag from its complete payload.
///
/// The payload must be exactly as extracted from the stream, using the
/// length declared by the header. Unsynchronization and any preamble are
/// removed here, according to the shell.
pub fn decode_fields(shell: TagShell, payload: &[u8], validators: &[FieldValidator]) -> Tag {
    if shell.opaque {
        return shell.populate([]);
    }

    let payload = if shell.unsynchronized {
        Cow::Owned(decode_unsynchronized(payload))
    } else {
        Cow::Borrowed(payload)
    };

    let start = shell
        .skip_preamble
        .map_or(0, |skip| skip(&payload))
        .min(payload.len());

    let fields = FieldIter {
        r: &payload[start..],
        validators,
    }
    .collect::<Vec<_>>();

    tracing::trace!(format = %shell.format, count = fields.len(), "decoded fields");

    shell.populate(fields)
}

/// Iterator over consecutive fields of a payload.
///
/// Ends at the first header no validator accepts, or when the remaining
/// bytes are too few to hold a header. Either case usually marks padding.
struct FieldIter<'a> {
    r: &'a [u8],
    validators: &'a [FieldValidator],
}

impl Iterator for FieldIter<'_> {
    type Item = Field;

    fn next(&mut self) -> Option<Field> {
        let r = self.r;

        let (header_length, shell) = self.validators.iter().find_map(|v| {
            let header = r.get(..v.header_length)?;
            (v.validate)(header).map(|shell| (v.header_length, shell))
        })?;

        let body = &r[header_length..];
        let (body, rest) = body.split_at(body.len().min(shell.length as usize));

        if body.len() < shell.length as usize {
            tracing::debug!(
                identifier = %String::from_utf8_lossy(&shell.identifier),
                declared = shell.length,
                found = body.len(),
                "field truncated by end of payload"
            );
        }

        self.r = rest;

        Some(shell.parse(body))
    }
}
