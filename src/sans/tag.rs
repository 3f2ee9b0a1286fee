//! Tags: complete metadata blocks of a single format.

use std::borrow::Cow;

use super::field::{Field, Value};

/// Skip a preamble at the start of a decoded payload, such as an extended
/// header. Returns the number of bytes to skip.
pub type SkipPreamble = fn(&[u8]) -> usize;

/// A tag whose header has been validated but whose fields are yet to be read.
///
/// Created by a format's header validator and consumed by the scanner.
#[derive(Clone, Debug)]
pub struct TagShell {
    /// Display name of the tag format.
    pub format: Cow<'static, str>,
    /// Number of payload bytes following the header, as declared.
    ///
    /// Zero means the payload is delimited by a terminator rather than a
    /// length, if the format declares a parser for that case.
    pub length: u32,
    /// Major version and revision, for versioned formats.
    pub version: Option<(u8, u8)>,
    /// The payload uses unsynchronization stuffing.
    pub unsynchronized: bool,
    /// The payload must be consumed but not decoded into fields.
    pub opaque: bool,
    /// The header set flags the format does not recognise.
    pub has_unknown_flags: bool,
    /// Preamble to skip before the first field.
    pub skip_preamble: Option<SkipPreamble>,
    /// Bytes belonging to the tag that follow its payload.
    pub trailer_length: u32,
    /// Identifier of the field holding the tag's display name.
    pub title_field: Option<&'static [u8]>,
}

impl TagShell {
    /// A shell for a plain length-delimited payload.
    pub fn new(format: impl Into<Cow<'static, str>>, length: u32) -> Self {
        Self {
            format: format.into(),
            length,
            version: None,
            unsynchronized: false,
            opaque: false,
            has_unknown_flags: false,
            skip_preamble: None,
            trailer_length: 0,
            title_field: None,
        }
    }

    /// Finish the tag with its decoded fields.
    ///
    /// Fields sharing an identifier replace the earlier field in place, so
    /// identifiers stay unique and ordered by first discovery.
    pub fn populate(self, fields: impl IntoIterator<Item = Field>) -> Tag {
        let mut tag = Tag {
            shell: self,
            fields: Vec::new(),
        };

        for field in fields {
            match tag
                .fields
                .iter_mut()
                .find(|f| f.identifier() == field.identifier())
            {
                Some(existing) => {
                    tracing::debug!(
                        format = %tag.shell.format,
                        identifier = %String::from_utf8_lossy(field.identifier()),
                        "replacing field with duplicate identifier"
                    );
                    *existing = field;
                }
                None => tag.fields.push(field),
            }
        }

        tag
    }
}

/// A decoded tag.
#[derive(Clone, Debug)]
pub struct Tag {
    shell: TagShell,
    fields: Vec<Field>,
}

impl Tag {
    /// Display name of the tag format.
    pub fn format(&self) -> &str {
        &self.shell.format
    }

    /// Length in bytes of the payload, excluding the header.
    pub fn length(&self) -> u32 {
        self.shell.length
    }

    /// Major version and revision, for versioned formats.
    pub fn version(&self) -> Option<(u8, u8)> {
        self.shell.version
    }

    /// Whether the header set flags the format does not recognise.
    ///
    /// Such tags may have been mis-parsed, as unknown flags often signal
    /// structural extensions that change the payload layout.
    pub fn has_unknown_flags(&self) -> bool {
        self.shell.has_unknown_flags
    }

    /// Whether the payload was skipped rather than decoded.
    pub fn is_opaque(&self) -> bool {
        self.shell.opaque
    }

    /// All fields, in discovery order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by identifier.
    pub fn field(&self, identifier: &[u8]) -> Option<&Field> {
        self.fields.iter().find(|f| f.identifier() == identifier)
    }

    /// Format-agnostic view over the fields.
    pub fn attributes(&self) -> Attributes<'_> {
        Attributes { tag: self }
    }
}

/// Format-agnostic attributes mapped onto the fields of a tag.
#[derive(Clone, Copy, Debug)]
pub struct Attributes<'t> {
    tag: &'t Tag,
}

impl<'t> Attributes<'t> {
    /// Display names of the enclosing file, from the format's title field.
    pub fn name(&self) -> impl Iterator<Item = &'t str> + 't {
        let tag = self.tag;

        tag.shell
            .title_field
            .and_then(move |id| tag.field(id))
            .into_iter()
            .flat_map(|field| field.values())
            .filter_map(|value| match value {
                Value::Text(text) => Some(text.as_str()),
                _ => None,
            })
    }
}
