//! Fields: the individual data points stored inside a tag.

use std::borrow::Cow;

use thiserror::Error;

/// An error decoding the body of a single field.
///
/// Field errors never abort decoding of the enclosing tag; the field falls
/// back to [`Value::Bytes`] holding its raw body instead.
#[derive(Debug, Error)]
pub enum FieldError {
    /// The body is shorter than the field's structure requires.
    #[error("Field body too short ({0} bytes).")]
    TooShort(usize),
    /// The body declares an encoding this parser does not understand.
    #[error("Unknown encoding ({0}).")]
    UnknownEncoding(u8),
    /// The body is otherwise malformed.
    #[error("Malformed field body: {0}.")]
    Malformed(Cow<'static, str>),
}

/// An image embedded in a field, left undecoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    /// MIME type or format hint, as stored in the field.
    pub mime: String,
    /// Raw image data.
    pub data: Vec<u8>,
}

/// A single decoded value of a field.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Raw bytes, with no further interpretation.
    Bytes(Vec<u8>),
    /// Decoded text.
    Text(String),
    /// A numeric value.
    Number(i64),
    /// An opaque image payload.
    Image(Image),
}

/// Decode the body of a field into its values.
pub type FieldParser = fn(&[u8]) -> Result<Vec<Value>, FieldError>;

/// A field whose header has been validated but whose body is yet to be read.
#[derive(Clone, Debug)]
pub struct FieldShell {
    /// Format-internal identifier of the field.
    pub identifier: Vec<u8>,
    /// Number of body bytes following the field header.
    pub length: u32,
    /// Human-readable name, if the format knows one.
    pub name: Option<Cow<'static, str>>,
    /// Extra descriptive text, such as the category of the field.
    pub subtitle: Option<Cow<'static, str>>,
    /// Specialised body decoder. Without one, the field is a passthrough.
    pub parser: Option<FieldParser>,
}

impl FieldShell {
    /// A shell for a field with no specialised decoder.
    pub fn passthrough(identifier: impl Into<Vec<u8>>, length: u32) -> Self {
        Self {
            identifier: identifier.into(),
            length,
            name: None,
            subtitle: None,
            parser: None,
        }
    }

    /// Attach a specialised body decoder.
    pub fn with_parser(mut self, parser: FieldParser) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Attach a human-readable name.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Complete the field from its body.
    ///
    /// The body may be shorter than [`FieldShell::length`] when the enclosing
    /// payload ended early; the field then records the length actually read.
    /// A failing parser degrades to the passthrough representation.
    pub fn parse(self, body: &[u8]) -> Field {
        let values = match self.parser.map(|parse| parse(body)) {
            Some(Ok(values)) => values,
            Some(Err(err)) => {
                tracing::debug!(
                    identifier = %String::from_utf8_lossy(&self.identifier),
                    %err,
                    "field parser failed, keeping raw bytes"
                );
                vec![Value::Bytes(body.to_vec())]
            }
            None => vec![Value::Bytes(body.to_vec())],
        };

        Field {
            identifier: self.identifier,
            byte_length: body.len() as u32,
            name: self.name,
            subtitle: self.subtitle,
            values,
        }
    }
}

/// Validate the header of a field, returning a shell if it is accepted.
///
/// The slice passed is always exactly [`FieldValidator::header_length`] long.
pub type ValidateFieldHeader = fn(&[u8]) -> Option<FieldShell>;

/// A field-header validator registered against a format.
#[derive(Clone, Copy, Debug)]
pub struct FieldValidator {
    /// Number of header bytes the validator inspects.
    pub header_length: usize,
    /// The validating function.
    pub validate: ValidateFieldHeader,
}

impl FieldValidator {
    /// Pair a validating function with its header length.
    pub const fn new(header_length: usize, validate: ValidateFieldHeader) -> Self {
        Self {
            header_length,
            validate,
        }
    }
}

/// A decoded field.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    identifier: Vec<u8>,
    byte_length: u32,
    name: Option<Cow<'static, str>>,
    subtitle: Option<Cow<'static, str>>,
    values: Vec<Value>,
}

impl Field {
    /// Format-internal identifier, as found in the field header.
    pub fn identifier(&self) -> &[u8] {
        &self.identifier
    }

    /// Length in bytes of the field body, excluding the header.
    pub fn byte_length(&self) -> u32 {
        self.byte_length
    }

    /// Human-readable name.
    ///
    /// Defaults to the identifier read as UTF-8 and enclosed in `{ ` and ` }`.
    pub fn name(&self) -> Cow<'_, str> {
        match &self.name {
            Some(name) => Cow::Borrowed(name.as_ref()),
            None => Cow::Owned(format!("{{ {} }}", String::from_utf8_lossy(&self.identifier))),
        }
    }

    /// Extra descriptive text, if any.
    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    /// All values held by the field, in order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Whether the field holds only its raw body.
    pub fn is_passthrough(&self) -> bool {
        matches!(self.values.as_slice(), [Value::Bytes(_)])
    }
}
