//! The table of formats the scanner tries against a stream.

use std::{
    borrow::Cow,
    collections::HashSet,
    io::{self, Read},
    ops::Deref,
    sync::{Arc, LazyLock},
};

use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::{
    id3v2,
    sans::{
        field::{Field, FieldValidator},
        tag::TagShell,
    },
};

/// Validate the header of a tag, returning a shell if it is accepted.
///
/// The slice passed is always exactly [`FormatDescriptor::header_length`]
/// long.
pub type ValidateHeader = fn(&[u8]) -> Option<TagShell>;

/// Decode the fields of a terminator-delimited tag directly from the stream.
///
/// The parser must stop reading once it reaches the terminator.
pub type DelimitedParser = fn(&mut dyn Read, &[FieldValidator]) -> io::Result<Vec<Field>>;

/// An error registering a format.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The descriptor cannot be used for scanning.
    #[error("Invalid format descriptor: {0}.")]
    InvalidDescriptor(&'static str),
    /// No format is registered under this name.
    #[error("Unknown format ({0}).")]
    UnknownFormat(String),
}

/// Everything the scanner needs to know about a format.
#[derive(Clone, Debug)]
pub struct FormatDescriptor {
    /// Unique name of the format.
    pub name: Cow<'static, str>,
    /// Number of bytes needed to decide whether the header is present.
    pub header_length: usize,
    /// The header validator.
    pub validate: ValidateHeader,
    /// Field-header validators, tried in order.
    pub field_validators: Vec<FieldValidator>,
    /// Parser for tags whose header declares no length.
    pub delimited: Option<DelimitedParser>,
}

impl FormatDescriptor {
    /// A descriptor with no field validators.
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        header_length: usize,
        validate: ValidateHeader,
    ) -> Self {
        Self {
            name: name.into(),
            header_length,
            validate,
            field_validators: Vec::new(),
            delimited: None,
        }
    }

    /// Append a field-header validator.
    pub fn with_field_validator(mut self, validator: FieldValidator) -> Self {
        self.field_validators.push(validator);
        self
    }

    /// Set the parser for terminator-delimited tags.
    pub fn with_delimited(mut self, parser: DelimitedParser) -> Self {
        self.delimited = Some(parser);
        self
    }

    fn check(&self) -> Result<(), RegistrationError> {
        if self.name.is_empty() {
            Err(RegistrationError::InvalidDescriptor("empty format name"))?;
        }

        if self.header_length == 0 {
            Err(RegistrationError::InvalidDescriptor(
                "header validators must inspect at least one byte",
            ))?;
        }

        self.field_validators.iter().try_for_each(check_field_validator)
    }
}

fn check_field_validator(validator: &FieldValidator) -> Result<(), RegistrationError> {
    if validator.header_length == 0 {
        Err(RegistrationError::InvalidDescriptor(
            "field validators must inspect at least one byte",
        ))?;
    }

    Ok(())
}

/// A format implemented by a type.
///
/// See the [`Format`](macro@crate::Format) derive macro for an automatic
/// implementation of this trait.
pub trait Format {
    /// Describe the format for registration.
    fn descriptor() -> FormatDescriptor;
}

/// A collection of formats that can be registered together.
pub trait FormatSource {
    /// Identity of the source. A registry scans each identity at most once.
    fn identity(&self) -> &str;

    /// Descriptors of every format the source provides.
    fn descriptors(&self) -> Vec<FormatDescriptor>;
}

/// A consistent view of the registered formats, in registration order.
///
/// Later registrations do not affect a snapshot already taken.
#[derive(Clone, Debug)]
pub struct Snapshot(Arc<Vec<FormatDescriptor>>);

impl Deref for Snapshot {
    type Target = [FormatDescriptor];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A table of formats.
///
/// Most applications use the process-wide [`Registry::global`].
#[derive(Debug, Default)]
pub struct Registry {
    formats: RwLock<Arc<Vec<FormatDescriptor>>>,
    sources: Mutex<HashSet<String>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, which includes the [`id3v2`] formats.
    pub fn global() -> &'static Registry {
        static GLOBAL: LazyLock<Registry> = LazyLock::new(|| {
            let registry = Registry::new();
            if let Err(err) = registry.discover(&id3v2::Id3v2) {
                tracing::error!(%err, "failed to register built-in formats");
            }
            registry
        });

        &GLOBAL
    }

    /// Register a format with no field validators.
    ///
    /// A format already registered under the same name is replaced, keeping
    /// its position in the scanning order.
    pub fn register(
        &self,
        name: impl Into<Cow<'static, str>>,
        header_length: usize,
        validate: ValidateHeader,
    ) -> Result<(), RegistrationError> {
        self.register_descriptor(FormatDescriptor::new(name, header_length, validate))
    }

    /// Register a complete descriptor.
    ///
    /// A format already registered under the same name is replaced, keeping
    /// its position in the scanning order.
    pub fn register_descriptor(&self, descriptor: FormatDescriptor) -> Result<(), RegistrationError> {
        descriptor.check()?;
        self.insert(descriptor);
        Ok(())
    }

    fn insert(&self, descriptor: FormatDescriptor) {
        let mut formats = self.formats.write();
        let formats = Arc::make_mut(&mut formats);

        match formats.iter_mut().find(|f| f.name == descriptor.name) {
            Some(existing) => {
                tracing::debug!(name = %descriptor.name, "replacing format");
                *existing = descriptor;
            }
            None => {
                tracing::debug!(name = %descriptor.name, "registering format");
                formats.push(descriptor);
            }
        }
    }

    /// Append a field-header validator to a registered format.
    pub fn register_field_validator(
        &self,
        name: &str,
        validator: FieldValidator,
    ) -> Result<(), RegistrationError> {
        check_field_validator(&validator)?;

        let mut formats = self.formats.write();

        let Some(i) = formats.iter().position(|f| f.name == name) else {
            Err(RegistrationError::UnknownFormat(name.to_owned()))?
        };

        Arc::make_mut(&mut formats)[i].field_validators.push(validator);
        Ok(())
    }

    /// Register every format of a source.
    ///
    /// Returns `false` without registering anything if a source with the same
    /// identity was already discovered. Nothing is registered if any
    /// descriptor of the source is invalid.
    pub fn discover(&self, source: &impl FormatSource) -> Result<bool, RegistrationError> {
        let mut sources = self.sources.lock();

        if sources.contains(source.identity()) {
            tracing::trace!(source = source.identity(), "source already discovered");
            return Ok(false);
        }

        let descriptors = source.descriptors();
        descriptors.iter().try_for_each(FormatDescriptor::check)?;

        for descriptor in descriptors {
            self.insert(descriptor);
        }

        sources.insert(source.identity().to_owned());
        Ok(true)
    }

    /// Take a snapshot of the registered formats.
    pub fn all(&self) -> Snapshot {
        Snapshot(Arc::clone(&self.formats.read()))
    }
}
