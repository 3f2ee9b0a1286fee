//! A pluggable reader for header-prefixed binary metadata tags.
//!
//! Tagscan detects which of several registered tag formats begins at the
//! current position of a stream, extracts each tag found there, and decodes
//! it into named fields. ID3v2.2, ID3v2.3 and ID3v2.4 are built in; further
//! formats plug in by registering a header validator and field-header
//! validators.
//!
//! Most users should begin with the functions in the [`avec`] module. To
//! add a format, see [`avec::Registry`] and the [`Format`] derive macro. The
//! I/O-free pieces, including the ID3v2 synchronization codec, are in the
//! [`sans`] module.
//!
//! ## Cargo Features
//!
//! The following crate feature flags are available:
//!
//! - `derive`: enable the [`Format`] derive macro (default).

extern crate self as tagscan;

pub mod avec;
pub mod id3v2;
pub mod sans;

pub use avec::{Format, FormatDescriptor, FormatSource, Registry};
pub use sans::{
    field::{Field, Value},
    tag::Tag,
};
