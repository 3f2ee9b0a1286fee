//! I/O-free building blocks for decoding tags.
//!
//! Nothing in this module reads from a stream. Every function operates on
//! bytes already in memory, so these pieces can be used on their own: to
//! validate a header found by other means, or to decode a payload that was
//! extracted elsewhere.
//!
//! # Architecture
//!
//! A tag passes through three stages:
//!
//! - A header validator inspects a fixed number of bytes and, if it accepts
//! them, returns a [`tag::TagShell`] holding the declared payload length and
//! how the payload is encoded. See [`header`] for the ID3v2 family.
//!
//! - The payload is extracted by the caller, using the declared length.
//!
//! - [`decode::decode_fields`] removes any [`sync`] stuffing and splits the
//! payload into [`field::Field`]s, using the field-header validators of the
//! format.
//!
//! The stream-facing side of this process lives in [`crate::avec`].

pub mod decode;
pub mod field;
pub mod header;
pub mod sync;
pub mod tag;
