//! Stream-facing interfaces: format registration and tag scanning.
//!
//! Formats announce themselves to a [`Registry`], either one at a time with
//! [`Registry::register`] or in bulk through a [`FormatSource`]. The scanner
//! then tries every registered format against the front of a stream,
//! extracts each tag it recognises, and decodes the fields of extracted tags
//! on a pool of worker threads while it continues reading.
//!
//! ```
//! let mut file = std::fs::File::open("song.mp3")?;
//! for tag in tagscan::avec::scan_reader(&mut file)? {
//!     println!("{} ({} bytes)", tag.format(), tag.length());
//! }
//! ```
//!
//! Scanning stops at the first position where no format matches. Bytes read
//! while trying headers at that position are not returned to a reader; see
//! [`reader::scan`] for details, and [`slice::scan`] for a variant that
//! reports them.

use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

pub mod reader;
pub mod registry;
pub mod slice;

pub use reader::scan as scan_reader;
pub use registry::{Format, FormatDescriptor, FormatSource, Registry, RegistrationError};
pub use slice::scan as scan_slice;

/// Derive [`Format`] for a type representing a tag format.
///
/// _Requires Cargo feature `derive`._
///
/// # Example
///
/// Name the format and its header validator with the `format` attribute.
/// `header` is the number of bytes the validator needs to see.
///
/// ```
/// #[derive(Format)]
/// #[format(name = "APEv2", header = 32, validate = validate_ape)]
/// struct Ape;
/// ```
///
/// Add field-header validators, in the order they should be tried, with
/// repeated `field` attributes. Formats whose tags are delimited by a
/// terminator rather than a length name their stream parser with
/// `delimited`.
///
/// ```
/// #[derive(Format)]
/// #[format(name = "Chunks", header = 4, validate = chunk_header, delimited = read_chunks)]
/// #[field(header = 8, validate = chunk_field)]
/// struct Chunks;
/// ```
#[cfg(feature = "derive")]
pub use tagscan_derive::Format;

/// Options controlling a scan.
#[derive(Clone, Debug)]
pub struct ScanOptions {
    workers: NonZeroUsize,
    cancel: CancelToken,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
            cancel: CancelToken::default(),
        }
    }
}

impl ScanOptions {
    /// Set the number of threads decoding fields. Defaults to the available
    /// parallelism.
    pub fn workers(mut self, workers: NonZeroUsize) -> Self {
        self.workers = workers;
        self
    }

    /// Stop the scan when `cancel` is raised.
    pub fn cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A flag to stop a scan in progress.
///
/// Clones share the flag. A raised flag stops detection at the next tag
/// boundary, and decoding of any tag not yet started. The scan then fails
/// with [`reader::Error::Cancelled`].
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Raise the flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the flag has been raised.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
