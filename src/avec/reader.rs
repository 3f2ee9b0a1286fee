//! Reader-based scanner implementation.

use std::{
    io::{self, Read},
    sync::mpsc::{self, Receiver, Sender},
    thread,
};

use either::Either::{self, Left, Right};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, instrument, trace};

use crate::sans::{
    decode::decode_fields,
    field::FieldValidator,
    tag::{Tag, TagShell},
};

use super::{
    CancelToken, ScanOptions,
    registry::{FormatDescriptor, Registry},
};

/// Errors occurring while scanning a reader.
#[derive(Debug, Error)]
pub enum Error {
    /// An error from the supplied reader.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The stream ended inside a tag whose header had already matched.
    ///
    /// The position of the stream can no longer be trusted, so scanning
    /// does not continue past this point.
    #[error("Stream ended after {found} of {expected} bytes of a {format} tag.")]
    UnexpectedEnd {
        format: String,
        expected: u64,
        found: u64,
    },
    /// The scan was cancelled.
    #[error("Scan cancelled.")]
    Cancelled,
}

/// Scan a reader for consecutive tags of any format in the global registry.
///
/// This method is also re-exported as `tagscan::avec::scan_reader`.
///
/// Reading starts at the current position and never seeks. Tags are returned
/// in the order they appear in the stream. Finding no tag is not an error.
///
/// When no format matches, the bytes read to test their headers are lost:
/// the reader is left after the longest header tried. Use
/// [`super::slice::scan`] to recover them when the data is in memory.
pub fn scan(r: &mut impl Read) -> Result<Vec<Tag>, Error> {
    scan_with(r, Registry::global(), &ScanOptions::default())
}

/// Scan a reader for consecutive tags of any format in `registry`.
///
/// The formats registered when the scan starts are used throughout, even if
/// the registry changes meanwhile.
pub fn scan_with(
    r: &mut impl Read,
    registry: &Registry,
    options: &ScanOptions,
) -> Result<Vec<Tag>, Error> {
    scan_inner(r, registry, options).map(|(tags, _)| tags)
}

/// Scan as [`scan_with`], also returning the bytes read while looking for a
/// further tag that was not found.
#[instrument(level = "debug", skip_all)]
pub(crate) fn scan_inner(
    r: &mut impl Read,
    registry: &Registry,
    options: &ScanOptions,
) -> Result<(Vec<Tag>, Vec<u8>), Error> {
    let formats = registry.all();
    let workers = options.workers.get();
    let cancel = &options.cancel;

    let mut source = Source::new(r);

    let (job_sender, job_receiver) = mpsc::sync_channel::<Job<'_>>(workers);
    let job_receiver = Mutex::new(job_receiver);
    let (tag_sender, tag_receiver) = mpsc::channel();

    thread::scope(|s| {
        for _ in 0..workers {
            let jobs = &job_receiver;
            let tags = tag_sender.clone();
            s.spawn(move || decode_worker(jobs, tags, cancel));
        }
        drop(tag_sender);

        // Tags in discovery order, filled in as decoding completes.
        let mut slots: Vec<Option<Tag>> = Vec::new();

        let detected = (|| -> Result<Vec<u8>, Error> {
            loop {
                if cancel.is_cancelled() {
                    Err(Error::Cancelled)?;
                }

                let (format, shell) = match detect(&mut source, &formats)? {
                    Left(unmatched) => return Ok(unmatched),
                    Right(found) => found,
                };

                match extract(&mut source, format, shell)? {
                    Left((shell, payload)) => {
                        let job = Job {
                            index: slots.len(),
                            shell,
                            payload,
                            validators: &format.field_validators,
                        };
                        slots.push(None);

                        if job_sender.send(job).is_err() {
                            // Every worker has exited, which only happens if
                            // one of them panicked.
                            Err(Error::Cancelled)?;
                        }
                    }
                    Right(tag) => slots.push(Some(tag)),
                }
            }
        })();

        drop(job_sender);

        for (index, tag) in tag_receiver {
            slots[index] = Some(tag);
        }

        let unmatched = detected?;

        if cancel.is_cancelled() {
            Err(Error::Cancelled)?;
        }

        let tags = slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(Error::Cancelled)?;

        debug!(count = tags.len(), "scan complete");

        Ok((tags, unmatched))
    })
}

/// A payload awaiting field decoding.
struct Job<'f> {
    index: usize,
    shell: TagShell,
    payload: Vec<u8>,
    validators: &'f [FieldValidator],
}

fn decode_worker(jobs: &Mutex<Receiver<Job<'_>>>, tags: Sender<(usize, Tag)>, cancel: &CancelToken) {
    loop {
        let job = jobs.lock().recv();
        let Ok(Job {
            index,
            shell,
            payload,
            validators,
        }) = job
        else {
            break;
        };

        if cancel.is_cancelled() {
            trace!(index, "abandoning decode");
            continue;
        }

        let tag = decode_fields(shell, &payload, validators);

        if tags.send((index, tag)).is_err() {
            break;
        }
    }
}

/// Try each format against the next bytes of the stream.
///
/// Returns the first format to accept its header, with the shell it built.
/// Bytes read beyond the accepted header are returned to the source. If no
/// format matches, returns every byte taken from the stream and not yet
/// consumed.
fn detect<'f, R: Read>(
    source: &mut Source<R>,
    formats: &'f [FormatDescriptor],
) -> Result<Either<Vec<u8>, (&'f FormatDescriptor, TagShell)>, Error> {
    let mut probe = Vec::new();

    for format in formats {
        let length = format.header_length;

        if probe.len() < length {
            let wanted = (length - probe.len()) as u64;
            source.by_ref().take(wanted).read_to_end(&mut probe)?;
        }

        let Some(header) = probe.get(..length) else {
            trace!(format = %format.name, "stream ended before header");
            continue;
        };

        match (format.validate)(header) {
            Some(shell) => {
                debug!(format = %format.name, length = shell.length, "matched header");
                source.unread(&probe[length..]);
                return Ok(Right((format, shell)));
            }
            None => trace!(format = %format.name, "rejected header"),
        }
    }

    debug!(consumed = probe.len(), "no format matched");

    // Anything still pending was read from the stream after the probe.
    probe.extend(source.drain_pending());

    Ok(Left(probe))
}

/// Read the remainder of a tag whose header has matched.
///
/// Returns either a payload to decode, or a finished tag when nothing is left
/// to decode.
fn extract<R: Read>(
    source: &mut Source<R>,
    format: &FormatDescriptor,
    shell: TagShell,
) -> Result<Either<(TagShell, Vec<u8>), Tag>, Error> {
    let name = shell.format.clone();
    let trailer = u64::from(shell.trailer_length);

    let extracted = if shell.length == 0 {
        let fields = match format.delimited {
            Some(parse) => parse(source, &format.field_validators)?,
            None => Vec::new(),
        };
        Right(shell.populate(fields))
    } else if shell.opaque {
        let expected = u64::from(shell.length);
        let found = io::copy(&mut source.by_ref().take(expected), &mut io::sink())?;
        check_length(&name, expected, found)?;
        Right(shell.populate([]))
    } else {
        let expected = u64::from(shell.length);
        let mut payload = Vec::new();
        let found = source.by_ref().take(expected).read_to_end(&mut payload)?;
        check_length(&name, expected, found as u64)?;
        Left((shell, payload))
    };

    if trailer != 0 {
        let found = io::copy(&mut source.by_ref().take(trailer), &mut io::sink())?;
        check_length(&name, trailer, found)?;
    }

    Ok(extracted)
}

fn check_length(format: &str, expected: u64, found: u64) -> Result<(), Error> {
    if found < expected {
        Err(Error::UnexpectedEnd {
            format: format.to_owned(),
            expected,
            found,
        })?;
    }

    Ok(())
}

/// A reader with a buffer of bytes to yield before reading further.
struct Source<R> {
    inner: R,
    pending: Vec<u8>,
    offset: usize,
}

impl<R: Read> Source<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            offset: 0,
        }
    }

    /// Push bytes back to be read again, ahead of anything still pending.
    fn unread(&mut self, r: &[u8]) {
        if r.is_empty() {
            return;
        }

        let mut pending = Vec::with_capacity(r.len() + self.pending.len() - self.offset);
        pending.extend_from_slice(r);
        pending.extend_from_slice(&self.pending[self.offset..]);
        self.pending = pending;
        self.offset = 0;
    }

    fn drain_pending(&mut self) -> Vec<u8> {
        let pending = self.pending.split_off(self.offset);
        self.pending.clear();
        self.offset = 0;
        pending
    }
}

impl<R: Read> Read for Source<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pending = &self.pending[self.offset..];

        if pending.is_empty() {
            return self.inner.read(buf);
        }

        let n = pending.len().min(buf.len());
        buf[..n].copy_from_slice(&pending[..n]);
        self.offset += n;

        Ok(n)
    }
}
