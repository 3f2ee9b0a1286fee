//! Slice-based scanner implementation.

use crate::sans::tag::Tag;

use super::{
    ScanOptions,
    reader::{Error, scan_inner},
    registry::Registry,
};

/// Scan a slice for consecutive tags of any format in the global registry.
///
/// This method is also re-exported as `tagscan::avec::scan_slice`.
///
/// Returns the tags found, in order, and the remainder of the slice from the
/// first byte not belonging to a tag. Unlike [`super::reader::scan`], no
/// bytes are lost when the last detection attempt fails.
pub fn scan(r: &[u8]) -> Result<(Vec<Tag>, &[u8]), Error> {
    scan_with(r, Registry::global(), &ScanOptions::default())
}

/// Scan a slice for consecutive tags of any format in `registry`.
pub fn scan_with<'r>(
    r: &'r [u8],
    registry: &Registry,
    options: &ScanOptions,
) -> Result<(Vec<Tag>, &'r [u8]), Error> {
    let mut rest = r;
    let (tags, unmatched) = scan_inner(&mut rest, registry, options)?;

    // The unmatched bytes were the last read, immediately before `rest`.
    let end = r.len() - rest.len() - unmatched.len();

    Ok((tags, &r[end..]))
}
