//! Decide how an entry's bytes on disk relate to the fetch about to start.

use std::fs;
use std::io;
use std::path::Path;

use crate::storage::existing_len;

/// Local state of one destination before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LocalState {
    /// The destination already has the expected size.
    Complete,
    /// Nothing usable on disk; start from byte zero.
    Fresh,
    /// The `.part` file holds this many bytes to continue from.
    Resume(u64),
    /// The `.part` file is a fresh copy of the destination, which stays in
    /// place until the final rename.
    Adopted(u64),
}

/// Inspects `dest` and its `.part` sibling.
///
/// An existing destination that is not known to be complete is copied to the
/// `.part` path and continued from there; `dest` itself is only replaced by
/// the final rename. Local bytes beyond the expected size are discarded. With
/// `skip_existing` off, a destination of the expected size is adopted too, so
/// the server decides whether it is complete.
pub(crate) fn prepare(
    dest: &Path,
    part: &Path,
    size: Option<u64>,
    overwrite: bool,
    skip_existing: bool,
) -> io::Result<LocalState> {
    if overwrite {
        remove_if_exists(part)?;
        return Ok(LocalState::Fresh);
    }

    let part_len = existing_len(part)?;
    let fits = |len: u64| size.map_or(true, |expected| len <= expected);

    if let Some(len) = existing_len(dest)? {
        if skip_existing && size == Some(len) {
            return Ok(LocalState::Complete);
        }
        if !fits(len) {
            tracing::warn!(path = %dest.display(), len, expected = ?size, "existing file larger than expected, refetching");
            remove_if_exists(part)?;
            return Ok(LocalState::Fresh);
        }
        // A longer part is an interrupted continuation of this destination.
        if let Some(plen) = part_len.filter(|&plen| plen > len && fits(plen)) {
            return Ok(LocalState::Resume(plen));
        }
        fs::copy(dest, part)?;
        return Ok(LocalState::Adopted(len));
    }

    match part_len {
        Some(len) if !fits(len) => {
            remove_if_exists(part)?;
            Ok(LocalState::Fresh)
        }
        Some(len) if len > 0 => Ok(LocalState::Resume(len)),
        _ => Ok(LocalState::Fresh),
    }
}

pub(crate) fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
