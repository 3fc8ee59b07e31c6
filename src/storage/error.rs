// Copyright 2013-2014 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("file name is not valid for this operation")]
    InvalidFileName,
    #[error("file is already being accessed by another operation")]
    FileAlreadyAccessed,
    #[error("file already exists")]
    FileAlreadyExisting,
    #[error("no such file")]
    NoSuchFile,
    #[error("directory is already being accessed by another operation")]
    DirectoryAlreadyAccessed,
    #[error("directory already exists")]
    DirectoryAlreadyExisting,
    #[error("no such directory")]
    NoSuchDirectory,
    #[error("directory is not empty")]
    DirectoryNotEmpty,
    #[error("storage medium is full")]
    InsufficientSpace,
    #[error("platform I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Maps a platform I/O error onto the closest façade error kind, per
    /// spec §6's filesystem boundary (the platform is authoritative for
    /// "no such file/directory" and "disk full"; everything else passes
    /// through as `Io`).
    pub fn from_io(e: io::Error, is_directory: bool) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound if is_directory => Error::NoSuchDirectory,
            io::ErrorKind::NotFound => Error::NoSuchFile,
            io::ErrorKind::AlreadyExists if is_directory => Error::DirectoryAlreadyExisting,
            io::ErrorKind::AlreadyExists => Error::FileAlreadyExisting,
            _ if is_out_of_space(&e) => Error::InsufficientSpace,
            _ => Error::Io(e),
        }
    }
}

/// Best-effort portable detection of ENOSPC; stable `io::ErrorKind` has no
/// dedicated variant for it across all supported targets.
fn is_out_of_space(e: &io::Error) -> bool {
    #[cfg(unix)]
    {
        e.raw_os_error() == Some(28)
    }
    #[cfg(not(unix))]
    {
        let _ = e;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_file_or_directory_variant() {
        let e = io::Error::from(io::ErrorKind::NotFound);
        assert!(matches!(Error::from_io(e, false), Error::NoSuchFile));
        let e = io::Error::from(io::ErrorKind::NotFound);
        assert!(matches!(Error::from_io(e, true), Error::NoSuchDirectory));
    }

    #[test]
    #[cfg(unix)]
    fn enospc_maps_to_insufficient_space() {
        let e = io::Error::from_raw_os_error(28);
        assert!(matches!(Error::from_io(e, false), Error::InsufficientSpace));
    }

    #[test]
    fn unmapped_errors_pass_through_as_io() {
        let e = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(Error::from_io(e, false), Error::Io(_)));
    }
}
