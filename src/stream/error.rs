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

/// Failure modes of [`super::StreamReader`] and [`super::StreamWriter`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation attempted on a closed stream.
    #[error("stream is closed")]
    Closed,
    /// Operation attempted on a stream that already entered the `Error` state.
    #[error("stream is in the error state")]
    ErrorState,
    /// Reader underflow: not enough bits/bytes remained.
    #[error("reader underflow")]
    Empty,
    /// Writer overflow: the bounded sink has no room left.
    #[error("writer is full")]
    Full,
    /// Platform I/O failure.
    #[error("stream I/O error: {0}")]
    Io(#[from] io::Error),
    /// `ensure_all_consumed` expectation was violated.
    #[error("unexpected number of bits remaining")]
    RemainingBits,
    /// `remaining_bytes` was called on a backend that cannot compute it.
    #[error("remaining byte count is not supported by this backend")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, Error>;
