// Copyright 2013-2014 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Bit-packed binary stream codec.
//!
//! A [`StreamReader`] or [`StreamWriter`] wraps a byte-oriented backend and
//! exposes bit-level and byte-level primitive access with a strict state
//! machine: every stream is `Open`, `End`, `Closed` or `Error`, and once
//! `Error` or `Closed` is reached only [`StreamReader::close`] /
//! [`StreamWriter::close`] still succeed.

mod backend;
mod error;
mod reader;
mod writer;

pub use backend::{ReadBackend, SliceSource, VecSink, WriteBackend};
pub use error::Error;
pub use reader::StreamReader;
pub use writer::StreamWriter;

/// Byte order used to encode/decode multi-byte primitives.
///
/// There is no module-level mutable "native endian" constant; instead each
/// stream picks an endian at construction time, and [`Endian::native`]
/// probes the target at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// The endian of the compilation target.
    pub const fn native() -> Endian {
        #[cfg(target_endian = "little")]
        {
            Endian::Little
        }
        #[cfg(target_endian = "big")]
        {
            Endian::Big
        }
    }
}

/// The lifecycle state of a [`StreamReader`] or [`StreamWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Normal operation; more data may be read/written.
    Open,
    /// No more data: empty for a reader, full for a bounded writer. Up to
    /// seven cached bits may still be present.
    End,
    /// [`close`](StreamReader::close) was called. Terminal.
    Closed,
    /// An unrecoverable I/O or state-machine violation occurred. Only
    /// `close` remains callable.
    Error,
}

/// How many bits are expected to remain in a stream, for
/// [`StreamReader::ensure_all_consumed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    Zero,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    SevenOrLess,
    MoreThanSeven,
    Any,
}

impl Expectation {
    /// Whether `remaining_bits` (including any whole bytes left, i.e.
    /// `8 * whole_bytes_left + cached_bits`, saturating) satisfies this
    /// expectation.
    fn matches(self, remaining_bits: u64) -> bool {
        match self {
            Expectation::Zero => remaining_bits == 0,
            Expectation::One => remaining_bits == 1,
            Expectation::Two => remaining_bits == 2,
            Expectation::Three => remaining_bits == 3,
            Expectation::Four => remaining_bits == 4,
            Expectation::Five => remaining_bits == 5,
            Expectation::Six => remaining_bits == 6,
            Expectation::Seven => remaining_bits == 7,
            Expectation::SevenOrLess => remaining_bits <= 7,
            Expectation::MoreThanSeven => remaining_bits > 7,
            Expectation::Any => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expectation_matches_exact_counts() {
        assert!(Expectation::Zero.matches(0));
        assert!(!Expectation::Zero.matches(1));
        assert!(Expectation::Seven.matches(7));
        assert!(Expectation::SevenOrLess.matches(0));
        assert!(Expectation::SevenOrLess.matches(7));
        assert!(!Expectation::SevenOrLess.matches(8));
        assert!(Expectation::MoreThanSeven.matches(8));
        assert!(!Expectation::MoreThanSeven.matches(7));
        assert!(Expectation::Any.matches(12345));
    }
}
