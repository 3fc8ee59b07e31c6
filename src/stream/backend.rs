// Copyright 2013-2014 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Backing stores a [`super::StreamReader`]/[`super::StreamWriter`] can sit on top of.
//!
//! A stream itself only manages bit-cache and state-machine bookkeeping; the
//! actual byte transport is delegated to a [`ReadBackend`]/[`WriteBackend`]
//! implementation, the same split the original teacher used between `io::Read`
//! and the per-platform `sys::fs`/`sys::net` descriptors.

use std::io;

/// A byte source a [`super::StreamReader`] pulls bytes from.
pub trait ReadBackend {
    /// Pull up to `buf.len()` bytes. Returns the number of bytes read; `0`
    /// means the source is exhausted.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// The number of whole bytes left, if this backend can compute it
    /// without consuming them. `None` means "unsupported" per spec.
    fn remaining_bytes(&self) -> Option<u64>;
}

/// A byte sink a [`super::StreamWriter`] pushes bytes into.
pub trait WriteBackend {
    /// Append `buf` in full, or fail. A short write is not a partial
    /// success: either all of `buf` lands or an error is returned.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Remaining capacity in bytes, if this sink is bounded. `None` means
    /// unbounded (a `Vec`-backed sink, or a file where disk exhaustion
    /// surfaces as an I/O error instead).
    fn remaining_capacity(&self) -> Option<u64>;

    /// Flush any internal buffering. Most in-memory sinks are no-ops here.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An in-memory, borrowed read backend over a byte slice.
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        SliceSource { data, pos: 0 }
    }
}

impl<'a> ReadBackend for SliceSource<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = std::cmp::min(buf.len(), self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn remaining_bytes(&self) -> Option<u64> {
        Some((self.data.len() - self.pos) as u64)
    }
}

/// An in-memory, owned write backend, optionally capacity-bounded.
pub struct VecSink {
    buf: Vec<u8>,
    cap: Option<usize>,
}

impl VecSink {
    /// An unbounded sink that grows forever.
    pub fn new() -> Self {
        VecSink { buf: Vec::new(), cap: None }
    }

    /// A sink that fails writes with `Full` once `cap` bytes have been written.
    pub fn with_capacity(cap: usize) -> Self {
        VecSink { buf: Vec::with_capacity(cap), cap: Some(cap) }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

impl Default for VecSink {
    fn default() -> Self {
        VecSink::new()
    }
}

impl WriteBackend for VecSink {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if let Some(cap) = self.cap {
            if self.buf.len() + buf.len() > cap {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "sink capacity exceeded"));
            }
        }
        self.buf.extend_from_slice(buf);
        Ok(())
    }

    fn remaining_capacity(&self) -> Option<u64> {
        self.cap.map(|cap| (cap - self.buf.len()) as u64)
    }
}

impl ReadBackend for std::fs::File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(self, buf)
    }

    fn remaining_bytes(&self) -> Option<u64> {
        // `std::fs::File::stream_position` needs `&mut self` to seek, which
        // would perturb the read position from behind a shared reference.
        // Computing this without a dedicated cursor would be unsound, so the
        // file backend reports "unsupported" per spec.
        None
    }
}

impl WriteBackend for std::fs::File {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        io::Write::write_all(self, buf)
    }

    fn remaining_capacity(&self) -> Option<u64> {
        None
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(self)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_source_reports_remaining() {
        let data = [1u8, 2, 3, 4];
        let mut src = SliceSource::new(&data);
        assert_eq!(src.remaining_bytes(), Some(4));
        let mut buf = [0u8; 2];
        assert_eq!(src.read(&mut buf).unwrap(), 2);
        assert_eq!(src.remaining_bytes(), Some(2));
    }

    #[test]
    fn vec_sink_enforces_capacity() {
        let mut sink = VecSink::with_capacity(2);
        sink.write_all(&[1, 2]).unwrap();
        assert!(sink.write_all(&[3]).is_err());
    }
}
