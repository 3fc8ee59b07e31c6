// Copyright 2013-2014 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A fixed 8-byte `(id, info)` record used by upper-layer SDO multiplexers
//! to remember which client request a response belongs to. The core only
//! carries these opaquely: it reserves wire space for them and moves them
//! between requests and responses, never interpreting `id`/`info`.

use crate::stream::{self, ReadBackend, StreamReader, StreamWriter, WriteBackend};

pub const WIRE_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReturnStackItem {
    pub id: u32,
    pub info: u32,
}

impl ReturnStackItem {
    pub const fn new(id: u32, info: u32) -> Self {
        ReturnStackItem { id, info }
    }

    pub fn write<B: WriteBackend>(&self, writer: &mut StreamWriter<B>) -> Result<(), stream::Error> {
        writer.write_u32(self.id)?;
        writer.write_u32(self.info)?;
        Ok(())
    }

    pub fn read<B: ReadBackend>(reader: &mut StreamReader<B>) -> Result<Self, stream::Error> {
        let id = reader.read_u32()?;
        let info = reader.read_u32()?;
        Ok(ReturnStackItem { id, info })
    }
}

/// Pushes `items` onto `writer` in order (last pushed ends up nearest the
/// stream's current write position, i.e. will be the first popped by a
/// symmetric reader walking the same direction).
pub fn push_all<B: WriteBackend>(items: &[ReturnStackItem], writer: &mut StreamWriter<B>) -> Result<(), stream::Error> {
    for item in items {
        item.write(writer)?;
    }
    Ok(())
}

/// Pops exactly `count` items off `reader`.
pub fn pop_n<B: ReadBackend>(reader: &mut StreamReader<B>, count: usize) -> Result<Vec<ReturnStackItem>, stream::Error> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(ReturnStackItem::read(reader)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{Endian, SliceSource, VecSink};

    #[test]
    fn roundtrips_through_stream() {
        let items = [ReturnStackItem::new(1, 2), ReturnStackItem::new(0xDEAD_BEEF, 0xCAFE_BABE)];
        let mut w = StreamWriter::new(VecSink::new(), Endian::Little);
        push_all(&items, &mut w).unwrap();
        w.close().unwrap();
        let bytes = w.into_inner().into_inner();
        assert_eq!(bytes.len(), items.len() * WIRE_SIZE);

        let mut r = StreamReader::new(SliceSource::new(&bytes), Endian::Little);
        let popped = pop_n(&mut r, items.len()).unwrap();
        assert_eq!(popped, items);
    }
}
