// Copyright 2013-2014 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `ObjectInfoResponse`: a bounded, fragmentable dump of one object's
//! subindex metadata, for remote dictionary browsing.
//!
//! See the module's wire layout doc on [`ObjectInfoResponse::serialize`]
//! for the exact byte layout; it must stay in lockstep with
//! [`ObjectInfoResponse::deserialize`].

use crate::cood::error::SdoAbortCode;
use crate::cood::types::{Attributes, DataType, ObjectCode};
use crate::stream::{ReadBackend, StreamReader, StreamWriter, WriteBackend};

/// Per-subindex metadata as reported by the dictionary; produced by
/// whatever owns the live object (see [`SubindexSource`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubindexDescriptor {
    pub subindex: u8,
    /// `None` means the subindex is reserved/unused within the object's
    /// declared range.
    pub value: Option<SubindexValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubindexValue {
    pub data_type: DataType,
    pub attributes: Attributes,
    pub max_size_bits: u64,
    pub name: Option<String>,
    pub asm: Option<Vec<u8>>,
}

/// What [`ObjectInfoResponse::construct`] needs from a live object. Kept
/// separate from [`super::object::Variable`] / [`super::object::Array`] so
/// metadata description does not require going through their notifier or
/// lock machinery.
pub trait SubindexSource {
    fn object_code(&self) -> ObjectCode;
    fn data_type(&self) -> DataType;
    fn name(&self) -> Option<&str>;
    /// `1..=256`; `256` is represented as `0` in the wire field and restored
    /// on read (see [`ObjectInfoResponse::serialize`]).
    fn max_nb_of_subindices(&self) -> u16;
    fn describe_subindex(&self, subindex: u8) -> SubindexDescriptor;
}

fn descriptor_wire_size(include_names: bool, include_asm: bool, d: &SubindexDescriptor) -> u64 {
    let Some(v) = &d.value else {
        return 1; // flags byte only
    };
    let mut bits = 8 + 16 + 16; // flags, data_type, attributes
    bits += if v.max_size_bits <= u8::MAX as u64 { 8 } else { 32 };
    if include_names {
        if let Some(name) = &v.name {
            bits += (name.len() as u64 + 1) * 8;
        }
    }
    if include_asm {
        if let Some(asm) = &v.asm {
            bits += if asm.len() <= u8::MAX as usize { 8 } else { 32 };
            bits += asm.len() as u64 * 8;
        }
    }
    bits / 8
}

/// A constructed or deserialized object-info response. See module docs for
/// the wire layout.
#[derive(Debug, Clone)]
pub struct ObjectInfoResponse {
    result: SdoAbortCode,
    object_code: ObjectCode,
    data_type: DataType,
    name: Option<String>,
    include_names: bool,
    include_asm: bool,
    max_nb_of_subindices: u16,
    first_subindex: u8,
    last_queried_subindex: u8,
    compact_array: bool,
    descriptors: Vec<SubindexDescriptor>,
    moved_from: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    #[error("no space for even one subindex descriptor")]
    NoSpaceForOneSubindex,
    #[error("fragment cannot be merged: result is not OK on this or the fragment")]
    NotOk,
    #[error("fragment cannot be merged: this response has been moved-from")]
    MovedFrom,
    #[error("fragment cannot be merged: this response is already complete")]
    AlreadyComplete,
    #[error("fragment cannot be merged: structural mismatch")]
    StructuralMismatch,
    #[error("fragment cannot be merged: non-contiguous first_subindex")]
    NonContiguous,
    #[error("fragment cannot be merged: would overflow capacity")]
    Overflow,
    #[error("malformed wire data")]
    Malformed,
}

pub type Result<T> = std::result::Result<T, Error>;

impl ObjectInfoResponse {
    /// Builds a response for `object` covering as much of
    /// `[first_subindex, last_subindex]` as fits in
    /// `max_response_size_bytes - return_stack_size_bytes`, per spec §4.7.
    pub fn construct<S: SubindexSource>(
        object: &S,
        mut first_subindex: u8,
        mut last_subindex: u8,
        include_names: bool,
        include_asm: bool,
        max_response_size_bytes: u64,
        return_stack_size_bytes: u64,
    ) -> Result<Self> {
        let max_nb = object.max_nb_of_subindices();
        let max_si = (max_nb.min(256) - 1) as u8;
        if first_subindex > max_si {
            first_subindex = max_si;
        }
        if last_subindex > max_si {
            last_subindex = max_si;
        }

        let compact_array = object.object_code() == ObjectCode::Array && !include_asm;
        let requested_last_subindex = last_subindex;
        let loop_last_subindex = if compact_array {
            // Only SI0 and (if queried) SI1 are distinguishable; everything
            // past SI1 shares SI1's metadata.
            last_subindex.min(1)
        } else {
            last_subindex
        };

        // Fixed header: result(4) + flags(1) + object_code(1) + type(2)
        // + [name] + max_nb(2) + first_subindex(1) + descriptor_count(2).
        let mut header_bits: u64 = (4 + 1 + 1 + 2) * 8;
        if include_names {
            if let Some(name) = object.name() {
                header_bits += (name.len() as u64 + 1) * 8;
            }
        }
        header_bits += (2 + 1 + 2) * 8;

        let budget_bytes = max_response_size_bytes
            .saturating_sub(header_bits / 8)
            .saturating_sub(return_stack_size_bytes);

        let mut descriptors = Vec::new();
        let mut used_bytes = 0u64;
        let mut subindex = first_subindex;
        loop {
            let d = object.describe_subindex(subindex);
            let size = descriptor_wire_size(include_names, include_asm, &d);
            if !descriptors.is_empty() && used_bytes + size > budget_bytes {
                break;
            }
            used_bytes += size;
            descriptors.push(d);
            if subindex == loop_last_subindex {
                break;
            }
            subindex += 1;
        }
        if descriptors.is_empty() {
            return Err(Error::NoSpaceForOneSubindex);
        }

        let last_stored = descriptors.last().unwrap().subindex;
        // Once the compact representative (SI1) has been captured, the
        // response is understood to cover the whole originally requested
        // range, even though only two descriptors are stored on the wire.
        let last_queried_subindex =
            if compact_array && last_stored >= loop_last_subindex { requested_last_subindex } else { last_stored };

        Ok(ObjectInfoResponse {
            result: SdoAbortCode::Ok,
            object_code: object.object_code(),
            data_type: object.data_type(),
            name: object.name().map(String::from),
            include_names,
            include_asm,
            max_nb_of_subindices: max_nb,
            first_subindex,
            last_queried_subindex,
            compact_array,
            descriptors,
            moved_from: false,
        })
    }

    pub fn result(&self) -> SdoAbortCode {
        self.result
    }

    pub fn object_code(&self) -> ObjectCode {
        self.object_code
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn max_nb_of_subindices(&self) -> u16 {
        self.max_nb_of_subindices
    }

    pub fn first_subindex(&self) -> u8 {
        self.first_subindex
    }

    pub fn get_last_queried_subindex(&self) -> u8 {
        self.last_queried_subindex
    }

    pub fn descriptors(&self) -> &[SubindexDescriptor] {
        &self.descriptors
    }

    fn max_queryable_subindex(&self) -> u8 {
        (self.max_nb_of_subindices.min(256) - 1) as u8
    }

    /// Returns whether the full range is covered; if not, writes the next
    /// subindex to query into `out_next`.
    pub fn is_complete(&self, out_next: Option<&mut u8>) -> bool {
        let max_q = self.max_queryable_subindex();
        let complete = self.last_queried_subindex >= max_q;
        if !complete {
            if let Some(out) = out_next {
                *out = self.last_queried_subindex + 1;
            }
        }
        complete
    }

    /// Returns the subindex one past the last queried one, regardless of
    /// completeness.
    pub fn next_subindex(&self) -> u8 {
        self.last_queried_subindex.saturating_add(1)
    }

    /// Merges a contiguous follow-up fragment into `self`, emptying `other`.
    pub fn add_fragment(&mut self, other: &mut ObjectInfoResponse) -> Result<()> {
        if self.moved_from || other.moved_from {
            return Err(Error::MovedFrom);
        }
        if self.result != SdoAbortCode::Ok || other.result != SdoAbortCode::Ok {
            return Err(Error::NotOk);
        }
        {
            let mut next = 0u8;
            if self.is_complete(Some(&mut next)) {
                return Err(Error::AlreadyComplete);
            }
        }
        if other.first_subindex != self.next_subindex() {
            return Err(Error::NonContiguous);
        }
        if self.object_code != other.object_code
            || self.data_type != other.data_type
            || self.max_nb_of_subindices != other.max_nb_of_subindices
            || self.include_names != other.include_names
            || self.include_asm != other.include_asm
            || self.compact_array != other.compact_array
        {
            return Err(Error::StructuralMismatch);
        }
        if self.compact_array && !self.descriptors.is_empty() && self.descriptors.len() + other.descriptors.len() > 2 {
            return Err(Error::Overflow);
        }

        self.last_queried_subindex = other.last_queried_subindex;
        self.descriptors.append(&mut other.descriptors);
        other.moved_from = true;
        Ok(())
    }

    /// For ARRAY + `!include_asm`, any subindex `>= 1` maps onto the single
    /// stored SI1 representative.
    pub fn get_subidx_name(&self, subindex: u8) -> Option<String> {
        if self.compact_array && subindex >= 1 {
            return self
                .descriptors
                .iter()
                .find(|d| d.subindex == 1)
                .and_then(|d| d.value.as_ref())
                .map(|_| format!("Subindex {subindex}"));
        }
        self.descriptors
            .iter()
            .find(|d| d.subindex == subindex)
            .and_then(|d| d.value.as_ref())
            .and_then(|v| v.name.clone())
    }

    /// Byte-exact serialization per §6 of the wire layout doc.
    pub fn serialize<B: WriteBackend>(&self, writer: &mut StreamWriter<B>) -> Result<()> {
        writer.write_u32(self.result.as_u32()).map_err(|_| Error::Malformed)?;
        if self.result != SdoAbortCode::Ok {
            return Ok(());
        }
        let flags = (self.include_names as u8) | ((self.include_asm as u8) << 1);
        writer.write_u8(flags).map_err(|_| Error::Malformed)?;
        writer.write_u8(self.object_code as u8).map_err(|_| Error::Malformed)?;
        writer.write_u16(self.data_type_wire()).map_err(|_| Error::Malformed)?;
        if self.include_names {
            if let Some(name) = &self.name {
                writer.write_string(name).map_err(|_| Error::Malformed)?;
            }
        }
        let max_nb_wire = if self.max_nb_of_subindices == 256 { 0 } else { self.max_nb_of_subindices };
        writer.write_u16(max_nb_wire).map_err(|_| Error::Malformed)?;
        writer.write_u8(self.first_subindex).map_err(|_| Error::Malformed)?;
        writer.write_u16(self.descriptors.len() as u16).map_err(|_| Error::Malformed)?;
        for d in &self.descriptors {
            self.serialize_descriptor(d, writer)?;
        }
        Ok(())
    }

    fn data_type_wire(&self) -> u16 {
        self.data_type.wire_bits() as u16
    }

    fn serialize_descriptor<B: WriteBackend>(&self, d: &SubindexDescriptor, writer: &mut StreamWriter<B>) -> Result<()> {
        let Some(v) = &d.value else {
            return writer.write_u8(0b0000_0001).map_err(|_| Error::Malformed);
        };
        let max_size_u8 = v.max_size_bits <= u8::MAX as u64;
        let carries_name = self.include_names && v.name.is_some() && self.name_carried_for(d);
        let carries_asm = self.include_asm && v.asm.is_some();
        let asm_size_u8 = carries_asm && v.asm.as_ref().unwrap().len() <= u8::MAX as usize;

        let flags = (carries_name as u8) << 1
            | (carries_asm as u8) << 2
            | (max_size_u8 as u8) << 3
            | (asm_size_u8 as u8) << 4;
        writer.write_u8(flags).map_err(|_| Error::Malformed)?;
        writer.write_u16(v.data_type.wire_bits() as u16).map_err(|_| Error::Malformed)?;
        writer.write_u16(v.attributes.bits()).map_err(|_| Error::Malformed)?;
        if max_size_u8 {
            writer.write_u8(v.max_size_bits as u8).map_err(|_| Error::Malformed)?;
        } else {
            writer.write_u32(v.max_size_bits as u32).map_err(|_| Error::Malformed)?;
        }
        if carries_name {
            writer.write_string(v.name.as_ref().unwrap()).map_err(|_| Error::Malformed)?;
        }
        if carries_asm {
            let asm = v.asm.as_ref().unwrap();
            if asm_size_u8 {
                writer.write_u8(asm.len() as u8).map_err(|_| Error::Malformed)?;
            } else {
                writer.write_u32(asm.len() as u32).map_err(|_| Error::Malformed)?;
            }
            writer.write_bytes(asm).map_err(|_| Error::Malformed)?;
        }
        Ok(())
    }

    /// For a compact ARRAY, only the SI0 descriptor ever carries a real
    /// name; the SI1 representative's name (if any) is synthesized on
    /// lookup instead (see [`Self::get_subidx_name`]).
    fn name_carried_for(&self, d: &SubindexDescriptor) -> bool {
        !self.compact_array || d.subindex == 0
    }

    pub fn deserialize<B: ReadBackend>(reader: &mut StreamReader<B>) -> Result<Self> {
        let result_raw = reader.read_u32().map_err(|_| Error::Malformed)?;
        let result = SdoAbortCode::from_u32(result_raw).ok_or(Error::Malformed)?;
        if result != SdoAbortCode::Ok {
            return Ok(ObjectInfoResponse {
                result,
                object_code: ObjectCode::Null,
                data_type: DataType::Unsigned8,
                name: None,
                include_names: false,
                include_asm: false,
                max_nb_of_subindices: 1,
                first_subindex: 0,
                last_queried_subindex: 0,
                compact_array: false,
                descriptors: Vec::new(),
                moved_from: false,
            });
        }

        let flags = reader.read_u8().map_err(|_| Error::Malformed)?;
        let include_names = flags & 0b01 != 0;
        let include_asm = flags & 0b10 != 0;
        let object_code_raw = reader.read_u8().map_err(|_| Error::Malformed)?;
        let object_code = ObjectCode::try_from(object_code_raw).map_err(|_| Error::Malformed)?;
        let data_type_wire = reader.read_u16().map_err(|_| Error::Malformed)?;
        let data_type = wire_bits_to_data_type(data_type_wire).ok_or(Error::Malformed)?;
        let name = if include_names {
            Some(reader.read_string().map_err(|_| Error::Malformed)?)
        } else {
            None
        };
        let max_nb_raw = reader.read_u16().map_err(|_| Error::Malformed)?;
        let max_nb_of_subindices = if max_nb_raw == 0 { 256 } else { max_nb_raw };
        let first_subindex = reader.read_u8().map_err(|_| Error::Malformed)?;
        let descriptor_count = reader.read_u16().map_err(|_| Error::Malformed)?;
        if descriptor_count == 0 {
            return Err(Error::Malformed);
        }

        let compact_array = object_code == ObjectCode::Array && !include_asm;
        let mut descriptors = Vec::with_capacity(descriptor_count as usize);
        let mut subindex = first_subindex;
        for _ in 0..descriptor_count {
            let d = Self::deserialize_descriptor(reader, subindex, include_names, include_asm)?;
            descriptors.push(d);
            subindex = subindex.saturating_add(1);
        }
        let last_queried_subindex = descriptors.last().unwrap().subindex;

        Ok(ObjectInfoResponse {
            result,
            object_code,
            data_type,
            name,
            include_names,
            include_asm,
            max_nb_of_subindices,
            first_subindex,
            last_queried_subindex,
            compact_array,
            descriptors,
            moved_from: false,
        })
    }

    fn deserialize_descriptor<B: ReadBackend>(
        reader: &mut StreamReader<B>,
        subindex: u8,
        include_names: bool,
        include_asm: bool,
    ) -> Result<SubindexDescriptor> {
        let flags = reader.read_u8().map_err(|_| Error::Malformed)?;
        if flags & 0b0000_0001 != 0 {
            return Ok(SubindexDescriptor { subindex, value: None });
        }
        let carries_name = include_names && flags & 0b0000_0010 != 0;
        let carries_asm = include_asm && flags & 0b0000_0100 != 0;
        let max_size_u8 = flags & 0b0000_1000 != 0;
        let asm_size_u8 = flags & 0b0001_0000 != 0;

        let data_type_wire = reader.read_u16().map_err(|_| Error::Malformed)?;
        let data_type = wire_bits_to_data_type(data_type_wire).ok_or(Error::Malformed)?;
        let attributes = Attributes::from_bits_truncate(reader.read_u16().map_err(|_| Error::Malformed)?);
        let max_size_bits = if max_size_u8 {
            reader.read_u8().map_err(|_| Error::Malformed)? as u64
        } else {
            reader.read_u32().map_err(|_| Error::Malformed)? as u64
        };
        let name = if carries_name { Some(reader.read_string().map_err(|_| Error::Malformed)?) } else { None };
        let asm = if carries_asm {
            let len = if asm_size_u8 {
                reader.read_u8().map_err(|_| Error::Malformed)? as usize
            } else {
                reader.read_u32().map_err(|_| Error::Malformed)? as usize
            };
            Some(reader.read_bytes(len).map_err(|_| Error::Malformed)?)
        } else {
            None
        };

        Ok(SubindexDescriptor {
            subindex,
            value: Some(SubindexValue { data_type, attributes, max_size_bits, name, asm }),
        })
    }
}

fn wire_bits_to_data_type(wire_bits: u16) -> Option<DataType> {
    // The wire carries a bit-width tag, not a CiA 301 type-index; this core
    // only needs enough fidelity to round-trip its own descriptors.
    Some(match wire_bits {
        1 => DataType::Bit1,
        2 => DataType::Bit2,
        3 => DataType::Bit3,
        4 => DataType::Bit4,
        5 => DataType::Bit5,
        6 => DataType::Bit6,
        7 => DataType::Bit7,
        8 => DataType::Unsigned8,
        16 => DataType::Unsigned16,
        32 => DataType::Unsigned32,
        64 => DataType::Unsigned64,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{Endian, SliceSource, VecSink};

    struct FakeArray {
        max_nb: u16,
    }

    impl SubindexSource for FakeArray {
        fn object_code(&self) -> ObjectCode {
            ObjectCode::Array
        }
        fn data_type(&self) -> DataType {
            DataType::Unsigned8
        }
        fn name(&self) -> Option<&str> {
            Some("TestArray")
        }
        fn max_nb_of_subindices(&self) -> u16 {
            self.max_nb
        }
        fn describe_subindex(&self, subindex: u8) -> SubindexDescriptor {
            SubindexDescriptor {
                subindex,
                value: Some(SubindexValue {
                    data_type: DataType::Unsigned8,
                    attributes: Attributes::ANY_READ,
                    max_size_bits: 8,
                    name: if subindex == 0 { Some("NumberOfEntries".into()) } else { Some("Element".into()) },
                    asm: None,
                }),
            }
        }
    }

    struct FakeRecord {
        max_nb: u16,
    }

    impl SubindexSource for FakeRecord {
        fn object_code(&self) -> ObjectCode {
            ObjectCode::Record
        }
        fn data_type(&self) -> DataType {
            DataType::Unsigned8
        }
        fn name(&self) -> Option<&str> {
            None
        }
        fn max_nb_of_subindices(&self) -> u16 {
            self.max_nb
        }
        fn describe_subindex(&self, subindex: u8) -> SubindexDescriptor {
            SubindexDescriptor {
                subindex,
                value: Some(SubindexValue {
                    data_type: DataType::Unsigned8,
                    attributes: Attributes::ANY_READ,
                    max_size_bits: 8,
                    name: None,
                    asm: None,
                }),
            }
        }
    }

    #[test]
    fn scenario_s5_compact_array() {
        let obj = FakeArray { max_nb: 10 };
        let resp = ObjectInfoResponse::construct(&obj, 0, 9, false, false, 4096, 0).unwrap();
        assert_eq!(resp.descriptors().len(), 2);
        assert_eq!(resp.descriptors()[0].subindex, 0);
        assert_eq!(resp.descriptors()[1].subindex, 1);
        let mut next = 0;
        assert!(resp.is_complete(Some(&mut next)));
        assert_eq!(resp.get_last_queried_subindex(), 9);
    }

    #[test]
    fn scenario_s6_record_fragmentation() {
        let obj = FakeRecord { max_nb: 4 };
        // Budget sized so exactly 2 six-byte descriptors fit per message.
        let mut first = ObjectInfoResponse::construct(&obj, 0, 3, false, false, 30, 0).unwrap();
        assert_eq!(first.descriptors().iter().map(|d| d.subindex).collect::<Vec<_>>(), vec![0, 1]);
        let mut next = 0;
        assert!(!first.is_complete(Some(&mut next)));
        assert_eq!(next, 2);

        let mut second = ObjectInfoResponse::construct(&obj, next, 3, false, false, 30, 0).unwrap();
        first.add_fragment(&mut second).unwrap();

        let mut n2 = 0;
        assert!(first.is_complete(Some(&mut n2)));
        assert_eq!(first.descriptors().iter().map(|d| d.subindex).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn serialize_deserialize_roundtrip_error_result() {
        let resp = ObjectInfoResponse {
            result: SdoAbortCode::SubindexDoesNotExist,
            object_code: ObjectCode::Null,
            data_type: DataType::Unsigned8,
            name: None,
            include_names: false,
            include_asm: false,
            max_nb_of_subindices: 1,
            first_subindex: 0,
            last_queried_subindex: 0,
            compact_array: false,
            descriptors: Vec::new(),
            moved_from: false,
        };
        let mut w = StreamWriter::new(VecSink::new(), Endian::Little);
        resp.serialize(&mut w).unwrap();
        w.close().unwrap();
        let bytes = w.into_inner().into_inner();
        assert_eq!(bytes.len(), 4);

        let mut r = StreamReader::new(SliceSource::new(&bytes), Endian::Little);
        let back = ObjectInfoResponse::deserialize(&mut r).unwrap();
        assert_eq!(back.result(), SdoAbortCode::SubindexDoesNotExist);
    }

    #[test]
    fn add_fragment_rejects_non_contiguous() {
        let obj = FakeRecord { max_nb: 4 };
        let mut first = ObjectInfoResponse::construct(&obj, 0, 1, false, false, 4096, 0).unwrap();
        let mut not_next = ObjectInfoResponse::construct(&obj, 3, 3, false, false, 4096, 0).unwrap();
        assert_eq!(first.add_fragment(&mut not_next), Err(Error::NonContiguous));
    }
}
