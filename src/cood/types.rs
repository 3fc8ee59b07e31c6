// Copyright 2013-2014 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CANopen primitive data types, object codes and subindex attributes.

use bitflags::bitflags;

/// A CANopen primitive data type code.
///
/// Each variant has a fixed [`DataType::wire_bits`] (bits on the wire; `0`
/// if unsupported by this core) and [`DataType::native_bits`] (bits in the
/// in-process representation, which may differ for bit-packed types).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Integer8,
    Integer16,
    Integer32,
    Integer64,
    Unsigned8,
    Unsigned16,
    Unsigned32,
    Unsigned64,
    Real32,
    Real64,
    VisibleString,
    OctetString,
    UnicodeString,
    Bit1,
    Bit2,
    Bit3,
    Bit4,
    Bit5,
    Bit6,
    Bit7,
    Bit8,
    /// A single bit on the wire, stored natively as a full bit-packed unit
    /// (unlike [`DataType::Boolean`], which is native-byte-sized).
    BooleanNativeBit1,
}

impl DataType {
    /// Bits occupied on the wire by one element of this type. `0` for a
    /// type this core does not support encoding/decoding for.
    pub const fn wire_bits(self) -> u32 {
        use DataType::*;
        match self {
            Boolean | Bit1 | BooleanNativeBit1 => 1,
            Bit2 => 2,
            Bit3 => 3,
            Bit4 => 4,
            Bit5 => 5,
            Bit6 => 6,
            Bit7 => 7,
            Integer8 | Unsigned8 | Bit8 | OctetString => 8,
            Integer16 | Unsigned16 | UnicodeString => 16,
            Integer32 | Unsigned32 | Real32 => 32,
            Integer64 | Unsigned64 | Real64 => 64,
            VisibleString => 8,
        }
    }

    /// Bits occupied by one element in the native in-process representation.
    pub const fn native_bits(self) -> u32 {
        use DataType::*;
        match self {
            Bit1 | BooleanNativeBit1 => 1,
            Bit2 => 2,
            Bit3 => 3,
            Bit4 => 4,
            Bit5 => 5,
            Bit6 => 6,
            Bit7 => 7,
            Bit8 => 8,
            Boolean => 8,
            Integer8 | Unsigned8 | OctetString | VisibleString => 8,
            Integer16 | Unsigned16 | UnicodeString => 16,
            Integer32 | Unsigned32 | Real32 => 32,
            Integer64 | Unsigned64 | Real64 => 64,
        }
    }

    /// Whether elements of this type are packed sub-byte in native storage
    /// (i.e. multiple elements share a byte), as opposed to being stored
    /// one-per-byte-or-more like [`DataType::Boolean`].
    pub const fn is_bit_packed(self) -> bool {
        use DataType::*;
        matches!(self, Bit1 | Bit2 | Bit3 | Bit4 | Bit5 | Bit6 | Bit7 | Bit8 | BooleanNativeBit1)
    }

    pub const fn is_string(self) -> bool {
        matches!(self, DataType::VisibleString | DataType::UnicodeString)
    }
}

/// The CANopen object code, CiA 301 numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectCode {
    Null = 0,
    Domain = 2,
    DefType = 5,
    DefStruct = 6,
    Variable = 7,
    Array = 8,
    Record = 9,
}

impl TryFrom<u8> for ObjectCode {
    type Error = ();

    fn try_from(v: u8) -> Result<Self, ()> {
        Ok(match v {
            0 => ObjectCode::Null,
            2 => ObjectCode::Domain,
            5 => ObjectCode::DefType,
            6 => ObjectCode::DefStruct,
            7 => ObjectCode::Variable,
            8 => ObjectCode::Array,
            9 => ObjectCode::Record,
            _ => return Err(()),
        })
    }
}

bitflags! {
    /// Subindex access-rights bitmask: which CANopen NMT states allow
    /// reading/writing, plus the mapping and persistence flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Attributes: u16 {
        const READ_PREOP  = 1 << 0;
        const READ_SAFEOP = 1 << 1;
        const READ_OP     = 1 << 2;
        const WRITE_PREOP = 1 << 3;
        const WRITE_SAFEOP= 1 << 4;
        const WRITE_OP    = 1 << 5;
        const RX_MAP      = 1 << 6;
        const TX_MAP      = 1 << 7;
        const BACKUP      = 1 << 8;
        const SETTINGS    = 1 << 9;
    }
}

impl Attributes {
    pub const ANY_READ: Attributes = Attributes::READ_PREOP
        .union(Attributes::READ_SAFEOP)
        .union(Attributes::READ_OP);
    pub const ANY_WRITE: Attributes = Attributes::WRITE_PREOP
        .union(Attributes::WRITE_SAFEOP)
        .union(Attributes::WRITE_OP);
    /// Readable in every state and never writable.
    pub const READ_CONST: Attributes = Attributes::ANY_READ;

    /// Whether `requested` grants read access under this attribute set.
    pub fn permits_read(self, requested: Attributes) -> bool {
        self.intersects(Attributes::ANY_READ & requested)
    }

    /// Whether `requested` grants write access under this attribute set.
    pub fn permits_write(self, requested: Attributes) -> bool {
        self.intersects(Attributes::ANY_WRITE & requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_and_native_bits_differ_for_bit_packed_types() {
        assert_eq!(DataType::Bit3.wire_bits(), 3);
        assert_eq!(DataType::Bit3.native_bits(), 3);
        assert_eq!(DataType::Boolean.wire_bits(), 1);
        assert_eq!(DataType::Boolean.native_bits(), 8);
        assert!(DataType::Bit3.is_bit_packed());
        assert!(!DataType::Boolean.is_bit_packed());
    }

    #[test]
    fn permission_matrix_property_9() {
        for attrs in [
            Attributes::empty(),
            Attributes::READ_OP,
            Attributes::WRITE_OP,
            Attributes::READ_OP | Attributes::WRITE_OP,
            Attributes::ANY_READ | Attributes::ANY_WRITE,
        ] {
            for req in [Attributes::READ_OP, Attributes::WRITE_OP, Attributes::ANY_READ | Attributes::ANY_WRITE] {
                let expect_read = (attrs & req & Attributes::ANY_READ) != Attributes::empty();
                let expect_write = (attrs & req & Attributes::ANY_WRITE) != Attributes::empty();
                assert_eq!(attrs.permits_read(req), expect_read, "attrs={attrs:?} req={req:?}");
                assert_eq!(attrs.permits_write(req), expect_write, "attrs={attrs:?} req={req:?}");
            }
        }
    }
}
