// Copyright 2013-2014 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! VARIABLE and ARRAY dictionary objects: permission-checked subindex
//! read/write over the wire codec, plus complete access for ARRAY.
//!
//! An object owns its native-form storage directly rather than borrowing it
//! through a raw pointer the way the originating design did; the optional
//! `data_mutex` still exists and still serializes the notifier callbacks and
//! the storage mutation behind it; `storage` is read without extra locking
//! whenever the object's attributes never grant write access, since a value
//! that can't be written is trivially safe to share.

use std::cell::UnsafeCell;

use crate::cood::codec;
use crate::cood::error::{Error, Result, SdoAbortCode};
use crate::cood::types::{Attributes, DataType};
use crate::lock::RwLock;
use crate::stream::{ReadBackend, StreamReader, StreamWriter, WriteBackend};

/// Access-control and mutation notifications for a dictionary object.
///
/// `index`/`subindex` identify the access from the owner's point of view;
/// the object itself does not know its own dictionary index (index
/// registries are out of scope for this core — see the crate-level docs).
pub trait Notifiable {
    fn on_before_read(&self, index: u16, subindex: u8, complete: bool, size_query: bool) -> SdoAbortCode {
        let _ = (index, subindex, complete, size_query);
        SdoAbortCode::Ok
    }

    fn on_before_write(
        &self,
        index: u16,
        subindex: u8,
        complete: bool,
        new_si0: u8,
        shadow: &[u8],
    ) -> SdoAbortCode {
        let _ = (index, subindex, complete, new_si0, shadow);
        SdoAbortCode::Ok
    }

    /// Must not panic: per spec, a throwing after-write notifier is a fatal
    /// logic error. Implementations that need to signal failure here have
    /// already missed their chance in `on_before_write`.
    fn on_after_write(&self, index: u16, subindex: u8, complete: bool) {
        let _ = (index, subindex, complete);
    }
}

/// A [`Notifiable`] that approves everything and does nothing; useful for
/// objects with no interesting side effects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifiable for NullNotifier {}

fn require_before_read<N: Notifiable>(n: &N, index: u16, subindex: u8, complete: bool, size_query: bool) -> Result<()> {
    let code = n.on_before_read(index, subindex, complete, size_query);
    if code.is_ok() {
        Ok(())
    } else {
        Err(Error::try_from(code).unwrap_or(Error::GeneralError))
    }
}

fn require_before_write<N: Notifiable>(
    n: &N,
    index: u16,
    subindex: u8,
    complete: bool,
    new_si0: u8,
    shadow: &[u8],
) -> Result<()> {
    let code = n.on_before_write(index, subindex, complete, new_si0, shadow);
    if code.is_ok() {
        Ok(())
    } else {
        Err(Error::try_from(code).unwrap_or(Error::GeneralError))
    }
}

/// A scalar (or fixed-length string/array-of-bytes) CANopen object living at
/// subindex 0 only.
pub struct Variable<N: Notifiable> {
    data_type: DataType,
    n_elements: u32,
    attributes: Attributes,
    name: Option<String>,
    storage: UnsafeCell<Vec<u8>>,
    data_mutex: Option<RwLock>,
    notifier: N,
}

// SAFETY: `storage` is only mutated through `&mut self` constructors or
// while holding `data_mutex`'s write-lock; reads either hold its read-lock
// or the object is provably immutable (no write attribute is ever granted).
unsafe impl<N: Notifiable + Send> Send for Variable<N> {}
unsafe impl<N: Notifiable + Sync> Sync for Variable<N> {}

impl<N: Notifiable> Variable<N> {
    pub fn new(
        data_type: DataType,
        n_elements: u32,
        attributes: Attributes,
        name: Option<String>,
        initial: Vec<u8>,
        guarded: bool,
        notifier: N,
    ) -> Self {
        let data_mutex = if guarded { Some(RwLock::new()) } else { None };
        Variable {
            data_type,
            n_elements,
            attributes,
            name,
            storage: UnsafeCell::new(initial),
            data_mutex,
            notifier,
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn attributes(&self) -> Attributes {
        self.attributes
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn native_len(&self) -> usize {
        ((self.data_type.native_bits() as usize * self.n_elements as usize) + 7) / 8
    }

    pub fn read<B: WriteBackend>(
        &self,
        index: u16,
        subindex: u8,
        perms: Attributes,
        writer: &mut StreamWriter<B>,
    ) -> Result<()> {
        if subindex != 0 {
            return Err(Error::SubindexDoesNotExist);
        }
        if !self.attributes.permits_read(perms) {
            return Err(Error::AttemptToReadWrOnlyObject);
        }
        require_before_read(&self.notifier, index, 0, false, false)?;

        let _guard = self.data_mutex.as_ref().map(|l| l.read_guard());
        // SAFETY: a read-lock (or the mutex-free read-only invariant) is held.
        let storage = unsafe { &*self.storage.get() };
        native_to_encoded_checked(storage, self.data_type, self.n_elements, false, writer)
    }

    pub fn write<B: ReadBackend>(
        &self,
        index: u16,
        subindex: u8,
        perms: Attributes,
        reader: &mut StreamReader<B>,
    ) -> Result<()> {
        if subindex != 0 {
            return Err(Error::SubindexDoesNotExist);
        }
        if !self.attributes.permits_write(perms) {
            return Err(Error::AttemptToWriteRdOnlyObject);
        }

        let mut shadow = vec![0u8; self.native_len()];
        codec::encoded_to_native(reader, self.data_type, self.n_elements, false, &mut shadow)?;
        reader
            .ensure_all_consumed(crate::stream::Expectation::SevenOrLess)
            .map_err(Error::from)?;

        require_before_write(&self.notifier, index, 0, false, 0, &shadow)?;

        {
            let _guard = self.data_mutex.as_ref().map(|l| l.write_guard());
            // SAFETY: exclusive access via the write-lock, or no other
            // reader can observe this object as mutable (guarded == false
            // is only sound for objects the owner never shares across
            // threads while writable).
            let storage = unsafe { &mut *self.storage.get() };
            storage.copy_from_slice(&shadow);
        }
        self.notifier.on_after_write(index, 0, false);
        Ok(())
    }

    /// `complete=true` access is always rejected for VARIABLE objects.
    pub fn complete_access_unsupported(&self) -> Error {
        Error::UnsupportedAccessToObject
    }

    /// Current size in bits of subindex 0; for fixed types this is simply
    /// `native_bits * n_elements` re-expressed in wire bits. For
    /// `visible_string`, queries the notifier for the live length first.
    pub fn get_subidx_actual_size(&self, index: u16) -> Result<u64> {
        if self.data_type == DataType::VisibleString {
            require_before_read(&self.notifier, index, 0, false, true)?;
        }
        let _guard = self.data_mutex.as_ref().map(|l| l.read_guard());
        let storage = unsafe { &*self.storage.get() };
        codec::size_of_canopen_encoded(storage, self.data_type, self.n_elements)
    }
}

fn native_to_encoded_checked<B: WriteBackend>(
    native: &[u8],
    ty: DataType,
    n_elements: u32,
    complete: bool,
    writer: &mut StreamWriter<B>,
) -> Result<()> {
    codec::native_to_encoded(native, ty, n_elements, complete, writer)
}

/// Unpacks one bit-packed element from `storage` (LSB-first stuffing, per
/// spec §4.6): bit offset `(subindex-1) * bits_per_element`.
fn extract_bits(storage: &[u8], subindex1: u32, bits: u32) -> u32 {
    let offset = (subindex1) * bits;
    let byte = (offset / 8) as usize;
    let shift = offset % 8;
    let lo = storage[byte] as u32;
    let hi = storage.get(byte + 1).copied().unwrap_or(0) as u32;
    let combined = lo | (hi << 8);
    (combined >> shift) & ((1u32 << bits) - 1)
}

fn insert_bits(storage: &mut [u8], subindex1: u32, bits: u32, value: u32) {
    let offset = subindex1 * bits;
    let byte = (offset / 8) as usize;
    let shift = offset % 8;
    let mask = ((1u32 << bits) - 1) << shift;
    let value_shifted = (value << shift) & mask;

    if shift + bits <= 8 {
        storage[byte] = (storage[byte] & !(mask as u8)) | (value_shifted as u8);
    } else {
        let lo_mask = (mask & 0xFF) as u8;
        let hi_mask = (mask >> 8) as u8;
        storage[byte] = (storage[byte] & !lo_mask) | (value_shifted as u8);
        if byte + 1 < storage.len() {
            storage[byte + 1] = (storage[byte + 1] & !hi_mask) | ((value_shifted >> 8) as u8);
        }
    }
}

/// A homogeneous-element ARRAY object: SI0 is the live element count,
/// SI1..SI0 carry elements of `element_type`.
pub struct Array<N: Notifiable> {
    element_type: DataType,
    min_si0: u8,
    max_si0: u8,
    element_attributes: Attributes,
    si0_attributes: Attributes,
    name: Option<String>,
    si0: UnsafeCell<u8>,
    /// Bit-stuffed (for bit-packed types) or one-element-per-native-chunk
    /// storage for `max_si0` elements.
    storage: UnsafeCell<Vec<u8>>,
    data_mutex: Option<RwLock>,
    notifier: N,
}

unsafe impl<N: Notifiable + Send> Send for Array<N> {}
unsafe impl<N: Notifiable + Sync> Sync for Array<N> {}

impl<N: Notifiable> Array<N> {
    pub fn new(
        element_type: DataType,
        min_si0: u8,
        max_si0: u8,
        initial_si0: u8,
        element_attributes: Attributes,
        si0_attributes: Attributes,
        name: Option<String>,
        guarded: bool,
        notifier: N,
    ) -> Self {
        let storage_len = Self::storage_len(element_type, max_si0);
        let data_mutex = if guarded { Some(RwLock::new()) } else { None };
        Array {
            element_type,
            min_si0,
            max_si0,
            element_attributes,
            si0_attributes,
            name,
            si0: UnsafeCell::new(initial_si0),
            storage: UnsafeCell::new(vec![0u8; storage_len]),
            data_mutex,
            notifier,
        }
    }

    fn storage_len(ty: DataType, max_si0: u8) -> usize {
        if ty.is_bit_packed() {
            ((ty.native_bits() as usize * max_si0 as usize) + 7) / 8
        } else {
            ((ty.native_bits() as usize + 7) / 8) * max_si0 as usize
        }
    }

    pub fn element_type(&self) -> DataType {
        self.element_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn read_si0(&self) -> u8 {
        unsafe { *self.si0.get() }
    }

    pub fn read<B: WriteBackend>(
        &self,
        index: u16,
        subindex: u8,
        perms: Attributes,
        writer: &mut StreamWriter<B>,
    ) -> Result<()> {
        let guard = self.data_mutex.as_ref().map(|l| l.read_guard());
        if subindex == 0 {
            if !self.si0_attributes.permits_read(perms) {
                return Err(Error::AttemptToReadWrOnlyObject);
            }
            require_before_read(&self.notifier, index, 0, false, false)?;
            writer.write_u8(self.read_si0()).map_err(Error::from)?;
            return Ok(());
        }
        if subindex > self.read_si0() {
            return Err(Error::SubindexDoesNotExist);
        }
        if !self.element_attributes.permits_read(perms) {
            return Err(Error::AttemptToReadWrOnlyObject);
        }
        require_before_read(&self.notifier, index, subindex, false, false)?;

        let bits = self.element_type.native_bits();
        let storage = unsafe { &*self.storage.get() };
        if self.element_type.is_bit_packed() {
            let v = extract_bits(storage, (subindex - 1) as u32, bits);
            writer.write_bits(bits as u8, v as u8).map_err(Error::from)?;
        } else {
            let elem_bytes = ((bits + 7) / 8) as usize;
            let start = (subindex as usize - 1) * elem_bytes;
            let chunk = &storage[start..start + elem_bytes];
            codec::native_to_encoded(chunk, self.element_type, 1, false, writer)?;
        }
        drop(guard);
        Ok(())
    }

    pub fn write<B: ReadBackend>(
        &self,
        index: u16,
        subindex: u8,
        perms: Attributes,
        reader: &mut StreamReader<B>,
    ) -> Result<()> {
        if subindex == 0 {
            return self.write_si0(index, perms, reader);
        }

        let current_si0 = self.read_si0();
        if subindex > current_si0 {
            return Err(Error::SubindexDoesNotExist);
        }
        if !self.element_attributes.permits_write(perms) {
            return Err(Error::AttemptToWriteRdOnlyObject);
        }

        let bits = self.element_type.native_bits();
        let elem_bytes = ((bits + 7) / 8) as usize;
        let mut shadow_buf = [0u8; 8];
        let shadow = &mut shadow_buf[..elem_bytes.max(1)];
        if self.element_type.is_bit_packed() {
            shadow[0] = reader.read_bits(bits as u8).map_err(Error::from)?;
        } else {
            codec::encoded_to_native(reader, self.element_type, 1, false, shadow)?;
        }
        reader.ensure_all_consumed(crate::stream::Expectation::SevenOrLess).map_err(Error::from)?;

        require_before_write(&self.notifier, index, subindex, false, 0, shadow)?;

        {
            let _guard = self.data_mutex.as_ref().map(|l| l.write_guard());
            let storage = unsafe { &mut *self.storage.get() };
            if self.element_type.is_bit_packed() {
                insert_bits(storage, (subindex - 1) as u32, bits, shadow[0] as u32);
            } else {
                let start = (subindex as usize - 1) * elem_bytes;
                storage[start..start + elem_bytes].copy_from_slice(shadow);
            }
        }
        self.notifier.on_after_write(index, subindex, false);
        Ok(())
    }

    fn write_si0<B: ReadBackend>(&self, index: u16, perms: Attributes, reader: &mut StreamReader<B>) -> Result<()> {
        if !self.si0_attributes.permits_write(perms) {
            return Err(Error::AttemptToWriteRdOnlyObject);
        }
        let new_si0 = reader.read_u8().map_err(Error::from)?;
        reader.ensure_all_consumed(crate::stream::Expectation::SevenOrLess).map_err(Error::from)?;
        if new_si0 < self.min_si0 {
            return Err(Error::ValueTooLow);
        }
        if new_si0 > self.max_si0 {
            return Err(Error::ValueTooHigh);
        }
        require_before_write(&self.notifier, index, 0, false, new_si0, &[new_si0])?;
        {
            let _guard = self.data_mutex.as_ref().map(|l| l.write_guard());
            unsafe { *self.si0.get() = new_si0 };
        }
        self.notifier.on_after_write(index, 0, false);
        Ok(())
    }

    /// Streams SI0 (if `incl_si0`) followed by all `SI0` live elements in
    /// one call.
    pub fn complete_read<B: WriteBackend>(
        &self,
        index: u16,
        incl_si0: bool,
        perms: Attributes,
        writer: &mut StreamWriter<B>,
    ) -> Result<()> {
        if !self.si0_attributes.permits_read(perms) {
            return Err(Error::AttemptToReadWrOnlyObject);
        }
        let si0 = self.read_si0();
        if !incl_si0 && si0 == 0 {
            return Ok(());
        }
        require_before_read(&self.notifier, index, 0, true, false)?;

        let guard = self.data_mutex.as_ref().map(|l| l.read_guard());
        if incl_si0 {
            writer.write_u8(si0).map_err(Error::from)?;
        }
        let storage = unsafe { &*self.storage.get() };
        let n = si0 as u32;
        if !self.element_attributes.intersects(Attributes::ANY_READ) {
            // Pure write-only elements: the live values are never exposed,
            // even via complete access.
            let bits = self.element_type.native_bits() as u64 * n as u64;
            writer.fill_bits(bits, false).map_err(Error::from)?;
        } else if self.element_type.is_bit_packed() {
            // The codec's native-form convention is one byte per element;
            // `storage` is bit-stuffed, so unstuff into a scratch buffer
            // before handing it off, the way the single-subindex path does
            // via `extract_bits`.
            let bits = self.element_type.native_bits();
            let mut scratch = vec![0u8; n as usize];
            for i in 0..n {
                scratch[i as usize] = extract_bits(storage, i, bits) as u8;
            }
            codec::native_to_encoded(&scratch, self.element_type, n, true, writer)?;
        } else {
            codec::native_to_encoded(storage, self.element_type, n, true, writer)?;
        }
        drop(guard);
        Ok(())
    }

    /// Decodes SI0 (if `incl_si0`) and all new elements, committing both
    /// atomically with a single after-write notification.
    pub fn complete_write<B: ReadBackend>(
        &self,
        index: u16,
        incl_si0: bool,
        perms: Attributes,
        reader: &mut StreamReader<B>,
        expected_trailing_bits: crate::stream::Expectation,
    ) -> Result<()> {
        let current_si0 = self.read_si0();

        let new_si0 = if incl_si0 {
            if !self.si0_attributes.intersects(Attributes::ANY_WRITE) {
                // SI0 is pure read-only: a complete write must still carry
                // the unchanged value.
                let written = reader.read_u8().map_err(Error::from)?;
                if written != current_si0 {
                    return Err(Error::UnsupportedAccessToObject);
                }
                written
            } else {
                let written = reader.read_u8().map_err(Error::from)?;
                if written < self.min_si0 {
                    return Err(Error::ValueTooLow);
                }
                if written > self.max_si0 {
                    return Err(Error::ValueTooHigh);
                }
                written
            }
        } else {
            current_si0
        };

        if new_si0 > 0 && !self.element_attributes.permits_write(perms) {
            return Err(Error::AttemptToWriteRdOnlyObject);
        }

        let bit_packed = self.element_type.is_bit_packed();
        // The codec's native-form convention is one byte per element, which
        // for a bit-packed type is wider than `storage`'s bit-stuffed
        // representation of the same elements; decode into a scratch buffer
        // sized for the codec and stuff it into `storage` afterwards, the
        // way the single-subindex path does via `insert_bits`.
        let scratch_len = if bit_packed {
            new_si0 as usize
        } else {
            Array::<N>::storage_len(self.element_type, new_si0)
        };
        let mut shadow = vec![0u8; scratch_len];
        codec::encoded_to_native(reader, self.element_type, new_si0 as u32, true, &mut shadow)?;
        reader.ensure_all_consumed(expected_trailing_bits).map_err(Error::from)?;

        require_before_write(&self.notifier, index, 0, true, new_si0, &shadow)?;

        {
            let _guard = self.data_mutex.as_ref().map(|l| l.write_guard());
            if incl_si0 {
                unsafe { *self.si0.get() = new_si0 };
            }
            let storage = unsafe { &mut *self.storage.get() };
            if bit_packed {
                let bits = self.element_type.native_bits();
                for i in 0..new_si0 as u32 {
                    insert_bits(storage, i, bits, shadow[i as usize] as u32);
                }
            } else {
                storage[..shadow.len()].copy_from_slice(&shadow);
            }
        }
        self.notifier.on_after_write(index, 0, true);
        Ok(())
    }
}
