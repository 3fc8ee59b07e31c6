// Copyright 2013-2014 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! End-to-end scenarios S1-S7, driven only through the public API, each
//! crossing a module boundary the unit tests don't.

use std::sync::Arc;
use std::time::Duration;

use cood_core::cood::{Attributes, DataType, NullNotifier, Variable};
use cood_core::lock::RwLock;
use cood_core::storage::FileStorage;
use cood_core::stream::{Endian, SliceSource, StreamReader, StreamWriter, VecSink};

#[test]
fn s1_bit_packed_round_trip_through_vecsink_and_sliceserve() {
    let mut w = StreamWriter::new(VecSink::new(), Endian::Little);
    w.write_bits(1, 1).unwrap();
    w.write_bits(3, 0b101).unwrap();
    w.write_u16(0xBEEF).unwrap();
    w.close().unwrap();
    let bytes = w.into_inner().into_inner();

    let mut r = StreamReader::new(SliceSource::new(&bytes), Endian::Little);
    assert_eq!(r.read_bits(1).unwrap(), 1);
    assert_eq!(r.read_bits(3).unwrap(), 0b101);
    assert_eq!(r.read_u16().unwrap(), 0xBEEF);
}

#[test]
fn s2_read_line_across_mixed_terminators() {
    let data = b"first\r\nsecond\nthird\rfourth";
    let mut r = StreamReader::new(SliceSource::new(data), Endian::Little);
    assert_eq!(r.read_line().unwrap(), "first");
    assert_eq!(r.read_line().unwrap(), "second");
    assert_eq!(r.read_line().unwrap(), "third");
    assert_eq!(r.read_line().unwrap(), "fourth");
}

#[test]
fn s3_rwlock_strict_writer_preference() {
    let lock = Arc::new(RwLock::new());
    assert!(lock.try_read_lock());

    let blocked_writer = {
        let lock = lock.clone();
        std::thread::spawn(move || {
            lock.write_lock();
            lock.release_write_lock();
        })
    };
    // Give the writer a chance to queue behind the held read-lock.
    std::thread::sleep(Duration::from_millis(20));

    // A second reader arriving after the writer is already queued must wait
    // behind it (strict writer preference), so it cannot acquire yet.
    assert!(!lock.try_read_lock());

    lock.release_read_lock();
    blocked_writer.join().unwrap();

    assert!(lock.try_read_lock());
    lock.release_read_lock();
}

#[test]
fn s4_variable_subindex_write_read_round_trip() {
    let var = Variable::new(
        DataType::Unsigned32,
        1,
        Attributes::ANY_READ | Attributes::ANY_WRITE,
        Some("Counter".into()),
        vec![0u8; 4],
        true,
        NullNotifier,
    );

    let mut w = StreamWriter::new(VecSink::new(), Endian::Little);
    w.write_u32(42).unwrap();
    w.close().unwrap();
    let bytes = w.into_inner().into_inner();
    let mut r = StreamReader::new(SliceSource::new(&bytes), Endian::Little);
    var.write(0x2000, 0, Attributes::WRITE_OP, &mut r).unwrap();

    let mut out = StreamWriter::new(VecSink::new(), Endian::Little);
    var.read(0x2000, 0, Attributes::READ_OP, &mut out).unwrap();
    out.close().unwrap();
    let mut back = StreamReader::new(SliceSource::new(out.into_inner().as_slice()), Endian::Little);
    assert_eq!(back.read_u32().unwrap(), 42);
}

#[test]
fn s7_file_storage_create_lock_then_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path());

    storage.create_directory("logs").unwrap();
    let mut handle = storage.create("logs/run.txt", false).unwrap();
    handle.stream().write_bytes(b"boot\n").unwrap();

    // The write-lock on the path is still held: a concurrent open fails.
    assert!(storage.open("logs/run.txt").is_err());

    handle.close().unwrap();

    let mut read = storage.open("logs/run.txt").unwrap();
    let contents = read.stream().read_bytes(5).unwrap();
    assert_eq!(contents.as_slice(), b"boot\n");

    let files = storage.enumerate_files("logs").unwrap();
    assert_eq!(files, vec!["run.txt".to_string()]);
}
