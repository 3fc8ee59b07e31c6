// Copyright 2013-2014 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Hierarchical file/directory read/write lock arbitration.
//!
//! Every lock identifier, file or directory, is normalized to end with the
//! path separator (`"/a/b/leaf/"`, root `"/"`). That one convention is what
//! makes a plain [`str::starts_with`] a sound prefix/descendant test: a
//! genuine ancestor's id always ends right at a separator boundary of any
//! path beneath it, so two unrelated siblings whose names happen to share a
//! textual prefix (`"b.dat"` and `"bz.dat"`) never falsely collide.

use std::collections::HashMap;

#[derive(Default)]
struct Entry {
    read_count: u32,
    write_held: bool,
}

fn related(a: &str, b: &str) -> bool {
    a == b || a.starts_with(b) || b.starts_with(a)
}

/// Builds the normalized lock id for a `/`-separated relative path; `""`
/// denotes the base directory itself.
pub fn lock_id(relative_path: &str) -> String {
    if relative_path.is_empty() {
        return "/".to_string();
    }
    format!("/{}/", relative_path.trim_matches('/'))
}

/// Non-blocking hierarchical read/write lock table. See spec §4.8: a
/// read-lock on `P` succeeds iff no write-lock is held on `P`, any prefix
/// of `P`, or any descendant of `P`; a write-lock succeeds iff no lock of
/// any kind is held on any of those.
#[derive(Default)]
pub struct PathLockTable {
    entries: HashMap<String, Entry>,
}

impl PathLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_read_lock(&mut self, id: &str) -> bool {
        for (path, entry) in &self.entries {
            if entry.write_held && related(path, id) {
                return false;
            }
        }
        self.entries.entry(id.to_string()).or_default().read_count += 1;
        true
    }

    pub fn try_write_lock(&mut self, id: &str) -> bool {
        for (path, entry) in &self.entries {
            if (entry.write_held || entry.read_count > 0) && related(path, id) {
                return false;
            }
        }
        self.entries.insert(id.to_string(), Entry { read_count: 0, write_held: true });
        true
    }

    pub fn release_read_lock(&mut self, id: &str) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.read_count = entry.read_count.saturating_sub(1);
            if entry.read_count == 0 && !entry.write_held {
                self.entries.remove(id);
            }
        }
    }

    pub fn release_write_lock(&mut self, id: &str) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.write_held = false;
            if entry.read_count == 0 {
                self.entries.remove(id);
            }
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_13_path_lock_hierarchy() {
        let mut t = PathLockTable::new();
        assert!(t.try_write_lock(&lock_id("a/b")));
        assert!(!t.try_read_lock(&lock_id("a")));
        assert!(!t.try_read_lock(&lock_id("a/b")));
        assert!(!t.try_read_lock(&lock_id("a/b/c")));
        assert!(!t.try_read_lock(&lock_id("a/b/c/x")));
        // Disjoint sibling is unaffected.
        assert!(t.try_read_lock(&lock_id("a/z")));
        t.release_read_lock(&lock_id("a/z"));
        t.release_write_lock(&lock_id("a/b"));
        assert!(t.try_read_lock(&lock_id("a/b")));
        t.release_read_lock(&lock_id("a/b"));
        assert!(t.is_empty());
    }

    #[test]
    fn similarly_prefixed_siblings_do_not_collide() {
        let mut t = PathLockTable::new();
        assert!(t.try_write_lock(&lock_id("a/b.dat")));
        assert!(t.try_write_lock(&lock_id("a/bz.dat")));
    }

    #[test]
    fn multiple_readers_but_not_concurrent_writer() {
        let mut t = PathLockTable::new();
        assert!(t.try_read_lock(&lock_id("a")));
        assert!(t.try_read_lock(&lock_id("a")));
        assert!(!t.try_write_lock(&lock_id("a")));
        t.release_read_lock(&lock_id("a"));
        t.release_read_lock(&lock_id("a"));
        assert!(t.try_write_lock(&lock_id("a")));
    }
}
