// Copyright 2013-2014 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CANopen object dictionary core: value codec, VARIABLE/ARRAY objects,
//! and the ObjectInfoResponse remote-browsing query.
//!
//! This module does not hold a registry mapping dictionary indices to
//! objects -- assembling a dictionary out of [`object::Variable`] and
//! [`object::Array`] instances is the embedding application's job.

pub mod codec;
pub mod error;
pub mod object;
pub mod object_info;
pub mod return_stack;
pub mod types;

pub use error::{Error, Result, SdoAbortCode};
pub use object::{Array, NullNotifier, Notifiable, Variable};
pub use object_info::{ObjectInfoResponse, SubindexDescriptor, SubindexSource, SubindexValue};
pub use return_stack::ReturnStackItem;
pub use types::{Attributes, DataType, ObjectCode};
