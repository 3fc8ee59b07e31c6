// Copyright 2013-2014 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::stream;

/// A fallible CANopen access or codec operation's failure reason.
///
/// This is the `Err` side of `Result`; see [`SdoAbortCode`] for the wire /
/// callback-return value space that includes the success case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("data type not supported by this codec")]
    DataTypeNotSupported,
    #[error("subindex does not exist")]
    SubindexDoesNotExist,
    #[error("attempt to read a write-only object")]
    AttemptToReadWrOnlyObject,
    #[error("attempt to write a read-only object")]
    AttemptToWriteRdOnlyObject,
    #[error("unsupported access to object")]
    UnsupportedAccessToObject,
    #[error("data type mismatch: encoded data too long")]
    DataTypeMismatchTooLong,
    #[error("data type mismatch: encoded data too small")]
    DataTypeMismatchTooSmall,
    #[error("value too low")]
    ValueTooLow,
    #[error("value too high")]
    ValueTooHigh,
    #[error("general error")]
    GeneralError,
    #[error("out of memory")]
    OutOfMemory,
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<stream::Error> for Error {
    /// Per spec: an `Empty` underflow from the stream means the encoded
    /// data was too short; a `RemainingBits` mismatch (tail bits left over)
    /// means it was too long. Anything else collapses to `GeneralError`.
    fn from(e: stream::Error) -> Self {
        match e {
            stream::Error::Empty => Error::DataTypeMismatchTooSmall,
            stream::Error::RemainingBits => Error::DataTypeMismatchTooLong,
            _ => Error::GeneralError,
        }
    }
}

/// The full SDO abort code space, including the success sentinel `Ok`.
/// Used for [`super::object::Notifiable`] callback return values and for
/// [`super::object_info::ObjectInfoResponse`]'s wire `result` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SdoAbortCode {
    Ok = 0x0000_0000,
    GeneralError = 0x0800_0000,
    OutOfMemory = 0x0504_0005,
    UnsupportedAccessToObject = 0x0601_0000,
    AttemptToReadWrOnlyObject = 0x0601_0001,
    AttemptToWriteRdOnlyObject = 0x0601_0002,
    SubindexDoesNotExist = 0x0609_0011,
    ValueTooHigh = 0x0609_0031,
    ValueTooLow = 0x0609_0032,
    DataTypeMismatchTooLong = 0x0607_0012,
    DataTypeMismatchTooSmall = 0x0607_0013,
    DataTypeNotSupported = 0x0604_0043,
}

impl SdoAbortCode {
    pub fn is_ok(self) -> bool {
        self == SdoAbortCode::Ok
    }

    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0x0000_0000 => SdoAbortCode::Ok,
            0x0800_0000 => SdoAbortCode::GeneralError,
            0x0504_0005 => SdoAbortCode::OutOfMemory,
            0x0601_0000 => SdoAbortCode::UnsupportedAccessToObject,
            0x0601_0001 => SdoAbortCode::AttemptToReadWrOnlyObject,
            0x0601_0002 => SdoAbortCode::AttemptToWriteRdOnlyObject,
            0x0609_0011 => SdoAbortCode::SubindexDoesNotExist,
            0x0609_0031 => SdoAbortCode::ValueTooHigh,
            0x0609_0032 => SdoAbortCode::ValueTooLow,
            0x0607_0012 => SdoAbortCode::DataTypeMismatchTooLong,
            0x0607_0013 => SdoAbortCode::DataTypeMismatchTooSmall,
            0x0604_0043 => SdoAbortCode::DataTypeNotSupported,
            _ => return None,
        })
    }

    /// Converts a failed operation's error into the matching wire code.
    pub fn from_error(e: Error) -> Self {
        match e {
            Error::DataTypeNotSupported => SdoAbortCode::DataTypeNotSupported,
            Error::SubindexDoesNotExist => SdoAbortCode::SubindexDoesNotExist,
            Error::AttemptToReadWrOnlyObject => SdoAbortCode::AttemptToReadWrOnlyObject,
            Error::AttemptToWriteRdOnlyObject => SdoAbortCode::AttemptToWriteRdOnlyObject,
            Error::UnsupportedAccessToObject => SdoAbortCode::UnsupportedAccessToObject,
            Error::DataTypeMismatchTooLong => SdoAbortCode::DataTypeMismatchTooLong,
            Error::DataTypeMismatchTooSmall => SdoAbortCode::DataTypeMismatchTooSmall,
            Error::ValueTooLow => SdoAbortCode::ValueTooLow,
            Error::ValueTooHigh => SdoAbortCode::ValueTooHigh,
            Error::GeneralError => SdoAbortCode::GeneralError,
            Error::OutOfMemory => SdoAbortCode::OutOfMemory,
        }
    }
}

impl From<Error> for SdoAbortCode {
    fn from(e: Error) -> Self {
        SdoAbortCode::from_error(e)
    }
}

impl TryFrom<SdoAbortCode> for Error {
    type Error = ();

    /// Fails only for `SdoAbortCode::Ok`, which is not an error.
    fn try_from(code: SdoAbortCode) -> std::result::Result<Self, ()> {
        Ok(match code {
            SdoAbortCode::Ok => return Err(()),
            SdoAbortCode::GeneralError => Error::GeneralError,
            SdoAbortCode::OutOfMemory => Error::OutOfMemory,
            SdoAbortCode::UnsupportedAccessToObject => Error::UnsupportedAccessToObject,
            SdoAbortCode::AttemptToReadWrOnlyObject => Error::AttemptToReadWrOnlyObject,
            SdoAbortCode::AttemptToWriteRdOnlyObject => Error::AttemptToWriteRdOnlyObject,
            SdoAbortCode::SubindexDoesNotExist => Error::SubindexDoesNotExist,
            SdoAbortCode::ValueTooHigh => Error::ValueTooHigh,
            SdoAbortCode::ValueTooLow => Error::ValueTooLow,
            SdoAbortCode::DataTypeMismatchTooLong => Error::DataTypeMismatchTooLong,
            SdoAbortCode::DataTypeMismatchTooSmall => Error::DataTypeMismatchTooSmall,
            SdoAbortCode::DataTypeNotSupported => Error::DataTypeNotSupported,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_errors_map_to_length_mismatches() {
        assert_eq!(Error::from(stream::Error::Empty), Error::DataTypeMismatchTooSmall);
        assert_eq!(Error::from(stream::Error::RemainingBits), Error::DataTypeMismatchTooLong);
    }

    #[test]
    fn sdo_abort_code_roundtrips_through_u32() {
        for code in [
            SdoAbortCode::Ok,
            SdoAbortCode::ValueTooLow,
            SdoAbortCode::DataTypeMismatchTooLong,
        ] {
            assert_eq!(SdoAbortCode::from_u32(code.as_u32()), Some(code));
        }
    }
}
