/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use std::fmt;

use thiserror::Error;

/// The kind of an [`Error`], independent of its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidArgument,
    PermissionDenied,
    Internal,
    ResourceExhausted,
    FailedPrecondition,
    OutOfRange,
    Unknown,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::Internal => "INTERNAL",
            ErrorCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ErrorCode::FailedPrecondition => "FAILED_PRECONDITION",
            ErrorCode::OutOfRange => "OUT_OF_RANGE",
            ErrorCode::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed or policy-violating input.
    #[error("INVALID_ARGUMENT: {0}")]
    InvalidArgument(String),
    /// Well-formed input that fails an identity-policy check.
    #[error("PERMISSION_DENIED: {0}")]
    PermissionDenied(String),
    /// An invariant was violated inside a trusted boundary.
    #[error("INTERNAL: {0}")]
    Internal(String),
    #[error("RESOURCE_EXHAUSTED: {0}")]
    ResourceExhausted(String),
    #[error("FAILED_PRECONDITION: {0}")]
    FailedPrecondition(String),
    #[error("OUT_OF_RANGE: {0}")]
    OutOfRange(String),
    #[error("UNKNOWN: {0}")]
    Unknown(String),
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Error::PermissionDenied(_) => ErrorCode::PermissionDenied,
            Error::Internal(_) => ErrorCode::Internal,
            Error::ResourceExhausted(_) => ErrorCode::ResourceExhausted,
            Error::FailedPrecondition(_) => ErrorCode::FailedPrecondition,
            Error::OutOfRange(_) => ErrorCode::OutOfRange,
            Error::Unknown(_) => ErrorCode::Unknown,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::InvalidArgument(msg)
            | Error::PermissionDenied(msg)
            | Error::Internal(msg)
            | Error::ResourceExhausted(msg)
            | Error::FailedPrecondition(msg)
            | Error::OutOfRange(msg)
            | Error::Unknown(msg) => msg,
        }
    }

    pub(crate) fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }
}

pub type Result<T> = ::std::result::Result<T, Error>;
