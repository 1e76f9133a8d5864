// SPDX-License-Identifier: MPL-2.0

use core::fmt;

/// The kinds of errors reported by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Errno {
    /// The timing, budget or period parameters of a thread are inconsistent.
    InvalidArgs,
    /// Another thread with the same ID is already in the arena.
    DuplicateId,
    /// The handle refers to a thread that has left the arena.
    StaleHandle,
    /// The name does not match any scheduling policy.
    UnknownPolicy,
}

impl Errno {
    const fn as_str(&self) -> &'static str {
        match self {
            Errno::InvalidArgs => "invalid arguments",
            Errno::DuplicateId => "duplicate thread id",
            Errno::StaleHandle => "stale thread handle",
            Errno::UnknownPolicy => "unknown scheduling policy",
        }
    }
}

/// The error returned when a thread, the arena or a policy name is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    errno: Errno,
    msg: Option<&'static str>,
}

impl Error {
    pub const fn new(errno: Errno) -> Self {
        Error { errno, msg: None }
    }

    pub const fn with_message(errno: Errno, msg: &'static str) -> Self {
        Error {
            errno,
            msg: Some(msg),
        }
    }

    pub const fn error(&self) -> Errno {
        self.errno
    }

    pub const fn message(&self) -> Option<&'static str> {
        self.msg
    }
}

impl From<Errno> for Error {
    fn from(errno: Errno) -> Self {
        Error::new(errno)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.msg {
            Some(msg) => write!(f, "{}: {}", self.errno.as_str(), msg),
            None => f.write_str(self.errno.as_str()),
        }
    }
}

impl core::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;

#[macro_export]
macro_rules! return_errno {
    ($errno: expr) => {
        return Err($crate::Error::new($errno))
    };
}

#[macro_export]
macro_rules! return_errno_with_message {
    ($errno: expr, $message: expr) => {
        return Err($crate::Error::with_message($errno, $message))
    };
}
