#![allow(clippy::module_name_repetitions)]

//! The error surface user-observable operations return.
//!
//! Structural invariant violations (a failed context switch, a failed
//! stack allocation) are not represented here: they are fatal and go
//! through [`crate::panic_nounwind`] instead, matching the original
//! library's `acl_msg_fatal` calls.

use std::fmt::{self, Debug, Display, Formatter};
use std::{error, result};

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// A local-storage key outside `(0, nlocal]` was used.
	InvalidKey,

	/// An API that requires a running fiber was called from the
	/// scheduler context.
	NoRunningFiber,

	/// The `fcntl` hook received a command it doesn't know how to
	/// forward.
	UnknownFcntlCmd
}

impl ErrorKind {
	const fn message(self) -> &'static str {
		match self {
			Self::InvalidKey => "invalid local-storage key",
			Self::NoRunningFiber => "no fiber is currently running",
			Self::UnknownFcntlCmd => "unrecognized fcntl command"
		}
	}
}

#[derive(Clone, Copy)]
pub struct Error {
	kind: ErrorKind
}

impl Error {
	#[must_use]
	pub const fn new(kind: ErrorKind) -> Self {
		Self { kind }
	}

	#[must_use]
	pub const fn kind(&self) -> ErrorKind {
		self.kind
	}
}

impl From<ErrorKind> for Error {
	fn from(kind: ErrorKind) -> Self {
		Self::new(kind)
	}
}

impl Debug for Error {
	fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
		fmt.debug_struct("Error")
			.field("kind", &self.kind)
			.field("message", &self.kind.message())
			.finish()
	}
}

impl Display for Error {
	fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
		write!(fmt, "{}", self.kind.message())
	}
}

impl error::Error for Error {}

#[cfg(test)]
mod tests {
	use super::{Error, ErrorKind};

	#[test]
	fn display_matches_message() {
		let err = Error::new(ErrorKind::InvalidKey);

		assert_eq!(err.to_string(), "invalid local-storage key");
		assert_eq!(err.kind(), ErrorKind::InvalidKey);
	}

	#[test]
	fn from_kind_round_trips() {
		let err: Error = ErrorKind::NoRunningFiber.into();

		assert_eq!(err.kind(), ErrorKind::NoRunningFiber);
	}
}
