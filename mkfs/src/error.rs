//! The error taxonomy described in `spec.md` §7.

use std::fmt;
use std::io;

/// The kind of failure, independent of the message text — used by `main` to pick the exit
/// behavior (fatal vs. warning) and by tests to assert on the *shape* of a failure without
/// matching exact wording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
	ParseSyntax,
	RangeViolation,
	PowerOfTwoViolation,
	Respecified,
	Conflict,
	RequiredValueMissing,
	TopologyMismatch,
	DeviceError,
	GeometryImpossible,
	OverwriteRefused,
	DiscardFailed,
}

impl Kind {
	/// Whether this kind is merely a warning: printed, but does not terminate the process.
	pub fn is_warning(self) -> bool {
		matches!(self, Self::TopologyMismatch | Self::DiscardFailed)
	}
}

/// A single validation or I/O failure, carrying enough context to reproduce the exact messages
/// `spec.md` §7-§8 specify.
#[derive(Debug)]
pub struct Error {
	pub kind: Kind,
	pub message: String,
}

impl Error {
	pub fn new(kind: Kind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
		}
	}

	/// `Illegal value <value> for -<opt> <name> option`.
	pub fn illegal_value(opt: char, name: &str, value: &str, kind: Kind) -> Self {
		Self::new(kind, format!("Illegal value {value} for -{opt} {name} option"))
	}

	/// `-<opt> <name> option requires a value`.
	pub fn required_value_missing(opt: char, name: &str) -> Self {
		Self::new(
			Kind::RequiredValueMissing,
			format!("-{opt} {name} option requires a value"),
		)
	}

	/// `-<opt> <name> option respecified`.
	pub fn respecified(opt: char, name: &str) -> Self {
		Self::new(Kind::Respecified, format!("-{opt} {name} option respecified"))
	}

	/// `Cannot specify both -<opt> <a> and -<opt2> <b>`.
	pub fn conflict(opt: char, a: &str, opt2: char, b: &str) -> Self {
		Self::new(
			Kind::Conflict,
			format!("Cannot specify both -{opt} {a} and -{opt2} {b}"),
		)
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.message)
	}
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Self {
		Self::new(Kind::DeviceError, e.to_string())
	}
}
