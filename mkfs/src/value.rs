//! The value types carried by option suboptions.

use std::fmt;

/// A parsed suboption value.
///
/// The schema (`spec.md` §3.1) distinguishes `Int`, `Uint`, `Uint64` and `String`, but once a
/// literal has been range-checked there is no remaining use for three integer widths in the same
/// slot: everything numeric collapses to a single unsigned 64-bit value, and range checks are
/// still performed against the declared `ValueKind`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
	/// A `Bool` value.
	Bool(bool),
	/// A numeric value (covers the `Int`, `Uint`, `Uint64` schema kinds).
	Num(u64),
	/// A `String` value.
	Str(String),
	/// The suboption has not been given any value (never written, and has no declared default).
	None,
}

impl Value {
	/// Returns the numeric value, or panics.
	///
	/// Only called on suboptions whose schema entry declares a numeric `ValueKind`; a mismatch is
	/// an internal schema bug, not a user error.
	pub fn as_num(&self) -> u64 {
		match self {
			Self::Num(n) => *n,
			Self::Bool(b) => *b as u64,
			_ => panic!("value is not numeric"),
		}
	}

	/// Returns the boolean value, or panics (see [`Self::as_num`]).
	pub fn as_bool(&self) -> bool {
		match self {
			Self::Bool(b) => *b,
			Self::Num(n) => *n != 0,
			_ => panic!("value is not a bool"),
		}
	}

	/// Returns the string value, or panics (see [`Self::as_num`]).
	pub fn as_str(&self) -> &str {
		match self {
			Self::Str(s) => s.as_str(),
			_ => panic!("value is not a string"),
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Bool(b) => write!(f, "{}", *b as u64),
			Self::Num(n) => write!(f, "{n}"),
			Self::Str(s) => write!(f, "{s}"),
			Self::None => write!(f, "<unset>"),
		}
	}
}

/// The declared kind of a suboption's value, used to pick the parse/format rule.
///
/// Distinct from [`Value`]: this is compile-time schema metadata, the former is the runtime
/// payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
	/// Accepts `0`/`1` (and, per `spec.md` §4.1, is future-compatible with `true`/`false`).
	Bool,
	/// A bounded unsigned integer, optionally unit-suffixed (§4.4) and/or power-of-two (§3.1).
	Num,
	/// An arbitrary non-empty string, stored verbatim.
	Str,
}
