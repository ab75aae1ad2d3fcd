//! The unit converter (`spec.md` §4.4).
//!
//! Parses a literal of the form `<decimal>[<suffix>]`. `b` (fs blocks) and `s` (512-byte
//! sectors) need the corresponding base size to already be known; `k/m/g/t/p/e` are plain binary
//! SI multipliers and never fail for lack of context.

use crate::error::{Error, Kind};

/// The bases a literal's `b`/`s` suffix may need, supplied by the caller (the parser knows which
/// are settled at the point a given suboption is parsed).
#[derive(Clone, Copy, Default)]
pub struct UnitBases {
	pub block_size: Option<u64>,
	pub sector_size: Option<u64>,
}

/// Parses a size literal, returning the value in bytes.
pub fn parse_size(literal: &str, bases: UnitBases) -> Result<u64, Error> {
	let (digits, suffix) = split_suffix(literal);
	if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
		return Err(Error::new(Kind::ParseSyntax, format!("illegal value {literal}")));
	}
	let n: u64 = digits
		.parse()
		.map_err(|_| Error::new(Kind::ParseSyntax, format!("value {literal} overflows")))?;

	let multiply = |base: u64| -> Result<u64, Error> {
		n.checked_mul(base)
			.ok_or_else(|| Error::new(Kind::ParseSyntax, format!("value {literal} overflows")))
	};

	match suffix {
		None => Ok(n),
		Some(c) => match c.to_ascii_lowercase() {
			'b' => {
				let block_size = bases.block_size.ok_or_else(|| {
					Error::new(
						Kind::ParseSyntax,
						format!("illegal value {literal}: block size not yet known"),
					)
				})?;
				multiply(block_size)
			}
			's' => {
				let sector_size = bases.sector_size.ok_or_else(|| {
					Error::new(
						Kind::ParseSyntax,
						format!("illegal value {literal}: sector size not yet known"),
					)
				})?;
				multiply(sector_size)
			}
			'k' => multiply(1024),
			'm' => multiply(1024u64.pow(2)),
			'g' => multiply(1024u64.pow(3)),
			't' => multiply(1024u64.pow(4)),
			'p' => multiply(1024u64.pow(5)),
			'e' => multiply(1024u64.pow(6)),
			_ => Err(Error::new(Kind::ParseSyntax, format!("illegal value {literal}"))),
		},
	}
}

/// Splits a literal into its leading digits and an optional trailing single-character suffix.
fn split_suffix(literal: &str) -> (&str, Option<char>) {
	match literal.chars().last() {
		Some(c) if c.is_ascii_alphabetic() => (&literal[..literal.len() - 1], Some(c)),
		_ => (literal, None),
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn bases() -> UnitBases {
		UnitBases {
			block_size: Some(4096),
			sector_size: Some(512),
		}
	}

	#[test]
	fn bare_bytes() {
		assert_eq!(parse_size("4096", bases()).unwrap(), 4096);
	}

	#[test]
	fn binary_si_suffixes() {
		assert_eq!(parse_size("1k", bases()).unwrap(), 1024);
		assert_eq!(parse_size("4m", bases()).unwrap(), 4 * 1024 * 1024);
		assert_eq!(parse_size("1g", bases()).unwrap(), 1024 * 1024 * 1024);
		assert_eq!(parse_size("1t", bases()).unwrap(), 1024u64.pow(4));
	}

	#[test]
	fn case_insensitive_suffix() {
		assert_eq!(parse_size("1G", bases()).unwrap(), parse_size("1g", bases()).unwrap());
	}

	#[test]
	fn block_suffix_needs_block_size() {
		assert_eq!(parse_size("2b", bases()).unwrap(), 8192);
		let err = parse_size("2b", UnitBases::default()).unwrap_err();
		assert_eq!(err.kind, Kind::ParseSyntax);
	}

	#[test]
	fn sector_suffix_needs_sector_size() {
		assert_eq!(parse_size("2s", bases()).unwrap(), 1024);
		let err = parse_size("2s", UnitBases::default()).unwrap_err();
		assert_eq!(err.kind, Kind::ParseSyntax);
	}

	#[test]
	fn overflow_is_rejected() {
		let err = parse_size("99999999999999999999", bases()).unwrap_err();
		assert_eq!(err.kind, Kind::ParseSyntax);
	}

	#[test]
	fn trailing_garbage_is_rejected() {
		assert!(parse_size("4096x", bases()).is_err());
		assert!(parse_size("", bases()).is_err());
	}

	#[test]
	fn unknown_unit_before_base_known() {
		let err = parse_size("1b", UnitBases::default()).unwrap_err();
		assert_eq!(err.kind, Kind::ParseSyntax);
	}
}
