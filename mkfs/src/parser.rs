//! The command-line parser (`spec.md` §4.1, §6.1): turns `argv` into a fully-validated
//! [`Context`] plus the handful of top-level flags that never went through the `-X key=value`
//! suboption machinery (`-L`, `-p`, `-N`, `-K`, `-f`/`-C`, `-q`, `-V`).
//!
//! Hand-rolled, in the manner of `mkfs/src/main.rs`'s own `parse_args`: no argument-parsing
//! crate, just a `while let Some(arg) = iter.next()` loop over `env::args()`.

use crate::conflict;
use crate::context::Context;
use crate::error::{Error, Kind};
use crate::schema::{self, Opt};
use crate::units::{self, UnitBases};
use crate::value::{Value, ValueKind};

/// Everything the parser produces: validated option state plus the top-level flags.
pub struct Cli {
	pub ctx: Context,
	pub label: Option<String>,
	pub proto_file: Option<String>,
	pub dry_run: bool,
	pub no_discard: bool,
	pub force: bool,
	pub quiet: bool,
	pub print_version: bool,
	pub device_path: Option<String>,
}

impl Default for Cli {
	fn default() -> Self {
		Self {
			ctx: Context::new(),
			label: None,
			proto_file: None,
			dry_run: false,
			no_discard: false,
			force: false,
			quiet: false,
			print_version: false,
			device_path: None,
		}
	}
}

const GROUP_LETTERS: &[char] = &['b', 'd', 'i', 'l', 'n', 'r', 's', 'm'];

/// Parses `argv` (excluding argv[0]) into a [`Cli`]. Exits the same way the original tool does:
/// any validation failure is a single `Error` the caller prints before terminating.
pub fn parse<I: Iterator<Item = String>>(mut argv: I) -> Result<Cli, Error> {
	let mut cli = Cli::default();

	while let Some(arg) = argv.next() {
		let mut chars = arg.chars();
		if chars.next() != Some('-') || arg.len() < 2 {
			if cli.device_path.is_some() {
				return Err(Error::new(
					Kind::ParseSyntax,
					format!("unexpected extra argument {arg}"),
				));
			}
			cli.device_path = Some(arg);
			continue;
		}
		let letter = chars.next().unwrap();
		let rest = &arg[2..];

		match letter {
			'N' => cli.dry_run = true,
			'K' => cli.no_discard = true,
			'q' => cli.quiet = true,
			'V' => cli.print_version = true,
			'f' | 'C' => cli.force = true,
			'L' => cli.label = Some(take_attached_or_next(rest, &mut argv, letter)?),
			'p' => cli.proto_file = Some(take_attached_or_next(rest, &mut argv, letter)?),
			l if GROUP_LETTERS.contains(&l) => {
				let group_arg = take_attached_or_next(rest, &mut argv, letter)?;
				parse_group(&mut cli.ctx, l, &group_arg)?;
			}
			_ => return Err(Error::new(Kind::ParseSyntax, format!("unknown option -{letter}"))),
		}
	}

	Ok(cli)
}

/// An option's value is either attached (`-Lmylabel`) or the following argv element
/// (`-L mylabel`), matching `getopt`'s handling of required-argument short options.
fn take_attached_or_next<I: Iterator<Item = String>>(
	rest: &str,
	argv: &mut I,
	letter: char,
) -> Result<String, Error> {
	if !rest.is_empty() {
		return Ok(rest.to_string());
	}
	argv.next()
		.ok_or_else(|| Error::new(Kind::RequiredValueMissing, format!("-{letter} option requires a value")))
}

/// Parses one `-X key[=value][,key[=value]...]` group argument.
fn parse_group(ctx: &mut Context, group: char, arg: &str) -> Result<(), Error> {
	for token in arg.split(',') {
		if token.is_empty() {
			continue;
		}
		let (name, raw_value) = match token.split_once('=') {
			Some((n, v)) => (n, Some(v)),
			None => (token, None),
		};
		let sub = schema::find(group, name)
			.ok_or_else(|| Error::new(Kind::ParseSyntax, format!("unknown option -{group} {name}")))?;

		let value = match raw_value {
			None => {
				if sub.needs_value {
					return Err(Error::required_value_missing(group, name));
				}
				match sub.kind {
					ValueKind::Bool => Value::Bool(sub.flag_value != 0),
					_ => Value::Num(sub.flag_value),
				}
			}
			Some(raw) => parse_value(ctx, group, name, sub, raw)?,
		};

		ctx.set(sub.opt, value)?;
		conflict::check_unconditional(ctx, sub.opt)?;
		conflict::check_conditionals(ctx)?;
	}
	Ok(())
}

fn parse_value(
	ctx: &Context,
	group: char,
	name: &str,
	sub: &schema::Suboption,
	raw: &str,
) -> Result<Value, Error> {
	match sub.kind {
		ValueKind::Str => {
			if raw.is_empty() {
				return Err(Error::illegal_value(group, name, raw, Kind::ParseSyntax));
			}
			// `-n version=` is the one `Str`-kind suboption with a closed set of legal literals
			// (`2` or `ci`) rather than free-form text (`spec.md` §6.1).
			if sub.opt == Opt::n_version {
				let normalized = raw.to_ascii_lowercase();
				if normalized != "2" && normalized != "ci" {
					return Err(Error::illegal_value(group, name, raw, Kind::RangeViolation));
				}
				return Ok(Value::Str(normalized));
			}
			Ok(Value::Str(raw.to_string()))
		}
		ValueKind::Bool => match raw {
			"0" => Ok(Value::Bool(false)),
			"1" => Ok(Value::Bool(true)),
			_ => Err(Error::illegal_value(group, name, raw, Kind::ParseSyntax)),
		},
		ValueKind::Num => {
			let n = if sub.accepts_suffix {
				let bases = UnitBases {
					block_size: Some(ctx.num(Opt::b_size)),
					sector_size: Some(ctx.num(Opt::d_sectsize)),
				};
				units::parse_size(raw, bases)?
			} else {
				raw.parse::<u64>()
					.map_err(|_| Error::illegal_value(group, name, raw, Kind::ParseSyntax))?
			};
			if n < sub.min || n > sub.max {
				return Err(Error::illegal_value(group, name, raw, Kind::RangeViolation));
			}
			if sub.power_of_two && !utils::util::is_pow2(n) {
				return Err(Error::illegal_value(group, name, raw, Kind::PowerOfTwoViolation));
			}
			Ok(Value::Num(n))
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn argv(s: &str) -> impl Iterator<Item = String> {
		s.split_whitespace().map(String::from).collect::<Vec<_>>().into_iter()
	}

	#[test]
	fn parses_device_path_and_flags() {
		let cli = parse(argv("-N -q /dev/foo")).unwrap();
		assert!(cli.dry_run);
		assert!(cli.quiet);
		assert_eq!(cli.device_path.as_deref(), Some("/dev/foo"));
	}

	#[test]
	fn parses_comma_separated_suboptions() {
		let cli = parse(argv("-d agcount=8,file /tmp/img")).unwrap();
		assert_eq!(cli.ctx.num(Opt::d_agcount), 8);
		assert!(cli.ctx.bool_(Opt::d_file));
	}

	#[test]
	fn b_size_and_log_respecify_across_alias() {
		let err = parse(argv("-b size=4096 -b log=12 /dev/any")).unwrap_err();
		assert_eq!(err.message, "-b size option respecified");
	}

	#[test]
	fn unknown_suboption_is_rejected() {
		let err = parse(argv("-d bogus=1 /tmp/img")).unwrap_err();
		assert_eq!(err.kind, Kind::ParseSyntax);
	}

	#[test]
	fn crc_and_ftype_conflict_detected_inline() {
		let err = parse(argv("-m crc=1 -n ftype=0 /dev/any")).unwrap_err();
		assert_eq!(err.message, "Cannot disable ftype with crcs enabled");
	}

	#[test]
	fn attached_value_form_is_accepted() {
		let cli = parse(argv("-Llabeltext /tmp/img")).unwrap();
		assert_eq!(cli.label.as_deref(), Some("labeltext"));
	}

	#[test]
	fn size_suffix_uses_current_block_size() {
		let cli = parse(argv("-b size=1024 -d size=2b /tmp/img")).unwrap();
		assert_eq!(cli.ctx.num(Opt::d_size), 2048);
	}

	#[test]
	fn n_version_accepts_ci_keyword() {
		let cli = parse(argv("-n version=ci /tmp/img")).unwrap();
		assert_eq!(cli.ctx.str_(Opt::n_version), "ci");
	}

	#[test]
	fn n_version_rejects_other_keywords() {
		let err = parse(argv("-n version=3 /tmp/img")).unwrap_err();
		assert_eq!(err.kind, Kind::RangeViolation);
	}

	#[test]
	fn n_version_defaults_to_2() {
		let cli = parse(argv("/tmp/img")).unwrap();
		assert_eq!(cli.ctx.str_(Opt::n_version), "2");
	}
}
