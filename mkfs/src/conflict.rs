//! The conflict engine (`spec.md` §4.2): unconditional conflicts live in [`schema::Suboption`]'s
//! `conflicts` list; value-dependent conflicts — almost all of them the CRC feature lock table —
//! live here as a flat table of [`Conditional`] entries.

use crate::context::Context;
use crate::error::{Error, Kind};
use crate::schema::{self, Opt};
use crate::value::Value;

/// A predicate against a suboption's current value (`spec.md`'s `invalid_value`/`at_value`).
#[derive(Clone, Copy)]
pub enum Predicate {
	IsTrue,
	IsFalse,
	Ne(u64),
}

impl Predicate {
	fn matches(self, value: &Value) -> bool {
		match self {
			Self::IsTrue => value.as_bool(),
			Self::IsFalse => !value.as_bool(),
			Self::Ne(n) => value.as_num() != n,
		}
	}
}

/// One value-dependent conflict: `self_opt` may not hold a value matching `self_is` while
/// `peer` holds a value matching `peer_is`.
///
/// Every row here has `include_defaults` true in `spec.md`'s terms — every `self_opt` below
/// already *defaults* to the value CRC requires, so `self_is` can only match when the user
/// explicitly overrode it; there is no row where distinguishing "seen" from "default" on either
/// side changes the outcome, so the flag is folded away rather than threaded through.
pub struct Conditional {
	pub self_opt: Opt,
	pub self_is: Predicate,
	pub peer: Opt,
	pub peer_is: Predicate,
	pub message: &'static str,
}

/// The CRC feature lock table (`spec.md` §4.2, §6.2), grounded on the `sb_feat.crcs_enabled`
/// branch in `xfs_mkfs.c`'s geometry validation pass.
pub static CRC_LOCKS: &[Conditional] = &[
	Conditional {
		self_opt: Opt::i_align,
		self_is: Predicate::IsFalse,
		peer: Opt::m_crc,
		peer_is: Predicate::IsTrue,
		message: "Inodes always aligned for CRC enabled filesystems",
	},
	Conditional {
		self_opt: Opt::i_projid32bit,
		self_is: Predicate::IsFalse,
		peer: Opt::m_crc,
		peer_is: Predicate::IsTrue,
		message: "32 bit Project IDs always enabled on CRC enabled filesystems",
	},
	Conditional {
		self_opt: Opt::i_attr,
		self_is: Predicate::Ne(2),
		peer: Opt::m_crc,
		peer_is: Predicate::IsTrue,
		message: "V2 attribute format always enabled on CRC enabled filesystems",
	},
	Conditional {
		self_opt: Opt::l_version,
		self_is: Predicate::Ne(2),
		peer: Opt::m_crc,
		peer_is: Predicate::IsTrue,
		message: "V2 logs always enabled for CRC enabled filesystems",
	},
	Conditional {
		self_opt: Opt::l_lazycount,
		self_is: Predicate::IsFalse,
		peer: Opt::m_crc,
		peer_is: Predicate::IsTrue,
		message: "Lazy superblock counters always enabled for CRC enabled filesystems",
	},
	Conditional {
		self_opt: Opt::n_ftype,
		self_is: Predicate::IsFalse,
		peer: Opt::m_crc,
		peer_is: Predicate::IsTrue,
		message: "Cannot disable ftype with crcs enabled",
	},
	Conditional {
		self_opt: Opt::m_finobt,
		self_is: Predicate::IsTrue,
		peer: Opt::m_crc,
		peer_is: Predicate::IsFalse,
		message: "finobt not supported without CRC support",
	},
	Conditional {
		self_opt: Opt::i_sparse,
		self_is: Predicate::IsTrue,
		peer: Opt::m_crc,
		peer_is: Predicate::IsFalse,
		message: "sparse inodes not supported without CRC support",
	},
	Conditional {
		self_opt: Opt::m_rmapbt,
		self_is: Predicate::IsTrue,
		peer: Opt::m_crc,
		peer_is: Predicate::IsFalse,
		message: "rmapbt not supported without CRC support",
	},
	Conditional {
		self_opt: Opt::m_reflink,
		self_is: Predicate::IsTrue,
		peer: Opt::m_crc,
		peer_is: Predicate::IsFalse,
		message: "reflink not supported without CRC support",
	},
];

/// Checks `opt`'s unconditional conflicts (`spec.md` §4.2): fires iff a listed peer is `seen`.
pub fn check_unconditional(ctx: &Context, opt: Opt) -> Result<(), Error> {
	let s = schema::get(opt);
	for &peer in s.conflicts {
		if ctx.is_seen(peer) {
			let p = schema::get(peer);
			return Err(Error::conflict(s.group, s.name, p.group, p.name));
		}
	}
	Ok(())
}

/// Checks every value-dependent conflict in [`CRC_LOCKS`] against the context's current values.
/// Called after every write (for earliest detection) and once more after default fill-in, per
/// `spec.md` §4.2.
pub fn check_conditionals(ctx: &Context) -> Result<(), Error> {
	for c in CRC_LOCKS {
		if c.peer_is.matches(ctx.value(c.peer)) && c.self_is.matches(ctx.value(c.self_opt)) {
			return Err(Error::new(Kind::Conflict, c.message));
		}
	}
	Ok(())
}

/// `rmapbt` and a realtime device are mutually exclusive (`spec.md` §4.2's last row). This
/// doesn't fit the one-peer-suboption shape of [`Conditional`]: "a realtime device is present" is
/// a disjunction over three `-r` suboptions, not a single value, so it is checked separately once
/// the realtime target is known.
pub fn check_rmapbt_realtime(ctx: &Context, realtime_device_present: bool) -> Result<(), Error> {
	if ctx.bool_(Opt::m_rmapbt) && realtime_device_present {
		return Err(Error::new(
			Kind::Conflict,
			"rmapbt not supported with realtime devices",
		));
	}
	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::value::Value;

	#[test]
	fn unconditional_conflict_fires_on_seen_peer() {
		let mut ctx = Context::new();
		ctx.set(Opt::d_sunit, Value::Num(128)).unwrap();
		let err = check_unconditional(&ctx, Opt::d_noalign).unwrap_err();
		assert_eq!(err.kind, Kind::Conflict);
	}

	#[test]
	fn crc_forces_ftype_on() {
		let ctx = Context::new();
		assert!(check_conditionals(&ctx).is_ok());

		let mut ctx = Context::new();
		ctx.set(Opt::n_ftype, Value::Bool(false)).unwrap();
		let err = check_conditionals(&ctx).unwrap_err();
		assert_eq!(err.message, "Cannot disable ftype with crcs enabled");
	}

	#[test]
	fn crc_disabled_forbids_explicit_finobt() {
		let mut ctx = Context::new();
		ctx.set(Opt::m_crc, Value::Bool(false)).unwrap();
		ctx.set(Opt::m_finobt, Value::Bool(true)).unwrap();
		let err = check_conditionals(&ctx).unwrap_err();
		assert_eq!(err.message, "finobt not supported without CRC support");
	}

	#[test]
	fn crc_disabled_without_explicit_finobt_is_fine() {
		let mut ctx = Context::new();
		ctx.set(Opt::m_crc, Value::Bool(false)).unwrap();
		assert!(check_conditionals(&ctx).is_ok());
	}

	#[test]
	fn rmapbt_and_realtime_conflict() {
		let mut ctx = Context::new();
		ctx.set(Opt::m_rmapbt, Value::Bool(true)).unwrap();
		assert!(check_rmapbt_realtime(&ctx, false).is_ok());
		let err = check_rmapbt_realtime(&ctx, true).unwrap_err();
		assert_eq!(err.message, "rmapbt not supported with realtime devices");
	}
}
